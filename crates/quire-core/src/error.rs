// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Quire.

use thiserror::Error;

/// Top-level error type for all Quire operations.
#[derive(Debug, Error)]
pub enum QuireError {
    // -- Document open errors --
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("document is encrypted: {0}")]
    Encrypted(String),

    #[error("corrupt document {path}: {detail}")]
    Corrupt { path: String, detail: String },

    // -- Page model errors --
    #[error("invalid crop: {0}")]
    InvalidCrop(String),

    #[error("page index {index} out of range (sequence has {len} pages)")]
    PageOutOfRange { index: usize, len: usize },

    // -- Rendering (per page, non-fatal to a batch) --
    #[error("failed to render page {page}: {detail}")]
    Render { page: u32, detail: String },

    // -- Export (fatal, aborts the whole run) --
    #[error("source document {src} cannot supply page {page}")]
    MissingSourcePage { src: usize, page: u32 },

    #[error("export failed: {0}")]
    Export(String),

    // -- Low-level document operations --
    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("image processing failed: {0}")]
    Image(String),

    // -- I/O and persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QuireError>;
