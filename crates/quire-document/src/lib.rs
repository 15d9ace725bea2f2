// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// quire-document — Document engines and the export compositor.
//
// Provides the engine trait sources are opened through (PDF via lopdf, raster
// images via the image crate), the compositor that assembles the output
// document from a page sequence, and /Info metadata merging.

pub mod compose;
pub mod engine;
pub mod metadata;
pub mod pagewriter;

mod pdfutil;

// Re-export the primary types so callers can use `quire_document::Compositor` etc.
pub use compose::{Compositor, SourceDocument, SourceDocuments};
pub use engine::{DocumentEngine, ImageEngine, PdfEngine, open};
pub use metadata::DocumentMetadata;
