// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use serde::{Deserialize, Serialize};

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scale factor used for background preview rendering.
    pub preview_scale: f64,
    /// Maximum number of history snapshots kept; 0 disables the cap.
    pub history_limit: usize,
    /// PDF version written on export.
    pub export_pdf_version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preview_scale: 0.25,
            history_limit: 100,
            export_pdf_version: "1.5".to_string(),
        }
    }
}
