// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quire — Page model, geometry algebra, history manager, and errors shared
// across all crates.

pub mod config;
pub mod error;
pub mod geom;
pub mod history;
pub mod page;
pub mod session;

pub use config::AppConfig;
pub use error::{QuireError, Result};
pub use geom::{Dims, Sides};
pub use history::{History, Snapshot};
pub use page::{LayerPage, Page, PageTransform, Placement, ScaleSpec};
pub use session::Session;

/// Thumbnail pixel buffer delivered by the background renderer and cached on
/// pages. Carried by value between threads; wrapped in `Arc` where cached.
pub type Bitmap = image::RgbaImage;
