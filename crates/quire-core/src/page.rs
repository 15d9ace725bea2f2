// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page transform state: source reference, rotation, crop, scale, and
// attached overlay/underlay layers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Bitmap;
use crate::geom::{Dims, Sides};

/// Smallest page edge the PDF format allows, in points.
pub const MIN_PAGE_POINTS: f64 = 72.0;
/// Largest page edge the PDF format allows, in points.
pub const MAX_PAGE_POINTS: f64 = 14400.0;

/// Number of quarter-turn crop permutations equivalent to `angle` degrees of
/// page rotation.
///
/// The result is invariant under full turns: `quarter_turns(a) ==
/// quarter_turns(a + 360)` for every `a`, and `quarter_turns(0) == 0`.
pub fn quarter_turns(angle: i32) -> u32 {
    (((-angle).rem_euclid(360) as f64 / 90.0).round() as u32) % 4
}

/// How a scale change is requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScaleSpec {
    /// Fit the visible output size inside the given box, in points.
    Size { width: f64, height: f64 },
    /// Multiply the current scale by this factor.
    Factor(f64),
}

/// Whether a layer paints beneath or above its host page's own content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    Overlay,
    Underlay,
}

/// Shared transform behaviour of base pages and layer pages.
///
/// The provided methods implement the rotation/crop composition rule and the
/// derived visible-size quantities; implementors only supply field access.
pub trait PageTransform {
    fn angle(&self) -> i32;
    fn set_angle(&mut self, angle: i32);
    fn crop(&self) -> Sides;
    fn set_crop(&mut self, crop: Sides);
    fn display_scale(&self) -> f64;
    fn set_display_scale(&mut self, scale: f64);
    fn size_orig(&self) -> Dims;

    /// Drop any cached raster derived from the current geometry.
    fn invalidate_cache(&mut self) {}

    /// The un-cropped page size as displayed: axes swap on odd quarter-turns.
    fn effective_size(&self) -> Dims {
        if quarter_turns(self.angle()) % 2 == 1 {
            self.size_orig().swapped()
        } else {
            self.size_orig()
        }
    }

    /// Visible output width in points, after scale and crop.
    fn visible_width(&self) -> f64 {
        let crop = self.crop();
        self.display_scale() * self.effective_size().width * (1.0 - crop.left - crop.right)
    }

    /// Visible output height in points, after scale and crop.
    fn visible_height(&self) -> f64 {
        let crop = self.crop();
        self.display_scale() * self.effective_size().height * (1.0 - crop.top - crop.bottom)
    }

    /// Turn the page by `delta` degrees, keeping the crop anchored to the
    /// same physical paper edges. Returns whether anything changed.
    fn rotate(&mut self, delta: i32) -> bool {
        if delta.rem_euclid(360) == 0 {
            return false;
        }
        self.set_angle((self.angle() + delta).rem_euclid(360));
        // Permuting by the turns of -delta moves the crop with the page
        // content; quarter_turns(angle) maps it back to the un-rotated frame.
        self.set_crop(self.crop().rotated(quarter_turns(-delta)));
        self.invalidate_cache();
        true
    }

    /// Change the display scale. The resulting factor is clamped so the
    /// visible output size stays within the format's page-size limits on
    /// both axes. Returns whether the scale actually changed.
    fn scale_to(&mut self, spec: ScaleSpec) -> bool {
        let crop = self.crop();
        let effective = self.effective_size();
        let unit_w = effective.width * (1.0 - crop.left - crop.right);
        let unit_h = effective.height * (1.0 - crop.top - crop.bottom);

        let requested = match spec {
            ScaleSpec::Size { width, height } => (width / unit_w).min(height / unit_h),
            ScaleSpec::Factor(factor) => self.display_scale() * factor,
        };

        let lo = (MIN_PAGE_POINTS / unit_w).max(MIN_PAGE_POINTS / unit_h);
        let hi = (MAX_PAGE_POINTS / unit_w).min(MAX_PAGE_POINTS / unit_h);
        let clamped = if lo > hi { hi } else { requested.clamp(lo, hi) };

        if (clamped - self.display_scale()).abs() < 1e-12 {
            return false;
        }
        debug!(from = self.display_scale(), to = clamped, "scale changed");
        self.set_display_scale(clamped);
        self.invalidate_cache();
        true
    }
}

/// One page of the output sequence, drawn from a source document.
///
/// A page does not own its source document: `source_file` is a 1-based index
/// into the caller's open-document list, `source_page` a 1-based page number
/// within that document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub source_file: usize,
    pub source_page: u32,
    pub display_scale: f64,
    /// Degrees, kept normalized to `0..360`.
    pub angle: i32,
    pub crop: Sides,
    /// Page size before crop, in the source page's own un-rotated frame.
    pub size_orig: Dims,
    /// Overlays/underlays painted onto this page, in sequence order.
    pub layers: Vec<LayerPage>,
    /// Cached preview raster; never part of snapshots or equality.
    #[serde(skip)]
    pub thumbnail: Option<Arc<Bitmap>>,
}

impl Page {
    pub fn new(source_file: usize, source_page: u32, size_orig: Dims) -> Self {
        Self {
            source_file,
            source_page,
            display_scale: 1.0,
            angle: 0,
            crop: Sides::default(),
            size_orig,
            layers: Vec::new(),
            thumbnail: None,
        }
    }

    /// The rotation angle normalized into `0..360`.
    pub fn normalized_angle(&self) -> i32 {
        self.angle.rem_euclid(360)
    }

    /// Value copy. The cached thumbnail is carried over only when
    /// `keep_thumbnail` is set; duplicates made because the geometry changed
    /// must not inherit a stale raster.
    pub fn duplicate(&self, keep_thumbnail: bool) -> Page {
        let mut copy = self.clone();
        if !keep_thumbnail {
            copy.thumbnail = None;
        }
        copy
    }

    /// Cut the page in half along the vertical midline of its visible area.
    ///
    /// The receiver becomes the left half and the returned duplicate the
    /// right half; the two halves are contiguous and non-overlapping.
    pub fn split(&mut self) -> Page {
        let crop = self.crop;
        let midpoint = (1.0 + crop.left - crop.right) / 2.0;

        self.crop.right = 1.0 - midpoint;
        self.thumbnail = None;

        let mut right = self.duplicate(false);
        right.crop.left = midpoint;
        right.crop.right = crop.right;
        right
    }
}

// Equality ignores the cached thumbnail.
impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.source_file == other.source_file
            && self.source_page == other.source_page
            && self.display_scale == other.display_scale
            && self.angle == other.angle
            && self.crop == other.crop
            && self.size_orig == other.size_orig
            && self.layers == other.layers
    }
}

impl PageTransform for Page {
    fn angle(&self) -> i32 {
        self.angle
    }
    fn set_angle(&mut self, angle: i32) {
        self.angle = angle;
    }
    fn crop(&self) -> Sides {
        self.crop
    }
    fn set_crop(&mut self, crop: Sides) {
        self.crop = crop;
    }
    fn display_scale(&self) -> f64 {
        self.display_scale
    }
    fn set_display_scale(&mut self, scale: f64) {
        self.display_scale = scale;
    }
    fn size_orig(&self) -> Dims {
        self.size_orig
    }
    fn invalidate_cache(&mut self) {
        self.thumbnail = None;
    }
}

/// A page composited onto a host page as an overlay or underlay.
///
/// Carries the same transform fields as a base page plus a placement offset.
/// `offset.left`/`offset.top` are fractions of the slack between the host's
/// visible size and the layer's visible size, so a smaller layer can be
/// pinned to any corner, edge, or the centre of its host. Layers never nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPage {
    pub source_file: usize,
    pub source_page: u32,
    pub display_scale: f64,
    pub angle: i32,
    pub crop: Sides,
    pub size_orig: Dims,
    pub offset: Sides,
    pub placement: Placement,
}

impl LayerPage {
    pub fn new(
        source_file: usize,
        source_page: u32,
        size_orig: Dims,
        placement: Placement,
    ) -> Self {
        Self {
            source_file,
            source_page,
            display_scale: 1.0,
            angle: 0,
            crop: Sides::default(),
            size_orig,
            offset: Sides::default(),
            placement,
        }
    }
}

impl PageTransform for LayerPage {
    fn angle(&self) -> i32 {
        self.angle
    }
    fn set_angle(&mut self, angle: i32) {
        self.angle = angle;
    }
    fn crop(&self) -> Sides {
        self.crop
    }
    fn set_crop(&mut self, crop: Sides) {
        self.crop = crop;
    }
    fn display_scale(&self) -> f64 {
        self.display_scale
    }
    fn set_display_scale(&mut self, scale: f64) {
        self.display_scale = scale;
    }
    fn size_orig(&self) -> Dims {
        self.size_orig
    }
}
