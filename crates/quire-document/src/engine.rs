// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document engines — open a source file, expose page count and sizes, and
// render page bitmaps for preview.

use std::path::Path;

use image::imageops::FilterType;
use lopdf::{Document, ObjectId};
use quire_core::error::{QuireError, Result};
use quire_core::{Bitmap, Dims};
use tracing::{debug, info, instrument};

use crate::pdfutil;

/// A loaded source document the core can inspect and render.
///
/// Implementations are read-only and thread-safe so the background renderer
/// can share them with the owner thread.
pub trait DocumentEngine: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Size of a page (1-indexed) in points, as displayed.
    fn page_size(&self, page: u32) -> Result<Dims>;

    /// Render a page (1-indexed) to a bitmap at `scale` (1.0 = one pixel per
    /// point).
    fn render(&self, page: u32, scale: f64) -> Result<Bitmap>;
}

/// Open a source file, choosing an engine by format.
///
/// The file extension decides first; unrecognized extensions fall back to
/// content sniffing.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn open(path: impl AsRef<Path>) -> Result<Box<dyn DocumentEngine>> {
    let path = path.as_ref();
    match detect_format(path)? {
        SourceFormat::Pdf => Ok(Box::new(PdfEngine::open(path)?)),
        SourceFormat::Raster => Ok(Box::new(ImageEngine::open(path)?)),
    }
}

/// Supported source file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Pdf,
    Raster,
}

fn detect_format(path: &Path) -> Result<SourceFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => return Ok(SourceFormat::Pdf),
        Some("png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" | "webp") => {
            return Ok(SourceFormat::Raster);
        }
        _ => {}
    }

    // Unknown extension: sniff the leading bytes.
    let header = read_header(path)?;
    if header.starts_with(b"%PDF") {
        return Ok(SourceFormat::Pdf);
    }
    if image::guess_format(&header).is_ok() {
        return Ok(SourceFormat::Raster);
    }
    Err(QuireError::UnsupportedFormat(path.display().to_string()))
}

fn read_header(path: &Path) -> Result<Vec<u8>> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut header = vec![0u8; 16];
    let read = file.read(&mut header)?;
    header.truncate(read);
    Ok(header)
}

// ---------------------------------------------------------------------------
// PDF engine
// ---------------------------------------------------------------------------

/// lopdf-backed engine for PDF sources.
///
/// Exposes page count and displayed page sizes (inherited /MediaBox with
/// /Rotate applied). Content rasterization is delegated to an external
/// renderer; `render` here produces a correctly-sized blank placeholder so
/// preview plumbing works without one.
pub struct PdfEngine {
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
    source_path: String,
}

impl PdfEngine {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = Document::load(path).map_err(|err| QuireError::Corrupt {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(QuireError::Encrypted(path.display().to_string()));
        }

        let pages = document.get_pages();
        let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());
        let mut numbers: Vec<u32> = pages.keys().copied().collect();
        numbers.sort_unstable();
        for number in numbers {
            page_ids.push(pages[&number]);
        }

        info!(pages = page_ids.len(), "PDF opened");
        Ok(Self {
            document,
            page_ids,
            source_path: path.display().to_string(),
        })
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        if page == 0 || page as usize > self.page_ids.len() {
            return Err(QuireError::MissingSourcePage { source: 0, page });
        }
        Ok(self.page_ids[page as usize - 1])
    }
}

impl DocumentEngine for PdfEngine {
    fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    fn page_size(&self, page: u32) -> Result<Dims> {
        let page_id = self.page_id(page)?;
        let rect = pdfutil::media_box(&self.document, page_id);
        let size = Dims::new(rect[2] - rect[0], rect[3] - rect[1]);

        // /Rotate 90 or 270 swaps the displayed axes.
        let rotation = pdfutil::page_rotation(&self.document, page_id);
        if rotation % 180 == 90 {
            Ok(size.swapped())
        } else {
            Ok(size)
        }
    }

    fn render(&self, page: u32, scale: f64) -> Result<Bitmap> {
        let size = self.page_size(page)?;
        let width = (size.width * scale).round().max(1.0) as u32;
        let height = (size.height * scale).round().max(1.0) as u32;
        debug!(page, width, height, "placeholder render");
        Ok(Bitmap::from_pixel(
            width,
            height,
            image::Rgba([255, 255, 255, 255]),
        ))
    }
}

// ---------------------------------------------------------------------------
// Raster image engine
// ---------------------------------------------------------------------------

/// `image`-crate backed engine for single-page raster sources (PNG, JPEG,
/// TIFF, …). One pixel is one point: a 600×800 image is a 600×800 pt page.
pub struct ImageEngine {
    image: image::DynamicImage,
    source_path: String,
}

impl ImageEngine {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|err| QuireError::Corrupt {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        info!(
            width = image.width(),
            height = image.height(),
            "image opened"
        );
        Ok(Self {
            image,
            source_path: path.display().to_string(),
        })
    }

    /// Wrap an already-decoded image, e.g. from clipboard paste.
    pub fn from_dynamic(image: image::DynamicImage, name: impl Into<String>) -> Self {
        Self {
            image,
            source_path: name.into(),
        }
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    fn check_page(&self, page: u32) -> Result<()> {
        if page != 1 {
            return Err(QuireError::MissingSourcePage { source: 0, page });
        }
        Ok(())
    }
}

impl DocumentEngine for ImageEngine {
    fn page_count(&self) -> u32 {
        1
    }

    fn page_size(&self, page: u32) -> Result<Dims> {
        self.check_page(page)?;
        Ok(Dims::new(
            f64::from(self.image.width()),
            f64::from(self.image.height()),
        ))
    }

    fn render(&self, page: u32, scale: f64) -> Result<Bitmap> {
        self.check_page(page)?;
        let width = (f64::from(self.image.width()) * scale).round().max(1.0) as u32;
        let height = (f64::from(self.image.height()) * scale).round().max(1.0) as u32;
        let resized = self.image.resize(width, height, FilterType::Lanczos3);
        Ok(resized.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_engine_is_single_page() {
        let img = image::DynamicImage::new_rgba8(600, 800);
        let engine = ImageEngine::from_dynamic(img, "pasted");
        assert_eq!(engine.page_count(), 1);
        assert!(engine.page_size(0).is_err());
        assert!(engine.page_size(2).is_err());
        let size = engine.page_size(1).expect("page 1 size");
        assert!(size.approx_eq(Dims::new(600.0, 800.0)));
    }

    #[test]
    fn image_engine_renders_at_scale() {
        let img = image::DynamicImage::new_rgba8(600, 800);
        let engine = ImageEngine::from_dynamic(img, "pasted");
        let bitmap = engine.render(1, 0.25).expect("render");
        assert_eq!(bitmap.width(), 150);
        assert_eq!(bitmap.height(), 200);
    }

    #[test]
    fn unknown_extension_without_content_is_unsupported() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("probe.xyz");
        std::fs::write(&path, b"not a document at all").expect("write probe file");
        assert!(matches!(
            detect_format(&path),
            Err(QuireError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn pdf_magic_is_sniffed_without_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("headerless");
        std::fs::write(&path, b"%PDF-1.5 stub").expect("write probe file");
        assert_eq!(
            detect_format(&path).expect("detect"),
            SourceFormat::Pdf
        );
    }
}
