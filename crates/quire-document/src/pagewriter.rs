// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image-to-page wrapping — turn a raster source into a single-page PDF so it
// composes like any other page, using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use image::DynamicImage;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use quire_core::error::Result;
use tracing::{debug, instrument};

/// Points per millimetre.
const MM_PER_PT: f32 = 25.4 / 72.0;

/// Wrap a decoded raster image into a one-page PDF.
///
/// One pixel becomes one point, matching the page size the image engine
/// reports, so transforms computed against the model carry straight through
/// to composition.
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn image_to_pdf(image: &DynamicImage, title: &str) -> Result<Vec<u8>> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    let rgb = image.to_rgb8();
    let raw = RawImage {
        pixels: RawImageData::U8(rgb.into_raw()),
        width,
        height,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };

    let mut doc = PdfDocument::new(title);
    let xobject_id = doc.add_image(&raw);

    let page_w = Mm(width as f32 * MM_PER_PT);
    let page_h = Mm(height as f32 * MM_PER_PT);

    // At 72 dpi the image's native size in points equals its pixel size, so
    // an identity placement fills the page exactly.
    let ops = vec![Op::UseXobject {
        id: xobject_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(0.0)),
            translate_y: Some(Pt(0.0)),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            dpi: Some(72.0),
            rotate: None,
        },
    }];

    doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
    debug!(bytes = output.len(), "image wrapped as PDF page");

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_image_is_a_loadable_single_page_pdf() {
        let image = DynamicImage::new_rgb8(120, 80);
        let bytes = image_to_pdf(&image, "pasted image").expect("wrap image");

        let doc = lopdf::Document::load_mem(&bytes).expect("load wrapped PDF");
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn wrapped_page_size_matches_the_pixels() {
        let image = DynamicImage::new_rgb8(144, 72);
        let bytes = image_to_pdf(&image, "sized").expect("wrap image");

        let doc = lopdf::Document::load_mem(&bytes).expect("load wrapped PDF");
        let pages = doc.get_pages();
        let page_id = pages[&1];
        let rect = crate::pdfutil::media_box(&doc, page_id);
        assert!((rect[2] - rect[0] - 144.0).abs() < 1.0);
        assert!((rect[3] - rect[1] - 72.0).abs() < 1.0);
    }
}
