// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export compositor — assemble the output document from the page sequence
// and the open source documents using `lopdf`.
//
// Each base page is deep-cloned out of its source, given its final /Rotate
// and visible-region box, and its layers are merged in as Form XObjects
// painted beneath (underlay) or above (overlay) the host content.

use std::path::Path;

use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use quire_core::error::{QuireError, Result};
use quire_core::page::{quarter_turns, LayerPage, Page, PageTransform, Placement};
use tracing::{debug, info, instrument, warn};

use crate::metadata::DocumentMetadata;
use crate::pagewriter;
use crate::pdfutil;

/// Clockwise quarter-turns a viewer applies for `angle` degrees of /Rotate.
fn turns_clockwise(angle: i32) -> u32 {
    ((angle.rem_euclid(360) as f64) / 90.0).round() as u32 % 4
}

/// One open source document with its recovered metadata.
pub struct SourceDocument {
    pub document: Document,
    pub name: String,
    pub metadata: DocumentMetadata,
}

/// The caller-owned list of open source documents, referenced by pages via
/// 1-based indices.
#[derive(Default)]
pub struct SourceDocuments {
    sources: Vec<SourceDocument>,
}

impl SourceDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a PDF from disk and append it. Returns the new 1-based index.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_pdf(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let document = Document::load(path).map_err(|err| QuireError::Corrupt {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(QuireError::Encrypted(path.display().to_string()));
        }
        self.push_document(document, path.display().to_string())
    }

    /// Append a PDF already held in memory. Returns the new 1-based index.
    pub fn add_pdf_bytes(&mut self, bytes: &[u8], name: impl Into<String>) -> Result<usize> {
        let name = name.into();
        let document = Document::load_mem(bytes).map_err(|err| QuireError::Corrupt {
            path: name.clone(),
            detail: err.to_string(),
        })?;
        self.push_document(document, name)
    }

    /// Wrap a raster image as a one-page PDF and append it.
    pub fn add_image(&mut self, image: &DynamicImage, name: impl Into<String>) -> Result<usize> {
        let name = name.into();
        let bytes = pagewriter::image_to_pdf(image, &name)?;
        self.add_pdf_bytes(&bytes, name)
    }

    fn push_document(&mut self, document: Document, name: String) -> Result<usize> {
        let metadata = DocumentMetadata::from_document(&document);
        self.sources.push(SourceDocument {
            document,
            name,
            metadata,
        });
        info!(index = self.sources.len(), "source document registered");
        Ok(self.sources.len())
    }

    /// Fetch a source by 1-based index.
    pub fn get(&self, index: usize) -> Result<&SourceDocument> {
        if index == 0 || index > self.sources.len() {
            return Err(QuireError::Export(format!(
                "source document {index} is not open ({} registered)",
                self.sources.len()
            )));
        }
        Ok(&self.sources[index - 1])
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDocument> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Assembles the output document from a page sequence.
pub struct Compositor<'a> {
    sources: &'a SourceDocuments,
    pdf_version: String,
    producer: String,
}

impl<'a> Compositor<'a> {
    pub fn new(sources: &'a SourceDocuments) -> Self {
        Self {
            sources,
            pdf_version: "1.5".to_string(),
            producer: format!("quire {}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.pdf_version = version.into();
        self
    }

    /// Assemble the full output document in memory.
    ///
    /// A source that cannot supply a referenced page aborts the whole run;
    /// nothing partially assembled escapes this function.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn assemble(&self, pages: &[Page], metadata: &DocumentMetadata) -> Result<Document> {
        if pages.is_empty() {
            return Err(QuireError::Export("page sequence is empty".to_string()));
        }

        let mut output = Document::with_version(self.pdf_version.clone());
        let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());
        for page in pages {
            page_ids.push(self.compose_base_page(&mut output, page)?);
        }

        // Page tree and catalog.
        let pages_id = output.new_object_id();
        for &id in &page_ids {
            if let Ok(Object::Dictionary(dict)) = output.get_object_mut(id) {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
        let pages_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(page_ids.len() as i64)),
        ]);
        output.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = output.add_object(Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ])));
        output.trailer.set("Root", Object::Reference(catalog_id));

        // Metadata: explicit output values win, then sources in order.
        let mut merged = metadata.clone();
        for source in self.sources.iter() {
            merged.merge_missing_from(&source.metadata);
        }
        let info_id =
            output.add_object(Object::Dictionary(merged.to_info_dictionary(&self.producer)));
        output.trailer.set("Info", Object::Reference(info_id));

        output.max_id = output.objects.len() as u32;
        output.renumber_objects();
        output.compress();

        debug!(pages = page_ids.len(), "output document assembled");
        Ok(output)
    }

    /// Assemble and write the output atomically: the destination is only
    /// replaced once serialisation has fully succeeded.
    #[instrument(skip(self, pages, metadata), fields(dest = %dest.as_ref().display()))]
    pub fn export(
        &self,
        pages: &[Page],
        metadata: &DocumentMetadata,
        dest: impl AsRef<Path>,
    ) -> Result<()> {
        let dest = dest.as_ref();
        let mut document = self.assemble(pages, metadata)?;

        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        document
            .save_to(&mut tmp)
            .map_err(|err| QuireError::Export(format!("failed to serialise output: {err}")))?;
        tmp.persist(dest).map_err(|err| QuireError::Io(err.error))?;

        info!("export complete");
        Ok(())
    }

    // -- Per-page composition -------------------------------------------------

    fn compose_base_page(&self, output: &mut Document, page: &Page) -> Result<ObjectId> {
        let source = self.sources.get(page.source_file)?;
        let src_pages = source.document.get_pages();
        let src_page_id =
            *src_pages
                .get(&page.source_page)
                .ok_or(QuireError::MissingSourcePage {
                    src: page.source_file,
                    page: page.source_page,
                })?;

        // Resolve inheritable attributes before the page leaves its tree.
        let src_box = pdfutil::media_box(&source.document, src_page_id);
        let src_rotation = pdfutil::page_rotation(&source.document, src_page_id);
        let src_resources =
            pdfutil::resolve_inherited(&source.document, src_page_id, b"Resources");

        let cloned_id = clone_page(&source.document, output, src_page_id)?;

        // Materialise resources the page inherited from its old parent.
        let needs_resources = match output.get_object(cloned_id) {
            Ok(Object::Dictionary(dict)) => dict.get(b"Resources").is_err(),
            _ => false,
        };
        if needs_resources && let Some(resources) = src_resources {
            let cloned = clone_object(&source.document, output, &resources)?;
            if let Ok(Object::Dictionary(dict)) = output.get_object_mut(cloned_id) {
                dict.set("Resources", cloned);
            }
        }

        let total = page.normalized_angle() + src_rotation;
        let k = quarter_turns(total);

        if let Ok(Object::Dictionary(dict)) = output.get_object_mut(cloned_id) {
            dict.set("Rotate", Object::Integer(i64::from(total.rem_euclid(360))));
        }

        // Visible-region box: crop in the source's un-rotated frame, then
        // scale about the origin together with the content.
        let mut page_box = src_box;
        if !page.crop.is_zero() {
            let crop = page.crop.rotated(k);
            let w = page_box[2] - page_box[0];
            let h = page_box[3] - page_box[1];
            page_box = [
                page_box[0] + w * crop.left,
                page_box[1] + h * crop.bottom,
                page_box[2] - w * crop.right,
                page_box[3] - h * crop.top,
            ];
        }
        let scale = page.display_scale;
        if (scale - 1.0).abs() > 1e-12 {
            page_box = page_box.map(|v| v * scale);
            wrap_page_content(
                output,
                cloned_id,
                format!("q\n{scale} 0 0 {scale} 0 0 cm\n").into_bytes(),
                b"\nQ\n".to_vec(),
            )?;
        }
        if let Ok(Object::Dictionary(dict)) = output.get_object_mut(cloned_id) {
            dict.set("MediaBox", pdfutil::rect_to_object(page_box));
            dict.set("CropBox", pdfutil::rect_to_object(page_box));
        }

        let host_turns = turns_clockwise(total);
        for (index, layer) in page.layers.iter().enumerate() {
            self.compose_layer(output, cloned_id, page_box, host_turns, layer, index)?;
        }

        Ok(cloned_id)
    }

    fn compose_layer(
        &self,
        output: &mut Document,
        host_id: ObjectId,
        host_box: [f64; 4],
        host_turns: u32,
        layer: &LayerPage,
        index: usize,
    ) -> Result<()> {
        let source = self.sources.get(layer.source_file)?;
        let src_pages = source.document.get_pages();
        let layer_page_id =
            *src_pages
                .get(&layer.source_page)
                .ok_or(QuireError::MissingSourcePage {
                    src: layer.source_file,
                    page: layer.source_page,
                })?;

        let content = source
            .document
            .get_page_content(layer_page_id)
            .map_err(|err| QuireError::Pdf(format!("cannot read layer content: {err}")))?;
        let src_box = pdfutil::media_box(&source.document, layer_page_id);
        let src_rotation = pdfutil::page_rotation(&source.document, layer_page_id);

        let total = layer.angle.rem_euclid(360) + src_rotation;

        // The layer's visible region in its own un-rotated frame clips the
        // form; everything outside the crop stays hidden.
        let crop = layer.crop.rotated(quarter_turns(total));
        let w = src_box[2] - src_box[0];
        let h = src_box[3] - src_box[1];
        let bbox = [
            src_box[0] + w * crop.left,
            src_box[1] + h * crop.bottom,
            src_box[2] - w * crop.right,
            src_box[3] - h * crop.top,
        ];

        // Destination rectangle, first in the host's displayed frame. The
        // offset fractions distribute the slack between host and layer; with
        // zero slack the layer is pinned flush to the host edge.
        let (host_w, host_h) = if host_turns % 2 == 1 {
            (host_box[3] - host_box[1], host_box[2] - host_box[0])
        } else {
            (host_box[2] - host_box[0], host_box[3] - host_box[1])
        };
        let layer_w = layer.visible_width();
        let layer_h = layer.visible_height();
        let left = layer.offset.left * (host_w - layer_w);
        let top = layer.offset.top * (host_h - layer_h);
        let displayed = [left, host_h - top - layer_h, left + layer_w, host_h - top];
        let dest = displayed_rect_to_page(host_turns, host_box, displayed);

        // Content turns relative to page space: the viewer's rotation of the
        // host page contributes its inverse.
        let content_turns = (turns_clockwise(total) + 4 - host_turns) % 4;
        let m = placement_matrix(content_turns, bbox, dest);

        let resources = match pdfutil::resolve_inherited(&source.document, layer_page_id, b"Resources")
        {
            Some(resources) => clone_object(&source.document, output, &resources)?,
            None => Object::Dictionary(Dictionary::new()),
        };
        let mut form_dict = Dictionary::new();
        form_dict.set("Type", Object::Name(b"XObject".to_vec()));
        form_dict.set("Subtype", Object::Name(b"Form".to_vec()));
        form_dict.set("BBox", pdfutil::rect_to_object(bbox));
        form_dict.set("Resources", resources);
        let xobj_id = output.add_object(Object::Stream(Stream::new(form_dict, content)));

        let name = format!("QLay{index}");
        register_xobject(output, host_id, &name, xobj_id)?;

        let draw = format!(
            "q\n{} {} {} {} {} {} cm\n/{name} Do\nQ\n",
            m[0], m[1], m[2], m[3], m[4], m[5]
        );
        match layer.placement {
            Placement::Underlay => prepend_page_content(output, host_id, draw.into_bytes()),
            Placement::Overlay => append_page_content(output, host_id, draw.into_bytes()),
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry helpers
// ---------------------------------------------------------------------------

/// Map a rectangle given in a page's displayed frame (origin at the displayed
/// lower-left of `page_box`) back into page coordinates, undoing `turns`
/// clockwise viewer quarter-turns.
fn displayed_rect_to_page(turns: u32, page_box: [f64; 4], rect: [f64; 4]) -> [f64; 4] {
    let [bx1, by1, bx2, by2] = page_box;
    let [u1, v1, u2, v2] = rect;
    match turns % 4 {
        0 => [bx1 + u1, by1 + v1, bx1 + u2, by1 + v2],
        1 => [bx2 - v2, by1 + u1, bx2 - v1, by1 + u2],
        2 => [bx2 - u2, by2 - v2, bx2 - u1, by2 - v1],
        _ => [bx1 + v1, by2 - u2, bx1 + v2, by2 - u1],
    }
}

/// The `cm` matrix placing `src` onto `dest` with `turns` clockwise
/// quarter-turns of the content.
fn placement_matrix(turns: u32, src: [f64; 4], dest: [f64; 4]) -> [f64; 6] {
    let ws = src[2] - src[0];
    let hs = src[3] - src[1];
    let wd = dest[2] - dest[0];
    let hd = dest[3] - dest[1];
    match turns % 4 {
        0 => {
            let sx = wd / ws;
            let sy = hd / hs;
            [sx, 0.0, 0.0, sy, dest[0] - sx * src[0], dest[1] - sy * src[1]]
        }
        1 => {
            let sx = wd / hs;
            let sy = hd / ws;
            [0.0, -sy, sx, 0.0, dest[0] - sx * src[1], dest[1] + sy * src[2]]
        }
        2 => {
            let sx = wd / ws;
            let sy = hd / hs;
            [-sx, 0.0, 0.0, -sy, dest[0] + sx * src[2], dest[1] + sy * src[3]]
        }
        _ => {
            let sx = wd / hs;
            let sy = hd / ws;
            [0.0, sy, -sx, 0.0, dest[0] + sx * src[3], dest[1] - sy * src[0]]
        }
    }
}

// ---------------------------------------------------------------------------
// Object-graph cloning
// ---------------------------------------------------------------------------

/// How deep the object-graph clone may recurse. Bounds the walk on graphs
/// with back-references (annotation /P entries and the like).
const MAX_CLONE_DEPTH: usize = 32;

/// Clone a page object (and everything it transitively references) from
/// `source` into `target`, returning the new page's object id.
fn clone_page(source: &Document, target: &mut Document, page_id: ObjectId) -> Result<ObjectId> {
    let page_object = source
        .get_object(page_id)
        .map_err(|err| QuireError::Pdf(format!("cannot read page object {page_id:?}: {err}")))?;
    let cloned = clone_object(source, target, page_object)?;
    Ok(target.add_object(cloned))
}

/// Deep-clone a single lopdf object, recursively resolving references.
/// /Parent is deliberately skipped: the caller re-parents cloned pages.
fn clone_object(source: &Document, target: &mut Document, object: &Object) -> Result<Object> {
    clone_object_bounded(source, target, object, MAX_CLONE_DEPTH)
}

fn clone_object_bounded(
    source: &Document,
    target: &mut Document,
    object: &Object,
    depth: usize,
) -> Result<Object> {
    if depth == 0 {
        warn!("object graph too deep, truncating with Null");
        return Ok(Object::Null);
    }
    match object {
        Object::Dictionary(dict) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned = clone_object_bounded(source, target, value, depth - 1)?;
                new_dict.set(key.clone(), cloned);
            }
            Ok(Object::Dictionary(new_dict))
        }
        Object::Array(values) => {
            let mut new_values = Vec::with_capacity(values.len());
            for value in values {
                new_values.push(clone_object_bounded(source, target, value, depth - 1)?);
            }
            Ok(Object::Array(new_values))
        }
        Object::Reference(ref_id) => match source.get_object(*ref_id) {
            Ok(referenced) => {
                let cloned = clone_object_bounded(source, target, referenced, depth - 1)?;
                Ok(Object::Reference(target.add_object(cloned)))
            }
            Err(err) => {
                warn!(?ref_id, %err, "cannot resolve reference, using Null");
                Ok(Object::Null)
            }
        },
        Object::Stream(stream) => {
            let mut new_dict = Dictionary::new();
            for (key, value) in stream.dict.iter() {
                if key == b"Parent" {
                    continue;
                }
                let cloned = clone_object_bounded(source, target, value, depth - 1)?;
                new_dict.set(key.clone(), cloned);
            }
            Ok(Object::Stream(Stream::new(new_dict, stream.content.clone())))
        }
        other => Ok(other.clone()),
    }
}

// ---------------------------------------------------------------------------
// Content-stream and resource plumbing
// ---------------------------------------------------------------------------

fn add_content_stream(output: &mut Document, bytes: Vec<u8>) -> ObjectId {
    output.add_object(Object::Stream(Stream::new(Dictionary::new(), bytes)))
}

fn page_contents(output: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = output
        .get_object(page_id)
        .map_err(|err| QuireError::Pdf(format!("cannot read page {page_id:?}: {err}")))?;
    let Object::Dictionary(dict) = page else {
        return Err(QuireError::Pdf("page object is not a dictionary".to_string()));
    };
    Ok(match dict.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(values)) => values.clone(),
        _ => Vec::new(),
    })
}

fn set_page_contents(output: &mut Document, page_id: ObjectId, contents: Vec<Object>) {
    if let Ok(Object::Dictionary(dict)) = output.get_object_mut(page_id) {
        dict.set("Contents", Object::Array(contents));
    }
}

fn prepend_page_content(output: &mut Document, page_id: ObjectId, bytes: Vec<u8>) -> Result<()> {
    let stream_id = add_content_stream(output, bytes);
    let mut contents = page_contents(output, page_id)?;
    contents.insert(0, Object::Reference(stream_id));
    set_page_contents(output, page_id, contents);
    Ok(())
}

fn append_page_content(output: &mut Document, page_id: ObjectId, bytes: Vec<u8>) -> Result<()> {
    let stream_id = add_content_stream(output, bytes);
    let mut contents = page_contents(output, page_id)?;
    contents.push(Object::Reference(stream_id));
    set_page_contents(output, page_id, contents);
    Ok(())
}

fn wrap_page_content(
    output: &mut Document,
    page_id: ObjectId,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
) -> Result<()> {
    let prefix_id = add_content_stream(output, prefix);
    let suffix_id = add_content_stream(output, suffix);
    let mut contents = page_contents(output, page_id)?;
    contents.insert(0, Object::Reference(prefix_id));
    contents.push(Object::Reference(suffix_id));
    set_page_contents(output, page_id, contents);
    Ok(())
}

/// Register a Form XObject under `name` in the page's resource dictionary,
/// creating /Resources or /XObject entries as needed.
fn register_xobject(
    output: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobj_id: ObjectId,
) -> Result<()> {
    // Normalize /Resources to an indirect dictionary we can mutate.
    let resources_entry = match output.get_object(page_id) {
        Ok(Object::Dictionary(dict)) => dict.get(b"Resources").ok().cloned(),
        _ => return Err(QuireError::Pdf("page object is not a dictionary".to_string())),
    };
    let resources_id = match resources_entry {
        Some(Object::Reference(id)) => id,
        Some(Object::Dictionary(dict)) => {
            let id = output.add_object(Object::Dictionary(dict));
            if let Ok(Object::Dictionary(page_dict)) = output.get_object_mut(page_id) {
                page_dict.set("Resources", Object::Reference(id));
            }
            id
        }
        _ => {
            let id = output.add_object(Object::Dictionary(Dictionary::new()));
            if let Ok(Object::Dictionary(page_dict)) = output.get_object_mut(page_id) {
                page_dict.set("Resources", Object::Reference(id));
            }
            id
        }
    };

    let xobjects_entry = match output.get_object(resources_id) {
        Ok(Object::Dictionary(dict)) => dict.get(b"XObject").ok().cloned(),
        _ => None,
    };
    match xobjects_entry {
        Some(Object::Reference(id)) => {
            if let Ok(Object::Dictionary(dict)) = output.get_object_mut(id) {
                dict.set(name, Object::Reference(xobj_id));
            }
        }
        Some(Object::Dictionary(mut dict)) => {
            dict.set(name, Object::Reference(xobj_id));
            if let Ok(Object::Dictionary(resources)) = output.get_object_mut(resources_id) {
                resources.set("XObject", Object::Dictionary(dict));
            }
        }
        _ => {
            let xobjects = Dictionary::from_iter([(name, Object::Reference(xobj_id))]);
            if let Ok(Object::Dictionary(resources)) = output.get_object_mut(resources_id) {
                resources.set("XObject", Object::Dictionary(xobjects));
            }
        }
    }
    Ok(())
}
