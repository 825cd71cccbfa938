//! Signed preview rendering.
//!
//! The signature is drawn on the last page of the source PDF, 300 points
//! from the right edge and 50 points from the bottom, inside a 150×50 box.
//! Existing page content is wrapped in `q`/`Q` so its graphics state cannot
//! leak into the overlay.

use std::io::Write;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use crate::service::{Error, Result};

/// Tracing target for preview rendering.
const TRACING_TARGET: &str = "esign_server::service::preview";

/// Distance of the overlay from the right edge of the page.
const RIGHT_OFFSET: f32 = 300.0;
/// Distance of the overlay from the bottom edge of the page.
const BOTTOM_OFFSET: f32 = 50.0;
/// Width of a drawn signature on the page.
const IMAGE_WIDTH: f32 = 150.0;
/// Height of a drawn signature on the page.
const IMAGE_HEIGHT: f32 = 50.0;
/// Font size of a typed signature.
const FONT_SIZE: f32 = 24.0;

/// Resource name of the typed signature font.
const FONT_NAME: &[u8] = b"EsignHelvetica";
/// Resource name of the drawn signature image.
const IMAGE_NAME: &[u8] = b"EsignSignature";

/// Page size used when the page tree carries no MediaBox (US Letter).
const FALLBACK_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Upper bound on the page tree depth walked for inherited attributes.
const MAX_TREE_DEPTH: usize = 32;

/// The signature drawn onto a preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOverlay {
    /// PNG bytes of a drawn signature.
    Drawn(Vec<u8>),
    /// Typed signature text.
    Typed(String),
}

impl SignatureOverlay {
    /// Returns a short label for logs and messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Drawn(_) => "drawn",
            Self::Typed(_) => "typed",
        }
    }
}

/// A rendered preview.
#[derive(Debug, Clone)]
pub struct RenderedPreview {
    /// Serialized PDF.
    pub bytes: Vec<u8>,
    /// Number of pages, identical to the source.
    pub page_count: usize,
}

/// Draws signatures onto PDF documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewRenderer;

impl PreviewRenderer {
    /// Creates a new renderer.
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Renders `source` with `overlay` into `output`, replacing any
    /// existing file. Parsing and writing run on the blocking thread pool.
    pub async fn render(
        &self,
        source: PathBuf,
        overlay: SignatureOverlay,
        output: PathBuf,
    ) -> Result<usize> {
        let pdf = tokio::fs::read(&source).await.map_err(|e| {
            Error::file_system(format!("Failed to read {}", source.display())).with_source(e)
        })?;

        let renderer = *self;
        let preview =
            tokio::task::spawn_blocking(move || renderer.render_pdf(&pdf, &overlay)).await??;

        tokio::fs::write(&output, &preview.bytes).await.map_err(|e| {
            Error::file_system(format!("Failed to write {}", output.display())).with_source(e)
        })?;

        tracing::debug!(
            target: TRACING_TARGET,
            source = %source.display(),
            output = %output.display(),
            page_count = preview.page_count,
            "Preview written"
        );

        Ok(preview.page_count)
    }

    /// Draws `overlay` on the last page of an in-memory PDF.
    pub fn render_pdf(&self, pdf: &[u8], overlay: &SignatureOverlay) -> Result<RenderedPreview> {
        let mut doc = Document::load_mem(pdf)?;
        let pages = doc.get_pages();
        let page_count = pages.len();
        let page_id = *pages
            .values()
            .next_back()
            .ok_or_else(|| Error::render("PDF has no pages"))?;

        let (x, y) = overlay_origin(media_box(&doc, page_id)?);

        let mut resources = inherited_dictionary(&doc, page_id, b"Resources")?;
        let operations = match overlay {
            SignatureOverlay::Typed(text) => {
                let font_id = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                let mut fonts = resource_category(&doc, &resources, b"Font")?;
                fonts.set(FONT_NAME, Object::Reference(font_id));
                resources.set("Font", Object::Dictionary(fonts));

                text_operations(text, x, y)
            }
            SignatureOverlay::Drawn(png) => {
                let image_id = add_image(&mut doc, png)?;
                let mut xobjects = resource_category(&doc, &resources, b"XObject")?;
                xobjects.set(IMAGE_NAME, Object::Reference(image_id));
                resources.set("XObject", Object::Dictionary(xobjects));

                image_operations(x, y)
            }
        };

        let save_id = add_content(&mut doc, vec![Operation::new("q", vec![])])?;
        let mut overlay_ops = vec![Operation::new("Q", vec![])];
        overlay_ops.extend(operations);
        let overlay_id = add_content(&mut doc, overlay_ops)?;

        let existing = existing_contents(&doc, page_id)?;
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        contents.push(Object::Reference(overlay_id));

        page.set("Contents", Object::Array(contents));
        page.set("Resources", Object::Dictionary(resources));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| Error::render("Failed to serialize preview").with_source(e))?;

        Ok(RenderedPreview { bytes, page_count })
    }
}

/// Places the overlay `RIGHT_OFFSET` points left of the page width and
/// `BOTTOM_OFFSET` points up, measured from the user-space origin.
///
/// Only the MediaBox width is used; its origin offset is not added.
fn overlay_origin([x0, _, x1, _]: [f32; 4]) -> (f32, f32) {
    ((x1 - x0) - RIGHT_OFFSET, BOTTOM_OFFSET)
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn text_operations(text: &str, x: f32, y: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]),
        Operation::new("Tf", vec![Object::Name(FONT_NAME.to_vec()), real(FONT_SIZE)]),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new(
            "Tj",
            vec![Object::String(latin1(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

fn image_operations(x: f32, y: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(IMAGE_WIDTH),
                real(0.0),
                real(0.0),
                real(IMAGE_HEIGHT),
                real(x),
                real(y),
            ],
        ),
        Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Encodes text for a WinAnsi Type1 font, replacing characters outside
/// Latin-1 and control characters with `?`.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u8::try_from(u32::from(c)) {
            Ok(byte) if !c.is_control() => byte,
            _ => b'?',
        })
        .collect()
}

fn add_content(doc: &mut Document, operations: Vec<Operation>) -> Result<ObjectId> {
    let content = Content { operations }.encode()?;
    Ok(doc.add_object(Stream::new(dictionary! {}, content)))
}

/// Adds a PNG as an RGB image XObject with its alpha channel as soft mask.
fn add_image(doc: &mut Document, png: &[u8]) -> Result<ObjectId> {
    let image = image::load_from_memory(png)
        .map_err(|e| Error::render("Signature image cannot be decoded").with_source(e))?
        .to_rgba8();
    let (width, height) = image.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&alpha)?,
    ));

    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "SMask" => Object::Reference(smask_id),
        },
        deflate(&rgb)?,
    )))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::render("Failed to compress image data").with_source(e))?;
    encoder
        .finish()
        .map_err(|e| Error::render("Failed to compress image data").with_source(e))
}

fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> Result<&'a Object> {
    for _ in 0..MAX_TREE_DEPTH {
        match object {
            Object::Reference(id) => object = doc.get_object(*id)?,
            _ => return Ok(object),
        }
    }

    Err(Error::render("Reference chain is too deep"))
}

/// Looks up a page attribute, walking up the page tree when the page does
/// not define it itself.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut node = doc.get_object(page_id)?.as_dict()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value).map(Some);
        }

        match node.get(b"Parent") {
            Ok(parent) => node = resolve(doc, parent)?.as_dict()?,
            Err(_) => return Ok(None),
        }
    }

    Ok(None)
}

fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4]> {
    let Some(object) = inherited(doc, page_id, b"MediaBox")? else {
        tracing::debug!(target: TRACING_TARGET, "Page has no MediaBox, assuming US Letter");
        return Ok(FALLBACK_MEDIA_BOX);
    };

    let values = object.as_array()?;
    if values.len() != 4 {
        return Err(Error::render("MediaBox must have four entries"));
    }

    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = match resolve(doc, value)? {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r as f32,
            _ => return Err(Error::render("MediaBox entries must be numbers")),
        };
    }

    Ok(rect)
}

/// Returns an owned copy of an inherited dictionary attribute, or an empty
/// dictionary when it is absent.
fn inherited_dictionary(doc: &Document, page_id: ObjectId, key: &[u8]) -> Result<Dictionary> {
    match inherited(doc, page_id, key)? {
        Some(object) => Ok(object.as_dict()?.clone()),
        None => Ok(Dictionary::new()),
    }
}

fn resource_category(doc: &Document, resources: &Dictionary, key: &[u8]) -> Result<Dictionary> {
    match resources.get(key) {
        Ok(object) => Ok(resolve(doc, object)?.as_dict()?.clone()),
        Err(_) => Ok(Dictionary::new()),
    }
}

/// Returns the page content streams as a list of objects.
fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc.get_object(page_id)?.as_dict()?;

    let contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        Ok(_) | Err(_) => Vec::new(),
    };

    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a PDF whose MediaBox and Resources live on the page tree root.
    fn sample_pdf(page_count: usize) -> anyhow::Result<Vec<u8>> {
        sample_pdf_with_media_box(page_count, [0, 0, 595, 842])
    }

    fn sample_pdf_with_media_box(
        page_count: usize,
        media_box: [i64; 4],
    ) -> anyhow::Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        });

        let mut kids = Vec::new();
        for n in 0..page_count {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), real(12.0)]),
                    Operation::new("Td", vec![real(50.0), real(700.0)]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {n}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(kids),
            "Count" => Object::Integer(page_count as i64),
            "Resources" => Object::Reference(resources_id),
            "MediaBox" => Object::Array(media_box.into_iter().map(Object::Integer).collect()),
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    fn last_page(doc: &Document) -> anyhow::Result<&Dictionary> {
        let page_id = *doc
            .get_pages()
            .values()
            .next_back()
            .ok_or_else(|| anyhow::anyhow!("no pages"))?;
        Ok(doc.get_object(page_id)?.as_dict()?)
    }

    fn overlay_content(doc: &Document) -> anyhow::Result<Vec<u8>> {
        let contents = last_page(doc)?.get(b"Contents")?.as_array()?;
        let overlay_id = contents
            .last()
            .ok_or_else(|| anyhow::anyhow!("no contents"))?
            .as_reference()?;
        Ok(doc.get_object(overlay_id)?.as_stream()?.content.clone())
    }

    fn png() -> anyhow::Result<Vec<u8>> {
        let image = image::RgbaImage::from_pixel(3, 3, image::Rgba([0, 0, 255, 128]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image).write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )?;
        Ok(bytes)
    }

    #[test]
    fn typed_preview_keeps_page_count() -> anyhow::Result<()> {
        let overlay = SignatureOverlay::Typed("Jane Doe".to_owned());
        let preview = PreviewRenderer::new().render_pdf(&sample_pdf(3)?, &overlay)?;

        assert_eq!(preview.page_count, 3);

        let doc = Document::load_mem(&preview.bytes)?;
        assert_eq!(doc.get_pages().len(), 3);

        let content = String::from_utf8_lossy(&overlay_content(&doc)?).into_owned();
        assert!(content.contains("(Jane Doe)"), "{content}");
        assert!(content.contains("/EsignHelvetica"), "{content}");
        assert!(content.contains("Tj"), "{content}");
        Ok(())
    }

    #[test]
    fn typed_preview_keeps_inherited_resources() -> anyhow::Result<()> {
        let overlay = SignatureOverlay::Typed("Jane Doe".to_owned());
        let preview = PreviewRenderer::new().render_pdf(&sample_pdf(1)?, &overlay)?;
        let doc = Document::load_mem(&preview.bytes)?;

        let resources = last_page(&doc)?.get(b"Resources")?.as_dict()?;
        let fonts = resources.get(b"Font")?.as_dict()?;
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(FONT_NAME));
        Ok(())
    }

    #[test]
    fn drawn_preview_adds_image_with_soft_mask() -> anyhow::Result<()> {
        let overlay = SignatureOverlay::Drawn(png()?);
        let preview = PreviewRenderer::new().render_pdf(&sample_pdf(2)?, &overlay)?;
        let doc = Document::load_mem(&preview.bytes)?;

        assert_eq!(doc.get_pages().len(), 2);

        let resources = last_page(&doc)?.get(b"Resources")?.as_dict()?;
        let image_id = resources
            .get(b"XObject")?
            .as_dict()?
            .get(IMAGE_NAME)?
            .as_reference()?;
        let image = doc.get_object(image_id)?.as_stream()?;
        assert!(image.dict.has(b"SMask"));

        let content = String::from_utf8_lossy(&overlay_content(&doc)?).into_owned();
        assert!(content.contains("/EsignSignature"), "{content}");
        assert!(content.contains("Do"), "{content}");
        Ok(())
    }

    #[test]
    fn original_content_is_wrapped() -> anyhow::Result<()> {
        let overlay = SignatureOverlay::Typed("J".to_owned());
        let preview = PreviewRenderer::new().render_pdf(&sample_pdf(1)?, &overlay)?;
        let doc = Document::load_mem(&preview.bytes)?;

        let contents = last_page(&doc)?.get(b"Contents")?.as_array()?;
        assert_eq!(contents.len(), 3);
        Ok(())
    }

    #[test]
    fn non_latin1_characters_are_replaced() {
        assert_eq!(latin1("Zoë 王"), b"Zo\xeb ?".to_vec());
        assert_eq!(latin1("a\u{0085}b"), b"a?b".to_vec());
    }

    #[test]
    fn invalid_pdf_is_a_render_error() {
        let overlay = SignatureOverlay::Typed("Jane".to_owned());
        let error = PreviewRenderer::new()
            .render_pdf(b"not a pdf", &overlay)
            .expect_err("input is not a PDF");

        assert_eq!(error.kind(), crate::ErrorKind::Render);
    }

    #[tokio::test]
    async fn render_writes_output_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = dir.path().join("source.pdf");
        let output = dir.path().join("preview.pdf");
        tokio::fs::write(&source, sample_pdf(2)?).await?;

        let overlay = SignatureOverlay::Typed("Jane Doe".to_owned());
        let page_count = PreviewRenderer::new()
            .render(source, overlay, output.clone())
            .await?;

        assert_eq!(page_count, 2);
        let doc = Document::load(&output)?;
        assert_eq!(doc.get_pages().len(), 2);
        Ok(())
    }

    #[test]
    fn overlay_position_uses_the_page_size() -> anyhow::Result<()> {
        let overlay = SignatureOverlay::Typed("Jane Doe".to_owned());
        let pdf = sample_pdf_with_media_box(1, [100, 0, 712, 792])?;
        let preview = PreviewRenderer::new().render_pdf(&pdf, &overlay)?;
        let doc = Document::load_mem(&preview.bytes)?;

        let content = Content::decode(&overlay_content(&doc)?)?;
        let td = content
            .operations
            .iter()
            .find(|op| op.operator == "Td")
            .ok_or_else(|| anyhow::anyhow!("no Td operator"))?;
        let position = td
            .operands
            .iter()
            .map(Object::as_float)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(position, [312.0, 50.0]);

        assert_eq!(overlay_origin([0.0, 0.0, 612.0, 792.0]), (312.0, 50.0));
        Ok(())
    }
}
