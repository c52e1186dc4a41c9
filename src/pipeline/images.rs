//! Raster images → PDF, one image per A4 page.
//!
//! JPEGs in gray or RGB are embedded as-is with `DCTDecode`; everything else
//! is decoded and stored as 8-bit RGB. An alpha channel becomes a separate
//! gray `SMask` image.

use crate::error::{EngineFailure, PageSmithError, SerializeError};
use crate::pipeline::input::InputFile;
use image::{ColorType, DynamicImage, GenericImageView};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, info};

/// A4 in points, portrait.
const A4: (f32, f32) = (595.0, 842.0);
const MARGIN: f32 = 36.0;

/// Build a PDF with one page per image, in input order.
pub fn images_to_pdf(images: &[InputFile], compress: bool) -> Result<Vec<u8>, PageSmithError> {
    if images.is_empty() {
        return Err(SerializeError::EmptyDocument.into());
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(images.len());

    for file in images {
        let decoded = image::load_from_memory(&file.bytes)
            .map_err(|e| EngineFailure::new("decode image", format!("{}: {e}", file.name)))?;
        let (width, height) = decoded.dimensions();
        let xobject = image_xobject(&mut doc, file, &decoded)?;
        let image_id = doc.add_object(xobject);

        let (page_w, page_h) = if width > height { (A4.1, A4.0) } else { A4 };
        let placement = fit(width as f32, height as f32, page_w, page_h);
        debug!(
            "Placing '{}' ({}x{} px) at {:.1}x{:.1} pt",
            file.name, width, height, placement.2, placement.3
        );

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        placement.2.into(),
                        Object::Integer(0),
                        Object::Integer(0),
                        placement.3.into(),
                        placement.0.into(),
                        placement.1.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| EngineFailure::new("encode content", e))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", image_id);
        let mut resources = Dictionary::new();
        resources.set("XObject", xobjects);

        let mut page = Dictionary::new();
        page.set("Type", "Page");
        page.set("Parent", pages_id);
        page.set(
            "MediaBox",
            vec![
                Object::Integer(0),
                Object::Integer(0),
                page_w.into(),
                page_h.into(),
            ],
        );
        page.set("Resources", resources);
        page.set("Contents", content_id);
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages = Dictionary::new();
    pages.set("Type", "Pages");
    pages.set("Count", kids.len() as i64);
    pages.set("Kids", kids);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", "Catalog");
    catalog.set("Pages", pages_id);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    if compress {
        doc.compress();
    }
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| EngineFailure::new("save", e))?;
    info!("Built {}-page PDF from images", images.len());
    Ok(buffer)
}

/// Image XObject for one input, with its soft mask added to `doc` if needed.
fn image_xobject(
    doc: &mut Document,
    file: &InputFile,
    decoded: &DynamicImage,
) -> Result<Stream, EngineFailure> {
    let (width, height) = decoded.dimensions();
    let color = decoded.color();

    let mut dict = Dictionary::new();
    dict.set("Type", "XObject");
    dict.set("Subtype", "Image");
    dict.set("Width", i64::from(width));
    dict.set("Height", i64::from(height));
    dict.set("BitsPerComponent", 8i64);

    let passthrough_jpeg =
        file.mime == "image/jpeg" && matches!(color, ColorType::L8 | ColorType::Rgb8);
    if passthrough_jpeg {
        let space = if color == ColorType::L8 { "DeviceGray" } else { "DeviceRGB" };
        dict.set("ColorSpace", space);
        dict.set("Filter", "DCTDecode");
        return Ok(Stream::new(dict, file.bytes.clone()).with_compression(false));
    }

    dict.set("ColorSpace", "DeviceRGB");
    if color.has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p.0[3]).collect();
        let mut mask = Dictionary::new();
        mask.set("Type", "XObject");
        mask.set("Subtype", "Image");
        mask.set("Width", i64::from(width));
        mask.set("Height", i64::from(height));
        mask.set("ColorSpace", "DeviceGray");
        mask.set("BitsPerComponent", 8i64);
        let mask_id = doc.add_object(Stream::new(mask, alpha));
        dict.set("SMask", mask_id);
    }
    Ok(Stream::new(dict, decoded.to_rgb8().into_raw()))
}

/// `(x, y, w, h)` of an image centred in the page's content box, scaled down
/// (never up) to fit.
fn fit(img_w: f32, img_h: f32, page_w: f32, page_h: f32) -> (f32, f32, f32, f32) {
    let box_w = page_w - 2.0 * MARGIN;
    let box_h = page_h - 2.0 * MARGIN;
    let scale = (box_w / img_w).min(box_h / img_h).min(1.0);
    let (w, h) = (img_w * scale, img_h * scale);
    ((page_w - w) / 2.0, (page_h - h) / 2.0, w, h)
}
