//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use pagesmith::pipeline::load::load;

/// An `n`-page PDF whose page `i` has MediaBox width `base + i` and
/// rotation `rotate` on the page tree root.
pub fn pdf(n: usize, base: i64, rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(n);
    for i in 0..n {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(24)]),
                Operation::new("Td", vec![Object::Integer(40), Object::Integer(400)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("page {}", i + 1).into_bytes(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(base + i as i64),
                Object::Integer(792),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(n as i64),
    };
    if let Some(deg) = rotate {
        pages.set("Rotate", Object::Integer(deg));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save fixture");
    out
}

/// MediaBox widths, in page order.
pub fn widths(bytes: &[u8]) -> Vec<f32> {
    let handle = load(bytes, "out.pdf").expect("output parses");
    (0..handle.page_count())
        .map(|i| handle.page_size(i).expect("page size").0)
        .collect()
}

/// Effective rotations, in page order.
pub fn rotations(bytes: &[u8]) -> Vec<u16> {
    let handle = load(bytes, "out.pdf").expect("output parses");
    (0..handle.page_count())
        .map(|i| handle.page_rotation(i).expect("rotation"))
        .collect()
}

/// A solid-colour PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode png");
    out
}
