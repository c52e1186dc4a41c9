//! Document serialization: source handle(s) + edited page-set → PDF bytes.
//!
//! All three variants share one assembly routine:
//!
//! ```text
//!  sources ──▶ renumber into one id space ──▶ copy non-page objects
//!                                                   │
//!  live pages (current order) ──▶ clone page dicts ─┤ resolve inherited
//!                                                   │ Resources/MediaBox/
//!                                                   │ CropBox/Rotate
//!                                                   ▼
//!                          new /Pages root + catalog ──▶ prune ──▶ save
//! ```
//!
//! Outputs are all-or-nothing: a split whose third range fails returns an
//! error and none of the first two documents.

use crate::config::PageRange;
use crate::error::{EngineFailure, PageSmithError, SerializeError};
use crate::pipeline::edit::{PageDescriptor, PageSet};
use crate::pipeline::load::{inherited_attribute, normalize_rotation, resolve, DocumentHandle};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 3] = [b"Resources", b"MediaBox", b"CropBox"];

/// Catalog entries that point into the old page tree.
const CATALOG_DROP: [&[u8]; 4] = [b"Outlines", b"PageLabels", b"StructTreeRoot", b"OpenAction"];

/// Object types rebuilt for the output rather than copied.
const SKIPPED_TYPES: [&[u8]; 5] = [b"Catalog", b"Pages", b"Page", b"Outlines", b"Outline"];

/// Write the live pages of `pages` (all from `handle`) as a new PDF.
pub fn serialize(
    handle: &DocumentHandle,
    pages: &PageSet,
    compress: bool,
) -> Result<Vec<u8>, SerializeError> {
    assemble(std::slice::from_ref(handle), pages.live_pages(), compress)
}

/// Write the live pages of a merge session, drawing from several sources.
///
/// `original_index` is scoped per source, selected by each descriptor's
/// `source`.
pub fn serialize_merged(
    handles: &[DocumentHandle],
    pages: &PageSet,
    compress: bool,
) -> Result<Vec<u8>, SerializeError> {
    assemble(handles, pages.live_pages(), compress)
}

/// Split one page-set into several documents, one per range.
///
/// Ranges are 1-based and inclusive over `page_number`. They are validated
/// up front; deleted pages inside a range are skipped, and a range with no
/// live pages is an error.
pub fn split(
    handle: &DocumentHandle,
    pages: &PageSet,
    ranges: &[PageRange],
    compress: bool,
) -> Result<Vec<Vec<u8>>, PageSmithError> {
    if ranges.is_empty() {
        return Err(PageSmithError::InvalidConfig(
            "Split needs at least one range".into(),
        ));
    }
    for range in ranges {
        range.validate(pages.len())?;
    }

    let mut outputs = Vec::with_capacity(ranges.len());
    for range in ranges {
        let selected = pages
            .live_pages()
            .filter(|p| range.contains(p.page_number));
        let bytes = assemble(std::slice::from_ref(handle), selected, compress)?;
        debug!(range = %range, bytes = bytes.len(), "split part written");
        outputs.push(bytes);
    }
    info!("Split '{}' into {} documents", handle.name(), outputs.len());
    Ok(outputs)
}

/// Build and save an output document from the given pages, in order.
pub(crate) fn assemble<'a>(
    handles: &[DocumentHandle],
    pages: impl Iterator<Item = &'a PageDescriptor>,
    compress: bool,
) -> Result<Vec<u8>, SerializeError> {
    let pages: Vec<&PageDescriptor> = pages.filter(|p| p.is_live()).collect();
    if pages.is_empty() {
        return Err(SerializeError::EmptyDocument);
    }

    let used_sources: HashSet<usize> = pages.iter().map(|p| p.source).collect();
    let version = handles
        .first()
        .map(|h| h.document().version.clone())
        .unwrap_or_else(|| "1.7".to_string());
    let mut out = Document::with_version(version);

    // Bring every contributing source into one id space.
    let mut sources: BTreeMap<usize, (Document, Vec<ObjectId>)> = BTreeMap::new();
    for (index, handle) in handles.iter().enumerate() {
        if !used_sources.contains(&index) {
            continue;
        }
        let mut doc = handle.document().clone();
        doc.renumber_objects_with(out.max_id + 1);
        out.max_id = doc.objects.keys().map(|id| id.0).max().unwrap_or(out.max_id);
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

        for (id, object) in &doc.objects {
            if !is_skipped_type(object) {
                out.objects.insert(*id, object.clone());
            }
        }
        sources.insert(index, (doc, page_ids));
    }

    let pages_root = out.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());
    let mut placed: HashSet<ObjectId> = HashSet::new();

    for page in &pages {
        let (doc, page_ids) = sources.get(&page.source).ok_or_else(|| {
            EngineFailure::new("page lookup", format!("no source document #{}", page.source))
        })?;
        let source_id = *page_ids.get(page.original_index).ok_or_else(|| {
            EngineFailure::new(
                "page lookup",
                format!(
                    "source #{} has no page at index {}",
                    page.source, page.original_index
                ),
            )
        })?;

        let dict = flatten_page(doc, source_id, page.rotation, pages_root)?;
        let id = if placed.insert(source_id) {
            source_id
        } else {
            out.new_object_id()
        };
        out.objects.insert(id, Object::Dictionary(dict));
        kids.push(Object::Reference(id));
    }

    let count = kids.len() as i64;
    let mut root = Dictionary::new();
    root.set("Type", "Pages");
    root.set("Kids", kids);
    root.set("Count", count);
    out.objects.insert(pages_root, Object::Dictionary(root));

    let mut catalog = first_catalog(&sources)?;
    for key in CATALOG_DROP {
        catalog.remove(key);
    }
    catalog.set("Type", "Catalog");
    catalog.set("Pages", pages_root);
    let catalog_id = out.add_object(catalog);
    out.trailer.set("Root", catalog_id);

    if let Some(info) = sources
        .values()
        .next()
        .and_then(|(doc, _)| info_dictionary(doc))
    {
        let info_id = out.add_object(info);
        out.trailer.set("Info", info_id);
    }

    out.renumber_objects();
    let pruned = out.prune_objects();
    if compress {
        out.compress();
    }
    debug!(
        pages = count,
        objects = out.objects.len(),
        pruned = pruned.len(),
        "assembled output"
    );

    let mut buffer = Vec::new();
    out.save_to(&mut buffer)
        .map_err(|e| EngineFailure::new("save", e))?;
    Ok(buffer)
}

/// Clone a page dictionary with its inherited attributes made explicit and
/// the edit rotation folded into `/Rotate`.
fn flatten_page(
    doc: &Document,
    page_id: ObjectId,
    extra_rotation: u16,
    parent: ObjectId,
) -> Result<Dictionary, EngineFailure> {
    let mut dict = doc
        .get_dictionary(page_id)
        .map_err(|e| EngineFailure::new("read page", e))?
        .clone();

    for key in INHERITABLE {
        if dict.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(doc, page_id, key) {
            dict.set(key.to_vec(), value.clone());
        }
    }

    let existing = inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|o| resolve(doc, o).as_i64().ok())
        .unwrap_or(0);
    let rotation = normalize_rotation(existing + i64::from(extra_rotation));
    if rotation == 0 {
        dict.remove(b"Rotate");
    } else {
        dict.set("Rotate", i64::from(rotation));
    }

    dict.set("Parent", parent);
    Ok(dict)
}

fn is_skipped_type(object: &Object) -> bool {
    let Object::Dictionary(dict) = object else {
        return false;
    };
    match dict.get(b"Type") {
        Ok(Object::Name(name)) => SKIPPED_TYPES.contains(&name.as_slice()),
        _ => false,
    }
}

fn first_catalog(
    sources: &BTreeMap<usize, (Document, Vec<ObjectId>)>,
) -> Result<Dictionary, EngineFailure> {
    let (doc, _) = sources
        .values()
        .next()
        .ok_or_else(|| EngineFailure::new("read catalog", "no source documents"))?;
    doc.catalog()
        .map(Dictionary::clone)
        .map_err(|e| EngineFailure::new("read catalog", e))
}

fn info_dictionary(doc: &Document) -> Option<Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info).as_dict().ok().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::load::load;
    use crate::pipeline::test_support::{page_widths, pdf_with_pages, TestPdf};

    fn handle(n: usize) -> DocumentHandle {
        load(&pdf_with_pages(n), "test.pdf").unwrap()
    }

    fn reload(bytes: &[u8]) -> DocumentHandle {
        load(bytes, "out.pdf").unwrap()
    }

    #[test]
    fn untouched_set_keeps_every_page() {
        let h = handle(3);
        let set = PageSet::new(3);
        let out = reload(&serialize(&h, &set, true).unwrap());
        assert_eq!(page_widths(&out), vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn deleted_pages_are_dropped() {
        let h = handle(3);
        let mut set = PageSet::new(3);
        let id = set.pages()[1].id.clone();
        set.toggle_delete(&id);
        let out = reload(&serialize(&h, &set, true).unwrap());
        assert_eq!(page_widths(&out), vec![100.0, 102.0]);
    }

    #[test]
    fn all_deleted_is_rejected() {
        let h = handle(2);
        let mut set = PageSet::new(2);
        let ids: Vec<_> = set.pages().iter().map(|p| p.id.clone()).collect();
        for id in &ids {
            set.toggle_delete(id);
        }
        assert!(matches!(
            serialize(&h, &set, true),
            Err(SerializeError::EmptyDocument)
        ));
    }

    #[test]
    fn order_follows_page_set() {
        let h = handle(3);
        let mut set = PageSet::new(3);
        set.move_page(2, 0).unwrap();
        let out = reload(&serialize(&h, &set, false).unwrap());
        assert_eq!(page_widths(&out), vec![102.0, 100.0, 101.0]);
    }

    #[test]
    fn rotation_is_added_to_existing() {
        let bytes = TestPdf::new(2).page_rotation(0, 90).build();
        let h = load(&bytes, "r.pdf").unwrap();
        let mut set = PageSet::new(2);
        let first = set.pages()[0].id.clone();
        let second = set.pages()[1].id.clone();
        set.rotate(&first, 180).unwrap();
        set.rotate(&second, 90).unwrap();
        let out = reload(&serialize(&h, &set, true).unwrap());
        assert_eq!(out.page_rotation(0).unwrap(), 270);
        assert_eq!(out.page_rotation(1).unwrap(), 90);
    }

    #[test]
    fn inherited_attributes_survive() {
        let bytes = TestPdf::new(2)
            .inherited_rotation(90)
            .inherited_media_box(true)
            .inherited_resources(true)
            .build();
        let h = load(&bytes, "inherit.pdf").unwrap();
        let mut set = PageSet::new(2);
        set.move_page(1, 0).unwrap();
        let out = reload(&serialize(&h, &set, true).unwrap());
        assert_eq!(out.page_rotation(0).unwrap(), 90);
        assert_eq!(out.page_size(1).unwrap(), (595.0, 842.0));
        let doc = out.document();
        let page = doc.get_dictionary(out.page_ids()[0]).unwrap();
        assert!(page.has(b"Resources"));
    }

    #[test]
    fn merge_concatenates_sources() {
        let a = handle(2);
        let b = load(&TestPdf::new(3).width_base(200).build(), "b.pdf").unwrap();
        let handles = vec![a, b];
        let set = PageSet::from_handles(&handles);
        let out = reload(&serialize_merged(&handles, &set, true).unwrap());
        assert_eq!(
            page_widths(&out),
            vec![100.0, 101.0, 200.0, 201.0, 202.0]
        );
    }

    #[test]
    fn split_by_ranges() {
        let h = handle(5);
        let set = PageSet::new(5);
        let parts = split(
            &h,
            &set,
            &[PageRange::new(1, 2), PageRange::new(3, 5)],
            true,
        )
        .unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(page_widths(&reload(&parts[0])), vec![100.0, 101.0]);
        assert_eq!(page_widths(&reload(&parts[1])), vec![102.0, 103.0, 104.0]);
    }

    #[test]
    fn split_rejects_bad_range() {
        let h = handle(3);
        let set = PageSet::new(3);
        let err = split(&h, &set, &[PageRange::new(2, 7)], true).unwrap_err();
        assert!(matches!(err, PageSmithError::InvalidRange { .. }));
    }

    #[test]
    fn split_range_of_deleted_pages_fails_whole_split() {
        let h = handle(3);
        let mut set = PageSet::new(3);
        let id = set.pages()[2].id.clone();
        set.toggle_delete(&id);
        let err = split(
            &h,
            &set,
            &[PageRange::new(1, 2), PageRange::new(3, 3)],
            true,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PageSmithError::Serialize(SerializeError::EmptyDocument)
        ));
    }

    #[test]
    fn info_dictionary_is_carried_over() {
        let bytes = TestPdf::new(1).title("Quarterly").build();
        let h = load(&bytes, "t.pdf").unwrap();
        let out = reload(&serialize(&h, &PageSet::new(1), true).unwrap());
        let info = info_dictionary(out.document()).unwrap();
        assert_eq!(
            info.get(b"Title").unwrap().as_str().unwrap(),
            b"Quarterly"
        );
    }
}
