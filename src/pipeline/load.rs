//! Document loading: bytes → [`DocumentHandle`].
//!
//! The header check runs before `lopdf` sees the bytes, so an upload that is
//! obviously not a PDF never costs a full parse. Everything after the header
//! is parsed eagerly; a handle that exists is a handle that can be serialized.

use crate::error::{PageSmithError, ParseError};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

/// Every PDF starts with these five bytes.
pub const PDF_MAGIC: &[u8; 5] = b"%PDF-";

/// Page-tree inheritance is shallow in practice; this bounds malformed cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Default page size when neither the page nor its ancestors carry a MediaBox.
const US_LETTER: (f32, f32) = (612.0, 792.0);

/// A parsed source document plus the facts the editor and serializer need.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    name: String,
    byte_len: usize,
    doc: Document,
    page_ids: Vec<ObjectId>,
}

/// Reject anything that does not start with `%PDF-`.
pub fn check_header(bytes: &[u8]) -> Result<(), ParseError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(ParseError::InvalidHeader {
            found: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}

/// Parse `bytes` into a [`DocumentHandle`].
pub fn load(bytes: &[u8], name: &str) -> Result<DocumentHandle, ParseError> {
    check_header(bytes)?;

    let doc = Document::load_mem(bytes).map_err(|e| {
        let detail = e.to_string();
        let lower = detail.to_lowercase();
        if lower.contains("password") || lower.contains("decrypt") || lower.contains("encrypt") {
            ParseError::Encrypted
        } else {
            warn!("'{}' failed to parse: {}", name, detail);
            ParseError::CorruptDocument { detail }
        }
    })?;

    if doc.is_encrypted() {
        return Err(ParseError::Encrypted);
    }

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(ParseError::CorruptDocument {
            detail: "document has no pages".into(),
        });
    }

    debug!(
        "Loaded '{}': {} pages, {} objects, PDF {}",
        name,
        page_ids.len(),
        doc.objects.len(),
        doc.version
    );

    Ok(DocumentHandle {
        name: name.to_string(),
        byte_len: bytes.len(),
        doc,
        page_ids,
    })
}

impl DocumentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the source file in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Page object ids in document order.
    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    /// The underlying `lopdf` document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, PageSmithError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PageSmithError::PageOutOfRange {
                page: index + 1,
                total: self.page_ids.len(),
            })
    }

    /// Effective `/Rotate` of the page at `index` (0-based), normalised to
    /// 0, 90, 180 or 270.
    pub fn page_rotation(&self, index: usize) -> Result<u16, PageSmithError> {
        let id = self.page_id(index)?;
        let raw = inherited_attribute(&self.doc, id, b"Rotate")
            .and_then(|o| resolve(&self.doc, o).as_i64().ok())
            .unwrap_or(0);
        Ok(normalize_rotation(raw))
    }

    /// Width and height in points of the page at `index`, from its effective
    /// MediaBox. Rotation is not applied.
    pub fn page_size(&self, index: usize) -> Result<(f32, f32), PageSmithError> {
        let id = self.page_id(index)?;
        let size = inherited_attribute(&self.doc, id, b"MediaBox")
            .and_then(|o| rect_size(resolve(&self.doc, o)))
            .unwrap_or(US_LETTER);
        Ok(size)
    }
}

/// Look up `key` on a page, walking `/Parent` links for inheritable entries.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Follow one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn normalize_rotation(raw: i64) -> u16 {
    (raw.rem_euclid(360) / 90 * 90) as u16
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn rect_size(obj: &Object) -> Option<(f32, f32)> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let v: Vec<f32> = arr.iter().filter_map(number).collect();
    if v.len() != 4 {
        return None;
    }
    Some(((v[2] - v[0]).abs(), (v[3] - v[1]).abs()))
}
