//! The page-set editor.
//!
//! A [`PageSet`] is the editable state of one session: an ordered list of
//! [`PageDescriptor`]s, each pointing back at a page of a source document.
//! Edits never touch the source; they only reorder, flag or annotate
//! descriptors. The serializer reads the result.
//!
//! ```text
//!  position:        1        2        3
//!  descriptor:   (0,#2)   (0,#0)   (0,#1)     (source, original_index)
//!  rotation:       90        0        0
//!  deleted:      false     true    false
//! ```

use crate::error::PageSmithError;
use crate::pipeline::load::DocumentHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Opaque, stable page identifier. Unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One page of the page-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    pub id: PageId,
    /// 1-based display position.
    pub page_number: usize,
    /// Which source document (0 unless merging).
    pub source: usize,
    /// 0-based index into the source's page array. Never changes.
    pub original_index: usize,
    /// Clockwise degrees added on top of the page's own `/Rotate`.
    pub rotation: u16,
    pub deleted: bool,
}

impl PageDescriptor {
    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// Reference to a page in an edit request: an id, or a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Position(usize),
    Id(PageId),
}

/// A single user edit, as received over the wire.
///
/// ```json
/// {"type": "reorder", "from": 0, "to": 2}
/// {"type": "delete", "page": 3}
/// {"type": "rotate", "page": "6b1c…", "degrees": 90}
/// {"type": "reset"}
/// ```
///
/// `from`/`to` are 0-based indices into the current order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum EditAction {
    Reorder { from: usize, to: usize },
    Delete { page: PageRef },
    Rotate { page: PageRef, degrees: i32 },
    Reset,
}

/// Ordered collection of page descriptors for one editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSet {
    pages: Vec<PageDescriptor>,
}

impl PageSet {
    /// One descriptor per page of a single source document.
    pub fn new(page_count: usize) -> Self {
        Self::from_sources(&[page_count])
    }

    /// Descriptors for several sources, concatenated in source order.
    pub fn from_sources(page_counts: &[usize]) -> Self {
        let pages = page_counts
            .iter()
            .enumerate()
            .flat_map(|(source, &count)| {
                (0..count).map(move |original_index| PageDescriptor {
                    id: PageId::generate(),
                    page_number: 0,
                    source,
                    original_index,
                    rotation: 0,
                    deleted: false,
                })
            })
            .collect();
        let mut set = Self { pages };
        set.renumber();
        set
    }

    pub fn from_handles(handles: &[DocumentHandle]) -> Self {
        let counts: Vec<usize> = handles.iter().map(DocumentHandle::page_count).collect();
        Self::from_sources(&counts)
    }

    pub fn pages(&self) -> &[PageDescriptor] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Non-deleted pages in current order.
    pub fn live_pages(&self) -> impl Iterator<Item = &PageDescriptor> {
        self.pages.iter().filter(|p| p.is_live())
    }

    pub fn live_count(&self) -> usize {
        self.live_pages().count()
    }

    pub fn get(&self, id: &PageId) -> Option<&PageDescriptor> {
        self.pages.iter().find(|p| &p.id == id)
    }

    fn find_mut(&mut self, id: &PageId) -> Option<&mut PageDescriptor> {
        self.pages.iter_mut().find(|p| &p.id == id)
    }

    /// Flip the soft-delete flag. Returns `false` if the id is unknown.
    pub fn toggle_delete(&mut self, id: &PageId) -> bool {
        match self.find_mut(id) {
            Some(page) => {
                page.deleted = !page.deleted;
                debug!(page = %id, deleted = page.deleted, "toggled delete");
                true
            }
            None => false,
        }
    }

    /// Add `delta` degrees to a page's rotation.
    ///
    /// Returns `Ok(false)` if the id is unknown.
    pub fn rotate(&mut self, id: &PageId, delta: i32) -> Result<bool, PageSmithError> {
        if delta % 90 != 0 {
            return Err(PageSmithError::InvalidEdit(format!(
                "rotation must be a multiple of 90 degrees, got {delta}"
            )));
        }
        let Some(page) = self.find_mut(id) else {
            return Ok(false);
        };
        page.rotation = (i32::from(page.rotation) + delta.rem_euclid(360)).rem_euclid(360) as u16;
        debug!(page = %id, rotation = page.rotation, "rotated");
        Ok(true)
    }

    /// Move the page at index `from` so it ends up at index `to`.
    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), PageSmithError> {
        let total = self.pages.len();
        for idx in [from, to] {
            if idx >= total {
                return Err(PageSmithError::PageOutOfRange {
                    page: idx + 1,
                    total,
                });
            }
        }
        if from == to {
            return Ok(());
        }
        let page = self.pages.remove(from);
        self.pages.insert(to, page);
        self.renumber();
        Ok(())
    }

    /// Undo every edit: original order, no rotation, nothing deleted.
    pub fn reset(&mut self) {
        self.pages
            .sort_by_key(|p| (p.source, p.original_index));
        for page in &mut self.pages {
            page.rotation = 0;
            page.deleted = false;
        }
        self.renumber();
    }

    /// Resolve a [`PageRef`] to the page's id.
    ///
    /// Positions must be in range; unknown ids resolve to `None`.
    pub fn resolve(&self, page: &PageRef) -> Result<Option<PageId>, PageSmithError> {
        match page {
            PageRef::Id(id) => Ok(self.get(id).map(|p| p.id.clone())),
            PageRef::Position(pos) => {
                if *pos == 0 || *pos > self.pages.len() {
                    return Err(PageSmithError::PageOutOfRange {
                        page: *pos,
                        total: self.pages.len(),
                    });
                }
                Ok(Some(self.pages[pos - 1].id.clone()))
            }
        }
    }

    /// Apply one edit. Returns whether the page-set was touched.
    pub fn apply(&mut self, action: &EditAction) -> Result<bool, PageSmithError> {
        match action {
            EditAction::Reorder { from, to } => {
                self.move_page(*from, *to)?;
                Ok(from != to)
            }
            EditAction::Delete { page } => Ok(match self.resolve(page)? {
                Some(id) => self.toggle_delete(&id),
                None => false,
            }),
            EditAction::Rotate { page, degrees } => match self.resolve(page)? {
                Some(id) => self.rotate(&id, *degrees),
                None => Ok(false),
            },
            EditAction::Reset => {
                self.reset();
                Ok(true)
            }
        }
    }

    /// Apply a sequence of edits, stopping at the first invalid one.
    pub fn apply_all(&mut self, actions: &[EditAction]) -> Result<(), PageSmithError> {
        for action in actions {
            self.apply(action)?;
        }
        Ok(())
    }

    fn renumber(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.page_number = i + 1;
        }
    }
}
