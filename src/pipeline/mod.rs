//! Pipeline stages for PDF tools.
//!
//! Each submodule implements exactly one transformation step. Every tool in
//! the catalog is a particular route through these stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ load ──▶ edit ──▶ serialize ──▶ bytes
//! (path/URL/   (lopdf)  (PageSet)  (merge/split/    │
//!  upload)                          rewrite)        │
//!                 │                                 │
//!                 ├──▶ metadata (Info dictionary) ──┤
//!                 └──▶ render (pdfium → PNG) ───────┘
//! images ─────────────▶ images (PNG/JPEG → PDF) ────┘
//! ```
//!
//! 1. [`input`]     — resolve a path, URL or upload to bytes and check it
//!    against the tool's allowlist and size ceiling
//! 2. [`load`]      — header check and `lopdf` parse into a `DocumentHandle`
//! 3. [`edit`]      — the `PageSet` editor: delete, rotate, move, reset
//! 4. [`serialize`] — write live pages in order, plus merge and split
//! 5. [`metadata`]  — read and patch the document information dictionary
//! 6. [`images`]    — place raster images on A4 pages
//! 7. [`render`]    — rasterise pages to PNG (feature `render`)

pub mod edit;
pub mod images;
pub mod input;
pub mod load;
pub mod metadata;
#[cfg(feature = "render")]
pub mod render;
pub mod serialize;
