//! The tool catalog.
//!
//! Every tool is the same pipeline with a different [`ToolSpec`]: which
//! files it accepts, how many, which operation runs, and what the output is
//! called. Adding a tool means adding one row to [`CATALOG`].

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

const PDF_TYPES: &[&str] = &["application/pdf"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];
const IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Identifies one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    Merge,
    Split,
    Rotate,
    DeletePages,
    ExtractPages,
    Organize,
    EditMetadata,
    ImagesToPdf,
    PdfToImages,
}

/// What the tool does with its loaded inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Write the edited page-set of one document.
    Rewrite,
    /// Write the edited page-set spanning several documents.
    Merge,
    /// Partition the page-set into several documents.
    Split,
    /// Patch the Info dictionary.
    Metadata,
    /// Place images on pages.
    ImportImages,
    /// Rasterise pages.
    Render,
}

/// Per-tool configuration record.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub kind: ToolKind,
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub operation: Operation,
    pub accepted_types: &'static [&'static str],
    pub extensions: &'static [&'static str],
    pub multiple: bool,
    pub min_files: usize,
    /// Output file name; `{n}` is replaced by the 1-based output index.
    pub output_name: &'static str,
    pub output_mime: &'static str,
}

impl ToolSpec {
    /// Whether the tool takes PDFs (and so a page-set).
    pub fn takes_pdf(&self) -> bool {
        self.operation != Operation::ImportImages
    }

    /// Whether this build can run the tool.
    pub fn available(&self) -> bool {
        self.operation != Operation::Render || cfg!(feature = "render")
    }

    /// Name of the `n`-th output (1-based).
    pub fn output_name_for(&self, n: usize) -> String {
        self.output_name.replace("{n}", &n.to_string())
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().slug)
    }
}

/// Every tool, in menu order.
pub static CATALOG: [ToolSpec; 9] = [
    ToolSpec {
        kind: ToolKind::Merge,
        slug: "merge",
        title: "Merge PDF",
        description: "Combine several PDFs into one document",
        operation: Operation::Merge,
        accepted_types: PDF_TYPES,
        extensions: PDF_EXTENSIONS,
        multiple: true,
        min_files: 2,
        output_name: "merged-document.pdf",
        output_mime: "application/pdf",
    },
    ToolSpec {
        kind: ToolKind::Split,
        slug: "split",
        title: "Split PDF",
        description: "Break a PDF into several documents by page range",
        operation: Operation::Split,
        accepted_types: PDF_TYPES,
        extensions: PDF_EXTENSIONS,
        multiple: false,
        min_files: 1,
        output_name: "split-document-{n}.pdf",
        output_mime: "application/pdf",
    },
    ToolSpec {
        kind: ToolKind::Rotate,
        slug: "rotate",
        title: "Rotate PDF",
        description: "Rotate individual pages by 90, 180 or 270 degrees",
        operation: Operation::Rewrite,
        accepted_types: PDF_TYPES,
        extensions: PDF_EXTENSIONS,
        multiple: false,
        min_files: 1,
        output_name: "rotated-document.pdf",
        output_mime: "application/pdf",
    },
    ToolSpec {
        kind: ToolKind::DeletePages,
        slug: "delete-pages",
        title: "Delete Pages",
        description: "Remove unwanted pages from a PDF",
        operation: Operation::Rewrite,
        accepted_types: PDF_TYPES,
        extensions: PDF_EXTENSIONS,
        multiple: false,
        min_files: 1,
        output_name: "edited-document.pdf",
        output_mime: "application/pdf",
    },
    ToolSpec {
        kind: ToolKind::ExtractPages,
        slug: "extract-pages",
        title: "Extract Pages",
        description: "Save selected pages as a new PDF",
        operation: Operation::Rewrite,
        accepted_types: PDF_TYPES,
        extensions: PDF_EXTENSIONS,
        multiple: false,
        min_files: 1,
        output_name: "extracted-pages.pdf",
        output_mime: "application/pdf",
    },
    ToolSpec {
        kind: ToolKind::Organize,
        slug: "organize",
        title: "Organize PDF",
        description: "Reorder, rotate and remove pages",
        operation: Operation::Rewrite,
        accepted_types: PDF_TYPES,
        extensions: PDF_EXTENSIONS,
        multiple: false,
        min_files: 1,
        output_name: "reordered-document.pdf",
        output_mime: "application/pdf",
    },
    ToolSpec {
        kind: ToolKind::EditMetadata,
        slug: "edit-metadata",
        title: "Edit Metadata",
        description: "Change title, author, subject and keywords",
        operation: Operation::Metadata,
        accepted_types: PDF_TYPES,
        extensions: PDF_EXTENSIONS,
        multiple: false,
        min_files: 1,
        output_name: "metadata-updated.pdf",
        output_mime: "application/pdf",
    },
    ToolSpec {
        kind: ToolKind::ImagesToPdf,
        slug: "images-to-pdf",
        title: "Images to PDF",
        description: "Turn PNG and JPEG images into a PDF",
        operation: Operation::ImportImages,
        accepted_types: IMAGE_TYPES,
        extensions: IMAGE_EXTENSIONS,
        multiple: true,
        min_files: 1,
        output_name: "images-document.pdf",
        output_mime: "application/pdf",
    },
    ToolSpec {
        kind: ToolKind::PdfToImages,
        slug: "pdf-to-images",
        title: "PDF to Images",
        description: "Render every page as a PNG image",
        operation: Operation::Render,
        accepted_types: PDF_TYPES,
        extensions: PDF_EXTENSIONS,
        multiple: false,
        min_files: 1,
        output_name: "page-{n}.png",
        output_mime: "image/png",
    },
];

static BY_SLUG: Lazy<HashMap<&'static str, &'static ToolSpec>> =
    Lazy::new(|| CATALOG.iter().map(|spec| (spec.slug, spec)).collect());

impl ToolKind {
    pub fn spec(self) -> &'static ToolSpec {
        CATALOG
            .iter()
            .find(|s| s.kind == self)
            .unwrap_or(&CATALOG[0])
    }
}

/// Look up a tool by its URL slug.
pub fn find(slug: &str) -> Option<&'static ToolSpec> {
    BY_SLUG.get(slug).copied()
}

/// Every tool this build can run.
pub fn available() -> impl Iterator<Item = &'static ToolSpec> {
    CATALOG.iter().filter(|s| s.available())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn slugs_are_unique_and_resolvable() {
        let slugs: HashSet<&str> = CATALOG.iter().map(|s| s.slug).collect();
        assert_eq!(slugs.len(), CATALOG.len());
        for spec in &CATALOG {
            assert_eq!(find(spec.slug).unwrap().kind, spec.kind);
            assert_eq!(spec.kind.spec().slug, spec.slug);
        }
        assert!(find("unlock").is_none());
    }

    #[test]
    fn output_names() {
        assert_eq!(ToolKind::Merge.spec().output_name_for(1), "merged-document.pdf");
        assert_eq!(ToolKind::Split.spec().output_name_for(3), "split-document-3.pdf");
        assert_eq!(ToolKind::PdfToImages.spec().output_name_for(12), "page-12.png");
    }

    #[test]
    fn render_tool_depends_on_feature() {
        assert_eq!(
            ToolKind::PdfToImages.spec().available(),
            cfg!(feature = "render")
        );
        assert!(available().any(|s| s.kind == ToolKind::Merge));
    }

    #[test]
    fn image_tool_takes_images() {
        let spec = ToolKind::ImagesToPdf.spec();
        assert!(!spec.takes_pdf());
        assert!(spec.accepted_types.contains(&"image/jpeg"));
    }

    #[test]
    fn kind_serializes_as_slug() {
        for spec in &CATALOG {
            let json = serde_json::to_string(&spec.kind).unwrap();
            assert_eq!(json, format!("\"{}\"", spec.slug));
        }
    }
}
