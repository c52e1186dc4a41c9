//! Error types for the pagesmith library.
//!
//! The taxonomy mirrors the stages of the pipeline, so callers can tell
//! *where* a tool run failed without string matching:
//!
//! * [`ValidationError`] — the upload was rejected before any parse attempt
//!   (wrong type, missing extension, too large, empty).
//! * [`ParseError`] — the bytes reached the loader but are not a usable PDF.
//! * [`SerializeError`] — the edited page-set could not be written out,
//!   either because nothing survives the edits or because the PDF engine
//!   failed.
//! * [`EngineFailure`] — an opaque failure bubbled up from `lopdf`, `image`
//!   or pdfium, tagged with the operation that was running.
//!
//! [`PageSmithError`] is the crate-wide fatal error that wraps all of the
//! above together with input resolution and state errors. Every public
//! entry point returns it.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagesmith library.
#[derive(Debug, Error)]
pub enum PageSmithError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The file was rejected before reaching the loader.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The loader could not parse the file.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The serializer could not produce an output document.
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// A PDF/image engine failure outside of serialization.
    #[error(transparent)]
    Engine(#[from] EngineFailure),

    // ── Edit errors ───────────────────────────────────────────────────────
    /// A page position or index is outside the page-set.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// A split range is malformed.
    #[error("Invalid page range {start}-{end}: {reason}")]
    InvalidRange {
        start: usize,
        end: usize,
        reason: String,
    },

    /// An edit action is well-formed JSON but semantically invalid.
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    // ── Controller errors ─────────────────────────────────────────────────
    /// An operation needs a loaded document but the controller is empty.
    #[error("No file loaded for tool '{tool}'")]
    NothingLoaded { tool: &'static str },

    /// The tool is compiled out or unknown.
    #[error("Tool '{0}' is not available in this build")]
    ToolUnavailable(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Client-side checks that run before any parse attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The MIME type is not in the tool's allowlist.
    #[error("'{filename}' has unsupported type '{mime}' (accepted: {accepted})")]
    UnsupportedType {
        filename: String,
        mime: String,
        accepted: String,
    },

    /// The filename does not carry an accepted extension.
    #[error("'{filename}' must have one of these extensions: {expected}")]
    MissingExtension { filename: String, expected: String },

    /// The file exceeds the size ceiling.
    #[error("'{filename}' is {size} bytes, larger than the {limit}-byte limit")]
    TooLarge {
        filename: String,
        size: usize,
        limit: usize,
    },

    /// Zero-byte upload.
    #[error("'{filename}' is empty")]
    EmptyFile { filename: String },

    /// The tool needs at least `min` files.
    #[error("This tool needs at least {min} file(s), got {got}")]
    NotEnoughFiles { min: usize, got: usize },

    /// The tool takes a single file.
    #[error("This tool takes one file at a time, got {got}")]
    TooManyFiles { got: usize },
}

/// Malformed file content detected by the loader.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The first five bytes are not `%PDF-`.
    #[error("Not a PDF: expected '%PDF-' header, found {found:?}")]
    InvalidHeader { found: Vec<u8> },

    /// Header is fine but the body could not be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptDocument { detail: String },

    /// The document requires a password.
    #[error("PDF is encrypted and cannot be opened without a password")]
    Encrypted,
}

/// Failures while writing the output document.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// Every page was deleted; a zero-page PDF is never produced.
    #[error("Cannot create a document with no pages: keep at least one page")]
    EmptyDocument,

    /// The PDF engine failed while building or writing the output.
    #[error("Failed to write PDF: {cause}")]
    EngineFailure {
        #[source]
        cause: EngineFailure,
    },
}

/// An opaque failure from an underlying engine (`lopdf`, `image`, pdfium).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {detail}")]
pub struct EngineFailure {
    /// What was running, e.g. `"save"` or `"decode image"`.
    pub operation: &'static str,
    /// The engine's own message.
    pub detail: String,
}

impl EngineFailure {
    pub fn new(operation: &'static str, detail: impl ToString) -> Self {
        Self {
            operation,
            detail: detail.to_string(),
        }
    }
}

impl From<EngineFailure> for SerializeError {
    fn from(cause: EngineFailure) -> Self {
        SerializeError::EngineFailure { cause }
    }
}

impl PageSmithError {
    /// Whether the failure happened before the loader ran.
    pub fn is_validation(&self) -> bool {
        matches!(self, PageSmithError::Validation(_))
    }

    /// Whether retrying the same request can reasonably succeed.
    ///
    /// Bad input stays bad; engine and I/O hiccups may not.
    pub fn is_retryable(&self) -> bool {
        match self {
            PageSmithError::Validation(_)
            | PageSmithError::Parse(_)
            | PageSmithError::PageOutOfRange { .. }
            | PageSmithError::InvalidRange { .. }
            | PageSmithError::InvalidEdit(_)
            | PageSmithError::InvalidInput { .. }
            | PageSmithError::InvalidConfig(_)
            | PageSmithError::ToolUnavailable(_) => false,
            PageSmithError::Serialize(SerializeError::EmptyDocument) => false,
            _ => true,
        }
    }
}
