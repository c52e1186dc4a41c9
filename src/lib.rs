//! # pagesmith
//!
//! Merge, split, rotate, reorder and otherwise edit PDF documents.
//!
//! Every tool in the catalog is the same pipeline with a different
//! [`ToolSpec`]: which files it accepts, which operation it runs, and what
//! the output is called. A [`ToolController`] drives one session of one tool
//! from file selection to output.
//!
//! ## Pipeline Overview
//!
//! ```text
//! path / URL / upload
//!  │
//!  ├─ 1. Input      resolve + validate type, extension and size
//!  ├─ 2. Load       parse with lopdf into a DocumentHandle
//!  ├─ 3. Edit       PageSet: delete, rotate, move, reset
//!  ├─ 4. Serialize  copy live pages in order (spawn_blocking)
//!  └─ 5. Output     one or more files, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagesmith::{process, tools, EditAction, PageRef, ProcessingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rotate = tools::find("rotate").unwrap();
//!     let edits = [EditAction::Rotate { page: PageRef::Position(1), degrees: 90 }];
//!     let output = process(rotate, &["scan.pdf"], &edits, &ProcessingConfig::default()).await?;
//!     pagesmith::write_outputs(&output, ".").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `pagesmith` binary (clap + anyhow + indicatif) |
//! | `server` | on      | The `pagesmith-server` binary and the [`server`] module (axum + sqlx) |
//! | `render` | off     | The `pdf-to-images` tool via pdfium |
//!
//! Library-only users can opt out of both binaries:
//! ```toml
//! pagesmith = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    InputLimits, PageRange, PageSelection, ProcessingConfig, ProcessingConfigBuilder,
    RenderOptions, SplitMode,
};
pub use controller::{ControllerState, Notification, OutputFile, ToolController, ToolOutput};
pub use error::{EngineFailure, PageSmithError, ParseError, SerializeError, ValidationError};
pub use pipeline::edit::{EditAction, PageDescriptor, PageId, PageRef, PageSet};
pub use pipeline::input::InputFile;
pub use pipeline::load::DocumentHandle;
pub use pipeline::metadata::{DocumentMetadata, MetadataPatch};
pub use process::{inspect, inspect_bytes, process, process_files, process_sync, write_outputs};
pub use progress::{NoopProgressCallback, ProcessingProgressCallback, ProgressCallback};
pub use tools::{Operation, ToolKind, ToolSpec};
