//! The tool controller: one state machine shared by every tool.
//!
//! ```text
//!            load()                process()
//!   Empty ─────────▶ Loaded ─────────────────▶ Processing
//!     ▲                │  ▲                        │
//!     │  failed load() │  └──── success/failure ───┘
//!     └────────────────┘
//! ```
//!
//! `load` is allowed from any state and discards whatever was there.
//! Edits mutate the page-set synchronously; `process` holds `&mut self`
//! while the operation runs on a blocking worker, so no edit can interleave
//! with it.

use crate::config::ProcessingConfig;
use crate::error::{PageSmithError, SerializeError};
use crate::pipeline::edit::{EditAction, PageId, PageSet};
use crate::pipeline::images::images_to_pdf;
use crate::pipeline::input::{validate_all, InputFile};
use crate::pipeline::load::{load, DocumentHandle};
use crate::pipeline::metadata::apply_metadata;
use crate::pipeline::serialize::{serialize, serialize_merged, split};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::tools::{Operation, ToolSpec};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of one tool session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Empty,
    Loaded,
    Processing,
}

/// One produced file.
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Everything a successful `process` produced.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub tool: &'static str,
    pub files: Vec<OutputFile>,
    pub duration_ms: u64,
}

impl ToolOutput {
    pub fn total_bytes(&self) -> usize {
        self.files.iter().map(|f| f.bytes.len()).sum()
    }
}

/// The uniform user-facing shape of every failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&PageSmithError> for Notification {
    fn from(err: &PageSmithError) -> Self {
        let title = match err {
            PageSmithError::Validation(_) => "File not accepted",
            PageSmithError::Parse(_) => "Could not open PDF",
            PageSmithError::Serialize(SerializeError::EmptyDocument) => "Nothing to save",
            PageSmithError::PageOutOfRange { .. }
            | PageSmithError::InvalidRange { .. }
            | PageSmithError::InvalidEdit(_) => "Invalid edit",
            PageSmithError::NothingLoaded { .. } => "No file selected",
            PageSmithError::ToolUnavailable(_) => "Tool unavailable",
            _ => "Processing failed",
        };
        Self {
            title: title.to_string(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Restores `Loaded` when processing ends, including when the `process`
/// future is dropped mid-flight.
struct ProcessingGuard<'a> {
    state: &'a mut ControllerState,
}

impl<'a> ProcessingGuard<'a> {
    fn enter(state: &'a mut ControllerState) -> Self {
        *state = ControllerState::Processing;
        Self { state }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        *self.state = ControllerState::Loaded;
    }
}

/// Drives one tool from file selection to output.
pub struct ToolController {
    spec: &'static ToolSpec,
    config: ProcessingConfig,
    state: ControllerState,
    inputs: Arc<Vec<InputFile>>,
    handles: Arc<Vec<DocumentHandle>>,
    pages: PageSet,
    output: Option<ToolOutput>,
    notification: Option<Notification>,
}

impl ToolController {
    pub fn new(spec: &'static ToolSpec, config: ProcessingConfig) -> Self {
        Self {
            spec,
            config,
            state: ControllerState::Empty,
            inputs: Arc::new(Vec::new()),
            handles: Arc::new(Vec::new()),
            pages: PageSet::default(),
            output: None,
            notification: None,
        }
    }

    pub fn spec(&self) -> &'static ToolSpec {
        self.spec
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn pages(&self) -> &PageSet {
        &self.pages
    }

    /// Parsed source documents (empty for image tools).
    pub fn documents(&self) -> &[DocumentHandle] {
        &self.handles
    }

    /// The most recent output, if the last `process` succeeded.
    pub fn output(&self) -> Option<&ToolOutput> {
        self.output.as_ref()
    }

    pub fn take_output(&mut self) -> Option<ToolOutput> {
        self.output.take()
    }

    /// The most recent failure, if any.
    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    fn callback(&self) -> ProgressCallback {
        self.config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback))
    }

    fn fail(&mut self, err: PageSmithError) -> PageSmithError {
        warn!(tool = self.spec.slug, "{}", err);
        self.notification = Some(Notification::from(&err));
        err
    }

    /// Validate and parse `files`, replacing any previous session.
    pub fn load(&mut self, files: Vec<InputFile>) -> Result<(), PageSmithError> {
        self.state = ControllerState::Empty;
        self.inputs = Arc::new(Vec::new());
        self.handles = Arc::new(Vec::new());
        self.pages = PageSet::default();
        self.output = None;
        self.notification = None;

        if let Err(e) = validate_all(&files, self.spec, self.config.max_file_bytes()) {
            return Err(self.fail(e.into()));
        }

        let cb = self.callback();
        cb.on_load_start(files.len());

        let mut handles = Vec::new();
        if self.spec.takes_pdf() {
            handles.reserve(files.len());
            for (i, file) in files.iter().enumerate() {
                match load(&file.bytes, &file.name) {
                    Ok(handle) => {
                        cb.on_document_loaded(i + 1, &file.name, handle.page_count());
                        handles.push(handle);
                    }
                    Err(e) => return Err(self.fail(e.into())),
                }
            }
        } else {
            for (i, file) in files.iter().enumerate() {
                cb.on_document_loaded(i + 1, &file.name, 0);
            }
        }

        self.pages = PageSet::from_handles(&handles);
        self.handles = Arc::new(handles);
        self.inputs = Arc::new(files);
        self.state = ControllerState::Loaded;
        info!(
            tool = self.spec.slug,
            files = self.inputs.len(),
            pages = self.pages.len(),
            "loaded"
        );
        Ok(())
    }

    /// Return to `Empty`.
    pub fn clear(&mut self) {
        *self = Self::new(self.spec, self.config.clone());
    }

    fn editable(&mut self) -> Result<&mut PageSet, PageSmithError> {
        if self.state != ControllerState::Loaded || !self.spec.takes_pdf() {
            return Err(PageSmithError::NothingLoaded {
                tool: self.spec.slug,
            });
        }
        Ok(&mut self.pages)
    }

    pub fn toggle_delete(&mut self, id: &PageId) -> Result<bool, PageSmithError> {
        Ok(self.editable()?.toggle_delete(id))
    }

    pub fn rotate(&mut self, id: &PageId, degrees: i32) -> Result<bool, PageSmithError> {
        self.editable()?.rotate(id, degrees)
    }

    pub fn move_page(&mut self, from: usize, to: usize) -> Result<(), PageSmithError> {
        self.editable()?.move_page(from, to)
    }

    pub fn reset(&mut self) -> Result<(), PageSmithError> {
        self.editable()?.reset();
        Ok(())
    }

    /// Apply a batch of edits. Atomic: on error the page-set is unchanged.
    pub fn apply_edits(&mut self, actions: &[EditAction]) -> Result<(), PageSmithError> {
        let pages = self.editable()?;
        let mut scratch = pages.clone();
        scratch.apply_all(actions)?;
        *pages = scratch;
        debug!(edits = actions.len(), "edits applied");
        Ok(())
    }

    /// Run the tool's operation over the current session.
    ///
    /// On success the output is stored and returned; on failure a
    /// [`Notification`] is stored. Either way the controller ends `Loaded`
    /// with the page-set unchanged.
    pub async fn process(&mut self) -> Result<&ToolOutput, PageSmithError> {
        if self.state != ControllerState::Loaded {
            return Err(self.fail(PageSmithError::NothingLoaded {
                tool: self.spec.slug,
            }));
        }

        let spec = self.spec;
        let cb = self.callback();
        let started = Instant::now();
        self.output = None;
        self.notification = None;

        let result = {
            let _guard = ProcessingGuard::enter(&mut self.state);
            run_operation(
                spec,
                &self.config,
                Arc::clone(&self.inputs),
                Arc::clone(&self.handles),
                self.pages.clone(),
            )
            .await
        };

        match result {
            Ok(files) => {
                for (i, f) in files.iter().enumerate() {
                    cb.on_output_ready(i + 1, files.len(), &f.name, f.bytes.len());
                }
                cb.on_process_complete(spec.slug, files.len());
                let output = ToolOutput {
                    tool: spec.slug,
                    files,
                    duration_ms: started.elapsed().as_millis() as u64,
                };
                info!(
                    tool = spec.slug,
                    outputs = output.files.len(),
                    bytes = output.total_bytes(),
                    ms = output.duration_ms,
                    "processed"
                );
                let stored: &ToolOutput = self.output.insert(output);
                Ok(stored)
            }
            Err(e) => {
                cb.on_process_error(spec.slug, &e.to_string());
                Err(self.fail(e))
            }
        }
    }
}

async fn run_operation(
    spec: &'static ToolSpec,
    config: &ProcessingConfig,
    inputs: Arc<Vec<InputFile>>,
    handles: Arc<Vec<DocumentHandle>>,
    pages: PageSet,
) -> Result<Vec<OutputFile>, PageSmithError> {
    let compress = config.compress_streams;
    let cb = config.progress_callback.clone();
    let file = move |n: usize, bytes: Vec<u8>| OutputFile {
        name: spec.output_name_for(n),
        mime: spec.output_mime,
        bytes,
    };

    if spec.operation == Operation::Render {
        return render(spec, config, &inputs, &pages).await;
    }

    let split_mode = config.split_mode.clone();
    let metadata = config.metadata.clone();

    tokio::task::spawn_blocking(move || {
        let first = || {
            handles.first().ok_or(PageSmithError::NothingLoaded { tool: spec.slug })
        };
        let expected = match spec.operation {
            Operation::Split => split_mode.to_ranges(pages.len()).len(),
            _ => 1,
        };
        if let Some(cb) = &cb {
            cb.on_process_start(spec.slug, expected);
        }

        let files = match spec.operation {
            Operation::Rewrite => vec![file(1, serialize(first()?, &pages, compress)?)],
            Operation::Merge => vec![file(1, serialize_merged(&handles, &pages, compress)?)],
            Operation::Split => {
                let ranges = split_mode.to_ranges(pages.len());
                split(first()?, &pages, &ranges, compress)?
                    .into_iter()
                    .enumerate()
                    .map(|(i, bytes)| file(i + 1, bytes))
                    .collect()
            }
            Operation::Metadata => vec![file(1, apply_metadata(first()?, &metadata, compress)?)],
            Operation::ImportImages => vec![file(1, images_to_pdf(&inputs, compress)?)],
            Operation::Render => {
                return Err(PageSmithError::Internal(
                    "render must not run on the blocking path".into(),
                ))
            }
        };
        Ok::<_, PageSmithError>(files)
    })
    .await
    .map_err(|e| PageSmithError::Internal(format!("Processing task panicked: {}", e)))?
}

#[cfg(feature = "render")]
async fn render(
    spec: &'static ToolSpec,
    config: &ProcessingConfig,
    inputs: &[InputFile],
    pages: &PageSet,
) -> Result<Vec<OutputFile>, PageSmithError> {
    use crate::pipeline::render::render_pages;

    let input = inputs.first().ok_or(PageSmithError::NothingLoaded { tool: spec.slug })?;
    let indices: Vec<usize> = pages.live_pages().map(|p| p.original_index).collect();
    if indices.is_empty() {
        return Err(SerializeError::EmptyDocument.into());
    }
    if let Some(cb) = &config.progress_callback {
        cb.on_process_start(spec.slug, indices.len());
    }
    let rendered = render_pages(Arc::new(input.bytes.clone()), config.render, &indices).await?;
    Ok(rendered
        .into_iter()
        .map(|(idx, bytes)| OutputFile {
            name: spec.output_name_for(idx + 1),
            mime: spec.output_mime,
            bytes,
        })
        .collect())
}

#[cfg(not(feature = "render"))]
async fn render(
    spec: &'static ToolSpec,
    _config: &ProcessingConfig,
    _inputs: &[InputFile],
    _pages: &PageSet,
) -> Result<Vec<OutputFile>, PageSmithError> {
    Err(PageSmithError::ToolUnavailable(spec.slug.to_string()))
}
