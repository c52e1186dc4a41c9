//! One-call entry points: resolve inputs, run a tool, write the outputs.
//!
//! These wrap [`ToolController`] for callers that do not need to hold an
//! interactive session: the CLI, the HTTP handlers and scripts.

use crate::config::ProcessingConfig;
use crate::controller::{ToolController, ToolOutput};
use crate::error::PageSmithError;
use crate::pipeline::edit::EditAction;
use crate::pipeline::input::{self, InputFile};
use crate::pipeline::load::load;
use crate::pipeline::metadata::{read_metadata, DocumentMetadata};
use crate::tools::ToolSpec;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run `tool` over local paths and/or URLs.
///
/// Inputs are fetched concurrently, then validated, loaded, edited and
/// processed in order.
///
/// # Example
/// ```rust,no_run
/// use pagesmith::{process, tools, ProcessingConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let merge = tools::find("merge").unwrap();
/// let output = process(merge, &["a.pdf", "b.pdf"], &[], &ProcessingConfig::default()).await?;
/// std::fs::write(&output.files[0].name, &output.files[0].bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn process<S: AsRef<str>>(
    tool: &'static ToolSpec,
    inputs: &[S],
    edits: &[EditAction],
    config: &ProcessingConfig,
) -> Result<ToolOutput, PageSmithError> {
    info!("Running '{}' on {} input(s)", tool.slug, inputs.len());
    let timeout = config.download_timeout_secs;
    let files = try_join_all(
        inputs
            .iter()
            .map(|i| input::resolve_input(i.as_ref(), timeout)),
    )
    .await?;
    process_files(tool, files, edits, config).await
}

/// Run `tool` over files already held in memory.
pub async fn process_files(
    tool: &'static ToolSpec,
    files: Vec<InputFile>,
    edits: &[EditAction],
    config: &ProcessingConfig,
) -> Result<ToolOutput, PageSmithError> {
    let mut controller = ToolController::new(tool, config.clone());
    controller.load(files)?;
    if !edits.is_empty() {
        controller.apply_edits(edits)?;
    }
    controller.process().await?;
    controller
        .take_output()
        .ok_or_else(|| PageSmithError::Internal("processing produced no output".into()))
}

/// Synchronous wrapper around [`process`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync<S: AsRef<str>>(
    tool: &'static ToolSpec,
    inputs: &[S],
    edits: &[EditAction],
    config: &ProcessingConfig,
) -> Result<ToolOutput, PageSmithError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PageSmithError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process(tool, inputs, edits, config))
}

/// Write every output file into `dir`, each via temp file + rename so a
/// crash never leaves a truncated PDF behind.
///
/// Returns the written paths in output order.
pub async fn write_outputs(
    output: &ToolOutput,
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, PageSmithError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PageSmithError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(output.files.len());
    for file in &output.files {
        let path = dir.join(&file.name);
        write_atomic(&path, &file.bytes).await?;
        debug!("Wrote {} ({} bytes)", path.display(), file.bytes.len());
        written.push(path);
    }
    Ok(written)
}

/// Write `bytes` to `path` through a sibling temp file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PageSmithError> {
    let failed = |e| PageSmithError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)?;
    Ok(())
}

/// Read metadata from a PDF path or URL without modifying it.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentMetadata, PageSmithError> {
    let file = input::resolve_input(input_str.as_ref(), 120).await?;
    inspect_bytes(&file.bytes, &file.name)
}

/// Read metadata from PDF bytes in memory.
pub fn inspect_bytes(bytes: &[u8], name: &str) -> Result<DocumentMetadata, PageSmithError> {
    let handle = load(bytes, name)?;
    Ok(read_metadata(&handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::OutputFile;
    use crate::pipeline::test_support::pdf_with_pages;
    use crate::tools::ToolKind;

    #[tokio::test]
    async fn process_from_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, pdf_with_pages(1)).unwrap();
        std::fs::write(&b, pdf_with_pages(2)).unwrap();

        let output = process(
            ToolKind::Merge.spec(),
            &[a.to_str().unwrap(), b.to_str().unwrap()],
            &[],
            &ProcessingConfig::default(),
        )
        .await
        .unwrap();
        let meta = inspect_bytes(&output.files[0].bytes, "merged.pdf").unwrap();
        assert_eq!(meta.page_count, 3);
    }

    #[tokio::test]
    async fn missing_input_fails_before_processing() {
        let err = process(
            ToolKind::Rotate.spec(),
            &["/no/such/file.pdf"],
            &[],
            &ProcessingConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PageSmithError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn write_outputs_is_atomic_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let output = ToolOutput {
            tool: "split",
            files: vec![
                OutputFile {
                    name: "split-document-1.pdf".into(),
                    mime: "application/pdf",
                    bytes: b"one".to_vec(),
                },
                OutputFile {
                    name: "split-document-2.pdf".into(),
                    mime: "application/pdf",
                    bytes: b"two".to_vec(),
                },
            ],
            duration_ms: 0,
        };
        let paths = write_outputs(&output, dir.path().join("out")).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"two");
        let leftovers = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .path()
                    .extension()
                    .is_some_and(|x| x == "tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn sync_wrapper_runs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        std::fs::write(&a, pdf_with_pages(2)).unwrap();
        let output = process_sync(
            ToolKind::Rotate.spec(),
            &[a.to_str().unwrap()],
            &[EditAction::Rotate {
                page: crate::pipeline::edit::PageRef::Position(1),
                degrees: 90,
            }],
            &ProcessingConfig::default(),
        )
        .unwrap();
        assert_eq!(output.files[0].name, "rotated-document.pdf");
    }
}
