//! Tool and processing-log endpoints.

use super::error::ApiError;
use super::logs::{LogEntry, NewLogEntry};
use super::state::AppState;
use crate::config::{PageRange, ProcessingConfig, SplitMode};
use crate::controller::{OutputFile, ToolOutput};
use crate::pipeline::edit::EditAction;
use crate::pipeline::input::{is_mobile_user_agent, InputFile};
use crate::pipeline::metadata::MetadataPatch;
use crate::process::process_files;
use crate::tools::{self, ToolSpec};
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// Catalog
// ============================================================================

#[derive(Serialize)]
pub struct ToolInfo {
    #[serde(flatten)]
    pub spec: &'static ToolSpec,
    pub available: bool,
}

/// GET /api/tools
pub async fn list_tools() -> Json<Vec<ToolInfo>> {
    Json(
        tools::CATALOG
            .iter()
            .map(|spec| ToolInfo {
                spec,
                available: spec.available(),
            })
            .collect(),
    )
}

// ============================================================================
// Tool runs
// ============================================================================

/// The optional `options` multipart field.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolOptions {
    pub edits: Vec<EditAction>,
    /// Explicit split ranges; wins over `every`.
    pub ranges: Option<Vec<PageRange>>,
    /// Split into chunks of this many pages.
    pub every: Option<usize>,
    pub metadata: Option<MetadataPatch>,
}

impl ToolOptions {
    fn into_config(self, mobile: bool) -> Result<(Vec<EditAction>, ProcessingConfig), ApiError> {
        let mut builder = ProcessingConfig::builder().mobile_client(mobile);
        if let Some(ranges) = self.ranges {
            builder = builder.split_mode(SplitMode::Ranges(ranges));
        } else if let Some(n) = self.every {
            builder = builder.split_mode(SplitMode::Every(n));
        }
        if let Some(patch) = self.metadata {
            builder = builder.metadata(patch);
        }
        Ok((self.edits, builder.build()?))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncodedFile {
    name: String,
    mime: &'static str,
    size: usize,
    data_base64: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MultiFileResponse {
    tool: &'static str,
    duration_ms: u64,
    files: Vec<EncodedFile>,
}

/// POST /api/tools/:slug
///
/// Multipart body: one or more `file` fields plus an optional JSON
/// `options` field. A single output comes back as an attachment; several
/// come back as JSON with base64 payloads.
pub async fn run_tool(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let spec = tools::find(&slug).ok_or_else(|| ApiError::UnknownTool(slug.clone()))?;
    if !spec.available() {
        return Err(crate::error::PageSmithError::ToolUnavailable(slug).into());
    }

    let mobile = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_mobile_user_agent);

    let mut files = Vec::new();
    let mut options = ToolOptions::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" | "files" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let mime = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read '{filename}': {e}")))?;
                debug!("Received '{}' ({} bytes, {:?})", filename, bytes.len(), mime);
                files.push(InputFile::new(filename, mime.as_deref(), bytes.to_vec()));
            }
            "options" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read options: {e}")))?;
                options = serde_json::from_str(&text)
                    .map_err(|e| ApiError::BadRequest(format!("Invalid options: {e}")))?;
            }
            other => warn!("Ignoring unexpected multipart field '{}'", other),
        }
    }

    let first_name = files.first().map(|f| f.name.clone()).unwrap_or_default();
    let (edits, config) = options.into_config(mobile)?;
    let started = Instant::now();
    let result = process_files(spec, files, &edits, &config).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    state.counters().record(result.is_ok(), elapsed_ms);

    if let Some(logs) = state.logs() {
        let entry = NewLogEntry {
            tool: spec.slug.to_string(),
            filename: first_name,
            status: if result.is_ok() { "success" } else { "error" }.to_string(),
        };
        if let Err(e) = logs.append(&entry).await {
            warn!("Failed to append processing log: {}", e);
        }
    }

    let output = result?;
    info!(
        tool = spec.slug,
        outputs = output.files.len(),
        ms = elapsed_ms,
        "tool run complete"
    );
    Ok(output_response(output))
}

fn output_response(mut output: ToolOutput) -> Response {
    if output.files.len() == 1 {
        let OutputFile { name, mime, bytes } = output.files.remove(0);
        return (
            [
                (header::CONTENT_TYPE, mime.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", name),
                ),
            ],
            Body::from(bytes),
        )
            .into_response();
    }

    Json(MultiFileResponse {
        tool: output.tool,
        duration_ms: output.duration_ms,
        files: output
            .files
            .into_iter()
            .map(|f| EncodedFile {
                size: f.bytes.len(),
                data_base64: BASE64.encode(&f.bytes),
                name: f.name,
                mime: f.mime,
            })
            .collect(),
    })
    .into_response()
}

// ============================================================================
// Processing log
// ============================================================================

/// POST /api/log
pub async fn append_log(
    State(state): State<AppState>,
    Json(entry): Json<NewLogEntry>,
) -> Result<(StatusCode, Json<LogEntry>), ApiError> {
    let logs = state.logs().ok_or(ApiError::LogDisabled)?;
    let row = logs.append(&entry).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// GET /api/log?limit=N
pub async fn recent_logs(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let logs = state.logs().ok_or(ApiError::LogDisabled)?;
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    Ok(Json(logs.recent(limit).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_parse_and_build_config() {
        let options: ToolOptions = serde_json::from_str(
            r#"{"edits":[{"type":"rotate","page":1,"degrees":90}],"every":2}"#,
        )
        .unwrap();
        let (edits, config) = options.into_config(true).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(config.split_mode, SplitMode::Every(2));
        assert!(config.mobile_client);
    }

    #[test]
    fn ranges_win_over_every() {
        let options: ToolOptions =
            serde_json::from_str(r#"{"ranges":[{"start":1,"end":2}],"every":3}"#).unwrap();
        let (_, config) = options.into_config(false).unwrap();
        assert_eq!(
            config.split_mode,
            SplitMode::Ranges(vec![PageRange::new(1, 2)])
        );
    }

    #[test]
    fn unknown_option_is_rejected() {
        assert!(serde_json::from_str::<ToolOptions>(r#"{"password":"x"}"#).is_err());
    }

    #[test]
    fn zero_chunk_size_is_invalid() {
        let options: ToolOptions = serde_json::from_str(r#"{"every":0}"#).unwrap();
        let err = options.into_config(false).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
