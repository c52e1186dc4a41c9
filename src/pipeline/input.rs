//! Input resolution: turn a path, URL or upload into an [`InputFile`] and
//! check it against the tool's accepted types before parsing.
//!
//! Validation here is cheap and byte-level. It never tries to parse the
//! document; a file that passes may still be rejected by the loader.

use crate::error::{PageSmithError, ValidationError};
use crate::tools::ToolSpec;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, info};

static MOBILE_UA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Mobi|Android|iPhone|iPad|iPod").unwrap());

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]+"#).unwrap());

/// One user-supplied file held in memory.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// File name as supplied (no directory components).
    pub name: String,
    /// Declared or guessed MIME type.
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    /// Build an input, guessing the MIME type from the name when the caller
    /// has none (or only the generic `application/octet-stream`).
    pub fn new(name: impl Into<String>, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        let name = sanitize_filename(&name.into());
        let mime = match mime {
            Some(m) if !m.is_empty() && m != "application/octet-stream" => m.to_string(),
            _ => guess_mime(&name).to_string(),
        };
        Self { name, mime, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Whether a `User-Agent` header identifies a phone or tablet.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    MOBILE_UA.is_match(user_agent)
}

/// MIME type implied by a file name's extension.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Strip directory components and characters that are unsafe in file names
/// or `Content-Disposition` headers.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(base, "_");
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Check one file against the tool's allowlists and the size ceiling.
pub fn validate(file: &InputFile, spec: &ToolSpec, limit: usize) -> Result<(), ValidationError> {
    if file.is_empty() {
        return Err(ValidationError::EmptyFile {
            filename: file.name.clone(),
        });
    }
    if file.len() > limit {
        return Err(ValidationError::TooLarge {
            filename: file.name.clone(),
            size: file.len(),
            limit,
        });
    }
    if !spec.accepted_types.contains(&file.mime.as_str()) {
        return Err(ValidationError::UnsupportedType {
            filename: file.name.clone(),
            mime: file.mime.clone(),
            accepted: spec.accepted_types.join(", "),
        });
    }
    let ext_ok = file
        .extension()
        .is_some_and(|ext| spec.extensions.contains(&ext.as_str()));
    if !ext_ok {
        return Err(ValidationError::MissingExtension {
            filename: file.name.clone(),
            expected: spec
                .extensions
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(())
}

/// Validate a whole batch, including the tool's minimum file count.
pub fn validate_all(
    files: &[InputFile],
    spec: &ToolSpec,
    limit: usize,
) -> Result<(), ValidationError> {
    if files.len() < spec.min_files {
        return Err(ValidationError::NotEnoughFiles {
            min: spec.min_files,
            got: files.len(),
        });
    }
    if !spec.multiple && files.len() > 1 {
        return Err(ValidationError::TooManyFiles { got: files.len() });
    }
    for file in files {
        validate(file, spec, limit)?;
    }
    debug!(tool = spec.slug, files = files.len(), "inputs validated");
    Ok(())
}

/// Read a path or download a URL into memory.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<InputFile, PageSmithError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<InputFile, PageSmithError> {
    let path = PathBuf::from(path_str);
    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PageSmithError::PermissionDenied { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PageSmithError::FileNotFound { path });
        }
        Err(_) if path.is_dir() => {
            return Err(PageSmithError::InvalidInput {
                input: path_str.to_string(),
            });
        }
        Err(_) => return Err(PageSmithError::FileNotFound { path }),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    debug!("Read local input: {} ({} bytes)", path.display(), bytes.len());
    Ok(InputFile::new(name, None, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<InputFile, PageSmithError> {
    info!("Downloading input from: {}", url);

    let failed = |reason: String| PageSmithError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PageSmithError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
    let name = filename_from_url(url);
    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    Ok(InputFile::new(name, mime.as_deref(), bytes.to_vec()))
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}
