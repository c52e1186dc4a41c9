//! Configuration types for tool runs.
//!
//! Everything a tool run needs beyond its input files is held in
//! [`ProcessingConfig`], built via [`ProcessingConfigBuilder`]. The same
//! config drives the CLI, the HTTP handlers and library callers, so one set
//! of defaults applies everywhere.

use crate::error::PageSmithError;
use crate::pipeline::metadata::MetadataPatch;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default upload ceiling: 50 MB.
pub const DEFAULT_MAX_FILE_BYTES: usize = 50 * 1024 * 1024;

/// Upload ceiling for clients detected as mobile: 25 MB.
pub const DEFAULT_MOBILE_MAX_FILE_BYTES: usize = 25 * 1024 * 1024;

/// Configuration for a tool run.
///
/// # Example
/// ```rust
/// use pagesmith::{ProcessingConfig, SplitMode};
///
/// let config = ProcessingConfig::builder()
///     .compress_streams(false)
///     .split_mode(SplitMode::Every(2))
///     .build()
///     .unwrap();
/// assert!(!config.compress_streams);
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Flate-compress output streams. Default: true.
    ///
    /// Compression is what keeps a merged document close to the sum of its
    /// inputs; turn it off only to inspect content streams by hand.
    pub compress_streams: bool,

    /// How the `split` tool partitions the page-set. Default: each page.
    pub split_mode: SplitMode,

    /// Info-dictionary changes applied by the `edit-metadata` tool.
    pub metadata: MetadataPatch,

    /// Rasterisation settings for the `pdf-to-images` tool.
    pub render: RenderOptions,

    /// Size ceilings enforced before loading.
    pub limits: InputLimits,

    /// Treat the client as a mobile device (lower size ceiling). Default: false.
    pub mobile_client: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            compress_streams: true,
            split_mode: SplitMode::default(),
            metadata: MetadataPatch::default(),
            render: RenderOptions::default(),
            limits: InputLimits::default(),
            mobile_client: false,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("compress_streams", &self.compress_streams)
            .field("split_mode", &self.split_mode)
            .field("metadata", &self.metadata)
            .field("render", &self.render)
            .field("limits", &self.limits)
            .field("mobile_client", &self.mobile_client)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProcessingProgressCallback>"),
            )
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }

    /// The size ceiling that applies to this run.
    pub fn max_file_bytes(&self) -> usize {
        if self.mobile_client {
            self.limits.mobile_max_file_bytes
        } else {
            self.limits.max_file_bytes
        }
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn compress_streams(mut self, v: bool) -> Self {
        self.config.compress_streams = v;
        self
    }

    pub fn split_mode(mut self, mode: SplitMode) -> Self {
        self.config.split_mode = mode;
        self
    }

    pub fn metadata(mut self, patch: MetadataPatch) -> Self {
        self.config.metadata = patch;
        self
    }

    pub fn render(mut self, options: RenderOptions) -> Self {
        self.config.render = options;
        self
    }

    pub fn limits(mut self, limits: InputLimits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn mobile_client(mut self, v: bool) -> Self {
        self.config.mobile_client = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, PageSmithError> {
        let c = &self.config;
        if c.limits.max_file_bytes == 0 || c.limits.mobile_max_file_bytes == 0 {
            return Err(PageSmithError::InvalidConfig(
                "File size limits must be greater than zero".into(),
            ));
        }
        if let SplitMode::Every(0) = c.split_mode {
            return Err(PageSmithError::InvalidConfig(
                "Split chunk size must be ≥ 1".into(),
            ));
        }
        if let SplitMode::Ranges(ranges) = &c.split_mode {
            if ranges.is_empty() {
                return Err(PageSmithError::InvalidConfig(
                    "Split needs at least one range".into(),
                ));
            }
        }
        if c.render.dpi < 36 || c.render.dpi > 600 {
            return Err(PageSmithError::InvalidConfig(format!(
                "Render DPI must be 36–600, got {}",
                c.render.dpi
            )));
        }
        Ok(self.config)
    }
}

// ── Limits ───────────────────────────────────────────────────────────────

/// Upload size ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLimits {
    pub max_file_bytes: usize,
    pub mobile_max_file_bytes: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            mobile_max_file_bytes: DEFAULT_MOBILE_MAX_FILE_BYTES,
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Settings for rasterising pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Nominal resolution. Range: 36–600. Default: 150.
    pub dpi: u32,
    /// Longest-edge cap in pixels. Default: 2000.
    pub max_rendered_pixels: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
        }
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// A contiguous, 1-indexed, inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Check the range against a page-set of `total` pages.
    pub fn validate(&self, total: usize) -> Result<(), PageSmithError> {
        let invalid = |reason: &str| PageSmithError::InvalidRange {
            start: self.start,
            end: self.end,
            reason: reason.to_string(),
        };
        if self.start == 0 {
            return Err(invalid("pages are 1-indexed"));
        }
        if self.start > self.end {
            return Err(invalid("start must be <= end"));
        }
        if self.end > total {
            return Err(invalid(&format!("document has {total} pages")));
        }
        Ok(())
    }

    pub fn contains(&self, page_number: usize) -> bool {
        page_number >= self.start && page_number <= self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// How the `split` tool partitions a page-set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMode {
    /// One output per page (default).
    #[default]
    EachPage,
    /// Chunks of N pages; the last chunk may be shorter.
    Every(usize),
    /// Explicit ranges, one output per range.
    Ranges(Vec<PageRange>),
}

impl SplitMode {
    /// Expand into concrete ranges over a page-set of `total` pages.
    pub fn to_ranges(&self, total: usize) -> Vec<PageRange> {
        match self {
            SplitMode::EachPage => (1..=total).map(|p| PageRange::new(p, p)).collect(),
            SplitMode::Every(n) => {
                let n = (*n).max(1);
                (1..=total)
                    .step_by(n)
                    .map(|start| PageRange::new(start, start.saturating_add(n - 1).min(total)))
                    .collect()
            }
            SplitMode::Ranges(ranges) => ranges.clone(),
        }
    }
}

/// Specifies a set of pages by 1-indexed position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed positions.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
