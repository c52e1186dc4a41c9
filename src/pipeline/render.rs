//! Page rasterisation: render selected pages to PNG via pdfium.
//!
//! pdfium is not async-safe, so every call runs inside
//! `tokio::task::spawn_blocking`. The library is bound at runtime, from
//! `PDFIUM_LIB_PATH` (a directory or the library file itself) when set,
//! otherwise from the system library search path.

use crate::config::RenderOptions;
use crate::error::{EngineFailure, PageSmithError, ParseError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium library location.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Render `page_indices` (0-based) of a PDF to PNG bytes.
///
/// # Returns
/// `(page_index_0based, png_bytes)` pairs in the requested order.
/// Out-of-range indices are skipped with a warning.
pub async fn render_pages(
    bytes: Arc<Vec<u8>>,
    options: RenderOptions,
    page_indices: &[usize],
) -> Result<Vec<(usize, Vec<u8>)>, PageSmithError> {
    let indices = page_indices.to_vec();
    tokio::task::spawn_blocking(move || render_pages_blocking(&bytes, options, &indices))
        .await
        .map_err(|e| PageSmithError::Internal(format!("Render task panicked: {}", e)))?
}

fn bind_pdfium() -> Result<Pdfium, PageSmithError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_ENV) {
        Ok(raw) => {
            let path = PathBuf::from(&raw);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(lib)
        }
        Err(_) => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| {
        PageSmithError::ToolUnavailable(format!(
            "pdf-to-images (pdfium library not found: {e:?}; set {PDFIUM_LIB_PATH_ENV})"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

fn render_pages_blocking(
    bytes: &[u8],
    options: RenderOptions,
    page_indices: &[usize],
) -> Result<Vec<(usize, Vec<u8>)>, PageSmithError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.to_lowercase().contains("password") {
            PageSmithError::Parse(ParseError::Encrypted)
        } else {
            PageSmithError::Parse(ParseError::CorruptDocument { detail: err_str })
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("Rendering {} of {} pages", page_indices.len(), total_pages);

    let mut results = Vec::with_capacity(page_indices.len());
    for &idx in page_indices {
        if idx >= total_pages {
            warn!("Skipping page {} (out of range, total={})", idx + 1, total_pages);
            continue;
        }

        let page = pages
            .get(idx as u16)
            .map_err(|e| EngineFailure::new("render", format!("page {}: {:?}", idx + 1, e)))?;

        // Nominal size at the requested DPI, capped on the longest edge.
        let scale = options.dpi as f32 / 72.0;
        let width_px = (page.width().value * scale).round() as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px.clamp(1, options.max_rendered_pixels as i32))
            .set_maximum_height(options.max_rendered_pixels as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| EngineFailure::new("render", format!("page {}: {:?}", idx + 1, e)))?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push((idx, encode_png(&image)?));
    }

    Ok(results)
}

/// PNG-encode a rendered page.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, EngineFailure> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| EngineFailure::new("encode png", e))?;
    debug!("Encoded page image → {} bytes", buf.len());
    Ok(buf)
}
