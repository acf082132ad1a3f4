// src/pdf.rs

use std::path::Path;

use lopdf::Document;

use crate::error::{Result, WorkerError};

/// Extracts the text of an inclusive 1-based page range, pages separated by
/// a blank line. The range is clamped to the document: start raised to 1,
/// end lowered to the page count. A range that is empty after clamping
/// yields an empty string, not an error; the caller decides what that
/// means. This parses the whole file synchronously, so async callers should
/// wrap it in `spawn_blocking`.
pub fn extract_page_range(path: &Path, start_page: u32, end_page: u32) -> Result<String> {
    let document = Document::load(path).map_err(|e| {
        WorkerError::ExtractionError(format!("Failed to open PDF '{}': {}", path.display(), e))
    })?;

    let total_pages = document.get_pages().len() as u32;
    let start = start_page.max(1);
    let end = end_page.min(total_pages);
    if total_pages == 0 || start > end {
        return Ok(String::new());
    }

    let mut text = String::new();
    for page_number in start..=end {
        let page_text = document.extract_text(&[page_number]).map_err(|e| {
            WorkerError::ExtractionError(format!(
                "Failed to extract text from page {} of '{}': {}",
                page_number,
                path.display(),
                e
            ))
        })?;
        text.push_str(&page_text);
        text.push_str("\n\n");
    }

    Ok(text)
}
