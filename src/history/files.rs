//! Loading file content for embedding, and describing image references.

use std::path::Path;

use base64::Engine;

use crate::error::{Result, SkeinError};

/// Files above this size are never embedded.
pub const MAX_EMBED_BYTES: u64 = 16 * 1024 * 1024;

fn unreadable(path: &str, reason: impl Into<String>) -> SkeinError {
    SkeinError::FileUnreadable {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Read a file as UTF-8 text, refusing directories and oversized files.
pub fn read_embeddable(path: &str) -> Result<String> {
    let meta = std::fs::metadata(Path::new(path)).map_err(|e| unreadable(path, e.to_string()))?;
    if !meta.is_file() {
        return Err(unreadable(path, "not a regular file"));
    }
    if meta.len() > MAX_EMBED_BYTES {
        return Err(unreadable(path, format!("{} bytes exceeds embed limit", meta.len())));
    }
    std::fs::read_to_string(path).map_err(|e| unreadable(path, e.to_string()))
}

/// Delimited block wrapping a file's raw content.
pub fn file_block(path: &str, content: &str) -> String {
    let mut block = format!("--- BEGIN FILE: {path} ---\n{content}");
    if !content.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(&format!("--- END FILE: {path} ---\n"));
    block
}

/// Human-readable label for an image reference.
///
/// Paths and URLs are shown as-is. Inline `data:` URLs are summarized by MIME
/// type and decoded size so base64 payloads never leak into history text.
pub fn image_label(reference: &str) -> String {
    let Some(rest) = reference.strip_prefix("data:") else {
        return reference.to_string();
    };
    let Some((meta, payload)) = rest.split_once(',') else {
        return "inline image (malformed)".to_string();
    };
    let mut parts = meta.split(';');
    let mime = parts
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream");
    let is_base64 = parts.any(|p| p.eq_ignore_ascii_case("base64"));

    if !is_base64 {
        return format!("inline image ({mime}, {} bytes)", payload.len());
    }
    match base64::engine::general_purpose::STANDARD.decode(payload.trim()) {
        Ok(bytes) => format!("inline image ({mime}, {} bytes)", bytes.len()),
        Err(_) => format!("inline image ({mime}, invalid data)"),
    }
}
