use anyhow::{anyhow, Result};
use sha2::Digest;
use std::path::Path;

/// File stem used to name everything derived from a template.
pub fn template_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| anyhow!("template path {} has no file name", path.display()))
}

/// One-line preview of a marker for terminal output.
pub fn preview(text: &str, max_bytes: usize) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated = truncate_string(&line, max_bytes);
    if truncated.len() < line.len() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
