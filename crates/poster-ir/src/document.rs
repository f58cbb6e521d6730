//! Loading and saving of JSON documents.
//!
//! Every document carries a top-level `format` tag. Saves go through a
//! sibling temporary file that is renamed over the target, so a failed run
//! never leaves a half-written document behind.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use poster_core::{PosterError, PosterResult};

pub const ASSET_FORMAT: &str = "poster.asset/1";
pub const LIBRARY_FORMAT: &str = "poster.library/1";
pub const SCENE_FORMAT: &str = "poster.scene/1";

/// A persisted document with a fixed format tag.
pub trait Document: Serialize + DeserializeOwned {
    const FORMAT: &'static str;
}

/// Read a document, checking its format tag.
pub fn load_document<T: Document>(path: &Path) -> PosterResult<T> {
    let contents = std::fs::read_to_string(path)?;
    parse_document(&contents, path)
}

/// Parse a document from text. `origin` is only used for error messages.
pub fn parse_document<T: Document>(contents: &str, origin: &Path) -> PosterResult<T> {
    let value: serde_json::Value = serde_json::from_str(contents)
        .map_err(|e| PosterError::document(format!("invalid JSON: {}", e), origin))?;
    match value.get("format").and_then(|f| f.as_str()) {
        Some(tag) if tag == T::FORMAT => {}
        Some(tag) => {
            return Err(PosterError::document(
                format!("expected format '{}', found '{}'", T::FORMAT, tag),
                origin,
            ))
        }
        None => {
            return Err(PosterError::document(
                format!("missing format tag (expected '{}')", T::FORMAT),
                origin,
            ))
        }
    }
    serde_json::from_value(value).map_err(|e| PosterError::document(e.to_string(), origin))
}

/// Canonical serialized form: pretty JSON with a trailing newline.
pub fn to_canonical_string<T: Serialize>(doc: &T) -> PosterResult<String> {
    let mut text = serde_json::to_string_pretty(doc)?;
    text.push('\n');
    Ok(text)
}

/// Serialize and atomically replace `path`.
pub fn save_document<T: Document>(doc: &T, path: &Path) -> PosterResult<()> {
    let text = to_canonical_string(doc)?;
    write_atomic(path, text.as_bytes())
}

/// Write bytes to a sibling temporary file and rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> PosterResult<()> {
    write_atomic_all(&[(path, bytes)])
}

/// Replace several files together.
///
/// Every file is staged as a sibling temporary before any target is
/// replaced, so a failed write leaves all targets untouched.
pub fn write_atomic_all(files: &[(&Path, &[u8])]) -> PosterResult<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        match stage(path, bytes) {
            Ok(tmp) => staged.push((tmp, *path)),
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        }
    }
    for (i, (tmp, path)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(tmp, path) {
            discard(&staged[i..]);
            return Err(e.into());
        }
        tracing::debug!("wrote {}", path.display());
    }
    Ok(())
}

fn stage(path: &Path, bytes: &[u8]) -> PosterResult<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_sibling(path);
    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(tmp)
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        let _ = std::fs::remove_file(tmp);
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.tmp-{}", name, std::process::id()))
}
