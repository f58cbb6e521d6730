use std::path::{Path, PathBuf};

/// Resolve a path written in a manifest.
///
/// Relative paths are tried against the manifest's directory first, then
/// against that directory's parent (the repository root in the usual
/// `poster/manifest.json` layout). If neither exists the manifest-relative
/// candidate is returned so errors name the most likely location.
pub fn resolve_manifest_path(manifest: Option<&Path>, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let Some(dir) = manifest.and_then(Path::parent) else {
        return path.to_path_buf();
    };

    let primary = dir.join(path);
    if primary.exists() {
        return primary;
    }
    if let Some(root) = dir.parent() {
        let fallback = root.join(path);
        if fallback.exists() {
            return fallback;
        }
    }
    primary
}

/// Canonical form used as a cache key; falls back to the path as given.
pub fn canonical_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Forward-slash display form stored in scene documents.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
