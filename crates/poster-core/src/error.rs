/// Core error types for the poster pipeline.
use std::path::PathBuf;

/// A specialized Result type for poster operations.
pub type PosterResult<T> = Result<T, PosterError>;

/// Top-level error type encompassing all poster subsystems.
#[derive(Debug, thiserror::Error)]
pub enum PosterError {
    /// Structural or schema problem in a manifest. Fatal before any mutation.
    #[error("manifest validation error: {message}{}", entry_suffix(.entry, .index))]
    ManifestValidation {
        message: String,
        entry: Option<String>,
        index: Option<usize>,
    },

    /// The requested group (and every fallback) is missing from an asset document.
    #[error(
        "asset group '{requested}' not found in {path:?}; available groups: [{}]",
        .available.join(", ")
    )]
    AssetGroupNotFound {
        path: PathBuf,
        requested: String,
        available: Vec<String>,
    },

    /// An orientation constraint that cannot be solved.
    #[error("degenerate aim for '{entity}': {message}")]
    DegenerateAim { entity: String, message: String },

    /// A media file referenced during bake does not exist.
    #[error("unresolved media '{resource}': {path:?} does not exist")]
    UnresolvedMedia { resource: String, path: PathBuf },

    /// Two things share a name that must be unique.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: String, name: String },

    /// A document on disk is malformed or of the wrong kind.
    #[error("document error: {message} ({path:?})")]
    Document { message: String, path: PathBuf },

    #[error("render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

fn entry_suffix(entry: &Option<String>, index: &Option<usize>) -> String {
    match (entry, index) {
        (Some(name), Some(i)) => format!(" (object '{}' at index {})", name, i),
        (Some(name), None) => format!(" (object '{}')", name),
        (None, Some(i)) => format!(" (object at index {})", i),
        (None, None) => String::new(),
    }
}

impl PosterError {
    /// Create a manifest validation error not tied to a particular object.
    pub fn manifest(message: impl Into<String>) -> Self {
        PosterError::ManifestValidation {
            message: message.into(),
            entry: None,
            index: None,
        }
    }

    /// Create a manifest validation error for the object entry at `index`.
    pub fn manifest_entry(message: impl Into<String>, entry: Option<&str>, index: usize) -> Self {
        PosterError::ManifestValidation {
            message: message.into(),
            entry: entry.map(str::to_string),
            index: Some(index),
        }
    }

    /// Create a document error.
    pub fn document(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        PosterError::Document {
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        PosterError::DuplicateName {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn degenerate_aim(entity: impl Into<String>, message: impl Into<String>) -> Self {
        PosterError::DegenerateAim {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// True for errors that must abort a run before any document is touched.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PosterError::ManifestValidation { .. } | PosterError::DuplicateName { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_entry_display_names_object_and_index() {
        let err = PosterError::manifest_entry("unknown kind 'sprite'", Some("logo"), 3);
        assert_eq!(
            err.to_string(),
            "manifest validation error: unknown kind 'sprite' (object 'logo' at index 3)"
        );
    }

    #[test]
    fn test_group_not_found_lists_available() {
        let err = PosterError::AssetGroupNotFound {
            path: PathBuf::from("stage.json"),
            requested: "EXPORT_arm".into(),
            available: vec!["SRC_arm".into(), "RIG_arm".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("EXPORT_arm"));
        assert!(msg.contains("SRC_arm, RIG_arm"));
    }

    #[test]
    fn test_structural_classification() {
        assert!(PosterError::duplicate("object", "logo").is_structural());
        assert!(PosterError::manifest("bad").is_structural());
        assert!(!PosterError::degenerate_aim("logo", "coincident").is_structural());
    }
}
