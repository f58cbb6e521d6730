//! Asset reference resolution.
//!
//! A manifest names an asset document and the group to instance from it.
//! When that exact group is missing the resolver walks a fixed fallback
//! chain and logs every step it had to take.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use poster_core::{PosterError, PosterResult};
use poster_ir::{load_document, AssetDocument};

use crate::paths::canonical_key;

/// Generic container name used by authoring tools when nothing else is set.
pub const DEFAULT_GROUP: &str = "Collection";

/// How a group was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStep {
    Exact,
    /// `EXPORT_<logical>`.
    ExportPrefixed,
    /// `<logical>` without prefix.
    Logical,
    /// First `EXPORT_*` group, non-empty groups preferred.
    AnyExport,
    /// The default `Collection`.
    DefaultGroup,
    /// First remaining group by name.
    AnyGroup,
}

impl fmt::Display for ResolutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionStep::Exact => "exact",
            ResolutionStep::ExportPrefixed => "export-prefixed",
            ResolutionStep::Logical => "logical-name",
            ResolutionStep::AnyExport => "any-export",
            ResolutionStep::DefaultGroup => "default-collection",
            ResolutionStep::AnyGroup => "any-group",
        };
        write!(f, "{}", s)
    }
}

/// The outcome of resolving one group request.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub path: PathBuf,
    pub requested: String,
    pub group: String,
    pub step: ResolutionStep,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        self.step != ResolutionStep::Exact
    }
}

/// Pick the group to instance for `requested`, following the fallback chain.
pub fn pick_group(doc: &AssetDocument, requested: &str) -> Option<(String, ResolutionStep)> {
    let has = |name: &str| doc.group(name).is_some();

    if has(requested) {
        return Some((requested.to_string(), ResolutionStep::Exact));
    }
    let logical = requested.strip_prefix("EXPORT_").unwrap_or(requested);
    let prefixed = format!("EXPORT_{}", logical);
    if has(&prefixed) {
        return Some((prefixed, ResolutionStep::ExportPrefixed));
    }
    if has(logical) {
        return Some((logical.to_string(), ResolutionStep::Logical));
    }

    let mut exports: Vec<&str> = doc
        .groups
        .iter()
        .map(|g| g.name.as_str())
        .filter(|n| n.starts_with("EXPORT_"))
        .collect();
    exports.sort();
    // stable sort keeps name order within each bucket
    exports.sort_by_key(|n| doc.group_is_empty(n));
    if let Some(first) = exports.first() {
        return Some((first.to_string(), ResolutionStep::AnyExport));
    }

    if has(DEFAULT_GROUP) {
        return Some((DEFAULT_GROUP.to_string(), ResolutionStep::DefaultGroup));
    }

    let mut rest: Vec<&str> = doc.groups.iter().map(|g| g.name.as_str()).collect();
    rest.sort();
    rest.first()
        .map(|n| (n.to_string(), ResolutionStep::AnyGroup))
}

/// Loads asset documents read-only, caching them per canonical path.
#[derive(Default)]
pub struct AssetResolver {
    cache: HashMap<PathBuf, Arc<AssetDocument>>,
}

impl AssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> PosterResult<Arc<AssetDocument>> {
        let key = canonical_key(path);
        if let Some(doc) = self.cache.get(&key) {
            return Ok(Arc::clone(doc));
        }
        if !path.is_file() {
            return Err(PosterError::document("asset document not found", path));
        }
        let doc: AssetDocument = load_document(path)?;
        tracing::debug!("loaded asset document {} ({} groups)", path.display(), doc.groups.len());
        let doc = Arc::new(doc);
        self.cache.insert(key, Arc::clone(&doc));
        Ok(doc)
    }

    pub fn resolve(&mut self, path: &Path, requested: &str) -> PosterResult<(Arc<AssetDocument>, Resolution)> {
        let doc = self.load(path)?;
        let (group, step) = pick_group(&doc, requested).ok_or_else(|| PosterError::AssetGroupNotFound {
            path: path.to_path_buf(),
            requested: requested.to_string(),
            available: doc.group_names(),
        })?;

        if step != ResolutionStep::Exact {
            tracing::warn!(
                "group '{}' not found in {}; using '{}' ({} fallback)",
                requested,
                path.display(),
                group,
                step
            );
        }
        let resolution = Resolution {
            path: path.to_path_buf(),
            requested: requested.to_string(),
            group,
            step,
        };
        Ok((doc, resolution))
    }

    pub fn cached_documents(&self) -> usize {
        self.cache.len()
    }
}
