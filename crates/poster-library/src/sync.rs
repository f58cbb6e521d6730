//! Link/bake synchronisation between the material library and asset documents.
//!
//! `link` gives an asset live references to library materials. `bake` turns
//! every reference into an owned copy and embeds media so the asset no longer
//! depends on anything outside itself. Both operate on a working copy and
//! only replace the caller's document once they have fully succeeded.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use poster_core::pattern::matches_any;
use poster_core::{PosterError, PosterResult};
use poster_ir::asset::MaterialState;
use poster_ir::{AssetDocument, LibraryDocument, LinkState, MaterialResource, MediaResource};

use crate::builder::load_library;
use crate::pack::{ensure_media_exists, pack_media, resolve_media_path};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Material name patterns considered by `link`. Empty means `MAT_*`.
    pub patterns: Vec<String>,
    pub pack: bool,
    /// Bake only materials used by at least one mesh slot.
    pub used_only: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            pack: true,
            used_only: false,
        }
    }
}

impl From<&poster_core::SyncConfig> for SyncOptions {
    fn from(config: &poster_core::SyncConfig) -> Self {
        Self {
            patterns: config.materials.clone(),
            pack: config.pack,
            used_only: config.used_only,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkReport {
    pub linked: Vec<String>,
    pub refreshed: Vec<String>,
    /// Local forks left untouched.
    pub skipped_local: Vec<String>,
}

/// Dependencies still pointing outside the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemainingLinked {
    pub materials: Vec<String>,
    pub media: Vec<String>,
    pub libraries: Vec<String>,
}

impl RemainingLinked {
    pub fn of(doc: &AssetDocument) -> Self {
        let mut libraries = BTreeSet::new();
        let mut materials = Vec::new();
        for m in &doc.materials {
            if let MaterialState::Linked { library, .. } = &m.state {
                materials.push(m.name.clone());
                libraries.insert(library.to_string_lossy().replace('\\', "/"));
            }
        }
        Self {
            materials,
            media: doc
                .media
                .iter()
                .filter(|m| m.is_external())
                .map(|m| m.name.clone())
                .collect(),
            libraries: libraries.into_iter().collect(),
        }
    }

    pub fn is_self_contained(&self) -> bool {
        self.materials.is_empty() && self.media.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BakeReport {
    pub baked: Vec<String>,
    pub packed: Vec<String>,
    /// Linked materials left alone by the used-only filter.
    pub skipped_unused: Vec<String>,
    pub remaining: RemainingLinked,
}

/// Library documents loaded during one operation, keyed by the path stored in the asset.
#[derive(Default)]
pub struct LibrarySet {
    base_dir: PathBuf,
    loaded: HashMap<PathBuf, LibraryDocument>,
}

impl LibrarySet {
    /// Relative library paths resolve against `base_dir` first.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            loaded: HashMap::new(),
        }
    }

    /// Register an already loaded library under `path`.
    pub fn insert(&mut self, path: impl Into<PathBuf>, library: LibraryDocument) {
        self.loaded.insert(path.into(), library);
    }

    /// Absolute location of a stored library path. Relative paths try
    /// `base_dir` first, then the working directory.
    pub fn resolve_path(&self, stored: &Path) -> PathBuf {
        if stored.is_absolute() {
            return stored.to_path_buf();
        }
        let candidate = self.base_dir.join(stored);
        if candidate.is_file() {
            absolute(&candidate)
        } else {
            absolute(stored)
        }
    }

    pub fn get(&mut self, stored: &Path) -> PosterResult<&LibraryDocument> {
        if !self.loaded.contains_key(stored) {
            let path = self.resolve_path(stored);
            if !path.is_file() {
                return Err(PosterError::document("material library not found", path));
            }
            let library = load_library(&path)?;
            self.loaded.insert(stored.to_path_buf(), library);
        }
        self.loaded
            .get(stored)
            .ok_or_else(|| PosterError::document("material library not loaded", stored))
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Ensure `doc` holds a linked reference to every library material matching `patterns`.
///
/// Local materials of the same name are forks and stay untouched. Linked
/// ones are pointed at the current library path and id.
pub fn link(
    doc: &mut AssetDocument,
    library: &LibraryDocument,
    library_path: &Path,
    patterns: &[String],
) -> LinkReport {
    let mut report = LinkReport::default();
    for material in library.sorted() {
        if !matches_any(patterns, &material.name) {
            continue;
        }
        match doc.link_state(&material.name) {
            LinkState::Absent => {
                doc.materials.push(MaterialResource::linked(
                    material.name.clone(),
                    library_path,
                    material.id,
                ));
                report.linked.push(material.name.clone());
            }
            LinkState::Local => {
                tracing::warn!(
                    "{} is a local material in {}; leaving it untouched",
                    material.name,
                    doc.name
                );
                report.skipped_local.push(material.name.clone());
            }
            LinkState::Linked => {
                if let Some(existing) = doc.materials.iter_mut().find(|m| m.name == material.name) {
                    existing.state = MaterialState::Linked {
                        library: library_path.to_path_buf(),
                        library_id: material.id,
                    };
                }
                report.refreshed.push(material.name.clone());
            }
        }
    }
    tracing::info!(
        "linked {} new, refreshed {}, skipped {} local in {}",
        report.linked.len(),
        report.refreshed.len(),
        report.skipped_local.len(),
        doc.name
    );
    report
}

/// Make `doc` self-contained: localize linked materials and pack media.
///
/// `base_dir` is the directory media paths are relative to. On error `doc`
/// is left exactly as it was.
pub fn bake(
    doc: &mut AssetDocument,
    libraries: &mut LibrarySet,
    base_dir: &Path,
    options: &SyncOptions,
) -> PosterResult<BakeReport> {
    let mut work = doc.clone();
    let mut report = BakeReport::default();

    let used = work.used_material_ids();
    if options.used_only {
        tracing::warn!(
            "baking used materials only: linked materials not assigned to any mesh stay linked \
             and {} will not be self-contained",
            work.name
        );
    }

    let linked: Vec<(usize, PathBuf, Uuid)> = work
        .materials
        .iter()
        .enumerate()
        .filter_map(|(i, m)| match &m.state {
            MaterialState::Linked { library, library_id } => Some((i, library.clone(), *library_id)),
            MaterialState::Local { .. } => None,
        })
        .collect();

    let mut textured: Vec<(usize, String)> = Vec::new();
    for (index, library_path, library_id) in linked {
        let old_id = work.materials[index].id;
        let name = work.materials[index].name.clone();
        if options.used_only && !used.contains(&old_id) {
            report.skipped_unused.push(name);
            continue;
        }

        let library = libraries.get(&library_path)?;
        let source = library
            .by_id(&library_id)
            .or_else(|| {
                tracing::warn!("{}: library id {} not found, matching by name", name, library_id);
                library.get(&name)
            })
            .ok_or_else(|| {
                PosterError::document(
                    format!("library material '{}' not found", name),
                    library_path.clone(),
                )
            })?;
        let mut params = source.params.clone();

        if let Some(texture) = params.base_color_texture.take() {
            let library_dir = libraries
                .resolve_path(&library_path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let resolved = resolve_media_path(&texture, &library_dir);
            let media_name = add_texture_media(&mut work, &name, &resolved);
            textured.push((index, media_name));
        }

        let new_id = Uuid::new_v4();
        let resource = &mut work.materials[index];
        resource.id = new_id;
        resource.state = MaterialState::Local { params };
        let slots = work.rewrite_material_slots(old_id, new_id);
        tracing::debug!("baked {} ({} slots rewritten)", name, slots);
        report.baked.push(name);
    }

    for media in &mut work.media {
        if options.pack {
            if pack_media(media, base_dir)? {
                report.packed.push(media.name.clone());
            }
        } else if media.is_external() {
            ensure_media_exists(media, base_dir)?;
        }
    }

    for (index, media_name) in textured {
        let path = work.media_named(&media_name).map(|m| m.path.clone());
        if let MaterialState::Local { params } = &mut work.materials[index].state {
            params.base_color_texture = path;
        }
    }

    report.remaining = RemainingLinked::of(&work);
    if report.remaining.is_self_contained() {
        tracing::info!(
            "baked {} materials, packed {} media; {} is self-contained",
            report.baked.len(),
            report.packed.len(),
            work.name
        );
    } else {
        tracing::warn!(
            "remaining linked: materials={} media={} libraries=[{}]",
            report.remaining.materials.len(),
            report.remaining.media.len(),
            report.remaining.libraries.join(", ")
        );
    }

    *doc = work;
    Ok(report)
}

fn add_texture_media(doc: &mut AssetDocument, material: &str, path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}_base_color", material));
    match doc.media_named(&file) {
        Some(existing) if existing.path == display => file,
        Some(_) => {
            let name = format!("{}__{}", material, file);
            if doc.media_named(&name).is_none() {
                doc.media.push(MediaResource::external(name.clone(), display));
            }
            name
        }
        None => {
            doc.media.push(MediaResource::external(file.clone(), display));
            file
        }
    }
}

/// Link then bake into a new document, leaving `dev` untouched.
pub fn link_then_bake(
    dev: &AssetDocument,
    library: &LibraryDocument,
    library_path: &Path,
    base_dir: &Path,
    options: &SyncOptions,
) -> PosterResult<(AssetDocument, LinkReport, BakeReport)> {
    let mut compiled = dev.clone();
    let link_report = link(&mut compiled, library, library_path, &options.patterns);
    let mut libraries = LibrarySet::new(base_dir);
    libraries.insert(library_path, library.clone());
    let bake_report = bake(&mut compiled, &mut libraries, base_dir, options)?;
    Ok((compiled, link_report, bake_report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poster_ir::builder::{unit_cube, AssetDocumentBuilder};
    use poster_ir::{Entity, LibraryMaterial, MaterialParams};

    fn library() -> LibraryDocument {
        let mut lib = LibraryDocument::new();
        for (name, roughness) in [("MAT_Plastic_Black", 0.45), ("MAT_Steel_Polished", 0.12), ("MAT_Rubber_Black", 0.8)] {
            lib.materials.push(LibraryMaterial {
                id: Uuid::new_v4(),
                name: name.into(),
                params: MaterialParams {
                    roughness,
                    ..MaterialParams::default()
                },
                description: None,
                tags: vec![],
            });
        }
        lib
    }

    #[test]
    fn test_link_filters_and_refreshes() {
        let lib = library();
        let mut doc = AssetDocument::new("a");
        let report = link(&mut doc, &lib, Path::new("lib.json"), &["MAT_*_Black".to_string()]);
        assert_eq!(report.linked, vec!["MAT_Plastic_Black", "MAT_Rubber_Black"]);
        assert_eq!(doc.linked_material_count(), 2);

        let report = link(&mut doc, &lib, Path::new("moved/lib.json"), &[]);
        assert_eq!(report.linked, vec!["MAT_Steel_Polished"]);
        assert_eq!(report.refreshed.len(), 2);
        match &doc.material_named("MAT_Plastic_Black").unwrap().state {
            MaterialState::Linked { library, .. } => assert_eq!(library, Path::new("moved/lib.json")),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_used_only_leaves_unused_linked() {
        let lib = library();
        let mut builder = AssetDocumentBuilder::new("a");
        builder.entity_in("SRC_a", Entity::mesh("body", unit_cube()));
        let mut doc = builder.build();
        link(&mut doc, &lib, Path::new("lib.json"), &[]);
        let steel = doc.material_named("MAT_Steel_Polished").unwrap().id;
        if let Some(poster_ir::EntityData::Mesh(mesh)) = doc.entity_mut("body").map(|e| &mut e.data) {
            mesh.material_slots.push(Some(steel));
        }

        let mut libraries = LibrarySet::new(".");
        libraries.insert("lib.json", lib.clone());
        let options = SyncOptions {
            used_only: true,
            ..SyncOptions::default()
        };
        let report = bake(&mut doc, &mut libraries, Path::new("."), &options).unwrap();
        assert_eq!(report.baked, vec!["MAT_Steel_Polished"]);
        assert_eq!(report.skipped_unused.len(), 2);
        assert_eq!(report.remaining.materials.len(), 2);
        assert!(!report.remaining.is_self_contained());
        assert_eq!(report.remaining.libraries, vec!["lib.json"]);
    }
}
