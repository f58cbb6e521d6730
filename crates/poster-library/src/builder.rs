use std::path::Path;

use uuid::Uuid;

use poster_core::{PosterError, PosterResult};
use poster_ir::document::{to_canonical_string, write_atomic_all};
use poster_ir::{load_document, validate_library, LibraryDocument, LibraryMaterial};

use crate::catalog::catalog_text;
use crate::recipes::{MaterialRecipe, RecipeStore};

/// What one library build changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryBuildSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Compiles a recipe store into a library document.
pub struct LibraryBuilder {
    library: LibraryDocument,
}

impl LibraryBuilder {
    /// Start from the library at `path` if it exists, unless `force_new` is set.
    pub fn open(path: &Path, force_new: bool) -> PosterResult<Self> {
        let library = if !force_new && path.is_file() {
            tracing::info!("updating existing library {}", path.display());
            load_library(path)?
        } else {
            tracing::info!("starting a fresh library at {}", path.display());
            LibraryDocument::new()
        };
        Ok(Self { library })
    }

    pub fn from_document(library: LibraryDocument) -> Self {
        Self { library }
    }

    /// Create or update every recipe in place. Ids of existing materials never change.
    pub fn apply(&mut self, store: &RecipeStore) -> LibraryBuildSummary {
        let mut summary = LibraryBuildSummary::default();
        for recipe in store.iter() {
            match self.library.get_mut(&recipe.name) {
                Some(existing) => {
                    if update_material(existing, recipe) {
                        tracing::debug!("updated {}", recipe.name);
                        summary.updated.push(recipe.name.clone());
                    } else {
                        summary.unchanged.push(recipe.name.clone());
                    }
                }
                None => {
                    tracing::debug!("created {}", recipe.name);
                    self.library.materials.push(LibraryMaterial {
                        id: Uuid::new_v4(),
                        name: recipe.name.clone(),
                        params: recipe.params.clone(),
                        description: recipe.description.clone(),
                        tags: recipe.tags.clone(),
                    });
                    summary.created.push(recipe.name.clone());
                }
            }
        }
        summary
    }

    pub fn library(&self) -> &LibraryDocument {
        &self.library
    }

    /// Save the library together with its regenerated catalog. Neither file
    /// is replaced unless both can be written.
    pub fn save(&self, library_path: &Path, catalog_path: &Path) -> PosterResult<()> {
        let library = to_canonical_string(&self.library)?;
        let catalog = catalog_text(&self.library)?;
        write_atomic_all(&[
            (library_path, library.as_bytes()),
            (catalog_path, catalog.as_bytes()),
        ])?;
        tracing::info!(
            "wrote catalog {} ({} materials)",
            catalog_path.display(),
            self.library.materials.len()
        );
        Ok(())
    }
}

/// Load a library document and reject it if names or ids collide.
///
/// Every collision is logged; the first one is returned.
pub fn load_library(path: &Path) -> PosterResult<LibraryDocument> {
    let library: LibraryDocument = load_document(path)?;
    if let Err(errors) = validate_library(&library) {
        for error in &errors {
            tracing::error!("{}: {}", path.display(), error);
        }
        return Err(errors
            .into_iter()
            .next()
            .unwrap_or_else(|| PosterError::document("invalid library", path)));
    }
    Ok(library)
}

fn update_material(existing: &mut LibraryMaterial, recipe: &MaterialRecipe) -> bool {
    let changed = existing.params != recipe.params
        || existing.description != recipe.description
        || existing.tags != recipe.tags;
    if changed {
        existing.params = recipe.params.clone();
        existing.description = recipe.description.clone();
        existing.tags = recipe.tags.clone();
    }
    changed
}

/// Open, apply `store`, and save library and catalog in one step.
pub fn build_library(
    store: &RecipeStore,
    library_path: &Path,
    catalog_path: &Path,
    force_new: bool,
) -> PosterResult<LibraryBuildSummary> {
    let mut builder = LibraryBuilder::open(library_path, force_new)?;
    let summary = builder.apply(store);
    builder.save(library_path, catalog_path)?;
    tracing::info!(
        "library {}: {} created, {} updated, {} unchanged",
        library_path.display(),
        summary.created.len(),
        summary.updated.len(),
        summary.unchanged.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_creates_then_updates_in_place() {
        let mut builder = LibraryBuilder::from_document(LibraryDocument::new());
        let store = RecipeStore::builtin();
        let first = builder.apply(&store);
        assert_eq!(first.created.len(), 11);
        let id = builder.library().get("MAT_Rubber_Black").unwrap().id;

        let mut recipes: Vec<MaterialRecipe> = store.iter().cloned().collect();
        recipes[2].params.roughness = 0.9;
        let edited = RecipeStore::new(recipes).unwrap();
        let second = builder.apply(&edited);
        assert_eq!(second.updated, vec!["MAT_Rubber_Black".to_string()]);
        assert_eq!(second.unchanged.len(), 10);
        assert!(second.created.is_empty());

        let rubber = builder.library().get("MAT_Rubber_Black").unwrap();
        assert_eq!(rubber.id, id);
        assert_eq!(rubber.params.roughness, 0.9);
        assert_eq!(builder.library().materials.len(), 11);
    }

    #[test]
    fn test_library_keeps_materials_not_in_recipes() {
        let mut library = LibraryDocument::new();
        library.materials.push(LibraryMaterial {
            id: Uuid::new_v4(),
            name: "MAT_Legacy_Wood".into(),
            params: Default::default(),
            description: None,
            tags: vec![],
        });
        let mut builder = LibraryBuilder::from_document(library);
        builder.apply(&RecipeStore::builtin());
        assert_eq!(builder.library().materials.len(), 12);
    }

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("poster_builder_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_open_rejects_colliding_library() {
        let dir = scratch("collide");
        let path = dir.join("materials.json");
        let mut library = LibraryDocument::new();
        for _ in 0..2 {
            library.materials.push(LibraryMaterial {
                id: Uuid::new_v4(),
                name: "MAT_Plastic_Black".into(),
                params: Default::default(),
                description: None,
                tags: vec![],
            });
        }
        poster_ir::save_document(&library, &path).unwrap();
        let before = std::fs::read(&path).unwrap();

        let err = build_library(&RecipeStore::builtin(), &path, &dir.join("catalog.json"), false).unwrap_err();
        assert!(matches!(err, PosterError::DuplicateName { .. }), "got {err}");
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!dir.join("catalog.json").exists());
        assert!(LibraryBuilder::open(&path, true).is_ok());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_catalog_write_keeps_library() {
        let dir = scratch("catalog");
        let path = dir.join("materials.json");
        build_library(&RecipeStore::builtin(), &path, &dir.join("catalog.json"), false).unwrap();
        let before = std::fs::read(&path).unwrap();

        let mut recipes: Vec<MaterialRecipe> = RecipeStore::builtin().iter().cloned().collect();
        recipes[0].params.roughness = 0.123;
        let edited = RecipeStore::new(recipes).unwrap();
        std::fs::write(dir.join("blocked"), b"").unwrap();
        let blocked = dir.join("blocked").join("catalog.json");
        assert!(build_library(&edited, &path, &blocked, false).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
