use std::path::{Path, PathBuf};

use poster_core::PosterError;
use poster_ir::builder::AssetDocumentBuilder;
use poster_ir::{load_document, save_document, AssetDocument, LibraryDocument, MaterialParams, MaterialState};
use poster_library::{
    bake, build_library, link, link_then_bake, verify_packed, LibrarySet, MaterialRecipe, RecipeStore, SyncOptions,
};

fn workspace(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("poster_sync_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("library/textures")).unwrap();
    std::fs::create_dir_all(dir.join("assets/textures")).unwrap();
    dir
}

fn library_paths(root: &Path) -> (PathBuf, PathBuf) {
    (
        root.join("library/materials.json"),
        root.join("library/materials_catalog.json"),
    )
}

fn stage_with_label(root: &Path) -> AssetDocument {
    std::fs::write(root.join("assets/textures/label.png"), b"label pixels").unwrap();
    let mut builder = AssetDocumentBuilder::stage("stage");
    builder.media("label.png", "textures/label.png");
    builder.build()
}

#[test]
fn test_rebuild_updates_in_place() {
    let root = workspace("rebuild");
    let (library_path, catalog_path) = library_paths(&root);

    let first = build_library(&RecipeStore::builtin(), &library_path, &catalog_path, false).unwrap();
    assert_eq!(first.created.len(), 11);
    let before: LibraryDocument = load_document(&library_path).unwrap();

    let mut recipes: Vec<MaterialRecipe> = RecipeStore::builtin().iter().cloned().collect();
    recipes[0].params.roughness = 0.5;
    let second = build_library(&RecipeStore::new(recipes).unwrap(), &library_path, &catalog_path, false).unwrap();
    assert_eq!(second.updated, vec!["MAT_Plastic_Black".to_string()]);
    assert!(second.created.is_empty());

    let after: LibraryDocument = load_document(&library_path).unwrap();
    assert_eq!(after.materials.len(), before.materials.len());
    for material in &before.materials {
        assert_eq!(after.get(&material.name).unwrap().id, material.id);
    }

    let catalog: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&catalog_path).unwrap()).unwrap();
    assert_eq!(catalog.as_array().unwrap().len(), 11);
    assert_eq!(catalog[0]["name"], "MAT_Aluminum_Brushed");

    // a forced rebuild starts over with fresh ids
    build_library(&RecipeStore::builtin(), &library_path, &catalog_path, true).unwrap();
    let fresh: LibraryDocument = load_document(&library_path).unwrap();
    assert_ne!(
        fresh.get("MAT_Plastic_Black").unwrap().id,
        before.get("MAT_Plastic_Black").unwrap().id
    );
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_bake_makes_asset_self_contained() {
    let root = workspace("bake");
    let (library_path, catalog_path) = library_paths(&root);
    std::fs::write(root.join("library/textures/grain.png"), b"grain pixels").unwrap();
    let mut recipes: Vec<MaterialRecipe> = RecipeStore::builtin().iter().cloned().collect();
    recipes[1].params.base_color_texture = Some("textures/grain.png".into());
    build_library(&RecipeStore::new(recipes).unwrap(), &library_path, &catalog_path, false).unwrap();
    let library: LibraryDocument = load_document(&library_path).unwrap();

    let mut doc = stage_with_label(&root);
    let report = link(&mut doc, &library, &library_path, &[]);
    assert_eq!(report.linked.len(), 11);
    let white_id = doc.material_named("MAT_Plastic_White").unwrap().id;
    if let Some(poster_ir::EntityData::Mesh(mesh)) = doc.entity_mut("stage_body").map(|e| &mut e.data) {
        mesh.material_slots.push(Some(white_id));
    }

    let mut libraries = LibrarySet::new(root.join("assets"));
    let report = bake(&mut doc, &mut libraries, &root.join("assets"), &SyncOptions::default()).unwrap();
    assert_eq!(report.baked.len(), 11);
    assert!(report.remaining.is_self_contained());
    assert_eq!(doc.linked_material_count(), 0);
    assert_eq!(doc.external_media_count(), 0);
    assert!(verify_packed(&doc).is_ok());

    let white = doc.material_named("MAT_Plastic_White").unwrap();
    assert_ne!(white.id, white_id);
    match &white.state {
        MaterialState::Local { params } => {
            assert_eq!(params.base_color_texture.as_deref(), Some("//packed/grain.png"))
        }
        other => panic!("unexpected state {:?}", other),
    }
    match &doc.entity("stage_body").unwrap().data {
        poster_ir::EntityData::Mesh(mesh) => assert_eq!(mesh.material_slots, vec![Some(white.id)]),
        other => panic!("unexpected data {:?}", other),
    }
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_link_leaves_local_forks_alone() {
    let root = workspace("forks");
    let (library_path, catalog_path) = library_paths(&root);
    build_library(&RecipeStore::builtin(), &library_path, &catalog_path, false).unwrap();
    let library: LibraryDocument = load_document(&library_path).unwrap();

    let fork = MaterialParams {
        roughness: 0.99,
        ..MaterialParams::default()
    };
    let mut builder = AssetDocumentBuilder::stage("stage");
    builder.local_material("MAT_Rubber_Black", fork.clone(), Some("stage_body"));
    let mut doc = builder.build();

    let report = link(&mut doc, &library, &library_path, &["MAT_Rubber_*".to_string()]);
    assert!(report.linked.is_empty());
    assert_eq!(report.skipped_local, vec!["MAT_Rubber_Black".to_string()]);
    match &doc.material_named("MAT_Rubber_Black").unwrap().state {
        MaterialState::Local { params } => assert_eq!(params, &fork),
        other => panic!("unexpected state {:?}", other),
    }
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_missing_media_fails_without_changes() {
    let root = workspace("missing");
    let (library_path, catalog_path) = library_paths(&root);
    build_library(&RecipeStore::builtin(), &library_path, &catalog_path, false).unwrap();
    let library: LibraryDocument = load_document(&library_path).unwrap();

    let mut builder = AssetDocumentBuilder::stage("stage");
    builder.media("decal.png", "textures/decal.png");
    let mut doc = builder.build();
    link(&mut doc, &library, &library_path, &[]);
    let asset_path = root.join("assets/stage.json");
    save_document(&doc, &asset_path).unwrap();
    let before = doc.clone();

    let mut libraries = LibrarySet::new(root.join("assets"));
    let err = bake(&mut doc, &mut libraries, &root.join("assets"), &SyncOptions::default()).unwrap_err();
    match err {
        PosterError::UnresolvedMedia { resource, .. } => assert_eq!(resource, "decal.png"),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(doc, before);
    let on_disk: AssetDocument = load_document(&asset_path).unwrap();
    assert_eq!(on_disk, before);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_link_then_bake_keeps_dev_document() {
    let root = workspace("compile");
    let (library_path, catalog_path) = library_paths(&root);
    build_library(&RecipeStore::builtin(), &library_path, &catalog_path, false).unwrap();
    let library: LibraryDocument = load_document(&library_path).unwrap();

    let dev = stage_with_label(&root);
    let (compiled, link_report, bake_report) = link_then_bake(
        &dev,
        &library,
        &library_path,
        &root.join("assets"),
        &SyncOptions::default(),
    )
    .unwrap();
    assert_eq!(link_report.linked.len(), 11);
    assert_eq!(bake_report.packed, vec!["label.png".to_string()]);
    assert!(compiled.is_self_contained());

    assert!(dev.materials.is_empty());
    assert_eq!(dev.external_media_count(), 1);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_pack_disabled_reports_remaining_media() {
    let root = workspace("nopack");
    let mut doc = stage_with_label(&root);
    let mut libraries = LibrarySet::new(root.join("assets"));
    let options = SyncOptions {
        pack: false,
        ..SyncOptions::default()
    };
    let report = bake(&mut doc, &mut libraries, &root.join("assets"), &options).unwrap();
    assert!(report.packed.is_empty());
    assert_eq!(report.remaining.media, vec!["label.png".to_string()]);
    assert!(!report.remaining.is_self_contained());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_bake_with_relative_paths() {
    let root = PathBuf::from(format!("sync_relative_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&root);
    std::fs::create_dir_all(root.join("library/textures")).unwrap();
    std::fs::create_dir_all(root.join("assets/textures")).unwrap();
    let (library_path, catalog_path) = library_paths(&root);
    std::fs::write(root.join("library/textures/grain.png"), b"grain pixels").unwrap();
    let mut recipes: Vec<MaterialRecipe> = RecipeStore::builtin().iter().cloned().collect();
    recipes[1].params.base_color_texture = Some("textures/grain.png".into());
    build_library(&RecipeStore::new(recipes).unwrap(), &library_path, &catalog_path, false).unwrap();
    let library: LibraryDocument = load_document(&library_path).unwrap();
    let assets = root.join("assets");

    let mut doc = stage_with_label(&root);
    link(&mut doc, &library, &library_path, &[]);
    let mut libraries = LibrarySet::new(&assets);
    let report = bake(&mut doc, &mut libraries, &assets, &SyncOptions::default()).unwrap();
    assert!(report.remaining.is_self_contained());
    assert!(report.packed.contains(&"grain.png".to_string()), "packed: {:?}", report.packed);
    assert!(verify_packed(&doc).is_ok());

    let dev = stage_with_label(&root);
    let (compiled, _, report) = link_then_bake(&dev, &library, &library_path, &assets, &SyncOptions::default()).unwrap();
    assert!(report.remaining.is_self_contained());
    assert!(compiled.is_self_contained());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_bake_rejects_colliding_library() {
    let root = workspace("collide");
    let (library_path, catalog_path) = library_paths(&root);
    build_library(&RecipeStore::builtin(), &library_path, &catalog_path, false).unwrap();
    let library: LibraryDocument = load_document(&library_path).unwrap();
    let mut doc = AssetDocumentBuilder::stage("stage").build();
    link(&mut doc, &library, &library_path, &[]);

    let mut broken = library.clone();
    broken.materials[1].name = broken.materials[0].name.clone();
    save_document(&broken, &library_path).unwrap();

    let before = doc.clone();
    let mut libraries = LibrarySet::new(root.join("assets"));
    let err = bake(&mut doc, &mut libraries, &root.join("assets"), &SyncOptions::default()).unwrap_err();
    assert!(matches!(err, PosterError::DuplicateName { .. }), "got {err}");
    assert_eq!(doc, before);
    let _ = std::fs::remove_dir_all(&root);
}
