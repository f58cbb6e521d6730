use std::path::{Path, PathBuf};

use poster_compose::{ResolutionStep, SceneBuilder};
use poster_core::hash::fingerprint;
use poster_ir::builder::AssetDocumentBuilder;
use poster_ir::document::to_canonical_string;
use poster_ir::{save_document, ManifestDocument, NodeContent, SceneDocument};

fn workspace(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("poster_compose_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("poster")).unwrap();
    std::fs::create_dir_all(dir.join("assets")).unwrap();
    dir
}

fn write_fixtures(root: &Path) {
    let stage = AssetDocumentBuilder::stage("stage").build();
    save_document(&stage, &root.join("assets/stage.json")).unwrap();
    std::fs::write(root.join("poster/logo.png"), b"not really a png").unwrap();
}

fn manifest_text(logo_enabled: bool, group: &str) -> String {
    format!(
        r#"{{
        "poster": {{"size_mm": 1219.2, "ppi": 150}},
        "camera": {{"location_mm": [0, -1200, 600], "target_mm": [0, 0, 0]}},
        "lights": [{{"name": "LIGHT_Key", "location_mm": [1000, -1000, 1500], "target_mm": [0, 0, 0]}}],
        "objects": [
            {{"name": "stage", "kind": "import_reference", "filepath": "assets/stage.json",
              "group_name": "{group}", "import_scale": 2.0}},
            {{"name": "stage_copy", "kind": "import_reference", "filepath": "assets/stage.json",
              "group_name": "EXPORT_stage", "link_mode": "copy", "location_mm": [500, 0, 0],
              "rig_pose": {{"yaw_deg": 30, "pitch_deg": 10}}}},
            {{"name": "logo", "kind": "image_plane", "image_path": "logo.png", "space": "poster",
              "poster_xy_mm": [-400, 400], "size_mm": 200, "z_mm": 100, "screen_lock": true,
              "container": "OVERLAY", "enabled": {logo_enabled}}},
            {{"name": "backdrop", "kind": "primitive", "shape": "cyclorama"}},
            {{"name": "title", "kind": "text", "body": "Poster", "space": "poster",
              "poster_xy_mm": [0, -500], "container": "OVERLAY"}},
            {{"name": "pointer", "kind": "primitive", "shape": "cube", "size_mm": 20,
              "space": "poster", "poster_xy_mm": [300, 300],
              "aim": {{"target": "stage", "track_axis": "Z", "up_axis": "Y"}}}}
        ]
    }}"#
    )
}

fn load_manifest(root: &Path, text: &str) -> ManifestDocument {
    let path = root.join("poster/manifest.json");
    std::fs::write(&path, text).unwrap();
    ManifestDocument::load(&path).unwrap()
}

#[test]
fn test_rebuild_is_idempotent() {
    let root = workspace("idempotent");
    write_fixtures(&root);
    let manifest = load_manifest(&root, &manifest_text(true, "EXPORT_stage"));

    let mut scene = SceneDocument::new();
    let report = SceneBuilder::new(&manifest).build(&mut scene).unwrap();
    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.built.len(), 6);
    let first = to_canonical_string(&scene).unwrap();
    let first_print = fingerprint(&scene).unwrap();

    let report = SceneBuilder::new(&manifest).build(&mut scene).unwrap();
    assert!(report.removed.is_empty());
    assert_eq!(to_canonical_string(&scene).unwrap(), first);
    assert_eq!(fingerprint(&scene).unwrap(), first_print);

    // a fresh scene yields the same bytes as a rebuilt one
    let mut fresh = SceneDocument::new();
    SceneBuilder::new(&manifest).build(&mut fresh).unwrap();
    assert_eq!(to_canonical_string(&fresh).unwrap(), first);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_disabling_an_entry_removes_only_its_subtree() {
    let root = workspace("bounded");
    write_fixtures(&root);
    let mut scene = SceneDocument::new();
    let manifest = load_manifest(&root, &manifest_text(true, "EXPORT_stage"));
    SceneBuilder::new(&manifest).build(&mut scene).unwrap();
    let before = scene.clone();

    let manifest = load_manifest(&root, &manifest_text(false, "EXPORT_stage"));
    let report = SceneBuilder::new(&manifest).build(&mut scene).unwrap();
    assert_eq!(report.removed, vec!["OVERLAY/logo".to_string()]);
    assert_eq!(report.skipped, vec!["OVERLAY/logo".to_string()]);
    assert!(scene.subtree("OVERLAY", "logo").is_none());

    for (container, name) in before.subtree_paths() {
        if name == "logo" {
            continue;
        }
        assert_eq!(
            serde_json::to_string(scene.subtree(&container, &name).unwrap()).unwrap(),
            serde_json::to_string(before.subtree(&container, &name).unwrap()).unwrap(),
            "{}/{} changed",
            container,
            name
        );
    }
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_removed_entries_are_cleaned_up() {
    let root = workspace("orphans");
    write_fixtures(&root);
    let mut scene = SceneDocument::new();
    let manifest = load_manifest(&root, &manifest_text(true, "EXPORT_stage"));
    SceneBuilder::new(&manifest).build(&mut scene).unwrap();

    let manifest = load_manifest(
        &root,
        r#"{"camera": {"location_mm": [0, -1200, 600]},
            "objects": [{"name": "title", "kind": "text", "body": "Poster", "container": "OVERLAY"}]}"#,
    );
    let report = SceneBuilder::new(&manifest).build(&mut scene).unwrap();
    assert_eq!(report.removed.len(), 5);
    assert_eq!(scene.subtree_paths(), vec![("OVERLAY".to_string(), "title".to_string())]);
    assert!(!scene.containers.contains_key("WORLD"));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_missing_group_falls_back_and_is_reported() {
    let root = workspace("fallback");
    write_fixtures(&root);
    let manifest = load_manifest(&root, &manifest_text(true, "EXPORT_missing"));
    let mut scene = SceneDocument::new();
    let report = SceneBuilder::new(&manifest).build(&mut scene).unwrap();
    assert!(report.is_success());
    assert_eq!(report.fallback_count(), 1);
    let fallback = report.resolutions.iter().find(|r| r.is_fallback()).unwrap();
    assert_eq!(fallback.step, ResolutionStep::AnyExport);
    assert_eq!(fallback.group, "EXPORT_stage");

    let stage = scene.subtree("WORLD", "stage").unwrap();
    match &stage.nodes[1].content {
        NodeContent::Instance {
            group,
            requested_group,
            ..
        } => {
            assert_eq!(group, "EXPORT_stage");
            assert_eq!(requested_group, "EXPORT_missing");
        }
        other => panic!("unexpected content {:?}", other),
    }
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_copy_mode_and_overlay_details() {
    let root = workspace("details");
    write_fixtures(&root);
    let manifest = load_manifest(&root, &manifest_text(true, "EXPORT_stage"));
    let mut scene = SceneDocument::new();
    SceneBuilder::new(&manifest).build(&mut scene).unwrap();

    let copy = scene.subtree("WORLD", "stage_copy").unwrap();
    assert_eq!(copy.nodes.len(), 5);
    assert!(copy.nodes.iter().skip(1).all(|n| n.parent.is_some()));
    assert!(copy.nodes.iter().any(|n| n.name == "stage_copy__stage_body"));

    let logo = scene.subtree("OVERLAY", "logo").unwrap();
    let image = &logo.nodes[1];
    assert!(!image.visibility.unwrap().shadow);
    match &image.content {
        NodeContent::ImagePlane { width_mm, .. } => {
            let d = scene.poster.plane_distance_mm;
            assert!((width_mm - 200.0 * (d - 100.0) / d).abs() < 1e-9);
        }
        other => panic!("unexpected content {:?}", other),
    }

    let pointer = scene.subtree("WORLD", "pointer").unwrap();
    assert!(pointer.nodes[0].properties.contains_key("aim_residual"));
    let _ = std::fs::remove_dir_all(&root);
}
