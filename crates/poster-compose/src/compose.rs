//! Scene graph builder.
//!
//! Every enabled manifest entry owns exactly one subtree, keyed
//! `<container>/<name>`. A build replaces the subtrees it produces, removes
//! the ones whose entry is disabled or gone, and regenerates the camera,
//! lights, world settings and guides from the manifest. Running it twice
//! against the same manifest yields the same document.

use std::collections::HashSet;
use std::path::PathBuf;

use glam::DVec3;

use poster_core::{Axis, PosterError, PosterResult, TrackAxis, Transform};
use poster_ir::manifest::{ImportReference, LightSpec, LinkMode, ManifestDocument, ObjectEntry, ObjectKind, Placement};
use poster_ir::scene::{PosterInfo, Visibility};
use poster_ir::{validate_manifest, NodeContent, SceneDocument, SceneNode, Subtree};

use crate::content;
use crate::paths::resolve_manifest_path;
use crate::resolver::{AssetResolver, Resolution};
use crate::transform::{aim_rotation, ResolvedTransform, TransformResolver};

pub const POSTER_GUIDE: &str = "REF_PosterImagePlane";
pub const SAFE_AREA_GUIDE: &str = "REF_SafeArea";

/// One entry that could not be built.
#[derive(Debug)]
pub struct EntryFailure {
    pub entry: String,
    pub error: PosterError,
}

/// What a build did, entry by entry.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// `<container>/<name>` of every subtree written.
    pub built: Vec<String>,
    /// Subtrees removed because their entry is disabled or no longer exists.
    pub removed: Vec<String>,
    /// Disabled entries.
    pub skipped: Vec<String>,
    pub resolutions: Vec<Resolution>,
    pub failures: Vec<EntryFailure>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn fallback_count(&self) -> usize {
        self.resolutions.iter().filter(|r| r.is_fallback()).count()
    }
}

/// Builds a [`SceneDocument`] from one manifest.
pub struct SceneBuilder<'a> {
    manifest: &'a ManifestDocument,
    ppi: Option<u32>,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(manifest: &'a ManifestDocument) -> Self {
        Self { manifest, ppi: None }
    }

    /// Override the manifest's output ppi.
    pub fn with_ppi(mut self, ppi: Option<u32>) -> Self {
        self.ppi = ppi;
        self
    }

    /// Bring `scene` in line with the manifest.
    ///
    /// Structural problems abort before `scene` is touched. Per-entry
    /// failures are collected in the report; the failed entry's stale
    /// subtree is removed and the other entries are still built.
    pub fn build(&self, scene: &mut SceneDocument) -> Result<BuildReport, Vec<PosterError>> {
        validate_manifest(self.manifest)?;
        let placement = TransformResolver::new(self.manifest).map_err(|e| vec![e])?;

        let poster = self.poster_info(&placement).map_err(|e| vec![e])?;
        let camera = self.camera_node(&placement);
        let lights = self.light_nodes().map_err(|e| vec![e])?;
        let helpers = self.guide_nodes(&placement);

        scene.poster = poster;
        scene.render = self.manifest.render.options.clone();
        scene.world = self.manifest.world.clone();
        scene.camera = Some(camera);
        scene.lights = lights;
        scene.helpers = helpers;

        let mut report = BuildReport::default();
        let mut assets = AssetResolver::new();

        for entry in &self.manifest.objects {
            let path = entry.path();
            if !entry.enabled {
                tracing::debug!("skipping disabled entry {}", path);
                report.skipped.push(path.clone());
                if scene.remove_subtree(&entry.container, &entry.name).is_some() {
                    report.removed.push(path);
                }
                continue;
            }

            match self.build_entry(entry, &placement, &mut assets, &mut report) {
                Ok(subtree) => {
                    tracing::debug!("built {} ({} nodes)", path, subtree.nodes.len());
                    scene.replace_subtree(&entry.container, &entry.name, subtree);
                    report.built.push(path);
                }
                Err(error) => {
                    tracing::error!("failed to build {}: {}", path, error);
                    scene.remove_subtree(&entry.container, &entry.name);
                    report.failures.push(EntryFailure {
                        entry: path,
                        error,
                    });
                }
            }
        }

        let known: HashSet<(&str, &str)> = self
            .manifest
            .objects
            .iter()
            .map(|o| (o.container.as_str(), o.name.as_str()))
            .collect();
        for (container, name) in scene.subtree_paths() {
            if !known.contains(&(container.as_str(), name.as_str())) {
                scene.remove_subtree(&container, &name);
                tracing::info!("removed orphaned subtree {}/{}", container, name);
                report.removed.push(format!("{}/{}", container, name));
            }
        }

        Ok(report)
    }

    fn poster_info(&self, placement: &TransformResolver<'_>) -> PosterResult<PosterInfo> {
        let poster = &self.manifest.poster;
        let ppi = self.ppi.unwrap_or(poster.ppi);
        if ppi == 0 {
            return Err(PosterError::InvalidArgument("ppi must be non-zero".into()));
        }
        Ok(PosterInfo {
            size_mm: poster.size_mm,
            ppi,
            safe_margin_mm: poster.safe_margin_mm,
            plane_distance_mm: placement.plane_distance(),
            resolution_px: poster.resolution_px(ppi),
        })
    }

    fn camera_node(&self, placement: &TransformResolver<'_>) -> SceneNode {
        let spec = &self.manifest.camera;
        let mut node = SceneNode::new(
            spec.name.clone(),
            *placement.camera(),
            NodeContent::Camera {
                lens_mm: spec.lens_mm,
                sensor_width_mm: spec.sensor_width_mm,
                clip_start_mm: spec.clip_start_mm,
                clip_end_mm: spec.clip_end_mm,
            },
        );
        node.properties
            .insert("target_mm".to_string(), serde_json::json!(spec.target_mm));
        node
    }

    fn light_nodes(&self) -> PosterResult<Vec<SceneNode>> {
        self.manifest
            .lights
            .iter()
            .filter(|l| l.settings.enabled)
            .map(light_node)
            .collect()
    }

    fn guide_nodes(&self, placement: &TransformResolver<'_>) -> Vec<SceneNode> {
        let poster = &self.manifest.poster;
        let plane = placement.on_poster_plane(0.0, 0.0, 0.0);
        let safe = poster.safe_area_mm();
        vec![
            SceneNode::new(
                POSTER_GUIDE,
                plane,
                NodeContent::Guide {
                    width_mm: poster.size_mm,
                    height_mm: poster.size_mm,
                },
            )
            .with_visibility(Visibility::hidden()),
            SceneNode::new(
                SAFE_AREA_GUIDE,
                plane,
                NodeContent::Guide {
                    width_mm: safe,
                    height_mm: safe,
                },
            )
            .with_visibility(Visibility::hidden()),
        ]
    }

    fn build_entry(
        &self,
        entry: &ObjectEntry,
        placement: &TransformResolver<'_>,
        assets: &mut AssetResolver,
        report: &mut BuildReport,
    ) -> PosterResult<Subtree> {
        let resolved = placement.resolve(entry)?;
        let k = resolved.size_factor;
        let poster_size = match &entry.placement {
            Placement::Poster(p) => p.size_mm,
            Placement::World(_) => None,
        };

        let children = match &entry.kind {
            ObjectKind::ImportReference(import) => {
                let (nodes, resolution) = self.import_nodes(entry, import, k, assets)?;
                report.resolutions.push(resolution);
                nodes
            }
            ObjectKind::ImagePlane(image) => {
                let path = self.resolve_path(&image.image_path);
                if !path.is_file() {
                    return Err(PosterError::UnresolvedMedia {
                        resource: entry.name.clone(),
                        path,
                    });
                }
                content::image_plane_nodes(&entry.name, image, &path, poster_size, k)
            }
            ObjectKind::Primitive(primitive) => content::primitive_nodes(&entry.name, primitive, k),
            ObjectKind::Text(text) => content::text_nodes(&entry.name, text, poster_size, k),
        };

        let mut nodes = Vec::with_capacity(children.len() + 1);
        nodes.push(root_node(entry, &resolved));
        nodes.extend(children);
        Ok(Subtree {
            kind: entry.kind.name().to_string(),
            nodes,
        })
    }

    fn import_nodes(
        &self,
        entry: &ObjectEntry,
        import: &ImportReference,
        size_factor: f64,
        assets: &mut AssetResolver,
    ) -> PosterResult<(Vec<SceneNode>, Resolution)> {
        let path = self.resolve_path(&import.filepath);
        let (doc, resolution) = assets.resolve(&path, &import.group_name)?;
        let scale = import.import_scale * size_factor;
        let nodes = match import.link_mode {
            LinkMode::Reference => content::instance_nodes(
                &entry.name,
                &path,
                &resolution.group,
                &resolution.requested,
                scale,
                import.rig_pose.as_ref(),
            ),
            LinkMode::Copy => content::copied_nodes(
                &entry.name,
                &doc,
                &resolution.group,
                scale,
                import.rig_pose.as_ref(),
            ),
        };
        Ok((nodes, resolution))
    }

    fn resolve_path(&self, path: &std::path::Path) -> PathBuf {
        resolve_manifest_path(self.manifest.source.as_deref(), path)
    }
}

fn root_node(entry: &ObjectEntry, resolved: &ResolvedTransform) -> SceneNode {
    let mut root = SceneNode::new(entry.name.clone(), resolved.transform, NodeContent::Empty);
    if resolved.size_factor != 1.0 {
        root.properties
            .insert("size_factor".to_string(), serde_json::json!(resolved.size_factor));
    }
    if let Some(residual) = resolved.residual {
        root.properties.insert(
            "aim_residual".to_string(),
            serde_json::json!({"distance_mm": residual.distance, "angle_deg": residual.angle_deg}),
        );
    }
    root
}

fn light_node(light: &LightSpec) -> PosterResult<SceneNode> {
    let s = &light.settings;
    let location = DVec3::from_array(s.location_mm);
    let transform = match (s.target_mm, s.rotation_deg) {
        (Some(target), _) => {
            let (rotation, _) = aim_rotation(
                &light.name,
                location,
                DVec3::from_array(target),
                TrackAxis::NegZ,
                Axis::Y,
            )?;
            Transform::from_location(location).with_rotation(rotation)
        }
        (None, Some(rotation)) => Transform::from_euler_deg(s.location_mm, rotation, [1.0; 3]),
        (None, None) => Transform::from_location(location),
    };
    Ok(SceneNode::new(
        light.name.clone(),
        transform,
        NodeContent::Light {
            kind: s.kind,
            energy: s.energy,
            color: s.color,
            size_mm: s.size_mm,
            size_xy_mm: s.size_xy_mm,
            spot_size_deg: s.spot_size_deg,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &str) -> ManifestDocument {
        ManifestDocument::parse(json).unwrap()
    }

    #[test]
    fn test_globals_rebuilt_from_manifest() {
        let m = manifest(
            r#"{"poster": {"size_mm": 1000, "ppi": 100, "safe_margin_mm": 50},
                "lights": [{"name": "LIGHT_Key", "location_mm": [1000, -1000, 1500], "target_mm": [0, 0, 0]},
                           {"name": "LIGHT_Off", "enabled": false}],
                "objects": []}"#,
        );
        let mut scene = SceneDocument::new();
        let report = SceneBuilder::new(&m).with_ppi(Some(254)).build(&mut scene).unwrap();
        assert!(report.is_success());
        assert_eq!(scene.poster.ppi, 254);
        assert_eq!(scene.poster.resolution_px, 10000);
        assert_eq!(scene.lights.len(), 1);
        assert_eq!(scene.helpers.len(), 2);
        match &scene.helpers[1].content {
            NodeContent::Guide { width_mm, .. } => assert!((width_mm - 900.0).abs() < 1e-9),
            other => panic!("unexpected content {:?}", other),
        }
        assert_eq!(scene.camera.as_ref().unwrap().name, "CAM_Poster");

        let key = &scene.lights[0];
        let forward = key.transform.rotation * DVec3::NEG_Z;
        let expected = (DVec3::ZERO - DVec3::new(1000.0, -1000.0, 1500.0)).normalize();
        assert!((forward - expected).length() < 1e-9);
    }

    #[test]
    fn test_entry_failure_does_not_stop_others() {
        let m = manifest(
            r#"{"objects": [
                {"name": "missing", "kind": "image_plane", "image_path": "/nonexistent/poster_img.png"},
                {"name": "title", "kind": "text", "body": "Hello"}
            ]}"#,
        );
        let mut scene = SceneDocument::new();
        let report = SceneBuilder::new(&m).build(&mut scene).unwrap();
        assert_eq!(report.built, vec!["WORLD/title".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].entry, "WORLD/missing");
        assert!(matches!(report.failures[0].error, PosterError::UnresolvedMedia { .. }));
        assert!(scene.subtree("WORLD", "missing").is_none());
    }

    #[test]
    fn test_structural_errors_leave_scene_untouched() {
        let m = manifest(
            r#"{"objects": [
                {"name": "a", "kind": "text", "body": "x"},
                {"name": "a", "kind": "text", "body": "y"}
            ]}"#,
        );
        let mut scene = SceneDocument::new();
        let before = scene.clone();
        let errors = SceneBuilder::new(&m).build(&mut scene).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, PosterError::DuplicateName { .. })));
        assert_eq!(scene, before);
    }

    #[test]
    fn test_screen_locked_text_is_scaled() {
        let m = manifest(
            r#"{"objects": [{"name": "t", "kind": "text", "body": "x", "space": "poster",
                "size_mm": 100, "z_mm": 300, "screen_lock": true}]}"#,
        );
        let mut scene = SceneDocument::new();
        SceneBuilder::new(&m).build(&mut scene).unwrap();
        let subtree = scene.subtree("WORLD", "t").unwrap();
        assert_eq!(subtree.kind, "text");
        let d = scene.poster.plane_distance_mm;
        let k = (d - 300.0) / d;
        match &subtree.nodes[1].content {
            NodeContent::Text { size_mm, .. } => assert!((size_mm - 100.0 * k).abs() < 1e-9),
            other => panic!("unexpected content {:?}", other),
        }
        assert_eq!(subtree.nodes[1].parent.as_deref(), Some("t"));
    }
}
