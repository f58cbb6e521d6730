//! Stage frame layouts.
//!
//! A frames manifest lists poses of a stage asset over time. Each layout
//! duplicates the stage once per frame, drives the yaw and pitch handles of
//! the copy, and optionally spreads the copies along +Z so time reads as
//! height. A ghost trail fades earlier frames.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

use poster_core::rig::StageRigNames;
use poster_core::{PosterError, PosterResult, Transform};
use poster_ir::asset::{EntityData, Group};
use poster_ir::AssetDocument;

/// Prefix of the top-level group of each generated layout.
pub const LAYOUT_GROUP_PREFIX: &str = "TRIAL_STAGE__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAsset {
    #[serde(alias = "blend_path")]
    pub path: PathBuf,
    #[serde(alias = "export_collection")]
    pub export_group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub enabled: bool,
    pub base_location: [f64; 3],
    pub z_span_factor: f64,
}

impl LayoutSettings {
    fn with_factor(z_span_factor: f64) -> Self {
        Self {
            enabled: true,
            base_location: [0.0; 3],
            z_span_factor,
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self::with_factor(0.0)
    }
}

fn default_stacked() -> LayoutSettings {
    LayoutSettings::with_factor(0.0)
}

fn default_timez() -> LayoutSettings {
    LayoutSettings::with_factor(0.2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layouts {
    #[serde(default = "default_stacked")]
    pub stacked: LayoutSettings,
    #[serde(default = "default_timez")]
    pub timez: LayoutSettings,
}

impl Default for Layouts {
    fn default() -> Self {
        Self {
            stacked: default_stacked(),
            timez: default_timez(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub frame: u32,
    #[serde(default)]
    pub yaw_deg: f64,
    #[serde(default)]
    pub pitch_deg: f64,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub t_norm: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostTrail {
    pub enabled: bool,
    pub alpha_first: f64,
    pub alpha_pre_last: f64,
}

impl Default for GhostTrail {
    fn default() -> Self {
        Self {
            enabled: false,
            alpha_first: 0.15,
            alpha_pre_last: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramesManifest {
    pub source_asset: SourceAsset,
    #[serde(default)]
    pub stage_rig: StageRigNames,
    #[serde(default)]
    pub layouts: Layouts,
    pub frames: Vec<FrameSpec>,
    #[serde(default)]
    pub ghost_trail: GhostTrail,
}

impl FramesManifest {
    pub fn load(path: &Path) -> PosterResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&text)
            .map_err(|e| PosterError::document(format!("invalid frames manifest: {}", e), path))?;
        if manifest.frames.is_empty() {
            return Err(PosterError::document("frames manifest lists no frames", path));
        }
        Ok(manifest)
    }
}

/// Which layouts to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutSelection {
    Stacked,
    TimeZ,
    #[default]
    Both,
}

impl LayoutSelection {
    fn wants(self, layout: &str) -> bool {
        match self {
            LayoutSelection::Both => true,
            LayoutSelection::Stacked => layout == "stacked",
            LayoutSelection::TimeZ => layout == "timez",
        }
    }
}

/// Linear ramp from the first frame to the penultimate one; the last frame is opaque.
pub fn compute_trail_alpha(idx: u32, n: usize, alpha_first: f64, alpha_pre_last: f64) -> f64 {
    if n <= 1 || idx as usize + 1 >= n {
        return 1.0;
    }
    if n == 2 {
        return alpha_first.clamp(0.0, 1.0);
    }
    let t = idx as f64 / (n - 2) as f64;
    (alpha_first + (alpha_pre_last - alpha_first) * t).clamp(0.0, 1.0)
}

/// World matrix of an entity, walking its parent chain.
fn world_matrix(doc: &AssetDocument, name: &str) -> DMat4 {
    doc.ancestor_chain(name)
        .iter()
        .rev()
        .filter_map(|n| doc.entity(n))
        .fold(DMat4::IDENTITY, |acc, e| acc * e.transform.to_matrix())
}

/// Height of the world-space bounding box of every mesh among `entities`.
pub fn world_z_span(doc: &AssetDocument, entities: &[String]) -> f64 {
    let mut range: Option<(f64, f64)> = None;
    for name in entities {
        let Some(EntityData::Mesh(mesh)) = doc.entity(name).map(|e| &e.data) else {
            continue;
        };
        let world = world_matrix(doc, name);
        for v in &mesh.vertices {
            let z = world.transform_point3(DVec3::from_array(*v)).z;
            range = Some(match range {
                Some((lo, hi)) => (lo.min(z), hi.max(z)),
                None => (z, z),
            });
        }
    }
    range.map(|(lo, hi)| hi - lo).unwrap_or(0.0)
}

/// Summary of one generated layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutReport {
    pub group: String,
    pub frames: usize,
    pub z_total: f64,
}

fn frame_suffix(layout: &str, frame: u32) -> String {
    format!("{}__F{:03}", layout, frame)
}

/// Generate the selected layouts into `doc`, replacing any generated earlier.
pub fn generate_layouts(
    doc: &mut AssetDocument,
    manifest: &FramesManifest,
    selection: LayoutSelection,
) -> PosterResult<Vec<LayoutReport>> {
    remove_layouts(doc);

    let export = &manifest.source_asset.export_group;
    if doc.group(export).is_none() {
        return Err(PosterError::AssetGroupNotFound {
            path: manifest.source_asset.path.clone(),
            requested: export.clone(),
            available: doc.group_names(),
        });
    }
    let template = doc.group_entity_names(export);
    let rig = &manifest.stage_rig;
    for handle in [&rig.root_name, &rig.yaw_name, &rig.pitch_name] {
        if !template.contains(handle) {
            return Err(PosterError::Other(format!(
                "stage rig handle '{}' not found under '{}'",
                handle, export
            )));
        }
    }

    let mut reports = Vec::new();
    for (name, settings) in [
        ("stacked", &manifest.layouts.stacked),
        ("timez", &manifest.layouts.timez),
    ] {
        if !selection.wants(name) || !settings.enabled {
            continue;
        }
        let report = build_layout(doc, manifest, &template, name, settings);
        tracing::info!(
            "built layout {} ({} frames, z span {:.1} mm)",
            report.group,
            report.frames,
            report.z_total
        );
        reports.push(report);
    }
    Ok(reports)
}

fn build_layout(
    doc: &mut AssetDocument,
    manifest: &FramesManifest,
    template: &[String],
    layout: &str,
    settings: &LayoutSettings,
) -> LayoutReport {
    let rig = &manifest.stage_rig;
    let n = manifest.frames.len();
    let z_total = if settings.z_span_factor != 0.0 {
        world_z_span(doc, template) * settings.z_span_factor
    } else {
        0.0
    };
    let ghost = &manifest.ghost_trail;

    let originals: Vec<_> = template.iter().filter_map(|name| doc.entity(name).cloned()).collect();
    let top_name = format!("{}{}", LAYOUT_GROUP_PREFIX, layout);
    let mut top = Group::new(top_name.clone());

    for spec in &manifest.frames {
        let suffix = frame_suffix(layout, spec.frame);
        let renamed: HashMap<&str, String> = originals
            .iter()
            .map(|e| (e.name.as_str(), format!("{}__{}", e.name, suffix)))
            .collect();

        let mut group = Group::new(format!("{}__{}", suffix, spec.phase));
        for original in &originals {
            let mut copy = original.clone();
            copy.name = renamed[original.name.as_str()].clone();
            copy.parent = original
                .parent
                .as_deref()
                .and_then(|p| renamed.get(p).cloned());

            if original.name == rig.root_name {
                let z_off = if n > 1 {
                    z_total * (spec.frame as f64 / (n - 1) as f64)
                } else {
                    0.0
                };
                copy.transform.location = DVec3::from_array(settings.base_location) + DVec3::new(0.0, 0.0, z_off);
                copy.properties = frame_properties(spec, n, ghost);
            } else if original.name == rig.yaw_name {
                copy.set_rig_angle(rig.yaw_axis, spec.yaw_deg * rig.yaw_sign);
            } else if original.name == rig.pitch_name {
                copy.set_rig_angle(rig.pitch_axis, spec.pitch_deg * rig.pitch_sign);
            }

            if ghost.enabled && matches!(copy.data, EntityData::Mesh(_)) {
                let alpha = compute_trail_alpha(spec.frame, n, ghost.alpha_first, ghost.alpha_pre_last);
                copy.properties
                    .insert("color_alpha".to_string(), serde_json::json!(alpha));
            }

            group.entities.push(copy.name.clone());
            doc.entities.push(copy);
        }
        top.children.push(group.name.clone());
        doc.groups.push(group);
    }
    doc.groups.push(top);

    LayoutReport {
        group: top_name,
        frames: n,
        z_total,
    }
}

fn frame_properties(spec: &FrameSpec, n: usize, ghost: &GhostTrail) -> BTreeMap<String, serde_json::Value> {
    let t_norm = spec
        .t_norm
        .unwrap_or(spec.frame as f64 / n.saturating_sub(1).max(1) as f64);
    let mut props = BTreeMap::new();
    props.insert("frame".to_string(), serde_json::json!(spec.frame));
    props.insert("t_norm".to_string(), serde_json::json!(t_norm));
    props.insert("phase".to_string(), serde_json::json!(spec.phase));
    props.insert("yaw_deg".to_string(), serde_json::json!(spec.yaw_deg));
    props.insert("pitch_deg".to_string(), serde_json::json!(spec.pitch_deg));
    if ghost.enabled {
        let alpha = compute_trail_alpha(spec.frame, n, ghost.alpha_first, ghost.alpha_pre_last);
        props.insert("alpha".to_string(), serde_json::json!(alpha));
    }
    props
}

/// Remove every generated layout group, its frame groups and their entities.
pub fn remove_layouts(doc: &mut AssetDocument) -> usize {
    let tops: Vec<String> = doc
        .groups
        .iter()
        .filter(|g| g.name.starts_with(LAYOUT_GROUP_PREFIX))
        .map(|g| g.name.clone())
        .collect();
    if tops.is_empty() {
        return 0;
    }
    let mut doomed_groups: Vec<String> = tops.clone();
    let mut doomed_entities = Vec::new();
    for top in &tops {
        doomed_entities.extend(doc.group_entity_names(top));
        if let Some(g) = doc.group(top) {
            doomed_groups.extend(g.children.iter().cloned());
        }
    }
    doc.groups.retain(|g| !doomed_groups.contains(&g.name));
    doc.entities.retain(|e| !doomed_entities.contains(&e.name));
    tracing::debug!("removed {} generated layout(s)", tops.len());
    tops.len()
}

/// Frame root transform of `frame` in `layout`, if generated.
pub fn frame_root<'a>(doc: &'a AssetDocument, rig: &StageRigNames, layout: &str, frame: u32) -> Option<&'a Transform> {
    let name = format!("{}__{}", rig.root_name, frame_suffix(layout, frame));
    doc.entity(&name).map(|e| &e.transform)
}
