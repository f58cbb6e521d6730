//! Kind-specific content built under an entry's root handle.

use std::collections::HashSet;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec3;
use uuid::Uuid;

use poster_core::Transform;
use poster_ir::asset::{stage_rig_chain, EntityData, GroupRole, MaterialState};
use poster_ir::builder::box_mesh;
use poster_ir::manifest::{ImagePlane, MaterialRef, Primitive, RigPose, Shape, Text};
use poster_ir::scene::Visibility;
use poster_ir::{AssetDocument, MaterialParams, NodeContent, SceneMaterial, SceneNode};

use crate::paths::display_path;

/// Name of the content node `suffix` under entry `entry`.
pub fn child_name(entry: &str, suffix: &str) -> String {
    format!("{}__{}", entry, suffix)
}

/// Vertices and faces of a mesh.
pub type Geometry = (Vec<[f64; 3]>, Vec<Vec<u32>>);

/// Floor, quarter-circle bend and wall, centred on X.
///
/// The floor runs from `-floor_depth_mm` to 0 along Y, the bend curves up
/// with `radius_mm` over `segments` steps, and the wall rises `wall_height_mm`
/// above the end of the bend.
pub fn cyclorama_mesh(
    width_mm: f64,
    floor_depth_mm: f64,
    wall_height_mm: f64,
    radius_mm: f64,
    segments: u32,
) -> Geometry {
    let seg = segments.max(2);
    let mut profile: Vec<(f64, f64)> = vec![(-floor_depth_mm, 0.0), (0.0, 0.0)];
    for i in 1..=seg {
        let t = FRAC_PI_2 * (i as f64 / seg as f64);
        profile.push((radius_mm * t.sin(), radius_mm * (1.0 - t.cos())));
    }
    profile.push((radius_mm, radius_mm + wall_height_mm));

    let half_w = width_mm * 0.5;
    let mut vertices = Vec::with_capacity(profile.len() * 2);
    for (y, z) in &profile {
        vertices.push([-half_w, *y, *z]);
        vertices.push([half_w, *y, *z]);
    }
    let faces = (0..profile.len() as u32 - 1)
        .map(|j| vec![2 * j, 2 * j + 1, 2 * (j + 1) + 1, 2 * (j + 1)])
        .collect();
    (vertices, faces)
}

/// A flat rectangle in the local XY plane, facing +Z.
pub fn plane_mesh(width_mm: f64, height_mm: f64) -> Geometry {
    let (hx, hy) = (width_mm * 0.5, height_mm * 0.5);
    (
        vec![[-hx, -hy, 0.0], [hx, -hy, 0.0], [hx, hy, 0.0], [-hx, hy, 0.0]],
        vec![vec![0, 1, 2, 3]],
    )
}

/// Latitude/longitude sphere with pole vertices.
pub fn uv_sphere_mesh(radius_mm: f64, segments: u32, rings: u32) -> Geometry {
    let mut vertices = vec![[0.0, 0.0, radius_mm]];
    for r in 1..rings {
        let phi = PI * r as f64 / rings as f64;
        for s in 0..segments {
            let theta = TAU * s as f64 / segments as f64;
            vertices.push([
                radius_mm * phi.sin() * theta.cos(),
                radius_mm * phi.sin() * theta.sin(),
                radius_mm * phi.cos(),
            ]);
        }
    }
    let bottom = vertices.len() as u32;
    vertices.push([0.0, 0.0, -radius_mm]);

    let ring = |r: u32, s: u32| 1 + (r - 1) * segments + (s % segments);
    let mut faces = Vec::new();
    for s in 0..segments {
        faces.push(vec![0, ring(1, s), ring(1, s + 1)]);
    }
    for r in 1..rings - 1 {
        for s in 0..segments {
            faces.push(vec![ring(r, s), ring(r + 1, s), ring(r + 1, s + 1), ring(r, s + 1)]);
        }
    }
    for s in 0..segments {
        faces.push(vec![ring(rings - 1, s + 1), ring(rings - 1, s), bottom]);
    }
    (vertices, faces)
}

fn shape_geometry(shape: &Shape, size_factor: f64) -> Geometry {
    let scaled = |g: Geometry| -> Geometry {
        if size_factor == 1.0 {
            return g;
        }
        let (v, f) = g;
        (v.into_iter().map(|p| p.map(|c| c * size_factor)).collect(), f)
    };
    match shape {
        Shape::Plane { size_mm } => {
            let [w, h] = size_mm.dims();
            scaled(plane_mesh(w, h))
        }
        Shape::Cube { size_mm } => {
            let mesh = box_mesh(size_mm.to_array());
            scaled((mesh.vertices, mesh.faces))
        }
        Shape::UvSphere {
            radius_mm,
            segments,
            rings,
        } => scaled(uv_sphere_mesh(*radius_mm, *segments, *rings)),
        Shape::Cyclorama {
            width_mm,
            floor_depth_mm,
            wall_height_mm,
            radius_mm,
            segments,
        } => scaled(cyclorama_mesh(
            *width_mm,
            *floor_depth_mm,
            *wall_height_mm,
            *radius_mm,
            *segments,
        )),
    }
}

/// Matte white used for backdrops without an explicit material.
pub fn backdrop_material() -> MaterialParams {
    MaterialParams {
        roughness: 0.95,
        specular: 0.0,
        ..MaterialParams::default()
    }
}

fn scene_material(entry: &str, material: Option<&MaterialRef>, shape: &Shape) -> SceneMaterial {
    match material {
        Some(MaterialRef::Named(name)) => SceneMaterial::Library {
            library: None,
            name: name.clone(),
        },
        Some(MaterialRef::Library { library, name }) => SceneMaterial::Library {
            library: Some(display_path(library)),
            name: name.clone(),
        },
        Some(MaterialRef::Inline(params)) => SceneMaterial::Inline {
            name: Some(format!("MAT_{}", entry)),
            params: params.clone(),
        },
        None if matches!(shape, Shape::Cyclorama { .. }) => SceneMaterial::Inline {
            name: Some(format!("MAT_{}", entry)),
            params: backdrop_material(),
        },
        None => SceneMaterial::Unassigned,
    }
}

pub fn primitive_nodes(entry: &str, primitive: &Primitive, size_factor: f64) -> Vec<SceneNode> {
    let (vertices, faces) = shape_geometry(&primitive.shape, size_factor);
    let material = scene_material(entry, primitive.material.as_ref(), &primitive.shape);
    vec![SceneNode::new(
        child_name(entry, "mesh"),
        Transform::IDENTITY,
        NodeContent::Mesh {
            vertices,
            faces,
            materials: vec![material],
        },
    )
    .with_parent(entry)]
}

/// Emissive image plane, visible to the camera only.
pub fn image_plane_nodes(
    entry: &str,
    image: &ImagePlane,
    image_path: &std::path::Path,
    poster_size_mm: Option<f64>,
    size_factor: f64,
) -> Vec<SceneNode> {
    let [w, h] = match (poster_size_mm, image.size_mm) {
        (Some(s), _) => [s, s],
        (None, Some(size)) => size.dims(),
        (None, None) => ImagePlane::DEFAULT_SIZE_MM,
    };
    vec![SceneNode::new(
        child_name(entry, "image"),
        Transform::IDENTITY,
        NodeContent::ImagePlane {
            image: display_path(image_path),
            width_mm: w * size_factor,
            height_mm: h * size_factor,
            emission_strength: image.emission_strength,
        },
    )
    .with_parent(entry)
    .with_visibility(Visibility::camera_only())]
}

pub fn text_nodes(entry: &str, text: &Text, poster_size_mm: Option<f64>, size_factor: f64) -> Vec<SceneNode> {
    let size = poster_size_mm.unwrap_or(text.size_mm);
    vec![SceneNode::new(
        child_name(entry, "text"),
        Transform::IDENTITY,
        NodeContent::Text {
            body: text.body.clone(),
            font: text.font.clone(),
            size_mm: size * size_factor,
            color: text.color,
            align: text.align,
        },
    )
    .with_parent(entry)]
}

/// Live instance of `group` in the asset at `source`, scaled by `scale`.
pub fn instance_nodes(
    entry: &str,
    source: &std::path::Path,
    group: &str,
    requested: &str,
    scale: f64,
    rig_pose: Option<&RigPose>,
) -> Vec<SceneNode> {
    let mut node = SceneNode::new(
        child_name(entry, "instance"),
        Transform::IDENTITY.with_scale(DVec3::splat(scale)),
        NodeContent::Instance {
            source: display_path(source),
            group: group.to_string(),
            requested_group: requested.to_string(),
        },
    )
    .with_parent(entry);
    if let Some(pose) = rig_pose {
        node.properties
            .insert("rig.yaw_deg".to_string(), serde_json::json!(pose.yaw_deg));
        node.properties
            .insert("rig.pitch_deg".to_string(), serde_json::json!(pose.pitch_deg));
    }
    vec![node]
}

/// Copy the entities of `group` under the entry's root handle.
///
/// Parent links inside the group are kept; top-level entities hang off the
/// root handle with the import scale folded into their transform.
pub fn copied_nodes(
    entry: &str,
    doc: &AssetDocument,
    group: &str,
    scale: f64,
    rig_pose: Option<&RigPose>,
) -> Vec<SceneNode> {
    let members = doc.group_entity_names(group);
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();

    let mut entities: Vec<poster_ir::Entity> = members
        .iter()
        .filter_map(|n| doc.entity(n).cloned())
        .collect();

    if let Some(pose) = rig_pose {
        apply_rig_pose(doc, group, pose, &mut entities);
    }

    let import = Transform::IDENTITY.with_scale(DVec3::splat(scale));
    entities
        .into_iter()
        .map(|e| {
            let parent = match e.parent.as_deref() {
                Some(p) if member_set.contains(p) => child_name(entry, p),
                _ => entry.to_string(),
            };
            let transform = if parent == entry {
                import.compose(&e.transform)
            } else {
                e.transform
            };
            let content = match &e.data {
                EntityData::Empty => NodeContent::Empty,
                EntityData::Mesh(mesh) => NodeContent::Mesh {
                    vertices: mesh.vertices.clone(),
                    faces: mesh.faces.clone(),
                    materials: mesh
                        .material_slots
                        .iter()
                        .map(|slot| copied_material(doc, slot.as_ref()))
                        .collect(),
                },
                EntityData::Image { media } => NodeContent::ImagePlane {
                    image: doc
                        .media_named(media)
                        .map(|m| m.path.clone())
                        .unwrap_or_else(|| media.clone()),
                    width_mm: 1.0,
                    height_mm: 1.0,
                    emission_strength: 1.0,
                },
            };
            let mut node = SceneNode::new(child_name(entry, &e.name), transform, content)
                .with_parent(parent);
            node.properties = e.properties;
            node
        })
        .collect()
}

fn copied_material(doc: &AssetDocument, slot: Option<&Uuid>) -> SceneMaterial {
    let Some(resource) = slot.and_then(|id| doc.material_by_id(id)) else {
        return SceneMaterial::Unassigned;
    };
    match &resource.state {
        MaterialState::Local { params } => SceneMaterial::Inline {
            name: Some(resource.name.clone()),
            params: params.clone(),
        },
        MaterialState::Linked { library, .. } => SceneMaterial::Library {
            library: Some(display_path(library)),
            name: resource.name.clone(),
        },
    }
}

/// Drive the stage rig handles found under `group` to the requested pose.
fn apply_rig_pose(doc: &AssetDocument, group: &str, pose: &RigPose, entities: &mut [poster_ir::Entity]) {
    let rig_group = doc.group(group).and_then(|g| {
        g.children
            .iter()
            .find(|c| GroupRole::of(c) == GroupRole::Rig)
            .cloned()
            .or_else(|| (g.role() == GroupRole::Rig).then(|| g.name.clone()))
    });
    let Some(rig_group) = rig_group else {
        tracing::warn!("rig_pose given but '{}' has no RIG_ group; pose ignored", group);
        return;
    };
    let chain = match stage_rig_chain(doc, &rig_group) {
        Ok(chain) => chain,
        Err(e) => {
            tracing::warn!("rig_pose ignored: {}", e);
            return;
        }
    };
    let defaults = poster_core::rig::StageRigNames::default();
    let [_, yaw, pitch] = chain;
    for entity in entities.iter_mut() {
        if entity.name == yaw {
            entity.set_rig_angle(defaults.yaw_axis, pose.yaw_deg * defaults.yaw_sign);
        } else if entity.name == pitch {
            entity.set_rig_angle(defaults.pitch_axis, pose.pitch_deg * defaults.pitch_sign);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclorama_profile() {
        let (vertices, faces) = cyclorama_mesh(6000.0, 4000.0, 3000.0, 600.0, 4);
        // floor start, bend start, 4 bend steps, wall top
        assert_eq!(vertices.len(), 2 * 7);
        assert_eq!(faces.len(), 6);
        assert_eq!(vertices[0], [-3000.0, -4000.0, 0.0]);
        let top = vertices[vertices.len() - 1];
        assert!((top[1] - 600.0).abs() < 1e-9);
        assert!((top[2] - 3600.0).abs() < 1e-9);
        // end of the bend is vertical: y = r, z = r
        let bend_end = vertices[2 * 5];
        assert!((bend_end[1] - 600.0).abs() < 1e-9);
        assert!((bend_end[2] - 600.0).abs() < 1e-9);
        assert!(faces.iter().all(|f| f.len() == 4));
    }

    #[test]
    fn test_cyclorama_clamps_segments() {
        let (vertices, _) = cyclorama_mesh(10.0, 10.0, 10.0, 5.0, 0);
        assert_eq!(vertices.len(), 2 * 5);
    }

    #[test]
    fn test_uv_sphere_counts() {
        let (vertices, faces) = uv_sphere_mesh(1.0, 8, 4);
        assert_eq!(vertices.len(), 2 + 8 * 3);
        assert_eq!(faces.len(), 8 + 8 * 2 + 8);
        for v in &vertices {
            let r = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!((r - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_copied_nodes_keep_hierarchy() {
        let mut builder = poster_ir::builder::AssetDocumentBuilder::stage("stage");
        builder.local_material("MAT_Plastic_Black", MaterialParams::default(), Some("stage_body"));
        let doc = builder.build();
        let nodes = copied_nodes("st", &doc, "EXPORT_stage", 2.0, None);
        assert_eq!(nodes.len(), 4);
        let root = nodes.iter().find(|n| n.name == "st__RIG_Stage_Root").unwrap();
        assert_eq!(root.parent.as_deref(), Some("st"));
        assert!((root.transform.scale - DVec3::splat(2.0)).length() < 1e-12);
        assert!((root.transform.location - DVec3::new(0.0, 0.0, 200.0)).length() < 1e-9);
        let body = nodes.iter().find(|n| n.name == "st__stage_body").unwrap();
        assert_eq!(body.parent.as_deref(), Some("st__RIG_Stage_Pitch"));
        match &body.content {
            NodeContent::Mesh { materials, .. } => {
                assert!(matches!(&materials[0], SceneMaterial::Inline { name: Some(n), .. } if n == "MAT_Plastic_Black"));
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_rig_pose_applied_to_copies() {
        let doc = poster_ir::builder::AssetDocumentBuilder::stage("stage").build();
        let pose = RigPose {
            yaw_deg: 30.0,
            pitch_deg: -10.0,
        };
        let nodes = copied_nodes("st", &doc, "EXPORT_stage", 1.0, Some(&pose));
        let yaw = nodes.iter().find(|n| n.name == "st__RIG_Stage_Yaw").unwrap();
        let expected = glam::DQuat::from_rotation_z(30f64.to_radians());
        assert!(yaw.transform.rotation.angle_between(expected) < 1e-9);
        assert!(yaw.properties.contains_key(poster_core::rig::BASE_ORIENTATION_KEY));
    }
}
