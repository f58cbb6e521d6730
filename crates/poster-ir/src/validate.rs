//! Structural validation of poster manifests.

use std::collections::HashSet;

use poster_core::math::poster_plane_distance;
use poster_core::PosterError;

use crate::manifest::{
    Extent, ManifestDocument, MaterialRef, ObjectEntry, ObjectKind, Placement, Shape,
    RESERVED_CONTAINERS,
};

/// Validate a manifest for structural correctness before anything is built.
pub fn validate_manifest(manifest: &ManifestDocument) -> Result<(), Vec<PosterError>> {
    let mut errors = Vec::new();

    let poster = &manifest.poster;
    if !(poster.size_mm > 0.0) {
        errors.push(PosterError::manifest("poster size_mm must be positive"));
    }
    if poster.ppi == 0 {
        errors.push(PosterError::manifest("poster ppi must be non-zero"));
    }
    if poster.safe_margin_mm < 0.0 {
        errors.push(PosterError::manifest("poster safe_margin_mm must be non-negative"));
    }

    let camera = &manifest.camera;
    if !(camera.lens_mm > 0.0) || !(camera.sensor_width_mm > 0.0) {
        errors.push(PosterError::manifest(
            "camera lens_mm and sensor_width_mm must be positive",
        ));
    }
    if !(camera.clip_start_mm > 0.0) || camera.clip_end_mm <= camera.clip_start_mm {
        errors.push(PosterError::manifest(
            "camera clip range must satisfy 0 < clip_start_mm < clip_end_mm",
        ));
    }
    if camera.location() == camera.target() {
        errors.push(PosterError::degenerate_aim(
            &camera.name,
            "camera target coincides with camera location",
        ));
    }

    let mut light_names = HashSet::new();
    for light in &manifest.lights {
        if light.name.trim().is_empty() {
            errors.push(PosterError::manifest("light name must not be empty"));
        } else if !light_names.insert(light.name.as_str()) {
            errors.push(PosterError::duplicate("light", &light.name));
        }
        if light.settings.energy < 0.0 {
            errors.push(PosterError::manifest(format!(
                "light '{}' has negative energy",
                light.name
            )));
        }
        if let Some(target) = light.settings.target_mm {
            if target == light.settings.location_mm && light.settings.enabled {
                errors.push(PosterError::degenerate_aim(
                    &light.name,
                    "light target coincides with light location",
                ));
            }
        }
    }

    // Duplicate names within a container.
    let mut paths = HashSet::new();
    for entry in &manifest.objects {
        if !paths.insert(entry.path()) {
            errors.push(PosterError::duplicate("object", entry.path()));
        }
    }

    let plane_distance =
        poster_plane_distance(poster.size_mm, camera.lens_mm, camera.sensor_width_mm);
    for entry in &manifest.objects {
        validate_entry(manifest, entry, plane_distance, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_entry(
    manifest: &ManifestDocument,
    entry: &ObjectEntry,
    plane_distance: f64,
    errors: &mut Vec<PosterError>,
) {
    let mut fail = |message: String| {
        errors.push(PosterError::manifest_entry(
            message,
            Some(&entry.name),
            entry.index,
        ))
    };

    if entry.name.trim().is_empty() || entry.name.contains('/') {
        fail("object name must be non-empty and must not contain '/'".into());
    }
    if entry.container.trim().is_empty() || entry.container.contains('/') {
        fail("container name must be non-empty and must not contain '/'".into());
    }
    if RESERVED_CONTAINERS.contains(&entry.container.as_str()) {
        fail(format!("container '{}' is reserved", entry.container));
    }

    match &entry.placement {
        Placement::World(world) => {
            if world.scale.to_array().iter().any(|s| *s == 0.0 || !s.is_finite()) {
                fail("scale components must be finite and non-zero".into());
            }
        }
        Placement::Poster(poster) => {
            if let Some(size) = poster.size_mm {
                if !(size > 0.0) {
                    fail(format!("size_mm must be positive, got {}", size));
                }
            }
            if poster.screen_lock && (plane_distance - poster.z_mm) / plane_distance <= 0.0 {
                fail(format!(
                    "screen-locked entity at z_mm {} lies at or behind the camera (poster plane at {:.3} mm)",
                    poster.z_mm, plane_distance
                ));
            }
            if let Some(aim) = &poster.aim {
                match (&aim.target_mm, &aim.target) {
                    (Some(_), Some(_)) => fail("aim takes either target_mm or target, not both".into()),
                    (None, None) => fail("aim needs target_mm or target".into()),
                    (None, Some(name)) => {
                        let found = manifest.find_objects(name);
                        match found.len() {
                            0 => fail(format!("aim target '{}' does not name an object", name)),
                            1 if found[0].path() == entry.path() => {
                                fail("aim target must not be the entity itself".into())
                            }
                            1 if !found[0].enabled => {
                                fail(format!("aim target '{}' is disabled", name))
                            }
                            1 => {}
                            _ => fail(format!(
                                "aim target '{}' is ambiguous; qualify it as CONTAINER/name",
                                name
                            )),
                        }
                    }
                    (Some(_), None) => {}
                }
                if aim.track_axis.axis() == aim.up_axis {
                    fail(format!(
                        "track axis {} and up axis {} are the same axis",
                        aim.track_axis, aim.up_axis
                    ));
                }
            }
        }
    }

    match &entry.kind {
        ObjectKind::ImportReference(import) => {
            if import.filepath.as_os_str().is_empty() {
                fail("filepath must not be empty".into());
            }
            if import.group_name.trim().is_empty() {
                fail("group_name must not be empty".into());
            }
            if !(import.import_scale > 0.0) || !import.import_scale.is_finite() {
                fail(format!(
                    "import_scale must be positive, got {}",
                    import.import_scale
                ));
            }
        }
        ObjectKind::ImagePlane(image) => {
            if image.image_path.as_os_str().is_empty() {
                fail("image_path must not be empty".into());
            }
            if let Some(size) = image.size_mm {
                if size.dims().iter().any(|d| !(*d > 0.0)) {
                    fail("image size_mm must be positive".into());
                }
            }
            if image.emission_strength < 0.0 {
                fail("emission_strength must be non-negative".into());
            }
        }
        ObjectKind::Primitive(primitive) => {
            match &primitive.shape {
                Shape::Plane { size_mm } => {
                    if size_mm.dims().iter().any(|d| !(*d > 0.0)) {
                        fail("plane size_mm must be positive".into());
                    }
                }
                Shape::Cube { size_mm } => {
                    if Extent::to_array(*size_mm).iter().any(|d| !(*d > 0.0)) {
                        fail("cube size_mm must be positive".into());
                    }
                }
                Shape::UvSphere {
                    radius_mm,
                    segments,
                    rings,
                } => {
                    if !(*radius_mm > 0.0) || *segments < 3 || *rings < 2 {
                        fail("uv_sphere needs radius_mm > 0, segments >= 3, rings >= 2".into());
                    }
                }
                Shape::Cyclorama {
                    width_mm,
                    floor_depth_mm,
                    wall_height_mm,
                    radius_mm,
                    segments,
                } => {
                    if !(*width_mm > 0.0) || *floor_depth_mm < 0.0 || *wall_height_mm < 0.0 {
                        fail("cyclorama dimensions must be positive".into());
                    }
                    if !(*radius_mm > 0.0) {
                        fail("cyclorama radius_mm must be positive".into());
                    }
                    if *segments < 2 {
                        fail(format!("cyclorama needs at least 2 segments, got {}", segments));
                    }
                }
            }
            match &primitive.material {
                Some(MaterialRef::Inline(params)) => {
                    for problem in params.range_problems() {
                        fail(format!("material: {}", problem));
                    }
                }
                Some(MaterialRef::Named(name)) | Some(MaterialRef::Library { name, .. }) => {
                    if name.trim().is_empty() {
                        fail("material name must not be empty".into());
                    }
                }
                None => {}
            }
        }
        ObjectKind::Text(text) => {
            if !(text.size_mm > 0.0) {
                fail(format!("text size_mm must be positive, got {}", text.size_mm));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ManifestDocument {
        ManifestDocument::parse(json).unwrap()
    }

    #[test]
    fn test_valid_manifest() {
        let manifest = parse(
            r#"{"objects": [
                {"name": "a", "kind": "text", "body": "x"},
                {"name": "a", "kind": "text", "body": "x", "container": "OVERLAY"}
            ]}"#,
        );
        assert!(validate_manifest(&manifest).is_ok());
    }

    #[test]
    fn test_duplicate_in_container() {
        let manifest = parse(
            r#"{"objects": [
                {"name": "a", "kind": "text", "body": "x"},
                {"name": "a", "kind": "text", "body": "y"}
            ]}"#,
        );
        let errors = validate_manifest(&manifest).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], PosterError::DuplicateName { .. }));
    }

    #[test]
    fn test_screen_lock_behind_camera() {
        // Default poster/camera: plane at ~2878.7 mm.
        let manifest = parse(
            r#"{"objects": [
                {"name": "p", "kind": "text", "body": "x", "space": "poster",
                 "z_mm": 3000, "screen_lock": true}
            ]}"#,
        );
        let errors = validate_manifest(&manifest).unwrap_err();
        assert!(errors[0].to_string().contains("behind the camera"));
    }

    #[test]
    fn test_aim_target_checks() {
        let manifest = parse(
            r#"{"objects": [
                {"name": "a", "kind": "text", "body": "x"},
                {"name": "a", "kind": "text", "body": "x", "container": "OVERLAY"},
                {"name": "p", "kind": "text", "body": "x", "space": "poster",
                 "aim": {"target": "a"}},
                {"name": "q", "kind": "text", "body": "x", "space": "poster",
                 "aim": {"target": "OVERLAY/a", "track_axis": "Y", "up_axis": "Y"}},
                {"name": "r", "kind": "text", "body": "x", "space": "poster",
                 "aim": {"target": "nobody"}}
            ]}"#,
        );
        let errors = validate_manifest(&manifest).unwrap_err();
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("ambiguous"));
        assert!(messages[1].contains("same axis"));
        assert!(messages[2].contains("does not name an object"));
    }

    #[test]
    fn test_reserved_container_and_bad_scale() {
        let manifest = parse(
            r#"{"objects": [
                {"name": "a", "kind": "import_reference", "filepath": "x.json",
                 "group_name": "EXPORT_x", "import_scale": 0, "container": "LIGHTS"}
            ]}"#,
        );
        let errors = validate_manifest(&manifest).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_duplicate_light_names() {
        let manifest = parse(
            r#"{"lights": [{"name": "L"}, {"name": "L"}]}"#,
        );
        let errors = validate_manifest(&manifest).unwrap_err();
        assert!(matches!(errors[0], PosterError::DuplicateName { .. }));
    }
}
