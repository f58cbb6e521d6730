//! Placement of manifest entries in world space.
//!
//! World placement is a plain TRS transform. Poster placement is expressed in
//! the camera frame relative to the poster plane, which sits at the distance
//! where a square poster exactly fills the sensor width.

use glam::{DQuat, DVec3};

use poster_core::math::{self, AimResidual};
use poster_core::{Axis, PosterError, PosterResult, TrackAxis, Transform};
use poster_ir::manifest::{AimSpec, CameraSpec, ManifestDocument, ObjectEntry, Placement, PosterPlacement};

/// Final placement of one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTransform {
    pub transform: Transform,
    /// Factor applied to the entry's sizes (`k` under screen lock, otherwise 1).
    pub size_factor: f64,
    /// Present when an aim constraint was solved.
    pub residual: Option<AimResidual>,
}

/// Solve a look-at and enforce the residual tolerance, naming `entity` on failure.
pub fn aim_rotation(
    entity: &str,
    source: DVec3,
    target: DVec3,
    track: TrackAxis,
    up: Axis,
) -> PosterResult<(DQuat, AimResidual)> {
    math::solve_aim(source, target, track, up)
        .map_err(|e| PosterError::degenerate_aim(entity, e.to_string()))
}

/// World transform of the poster camera, aimed at its target with -Z forward and Y up.
pub fn camera_transform(camera: &CameraSpec) -> PosterResult<Transform> {
    let (rotation, _) = aim_rotation(
        &camera.name,
        camera.location(),
        camera.target(),
        TrackAxis::NegZ,
        Axis::Y,
    )?;
    Ok(Transform::from_location(camera.location()).with_rotation(rotation))
}

/// Resolves entry placements against one manifest's camera and poster.
pub struct TransformResolver<'a> {
    manifest: &'a ManifestDocument,
    camera: Transform,
    plane_distance: f64,
}

impl<'a> TransformResolver<'a> {
    pub fn new(manifest: &'a ManifestDocument) -> PosterResult<Self> {
        let camera = camera_transform(&manifest.camera)?;
        let plane_distance = math::poster_plane_distance(
            manifest.poster.size_mm,
            manifest.camera.lens_mm,
            manifest.camera.sensor_width_mm,
        );
        Ok(Self {
            manifest,
            camera,
            plane_distance,
        })
    }

    pub fn camera(&self) -> &Transform {
        &self.camera
    }

    pub fn plane_distance(&self) -> f64 {
        self.plane_distance
    }

    /// Transform of a point on the poster plane, in world space, facing the camera.
    pub fn on_poster_plane(&self, x: f64, y: f64, z_mm: f64) -> Transform {
        let local = Transform::from_location(DVec3::new(x, y, -self.plane_distance + z_mm));
        self.camera.compose(&local)
    }

    /// Camera-local position and size factor of a poster placement.
    pub fn poster_local(&self, entity: &str, placement: &PosterPlacement) -> PosterResult<(DVec3, f64)> {
        let d = self.plane_distance;
        let [x, y] = placement.poster_xy_mm;
        let z = placement.z_mm;
        if !placement.screen_lock {
            return Ok((DVec3::new(x, y, -d + z), 1.0));
        }
        let k = (d - z) / d;
        if k <= 0.0 {
            return Err(PosterError::ManifestValidation {
                message: format!(
                    "screen-locked entity at z_mm {} lies at or behind the camera",
                    z
                ),
                entry: Some(entity.to_string()),
                index: None,
            });
        }
        Ok((DVec3::new(k * x, k * y, -d + z), k))
    }

    /// World location of an entry, ignoring any aim constraint.
    pub fn location(&self, entry: &ObjectEntry) -> PosterResult<DVec3> {
        match &entry.placement {
            Placement::World(world) => Ok(DVec3::from_array(world.location_mm)),
            Placement::Poster(poster) => {
                let (local, _) = self.poster_local(&entry.name, poster)?;
                Ok(self.camera.transform_point(local))
            }
        }
    }

    pub fn resolve(&self, entry: &ObjectEntry) -> PosterResult<ResolvedTransform> {
        match &entry.placement {
            Placement::World(world) => Ok(ResolvedTransform {
                transform: Transform::from_euler_deg(
                    world.location_mm,
                    world.rotation_deg,
                    world.scale.to_array(),
                ),
                size_factor: 1.0,
                residual: None,
            }),
            Placement::Poster(poster) => {
                let (local, k) = self.poster_local(&entry.name, poster)?;
                let location = self.camera.transform_point(local);
                match &poster.aim {
                    None => Ok(ResolvedTransform {
                        transform: Transform::from_location(location)
                            .with_rotation(self.camera.rotation),
                        size_factor: k,
                        residual: None,
                    }),
                    Some(aim) => {
                        let target = self.aim_target(entry, aim)?;
                        let (rotation, residual) = aim_rotation(
                            &entry.name,
                            location,
                            target,
                            aim.track_axis,
                            aim.up_axis,
                        )?;
                        Ok(ResolvedTransform {
                            transform: Transform::from_location(location).with_rotation(rotation),
                            size_factor: k,
                            residual: Some(residual),
                        })
                    }
                }
            }
        }
    }

    fn aim_target(&self, entry: &ObjectEntry, aim: &AimSpec) -> PosterResult<DVec3> {
        if let Some(point) = aim.target_mm {
            return Ok(DVec3::from_array(point));
        }
        let name = aim.target.as_deref().unwrap_or_default();
        let found = self.manifest.find_objects(name);
        match found.as_slice() {
            [target] => self.location(target),
            _ => Err(PosterError::degenerate_aim(
                &entry.name,
                format!("aim target '{}' does not resolve to exactly one object", name),
            )),
        }
    }
}
