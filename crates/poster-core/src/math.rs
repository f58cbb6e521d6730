//! Spatial math for the poster pipeline.
//!
//! All lengths are millimetres (1 unit = 1 mm) and world up is +Z. Rotations
//! are stored as unit quaternions; Euler input uses the XYZ order with X
//! applied first.

use std::fmt;

use glam::{DMat3, DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// World up direction.
pub const WORLD_UP: DVec3 = DVec3::Z;

/// Maximum forward-ray distance to the aim target, as a fraction of scene scale.
pub const AIM_DISTANCE_TOLERANCE: f64 = 1e-6;

/// Maximum angular deviation of the forward ray from the aim target, in degrees.
pub const AIM_ANGLE_TOLERANCE_DEG: f64 = 1e-4;

const COINCIDENT_EPSILON: f64 = 1e-9;

/// Location, rotation, and scale of an entity, in world millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub location: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        location: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    pub fn from_location(location: DVec3) -> Self {
        Self {
            location,
            ..Self::IDENTITY
        }
    }

    /// Build from millimetre location, XYZ Euler degrees, and per-axis scale.
    pub fn from_euler_deg(location: [f64; 3], rotation_deg: [f64; 3], scale: [f64; 3]) -> Self {
        Self {
            location: DVec3::from_array(location),
            rotation: euler_xyz_deg(rotation_deg),
            scale: DVec3::from_array(scale),
        }
    }

    pub fn with_rotation(mut self, rotation: DQuat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: DVec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.location)
    }

    pub fn from_matrix(matrix: &DMat4) -> Self {
        let (scale, rotation, location) = matrix.to_scale_rotation_translation();
        Self {
            location,
            rotation: rotation.normalize(),
            scale,
        }
    }

    /// Express `child` (given in this transform's local space) in the parent space.
    pub fn compose(&self, child: &Transform) -> Transform {
        Transform::from_matrix(&(self.to_matrix() * child.to_matrix()))
    }

    /// Transform a point from local into parent space.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.to_matrix().transform_point3(point)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rotation from XYZ Euler angles in degrees (X applied first, then Y, then Z).
pub fn euler_xyz_deg(rotation_deg: [f64; 3]) -> DQuat {
    let [x, y, z] = rotation_deg;
    DQuat::from_rotation_z(z.to_radians())
        * DQuat::from_rotation_y(y.to_radians())
        * DQuat::from_rotation_x(x.to_radians())
}

/// A principal local axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    #[serde(alias = "x", alias = "UP_X")]
    X,
    #[default]
    #[serde(alias = "y", alias = "UP_Y")]
    Y,
    #[serde(alias = "z", alias = "UP_Z")]
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn vector(self) -> DVec3 {
        match self {
            Axis::X => DVec3::X,
            Axis::Y => DVec3::Y,
            Axis::Z => DVec3::Z,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// The signed local axis that an aim constraint points at its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackAxis {
    #[serde(rename = "X", alias = "TRACK_X")]
    PosX,
    #[serde(rename = "Y", alias = "TRACK_Y")]
    PosY,
    #[serde(rename = "Z", alias = "TRACK_Z")]
    PosZ,
    #[serde(rename = "-X", alias = "TRACK_NEGATIVE_X")]
    NegX,
    #[serde(rename = "-Y", alias = "TRACK_NEGATIVE_Y")]
    NegY,
    #[default]
    #[serde(rename = "-Z", alias = "TRACK_NEGATIVE_Z")]
    NegZ,
}

impl TrackAxis {
    pub fn axis(self) -> Axis {
        match self {
            TrackAxis::PosX | TrackAxis::NegX => Axis::X,
            TrackAxis::PosY | TrackAxis::NegY => Axis::Y,
            TrackAxis::PosZ | TrackAxis::NegZ => Axis::Z,
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            TrackAxis::PosX | TrackAxis::PosY | TrackAxis::PosZ => 1.0,
            TrackAxis::NegX | TrackAxis::NegY | TrackAxis::NegZ => -1.0,
        }
    }

    /// The local forward vector this track axis denotes.
    pub fn vector(self) -> DVec3 {
        self.axis().vector() * self.sign()
    }
}

impl fmt::Display for TrackAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign() < 0.0 {
            write!(f, "-{}", self.axis())
        } else {
            write!(f, "{}", self.axis())
        }
    }
}

/// Why a look-at solve failed.
#[derive(Debug, Clone, PartialEq)]
pub enum AimError {
    /// Source and target are the same point.
    Coincident { source: DVec3 },
    /// Track and up axes name the same local axis.
    AxisConflict { track: TrackAxis, up: Axis },
    /// The solved orientation misses its target by more than the tolerance.
    Residual(AimResidual),
}

impl fmt::Display for AimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AimError::Coincident { source } => write!(
                f,
                "target coincides with source position ({:.3}, {:.3}, {:.3})",
                source.x, source.y, source.z
            ),
            AimError::AxisConflict { track, up } => {
                write!(f, "track axis {} and up axis {} are the same axis", track, up)
            }
            AimError::Residual(r) => write!(
                f,
                "aim residual out of tolerance: distance {:e} mm, angle {:e} deg",
                r.distance, r.angle_deg
            ),
        }
    }
}

impl std::error::Error for AimError {}

/// How far a forward ray misses its aim target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimResidual {
    /// Distance from the target to the forward ray, in mm.
    pub distance: f64,
    /// Angle between the forward ray and the direction to the target, in degrees.
    pub angle_deg: f64,
}

impl AimResidual {
    /// Whether the residual satisfies the aim post-condition for a given scene scale.
    pub fn within_tolerance(&self, scene_scale: f64) -> bool {
        self.distance <= AIM_DISTANCE_TOLERANCE * scene_scale.max(1.0)
            && self.angle_deg <= AIM_ANGLE_TOLERANCE_DEG
    }
}

/// Orientation that points `track` at `target` with `up` as close to world up as possible.
pub fn look_at(source: DVec3, target: DVec3, track: TrackAxis, up: Axis) -> Result<DQuat, AimError> {
    if track.axis() == up {
        return Err(AimError::AxisConflict { track, up });
    }

    let delta = target - source;
    let distance = delta.length();
    if distance < COINCIDENT_EPSILON {
        return Err(AimError::Coincident { source });
    }
    let forward = delta / distance;

    // Straight up or down: fall back to world Y as the up reference.
    let mut up_reference = WORLD_UP;
    if forward.cross(up_reference).length_squared() < 1e-12 {
        up_reference = DVec3::Y;
    }
    let up_vector = (up_reference - forward * up_reference.dot(forward)).normalize();

    let mut cols = [DVec3::ZERO; 3];
    let ti = track.axis().index();
    let ui = up.index();
    cols[ti] = forward * track.sign();
    cols[ui] = up_vector;
    let k = 3 - ti - ui;
    cols[k] = cols[(k + 1) % 3].cross(cols[(k + 2) % 3]);

    let basis = DMat3::from_cols(cols[0], cols[1], cols[2]);
    Ok(DQuat::from_mat3(&basis).normalize())
}

/// Measure how well `rotation` points `track` from `source` at `target`.
pub fn aim_residual(source: DVec3, rotation: DQuat, track: TrackAxis, target: DVec3) -> AimResidual {
    let direction = (rotation * track.vector()).normalize();
    let to_target = target - source;
    let cross = direction.cross(to_target).length();
    let along = direction.dot(to_target);

    // Behind the ray origin the closest ray point is the origin itself.
    let distance = if along >= 0.0 { cross } else { to_target.length() };
    let angle_deg = cross.atan2(along).to_degrees().abs();
    AimResidual { distance, angle_deg }
}

/// Look-at solve with the residual post-condition enforced.
pub fn solve_aim(
    source: DVec3,
    target: DVec3,
    track: TrackAxis,
    up: Axis,
) -> Result<(DQuat, AimResidual), AimError> {
    let rotation = look_at(source, target, track, up)?;
    let residual = aim_residual(source, rotation, track, target);
    let scene_scale = (target - source).length();
    if !residual.within_tolerance(scene_scale) {
        return Err(AimError::Residual(residual));
    }
    Ok((rotation, residual))
}

/// Distance from a camera at which a square poster exactly fills a horizontal-fit sensor.
pub fn poster_plane_distance(poster_size_mm: f64, lens_mm: f64, sensor_width_mm: f64) -> f64 {
    poster_size_mm * lens_mm / sensor_width_mm
}
