//! Rig handle convention.
//!
//! A handle's orientation is always `base ⊗ rotation(axis, angle)`, where the
//! base alignment is captured the first time the handle is driven and kept in
//! the handle's auxiliary state. Setting an angle is therefore absolute, never
//! cumulative.

use glam::DQuat;

use crate::math::Axis;

/// Auxiliary property key holding a handle's captured base alignment.
pub const BASE_ORIENTATION_KEY: &str = "rig.base_orientation";

/// Anything that can be driven as a rig handle.
pub trait RigHandle {
    fn orientation(&self) -> DQuat;
    fn set_orientation(&mut self, rotation: DQuat);
    /// Previously captured base alignment, if any.
    fn base_alignment(&self) -> Option<DQuat>;
    fn store_base_alignment(&mut self, base: DQuat);
}

/// `base ⊗ rotation(axis, angle)`.
pub fn aligned_rotation(base: DQuat, axis: Axis, angle_deg: f64) -> DQuat {
    (base * DQuat::from_axis_angle(axis.vector(), angle_deg.to_radians())).normalize()
}

/// Set a handle to `angle_deg` about its local `axis`, capturing the base first if needed.
pub fn set_handle_angle<H: RigHandle + ?Sized>(handle: &mut H, axis: Axis, angle_deg: f64) -> DQuat {
    let base = match handle.base_alignment() {
        Some(base) => base,
        None => {
            let base = handle.orientation();
            handle.store_base_alignment(base);
            base
        }
    };
    let rotation = aligned_rotation(base, axis, angle_deg);
    handle.set_orientation(rotation);
    rotation
}

/// Names and signs of the three handles of a stage rig (root → yaw → pitch).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StageRigNames {
    pub root_name: String,
    pub yaw_name: String,
    pub pitch_name: String,
    pub yaw_sign: f64,
    pub pitch_sign: f64,
    pub yaw_axis: Axis,
    pub pitch_axis: Axis,
}

impl Default for StageRigNames {
    fn default() -> Self {
        Self {
            root_name: "RIG_Stage_Root".to_string(),
            yaw_name: "RIG_Stage_Yaw".to_string(),
            pitch_name: "RIG_Stage_Pitch".to_string(),
            yaw_sign: 1.0,
            pitch_sign: 1.0,
            yaw_axis: Axis::Z,
            pitch_axis: Axis::Z,
        }
    }
}
