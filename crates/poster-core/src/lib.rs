//! # poster-core
//!
//! Core types and primitives for the poster pipeline.
//! This crate holds the foundational pieces shared by every other crate:
//! error types, spatial math, the rig handle convention, colors, content
//! hashing, name patterns and project configuration.

pub mod color;
pub mod config;
pub mod error;
pub mod hash;
pub mod math;
pub mod pattern;
pub mod rig;

pub use config::*;

pub use color::Color;
pub use error::{PosterError, PosterResult};
pub use hash::ContentHash;
pub use math::{Axis, TrackAxis, Transform};
pub use rig::RigHandle;
