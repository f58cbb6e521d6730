//! # poster-compose
//!
//! Turns a poster manifest into a scene document: places every entry,
//! resolves asset references through the fallback chain and rebuilds only
//! the subtrees that belong to the manifest.
//! Also generates stage frame layouts inside asset documents.

pub mod compose;
pub mod content;
pub mod frames;
pub mod paths;
pub mod resolver;
pub mod transform;

pub use compose::{BuildReport, EntryFailure, SceneBuilder};
pub use frames::{generate_layouts, FramesManifest, LayoutSelection};
pub use resolver::{AssetResolver, Resolution, ResolutionStep};
pub use transform::{ResolvedTransform, TransformResolver};
