//! # poster-ir
//!
//! The document model of the poster pipeline: the manifest that describes a
//! poster scene, the asset and library documents the sync engine works on,
//! and the composed scene document handed to the renderer.

pub mod asset;
pub mod builder;
pub mod document;
pub mod library;
pub mod manifest;
pub mod material;
pub mod scene;
pub mod validate;

pub use asset::{AssetDocument, Entity, EntityData, Group, GroupRole, LinkState, MaterialResource, MaterialState, MediaResource, MeshData};
pub use document::{load_document, save_document, Document};
pub use library::{validate_library, LibraryDocument, LibraryMaterial};
pub use manifest::{ManifestDocument, ObjectEntry, ObjectKind, Placement};
pub use material::MaterialParams;
pub use scene::{NodeContent, SceneDocument, SceneMaterial, SceneNode, Subtree};
pub use validate::validate_manifest;
