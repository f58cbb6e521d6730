//! # poster-library
//!
//! The shared material library and the sync engine around it: recipes are
//! compiled into a library document plus a generated catalog, and asset
//! documents link to or bake from that library.

pub mod builder;
pub mod catalog;
pub mod pack;
pub mod recipes;
pub mod sync;

pub use builder::{build_library, load_library, LibraryBuildSummary, LibraryBuilder};
pub use catalog::{catalog_entries, catalog_text, CatalogEntry};
pub use pack::{pack_media, unpack_bytes, verify_packed};
pub use recipes::{MaterialRecipe, RecipeStore};
pub use sync::{bake, link, link_then_bake, BakeReport, LibrarySet, LinkReport, RemainingLinked, SyncOptions};
