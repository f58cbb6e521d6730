//! The material catalog: a generated, name-sorted listing of the library for
//! review and tooling. Never edited by hand.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use poster_core::PosterResult;
use poster_ir::document::to_canonical_string;
use poster_ir::{LibraryDocument, MaterialParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub params: MaterialParams,
}

pub fn catalog_entries(library: &LibraryDocument) -> Vec<CatalogEntry> {
    library
        .sorted()
        .into_iter()
        .map(|m| CatalogEntry {
            name: m.name.clone(),
            id: m.id,
            description: m.description.clone(),
            tags: m.tags.clone(),
            params: m.params.clone(),
        })
        .collect()
}

/// Serialized catalog for `library`.
pub fn catalog_text(library: &LibraryDocument) -> PosterResult<String> {
    to_canonical_string(&catalog_entries(library))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poster_ir::LibraryMaterial;

    #[test]
    fn test_catalog_is_sorted_and_flat() {
        let mut library = LibraryDocument::new();
        for name in ["MAT_Steel_Polished", "MAT_Aluminum_Brushed"] {
            library.materials.push(LibraryMaterial {
                id: Uuid::new_v4(),
                name: name.into(),
                params: MaterialParams::default(),
                description: None,
                tags: vec!["metal".into()],
            });
        }
        let entries = catalog_entries(&library);
        assert_eq!(entries[0].name, "MAT_Aluminum_Brushed");

        let value = serde_json::to_value(&entries).unwrap();
        assert_eq!(value[1]["name"], "MAT_Steel_Polished");
        assert_eq!(value[1]["roughness"], 0.5);
        assert_eq!(value[1]["tags"][0], "metal");
        assert!(value[1].get("params").is_none());
    }
}
