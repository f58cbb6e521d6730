//! The material library document and its consistency check.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use poster_core::PosterError;

use crate::document::{Document, LIBRARY_FORMAT};
use crate::material::MaterialParams;

/// A canonical material owned by the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryMaterial {
    pub id: Uuid,
    pub name: String,
    pub params: MaterialParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// The shared material library: the single source of truth for every `MAT_*` preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryDocument {
    pub format: String,
    #[serde(default)]
    pub materials: Vec<LibraryMaterial>,
}

impl Document for LibraryDocument {
    const FORMAT: &'static str = LIBRARY_FORMAT;
}

impl Default for LibraryDocument {
    fn default() -> Self {
        Self {
            format: LIBRARY_FORMAT.to_string(),
            materials: Vec::new(),
        }
    }
}

impl LibraryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&LibraryMaterial> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut LibraryMaterial> {
        self.materials.iter_mut().find(|m| m.name == name)
    }

    pub fn by_id(&self, id: &Uuid) -> Option<&LibraryMaterial> {
        self.materials.iter().find(|m| m.id == *id)
    }

    /// Materials ordered by name.
    pub fn sorted(&self) -> Vec<&LibraryMaterial> {
        let mut all: Vec<&LibraryMaterial> = self.materials.iter().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

/// Check that material names and ids are unique, reporting every collision.
pub fn validate_library(library: &LibraryDocument) -> Result<(), Vec<PosterError>> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    let mut ids = HashSet::new();
    for material in &library.materials {
        if !names.insert(material.name.as_str()) {
            errors.push(PosterError::duplicate("library material", &material.name));
        }
        if !ids.insert(material.id) {
            errors.push(PosterError::duplicate("library material id", material.id.to_string()));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_id() {
        let mut lib = LibraryDocument::new();
        let id = Uuid::new_v4();
        lib.materials.push(LibraryMaterial {
            id,
            name: "MAT_Steel_Polished".into(),
            params: MaterialParams::default(),
            description: None,
            tags: vec![],
        });
        assert!(lib.get("MAT_Steel_Polished").is_some());
        assert_eq!(lib.by_id(&id).unwrap().name, "MAT_Steel_Polished");
        assert!(lib.get("MAT_Steel_Brushed").is_none());
    }

    #[test]
    fn test_sorted_by_name() {
        let mut lib = LibraryDocument::new();
        for name in ["MAT_b_x", "MAT_a_x", "MAT_c_x"] {
            lib.materials.push(LibraryMaterial {
                id: Uuid::new_v4(),
                name: name.into(),
                params: MaterialParams::default(),
                description: None,
                tags: vec![],
            });
        }
        let names: Vec<&str> = lib.sorted().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["MAT_a_x", "MAT_b_x", "MAT_c_x"]);
    }

    #[test]
    fn test_validate_reports_every_collision() {
        let mut lib = LibraryDocument::new();
        let id = Uuid::new_v4();
        for (name, id) in [
            ("MAT_Plastic_Black", id),
            ("MAT_Plastic_Black", Uuid::new_v4()),
            ("MAT_Rubber_Black", id),
        ] {
            lib.materials.push(LibraryMaterial {
                id,
                name: name.into(),
                params: MaterialParams::default(),
                description: None,
                tags: vec![],
            });
        }
        let errors = validate_library(&lib).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, PosterError::DuplicateName { .. })));
        assert!(errors[0].to_string().contains("MAT_Plastic_Black"));

        lib.materials.truncate(1);
        assert!(validate_library(&lib).is_ok());
    }
}
