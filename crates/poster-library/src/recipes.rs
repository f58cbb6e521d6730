//! Material recipes: the authored source of every library material.
//!
//! Recipes come from a JSON or TOML file listing `materials`, or from the
//! built-in starter set. Names are stable keys; keep them unchanged when
//! editing parameters so library ids survive rebuilds.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use poster_core::{Color, PosterError};
use poster_ir::material::is_material_name;
use poster_ir::MaterialParams;

/// The only supported shading model.
pub const PRINCIPLED: &str = "principled";

fn default_shader() -> String {
    PRINCIPLED.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecipe {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default = "default_shader")]
    pub shader: String,
    #[serde(flatten)]
    pub params: MaterialParams,
}

#[derive(Debug, Deserialize)]
struct RecipeFile {
    #[serde(default)]
    materials: Vec<MaterialRecipe>,
}

/// A validated, ordered set of recipes.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeStore {
    recipes: Vec<MaterialRecipe>,
}

impl RecipeStore {
    /// Validate and wrap `recipes`, reporting every problem at once.
    pub fn new(recipes: Vec<MaterialRecipe>) -> Result<Self, Vec<PosterError>> {
        let store = Self { recipes };
        store.validate()?;
        Ok(store)
    }

    /// Load a recipe file. The format follows the extension (`.toml` or `.json`).
    pub fn load(path: &Path) -> Result<Self, Vec<PosterError>> {
        let contents = std::fs::read_to_string(path).map_err(|e| vec![PosterError::Io(e)])?;
        let file: RecipeFile = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .map_err(|e| vec![PosterError::document(format!("invalid recipe file: {}", e), path)])?,
            Some("json") => serde_json::from_str(&contents)
                .map_err(|e| vec![PosterError::document(format!("invalid recipe file: {}", e), path)])?,
            _ => {
                return Err(vec![PosterError::document(
                    "recipe file must be .toml or .json",
                    path,
                )])
            }
        };
        tracing::debug!("loaded {} recipes from {}", file.materials.len(), path.display());
        Self::new(file.materials)
    }

    pub fn builtin() -> Self {
        Self {
            recipes: builtin_recipes(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialRecipe> {
        self.recipes.iter()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MaterialRecipe> {
        self.recipes.iter().find(|r| r.name == name)
    }

    fn validate(&self) -> Result<(), Vec<PosterError>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        for recipe in &self.recipes {
            if !seen.insert(recipe.name.as_str()) {
                errors.push(PosterError::duplicate("material", &recipe.name));
            }
            if !is_material_name(&recipe.name) {
                errors.push(PosterError::InvalidArgument(format!(
                    "material '{}' does not follow MAT_<Category>_<Name>",
                    recipe.name
                )));
            }
            if !recipe.shader.eq_ignore_ascii_case(PRINCIPLED) {
                errors.push(PosterError::InvalidArgument(format!(
                    "unsupported shader '{}' for {}",
                    recipe.shader, recipe.name
                )));
            }
            for problem in recipe.params.range_problems() {
                errors.push(PosterError::InvalidArgument(format!("{}: {}", recipe.name, problem)));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `(name, description, tags, rgb, metallic, roughness, specular, coat, coat_roughness)`
type Starter = (&'static str, &'static str, &'static [&'static str], [f32; 3], f64, f64, f64, f64, f64);

const STARTER_SET: &[Starter] = &[
    ("MAT_Plastic_Black", "Neutral black plastic (moderate roughness, subtle coat).",
        &["plastic", "black"], [0.03, 0.03, 0.03], 0.0, 0.45, 0.50, 0.10, 0.20),
    ("MAT_Plastic_White", "Neutral white plastic (slightly glossy).",
        &["plastic", "white"], [0.90, 0.90, 0.90], 0.0, 0.35, 0.50, 0.05, 0.25),
    ("MAT_Rubber_Black", "Black rubber (high roughness, low specular).",
        &["rubber", "black"], [0.02, 0.02, 0.02], 0.0, 0.80, 0.20, 0.00, 0.50),
    ("MAT_Aluminum_Brushed", "Brushed aluminum baseline (metallic, moderate roughness).",
        &["metal", "aluminum"], [0.80, 0.80, 0.82], 1.0, 0.28, 0.50, 0.00, 0.25),
    ("MAT_Steel_Polished", "Polished steel baseline (metallic, low roughness).",
        &["metal", "steel"], [0.72, 0.74, 0.76], 1.0, 0.12, 0.50, 0.00, 0.20),
    ("MAT_Paint_Red_Gloss", "Glossy red paint (plastic base with coat).",
        &["paint", "red"], [0.60, 0.05, 0.05], 0.0, 0.30, 0.50, 0.35, 0.10),
    ("MAT_Paint_Black_PowderCoat", "Black powder-coated or painted metal (satin).",
        &["paint", "black", "satin"], [0.02, 0.02, 0.02], 0.0, 0.60, 0.50, 0.08, 0.35),
    ("MAT_Aluminum_Cast_Matte", "Cast or bead-blasted aluminum (matte, slightly rough).",
        &["metal", "aluminum", "cast"], [0.78, 0.78, 0.80], 1.0, 0.55, 0.50, 0.00, 0.25),
    ("MAT_Aluminum_Machined", "Machined aluminum (clean, slightly shinier than cast).",
        &["metal", "aluminum", "machined"], [0.83, 0.83, 0.85], 1.0, 0.28, 0.50, 0.00, 0.20),
    ("MAT_Steel_Black_Oxide", "Black-oxide steel for dark fasteners.",
        &["metal", "steel", "black"], [0.06, 0.06, 0.06], 1.0, 0.35, 0.50, 0.00, 0.20),
    ("MAT_Plastic_Grey", "Neutral light-grey plastic (connector housings).",
        &["plastic", "grey", "gray"], [0.65, 0.65, 0.65], 0.0, 0.45, 0.50, 0.05, 0.30),
];

fn builtin_recipes() -> Vec<MaterialRecipe> {
    STARTER_SET
        .iter()
        .map(
            |&(name, description, tags, [r, g, b], metallic, roughness, specular, coat, coat_roughness)| {
                MaterialRecipe {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    shader: default_shader(),
                    params: MaterialParams {
                        base_color: Color::rgb(r, g, b),
                        metallic,
                        roughness,
                        specular,
                        ior: 1.45,
                        coat,
                        coat_roughness,
                        ..MaterialParams::default()
                    },
                }
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_set_is_valid() {
        let store = RecipeStore::builtin();
        assert_eq!(store.len(), 11);
        assert!(store.validate().is_ok());
        let steel = store.get("MAT_Steel_Polished").unwrap();
        assert_eq!(steel.params.metallic, 1.0);
        assert_eq!(steel.params.roughness, 0.12);
        assert_eq!(steel.params.alpha, 1.0);
    }

    #[test]
    fn test_load_toml_and_json() {
        let dir = std::env::temp_dir().join(format!("poster_recipes_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let toml_path = dir.join("recipes.toml");
        std::fs::write(
            &toml_path,
            r#"
[[materials]]
name = "MAT_Glass_Clear"
description = "Clear glass"
tags = ["glass"]
base_color = [1.0, 1.0, 1.0, 1.0]
roughness = 0.0
transmission = 1.0
ior = 1.5
"#,
        )
        .unwrap();
        let store = RecipeStore::load(&toml_path).unwrap();
        let glass = store.get("MAT_Glass_Clear").unwrap();
        assert_eq!(glass.params.transmission, 1.0);
        assert_eq!(glass.shader, PRINCIPLED);
        assert_eq!(glass.params.coat_roughness, 0.03);

        let json_path = dir.join("recipes.json");
        std::fs::write(
            &json_path,
            r#"{"materials": [{"name": "MAT_Paint_Blue", "base_color_rgba": [0.1, 0.2, 0.8, 1.0]}]}"#,
        )
        .unwrap();
        let store = RecipeStore::load(&json_path).unwrap();
        assert_eq!(store.get("MAT_Paint_Blue").unwrap().params.base_color.b, 0.8);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rejects_bad_recipes() {
        let mut bad = builtin_recipes();
        bad[1].name = bad[0].name.clone();
        bad[2].shader = "toon".into();
        bad[3].name = "Aluminum".into();
        bad[4].params.roughness = 2.0;
        let errors = RecipeStore::new(bad).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| matches!(e, PosterError::DuplicateName { .. })));
        assert!(errors.iter().any(|e| e.to_string().contains("unsupported shader 'toon'")));
    }
}
