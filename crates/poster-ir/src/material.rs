use serde::{Deserialize, Serialize};

use poster_core::Color;

/// Prefix every library material name must carry.
pub const MATERIAL_PREFIX: &str = "MAT_";

/// Parameters of a principled surface preset.
///
/// Every field takes its documented default when absent, so a recipe only
/// needs to list what differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialParams {
    #[serde(alias = "base_color_rgba")]
    pub base_color: Color,
    pub metallic: f64,
    pub roughness: f64,
    pub specular: f64,
    pub ior: f64,
    pub coat: f64,
    pub coat_roughness: f64,
    pub transmission: f64,
    pub alpha: f64,
    pub emission_strength: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<String>,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            base_color: Color::WHITE,
            metallic: 0.0,
            roughness: 0.5,
            specular: 0.5,
            ior: 1.45,
            coat: 0.0,
            coat_roughness: 0.03,
            transmission: 0.0,
            alpha: 1.0,
            emission_strength: 0.0,
            base_color_texture: None,
        }
    }
}

impl MaterialParams {
    /// Problems with parameter ranges, one message per offending field.
    pub fn range_problems(&self) -> Vec<String> {
        let unit = [
            ("metallic", self.metallic),
            ("roughness", self.roughness),
            ("specular", self.specular),
            ("coat", self.coat),
            ("coat_roughness", self.coat_roughness),
            ("transmission", self.transmission),
            ("alpha", self.alpha),
        ];
        let mut problems: Vec<String> = unit
            .iter()
            .filter(|(_, v)| !(0.0..=1.0).contains(v))
            .map(|(name, v)| format!("{} must be within [0, 1], got {}", name, v))
            .collect();
        if self.ior < 1.0 {
            problems.push(format!("ior must be at least 1.0, got {}", self.ior));
        }
        if self.emission_strength < 0.0 {
            problems.push(format!(
                "emission_strength must be non-negative, got {}",
                self.emission_strength
            ));
        }
        problems
    }
}

/// True if `name` follows `MAT_<Category>_<Name>`.
pub fn is_material_name(name: &str) -> bool {
    match name.strip_prefix(MATERIAL_PREFIX) {
        Some(rest) => {
            let mut parts = rest.splitn(2, '_');
            let category = parts.next().unwrap_or("");
            let label = parts.next().unwrap_or("");
            !category.is_empty() && !label.is_empty()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let params: MaterialParams =
            serde_json::from_str(r#"{"metallic": 1.0, "roughness": 0.2}"#).unwrap();
        assert_eq!(params.metallic, 1.0);
        assert_eq!(params.roughness, 0.2);
        assert_eq!(params.ior, 1.45);
        assert_eq!(params.coat_roughness, 0.03);
        assert_eq!(params.base_color, Color::WHITE);
        assert!(params.base_color_texture.is_none());
    }

    #[test]
    fn test_range_problems() {
        let mut params = MaterialParams::default();
        assert!(params.range_problems().is_empty());
        params.roughness = 1.5;
        params.ior = 0.5;
        let problems = params.range_problems();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("roughness"));
    }

    #[test]
    fn test_material_name_convention() {
        assert!(is_material_name("MAT_Plastic_Black"));
        assert!(is_material_name("MAT_Paint_Red_Gloss"));
        assert!(!is_material_name("MAT_Plastic"));
        assert!(!is_material_name("Plastic_Black"));
        assert!(!is_material_name("MAT__Black"));
    }
}
