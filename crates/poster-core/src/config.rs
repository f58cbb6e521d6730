use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PosterError, PosterResult};

/// Name of the optional project configuration file.
pub const CONFIG_FILE_NAME: &str = "poster.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub library: PathBuf,
    pub catalog: PathBuf,
    /// Recipe file (JSON or TOML). Unset means the built-in starter set.
    pub recipes: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub scene_output: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            library: PathBuf::from("assets/library/materials/materials.json"),
            catalog: PathBuf::from("assets/library/materials/materials_catalog.json"),
            recipes: None,
            manifest: None,
            scene_output: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub materials: Vec<String>,
    pub pack: bool,
    pub used_only: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            materials: vec![crate::pattern::DEFAULT_MATERIAL_PATTERN.to_string()],
            pack: true,
            used_only: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// External renderer executable.
    pub program: String,
    /// Argument template. `{scene}`, `{output}` and `{resolution}` are substituted.
    pub args: Vec<String>,
    pub output: Option<PathBuf>,
    pub ppi: Option<u32>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: "poster-render".to_string(),
            args: vec![
                "--scene".to_string(),
                "{scene}".to_string(),
                "--output".to_string(),
                "{output}".to_string(),
                "--resolution".to_string(),
                "{resolution}".to_string(),
            ],
            output: None,
            ppi: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PosterConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl PosterConfig {
    pub fn load_from_file(path: &Path) -> PosterResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| PosterError::document(format!("invalid configuration: {}", e), path))
    }

    pub fn save_to_file(&self, path: &Path) -> PosterResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PosterError::Other(format!("failed to serialize configuration: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load `poster.toml` from `dir` if present, otherwise the defaults.
    pub fn discover(dir: &Path) -> PosterResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }
}
