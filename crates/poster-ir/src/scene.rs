//! The composed scene document handed to the renderer.
//!
//! Objects live in named containers, one subtree per manifest entry, so a
//! rebuild can replace or drop exactly the subtrees it owns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use poster_core::{Color, Transform};

use crate::document::{Document, SCENE_FORMAT};
use crate::manifest::{LightKind, TextAlign, WorldSettings};
use crate::material::MaterialParams;

/// Poster geometry as resolved for this scene.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PosterInfo {
    pub size_mm: f64,
    pub ppi: u32,
    pub safe_margin_mm: f64,
    /// Distance from the camera to the poster plane.
    pub plane_distance_mm: f64,
    pub resolution_px: u32,
}

/// Per-ray visibility flags of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub camera: bool,
    pub diffuse: bool,
    pub glossy: bool,
    pub transmission: bool,
    pub shadow: bool,
    pub scatter: bool,
}

impl Visibility {
    /// Seen by the camera only: casts no shadow and lights nothing.
    pub fn camera_only() -> Self {
        Self {
            camera: true,
            diffuse: false,
            glossy: false,
            transmission: false,
            shadow: false,
            scatter: false,
        }
    }

    pub fn hidden() -> Self {
        Self {
            camera: false,
            ..Self::camera_only()
        }
    }
}

/// Surface assigned to a mesh slot in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SceneMaterial {
    Unassigned,
    Inline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        params: MaterialParams,
    },
    /// Resolved by name against a library at render time.
    Library {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        library: Option<String>,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeContent {
    Empty,
    /// Live instance of a group in an external asset document.
    Instance {
        source: String,
        group: String,
        requested_group: String,
    },
    Mesh {
        vertices: Vec<[f64; 3]>,
        faces: Vec<Vec<u32>>,
        #[serde(default)]
        materials: Vec<SceneMaterial>,
    },
    ImagePlane {
        image: String,
        width_mm: f64,
        height_mm: f64,
        emission_strength: f64,
    },
    Text {
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font: Option<String>,
        size_mm: f64,
        color: Color,
        align: TextAlign,
    },
    Camera {
        lens_mm: f64,
        sensor_width_mm: f64,
        clip_start_mm: f64,
        clip_end_mm: f64,
    },
    Light {
        kind: LightKind,
        energy: f64,
        color: Color,
        size_mm: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_xy_mm: Option<[f64; 2]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spot_size_deg: Option<f64>,
    },
    /// Non-rendering reference plane.
    Guide { width_mm: f64, height_mm: f64 },
}

/// A node of the scene graph. Transforms are local to `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub transform: Transform,
    pub content: NodeContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, transform: Transform, content: NodeContent) -> Self {
        Self {
            name: name.into(),
            parent: None,
            transform,
            content,
            visibility: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// All nodes built for one manifest entry. The first node is the root handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtree {
    pub kind: String,
    pub nodes: Vec<SceneNode>,
}

impl Subtree {
    pub fn root(&self) -> Option<&SceneNode> {
        self.nodes.first()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub subtrees: BTreeMap<String, Subtree>,
}

/// The composed poster scene handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub format: String,
    #[serde(default)]
    pub poster: PosterInfo,
    #[serde(default)]
    pub render: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub world: WorldSettings,
    #[serde(default)]
    pub camera: Option<SceneNode>,
    #[serde(default)]
    pub lights: Vec<SceneNode>,
    /// Reference guides (the HELPERS container).
    #[serde(default)]
    pub helpers: Vec<SceneNode>,
    #[serde(default)]
    pub containers: BTreeMap<String, Container>,
}

impl Document for SceneDocument {
    const FORMAT: &'static str = SCENE_FORMAT;
}

impl Default for SceneDocument {
    fn default() -> Self {
        Self {
            format: SCENE_FORMAT.to_string(),
            poster: PosterInfo::default(),
            render: BTreeMap::new(),
            world: WorldSettings::default(),
            camera: None,
            lights: Vec::new(),
            helpers: Vec::new(),
            containers: BTreeMap::new(),
        }
    }
}

impl SceneDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subtree(&self, container: &str, name: &str) -> Option<&Subtree> {
        self.containers.get(container)?.subtrees.get(name)
    }

    /// Insert or replace the subtree `<container>/<name>`. Returns the previous one.
    pub fn replace_subtree(&mut self, container: &str, name: &str, subtree: Subtree) -> Option<Subtree> {
        self.containers
            .entry(container.to_string())
            .or_default()
            .subtrees
            .insert(name.to_string(), subtree)
    }

    /// Remove the subtree `<container>/<name>`, dropping the container once empty.
    pub fn remove_subtree(&mut self, container: &str, name: &str) -> Option<Subtree> {
        let c = self.containers.get_mut(container)?;
        let removed = c.subtrees.remove(name);
        if c.subtrees.is_empty() {
            self.containers.remove(container);
        }
        removed
    }

    /// Every `<container>/<name>` key currently in the scene.
    pub fn subtree_paths(&self) -> Vec<(String, String)> {
        self.containers
            .iter()
            .flat_map(|(c, container)| {
                container
                    .subtrees
                    .keys()
                    .map(move |name| (c.clone(), name.clone()))
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        let subtree_nodes: usize = self
            .containers
            .values()
            .flat_map(|c| c.subtrees.values())
            .map(|s| s.nodes.len())
            .sum();
        subtree_nodes + self.lights.len() + self.helpers.len() + usize::from(self.camera.is_some())
    }
}
