//! The poster manifest: a declarative description of one poster scene.
//!
//! Objects are parsed one at a time from raw JSON so that a bad entry is
//! reported with its name and index instead of a bare serde path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use poster_core::{Axis, Color, PosterError, TrackAxis};

use crate::material::MaterialParams;

/// Container objects land in when the entry names none.
pub const DEFAULT_CONTAINER: &str = "WORLD";

/// Containers the builder owns outright; objects may not be placed in them.
pub const RESERVED_CONTAINERS: [&str; 2] = ["LIGHTS", "HELPERS"];

pub const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterSettings {
    #[serde(alias = "poster_size_mm")]
    pub size_mm: f64,
    pub ppi: u32,
    pub safe_margin_mm: f64,
}

impl Default for PosterSettings {
    fn default() -> Self {
        Self {
            size_mm: 1219.2,
            ppi: 150,
            safe_margin_mm: 25.4,
        }
    }
}

impl PosterSettings {
    /// Square output resolution in pixels at `ppi`.
    pub fn resolution_px(&self, ppi: u32) -> u32 {
        ((self.size_mm / MM_PER_INCH) * ppi as f64).round() as u32
    }

    /// Side of the safe area guide, never below 1 mm.
    pub fn safe_area_mm(&self) -> f64 {
        (self.size_mm - 2.0 * self.safe_margin_mm).max(1.0)
    }
}

/// Renderer options, passed through to the scene document untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    #[serde(alias = "background_color_rgba")]
    pub color: Color,
    pub strength: f64,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            strength: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSpec {
    pub name: String,
    pub location_mm: [f64; 3],
    pub target_mm: [f64; 3],
    pub lens_mm: f64,
    pub sensor_width_mm: f64,
    pub clip_start_mm: f64,
    pub clip_end_mm: f64,
}

impl Default for CameraSpec {
    fn default() -> Self {
        Self {
            name: "CAM_Poster".to_string(),
            location_mm: [0.0, -1750.0, 750.0],
            target_mm: [0.0, 0.0, 0.0],
            lens_mm: 85.0,
            sensor_width_mm: 36.0,
            clip_start_mm: 10.0,
            clip_end_mm: 200_000.0,
        }
    }
}

impl CameraSpec {
    pub fn location(&self) -> DVec3 {
        DVec3::from_array(self.location_mm)
    }

    pub fn target(&self) -> DVec3 {
        DVec3::from_array(self.target_mm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    #[default]
    #[serde(alias = "AREA")]
    Area,
    #[serde(alias = "POINT")]
    Point,
    #[serde(alias = "SUN")]
    Sun,
    #[serde(alias = "SPOT")]
    Spot,
}

/// Everything about a light except its name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub enabled: bool,
    #[serde(rename = "type", alias = "light_type")]
    pub kind: LightKind,
    pub location_mm: [f64; 3],
    pub rotation_deg: Option<[f64; 3]>,
    pub target_mm: Option<[f64; 3]>,
    #[serde(alias = "power")]
    pub energy: f64,
    #[serde(alias = "color_rgb")]
    pub color: Color,
    pub size_mm: f64,
    pub size_xy_mm: Option<[f64; 2]>,
    pub spot_size_deg: Option<f64>,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: LightKind::Area,
            location_mm: [0.0; 3],
            rotation_deg: None,
            target_mm: None,
            energy: 1000.0,
            color: Color::WHITE,
            size_mm: 1000.0,
            size_xy_mm: None,
            spot_size_deg: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSpec {
    pub name: String,
    #[serde(flatten)]
    pub settings: LightSettings,
}

/// The `three_area` light rig: key, fill and rim area lights plus extras.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
struct LightRig {
    enabled: Option<bool>,
    rig: Option<String>,
    key: Option<LightSettings>,
    fill: Option<LightSettings>,
    rim: Option<LightSettings>,
    extras: Vec<LightSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LightsRepr {
    List(Vec<LightSpec>),
    Rig(LightRig),
}

impl Default for LightsRepr {
    fn default() -> Self {
        LightsRepr::List(Vec::new())
    }
}

impl LightsRepr {
    fn expand(self) -> Result<Vec<LightSpec>, PosterError> {
        match self {
            LightsRepr::List(list) => Ok(list),
            LightsRepr::Rig(rig) => {
                if rig.enabled == Some(false) {
                    return Ok(Vec::new());
                }
                let mut lights = Vec::new();
                match rig.rig.as_deref().unwrap_or("three_area") {
                    "three_area" => {
                        for (name, settings) in [
                            ("LIGHT_Key", rig.key),
                            ("LIGHT_Fill", rig.fill),
                            ("LIGHT_Rim", rig.rim),
                        ] {
                            lights.push(LightSpec {
                                name: name.to_string(),
                                settings: settings.unwrap_or_default(),
                            });
                        }
                    }
                    "none" => {}
                    other => {
                        return Err(PosterError::manifest(format!(
                            "unknown light rig '{}'",
                            other
                        )))
                    }
                }
                lights.extend(rig.extras);
                Ok(lights)
            }
        }
    }
}

/// Uniform value or per-axis triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extent {
    Uniform(f64),
    PerAxis([f64; 3]),
}

impl Extent {
    pub fn to_array(self) -> [f64; 3] {
        match self {
            Extent::Uniform(v) => [v; 3],
            Extent::PerAxis(a) => a,
        }
    }

    pub fn to_vec3(self) -> DVec3 {
        DVec3::from_array(self.to_array())
    }
}

impl Default for Extent {
    fn default() -> Self {
        Extent::Uniform(1.0)
    }
}

/// Square side or `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Square(f64),
    Rect([f64; 2]),
}

impl SizeSpec {
    pub fn dims(self) -> [f64; 2] {
        match self {
            SizeSpec::Square(s) => [s, s],
            SizeSpec::Rect(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldPlacement {
    pub location_mm: [f64; 3],
    pub rotation_deg: [f64; 3],
    pub scale: Extent,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AimSpec {
    pub target_mm: Option<[f64; 3]>,
    /// Name of another object entry, optionally qualified as `CONTAINER/name`.
    pub target: Option<String>,
    pub track_axis: TrackAxis,
    pub up_axis: Axis,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterPlacement {
    pub poster_xy_mm: [f64; 2],
    pub size_mm: Option<f64>,
    /// Positive moves toward the camera.
    pub z_mm: f64,
    pub screen_lock: bool,
    pub aim: Option<AimSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    World(WorldPlacement),
    Poster(PosterPlacement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    #[default]
    #[serde(alias = "link", alias = "instance")]
    Reference,
    #[serde(alias = "append")]
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigPose {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportReference {
    pub filepath: PathBuf,
    #[serde(alias = "collection_name")]
    pub group_name: String,
    #[serde(default)]
    pub link_mode: LinkMode,
    #[serde(default = "one")]
    pub import_scale: f64,
    #[serde(default)]
    pub rig_pose: Option<RigPose>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImagePlane {
    pub image_path: PathBuf,
    #[serde(default = "one")]
    pub emission_strength: f64,
    #[serde(default)]
    pub size_mm: Option<SizeSpec>,
}

impl ImagePlane {
    pub const DEFAULT_SIZE_MM: [f64; 2] = [100.0, 100.0];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Plane {
        #[serde(default = "default_plane_size")]
        size_mm: SizeSpec,
    },
    Cube {
        #[serde(default = "default_cube_size")]
        size_mm: Extent,
    },
    UvSphere {
        #[serde(default = "default_sphere_radius")]
        radius_mm: f64,
        #[serde(default = "default_sphere_segments")]
        segments: u32,
        #[serde(default = "default_sphere_rings")]
        rings: u32,
    },
    #[serde(alias = "backdrop")]
    Cyclorama {
        #[serde(default = "default_cyc_width")]
        width_mm: f64,
        #[serde(default = "default_cyc_floor")]
        floor_depth_mm: f64,
        #[serde(default = "default_cyc_wall")]
        wall_height_mm: f64,
        #[serde(default = "default_cyc_radius")]
        radius_mm: f64,
        #[serde(default = "default_cyc_segments")]
        segments: u32,
    },
}

/// A primitive's surface: a library material by name, or inline parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaterialRef {
    Named(String),
    Library { library: PathBuf, name: String },
    Inline(MaterialParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub shape: Shape,
    pub material: Option<MaterialRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Text {
    pub body: String,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default = "default_text_size")]
    pub size_mm: f64,
    #[serde(default = "default_text_color")]
    pub color: Color,
    #[serde(default)]
    pub align: TextAlign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    ImportReference(ImportReference),
    ImagePlane(ImagePlane),
    Primitive(Primitive),
    Text(Text),
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::ImportReference(_) => "import_reference",
            ObjectKind::ImagePlane(_) => "image_plane",
            ObjectKind::Primitive(_) => "primitive",
            ObjectKind::Text(_) => "text",
        }
    }
}

/// One entry of the manifest `objects` list.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub name: String,
    pub enabled: bool,
    pub container: String,
    pub placement: Placement,
    pub kind: ObjectKind,
    /// Position in the manifest `objects` list.
    pub index: usize,
}

impl ObjectEntry {
    /// `<container>/<name>`, the entry's subtree key.
    pub fn path(&self) -> String {
        format!("{}/{}", self.container, self.name)
    }
}

/// A parsed poster manifest.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ManifestDocument {
    /// File the manifest was read from; relative paths resolve against it.
    pub source: Option<PathBuf>,
    pub poster: PosterSettings,
    pub render: RenderSettings,
    pub world: WorldSettings,
    pub camera: CameraSpec,
    pub lights: Vec<LightSpec>,
    pub objects: Vec<ObjectEntry>,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    poster: PosterSettings,
    #[serde(default)]
    render: RenderSettings,
    #[serde(default)]
    world: WorldSettings,
    #[serde(default)]
    camera: CameraSpec,
    #[serde(default)]
    lights: LightsRepr,
    #[serde(default)]
    objects: Vec<Value>,
}

impl ManifestDocument {
    /// Parse manifest text, reporting every malformed object entry.
    pub fn parse(text: &str) -> Result<Self, Vec<PosterError>> {
        let raw: RawManifest = serde_json::from_str(text)
            .map_err(|e| vec![PosterError::manifest(format!("invalid manifest: {}", e))])?;

        let mut errors = Vec::new();
        let lights = match raw.lights.expand() {
            Ok(lights) => lights,
            Err(e) => {
                errors.push(e);
                Vec::new()
            }
        };

        let mut objects = Vec::with_capacity(raw.objects.len());
        for (index, value) in raw.objects.iter().enumerate() {
            match parse_object(value, index) {
                Ok(entry) => objects.push(entry),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self {
            source: None,
            poster: raw.poster,
            render: raw.render,
            world: raw.world,
            camera: raw.camera,
            lights,
            objects,
        })
    }

    pub fn load(path: &Path) -> Result<Self, Vec<PosterError>> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            vec![PosterError::manifest(format!(
                "cannot read manifest {}: {}",
                path.display(),
                e
            ))]
        })?;
        let mut manifest = Self::parse(&text)?;
        manifest.source = Some(path.to_path_buf());
        Ok(manifest)
    }

    pub fn enabled_objects(&self) -> impl Iterator<Item = &ObjectEntry> {
        self.objects.iter().filter(|o| o.enabled)
    }

    /// Find an object entry by `name` or `CONTAINER/name`.
    pub fn find_objects(&self, reference: &str) -> Vec<&ObjectEntry> {
        match reference.split_once('/') {
            Some((container, name)) => self
                .objects
                .iter()
                .filter(|o| o.container == container && o.name == name)
                .collect(),
            None => self.objects.iter().filter(|o| o.name == reference).collect(),
        }
    }
}

fn parse_object(value: &Value, index: usize) -> Result<ObjectEntry, PosterError> {
    let name = value.get("name").and_then(Value::as_str);
    let fail = |message: String| PosterError::manifest_entry(message, name, index);

    if !value.is_object() {
        return Err(fail("object entry must be a JSON object".into()));
    }
    let name = name
        .ok_or_else(|| fail("missing string field 'name'".into()))?
        .to_string();
    let kind = value
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| fail("missing string field 'kind'".into()))?;

    let enabled = match value.get("enabled") {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(fail("'enabled' must be a boolean".into())),
    };
    let container = match value.get("container") {
        None => DEFAULT_CONTAINER.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(fail("'container' must be a string".into())),
    };

    let space = match value.get("space") {
        None => "world".to_string(),
        Some(Value::String(s)) => s.to_ascii_lowercase(),
        Some(_) => return Err(fail("'space' must be a string".into())),
    };
    let placement = match space.as_str() {
        "world" => Placement::World(
            serde_json::from_value(value.clone())
                .map_err(|e| fail(format!("invalid world placement: {}", e)))?,
        ),
        "poster" => Placement::Poster(
            serde_json::from_value(value.clone())
                .map_err(|e| fail(format!("invalid poster placement: {}", e)))?,
        ),
        other => return Err(fail(format!("unknown space '{}'", other))),
    };

    let invalid = |e: serde_json::Error| fail(format!("invalid {} entry: {}", kind, e));
    let kind = match kind {
        "import_reference" => {
            ObjectKind::ImportReference(serde_json::from_value(value.clone()).map_err(invalid)?)
        }
        "image_plane" => ObjectKind::ImagePlane(serde_json::from_value(value.clone()).map_err(invalid)?),
        "primitive" => {
            let shape: Shape = serde_json::from_value(value.clone()).map_err(invalid)?;
            let material = value
                .get("material")
                .map(|m| serde_json::from_value::<MaterialRef>(m.clone()))
                .transpose()
                .map_err(invalid)?;
            ObjectKind::Primitive(Primitive { shape, material })
        }
        "text" => ObjectKind::Text(serde_json::from_value(value.clone()).map_err(invalid)?),
        other => return Err(fail(format!("unknown kind '{}'", other))),
    };

    Ok(ObjectEntry {
        name,
        enabled,
        container,
        placement,
        kind,
        index,
    })
}

fn one() -> f64 {
    1.0
}
fn default_plane_size() -> SizeSpec {
    SizeSpec::Square(1000.0)
}
fn default_cube_size() -> Extent {
    Extent::Uniform(1000.0)
}
fn default_sphere_radius() -> f64 {
    500.0
}
fn default_sphere_segments() -> u32 {
    32
}
fn default_sphere_rings() -> u32 {
    16
}
fn default_cyc_width() -> f64 {
    6000.0
}
fn default_cyc_floor() -> f64 {
    4000.0
}
fn default_cyc_wall() -> f64 {
    3000.0
}
fn default_cyc_radius() -> f64 {
    600.0
}
fn default_cyc_segments() -> u32 {
    24
}
fn default_text_size() -> f64 {
    50.0
}
fn default_text_color() -> Color {
    Color::BLACK
}
