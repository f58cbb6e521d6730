//! Asset documents: authored groups, entities, materials and media.
//!
//! Group roles come from name prefixes (`EXPORT_`, `SRC_`, `RIG_`).
//! `validate_taxonomy` checks a document against those rules; rig handles
//! keep their captured base alignment in entity properties.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use glam::DQuat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use poster_core::rig::{self, RigHandle, BASE_ORIENTATION_KEY};
use poster_core::{Axis, PosterError, Transform};

use crate::document::{Document, ASSET_FORMAT};
use crate::material::MaterialParams;

/// Self-relative path prefix of media packed into a document.
pub const PACKED_PREFIX: &str = "//packed/";

/// Role of a group, derived from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupRole {
    /// `EXPORT_*`: wrapper holding child groups only.
    Export,
    /// `SRC_*`: geometry.
    Source,
    /// `RIG_*`: transform handles.
    Rig,
    Other,
}

impl GroupRole {
    pub fn of(name: &str) -> Self {
        if name.starts_with("EXPORT_") {
            GroupRole::Export
        } else if name.starts_with("SRC_") {
            GroupRole::Source
        } else if name.starts_with("RIG_") {
            GroupRole::Rig
        } else {
            GroupRole::Other
        }
    }
}

/// A named group of entities and child groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn role(&self) -> GroupRole {
        GroupRole::of(&self.name)
    }
}

/// Polygon geometry with material slots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<Vec<u32>>,
    /// Each slot references a material resource by id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub material_slots: Vec<Option<Uuid>>,
}

/// What an entity carries besides its transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityData {
    /// Transform-only handle.
    Empty,
    Mesh(MeshData),
    /// Flat image referencing a media resource by name.
    Image { media: String },
}

/// An object in an asset document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub transform: Transform,
    pub data: EntityData,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Entity {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            transform: Transform::IDENTITY,
            data: EntityData::Empty,
            properties: BTreeMap::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshData) -> Self {
        Self {
            data: EntityData::Mesh(mesh),
            ..Self::empty(name)
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn is_handle(&self) -> bool {
        matches!(self.data, EntityData::Empty)
    }

    /// Drive this handle to `angle_deg` about its local `axis`.
    pub fn set_rig_angle(&mut self, axis: Axis, angle_deg: f64) -> DQuat {
        rig::set_handle_angle(self, axis, angle_deg)
    }
}

impl RigHandle for Entity {
    fn orientation(&self) -> DQuat {
        self.transform.rotation
    }

    fn set_orientation(&mut self, rotation: DQuat) {
        self.transform.rotation = rotation;
    }

    fn base_alignment(&self) -> Option<DQuat> {
        let value = self.properties.get(BASE_ORIENTATION_KEY)?;
        let xyzw: [f64; 4] = serde_json::from_value(value.clone()).ok()?;
        Some(DQuat::from_array(xyzw))
    }

    fn store_base_alignment(&mut self, base: DQuat) {
        self.properties.insert(
            BASE_ORIENTATION_KEY.to_string(),
            serde_json::json!(base.to_array()),
        );
    }
}

/// Whether a material is owned by the document or borrowed from a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MaterialState {
    Local { params: MaterialParams },
    Linked { library: PathBuf, library_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialResource {
    pub id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub state: MaterialState,
}

impl MaterialResource {
    pub fn local(name: impl Into<String>, params: MaterialParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: MaterialState::Local { params },
        }
    }

    pub fn linked(name: impl Into<String>, library: impl Into<PathBuf>, library_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            state: MaterialState::Linked {
                library: library.into(),
                library_id,
            },
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.state, MaterialState::Linked { .. })
    }
}

/// Bytes embedded in the document, base64 encoded, with their SHA-256.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedData {
    pub sha256: String,
    pub data_b64: String,
}

/// An image or other file used by the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResource {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packed: Option<PackedData>,
}

impl MediaResource {
    pub fn external(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            packed: None,
        }
    }

    /// True if the media still points outside the document's own storage.
    pub fn is_external(&self) -> bool {
        self.packed.is_none() || !self.path.starts_with(PACKED_PREFIX)
    }
}

/// Per-material link state of an asset document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Absent,
    Linked,
    Local,
}

/// An authored asset: groups, entities, materials and media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDocument {
    pub format: String,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub materials: Vec<MaterialResource>,
    #[serde(default)]
    pub media: Vec<MediaResource>,
}

impl Document for AssetDocument {
    const FORMAT: &'static str = ASSET_FORMAT;
}

impl AssetDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            format: ASSET_FORMAT.to_string(),
            name: name.into(),
            groups: Vec::new(),
            entities: Vec::new(),
            materials: Vec::new(),
            media: Vec::new(),
        }
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.name.clone()).collect()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.name == name)
    }

    pub fn material_named(&self, name: &str) -> Option<&MaterialResource> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn material_by_id(&self, id: &Uuid) -> Option<&MaterialResource> {
        self.materials.iter().find(|m| m.id == *id)
    }

    pub fn media_named(&self, name: &str) -> Option<&MediaResource> {
        self.media.iter().find(|m| m.name == name)
    }

    pub fn link_state(&self, material: &str) -> LinkState {
        match self.material_named(material) {
            None => LinkState::Absent,
            Some(m) if m.is_linked() => LinkState::Linked,
            Some(_) => LinkState::Local,
        }
    }

    /// Groups not listed as a child of any other group.
    pub fn top_level_groups(&self) -> Vec<&Group> {
        let children: HashSet<&str> = self
            .groups
            .iter()
            .flat_map(|g| g.children.iter().map(String::as_str))
            .collect();
        self.groups
            .iter()
            .filter(|g| !children.contains(g.name.as_str()))
            .collect()
    }

    /// Names of every entity in `group` and its descendant groups, in document order.
    pub fn group_entity_names(&self, group: &str) -> Vec<String> {
        let mut members = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![group.to_string()];
        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(g) = self.group(&name) {
                members.extend(g.entities.iter().cloned());
                stack.extend(g.children.iter().cloned());
            }
        }
        self.entities
            .iter()
            .filter(|e| members.contains(&e.name))
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn group_is_empty(&self, group: &str) -> bool {
        self.group_entity_names(group).is_empty()
    }

    /// Chain of handles from `name` up to the root, starting with `name`.
    pub fn ancestor_chain(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(name.to_string());
        while let Some(n) = current {
            if !seen.insert(n.clone()) {
                break;
            }
            current = self.entity(&n).and_then(|e| e.parent.clone());
            chain.push(n);
        }
        chain
    }

    /// No linked materials and no media outside packed storage.
    pub fn is_self_contained(&self) -> bool {
        self.linked_material_count() == 0 && self.external_media_count() == 0
    }

    pub fn linked_material_count(&self) -> usize {
        self.materials.iter().filter(|m| m.is_linked()).count()
    }

    pub fn external_media_count(&self) -> usize {
        self.media.iter().filter(|m| m.is_external()).count()
    }

    /// Ids of materials referenced by at least one mesh slot.
    pub fn used_material_ids(&self) -> HashSet<Uuid> {
        self.entities
            .iter()
            .filter_map(|e| match &e.data {
                EntityData::Mesh(mesh) => Some(mesh.material_slots.iter().flatten().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Rewrite every mesh slot pointing at `from` to point at `to`. Returns slots changed.
    pub fn rewrite_material_slots(&mut self, from: Uuid, to: Uuid) -> usize {
        let mut changed = 0;
        for entity in &mut self.entities {
            if let EntityData::Mesh(mesh) = &mut entity.data {
                for slot in mesh.material_slots.iter_mut().flatten() {
                    if *slot == from {
                        *slot = to;
                        changed += 1;
                    }
                }
            }
        }
        changed
    }
}

/// Check an asset document against the group taxonomy.
pub fn validate_taxonomy(doc: &AssetDocument) -> Result<(), Vec<PosterError>> {
    let mut errors = Vec::new();

    let mut group_names = HashSet::new();
    for group in &doc.groups {
        if !group_names.insert(group.name.as_str()) {
            errors.push(PosterError::duplicate("group", &group.name));
        }
    }
    let mut entity_names = HashSet::new();
    for entity in &doc.entities {
        if !entity_names.insert(entity.name.as_str()) {
            errors.push(PosterError::duplicate("entity", &entity.name));
        }
    }

    for group in &doc.groups {
        for child in &group.children {
            if !group_names.contains(child.as_str()) {
                errors.push(taxonomy_error(format!(
                    "group '{}' lists unknown child group '{}'",
                    group.name, child
                )));
            }
        }
        for member in &group.entities {
            if !entity_names.contains(member.as_str()) {
                errors.push(taxonomy_error(format!(
                    "group '{}' lists unknown entity '{}'",
                    group.name, member
                )));
            }
        }

        match group.role() {
            GroupRole::Export => validate_export_group(doc, group, &mut errors),
            GroupRole::Rig => {
                for member in &group.entities {
                    if let Some(e) = doc.entity(member) {
                        if !e.is_handle() {
                            errors.push(taxonomy_error(format!(
                                "rig group '{}' contains non-handle entity '{}'",
                                group.name, member
                            )));
                        }
                    }
                }
                if group.name.to_ascii_lowercase().contains("stage") {
                    if let Err(e) = stage_rig_chain(doc, &group.name) {
                        errors.push(e);
                    }
                }
            }
            _ => {}
        }
    }

    for entity in &doc.entities {
        if let Some(parent) = &entity.parent {
            if !entity_names.contains(parent.as_str()) {
                errors.push(taxonomy_error(format!(
                    "entity '{}' has unknown parent '{}'",
                    entity.name, parent
                )));
            }
        }
        if has_parent_cycle(doc, &entity.name) {
            errors.push(taxonomy_error(format!(
                "handle hierarchy above '{}' contains a cycle",
                entity.name
            )));
        }
        if let EntityData::Mesh(mesh) = &entity.data {
            for id in mesh.material_slots.iter().flatten() {
                if doc.material_by_id(id).is_none() {
                    errors.push(taxonomy_error(format!(
                        "entity '{}' references unknown material id {}",
                        entity.name, id
                    )));
                }
            }
        }
        if let EntityData::Image { media } = &entity.data {
            if doc.media_named(media).is_none() {
                errors.push(taxonomy_error(format!(
                    "entity '{}' references unknown media '{}'",
                    entity.name, media
                )));
            }
        }
    }

    let mut material_names = HashSet::new();
    for material in &doc.materials {
        if !material_names.insert(material.name.as_str()) {
            errors.push(PosterError::duplicate("material", &material.name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_export_group(doc: &AssetDocument, group: &Group, errors: &mut Vec<PosterError>) {
    if !group.entities.is_empty() {
        errors.push(taxonomy_error(format!(
            "export group '{}' holds entities directly; only child groups are allowed",
            group.name
        )));
    }
    let sources: Vec<&String> = group
        .children
        .iter()
        .filter(|c| GroupRole::of(c) == GroupRole::Source)
        .collect();
    let rigs: Vec<&String> = group
        .children
        .iter()
        .filter(|c| GroupRole::of(c) == GroupRole::Rig)
        .collect();
    if sources.len() > 1 {
        errors.push(taxonomy_error(format!(
            "export group '{}' has {} SRC_ children (at most one allowed)",
            group.name,
            sources.len()
        )));
    }
    if rigs.len() > 1 {
        errors.push(taxonomy_error(format!(
            "export group '{}' has {} RIG_ children (at most one allowed)",
            group.name,
            rigs.len()
        )));
    }

    // Source geometry must hang under the rig when both exist.
    if let (Some(src), Some(rig_group)) = (sources.first(), rigs.first()) {
        let handles: HashSet<String> = doc.group_entity_names(rig_group).into_iter().collect();
        for member in doc.group_entity_names(src) {
            let chain = doc.ancestor_chain(&member);
            if !chain.iter().skip(1).any(|a| handles.contains(a)) {
                errors.push(taxonomy_error(format!(
                    "source entity '{}' in '{}' is not parented under a handle of '{}'",
                    member, src, rig_group
                )));
            }
        }
    }
}

/// Resolve a stage rig group into its `[root, yaw, pitch]` handle chain.
pub fn stage_rig_chain(doc: &AssetDocument, rig_group: &str) -> Result<[String; 3], PosterError> {
    let group = doc
        .group(rig_group)
        .ok_or_else(|| taxonomy_error(format!("rig group '{}' not found", rig_group)))?;
    if group.entities.len() != 3 {
        return Err(taxonomy_error(format!(
            "stage rig '{}' must have exactly three handles, found {}",
            rig_group,
            group.entities.len()
        )));
    }
    let members: HashSet<&str> = group.entities.iter().map(String::as_str).collect();
    let parent_in_rig = |name: &str| {
        doc.entity(name)
            .and_then(|e| e.parent.as_deref())
            .filter(|p| members.contains(p))
            .map(str::to_string)
    };
    let roots: Vec<&String> = group
        .entities
        .iter()
        .filter(|n| parent_in_rig(n).is_none())
        .collect();
    let leaves: Vec<&String> = group
        .entities
        .iter()
        .filter(|n| !group.entities.iter().any(|o| parent_in_rig(o).as_deref() == Some(n.as_str())))
        .collect();
    if roots.len() != 1 || leaves.len() != 1 {
        return Err(taxonomy_error(format!(
            "stage rig '{}' handles do not form a single root -> yaw -> pitch chain",
            rig_group
        )));
    }
    let pitch = leaves[0].clone();
    let yaw = parent_in_rig(&pitch).ok_or_else(|| {
        taxonomy_error(format!("stage rig '{}' pitch handle has no yaw parent", rig_group))
    })?;
    let root = parent_in_rig(&yaw).ok_or_else(|| {
        taxonomy_error(format!("stage rig '{}' yaw handle has no root parent", rig_group))
    })?;
    if &root != roots[0] {
        return Err(taxonomy_error(format!(
            "stage rig '{}' chain does not start at its root handle",
            rig_group
        )));
    }
    Ok([root, yaw, pitch])
}

fn has_parent_cycle(doc: &AssetDocument, name: &str) -> bool {
    let mut seen = HashSet::new();
    let mut current = Some(name);
    while let Some(n) = current {
        if !seen.insert(n) {
            return true;
        }
        current = doc.entity(n).and_then(|e| e.parent.as_deref());
    }
    false
}

fn taxonomy_error(message: String) -> PosterError {
    PosterError::Other(format!("asset taxonomy: {}", message))
}
