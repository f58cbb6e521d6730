use glam::DVec3;

use poster_core::Transform;

use crate::asset::{AssetDocument, Entity, Group, MaterialResource, MediaResource, MeshData};
use crate::material::MaterialParams;

/// A builder for constructing asset documents programmatically.
/// Useful for fixtures, generated assets and unit testing.
pub struct AssetDocumentBuilder {
    doc: AssetDocument,
}

impl AssetDocumentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            doc: AssetDocument::new(name),
        }
    }

    /// A complete stage asset: `EXPORT_<name>` wrapping `SRC_<name>` and a
    /// three-handle `RIG_<name>` chain, with one body mesh under the pitch handle.
    pub fn stage(name: &str) -> Self {
        let root = Entity::empty("RIG_Stage_Root")
            .with_transform(Transform::from_location(DVec3::new(0.0, 0.0, 100.0)));
        let yaw = Entity::empty("RIG_Stage_Yaw").with_parent("RIG_Stage_Root");
        let pitch = Entity::empty("RIG_Stage_Pitch").with_parent("RIG_Stage_Yaw");
        let body = Entity::mesh(format!("{}_body", name), unit_cube()).with_parent("RIG_Stage_Pitch");

        let export = format!("EXPORT_{}", name);
        let src = format!("SRC_{}", name);
        let rig = format!("RIG_{}", name);

        let mut builder = Self::new(name);
        builder
            .group(&export, &[src.as_str(), rig.as_str()])
            .group(&src, &[])
            .group(&rig, &[])
            .entity_in(&rig, root)
            .entity_in(&rig, yaw)
            .entity_in(&rig, pitch)
            .entity_in(&src, body);
        builder
    }

    /// Add a group with the given child group names.
    pub fn group(&mut self, name: &str, children: &[&str]) -> &mut Self {
        let mut group = Group::new(name);
        group.children = children.iter().map(|c| c.to_string()).collect();
        self.doc.groups.push(group);
        self
    }

    /// Add an entity and list it as a member of `group` (created if missing).
    pub fn entity_in(&mut self, group: &str, entity: Entity) -> &mut Self {
        match self.doc.groups.iter_mut().find(|g| g.name == group) {
            Some(g) => g.entities.push(entity.name.clone()),
            None => {
                let mut g = Group::new(group);
                g.entities.push(entity.name.clone());
                self.doc.groups.push(g);
            }
        }
        self.doc.entities.push(entity);
        self
    }

    /// Add a local material and bind it to the first slot of `entity`, if given.
    pub fn local_material(
        &mut self,
        name: &str,
        params: MaterialParams,
        entity: Option<&str>,
    ) -> &mut Self {
        let material = MaterialResource::local(name, params);
        self.bind(material, entity)
    }

    /// Add a material resource as-is and bind it to the first slot of `entity`, if given.
    pub fn material(&mut self, material: MaterialResource, entity: Option<&str>) -> &mut Self {
        self.bind(material, entity)
    }

    pub fn media(&mut self, name: &str, path: &str) -> &mut Self {
        self.doc.media.push(MediaResource::external(name, path));
        self
    }

    fn bind(&mut self, material: MaterialResource, entity: Option<&str>) -> &mut Self {
        if let Some(target) = entity.and_then(|n| self.doc.entity_mut(n)) {
            if let crate::asset::EntityData::Mesh(mesh) = &mut target.data {
                mesh.material_slots.push(Some(material.id));
            }
        }
        self.doc.materials.push(material);
        self
    }

    pub fn build(self) -> AssetDocument {
        self.doc
    }
}

/// An axis-aligned 1 mm cube centred at the origin.
pub fn unit_cube() -> MeshData {
    box_mesh([1.0, 1.0, 1.0])
}

/// An axis-aligned box centred at the origin.
pub fn box_mesh(size: [f64; 3]) -> MeshData {
    let [hx, hy, hz] = size.map(|s| s * 0.5);
    let vertices = vec![
        [-hx, -hy, -hz],
        [hx, -hy, -hz],
        [hx, hy, -hz],
        [-hx, hy, -hz],
        [-hx, -hy, hz],
        [hx, -hy, hz],
        [hx, hy, hz],
        [-hx, hy, hz],
    ];
    let faces = vec![
        vec![0, 3, 2, 1],
        vec![4, 5, 6, 7],
        vec![0, 1, 5, 4],
        vec![1, 2, 6, 5],
        vec![2, 3, 7, 6],
        vec![3, 0, 4, 7],
    ];
    MeshData {
        vertices,
        faces,
        material_slots: Vec::new(),
    }
}
