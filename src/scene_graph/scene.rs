use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use id_arena::Arena;

use crate::model::{Buffers, Instance, MaterialCache, Model};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
        }
    }

    pub fn add_object(&mut self, object: Object3D, parent: Option<ObjectId>) -> ObjectId {
        let id = self.objects.alloc(object);
        if parent.is_some() {
            self.set_object_parent(id, parent);
        }
        id
    }

    #[allow(dead_code)]
    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    #[allow(dead_code)]
    pub fn get_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Instantiates every root node of a glTF scene beneath `parent`.
    /// Meshes referenced by several nodes are converted once. Every mesh is
    /// converted before anything is added, so on error the scene is untouched.
    pub fn spawn_gltf_scene(
        &mut self,
        document: &gltf::Document,
        buffers: Buffers,
        images: &[gltf::image::Data],
        parent: ObjectId,
    ) -> anyhow::Result<Vec<ObjectId>> {
        let gltf_scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| anyhow::anyhow!("No scenes in glTF document"))?;

        let mut spawner = GltfSpawner {
            buffers,
            materials: MaterialCache::new(images),
            converted: HashMap::new(),
            mesh_to_model: HashMap::new(),
        };

        for node in gltf_scene.nodes() {
            spawner.convert_meshes(&node)?;
        }

        Ok(gltf_scene
            .nodes()
            .map(|node| spawner.spawn_node(self, &node, parent))
            .collect())
    }

    fn update_transforms(&self) {
        for (id, object) in self.objects.iter() {
            if object.parent_id.is_none() {
                self.update_object_transform_recursive(id, Mat4::IDENTITY, false);
            }
        }
    }

    fn update_object_transform_recursive(
        &self,
        object_id: ObjectId,
        parent_world_matrix: Mat4,
        parent_changed: bool,
    ) {
        let Some(object) = self.objects.get(object_id) else {
            return;
        };

        let changed = parent_changed || object.transform.is_world_dirty();
        if changed {
            object
                .transform
                .set_world_matrix(parent_world_matrix * object.transform.local_matrix());
        }

        let world_matrix = object.transform.world_matrix();
        for &child_id in &object.child_ids {
            self.update_object_transform_recursive(child_id, world_matrix, changed);
        }
    }

    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(old_parent_id) = self.objects.get(child_id).and_then(|o| o.parent_id) {
            if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                old_parent.child_ids.retain(|&id| id != child_id);
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;
            child.transform.invalidate_world();
        }

        if let Some(new_parent) = new_parent_id.and_then(|id| self.objects.get_mut(id)) {
            new_parent.child_ids.push(child_id);
        }
    }

    pub fn set_object_translation(&mut self, object_id: ObjectId, translation: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_translation(translation);
        }
    }

    pub fn set_object_rotation(&mut self, object_id: ObjectId, rotation: Quat) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_rotation(rotation);
        }
    }

    pub fn world_matrix(&self, object_id: ObjectId) -> Option<Mat4> {
        self.objects
            .get(object_id)
            .map(|object| object.transform.world_matrix())
    }

    /// Refreshes world matrices and rebuilds the per-model instance lists.
    pub fn late_update(&mut self) {
        self.update_transforms();

        for (_, model) in self.models.iter_mut() {
            model.clear_instances();
        }

        for (_, object) in self.objects.iter() {
            let Some(model) = object.model_id.and_then(|id| self.models.get_mut(id)) else {
                continue;
            };
            model.add_instance(Instance {
                model: object.transform.world_matrix(),
                normal: object.transform.normal_matrix(),
            });
        }
    }
}

struct GltfSpawner<'a> {
    buffers: Buffers<'a>,
    materials: MaterialCache<'a>,
    // None for meshes with nothing to draw
    converted: HashMap<usize, Option<Model>>,
    mesh_to_model: HashMap<usize, SceneModelId>,
}

impl GltfSpawner<'_> {
    fn convert_meshes(&mut self, node: &gltf::Node) -> anyhow::Result<()> {
        if let Some(mesh) = node.mesh() {
            let mesh_index = mesh.index();
            if !self.converted.contains_key(&mesh_index) {
                let mesh_name = mesh
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("{} (Mesh)", node.name().unwrap_or("Unnamed")));
                let model = Model::from_gltf(mesh_name, mesh, self.buffers, &mut self.materials)?;

                let model = if model.primitives.is_empty() {
                    log::warn!("Mesh {} has no triangles, skipping it", model.name);
                    None
                } else {
                    Some(model)
                };
                self.converted.insert(mesh_index, model);
            }
        }

        for child in node.children() {
            self.convert_meshes(&child)?;
        }

        Ok(())
    }

    fn scene_model(&mut self, scene: &mut Scene, mesh_index: usize) -> Option<SceneModelId> {
        if let Some(&model_id) = self.mesh_to_model.get(&mesh_index) {
            return Some(model_id);
        }

        let model = self.converted.remove(&mesh_index).flatten()?;
        let model_id = scene.models.alloc(SceneModel::new(model));
        self.mesh_to_model.insert(mesh_index, model_id);
        Some(model_id)
    }

    fn spawn_node(&mut self, scene: &mut Scene, node: &gltf::Node, parent: ObjectId) -> ObjectId {
        let mut object = Object3D::named(node.name().unwrap_or("Unnamed"));

        let (translation, rotation, scale) = node.transform().decomposed();
        object.transform.set_transform(
            translation.into(),
            Quat::from_array(rotation),
            scale.into(),
        );

        if let Some(mesh) = node.mesh() {
            object.model_id = self.scene_model(scene, mesh.index());
        }

        let object_id = scene.add_object(object, Some(parent));

        for child in node.children() {
            self.spawn_node(scene, &child, object_id);
        }

        object_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_translation(scene: &Scene, id: ObjectId, expected: Vec3) {
        let actual = scene.world_matrix(id).unwrap().transform_point3(Vec3::ZERO);
        assert!(
            actual.abs_diff_eq(expected, 1e-5),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn child_inherits_parent_transform() {
        let mut scene = Scene::new();
        let parent = scene.add_object(Object3D::named("Parent"), None);
        let child = scene.add_object(Object3D::named("Child"), Some(parent));

        scene.set_object_translation(parent, Vec3::new(0.0, -10.0, 0.0));
        scene.set_object_translation(child, Vec3::new(1.0, 0.0, 0.0));
        scene.late_update();
        assert_translation(&scene, child, Vec3::new(1.0, -10.0, 0.0));

        // Rotating the parent alone must still move the child.
        scene.set_object_rotation(parent, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        scene.late_update();
        assert_translation(&scene, child, Vec3::new(0.0, -10.0, -1.0));
    }

    #[test]
    fn reparenting_updates_child_lists() {
        let mut scene = Scene::new();
        let a = scene.add_object(Object3D::named("A"), None);
        let b = scene.add_object(Object3D::named("B"), None);
        let child = scene.add_object(Object3D::named("Child"), Some(a));

        scene.set_object_parent(child, Some(b));

        assert!(scene.get_object(a).unwrap().child_ids.is_empty());
        assert_eq!(scene.get_object(b).unwrap().child_ids, vec![child]);
        assert_eq!(scene.get_object_by_name("Child"), Some(child));
    }

    #[test]
    fn empty_scene_has_no_models() {
        let mut scene = Scene::new();
        scene.add_object(Object3D::named("Group"), None);
        scene.late_update();
        assert_eq!(scene.model_count(), 0);
    }
}
