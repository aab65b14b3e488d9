use id_arena::Id;

use crate::{
    model::{Instance, Model},
    rendering::render_model::RenderModelId,
};

pub type SceneModelId = Id<SceneModel>;

pub struct SceneModel {
    pub model: Model,
    /// Set once the renderer has uploaded the model to the GPU.
    pub render_model: Option<RenderModelId>,
    instances: Vec<Instance>,
}

impl SceneModel {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            render_model: None,
            instances: Vec::new(),
        }
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn add_instance(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    pub fn clear_instances(&mut self) {
        self.instances.clear();
    }
}
