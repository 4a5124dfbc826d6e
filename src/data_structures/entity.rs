use cgmath::{Matrix4, Vector3};

use crate::data_structures::{mesh::MeshRef, transform::Transform};

/// A drawable object: one shared mesh placed in the world by its own transform.
#[derive(Clone, Debug)]
pub struct GameEntity {
    mesh: MeshRef,
    transform: Transform,
}

impl GameEntity {
    pub fn new(mesh: MeshRef) -> Self {
        Self {
            mesh,
            transform: Transform::new(),
        }
    }

    pub fn mesh(&self) -> MeshRef {
        self.mesh
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_position(&mut self, position: impl Into<Vector3<f32>>) {
        self.transform.set_position(position);
    }

    pub fn set_rotation(&mut self, rotation: impl Into<Vector3<f32>>) {
        self.transform.set_rotation(rotation);
    }

    pub fn set_scale(&mut self, scale: impl Into<Vector3<f32>>) {
        self.transform.set_scale(scale);
    }

    pub fn update_world_matrix(&mut self) -> Matrix4<f32> {
        self.transform.update_world_matrix()
    }

    pub fn world_matrix(&self) -> Matrix4<f32> {
        self.transform.world_matrix()
    }
}
