//! World transforms with dirty tracking.
//!
//! A [`Transform`] stores position, Euler rotation and scale. Every mutator marks
//! the cached world matrix stale; the matrix is recomposed the next time it is
//! read, so callers cannot draw with an outdated matrix by forgetting an update.

use std::cell::Cell;

use cgmath::{Matrix4, Rad, SquareMatrix, Vector3};

/// Position, rotation (pitch/yaw/roll in radians around X/Y/Z) and scale.
#[derive(Clone, Debug)]
pub struct Transform {
    position: Vector3<f32>,
    rotation: Vector3<f32>,
    scale: Vector3<f32>,
    world: Cell<Option<Matrix4<f32>>>,
}

impl Transform {
    /// Identity transform: origin, no rotation, unit scale.
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            world: Cell::new(Some(Matrix4::identity())),
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn rotation(&self) -> Vector3<f32> {
        self.rotation
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn set_position(&mut self, position: impl Into<Vector3<f32>>) {
        self.position = position.into();
        self.world.set(None);
    }

    pub fn set_rotation(&mut self, rotation: impl Into<Vector3<f32>>) {
        self.rotation = rotation.into();
        self.world.set(None);
    }

    pub fn set_scale(&mut self, scale: impl Into<Vector3<f32>>) {
        self.scale = scale.into();
        self.world.set(None);
    }

    pub fn is_dirty(&self) -> bool {
        self.world.get().is_none()
    }

    /// Rotation matrix applying roll (Z), then pitch (X), then yaw (Y).
    pub fn rotation_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_y(Rad(self.rotation.y))
            * Matrix4::from_angle_x(Rad(self.rotation.x))
            * Matrix4::from_angle_z(Rad(self.rotation.z))
    }

    /// Recomposes the world matrix regardless of the dirty flag.
    ///
    /// Points are scaled first, then rotated, then translated. With cgmath's
    /// column vectors that is `T * R * S`, the same matrix a row-vector API
    /// writes as `S * R * T`.
    pub fn update_world_matrix(&mut self) -> Matrix4<f32> {
        let world = self.compose();
        self.world.set(Some(world));
        world
    }

    /// Returns the world matrix, recomposing it first if a mutator ran since the
    /// last read.
    pub fn world_matrix(&self) -> Matrix4<f32> {
        match self.world.get() {
            Some(world) => world,
            None => {
                let world = self.compose();
                self.world.set(Some(world));
                world
            }
        }
    }

    fn compose(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * self.rotation_matrix()
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
