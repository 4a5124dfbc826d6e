//! A free-flying, left-handed camera.
//!
//! World space is left-handed with +Y up and +Z into the screen. The
//! projection maps depth to the 0..1 range wgpu uses.

use std::time::Duration;

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, Zero};
use winit::keyboard::KeyCode;

use crate::input::InputState;

pub const FOV_Y: Rad<f32> = Rad(std::f32::consts::FRAC_PI_4);
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 100.0;

/// Pitch stays short of straight up/down so the view basis never degenerates.
const SAFE_FRAC_PI_2: f32 = std::f32::consts::FRAC_PI_2 - 0.0001;

/// Left-handed perspective projection with depth in 0..1.
pub fn perspective_lh(fov_y: Rad<f32>, aspect: f32, near: f32, far: f32) -> Matrix4<f32> {
    let f = 1.0 / (fov_y.0 / 2.0).tan();
    let range = far / (far - near);
    #[rustfmt::skip]
    let m = Matrix4::new(
        f / aspect, 0.0, 0.0,            0.0,
        0.0,        f,   0.0,            0.0,
        0.0,        0.0, range,          1.0,
        0.0,        0.0, -near * range,  0.0,
    );
    m
}

#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Point3<f32>,
    /// Rotation around +Y; zero looks down +Z.
    pub yaw: Rad<f32>,
    /// Rotation around the camera's right axis; positive looks down.
    pub pitch: Rad<f32>,
    aspect: f32,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
}

impl Camera {
    pub fn new(position: impl Into<Point3<f32>>, aspect: f32) -> Self {
        let mut camera = Self {
            position: position.into(),
            yaw: Rad(0.0),
            pitch: Rad(0.0),
            aspect,
            view: Matrix4::from_scale(1.0),
            projection: Matrix4::from_scale(1.0),
        };
        camera.update(Duration::ZERO);
        camera.update_projection(aspect);
        camera
    }

    pub fn forward(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        Vector3::new(sin_yaw * cos_pitch, -sin_pitch, cos_yaw * cos_pitch).normalize()
    }

    pub fn right(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        Vector3::new(cos_yaw, 0.0, -sin_yaw)
    }

    /// Recomputes the view matrix from position and orientation.
    pub fn update(&mut self, _dt: Duration) {
        self.view = Matrix4::look_to_lh(self.position, self.forward(), Vector3::unit_y());
    }

    /// Recomputes the projection for a new aspect ratio.
    pub fn update_projection(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection = perspective_lh(FOV_Y, aspect, Z_NEAR, Z_FAR);
    }

    pub fn view(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }
}

/// Moves and turns the camera from keyboard and mouse input.
#[derive(Debug)]
pub struct CameraController {
    speed: f32,
    sensitivity: f32,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self { speed, sensitivity }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn update(&mut self, camera: &mut Camera, input: &InputState, dt: Duration) {
        let dt = dt.as_secs_f32();

        let scroll = input.scroll_delta();
        if scroll != 0.0 {
            self.speed = (self.speed * 1.1f32.powf(scroll)).clamp(0.1, 100.0);
        }

        let axis = |pos: KeyCode, neg: KeyCode| {
            (input.is_key_down(pos) as i32 - input.is_key_down(neg) as i32) as f32
        };
        let mut movement = camera.forward() * axis(KeyCode::KeyW, KeyCode::KeyS)
            + camera.right() * axis(KeyCode::KeyD, KeyCode::KeyA)
            + Vector3::unit_y() * axis(KeyCode::Space, KeyCode::ShiftLeft);
        if movement != Vector3::zero() {
            movement = movement.normalize();
        }
        camera.position += movement * self.speed * dt;

        if input.is_captured() {
            let (dx, dy) = input.mouse_delta();
            // The delta already covers one frame; radians per pixel.
            camera.yaw += Rad(dx * self.sensitivity);
            camera.pitch += Rad(dy * self.sensitivity);
            camera.pitch = Rad(camera.pitch.0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2));
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Transform, Vector4};

    use super::*;

    #[test]
    fn starts_behind_the_origin_looking_down_z() {
        let camera = Camera::new((0.0, 0.0, -5.0), 1280.0 / 720.0);
        assert!((camera.aspect_ratio() - 1.777_777_8).abs() < 1e-5);

        let origin = camera.view().transform_point(Point3::new(0.0, 0.0, 0.0));
        assert!((origin.z - 5.0).abs() < 1e-5);
        assert!(origin.x.abs() < 1e-5 && origin.y.abs() < 1e-5);
    }

    #[test]
    fn projection_maps_near_and_far_to_unit_depth() {
        let p = perspective_lh(FOV_Y, 1.0, Z_NEAR, Z_FAR);
        let near = p * Vector4::new(0.0, 0.0, Z_NEAR, 1.0);
        let far = p * Vector4::new(0.0, 0.0, Z_FAR, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn resizing_only_touches_the_projection() {
        let mut camera = Camera::new((0.0, 0.0, -5.0), 1280.0 / 720.0);
        let view = camera.view();
        let projection = camera.projection();

        camera.update_projection(800.0 / 600.0);
        assert_eq!(camera.view(), view);
        assert_ne!(camera.projection(), projection);
        assert!((camera.aspect_ratio() - 800.0 / 600.0).abs() < 1e-6);
        assert_eq!(camera.position, Point3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn moves_forward_and_turns_while_captured() {
        let mut camera = Camera::new((0.0, 0.0, -5.0), 1.0);
        let mut controller = CameraController::new(2.0, 0.5);
        let mut input = InputState::new();

        input.key_down(KeyCode::KeyW);
        controller.update(&mut camera, &input, Duration::from_secs(1));
        assert!((camera.position.z + 3.0).abs() < 1e-5);
        assert_eq!(camera.yaw, Rad(0.0));

        input.key_up(KeyCode::KeyW);
        input.mouse_pressed(winit::event::MouseButton::Left);
        input.cursor_moved(0.0, 0.0);
        input.end_frame();
        input.cursor_moved(2.0, 0.0);
        controller.update(&mut camera, &input, Duration::from_secs(1));
        assert!((camera.yaw.0 - 1.0).abs() < 1e-5);
        assert!((camera.position.z + 3.0).abs() < 1e-5);
    }

    #[test]
    fn drag_turn_does_not_depend_on_frame_time() {
        let turn = |dt: Duration| {
            let mut camera = Camera::new((0.0, 0.0, -5.0), 1.0);
            let mut controller = CameraController::new(1.0, 0.01);
            let mut input = InputState::new();
            input.mouse_pressed(winit::event::MouseButton::Left);
            input.cursor_moved(0.0, 0.0);
            input.end_frame();
            input.cursor_moved(30.0, 10.0);
            controller.update(&mut camera, &input, dt);
            (camera.yaw.0, camera.pitch.0)
        };
        let fast = turn(Duration::from_millis(4));
        let slow = turn(Duration::from_millis(50));
        assert!((fast.0 - 0.3).abs() < 1e-5 && (fast.1 - 0.1).abs() < 1e-5);
        assert_eq!(fast, slow);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new((0.0, 0.0, 0.0), 1.0);
        let mut controller = CameraController::new(1.0, 1.0);
        let mut input = InputState::new();
        input.mouse_pressed(winit::event::MouseButton::Left);
        input.cursor_moved(0.0, 0.0);
        input.end_frame();
        input.cursor_moved(0.0, 1000.0);
        controller.update(&mut camera, &input, Duration::from_secs(1));
        assert!(camera.pitch.0 < std::f32::consts::FRAC_PI_2);
        camera.update(Duration::ZERO);
        assert!(camera.forward().y < -0.99);
    }
}
