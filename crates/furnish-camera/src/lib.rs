use furnish_scene::Ray;
use glam::{Mat4, Vec2, Vec3};
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::keyboard::KeyCode;

pub fn forward_from_yaw_pitch(yaw: f32, pitch: f32) -> Vec3 {
    let cp = pitch.cos();
    let sp = pitch.sin();
    let cy = yaw.cos();
    let sy = yaw.sin();
    Vec3::new(cy * cp, sp, -sy * cp)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_deg.to_radians(), aspect.max(1e-3), self.near, self.far)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y_deg: 70.0,
            near: 0.02,
            far: 20.0,
        }
    }
}

pub struct OrbitCamera {
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl OrbitCamera {
    pub fn new(eye: Vec3, yaw: f32, pitch: f32) -> Self {
        Self { eye, yaw, pitch }
    }

    pub fn forward(&self) -> Vec3 {
        forward_from_yaw_pitch(self.yaw, self.pitch)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.eye + self.forward(), Vec3::Y)
    }

    /// World transform of the viewer: translation at the eye, looking down -Z.
    pub fn viewer_transform(&self) -> Mat4 {
        self.view().inverse()
    }

    pub fn view_proj(&self, projection: &Projection, aspect: f32) -> Mat4 {
        projection.matrix(aspect) * self.view()
    }

    /// World-space ray through a point of the viewport given in normalized
    /// device coordinates (x right, y up, both in -1..1).
    pub fn ray_through(&self, ndc: Vec2, projection: &Projection, aspect: f32) -> Option<Ray> {
        let inv = self.view_proj(projection, aspect).inverse();
        let near = inv.project_point3(ndc.extend(-1.0));
        let far = inv.project_point3(ndc.extend(1.0));
        Ray::new(near, far - near)
    }
}

pub struct CameraController {
    move_forward: bool,
    move_back: bool,
    move_left: bool,
    move_right: bool,
    move_up: bool,
    move_down: bool,
    boost_speed: bool,
    base_speed: f32,
}

impl CameraController {
    pub fn new(base_speed: f32) -> Self {
        Self {
            move_forward: false,
            move_back: false,
            move_left: false,
            move_right: false,
            move_up: false,
            move_down: false,
            boost_speed: false,
            base_speed,
        }
    }

    /// Drops every held key, e.g. when the camera loses focus.
    pub fn release_all(&mut self) {
        *self = Self::new(self.base_speed);
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        if let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: winit::keyboard::PhysicalKey::Code(code),
                    state,
                    repeat,
                    ..
                },
            ..
        } = event
        {
            if *repeat {
                return;
            }
            let pressed = *state == ElementState::Pressed;
            match code {
                KeyCode::KeyW => self.move_forward = pressed,
                KeyCode::KeyS => self.move_back = pressed,
                KeyCode::KeyA => self.move_left = pressed,
                KeyCode::KeyD => self.move_right = pressed,
                KeyCode::KeyJ => self.move_up = pressed,
                KeyCode::KeyK => self.move_down = pressed,
                KeyCode::ShiftLeft => self.boost_speed = pressed,
                _ => {}
            }
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent, cam: &mut OrbitCamera) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            let sensitivity = 0.0025;
            cam.yaw -= (*dx as f32) * sensitivity;
            cam.pitch -= (*dy as f32) * sensitivity;
            let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
            cam.pitch = cam.pitch.clamp(-max_pitch, max_pitch);
        }
    }

    pub fn update(&mut self, cam: &mut OrbitCamera, dt: f32) {
        let mut movement = Vec3::ZERO;

        let forward = cam.forward();
        let mut flat_forward = Vec3::new(forward.x, 0.0, forward.z);
        if flat_forward.length_squared() > 0.0 {
            flat_forward = flat_forward.normalize();
        }

        let mut right = flat_forward.cross(Vec3::Y);
        if right.length_squared() > 0.0 {
            right = right.normalize();
        }

        if self.move_forward {
            movement += flat_forward;
        }
        if self.move_back {
            movement -= flat_forward;
        }
        if self.move_right {
            movement += right;
        }
        if self.move_left {
            movement -= right;
        }
        if self.move_up {
            movement += Vec3::Y;
        }
        if self.move_down {
            movement -= Vec3::Y;
        }

        if movement.length_squared() > 0.0 {
            movement = movement.normalize();
            let mut speed = self.base_speed;
            if self.boost_speed {
                speed *= 5.0;
            }
            cam.eye += movement * speed * dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn yaw_quarter_turn_faces_negative_z() {
        assert!(close(forward_from_yaw_pitch(FRAC_PI_2, 0.0), Vec3::NEG_Z));
        assert!(close(forward_from_yaw_pitch(0.0, 0.0), Vec3::X));
    }

    #[test]
    fn viewer_transform_sits_at_eye_and_looks_forward() {
        let cam = OrbitCamera::new(Vec3::new(0.0, 1.6, 2.0), FRAC_PI_2, -0.3);
        let viewer = cam.viewer_transform();
        assert!(close(viewer.w_axis.truncate(), cam.eye));
        assert!(close(-viewer.z_axis.truncate(), cam.forward()));
    }

    #[test]
    fn center_ray_matches_forward() {
        let cam = OrbitCamera::new(Vec3::new(0.5, 1.2, 3.0), 1.0, -0.4);
        let ray = cam
            .ray_through(Vec2::ZERO, &Projection::default(), 16.0 / 9.0)
            .unwrap();
        assert!(close(ray.direction, cam.forward()));
        // starts on the near plane, just in front of the eye
        assert!((ray.origin - cam.eye).length() < 0.1);
    }

    #[test]
    fn top_edge_ray_tilts_up() {
        let cam = OrbitCamera::new(Vec3::ZERO, FRAC_PI_2, 0.0);
        let ray = cam
            .ray_through(Vec2::new(0.0, 1.0), &Projection::default(), 1.0)
            .unwrap();
        let tilt = ray.direction.y.asin().to_degrees();
        assert!((tilt - 35.0).abs() < 0.1, "{tilt}");
    }

    #[test]
    fn controller_moves_on_ground_plane() {
        let mut cam = OrbitCamera::new(Vec3::ZERO, FRAC_PI_2, -0.8);
        let mut controller = CameraController::new(2.0);
        controller.move_forward = true;
        controller.update(&mut cam, 0.5);
        assert!(close(cam.eye, Vec3::new(0.0, 0.0, -1.0)));

        controller.release_all();
        controller.update(&mut cam, 0.5);
        assert!(close(cam.eye, Vec3::new(0.0, 0.0, -1.0)));
    }
}
