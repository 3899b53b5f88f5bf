//! Simulated physical room for the desktop session.
//!
//! Stands in for the platform's plane/mesh detection: the room is a set of
//! infinite planes (the floor) and axis-aligned boxes (tables, shelves), and a
//! hit-test is a ray cast against all of them.

use furnish_3d::Model;
use furnish_scene::Ray;
use furnish_xr::{HitResult, HitTestProvider, HitTestSpace, XrFrame};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

const EPSILON: f32 = 1e-6;
const FLOOR_HALF_EXTENT: f32 = 10.0;
const FLOOR_COLOR: [f32; 4] = [0.28, 0.26, 0.24, 1.0];
const BOX_COLOR: [f32; 4] = [0.45, 0.36, 0.28, 1.0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Surface {
    /// Only hit from the side `normal` points to.
    Plane { point: Vec3, normal: Vec3 },
    Box { min: Vec3, max: Vec3 },
}

impl Surface {
    /// Distance along the ray and the normal of the surface that was hit.
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, Vec3)> {
        match *self {
            Surface::Plane { point, normal } => ray_plane(ray, point, normal),
            Surface::Box { min, max } => ray_box(ray, min, max),
        }
    }
}

pub fn ray_plane(ray: &Ray, point: Vec3, normal: Vec3) -> Option<(f32, Vec3)> {
    let normal = normal.try_normalize()?;
    let denom = normal.dot(ray.direction);
    if denom > -EPSILON {
        return None;
    }
    let t = normal.dot(point - ray.origin) / denom;
    (t >= 0.0).then_some((t, normal))
}

/// Slab test. A ray starting inside the box does not hit it.
pub fn ray_box(ray: &Ray, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let origin = ray.origin[axis];
        let dir = ray.direction[axis];

        if dir.abs() < EPSILON {
            if origin < min[axis] || origin > max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir;
        let (t0, t1) = {
            let a = (min[axis] - origin) * inv;
            let b = (max[axis] - origin) * inv;
            if a <= b { (a, b) } else { (b, a) }
        };

        if t0 > t_near {
            t_near = t0;
            normal = Vec3::ZERO;
            normal[axis] = if dir > 0.0 { -1.0 } else { 1.0 };
        }
        t_far = t_far.min(t1);
        if t_near > t_far {
            return None;
        }
    }

    (t_near >= 0.0 && t_far >= 0.0).then_some((t_near, normal))
}

/// Pose at `point` whose +Y axis is the surface normal.
pub fn surface_pose(point: Vec3, normal: Vec3) -> Mat4 {
    Mat4::from_rotation_translation(Quat::from_rotation_arc(Vec3::Y, normal), point)
}

pub struct RoomHitTest {
    surfaces: Vec<Surface>,
}

impl RoomHitTest {
    pub fn new(surfaces: Vec<Surface>) -> Self {
        Self { surfaces }
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// All hits along `ray`, nearest first.
    pub fn cast(&self, ray: &Ray) -> Vec<HitResult> {
        let mut hits: Vec<(f32, Vec3)> = self
            .surfaces
            .iter()
            .filter_map(|surface| surface.intersect(ray))
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter()
            .map(|(t, normal)| HitResult {
                transform: surface_pose(ray.at(t), normal),
            })
            .collect()
    }

    /// Geometry drawn in place of the camera passthrough.
    pub fn backdrop(&self) -> Vec<(Arc<Model>, Mat4)> {
        self.surfaces
            .iter()
            .map(|surface| match *surface {
                Surface::Plane { point, normal } => (
                    Arc::new(Model::quad("floor", FLOOR_HALF_EXTENT, FLOOR_COLOR)),
                    surface_pose(point, normal.try_normalize().unwrap_or(Vec3::Y)),
                ),
                Surface::Box { min, max } => (
                    Arc::new(Model::cuboid("room_box", min, max, BOX_COLOR)),
                    Mat4::IDENTITY,
                ),
            })
            .collect()
    }
}

impl HitTestProvider for RoomHitTest {
    fn hit_test(&mut self, frame: &XrFrame, space: HitTestSpace) -> Vec<HitResult> {
        match frame.ray(space) {
            Some(ray) => self.cast(&ray),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomHitTest {
        RoomHitTest::new(vec![
            Surface::Plane {
                point: Vec3::ZERO,
                normal: Vec3::Y,
            },
            Surface::Box {
                min: Vec3::new(-0.5, 0.0, -2.0),
                max: Vec3::new(0.5, 0.75, -1.0),
            },
        ])
    }

    fn ray(origin: Vec3, direction: Vec3) -> Ray {
        Ray::new(origin, direction).unwrap()
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn straight_down_hits_floor_with_upright_pose() {
        let hits = room().cast(&ray(Vec3::new(2.0, 1.6, 0.0), Vec3::NEG_Y));
        assert_eq!(hits.len(), 1);
        let pose = hits[0].transform;
        assert!(close(pose.w_axis.truncate(), Vec3::new(2.0, 0.0, 0.0)));
        assert!(close(pose.y_axis.truncate(), Vec3::Y));
    }

    #[test]
    fn table_top_comes_before_floor() {
        let hits = room().cast(&ray(Vec3::new(0.0, 1.6, -1.5), Vec3::NEG_Y));
        assert_eq!(hits.len(), 2);
        assert!(close(hits[0].transform.w_axis.truncate(), Vec3::new(0.0, 0.75, -1.5)));
        assert!(close(hits[1].transform.w_axis.truncate(), Vec3::new(0.0, 0.0, -1.5)));
    }

    #[test]
    fn looking_up_hits_nothing() {
        assert!(room().cast(&ray(Vec3::new(0.0, 1.6, 0.0), Vec3::Y)).is_empty());
        // floor seen from below is not a surface
        assert!(room().cast(&ray(Vec3::new(3.0, -1.0, 0.0), Vec3::Y)).is_empty());
    }

    #[test]
    fn box_side_pose_points_out_of_the_face() {
        let hits = room().cast(&ray(Vec3::new(0.0, 0.4, 0.0), Vec3::NEG_Z));
        assert_eq!(hits.len(), 1);
        let pose = hits[0].transform;
        assert!(close(pose.w_axis.truncate(), Vec3::new(0.0, 0.4, -1.0)));
        assert!(close(pose.y_axis.truncate(), Vec3::Z));
    }

    #[test]
    fn ray_from_inside_box_ignores_it() {
        let inside = ray(Vec3::new(0.0, 0.5, -1.5), Vec3::NEG_Y);
        assert!(
            ray_box(&inside, Vec3::new(-0.5, 0.0, -2.0), Vec3::new(0.5, 0.75, -1.0)).is_none()
        );
    }

    #[test]
    fn hit_test_uses_requested_space() {
        let mut room = room();
        let frame = XrFrame {
            index: 3,
            viewer: Mat4::look_at_rh(Vec3::new(2.0, 1.6, 0.0), Vec3::new(2.0, 0.0, -1.6), Vec3::Y)
                .inverse(),
            controllers: vec![Some(ray(Vec3::new(5.0, 1.0, 5.0), Vec3::NEG_Y))],
        };

        let viewer = room.hit_test(&frame, HitTestSpace::Viewer);
        assert!(close(viewer[0].transform.w_axis.truncate(), Vec3::new(2.0, 0.0, -1.6)));

        let controller = room.hit_test(&frame, HitTestSpace::Controller(0));
        assert!(close(controller[0].transform.w_axis.truncate(), Vec3::new(5.0, 0.0, 5.0)));

        assert!(room.hit_test(&frame, HitTestSpace::Controller(1)).is_empty());
    }

    #[test]
    fn backdrop_has_one_model_per_surface() {
        assert_eq!(room().backdrop().len(), 2);
    }
}
