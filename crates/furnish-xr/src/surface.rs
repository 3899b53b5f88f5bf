use furnish_scene::{Ray, SurfacePose};
use glam::Mat4;

/// Per-frame snapshot handed over by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct XrFrame {
    pub index: u64,
    /// World transform of the viewer; it looks down its local -Z.
    pub viewer: Mat4,
    /// Target rays of input sources, by controller index. `None` when the
    /// source is not tracked this frame.
    pub controllers: Vec<Option<Ray>>,
}

impl XrFrame {
    pub fn viewer_ray(&self) -> Option<Ray> {
        Ray::new(
            self.viewer.w_axis.truncate(),
            -self.viewer.z_axis.truncate(),
        )
    }

    pub fn ray(&self, space: HitTestSpace) -> Option<Ray> {
        match space {
            HitTestSpace::Viewer => self.viewer_ray(),
            HitTestSpace::Controller(index) => self.controllers.get(index).copied().flatten(),
        }
    }
}

/// Which ray the hit-test is cast along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HitTestSpace {
    #[default]
    Viewer,
    Controller(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitResult {
    /// Position at the hit point, +Y along the surface normal.
    pub transform: Mat4,
}

pub trait HitTestProvider {
    /// Hits along the ray of `space`, nearest first. Empty when nothing is hit.
    fn hit_test(&mut self, frame: &XrFrame, space: HitTestSpace) -> Vec<HitResult>;
}

pub struct SurfaceTracker<H> {
    provider: H,
    space: HitTestSpace,
    hit_tests: u64,
}

impl<H: HitTestProvider> SurfaceTracker<H> {
    pub fn new(provider: H, space: HitTestSpace) -> Self {
        Self {
            provider,
            space,
            hit_tests: 0,
        }
    }

    pub fn compute_pose(&mut self, frame: &XrFrame) -> SurfacePose {
        self.hit_tests += 1;
        let hits = self.provider.hit_test(frame, self.space);
        match hits.first() {
            Some(hit) => SurfacePose::hit(hit.transform),
            None => SurfacePose::NONE,
        }
    }

    pub fn space(&self) -> HitTestSpace {
        self.space
    }

    pub fn hit_tests(&self) -> u64 {
        self.hit_tests
    }

    pub fn provider_mut(&mut self) -> &mut H {
        &mut self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    struct Fixed(Vec<HitResult>);

    impl HitTestProvider for Fixed {
        fn hit_test(&mut self, _frame: &XrFrame, _space: HitTestSpace) -> Vec<HitResult> {
            self.0.clone()
        }
    }

    fn frame() -> XrFrame {
        XrFrame {
            index: 0,
            viewer: Mat4::from_translation(Vec3::new(0.0, 1.5, 0.0)),
            controllers: vec![None, Ray::new(Vec3::ZERO, Vec3::X)],
        }
    }

    #[test]
    fn first_hit_wins() {
        let near = Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0));
        let far = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        let mut tracker = SurfaceTracker::new(
            Fixed(vec![HitResult { transform: near }, HitResult { transform: far }]),
            HitTestSpace::Viewer,
        );
        let pose = tracker.compute_pose(&frame());
        assert!(pose.valid);
        assert_eq!(pose.transform, near);
        assert_eq!(tracker.hit_tests(), 1);
    }

    #[test]
    fn no_hits_is_an_invalid_pose() {
        let mut tracker = SurfaceTracker::new(Fixed(Vec::new()), HitTestSpace::Viewer);
        assert_eq!(tracker.compute_pose(&frame()), SurfacePose::NONE);
    }

    #[test]
    fn frame_rays_by_space() {
        let frame = frame();
        let viewer = frame.ray(HitTestSpace::Viewer).unwrap();
        assert_eq!(viewer.origin, Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(viewer.direction, Vec3::NEG_Z);

        assert_eq!(frame.ray(HitTestSpace::Controller(0)), None);
        assert_eq!(
            frame.ray(HitTestSpace::Controller(1)).map(|r| r.direction),
            Some(Vec3::X)
        );
        assert_eq!(frame.ray(HitTestSpace::Controller(7)), None);
    }
}
