use crate::model_store::{ModelName, ModelStore};
use crate::selection::Selection;
use crate::session::{ImmersiveSession, SessionError, SessionProvider, SessionState};
use crate::surface::{HitTestProvider, SurfaceTracker, XrFrame};
use furnish_scene::{InstanceId, Scene, SurfacePose};
use rand::Rng;
use std::f32::consts::TAU;

pub trait RenderBackend {
    fn render(&mut self, scene: &Scene);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not presenting: no hit-test, no render.
    Skipped,
    Rendered { hit_tested: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotPresenting,
    NoSelection,
    ModelUnavailable(ModelName),
    NoSurface,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    Placed(InstanceId),
    Skipped(SkipReason),
}

/// Drives the session: per-frame hit-testing and rendering, and placement on
/// select events.
///
/// Select events only ever see the pose stored by the last processed frame.
/// Hosts that receive input and frames together should dispatch the input
/// first.
pub struct PlacementLoop<H, R> {
    store: ModelStore,
    selection: Selection,
    tracker: SurfaceTracker<H>,
    scene: Scene,
    session: SessionState,
    latest_pose: SurfacePose,
    rng: R,
    frames_rendered: u64,
    /// `frames_rendered` when the current session started.
    session_start_frame: u64,
}

impl<H: HitTestProvider, R: Rng> PlacementLoop<H, R> {
    pub fn new(store: ModelStore, tracker: SurfaceTracker<H>, scene: Scene, rng: R) -> Self {
        Self {
            store,
            selection: Selection::default(),
            tracker,
            scene,
            session: SessionState::Inactive,
            latest_pose: SurfacePose::NONE,
            rng,
            frames_rendered: 0,
            session_start_frame: 0,
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn tracker(&self) -> &SurfaceTracker<H> {
        &self.tracker
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn is_presenting(&self) -> bool {
        self.session.is_presenting()
    }

    pub fn latest_pose(&self) -> &SurfacePose {
        &self.latest_pose
    }

    /// Frames rendered over the lifetime of the loop.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Frames rendered in the current session, or zero when inactive.
    pub fn session_frames(&self) -> u64 {
        if self.is_presenting() {
            self.frames_rendered - self.session_start_frame
        } else {
            0
        }
    }

    /// Asks the host for an immersive session and applies the result.
    pub async fn request_session<P: SessionProvider>(
        &mut self,
        provider: &mut P,
    ) -> Result<(), SessionError> {
        if self.is_presenting() {
            log::debug!("session already active, ignoring request");
            return Ok(());
        }
        let result = provider.request_immersive_session().await;
        self.complete_session_request(result)
    }

    /// Completion handler of a session request.
    pub fn complete_session_request(
        &mut self,
        result: Result<ImmersiveSession, SessionError>,
    ) -> Result<(), SessionError> {
        match result {
            Ok(session) => {
                if let SessionState::Presenting(current) = &self.session {
                    log::warn!(
                        "session {} granted while {} is active, keeping the active one",
                        session.id,
                        current.id
                    );
                    return Ok(());
                }
                log::info!("immersive session {} started", session.id);
                self.latest_pose = SurfacePose::NONE;
                self.scene.reticle.hide();
                self.session_start_frame = self.frames_rendered;
                self.session = SessionState::Presenting(session);
                Ok(())
            }
            Err(err) => {
                log::warn!("immersive session unavailable: {err}");
                Err(err)
            }
        }
    }

    /// After this returns no further hit-test or render happens until a new
    /// session is granted.
    pub fn end_session(&mut self) {
        if let SessionState::Presenting(session) = &self.session {
            log::info!(
                "immersive session {} ended after {} frames",
                session.id,
                self.session_frames()
            );
        }
        self.session = SessionState::Inactive;
        self.latest_pose = SurfacePose::NONE;
        self.scene.reticle.hide();
    }

    pub fn on_frame<B: RenderBackend + ?Sized>(
        &mut self,
        frame: Option<&XrFrame>,
        backend: &mut B,
    ) -> FrameOutcome {
        if !self.is_presenting() {
            return FrameOutcome::Skipped;
        }

        let hit_tested = match frame {
            Some(frame) => {
                let pose = self.tracker.compute_pose(frame);
                log::trace!("frame {}: surface {:?}", frame.index, pose.valid);
                self.scene.reticle.update(&pose);
                self.latest_pose = pose;
                true
            }
            None => false,
        };

        backend.render(&self.scene);
        self.frames_rendered += 1;
        FrameOutcome::Rendered { hit_tested }
    }

    pub fn select(&mut self) -> SelectOutcome {
        let outcome = self.try_place();
        if let SelectOutcome::Skipped(reason) = outcome {
            log::debug!("select ignored: {reason:?}");
        }
        outcome
    }

    fn try_place(&mut self) -> SelectOutcome {
        if !self.is_presenting() {
            return SelectOutcome::Skipped(SkipReason::NotPresenting);
        }
        let Some(name) = self.selection.get() else {
            return SelectOutcome::Skipped(SkipReason::NoSelection);
        };
        let Some(furniture) = self.store.get(name) else {
            return SelectOutcome::Skipped(SkipReason::ModelUnavailable(name));
        };
        if !self.latest_pose.valid {
            return SelectOutcome::Skipped(SkipReason::NoSurface);
        }

        let position = self.latest_pose.translation();
        let yaw = self.rng.random_range(0.0..TAU);
        let id = self.scene.place(
            name.as_str(),
            furniture.asset.clone(),
            position,
            yaw,
            furniture.scale,
        );
        log::debug!("placed {name} {id:?} at {position} yaw {yaw:.3}");
        SelectOutcome::Placed(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_store::FurnitureModel;
    use crate::surface::{HitResult, HitTestSpace};
    use furnish_3d::Model;
    use furnish_scene::Lighting;
    use glam::{Mat4, Vec3};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::Arc;

    #[derive(Default)]
    struct Scripted {
        next: Option<Mat4>,
    }

    impl HitTestProvider for Scripted {
        fn hit_test(&mut self, _frame: &XrFrame, _space: HitTestSpace) -> Vec<HitResult> {
            self.next
                .map(|transform| HitResult { transform })
                .into_iter()
                .collect()
        }
    }

    #[derive(Default)]
    struct CountingBackend {
        renders: usize,
        last_instances: usize,
    }

    impl RenderBackend for CountingBackend {
        fn render(&mut self, scene: &Scene) {
            self.renders += 1;
            self.last_instances = scene.instances().len();
        }
    }

    fn frame(index: u64) -> XrFrame {
        XrFrame {
            index,
            viewer: Mat4::IDENTITY,
            controllers: Vec::new(),
        }
    }

    fn presenting_loop() -> PlacementLoop<Scripted, StdRng> {
        let chair = FurnitureModel {
            name: ModelName::Chair,
            asset: Arc::new(Model::quad("chair", 0.5, [1.0; 4])),
            scale: 0.5,
        };
        let scene = Scene::new(
            Arc::new(Model::ring("reticle", 0.15, 0.2, 32, [1.0; 4])),
            Lighting::default(),
        );
        let mut placement = PlacementLoop::new(
            ModelStore::with_models([chair]),
            SurfaceTracker::new(Scripted::default(), HitTestSpace::Viewer),
            scene,
            StdRng::seed_from_u64(7),
        );
        placement
            .complete_session_request(Ok(ImmersiveSession {
                id: crate::SessionId(1),
            }))
            .unwrap();
        placement
    }

    #[test]
    fn inactive_loop_neither_hit_tests_nor_renders() {
        let mut placement = presenting_loop();
        placement.end_session();
        let mut backend = CountingBackend::default();

        assert_eq!(placement.on_frame(Some(&frame(0)), &mut backend), FrameOutcome::Skipped);
        assert_eq!(backend.renders, 0);
        assert_eq!(placement.tracker().hit_tests(), 0);
    }

    #[test]
    fn frame_without_handle_renders_but_keeps_pose() {
        let mut placement = presenting_loop();
        let mut backend = CountingBackend::default();
        placement.tracker.provider_mut().next = Some(Mat4::IDENTITY);
        placement.on_frame(Some(&frame(0)), &mut backend);

        let outcome = placement.on_frame(None, &mut backend);
        assert_eq!(outcome, FrameOutcome::Rendered { hit_tested: false });
        assert_eq!(backend.renders, 2);
        assert!(placement.latest_pose().valid);
        assert!(placement.scene().reticle.visible);
    }

    #[test]
    fn select_uses_pose_of_previous_frame() {
        let mut placement = presenting_loop();
        let mut backend = CountingBackend::default();
        placement.selection_mut().set(ModelName::Chair);

        let first = Vec3::new(1.0, 0.0, -2.0);
        placement.tracker.provider_mut().next = Some(Mat4::from_translation(first));
        placement.on_frame(Some(&frame(0)), &mut backend);

        // the environment changes, but no frame has been processed yet
        placement.tracker.provider_mut().next = Some(Mat4::from_translation(Vec3::ZERO));
        let SelectOutcome::Placed(id) = placement.select() else {
            panic!("expected a placement");
        };
        assert_eq!(placement.scene().instance(id).unwrap().position, first);
    }

    #[test]
    fn select_reasons() {
        let mut placement = presenting_loop();
        let mut backend = CountingBackend::default();

        assert_eq!(placement.select(), SelectOutcome::Skipped(SkipReason::NoSelection));

        placement.selection_mut().set(ModelName::Closet);
        assert_eq!(
            placement.select(),
            SelectOutcome::Skipped(SkipReason::ModelUnavailable(ModelName::Closet))
        );

        placement.selection_mut().set(ModelName::Chair);
        placement.on_frame(Some(&frame(0)), &mut backend);
        assert_eq!(placement.select(), SelectOutcome::Skipped(SkipReason::NoSurface));

        placement.end_session();
        assert_eq!(placement.select(), SelectOutcome::Skipped(SkipReason::NotPresenting));
        assert!(placement.scene().instances().is_empty());
    }

    #[test]
    fn placed_instance_is_rendered_next_frame() {
        let mut placement = presenting_loop();
        let mut backend = CountingBackend::default();
        placement.selection_mut().set(ModelName::Chair);
        placement.tracker.provider_mut().next = Some(Mat4::IDENTITY);
        placement.on_frame(Some(&frame(0)), &mut backend);
        assert_eq!(backend.last_instances, 0);

        placement.select();
        placement.on_frame(Some(&frame(1)), &mut backend);
        assert_eq!(backend.last_instances, 1);
        let placed = &placement.scene().instances()[0];
        assert_eq!(placed.scale, 0.5);
        assert_eq!(placed.label, "chair");
        assert!(placed.visible);
    }

    #[test]
    fn ending_session_hides_reticle_and_forgets_pose() {
        let mut placement = presenting_loop();
        let mut backend = CountingBackend::default();
        placement.tracker.provider_mut().next = Some(Mat4::IDENTITY);
        placement.on_frame(Some(&frame(0)), &mut backend);
        assert!(placement.scene().reticle.visible);

        placement.end_session();
        assert!(!placement.scene().reticle.visible);
        assert!(!placement.latest_pose().valid);
        assert_eq!(placement.session(), &SessionState::Inactive);
    }

    #[test]
    fn second_grant_keeps_active_session() {
        let mut placement = presenting_loop();
        placement
            .complete_session_request(Ok(ImmersiveSession {
                id: crate::SessionId(2),
            }))
            .unwrap();
        assert_eq!(
            placement.session().session().map(|s| s.id),
            Some(crate::SessionId(1))
        );
    }

    #[test]
    fn session_frames_restart_with_each_session() {
        let mut placement = presenting_loop();
        let mut backend = CountingBackend::default();
        for i in 0..3 {
            placement.on_frame(Some(&frame(i)), &mut backend);
        }
        assert_eq!(placement.session_frames(), 3);

        placement.end_session();
        assert_eq!(placement.session_frames(), 0);

        placement
            .complete_session_request(Ok(ImmersiveSession {
                id: crate::SessionId(2),
            }))
            .unwrap();
        for i in 3..5 {
            placement.on_frame(Some(&frame(i)), &mut backend);
        }
        assert_eq!(placement.session_frames(), 2);
        assert_eq!(placement.frames_rendered(), 5);
    }
}
