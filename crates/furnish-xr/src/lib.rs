//! Hit-test driven furniture placement.
//!
//! The host owns the session and the frame clock. Each rendered frame it calls
//! [`PlacementLoop::on_frame`], which hit-tests the environment, moves the
//! reticle onto the surface under the placement ray and renders the scene.
//! A discrete "select" input (controller trigger, screen tap) calls
//! [`PlacementLoop::select`], which drops a copy of the selected furniture at
//! the reticle with a random yaw.
//!
//! Everything the loop needs from the outside world goes through four traits:
//! [`SessionProvider`], [`HitTestProvider`], [`RenderBackend`] and
//! [`AssetLoader`].

pub mod model_store;
pub mod placement;
pub mod selection;
pub mod session;
pub mod surface;

pub use model_store::{
    AssetLoader, FurnitureModel, ModelName, ModelScale, ModelSpec, ModelStore,
};
pub use placement::{FrameOutcome, PlacementLoop, RenderBackend, SelectOutcome, SkipReason};
pub use selection::Selection;
pub use session::{ImmersiveSession, SessionError, SessionId, SessionProvider, SessionState};
pub use surface::{HitResult, HitTestProvider, HitTestSpace, SurfaceTracker, XrFrame};
