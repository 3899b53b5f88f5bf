pub mod depth;
pub mod model;
pub mod pipeline;
pub mod render;

pub use depth::{DEPTH_FORMAT, create_depth};
pub use model::{Bounds, Material, Mesh, Model, Vertex};
pub use pipeline::{
    FrameUniform, InstanceRaw, Layouts, create_bind_group_layouts, create_pipeline,
};
pub use render::{DrawItem, GpuMesh, ModelCache, Renderer3D};
