use furnish_3d::Model;
use furnish_gltf::load_gltf_model;
use furnish_xr::AssetLoader;
use std::path::Path;

/// Loads furniture assets from glTF/GLB files on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct GltfLoader;

impl AssetLoader for GltfLoader {
    async fn load(&self, path: &Path) -> anyhow::Result<Model> {
        load_gltf_model(path).await
    }
}
