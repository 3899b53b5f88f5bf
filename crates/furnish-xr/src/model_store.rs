use furnish_3d::{Bounds, Model};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The fixed furniture catalogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelName {
    Chair,
    Table,
    Bed,
    Closet,
}

impl ModelName {
    pub const ALL: [ModelName; 4] = [
        ModelName::Chair,
        ModelName::Table,
        ModelName::Bed,
        ModelName::Closet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelName::Chair => "chair",
            ModelName::Table => "table",
            ModelName::Bed => "bed",
            ModelName::Closet => "closet",
        }
    }

    pub fn default_path(self) -> PathBuf {
        PathBuf::from(format!("assets/models/{}.glb", self.as_str()))
    }

    pub fn default_scale(self) -> f32 {
        match self {
            ModelName::Chair => 0.5,
            ModelName::Table => 0.6,
            ModelName::Bed => 0.5,
            ModelName::Closet => 0.7,
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the display scale of a model is chosen at load time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ModelScale {
    /// Asset-specific constant.
    Fixed(f32),
    /// Scale so the largest bounding-box extent equals this many metres.
    FitLargest(f32),
}

impl ModelScale {
    pub fn resolve(&self, bounds: &Bounds) -> f32 {
        match *self {
            ModelScale::Fixed(scale) => scale,
            ModelScale::FitLargest(target) => {
                let extent = bounds.largest_extent();
                if extent.is_finite() && extent > 0.0 {
                    target / extent
                } else {
                    1.0
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelSpec {
    pub name: ModelName,
    pub path: PathBuf,
    pub scale: ModelScale,
}

impl ModelSpec {
    /// The four catalogue models with their stock asset paths and scales.
    pub fn defaults() -> Vec<ModelSpec> {
        ModelName::ALL
            .into_iter()
            .map(|name| ModelSpec {
                name,
                path: name.default_path(),
                scale: ModelScale::Fixed(name.default_scale()),
            })
            .collect()
    }
}

/// A loaded catalogue entry. Immutable once the store is built.
#[derive(Clone, Debug)]
pub struct FurnitureModel {
    pub name: ModelName,
    pub asset: Arc<Model>,
    pub scale: f32,
}

pub trait AssetLoader {
    fn load(&self, path: &Path) -> impl Future<Output = anyhow::Result<Model>>;
}

#[derive(Default)]
pub struct ModelStore {
    models: BTreeMap<ModelName, FurnitureModel>,
    failures: BTreeMap<ModelName, String>,
}

impl ModelStore {
    /// Loads every distinct name once. A failed load leaves the name absent
    /// for the lifetime of the store and does not stop the remaining loads.
    pub async fn load<L: AssetLoader>(loader: &L, specs: &[ModelSpec]) -> Self {
        let mut store = ModelStore::default();

        for spec in specs {
            if store.models.contains_key(&spec.name) || store.failures.contains_key(&spec.name) {
                log::warn!(
                    "'{}' is listed more than once, ignoring {}",
                    spec.name,
                    spec.path.display()
                );
                continue;
            }

            match loader.load(&spec.path).await {
                Ok(model) => {
                    let scale = spec.scale.resolve(&model.bounds);
                    log::info!("model '{}' ready (scale {scale:.3})", spec.name);
                    store.models.insert(
                        spec.name,
                        FurnitureModel {
                            name: spec.name,
                            asset: Arc::new(model),
                            scale,
                        },
                    );
                }
                Err(err) => {
                    log::warn!(
                        "failed to load '{}' from {}: {err:#}",
                        spec.name,
                        spec.path.display()
                    );
                    store.failures.insert(spec.name, format!("{err:#}"));
                }
            }
        }

        store
    }

    pub fn with_models(models: impl IntoIterator<Item = FurnitureModel>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.name, m)).collect(),
            failures: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: ModelName) -> Option<&FurnitureModel> {
        self.models.get(&name)
    }

    pub fn is_loaded(&self, name: ModelName) -> bool {
        self.models.contains_key(&name)
    }

    pub fn failure(&self, name: ModelName) -> Option<&str> {
        self.failures.get(&name).map(String::as_str)
    }

    pub fn loaded_names(&self) -> impl Iterator<Item = ModelName> + '_ {
        self.models.keys().copied()
    }

    pub fn failures(&self) -> impl Iterator<Item = (ModelName, &str)> + '_ {
        self.failures.iter().map(|(name, err)| (*name, err.as_str()))
    }
}
