use crate::room::{RoomHitTest, Surface};
use anyhow::Context;
use furnish_camera::{OrbitCamera, Projection};
use furnish_scene::Lighting;
use furnish_xr::{HitTestSpace, ModelName, ModelScale, ModelSpec};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "furnish.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaySource {
    #[default]
    Viewer,
    Controller,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub hit_test_space: RaySource,
    pub controller: usize,
}

impl SessionSection {
    pub fn space(&self) -> HitTestSpace {
        match self.hit_test_space {
            RaySource::Viewer => HitTestSpace::Viewer,
            RaySource::Controller => HitTestSpace::Controller(self.controller),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    pub eye: [f32; 3],
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
}

impl Default for CameraSection {
    fn default() -> Self {
        let projection = Projection::default();
        Self {
            eye: [0.0, 1.6, 1.5],
            yaw_deg: 90.0,
            pitch_deg: -30.0,
            fov_deg: projection.fov_y_deg,
            near: projection.near,
            far: projection.far,
            speed: 1.5,
        }
    }
}

impl CameraSection {
    pub fn camera(&self) -> OrbitCamera {
        OrbitCamera::new(
            Vec3::from_array(self.eye),
            self.yaw_deg.to_radians(),
            self.pitch_deg.to_radians(),
        )
    }

    pub fn projection(&self) -> Projection {
        Projection {
            fov_y_deg: self.fov_deg,
            near: self.near,
            far: self.far,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingSection {
    pub ambient: f32,
    pub directional: f32,
    pub direction: [f32; 3],
}

impl Default for LightingSection {
    fn default() -> Self {
        let lighting = Lighting::default();
        Self {
            ambient: lighting.ambient,
            directional: lighting.directional,
            direction: lighting.direction.to_array(),
        }
    }
}

impl LightingSection {
    pub fn lighting(&self) -> Lighting {
        Lighting {
            ambient: self.ambient,
            directional: self.directional,
            direction: Vec3::from_array(self.direction),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxEntry {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// The simulated environment the desktop session hit-tests against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSection {
    /// `false` removes the floor plane.
    pub floor: bool,
    pub floor_height: f32,
    pub boxes: Vec<BoxEntry>,
}

impl Default for RoomSection {
    fn default() -> Self {
        Self {
            floor: true,
            floor_height: 0.0,
            boxes: vec![BoxEntry {
                min: [-0.6, 0.0, -2.4],
                max: [0.6, 0.75, -1.6],
            }],
        }
    }
}

impl RoomSection {
    pub fn hit_test(&self) -> RoomHitTest {
        let floor = self.floor.then(|| Surface::Plane {
            point: Vec3::new(0.0, self.floor_height, 0.0),
            normal: Vec3::Y,
        });
        let boxes = self.boxes.iter().map(|b| Surface::Box {
            min: Vec3::from_array(b.min).min(Vec3::from_array(b.max)),
            max: Vec3::from_array(b.min).max(Vec3::from_array(b.max)),
        });
        RoomHitTest::new(floor.into_iter().chain(boxes).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: ModelName,
    pub path: PathBuf,
    /// Fixed display scale. Defaults to the catalogue value for `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    /// Fit the largest extent to this many metres; wins over `scale`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<f32>,
}

impl ModelEntry {
    pub fn spec(&self, asset_root: &Path) -> ModelSpec {
        let scale = match (self.fit, self.scale) {
            (Some(size), _) => ModelScale::FitLargest(size),
            (None, Some(scale)) => ModelScale::Fixed(scale),
            (None, None) => ModelScale::Fixed(self.name.default_scale()),
        };
        ModelSpec {
            name: self.name,
            path: asset_root.join(&self.path),
            scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub asset_root: PathBuf,
    pub logging: LoggingSection,
    pub session: SessionSection,
    pub camera: CameraSection,
    pub lighting: LightingSection,
    pub room: RoomSection,
    pub models: Vec<ModelEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            logging: LoggingSection::default(),
            session: SessionSection::default(),
            camera: CameraSection::default(),
            lighting: LightingSection::default(),
            room: RoomSection::default(),
            models: ModelSpec::defaults()
                .into_iter()
                .map(|spec| ModelEntry {
                    name: spec.name,
                    path: spec.path,
                    scale: None,
                    fit: None,
                })
                .collect(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("parsing config")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults when `path` does not exist; a present but broken file is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }

    pub fn model_specs(&self) -> Vec<ModelSpec> {
        self.models
            .iter()
            .map(|entry| entry.spec(&self.asset_root))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DesktopSessionProvider;
    use furnish_xr::{SessionError, SessionProvider};

    #[test]
    fn empty_file_means_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.models.len(), 4);
        assert_eq!(config.session.space(), HitTestSpace::Viewer);
        assert_eq!(config.camera.projection(), Projection::default());
    }

    #[test]
    fn parses_full_file() {
        let config = AppConfig::from_toml_str(
            r#"
            asset_root = "public"

            [logging]
            filter = "furnish=debug"

            [session]
            hit_test_space = "controller"
            controller = 1

            [camera]
            eye = [0.0, 1.7, 0.0]
            fov_deg = 60.0

            [room]
            boxes = []

            [[models]]
            name = "chair"
            path = "models/chair.glb"

            [[models]]
            name = "table"
            path = "models/table.glb"
            fit = 1.2

            [[models]]
            name = "bed"
            path = "models/bed.glb"
            scale = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.filter, "furnish=debug");
        assert_eq!(config.session.space(), HitTestSpace::Controller(1));
        assert_eq!(config.camera.fov_deg, 60.0);
        assert_eq!(config.camera.near, 0.02);
        assert!(config.room.floor);
        assert_eq!(config.room.floor_height, 0.0);
        assert!(config.room.boxes.is_empty());

        let specs = config.model_specs();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].path, PathBuf::from("public/models/chair.glb"));
        assert_eq!(specs[0].scale, ModelScale::Fixed(0.5));
        assert_eq!(specs[1].scale, ModelScale::FitLargest(1.2));
        assert_eq!(specs[2].scale, ModelScale::Fixed(0.25));
    }

    #[test]
    fn unknown_model_name_is_rejected() {
        let err = AppConfig::from_toml_str(
            r#"
            [[models]]
            name = "sofa"
            path = "sofa.glb"
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("sofa"));
    }

    #[test]
    fn serialized_defaults_parse_back() {
        let text = AppConfig::default().to_toml_string().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), AppConfig::default());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_or_default("definitely/not/here/furnish.toml").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(AppConfig::load("definitely/not/here/furnish.toml").is_err());
    }

    #[test]
    fn room_without_floor_or_boxes_has_no_surfaces() {
        let config = AppConfig::from_toml_str(
            r#"
            [room]
            floor = false
            boxes = []
            "#,
        )
        .unwrap();
        let room = config.room.hit_test();
        assert!(room.is_empty());
        assert_eq!(RoomSection::default().hit_test().surfaces().len(), 2);

        let mut sessions = DesktopSessionProvider::new(&room);
        let err = pollster::block_on(sessions.request_immersive_session()).unwrap_err();
        assert!(matches!(err, SessionError::NotSupported(_)));
    }

    #[test]
    fn floorless_room_survives_a_round_trip() {
        let config = AppConfig {
            room: RoomSection {
                floor: false,
                floor_height: 0.3,
                boxes: Vec::new(),
            },
            ..AppConfig::default()
        };
        let back = AppConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(back.room, config.room);
        assert!(back.room.hit_test().is_empty());
    }

    #[test]
    fn raised_floor_is_hit_at_its_height() {
        let config =
            AppConfig::from_toml_str("[room]\nfloor_height = 0.4\nboxes = []").unwrap();
        let room = config.room.hit_test();
        assert_eq!(
            room.surfaces(),
            &[Surface::Plane {
                point: Vec3::new(0.0, 0.4, 0.0),
                normal: Vec3::Y,
            }]
        );
    }
}
