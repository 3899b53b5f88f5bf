use furnish_3d::{DrawItem, Model};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    /// Returns `None` for a zero-length direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Where the placement ray meets a real-world surface. Overwritten every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfacePose {
    pub transform: Mat4,
    pub valid: bool,
}

impl SurfacePose {
    pub const NONE: SurfacePose = SurfacePose {
        transform: Mat4::IDENTITY,
        valid: false,
    };

    pub fn hit(transform: Mat4) -> Self {
        Self {
            transform,
            valid: true,
        }
    }

    pub fn translation(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

impl Default for SurfacePose {
    fn default() -> Self {
        Self::NONE
    }
}

pub struct Reticle {
    pub model: Arc<Model>,
    pub visible: bool,
    pub transform: Mat4,
}

impl Reticle {
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            visible: false,
            transform: Mat4::IDENTITY,
        }
    }

    pub fn update(&mut self, pose: &SurfacePose) {
        self.visible = pose.valid;
        if pose.valid {
            self.transform = pose.transform;
        }
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

/// A furniture copy committed to the scene. Never moved once placed.
#[derive(Clone, Debug)]
pub struct PlacedInstance {
    pub id: InstanceId,
    pub label: String,
    pub model: Arc<Model>,
    pub position: Vec3,
    pub yaw: f32,
    pub scale: f32,
    pub visible: bool,
}

impl PlacedInstance {
    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            Quat::from_rotation_y(self.yaw),
            self.position,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub ambient: f32,
    pub directional: f32,
    /// Position the directional light shines from, toward the origin.
    pub direction: Vec3,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: 0.5,
            directional: 0.8,
            direction: Vec3::new(0.0, 5.0, 5.0),
        }
    }
}

pub struct Scene {
    pub reticle: Reticle,
    pub lighting: Lighting,
    instances: Vec<PlacedInstance>,
    next_id: u64,
}

impl Scene {
    pub fn new(reticle_model: Arc<Model>, lighting: Lighting) -> Self {
        Self {
            reticle: Reticle::new(reticle_model),
            lighting,
            instances: Vec::new(),
            next_id: 0,
        }
    }

    pub fn instances(&self) -> &[PlacedInstance] {
        &self.instances
    }

    pub fn instance(&self, id: InstanceId) -> Option<&PlacedInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn place(
        &mut self,
        label: impl Into<String>,
        model: Arc<Model>,
        position: Vec3,
        yaw: f32,
        scale: f32,
    ) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        self.instances.push(PlacedInstance {
            id,
            label: label.into(),
            model,
            position,
            yaw,
            scale,
            visible: true,
        });
        id
    }

    /// Placed instances first, then the reticle when it is visible.
    pub fn draw_items(&self) -> impl Iterator<Item = DrawItem<'_>> {
        let placed = self
            .instances
            .iter()
            .filter(|i| i.visible)
            .map(|i| DrawItem {
                model: &i.model,
                transform: i.transform(),
            });
        let reticle = self.reticle.visible.then(|| DrawItem {
            model: &self.reticle.model,
            transform: self.reticle.transform,
        });
        placed.chain(reticle)
    }
}
