use crate::depth::create_depth;
use crate::model::Model;
use crate::pipeline::{FrameUniform, InstanceRaw, Layouts, create_pipeline};
use glam::Mat4;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use wgpu::*;

const INITIAL_INSTANCE_CAPACITY: usize = 64;

pub struct GpuMesh {
    pub vbuf: Buffer,
    pub ibuf: Buffer,
    pub index_count: u32,
    pub color: [f32; 4],
}

/// Per-model data keyed by asset identity. Each entry keeps its `Arc` alive,
/// so a key cannot be reused by a later allocation.
pub struct ModelCache<T> {
    entries: HashMap<usize, (Arc<Model>, T)>,
}

impl<T> ModelCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn key(model: &Arc<Model>) -> usize {
        Arc::as_ptr(model) as usize
    }

    pub fn get(&self, model: &Arc<Model>) -> Option<&T> {
        self.entries.get(&Self::key(model)).map(|(_, value)| value)
    }

    pub fn contains(&self, model: &Arc<Model>) -> bool {
        self.entries.contains_key(&Self::key(model))
    }

    pub fn insert(&mut self, model: &Arc<Model>, value: T) {
        self.entries
            .insert(Self::key(model), (Arc::clone(model), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ModelCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One model drawn with one transform.
#[derive(Clone, Copy)]
pub struct DrawItem<'a> {
    pub model: &'a Arc<Model>,
    pub transform: Mat4,
}

pub struct Renderer3D {
    pub render_pipeline: RenderPipeline,
    pub depth_view: TextureView,
    pub depth_tex: Texture,
    pub frame_bg: BindGroup,
    pub frame_buf: Buffer,
    instance_buf: Buffer,
    instance_capacity: usize,
    uploaded: ModelCache<Vec<GpuMesh>>,
}

impl Renderer3D {
    pub fn new(
        device: &Device,
        color_format: TextureFormat,
        width: u32,
        height: u32,
        layouts: &Layouts,
    ) -> Self {
        let (depth_view, depth_tex) = create_depth(device, width, height);
        let (render_pipeline, frame_bg, frame_buf) = create_pipeline(device, color_format, layouts);
        let instance_buf = create_instance_buffer(device, INITIAL_INSTANCE_CAPACITY);

        Self {
            render_pipeline,
            depth_view,
            depth_tex,
            frame_bg,
            frame_buf,
            instance_buf,
            instance_capacity: INITIAL_INSTANCE_CAPACITY,
            uploaded: ModelCache::new(),
        }
    }

    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        let (dv, dt) = create_depth(device, width, height);
        self.depth_view = dv;
        self.depth_tex = dt;
    }

    pub fn uploaded_models(&self) -> usize {
        self.uploaded.len()
    }

    fn upload(&mut self, device: &Device, model: &Arc<Model>) {
        if self.uploaded.contains(model) {
            return;
        }

        let meshes = model
            .meshes
            .iter()
            .filter(|mesh| !mesh.is_empty())
            .map(|mesh| GpuMesh {
                vbuf: device.create_buffer_init(&util::BufferInitDescriptor {
                    label: Some(&format!("{}_vbuf", model.label)),
                    contents: bytemuck::cast_slice(&mesh.vertices),
                    usage: BufferUsages::VERTEX,
                }),
                ibuf: device.create_buffer_init(&util::BufferInitDescriptor {
                    label: Some(&format!("{}_ibuf", model.label)),
                    contents: bytemuck::cast_slice(&mesh.indices),
                    usage: BufferUsages::INDEX,
                }),
                index_count: mesh.indices.len() as u32,
                color: model.material_for(mesh).base_color,
            })
            .collect::<Vec<_>>();

        log::debug!("uploaded model '{}' ({} meshes)", model.label, meshes.len());
        self.uploaded.insert(model, meshes);
    }

    fn reserve_instances(&mut self, device: &Device, count: usize) {
        if count <= self.instance_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        self.instance_buf = create_instance_buffer(device, capacity);
        self.instance_capacity = capacity;
    }

    pub fn render(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        target_view: &TextureView,
        clear: Color,
        frame: &FrameUniform,
        items: &[DrawItem<'_>],
    ) {
        queue.write_buffer(&self.frame_buf, 0, bytemuck::bytes_of(frame));

        for item in items {
            self.upload(device, item.model);
        }

        let mut instances = Vec::new();
        let mut draws = Vec::new();
        for item in items {
            let Some(meshes) = self.uploaded.get(item.model) else {
                continue;
            };
            for (mesh_idx, mesh) in meshes.iter().enumerate() {
                draws.push((item.model, mesh_idx, instances.len() as u32));
                instances.push(InstanceRaw {
                    model: item.transform.to_cols_array_2d(),
                    color: mesh.color,
                });
            }
        }

        self.reserve_instances(device, instances.len());
        if !instances.is_empty() {
            queue.write_buffer(&self.instance_buf, 0, bytemuck::cast_slice(&instances));
        }

        let mut r_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: target_view,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(clear),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if draws.is_empty() {
            return;
        }

        r_pass.set_pipeline(&self.render_pipeline);
        r_pass.set_bind_group(0, &self.frame_bg, &[]);
        r_pass.set_vertex_buffer(1, self.instance_buf.slice(..));

        for (model, mesh_idx, instance) in draws {
            let Some(mesh) = self.uploaded.get(model).and_then(|m| m.get(mesh_idx)) else {
                continue;
            };
            r_pass.set_vertex_buffer(0, mesh.vbuf.slice(..));
            r_pass.set_index_buffer(mesh.ibuf.slice(..), IndexFormat::Uint32);
            r_pass.draw_indexed(0..mesh.index_count, 0, instance..instance + 1);
        }
    }
}

fn create_instance_buffer(device: &Device, capacity: usize) -> Buffer {
    device.create_buffer(&BufferDescriptor {
        label: Some("instance_buf"),
        size: (capacity * std::mem::size_of::<InstanceRaw>()) as BufferAddress,
        usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(label: &str) -> Arc<Model> {
        Arc::new(Model::quad(label, 0.5, [1.0; 4]))
    }

    #[test]
    fn cache_keys_by_identity_not_content() {
        let a = model("same");
        let b = model("same");
        let mut cache = ModelCache::new();
        cache.insert(&a, 1);

        assert_eq!(cache.get(&a), Some(&1));
        assert_eq!(cache.get(&Arc::clone(&a)), Some(&1));
        assert!(!cache.contains(&b));
    }

    #[test]
    fn cached_model_outlives_its_callers() {
        let mut cache = ModelCache::new();
        let first = model("first");
        let first_ptr = Arc::as_ptr(&first);
        cache.insert(&first, "first meshes");
        drop(first);

        // the cache still owns the allocation, so no new model can take its address
        for i in 0..64 {
            let other = model(&format!("other{i}"));
            assert_ne!(Arc::as_ptr(&other), first_ptr);
            assert!(cache.get(&other).is_none());
        }
        assert_eq!(cache.len(), 1);
    }
}
