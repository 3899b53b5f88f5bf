use crate::depth::DEPTH_FORMAT;
use crate::model::Vertex;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;
use wgpu::*;

/// Per-frame uniform shared by every draw: camera and lighting.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub light_dir: [f32; 4],
    pub light: [f32; 4],
}

impl FrameUniform {
    /// `toward_light` points from the surface toward the light.
    pub fn new(view_proj: Mat4, toward_light: Vec3, ambient: f32, directional: f32) -> Self {
        let dir = toward_light.try_normalize().unwrap_or(Vec3::Y);
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            light_dir: dir.extend(0.0).to_array(),
            light: [ambient, directional, 0.0, 0.0],
        }
    }
}

impl Default for FrameUniform {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Vec3::Y, 1.0, 0.0)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceRaw {
    const ATTRIBS: [VertexAttribute; 5] = wgpu::vertex_attr_array![
        2 => Float32x4,
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4
    ];

    pub fn layout() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as BufferAddress,
            step_mode: VertexStepMode::Instance,
            attributes: &Self::ATTRIBS,
        }
    }
}

pub struct Layouts {
    pub frame_bgl: BindGroupLayout,
}

pub fn create_bind_group_layouts(device: &Device) -> Layouts {
    let frame_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("frame_bgl"),
        entries: &[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::VERTEX_FRAGMENT,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    Layouts { frame_bgl }
}

pub fn create_pipeline(
    device: &Device,
    color_format: TextureFormat,
    layouts: &Layouts,
) -> (RenderPipeline, BindGroup, Buffer) {
    let shader = device.create_shader_module(wgpu::include_wgsl!("shader.wgsl"));

    let frame_buf = device.create_buffer_init(&util::BufferInitDescriptor {
        label: Some("frame_ubo"),
        contents: bytemuck::bytes_of(&FrameUniform::default()),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });

    let frame_bg = device.create_bind_group(&BindGroupDescriptor {
        label: Some("frame_bg"),
        layout: &layouts.frame_bgl,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: frame_buf.as_entire_binding(),
        }],
    });

    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("scene_pipeline_layout"),
        bind_group_layouts: &[&layouts.frame_bgl],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("scene_pipeline"),
        layout: Some(&layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: PipelineCompilationOptions::default(),
            buffers: &[Vertex::layout(), InstanceRaw::layout()],
        },
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState::default(),
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: PipelineCompilationOptions::default(),
            targets: &[Some(ColorTargetState {
                format: color_format,
                blend: Some(BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    });

    (pipeline, frame_bg, frame_buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layout_is_std140_friendly() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 96);
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 80);
    }

    #[test]
    fn degenerate_light_direction_falls_back_to_up() {
        let u = FrameUniform::new(Mat4::IDENTITY, Vec3::ZERO, 0.5, 0.8);
        assert_eq!(u.light_dir, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(u.light[..2], [0.5, 0.8]);
    }
}
