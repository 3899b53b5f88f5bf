pub mod assets;
pub mod config;
pub mod room;
pub mod session;

pub use assets::GltfLoader;
pub use config::{AppConfig, DEFAULT_CONFIG_PATH};
pub use room::RoomHitTest;
pub use session::DesktopSessionProvider;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use winit::{
    dpi::PhysicalSize,
    event::{DeviceEvent, WindowEvent},
    event_loop::EventLoopProxy,
    window::Window,
};

use wgpu::{
    Color, CommandEncoderDescriptor, Device, ExperimentalFeatures, Features, Instance, Limits,
    MemoryHints, PowerPreference, Queue, RequestAdapterOptions, Surface, SurfaceConfiguration,
    SurfaceError, Texture, TextureFormat, TextureView, TextureViewDescriptor,
};

use furnish_3d::{DrawItem, FrameUniform, Model, Renderer3D, create_bind_group_layouts};
use furnish_camera::{CameraController, OrbitCamera, Projection};
use furnish_scene::{Ray, Scene};
use furnish_xr::{ModelStore, RenderBackend, XrFrame};

use glam::{Mat4, Vec2, Vec3};

pub type RcWindow = Arc<Window>;

/// Backdrop colour while presenting, the "sky" behind the room.
const PRESENTING_CLEAR: Color = Color {
    r: 0.55,
    g: 0.62,
    b: 0.70,
    a: 1.0,
};
/// Viewport colour outside a session.
const INACTIVE_CLEAR: Color = Color {
    r: 0.06,
    g: 0.06,
    b: 0.07,
    a: 1.0,
};
const MAX_FRAME_DT: f32 = 0.1;

/// Offscreen colour target the scene is rendered into and egui displays.
pub struct Viewport {
    pub color: Texture,
    pub color_view: TextureView,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl Viewport {
    pub fn new(device: &Device, format: TextureFormat, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&TextureViewDescriptor::default());

        Self {
            color,
            color_view,
            width,
            height,
            format,
        }
    }

    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        *self = Viewport::new(device, self.format, width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Everything the application needs once the GPU is up and the furniture is
/// loaded.
pub struct Startup {
    pub graphics: Graphics,
    pub store: ModelStore,
    pub config: AppConfig,
}

/// Initialises wgpu for `window`, loads the configured furniture models and
/// hands the result to the event loop.
pub async fn create_graphics(
    window: RcWindow,
    proxy: EventLoopProxy<Startup>,
    config: AppConfig,
) -> anyhow::Result<()> {
    let instance = Instance::default();
    let surface = instance
        .create_surface(Arc::clone(&window))
        .context("creating window surface")?;

    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        })
        .await
        .context("no suitable GPU adapter")?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: Features::empty(),
            required_limits: Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
            memory_hints: MemoryHints::Performance,
            trace: Default::default(),
            experimental_features: ExperimentalFeatures::disabled(),
        })
        .await
        .context("requesting GPU device")?;

    let size = window.inner_size();
    let surface_config = surface
        .get_default_config(&adapter, size.width.max(1), size.height.max(1))
        .context("surface is not supported by the adapter")?;
    surface.configure(&device, &surface_config);
    log::info!(
        "surface {}x{} {:?} on {}",
        surface_config.width,
        surface_config.height,
        surface_config.format,
        adapter.get_info().name
    );

    let layouts = create_bind_group_layouts(&device);
    let viewport = Viewport::new(
        &device,
        surface_config.format,
        surface_config.width,
        surface_config.height,
    );
    let renderer = Renderer3D::new(
        &device,
        surface_config.format,
        viewport.width,
        viewport.height,
        &layouts,
    );

    let store = ModelStore::load(&GltfLoader, &config.model_specs()).await;
    let loaded: Vec<String> = store.loaded_names().map(|n| n.to_string()).collect();
    log::info!("furniture available: [{}]", loaded.join(", "));

    let graphics = Graphics {
        window,
        surface,
        surface_config,
        device,
        queue,
        renderer,
        viewport,
        camera: config.camera.camera(),
        controller: CameraController::new(config.camera.speed),
        projection: config.camera.projection(),
        backdrop: config.room.hit_test().backdrop(),
        last_frame_time: Instant::now(),
        frame_index: 0,
    };

    if proxy
        .send_event(Startup {
            graphics,
            store,
            config,
        })
        .is_err()
    {
        anyhow::bail!("event loop closed before startup finished");
    }
    Ok(())
}

pub struct Graphics {
    pub viewport: Viewport,
    window: RcWindow,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    device: Device,
    queue: Queue,
    renderer: Renderer3D,
    camera: OrbitCamera,
    controller: CameraController,
    projection: Projection,
    backdrop: Vec<(Arc<Model>, Mat4)>,
    last_frame_time: Instant,
    frame_index: u64,
}

impl Graphics {
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn viewport_view(&self) -> &TextureView {
        &self.viewport.color_view
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.surface_config.width = new_size.width.max(1);
        self.surface_config.height = new_size.height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
        self.viewport.resize(
            &self.device,
            self.surface_config.width,
            self.surface_config.height,
        );
        self.renderer
            .resize(&self.device, self.viewport.width, self.viewport.height);
    }

    /// Advances the fly camera by the time since the previous call.
    pub fn update_camera(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame_time).as_secs_f32().min(MAX_FRAME_DT);
        self.last_frame_time = now;
        self.controller.update(&mut self.camera, dt);
    }

    /// Ray from the eye through a viewport point in normalized device
    /// coordinates.
    pub fn pointer_ray(&self, ndc: Vec2) -> Option<Ray> {
        self.camera
            .ray_through(ndc, &self.projection, self.viewport.aspect())
    }

    /// Snapshot of the desktop "device" for this frame. The viewer is the fly
    /// camera; controller 0 is the ray under the mouse pointer, when the
    /// pointer is over the viewport.
    pub fn xr_frame(&mut self, pointer_ndc: Option<Vec2>) -> XrFrame {
        let index = self.frame_index;
        self.frame_index += 1;
        XrFrame {
            index,
            viewer: self.camera.viewer_transform(),
            controllers: vec![pointer_ndc.and_then(|ndc| self.pointer_ray(ndc))],
        }
    }

    /// Fills the viewport with the inactive colour.
    pub fn clear_viewport(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("viewport_clear"),
            });
        self.renderer.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.viewport.color_view,
            INACTIVE_CLEAR,
            &FrameUniform::default(),
            &[],
        );
        self.queue.submit(Some(encoder.finish()));
    }

    /// Draws `overlay` onto the swapchain image and presents it.
    pub fn present<F>(&mut self, overlay: F)
    where
        F: FnOnce(&mut Self, &TextureView, &mut wgpu::CommandEncoder),
    {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                log::debug!("surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.surface_config);
                return;
            }
            Err(err) => {
                log::warn!("skipping frame: {err}");
                return;
            }
        };
        let swap_view = frame.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        overlay(self, &swap_view, &mut encoder);
        self.queue.submit(Some(encoder.finish()));
        frame.present();
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        self.controller.handle_window_event(event);
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        self.controller.handle_device_event(event, &mut self.camera);
    }

    /// Stops any movement still held when the camera is released.
    pub fn release_camera(&mut self) {
        self.controller.release_all();
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn surface_config(&self) -> &SurfaceConfiguration {
        &self.surface_config
    }

    pub fn uploaded_models(&self) -> usize {
        self.renderer.uploaded_models()
    }

    pub fn eye(&self) -> Vec3 {
        self.camera.eye
    }

    pub fn yaw(&self) -> f32 {
        self.camera.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.camera.pitch
    }
}

impl RenderBackend for Graphics {
    fn render(&mut self, scene: &Scene) {
        let lighting = &scene.lighting;
        let frame = FrameUniform::new(
            self.camera
                .view_proj(&self.projection, self.viewport.aspect()),
            lighting.direction,
            lighting.ambient,
            lighting.directional,
        );

        let items: Vec<DrawItem<'_>> = self
            .backdrop
            .iter()
            .map(|(model, transform)| DrawItem {
                model,
                transform: *transform,
            })
            .chain(scene.draw_items())
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("scene"),
            });
        self.renderer.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.viewport.color_view,
            PRESENTING_CLEAR,
            &frame,
            &items,
        );
        self.queue.submit(Some(encoder.finish()));
    }
}
