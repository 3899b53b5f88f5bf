use egui::Sense;
use egui::load::SizedTexture;
use furnish_3d::Model;
use furnish_runtime::{
    AppConfig, DesktopSessionProvider, Graphics, RcWindow, RoomHitTest, Startup, create_graphics,
};
use furnish_scene::Scene;
use furnish_xr::{ModelName, ModelStore, PlacementLoop, SelectOutcome, SurfaceTracker};
use glam::Vec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, ElementState, StartCause, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

const FPS: u64 = 60;
const FRAME_TIME: Duration = Duration::from_nanos(1_000_000_000 / FPS);

const RETICLE_INNER: f32 = 0.15;
const RETICLE_OUTER: f32 = 0.2;
const RETICLE_SEGMENTS: u32 = 32;
const RETICLE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.9];

type Placement = PlacementLoop<RoomHitTest, StdRng>;

enum State {
    Ready(Box<ReadyState>),
    Init(Option<(EventLoopProxy<Startup>, AppConfig)>),
}

struct ReadyState {
    gfx: Graphics,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    viewport_tex_id: egui::TextureId,
    placement: Placement,
    sessions: DesktopSessionProvider,
}

/// Requests collected while building the UI, applied once it is done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UiAction {
    EnterAr,
    ExitAr,
    Choose(ModelName),
    Select,
}

pub struct HostUi {
    pub show_debug_panel: bool,
    pub camera_active: bool,
    pub cursor_grab_request: Option<bool>,
    /// Pointer over the viewport in normalized device coordinates.
    pub pointer_ndc: Option<Vec2>,
    /// Selects raised by the keyboard since the last frame.
    pub pending_selects: usize,
    pub status: Option<String>,
}

impl HostUi {
    pub fn new() -> Self {
        Self {
            show_debug_panel: true,
            camera_active: false,
            cursor_grab_request: None,
            pointer_ndc: None,
            pending_selects: 0,
            status: None,
        }
    }
}

pub struct App {
    state: State,
    render_target: Instant,
    ui: HostUi,
}

impl App {
    pub fn new(event_loop: &EventLoop<Startup>, config: AppConfig) -> Self {
        Self {
            state: State::Init(Some((event_loop.create_proxy(), config))),
            render_target: Instant::now(),
            ui: HostUi::new(),
        }
    }

    fn init_egui_for_graphics(
        gfx: &Graphics,
    ) -> (
        egui::Context,
        egui_winit::State,
        egui_wgpu::Renderer,
        egui::TextureId,
    ) {
        let egui_ctx = egui::Context::default();
        let viewport_id = egui_ctx.viewport_id();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            viewport_id,
            gfx.window(),
            None,
            None,
            None,
        );

        let mut egui_renderer = egui_wgpu::Renderer::new(
            gfx.device(),
            gfx.surface_config().format,
            egui_wgpu::RendererOptions::default(),
        );

        let viewport_tex_id = egui_renderer.register_native_texture(
            gfx.device(),
            gfx.viewport_view(),
            wgpu::FilterMode::Linear,
        );

        (egui_ctx, egui_state, egui_renderer, viewport_tex_id)
    }

    fn build_placement(store: ModelStore, config: &AppConfig) -> (Placement, DesktopSessionProvider) {
        let room = config.room.hit_test();
        let sessions = DesktopSessionProvider::new(&room);
        let reticle = Model::ring(
            "reticle",
            RETICLE_INNER,
            RETICLE_OUTER,
            RETICLE_SEGMENTS,
            RETICLE_COLOR,
        );
        let scene = Scene::new(Arc::new(reticle), config.lighting.lighting());
        let placement = PlacementLoop::new(
            store,
            SurfaceTracker::new(room, config.session.space()),
            scene,
            StdRng::from_rng(&mut rand::rng()),
        );
        (placement, sessions)
    }

    fn draw(&mut self) {
        if let State::Ready(ready) = &mut self.state {
            Self::draw_frame(ready, &mut self.ui);
        }
    }

    fn resized(&mut self, size: PhysicalSize<u32>) {
        if let State::Ready(ready) = &mut self.state {
            ready.gfx.resize(size);
            ready.egui_renderer.free_texture(&ready.viewport_tex_id);
            ready.viewport_tex_id = ready.egui_renderer.register_native_texture(
                ready.gfx.device(),
                ready.gfx.viewport_view(),
                wgpu::FilterMode::Linear,
            );
            if !ready.placement.is_presenting() {
                ready.gfx.clear_viewport();
            }
        }
    }

    fn set_camera_active(ui_state: &mut HostUi, gfx: &mut Graphics, active: bool) {
        if ui_state.camera_active == active {
            return;
        }
        ui_state.camera_active = active;
        ui_state.cursor_grab_request = Some(active);
        if !active {
            gfx.release_camera();
        }
    }

    fn apply(ready: &mut ReadyState, ui_state: &mut HostUi, action: UiAction) {
        match action {
            UiAction::EnterAr => {
                let request = ready.placement.request_session(&mut ready.sessions);
                ui_state.status = pollster::block_on(request)
                    .err()
                    .map(|err| format!("Could not start AR: {err}"));
            }
            UiAction::ExitAr => {
                ready.placement.end_session();
                ready.gfx.clear_viewport();
            }
            UiAction::Choose(name) => ready.placement.selection_mut().set(name),
            UiAction::Select => {
                if let SelectOutcome::Placed(id) = ready.placement.select() {
                    log::info!(
                        "placed {} ({} in scene)",
                        id.0,
                        ready.placement.scene().instances().len()
                    );
                }
            }
        }
    }

    fn draw_frame(ready: &mut ReadyState, ui_state: &mut HostUi) {
        ready.gfx.update_camera();

        let raw_input = ready.egui_state.take_egui_input(ready.gfx.window());
        let viewport_tex_id = ready.viewport_tex_id;
        let cam_eye = ready.gfx.eye();
        let cam_yaw = ready.gfx.yaw();
        let cam_pitch = ready.gfx.pitch();
        let uploaded_models = ready.gfx.uploaded_models();
        let viewport_w = ready.gfx.viewport.width as f32;
        let viewport_h = ready.gfx.viewport.height as f32;
        let egui_ctx = ready.egui_ctx.clone();
        let placement = &ready.placement;
        let mut actions: Vec<UiAction> = Vec::new();

        let full_output = egui_ctx.run(raw_input, |ctx| {
            let presenting = placement.is_presenting();

            egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
                egui::MenuBar::new().ui(ui, |ui| {
                    ui.menu_button("View", |ui| {
                        ui.checkbox(&mut ui_state.show_debug_panel, "Show debug panel");
                    });
                    ui.separator();
                    if presenting {
                        if ui.button("Exit AR").clicked() {
                            actions.push(UiAction::ExitAr);
                        }
                    } else if ui.button("Enter AR").clicked() {
                        actions.push(UiAction::EnterAr);
                    }
                    if let Some(status) = &ui_state.status {
                        ui.colored_label(egui::Color32::LIGHT_RED, status);
                    }
                });
            });

            egui::SidePanel::left("furniture_panel")
                .resizable(false)
                .default_width(160.0)
                .show(ctx, |ui| {
                    ui.heading("Furniture");
                    ui.separator();
                    let store = placement.store();
                    for name in ModelName::ALL {
                        let active = placement.selection().is_active(name);
                        let response = match store.failure(name) {
                            Some(err) => ui
                                .selectable_label(active, format!("{name} (unavailable)"))
                                .on_hover_text(err),
                            None => ui.selectable_label(active, name.as_str()),
                        };
                        if response.clicked() {
                            actions.push(UiAction::Choose(name));
                        }
                    }
                });

            egui::TopBottomPanel::bottom("debug_panel")
                .resizable(true)
                .default_height(120.0)
                .show_animated(ctx, ui_state.show_debug_panel, |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Session:");
                        ui.monospace(placement.session().to_string());
                        ui.label("Frames:");
                        ui.monospace(placement.session_frames().to_string());
                        ui.label("Hit-test:");
                        ui.monospace(format!("{:?}", placement.tracker().space()));
                    });

                    let pose = placement.latest_pose();
                    ui.horizontal(|ui| {
                        ui.label("Reticle:");
                        if pose.valid {
                            ui.monospace(format!("{:.3}", pose.translation()));
                        } else {
                            ui.monospace("no surface");
                        }
                    });

                    ui.horizontal(|ui| {
                        ui.label("Placed:");
                        ui.monospace(placement.scene().instances().len().to_string());
                        ui.label("GPU models:");
                        ui.monospace(uploaded_models.to_string());
                    });

                    for (name, err) in placement.store().failures() {
                        ui.colored_label(egui::Color32::LIGHT_RED, format!("{name}: {err}"));
                    }

                    ui.horizontal(|ui| {
                        ui.label("Camera eye:");
                        ui.monospace(format!("{cam_eye:.2}"));
                        ui.label("Yaw / Pitch:");
                        ui.monospace(format!("{cam_yaw:.3} / {cam_pitch:.3}"));
                    });

                    ui.separator();
                    ui.label(
                        "Click the viewport to place. Right-click to fly (WASD, J/K), \
                         Space places while flying, Esc releases.",
                    );
                });

            egui::CentralPanel::default().show(ctx, |ui| {
                let available = ui.available_size();

                if available.x > 0.0 && available.y > 0.0 && viewport_w > 0.0 && viewport_h > 0.0 {
                    let tex_aspect = viewport_w / viewport_h;
                    let panel_aspect = available.x / available.y;
                    let (w, h) = if panel_aspect > tex_aspect {
                        (available.y * tex_aspect, available.y)
                    } else {
                        (available.x, available.x / tex_aspect)
                    };

                    let sized = SizedTexture::new(viewport_tex_id, egui::vec2(w, h));
                    let image = egui::Image::from_texture(sized).sense(Sense::click());
                    let response = ui.add(image);

                    ui_state.pointer_ndc = if ui_state.camera_active {
                        Some(Vec2::ZERO)
                    } else {
                        response.hover_pos().map(|pos| {
                            let rel = (pos - response.rect.min) / response.rect.size();
                            Vec2::new(rel.x * 2.0 - 1.0, 1.0 - rel.y * 2.0)
                        })
                    };

                    if response.clicked() {
                        actions.push(UiAction::Select);
                    }
                    if response.secondary_clicked() && !ui_state.camera_active {
                        ui_state.camera_active = true;
                        ui_state.cursor_grab_request = Some(true);
                    }

                    let painter = ui.painter();
                    if ui_state.camera_active {
                        painter.rect_stroke(
                            response.rect.shrink(1.0),
                            0.0,
                            egui::Stroke::new(2.0, egui::Color32::YELLOW),
                            egui::StrokeKind::Inside,
                        );
                        painter.circle_stroke(
                            response.rect.center(),
                            4.0,
                            egui::Stroke::new(1.5, egui::Color32::YELLOW),
                        );
                    }
                    if !presenting {
                        painter.text(
                            response.rect.center(),
                            egui::Align2::CENTER_CENTER,
                            "Press \"Enter AR\" to start",
                            egui::FontId::proportional(18.0),
                            egui::Color32::GRAY,
                        );
                    }
                } else {
                    ui_state.pointer_ndc = None;
                    ui.label("Viewport area is too small.");
                }
            });
        });

        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = full_output;

        ready
            .egui_state
            .handle_platform_output(ready.gfx.window(), platform_output);

        let paint_jobs = ready.egui_ctx.tessellate(shapes, pixels_per_point);

        actions.extend(std::iter::repeat_n(
            UiAction::Select,
            std::mem::take(&mut ui_state.pending_selects),
        ));
        // selects see the pose of the frame before this one
        for action in actions {
            Self::apply(ready, ui_state, action);
        }

        if ready.placement.is_presenting() {
            let frame = ready.gfx.xr_frame(ui_state.pointer_ndc);
            ready.placement.on_frame(Some(&frame), &mut ready.gfx);
        }

        if let Some(grab) = ui_state.cursor_grab_request.take() {
            let window = ready.gfx.window();
            window.set_cursor_visible(!grab);
            let mode = if grab {
                CursorGrabMode::Confined
            } else {
                CursorGrabMode::None
            };
            if let Err(err) = window.set_cursor_grab(mode) {
                log::debug!("cursor grab {mode:?} failed: {err}");
            }
        }

        ready.gfx.present(|gfx_inner, swap_view, encoder| {
            for (id, image_delta) in &textures_delta.set {
                ready.egui_renderer.update_texture(
                    gfx_inner.device(),
                    gfx_inner.queue(),
                    *id,
                    image_delta,
                );
            }
            for id in &textures_delta.free {
                ready.egui_renderer.free_texture(id);
            }

            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [
                    gfx_inner.surface_config().width,
                    gfx_inner.surface_config().height,
                ],
                pixels_per_point,
            };

            ready.egui_renderer.update_buffers(
                gfx_inner.device(),
                gfx_inner.queue(),
                encoder,
                &paint_jobs,
                &screen_descriptor,
            );

            let rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui_overlay_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut rpass = rpass.forget_lifetime();
            ready
                .egui_renderer
                .render(&mut rpass, &paint_jobs, &screen_descriptor);
        });
    }
}

impl ApplicationHandler<Startup> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let State::Init(pending) = &mut self.state else {
            return;
        };
        let Some((proxy, config)) = pending.take() else {
            return;
        };

        let attrs = Window::default_attributes().with_title("Furnish");
        let window: RcWindow = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("could not create window: {err}");
                event_loop.exit();
                return;
            }
        };
        if let Err(err) = pollster::block_on(create_graphics(window, proxy, config)) {
            log::error!("startup failed: {err:#}");
            event_loop.exit();
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, startup: Startup) {
        let Startup {
            mut graphics,
            store,
            config,
        } = startup;
        let (egui_ctx, egui_state, egui_renderer, viewport_tex_id) =
            App::init_egui_for_graphics(&graphics);
        let (placement, sessions) = App::build_placement(store, &config);

        graphics.clear_viewport();
        graphics.request_redraw();
        self.state = State::Ready(Box::new(ReadyState {
            gfx: graphics,
            egui_ctx,
            egui_state,
            egui_renderer,
            viewport_tex_id,
            placement,
            sessions,
        }));
    }

    fn new_events(&mut self, _event_loop: &ActiveEventLoop, _cause: StartCause) {
        if self.render_target <= Instant::now() {
            self.render_target += FRAME_TIME;
            if let State::Ready(ready) = &mut self.state {
                ready.gfx.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::Resized(size) => self.resized(size),
            WindowEvent::RedrawRequested => {
                self.draw();
                let now = Instant::now();
                if self.render_target <= now {
                    self.render_target = now + FRAME_TIME;
                    if let State::Ready(ready) = &mut self.state {
                        ready.gfx.request_redraw();
                    }
                }
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            other => {
                let State::Ready(ready) = &mut self.state else {
                    return;
                };
                let response = ready.egui_state.on_window_event(ready.gfx.window(), &other);
                if response.repaint {
                    ready.gfx.request_redraw();
                }

                if let WindowEvent::Focused(false) = other {
                    Self::set_camera_active(&mut self.ui, &mut ready.gfx, false);
                }

                if let WindowEvent::KeyboardInput {
                    event: key_event, ..
                } = &other
                    && key_event.state == ElementState::Pressed
                    && !key_event.repeat
                    && self.ui.camera_active
                {
                    match key_event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape) => {
                            Self::set_camera_active(&mut self.ui, &mut ready.gfx, false);
                            ready.gfx.request_redraw();
                        }
                        PhysicalKey::Code(KeyCode::Space) => self.ui.pending_selects += 1,
                        _ => {}
                    }
                }

                if self.ui.camera_active && !response.consumed {
                    ready.gfx.handle_window_event(&other);
                }
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let State::Ready(ready) = &mut self.state
            && self.ui.camera_active
        {
            ready.gfx.handle_device_event(&event);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.render_target));
    }
}
