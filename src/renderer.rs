// renderer.rs - wgpu backend: inverted sphere pass into a pixel-ratio-capped target, blit, status bar

use crate::backend::{FrameState, HudSnapshot, RenderBackend, RenderOutcome, SurfaceSize};
use crate::camera::equivalent_focal_length;
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::mesh::{build_inverted_sphere, SphereVertex};
use crate::texture::LoadState;
use image::RgbaImage;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

struct SphereBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// Panorama texture plus the bind group (camera, texture, sampler) that forms the sphere material.
struct Material {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// Offscreen colour target the sphere is drawn into, sized by the capped pixel ratio.
struct SceneTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    blit_bind_group: wgpu::BindGroup,
}

pub struct WgpuBackend {
    surface: Option<wgpu::Surface>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    sphere_pipeline: wgpu::RenderPipeline,
    blit_pipeline: wgpu::RenderPipeline,
    material_layout: wgpu::BindGroupLayout,
    blit_layout: wgpu::BindGroupLayout,
    panorama_sampler: wgpu::Sampler,
    scene_sampler: wgpu::Sampler,
    camera_buffer: wgpu::Buffer,

    sphere: Option<SphereBuffers>,
    material: Option<Material>,
    scene: Option<SceneTarget>,

    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Declared last: the surface above must be dropped before the window it was created from.
    window: Arc<Window>,
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> Result<Self, ViewerError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // SAFETY: the window is kept alive in `self.window` for as long as the surface exists.
        let surface = unsafe { instance.create_surface(window.as_ref()) }?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ViewerError::NoAdapter)?;
        log::info!("using GPU adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let (surface_format, alpha_mode) =
            pick_surface_mode(&surface_caps.formats, &surface_caps.alpha_modes)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        // --- sphere geometry ---
        let mesh = build_inverted_sphere(
            viewer.sphere_radius,
            viewer.width_segments as usize,
            viewer.height_segments as usize,
        );
        let sphere = SphereBuffers {
            vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sphere_vertices"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sphere_indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: mesh.indices.len() as u32,
        };

        // --- camera uniform ---
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera_buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform {
                view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let panorama_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("panorama_sampler"),
            // wraps horizontally across the 360° seam
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let scene_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scene_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                sampler_entry(2),
            ],
        });
        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        // --- pipelines ---
        let sphere_shader = device.create_shader_module(wgpu::include_wgsl!("sphere.wgsl"));
        let sphere_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sphere_pipeline_layout"),
            bind_group_layouts: &[&material_layout],
            push_constant_ranges: &[],
        });
        let sphere_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sphere_pipeline"),
            layout: Some(&sphere_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &sphere_shader,
                entry_point: "vs_main",
                buffers: &[SphereVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &sphere_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // the mesh is inverted, so its front faces are the ones seen from the centre
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let blit_shader = device.create_shader_module(wgpu::include_wgsl!("blit.wgsl"));
        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit_pipeline_layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });
        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit_pipeline"),
            layout: Some(&blit_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blit_shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &blit_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        // --- status bar ---
        let egui_ctx = egui::Context::default();
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Ok(Self {
            surface: Some(surface),
            device,
            queue,
            config,
            sphere_pipeline,
            blit_pipeline,
            material_layout,
            blit_layout,
            panorama_sampler,
            scene_sampler,
            camera_buffer,
            sphere: Some(sphere),
            material: None,
            scene: None,
            egui_ctx,
            egui_state,
            egui_renderer,
            window,
        })
    }

    /// Feed a window event to the status bar. The running render loop repaints it every frame.
    pub fn handle_window_event(&mut self, event: &winit::event::WindowEvent<'_>) {
        let _ = self.egui_state.on_event(&self.egui_ctx, event);
    }

    fn is_released(&self) -> bool {
        self.surface.is_none()
    }

    fn configure_surface(&mut self) {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
    }

    fn create_scene_target(&self, size: SurfaceSize) -> SceneTarget {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene_target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let blit_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bind_group"),
            layout: &self.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.scene_sampler),
                },
            ],
        });
        SceneTarget {
            texture,
            view,
            blit_bind_group,
        }
    }
}

/// Prefer an sRGB format; the adapter lists its preferred alpha mode first.
fn pick_surface_mode(
    formats: &[wgpu::TextureFormat],
    alpha_modes: &[wgpu::CompositeAlphaMode],
) -> Result<(wgpu::TextureFormat, wgpu::CompositeAlphaMode), ViewerError> {
    let format = formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| formats.first().copied())
        .ok_or(ViewerError::UnsupportedSurface("texture formats"))?;
    let alpha_mode = alpha_modes
        .first()
        .copied()
        .ok_or(ViewerError::UnsupportedSurface("alpha modes"))?;
    Ok((format, alpha_mode))
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

impl RenderBackend for WgpuBackend {
    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn resize(&mut self, size: SurfaceSize) {
        if self.is_released() {
            return;
        }
        self.configure_surface();
        let target = self.create_scene_target(size);
        if let Some(old) = self.scene.replace(target) {
            old.texture.destroy();
        }
    }

    fn upload_texture(&mut self, img: &RgbaImage) {
        if self.is_released() {
            return;
        }
        let (width, height) = img.dimensions();
        let texture_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("panorama_texture"),
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            img.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            texture_size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bind_group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.panorama_sampler),
                },
            ],
        });

        // The new material is complete before the old one goes, so no frame sees a missing texture.
        if let Some(old) = self.material.replace(Material { texture, bind_group }) {
            old.texture.destroy();
        }
    }

    fn render(&mut self, frame: &FrameState) -> Result<RenderOutcome, ViewerError> {
        let Some(surface) = &self.surface else {
            return Ok(RenderOutcome::Skipped);
        };

        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.configure_surface();
                return Ok(RenderOutcome::Skipped);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(ViewerError::OutOfMemory),
            Err(e) => {
                log::warn!("surface unavailable ({e}), dropping frame");
                return Ok(RenderOutcome::Skipped);
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[CameraUniform {
                view_proj: frame.view_projection.to_cols_array_2d(),
            }]),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        // 1. sphere into the scene target
        if let Some(scene) = &self.scene {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sphere_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &scene.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            if let (Some(sphere), Some(material)) = (&self.sphere, &self.material) {
                pass.set_pipeline(&self.sphere_pipeline);
                pass.set_bind_group(0, &material.bind_group, &[]);
                pass.set_vertex_buffer(0, sphere.vertices.slice(..));
                pass.set_index_buffer(sphere.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..sphere.index_count, 0, 0..1);
            }
        }

        // 2. scene target stretched over the window
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            if let Some(scene) = &self.scene {
                pass.set_pipeline(&self.blit_pipeline);
                pass.set_bind_group(0, &scene.blit_bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        // 3. status bar
        let hud = frame.hud.clone();
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if hud.visible {
                draw_status_bar(ctx, &hud);
            }
        });
        self.egui_state
            .handle_platform_output(&self.window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);
        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("status_bar_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut pass, &clipped_primitives, &screen_descriptor);
        }
        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(RenderOutcome::Presented)
    }

    fn release(&mut self) {
        if let Some(sphere) = self.sphere.take() {
            sphere.vertices.destroy();
            sphere.indices.destroy();
        }
        if let Some(material) = self.material.take() {
            material.texture.destroy();
        }
        if let Some(scene) = self.scene.take() {
            scene.texture.destroy();
        }
        self.camera_buffer.destroy();
        self.surface = None;
        log::debug!("GPU resources released");
    }
}

fn draw_status_bar(ctx: &egui::Context, hud: &HudSnapshot) {
    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            match &hud.load_state {
                LoadState::Pending => {
                    ui.label(egui::RichText::new("Loading panorama…").color(egui::Color32::YELLOW));
                }
                LoadState::Loaded { width, height } => {
                    ui.label(format!("{width}×{height}"));
                }
                LoadState::Failed(reason) => {
                    ui.label(
                        egui::RichText::new(format!("Panorama unavailable: {reason}"))
                            .color(egui::Color32::LIGHT_RED),
                    );
                }
            }
            ui.label("|");
            ui.label(format!("FOV: {:.1}°", hud.fov_deg));
            ui.label("|");
            ui.label(format!("{:.1}mm", equivalent_focal_length(hud.fov_deg)));
            ui.label("|");
            ui.label(format!("Yaw: {:.1}°", hud.yaw_deg));
            ui.label("|");
            ui.label(format!("Pitch: {:.1}°", hud.pitch_deg));
            if hud.auto_rotate {
                ui.label("|");
                ui.label(egui::RichText::new("Auto-rotate").color(egui::Color32::GREEN));
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::{CompositeAlphaMode, TextureFormat};

    #[test]
    fn srgb_format_is_preferred() {
        let (format, alpha) = pick_surface_mode(
            &[TextureFormat::Bgra8Unorm, TextureFormat::Bgra8UnormSrgb],
            &[CompositeAlphaMode::Opaque, CompositeAlphaMode::PreMultiplied],
        )
        .unwrap();
        assert_eq!(format, TextureFormat::Bgra8UnormSrgb);
        assert_eq!(alpha, CompositeAlphaMode::Opaque);

        let (format, _) =
            pick_surface_mode(&[TextureFormat::Rgba16Float], &[CompositeAlphaMode::Auto]).unwrap();
        assert_eq!(format, TextureFormat::Rgba16Float);
    }

    #[test]
    fn empty_capabilities_are_an_error() {
        assert!(matches!(
            pick_surface_mode(&[], &[CompositeAlphaMode::Opaque]),
            Err(ViewerError::UnsupportedSurface("texture formats"))
        ));
        assert!(matches!(
            pick_surface_mode(&[TextureFormat::Bgra8UnormSrgb], &[]),
            Err(ViewerError::UnsupportedSurface("alpha modes"))
        ));
    }
}
