//! Per-eye render targets and frame encoding.

use anyhow::{Context, Result};

use frame_store::GpuFrame;

use crate::display::EyeView;
use crate::gpu::GpuContext;
use crate::quad::{DrawUniforms, EyeUniforms, WindowQuadPipeline, DRAW_UNIFORM_STRIDE};
use crate::render_loop::WindowDraw;
use crate::resolve::{TileResolvePipeline, MAX_DRAW_CALLS};

/// Format of the per-sample draw-id side attachment. 8-bit unorm is
/// multisample-capable everywhere and round-trips integer ids 0..=255
/// exactly.
const DRAW_ID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Renderer configuration, established once per session; changing it means
/// rebuilding the renderer.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub eye_width: u32,
    pub eye_height: u32,
    /// Multisample sub-samples per pixel.
    pub sample_count: u32,
    pub color_format: wgpu::TextureFormat,
    /// Composite windows from one flat texture array instead of discrete
    /// per-window textures.
    pub layered_windows: bool,
    /// Shared layer extent in layered mode; frames of any other size are
    /// skipped there.
    pub layer_width: u32,
    pub layer_height: u32,
    /// Texture-array capacity in layered mode.
    pub max_layers: u32,
    /// Frames that may be in flight before GPU resources are reclaimed.
    pub frames_in_flight: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            eye_width: 1920,
            eye_height: 1824,
            sample_count: 4,
            color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            layered_windows: false,
            layer_width: 1280,
            layer_height: 800,
            max_layers: 16,
            frames_in_flight: 2,
        }
    }
}

/// Seam between the render loop and the GPU.
///
/// Composites one frame's draws and exposes the resolved per-eye images the
/// display session presents. The loop is generic over this trait so its
/// orchestration can be exercised without a device.
pub trait Compositor {
    type Frame;
    type EyeImage;

    fn render(&mut self, draws: &[WindowDraw<Self::Frame>], eyes: &[EyeView; 2]) -> Result<()>;

    /// Resolved output for one eye, valid until the next `render` call.
    fn resolved_eye(&self, eye: usize) -> &Self::EyeImage;

    /// Frames that may be in flight before per-frame resources are
    /// reclaimed.
    fn frames_in_flight(&self) -> usize;
}

/// Transient per-eye tile data plus the resolved output.
///
/// The multisampled attachments live only between the main pass and the
/// resolve pass of the same frame; only `resolved` survives to submission.
struct EyeTargets {
    msaa_color: wgpu::TextureView,
    msaa_id: wgpu::TextureView,
    resolved: wgpu::TextureView,
}

/// Composites tracked windows into a resolved stereo frame.
pub struct FrameRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RenderConfig,
    quad: WindowQuadPipeline,
    resolve: TileResolvePipeline,
    eyes: [EyeTargets; 2],
    eye_buffers: [wgpu::Buffer; 2],
    frame_bind_groups: [wgpu::BindGroup; 2],
    resolve_bind_groups: [wgpu::BindGroup; 2],
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    /// Layered mode only: the shared window array and its bind group.
    window_array: Option<wgpu::Texture>,
    array_bind_group: Option<wgpu::BindGroup>,
}

impl FrameRenderer {
    pub fn new(gpu: &GpuContext, config: RenderConfig) -> Result<Self> {
        let device = gpu.device.clone();
        let queue = gpu.queue.clone();

        let quad = WindowQuadPipeline::new(
            &device,
            config.color_format,
            DRAW_ID_FORMAT,
            config.sample_count,
            config.layered_windows,
        )
        .context("building window quad pipeline")?;

        let resolve = TileResolvePipeline::new(&device, config.color_format)
            .context("building tile resolve pipeline")?;

        let eyes = [
            Self::create_eye_targets(&device, &config, "left"),
            Self::create_eye_targets(&device, &config, "right"),
        ];

        let eye_buffers = [
            Self::create_eye_buffer(&device, "left eye uniforms"),
            Self::create_eye_buffer(&device, "right eye uniforms"),
        ];
        let frame_bind_groups = [
            quad.create_frame_bind_group(&device, &eye_buffers[0]),
            quad.create_frame_bind_group(&device, &eye_buffers[1]),
        ];
        let resolve_bind_groups = [
            resolve.create_bind_group(&device, &eyes[0].msaa_color, &eyes[0].msaa_id),
            resolve.create_bind_group(&device, &eyes[1].msaa_color, &eyes[1].msaa_id),
        ];

        let draw_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw uniforms"),
            size: DRAW_UNIFORM_STRIDE * MAX_DRAW_CALLS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let draw_bind_group = quad.create_draw_bind_group(&device, &draw_buffer);

        let (window_array, array_bind_group) = if config.layered_windows {
            let array = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("window layer array"),
                size: wgpu::Extent3d {
                    width: config.layer_width,
                    height: config.layer_height,
                    depth_or_array_layers: config.max_layers,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: config.color_format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = array.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(wgpu::TextureViewDimension::D2Array),
                ..Default::default()
            });
            let bind_group = quad.create_array_bind_group(&device, &view);
            (Some(array), Some(bind_group))
        } else {
            (None, None)
        };

        tracing::info!(
            eye_width = config.eye_width,
            eye_height = config.eye_height,
            samples = config.sample_count,
            layered = config.layered_windows,
            "frame renderer configured"
        );

        Ok(Self {
            device,
            queue,
            config,
            quad,
            resolve,
            eyes,
            eye_buffers,
            frame_bind_groups,
            resolve_bind_groups,
            draw_buffer,
            draw_bind_group,
            window_array,
            array_bind_group,
        })
    }

    fn create_eye_targets(device: &wgpu::Device, config: &RenderConfig, eye: &str) -> EyeTargets {
        let extent = wgpu::Extent3d {
            width: config.eye_width,
            height: config.eye_height,
            depth_or_array_layers: 1,
        };
        let msaa = |label: &str, format: wgpu::TextureFormat| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: extent,
                    mip_level_count: 1,
                    sample_count: config.sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };

        let resolved = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("{eye} eye resolved")),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: config.color_format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        EyeTargets {
            msaa_color: msaa(&format!("{eye} eye msaa color"), config.color_format),
            msaa_id: msaa(&format!("{eye} eye msaa draw ids"), DRAW_ID_FORMAT),
            resolved,
        }
    }

    fn create_eye_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<EyeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }
}

impl Compositor for FrameRenderer {
    type Frame = GpuFrame;
    type EyeImage = wgpu::TextureView;

    fn resolved_eye(&self, eye: usize) -> &wgpu::TextureView {
        &self.eyes[eye].resolved
    }

    fn frames_in_flight(&self) -> usize {
        self.config.frames_in_flight
    }

    /// Composite one stereo frame: main pass per eye (one tagged draw per
    /// window), then the tile resolve pass per eye, one submission.
    fn render(&mut self, draws: &[WindowDraw<GpuFrame>], eyes: &[EyeView; 2]) -> Result<()> {
        let draws = if draws.len() as u32 > MAX_DRAW_CALLS {
            tracing::warn!(
                draws = draws.len(),
                cap = MAX_DRAW_CALLS,
                "draw count exceeds per-frame id space, truncating"
            );
            &draws[..MAX_DRAW_CALLS as usize]
        } else {
            draws
        };

        for (eye_buffer, eye_view) in self.eye_buffers.iter().zip(eyes) {
            let uniforms = EyeUniforms {
                view_proj: eye_view.view_proj().to_cols_array_2d(),
            };
            self.queue
                .write_buffer(eye_buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stereo frame encoder"),
            });

        // In layered mode, pack this frame's window textures into the shared
        // array; draws whose frames do not match the layer extent are skipped.
        let prepared = if self.quad.is_layered() {
            self.pack_layers(&mut encoder, draws)
        } else {
            draws
                .iter()
                .enumerate()
                .map(|(index, draw)| (index, draw, 0u32))
                .collect()
        };

        let mut draw_id = 0u32;
        let mut encoded = Vec::with_capacity(prepared.len());
        for (index, draw, layer) in prepared {
            let uniforms = DrawUniforms {
                model: draw.model.to_cols_array_2d(),
                draw_id,
                layer,
                _pad0: 0,
                _pad1: 0,
            };
            self.queue.write_buffer(
                &self.draw_buffer,
                index as u64 * DRAW_UNIFORM_STRIDE,
                bytemuck::bytes_of(&uniforms),
            );
            let texture_bind_group = if self.quad.is_layered() {
                None
            } else {
                Some(
                    self.quad
                        .create_texture_bind_group(&self.device, &draw.frame.view),
                )
            };
            encoded.push((index, texture_bind_group));
            draw_id += 1;
        }

        for (eye_index, targets) in self.eyes.iter().enumerate() {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("window quad pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &targets.msaa_color,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    // Clear to 1.0: decodes as CLEAR_DRAW_ID.
                    Some(wgpu::RenderPassColorAttachment {
                        view: &targets.msaa_id,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: 1.0,
                                g: 0.0,
                                b: 0.0,
                                a: 0.0,
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(self.quad.pipeline());
            pass.set_bind_group(0, &self.frame_bind_groups[eye_index], &[]);
            if let Some(array_bind_group) = &self.array_bind_group {
                pass.set_bind_group(2, array_bind_group, &[]);
            }
            for (index, texture_bind_group) in &encoded {
                let offset = (*index as u64 * DRAW_UNIFORM_STRIDE) as u32;
                pass.set_bind_group(1, &self.draw_bind_group, &[offset]);
                if let Some(bind_group) = texture_bind_group {
                    pass.set_bind_group(2, bind_group, &[]);
                }
                pass.draw(0..6, 0..1);
            }
            drop(pass);

            self.resolve.encode(
                &mut encoder,
                &self.resolve_bind_groups[eye_index],
                &targets.resolved,
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl FrameRenderer {
    /// Copy matching frames into array layers; returns (draw-uniform slot,
    /// draw, layer) for every draw that made it in.
    fn pack_layers<'d>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        draws: &'d [WindowDraw<GpuFrame>],
    ) -> Vec<(usize, &'d WindowDraw<GpuFrame>, u32)> {
        let Some(array) = self.window_array.as_ref() else {
            return Vec::new();
        };

        let mut prepared = Vec::with_capacity(draws.len());
        let mut layer = 0u32;
        for draw in draws {
            if layer >= self.config.max_layers {
                tracing::warn!(
                    window_id = draw.window_id,
                    max_layers = self.config.max_layers,
                    "window array full, skipping draw"
                );
                continue;
            }
            if draw.frame.width != self.config.layer_width
                || draw.frame.height != self.config.layer_height
            {
                tracing::debug!(
                    window_id = draw.window_id,
                    frame_width = draw.frame.width,
                    frame_height = draw.frame.height,
                    "frame extent does not match layer extent, skipping draw"
                );
                continue;
            }
            encoder.copy_texture_to_texture(
                draw.frame.texture.as_image_copy(),
                wgpu::TexelCopyTextureInfo {
                    texture: array,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::Extent3d {
                    width: self.config.layer_width,
                    height: self.config.layer_height,
                    depth_or_array_layers: 1,
                },
            );
            prepared.push((prepared.len(), draw, layer));
            layer += 1;
        }
        prepared
    }
}
