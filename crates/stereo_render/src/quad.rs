//! Per-window quad pass: one tagged draw call per visible window.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};

use crate::gpu::build_validated;

/// Dynamic-offset stride for per-draw uniforms (uniform buffer alignment).
pub const DRAW_UNIFORM_STRIDE: u64 = 256;

/// Per-eye uniforms, one buffer per eye.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct EyeUniforms {
    pub view_proj: [[f32; 4]; 4],
}

/// Per-draw uniforms, written at `draw index * DRAW_UNIFORM_STRIDE`.
///
/// `draw_id` tags the draw for the resolve stage; it is stable only within
/// one frame. `layer` selects the texture-array layer in layered mode and is
/// unused otherwise.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    pub draw_id: u32,
    pub layer: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

/// Window-quad render pipeline.
///
/// Built once per renderer configuration: the layered/discrete switch picks
/// the fragment entry point (and the matching texture bind group layout) at
/// construction.
pub struct WindowQuadPipeline {
    pipeline: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    draw_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    layered: bool,
}

impl WindowQuadPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        id_format: wgpu::TextureFormat,
        sample_count: u32,
        layered: bool,
    ) -> Result<Self> {
        build_validated(device, "window quad", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("window quad shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/window_quad.wgsl").into()),
            });

            let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("window quad frame layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(
                                std::mem::size_of::<EyeUniforms>() as u64,
                            ),
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

            let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("window quad draw layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<DrawUniforms>() as u64,
                        ),
                    },
                    count: None,
                }],
            });

            // The shader declares both texture bindings; each entry point
            // statically uses only one, so the layout carries just that one.
            let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("window quad texture layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: if layered { 1 } else { 0 },
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: if layered {
                            wgpu::TextureViewDimension::D2Array
                        } else {
                            wgpu::TextureViewDimension::D2
                        },
                        multisampled: false,
                    },
                    count: None,
                }],
            });

            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("window quad sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("window quad pipeline layout"),
                bind_group_layouts: &[&frame_layout, &draw_layout, &texture_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("window quad pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_window"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(if layered { "fs_window_array" } else { "fs_window" }),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[
                        // Sub-sample colors; disambiguated by the resolve
                        // pass, so no blending here.
                        Some(wgpu::ColorTargetState {
                            format: color_format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        }),
                        // Per-sample draw-call ids.
                        Some(wgpu::ColorTargetState {
                            format: id_format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        }),
                    ],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            });

            Self {
                pipeline,
                frame_layout,
                draw_layout,
                texture_layout,
                sampler,
                layered,
            }
        })
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn is_layered(&self) -> bool {
        self.layered
    }

    pub fn create_frame_bind_group(
        &self,
        device: &wgpu::Device,
        eye_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("window quad frame bind group"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: eye_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    pub fn create_draw_bind_group(
        &self,
        device: &wgpu::Device,
        draw_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("window quad draw bind group"),
            layout: &self.draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: draw_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
                }),
            }],
        })
    }

    /// Bind a discrete window texture (non-layered mode).
    pub fn create_texture_bind_group(
        &self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("window texture bind group"),
            layout: &self.texture_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            }],
        })
    }

    /// Bind the shared window texture array (layered mode).
    pub fn create_array_bind_group(
        &self,
        device: &wgpu::Device,
        array_view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("window texture array bind group"),
            layout: &self.texture_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(array_view),
            }],
        })
    }
}
