//! Tile resolve pass.
//!
//! With hardware multisampling, a pixel on a shared edge of two overlapping
//! window quads carries sub-samples from both draw calls; a default resolve
//! averages colors from different windows and paints a visibly wrong seam.
//! The main pass therefore tags every sub-sample with its draw-call id in a
//! side attachment, and this pass picks a single winning draw per pixel by
//! majority coverage, averaging only the winner's sub-samples. Losing
//! sub-samples are discarded, never blended.

use anyhow::Result;

use crate::gpu::build_validated;

/// Draw-call id written by the clear color: "no draw covered this sample".
/// Ids are encoded in an 8-bit unorm attachment, so 255 real draws
/// (ids 0..=254) fit in one frame.
pub const CLEAR_DRAW_ID: u32 = 255;

/// Largest number of tagged draw calls per frame.
pub const MAX_DRAW_CALLS: u32 = CLEAR_DRAW_ID;

/// CPU reference of the per-pixel majority vote, kept in lockstep with
/// `fs_resolve` in `shaders/tile_resolve.wgsl`.
///
/// Rules: the id covering the most sub-samples wins; an even split goes to
/// the lowest id; `CLEAR_DRAW_ID` never outvotes a real draw. The result is
/// the average of the winner's sub-samples only, or transparent black when
/// no sample was drawn.
pub fn majority_resolve(samples: &[(u32, [f32; 4])]) -> [f32; 4] {
    let mut best_id = CLEAR_DRAW_ID;
    let mut best_count = 0usize;

    for &(id, _) in samples {
        if id == CLEAR_DRAW_ID {
            continue;
        }
        let count = samples.iter().filter(|(other, _)| *other == id).count();
        if count > best_count || (count == best_count && id < best_id) {
            best_id = id;
            best_count = count;
        }
    }

    if best_id == CLEAR_DRAW_ID {
        return [0.0; 4];
    }

    let mut sum = [0.0f32; 4];
    for &(id, color) in samples {
        if id == best_id {
            for (acc, channel) in sum.iter_mut().zip(color) {
                *acc += channel;
            }
        }
    }
    sum.map(|channel| channel / best_count as f32)
}

/// Fullscreen resolve pipeline reading the multisampled color and draw-id
/// attachments and writing one disambiguated pixel per sample location.
pub struct TileResolvePipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl TileResolvePipeline {
    /// Construction failure is an unrecoverable environment error: there is
    /// no visually-correct fallback for window-edge compositing.
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat) -> Result<Self> {
        build_validated(device, "tile resolve", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("tile resolve shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/tile_resolve.wgsl").into()),
            });

            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("tile resolve bind group layout"),
                    entries: &[
                        // Multisampled color
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: true,
                            },
                            count: None,
                        },
                        // Multisampled per-sample draw-call ids
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: true,
                            },
                            count: None,
                        },
                    ],
                });

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("tile resolve pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("tile resolve pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_fullscreen"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_resolve"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: output_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            Self {
                pipeline,
                bind_group_layout,
            }
        })
    }

    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        msaa_color: &wgpu::TextureView,
        msaa_id: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tile resolve bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(msaa_color),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(msaa_id),
                },
            ],
        })
    }

    /// Encode the resolve pass into `target`. Consumes the tile data written
    /// by the main pass; the multisampled attachments are transient and hold
    /// nothing of value afterwards.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        target: &wgpu::TextureView,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tile resolve pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
    const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

    #[test]
    fn test_three_to_one_split_averages_majority_only() {
        // Sub-samples split 3-to-1 between two draws: the resolved color is
        // the average of the 3 majority sub-samples, not all 4.
        let samples = [(2, RED), (2, RED), (2, RED), (5, BLUE)];
        assert_eq!(majority_resolve(&samples), RED);
    }

    #[test]
    fn test_even_split_lowest_id_wins() {
        let samples = [(3, BLUE), (3, BLUE), (1, RED), (1, RED)];
        assert_eq!(majority_resolve(&samples), RED);
    }

    #[test]
    fn test_uncovered_samples_never_outvote_draws() {
        let samples = [
            (CLEAR_DRAW_ID, [0.0; 4]),
            (CLEAR_DRAW_ID, [0.0; 4]),
            (CLEAR_DRAW_ID, [0.0; 4]),
            (7, BLUE),
        ];
        assert_eq!(majority_resolve(&samples), BLUE);
    }

    #[test]
    fn test_fully_uncovered_pixel_is_transparent() {
        let samples = [(CLEAR_DRAW_ID, [0.0; 4]); 4];
        assert_eq!(majority_resolve(&samples), [0.0; 4]);
    }

    #[test]
    fn test_winner_samples_are_averaged() {
        let samples = [
            (4, [1.0, 0.0, 0.0, 1.0]),
            (4, [0.0, 1.0, 0.0, 1.0]),
            (9, BLUE),
            (9, BLUE),
        ];
        // Tie between id 4 and id 9: lowest id wins, its two samples average.
        assert_eq!(majority_resolve(&samples), [0.5, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_single_sample() {
        assert_eq!(majority_resolve(&[(0, RED)]), RED);
    }
}
