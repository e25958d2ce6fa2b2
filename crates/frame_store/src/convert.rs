//! wgpu-backed surface conversion.

use crate::surface::{CapturedSurface, ConvertError, SurfaceConverter};

/// A GPU-resident window frame.
///
/// Owned by the store; replaced wholesale on every publish, never mutated in
/// place. The render loop borrows it via `Arc` for one frame's draw calls
/// and the deferred-release pool keeps it alive until that frame completes.
#[derive(Debug)]
pub struct GpuFrame {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

/// Uploads RGBA8 surfaces to sampleable 2D textures.
pub struct WgpuSurfaceConverter {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
}

impl WgpuSurfaceConverter {
    /// `format` must be an 8-bit RGBA format; captured bytes are uploaded
    /// as-is, so pick the srgb variant when surfaces carry srgb-encoded
    /// pixels.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            queue,
            format,
        }
    }
}

impl SurfaceConverter for WgpuSurfaceConverter {
    type Frame = GpuFrame;

    fn convert(&self, surface: &CapturedSurface) -> Result<GpuFrame, ConvertError> {
        surface.validate()?;

        let size = wgpu::Extent3d {
            width: surface.width,
            height: surface.height,
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("window frame"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        self.queue.write_texture(
            texture.as_image_copy(),
            &surface.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * surface.width),
                rows_per_image: Some(surface.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(GpuFrame {
            texture,
            view,
            width: surface.width,
            height: surface.height,
        })
    }
}
