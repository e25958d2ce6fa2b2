//! wgpu device acquisition and pipeline-build validation.

use anyhow::{Context, Result};

/// Shared GPU device and queue.
///
/// `wgpu::Device`/`wgpu::Queue` are internally reference-counted; clones are
/// cheap and refer to the same device.
#[derive(Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire a headless high-performance device. The composited frames go
    /// to the remote display session, not to a window surface.
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("Failed to find suitable GPU adapter")?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU adapter selected");

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("deskstream device"),
            ..Default::default()
        }))
        .context("Failed to acquire GPU device")?;

        Ok(Self { device, queue })
    }
}

/// Run `build` under a validation error scope and fail if the device reports
/// an error. Pipeline construction has no fallback path, so callers treat a
/// returned error as fatal for startup.
pub fn build_validated<T>(
    device: &wgpu::Device,
    label: &str,
    build: impl FnOnce() -> T,
) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        anyhow::bail!("{label}: GPU pipeline construction failed: {error}");
    }
    Ok(value)
}
