//! deskstream: composites captured desktop windows into a stereo scene and
//! streams it to an immersive display session.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use arrangement::SharedMode;
use frame_store::{FrameStore, WgpuSurfaceConverter};
use session::SessionLifecycle;
use stereo_render::{FrameRenderer, GpuContext, StereoRenderLoop};

mod config;
mod feed;
mod logging;
mod observable;
mod session_driver;

use config::Config;
use feed::SyntheticFeed;
use observable::StatusReporter;
use session_driver::SimulatedDisplaySession;

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let _log_guard = logging::init()?;
    tracing::info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let config_path = Config::default_path().context("could not determine config directory")?;
    let config = Config::load_or_init(&config_path);
    tracing::info!(path = %config_path.display(), "config loaded");

    let gpu = GpuContext::new().context("acquiring GPU device")?;
    let render_config = config.render.to_render_config();

    let converter = WgpuSurfaceConverter::new(
        gpu.device.clone(),
        gpu.queue.clone(),
        render_config.color_format,
    );
    let store = Arc::new(FrameStore::new(converter));
    let mode = SharedMode::new(config.arrangement.mode);
    let lifecycle = SessionLifecycle::new();

    let feed = SyntheticFeed::start(
        Arc::clone(&store),
        config.session.window_count,
        render_config.layer_width,
        render_config.layer_height,
    );
    let reporter = StatusReporter::spawn(
        Arc::clone(&store),
        mode.clone(),
        lifecycle.clone(),
        STATUS_INTERVAL,
    );

    let display = SimulatedDisplaySession::new(
        config.session.refresh_hz,
        config.session.demo_frames,
        render_config.eye_width,
        render_config.eye_height,
    );
    // Draw resources are allocated only once the session actually opens.
    session_driver::connect(&lifecycle).context("opening display session")?;
    tracing::info!(state = lifecycle.state().as_str(), "session open");

    let renderer =
        FrameRenderer::new(&gpu, render_config).context("building frame renderer")?;

    let mut render_loop = StereoRenderLoop::new(display, renderer);
    let report = render_loop
        .run(&store, &mode, &lifecycle)
        .context("render loop failed")?;

    tracing::info!(
        exit = ?report.exit,
        frames = report.frames_rendered,
        "render loop finished"
    );
    if let Some(stats) = report.timing {
        tracing::info!(
            p50 = stats.p50_units,
            p95 = stats.p95_units,
            p99 = stats.p99_units,
            overruns = stats.overruns,
            "render timing (frame units)"
        );
    }

    reporter.shutdown();
    feed.shutdown();
    tracing::info!(state = lifecycle.state().as_str(), "shutdown complete");
    Ok(())
}
