//! Tilestream CLI - headless map renderer
//!
//! Loads the configuration, streams the tiles covering the requested view
//! through the render and fetch workers, and saves the presented frame.

mod args;
mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tilestream::config::MapConfig;
use tilestream::gpu::{SoftwareContext, SoftwareSurface};
use tilestream::logging::{default_log_dir, default_log_file, init_logging};
use tilestream::viewer::MapViewer;
use tracing::{info, warn};

use args::Args;
use error::CliError;

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        e.exit();
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let _logging = init_logging(&default_log_dir(), default_log_file())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let mut config = match &args.config {
        Some(path) => MapConfig::load_from(path)?,
        None => MapConfig::load()?,
    };
    args.apply(&mut config);
    config.validate()?;

    println!("Map configuration:");
    println!("{}", config);

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .map_err(|e| CliError::Signal(e.to_string()))?;
    }

    let surface = SoftwareSurface::new();
    let context = SoftwareContext::new(Arc::clone(&surface));
    let map_size = config.map_size;
    let mut viewer = MapViewer::with_http(config, Box::new(context))?;

    viewer.resize(map_size);
    viewer.expose()?;
    let deadline = Instant::now() + Duration::from_secs(args.wait);
    let mut settled = wait(&viewer, deadline, &interrupted);
    for &(dx, dy) in &args.pan {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        viewer.pan(dx, dy);
        settled = wait(&viewer, deadline, &interrupted);
    }

    let stats = viewer.renderer().stats();
    if !settled {
        warn!(pending = stats.pending(), "Saving view before every tile arrived");
    }
    info!(
        frames = stats.frames(),
        requests = stats.requests_issued(),
        cached = stats.cached(),
        "Rendering finished"
    );

    let (lat, lon) = viewer.center_lat_lon();
    viewer.shutdown()?;

    let frame = surface.snapshot().ok_or(CliError::NoFrame)?;
    frame.save(&args.output).map_err(|e| CliError::FileWrite {
        path: args.output.clone(),
        error: e.to_string(),
    })?;
    println!(
        "Saved {}x{} view centred on [{:.5}, {:.5}] to {}",
        frame.width(),
        frame.height(),
        lat,
        lon,
        args.output.display()
    );
    Ok(())
}

/// Wait for the renderer to settle. Returns false on timeout or Ctrl-C.
fn wait(viewer: &MapViewer, deadline: Instant, interrupted: &AtomicBool) -> bool {
    while !interrupted.load(Ordering::SeqCst) {
        if viewer.wait_until_idle(Duration::from_millis(100)) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
    }
    false
}
