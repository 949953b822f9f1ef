//! eglgbm - bring up the EGL display system and present a few frames
//!
//! Runs as the master process by default; `--join` attaches to a display
//! already brought up by another process.

use anyhow::{Context, Result};
use log::{debug, info, warn};

use eglgbm::config::Config;
use eglgbm::framework::{Core, LayerFuncs, RegionConfigFlags, ScreenFuncs};
use eglgbm::gpu::{GbmBinder, GbmBinding, GlRenderer};
use eglgbm::shared::{Arena, ArenaSurfacePools};
use eglgbm::System;

/// Frames presented when --frames is not given
const DEFAULT_FRAMES: u32 = 120;

/// Clear colors cycled through by the demo loop
const FRAME_COLORS: [(f32, f32, f32); 3] = [(0.8, 0.1, 0.1), (0.1, 0.8, 0.1), (0.1, 0.1, 0.8)];

fn print_help() {
    println!(
        r#"eglgbm {} - EGL/GBM display system for DRM/KMS

USAGE:
    eglgbm [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -j, --join              Attach to a display brought up by another process
    -n, --frames N          Number of frames to present (default: {})

ENVIRONMENT:
    DRICARD                 DRM device node (default: /dev/dri/card0)
    EGLGBM_CONFIG           Config file path

CONFIG FILE:
    ~/.config/eglgbm/config.toml
"#,
        env!("CARGO_PKG_VERSION"),
        DEFAULT_FRAMES
    );
}

fn parse_frames(args: &[String]) -> Result<u32> {
    let Some(pos) = args.iter().position(|a| a == "--frames" || a == "-n") else {
        return Ok(DEFAULT_FRAMES);
    };
    let value = args
        .get(pos + 1)
        .context("--frames needs a value")?;
    value
        .parse()
        .with_context(|| format!("invalid frame count '{}'", value))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Check command line arguments
    let args: Vec<String> = std::env::args().collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("eglgbm {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let join = args.iter().any(|a| a == "--join" || a == "-j");
    let frames = parse_frames(&args)?;

    let system_info = eglgbm::info();
    info!(
        "{} system {}.{} ({}) starting...",
        system_info.name, system_info.version.0, system_info.version.1, system_info.vendor
    );

    // Load config file
    let cfg = Config::load();

    let arena = Arena::open(cfg.runtime_dir()).context("Failed to open shared arena")?;
    let pools = ArenaSurfacePools::new(&arena);
    let core = Core::new(&arena, &pools, &cfg);

    let mut system = if join {
        System::join(&core, &GbmBinder).context("Failed to join display system")?
    } else {
        System::initialize(&core, &GbmBinder).context("Failed to initialize display system")?
    };

    let result = run(&mut system, frames);

    notify_systemd(&[sd_notify::NotifyState::Stopping]);

    let close_result = system.close(&pools).context("Failed to close display system");
    result.and(close_result)
}

/// Send a state to systemd; NOTIFY_SOCKET stays set for the next one
fn notify_systemd(state: &[sd_notify::NotifyState]) {
    if let Err(e) = sd_notify::notify(false, state) {
        debug!("sd_notify failed: {}", e);
    }
}

fn run(system: &mut System<GbmBinding>, frames: u32) -> Result<()> {
    let mut screen = system.screen();
    let description = screen.init_screen()?;
    let (output, output_config) = screen.init_output(0)?;
    let size = screen.screen_size()?;
    info!(
        "{}: {} ({:?}), {}x{}, rotation {}",
        description.name,
        output.name,
        output_config.resolution,
        size.w,
        size.h,
        screen.screen_rotation()?.degrees()
    );

    let mut layer = system.primary_layer();
    let (layer_description, layer_config) = layer.init_layer()?;
    let region = layer_config.region_config();
    if let Err(e) = layer.test_region(&region) {
        warn!("{} rejects its default configuration: {}", layer_description.name, e);
    }
    layer.set_region(&region, RegionConfigFlags::all())?;

    notify_systemd(&[sd_notify::NotifyState::Ready]);

    let surface = system.binding().surface_size();
    let renderer = GlRenderer::new(system.binding().context());
    renderer.set_viewport(0, 0, surface.w, surface.h);

    for frame in 0..frames {
        let (r, g, b) = FRAME_COLORS[frame as usize % FRAME_COLORS.len()];
        renderer.clear(r, g, b, 1.0);
        system.primary_layer().update_region(surface, None)?;
    }

    info!(
        "Presented {} frames ({} dropped)",
        system.scanout().presented_frames(),
        system.scanout().dropped_frames()
    );
    Ok(())
}
