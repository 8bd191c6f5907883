use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use wardcam::app::keyboard_input::spawn_quit_listener;
use wardcam::{install_signal_handlers, Monitor, SyntheticFrameSource, WardcamConfig};

#[derive(Parser, Debug)]
#[command(name = "wardcam")]
#[command(about = "Real-time security monitor with motion and face detection")]
#[command(version)]
#[command(long_about = "Watches a camera feed, detects motion and faces in every frame, \
writes a security event log, and optionally records clips while activity continues.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "wardcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the monitor")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Directory for daily rolling diagnostic log files
    #[arg(long, value_name = "DIR", help = "Also write diagnostics to daily log files in DIR")]
    log_file: Option<PathBuf>,

    /// Never open a display surface
    #[arg(long, help = "Run without a display")]
    headless: bool,

    /// Stop on 'q' or Esc
    #[arg(long, help = "Listen for 'q' or Esc on the terminal to stop")]
    keyboard: bool,

    /// Record clips regardless of the configuration file
    #[arg(long, help = "Enable recording on detection")]
    record: bool,

    /// Replay a generated scene instead of opening the camera
    #[arg(long, value_name = "FRAMES", help = "Run on FRAMES generated frames instead of the camera")]
    synthetic: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("# Wardcam Configuration File");
        println!("# This is the default configuration with all available options");
        println!();
        print!("{}", WardcamConfig::default().to_toml()?);
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting wardcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match WardcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.record {
        config.recording.enabled = true;
    }

    let token = CancellationToken::new();
    install_signal_handlers(token.clone());
    let keyboard = args.keyboard.then(|| spawn_quit_listener(token.clone()));

    let mut builder = Monitor::builder(config.clone()).headless(args.headless);
    if let Some(frames) = args.synthetic {
        let (width, height) = config.camera.resolution;
        let period = Duration::from_millis(1000 / config.camera.fps.max(1) as u64);
        let source = SyntheticFrameSource::moving_block(width, height, frames)
            .with_period(period)
            .paced(true)
            .cancel_when_exhausted(token.clone());
        builder = builder.with_frame_source(Box::new(source));
    }

    let exit_code = match builder.build() {
        Ok(mut monitor) => {
            let status = monitor.run(token.clone()).await;
            info!(
                "wardcam exited with code {} ({})",
                status.code(),
                monitor.stats()
            );
            status.code()
        }
        Err(e) => {
            error!("Failed to start monitor: {}", e);
            1
        }
    };

    token.cancel();
    if let Some(listener) = keyboard {
        let _ = listener.await;
    }

    drop(log_guard);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wardcam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_file {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "wardcam.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}
