use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mecanum_drive_core::config::{DEFAULT_BAUDRATE, DEFAULT_PORT, DriveConfig};
use mecanum_drive_core::runtime::{self, LinkSource, RunOptions};

/// Mecanum drive control core: joystick frames in, ramped wheel commands out
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial port the joystick frames arrive on
    #[arg(long, default_value = DEFAULT_PORT)]
    port: String,

    /// Serial baudrate
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    baud: u32,

    /// Read frames from stdin instead of a serial port (replies go to stdout)
    #[arg(long, conflicts_with = "port")]
    stdin: bool,

    /// JSON file overriding the drive configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not open a zenoh session; run the control loop only
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug); stdout is kept for link replies
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match DriveConfig::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(2);
            }
        },
        None => DriveConfig::default(),
    };

    let link = if args.stdin {
        LinkSource::Stdio
    } else {
        LinkSource::Serial {
            port: args.port,
            baudrate: args.baud,
        }
    };

    let options = RunOptions {
        link,
        config,
        telemetry: !args.offline,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
