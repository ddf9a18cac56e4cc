use clap::{Parser, Subcommand};
use std::path::PathBuf;

use streamcast::engine::types::{Protocol, Resolution};

#[derive(Parser)]
#[command(name = "streamcast")]
#[command(about = "Hardware-adaptive V4L2 camera streamer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Capture device (overrides config)
    #[arg(long, value_name = "PATH")]
    pub device: Option<PathBuf>,

    /// Capture pixel format, FourCC name like UYVY (overrides config)
    #[arg(long, value_name = "FOURCC")]
    pub format: Option<String>,

    /// Capture resolution as WIDTHxHEIGHT (overrides config)
    #[arg(long, value_name = "WxH")]
    pub resolution: Option<Resolution>,

    /// Delivery protocol (overrides config)
    #[arg(long, value_enum)]
    pub protocol: Option<Protocol>,

    /// Server host (overrides config)
    #[arg(long, value_name = "HOST")]
    pub server: Option<String>,

    /// Server port; defaults to the protocol's conventional port
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Stream path for RTMP routing (overrides config)
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Encoder bitrate in kbit/s (overrides config)
    #[arg(long, value_name = "KBPS")]
    pub bitrate: Option<u32>,

    /// Per-encoder verification deadline in milliseconds
    #[arg(long, value_name = "MS")]
    pub verify_timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List capture devices and the formats they report
    Devices {
        /// Emit machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Discover and verify encoders, then report the selection
    Discover {
        /// Emit machine-readable JSON instead of a report
        #[arg(long)]
        json: bool,
    },

    /// Compile and print the pipeline without launching the engine
    DryRun,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
