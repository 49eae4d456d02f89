use clap::{Args, Parser, Subcommand};
use std::str::FromStr;

use asl::config::{expand_path, Config, DepthPolicy};
use asl::screen::{Orientation, Rotation, StaticDisplay};

#[derive(Parser)]
#[command(name = "asl")]
#[command(about = "📸 Screenshots from the native capture daemon", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Capture daemon host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Capture daemon port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Directory screenshots are written to
    #[arg(short, long, global = true)]
    pub dir: Option<String>,

    /// Connect timeout for captures, in milliseconds
    #[arg(long, global = true)]
    pub connect_timeout_ms: Option<u64>,

    /// Connect timeout for availability probes, in milliseconds
    #[arg(long, global = true)]
    pub probe_timeout_ms: Option<u64>,

    /// Reject bit depths other than 16 and 32 instead of reading them as 32-bit
    #[arg(long, global = true)]
    pub strict_depth: bool,

    /// Display rotation in degrees (0, 90, 180, 270)
    #[arg(short, long, global = true)]
    pub rotation: Option<Rotation>,

    /// Display orientation, used when no rotation is given
    #[arg(long, global = true)]
    pub orientation: Option<Orientation>,

    /// Display size as WIDTHxHEIGHT, used when orientation is undefined
    #[arg(long, global = true)]
    pub display_size: Option<DisplaySize>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether the capture daemon is reachable
    Probe,

    /// Take a screenshot and print where it was saved
    Capture {
        /// Print a JSON report instead of the bare path
        #[arg(long)]
        json: bool,
    },

    /// Run a fake capture daemon serving a test pattern
    Stub {
        /// Address to bind to (defaults to the configured daemon address)
        #[arg(short, long)]
        addr: Option<String>,

        #[arg(long, default_value_t = 320)]
        width: u32,

        #[arg(long, default_value_t = 240)]
        height: u32,

        #[arg(long, default_value_t = 32)]
        bpp: u32,

        /// Hang up after this many payload bytes
        #[arg(long)]
        truncate: Option<usize>,
    },

    /// Print the effective configuration
    Config,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl GlobalArgs {
    /// Overlay flags onto a config loaded from the environment.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref host) = self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref dir) = self.dir {
            config.screenshot_dir = expand_path(dir);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = self.probe_timeout_ms {
            config.probe_timeout_ms = ms;
        }
        if self.strict_depth {
            config.depth_policy = DepthPolicy::Strict;
        }
        if let Some(ref level) = self.log_level {
            config.log_level = level.clone();
        }
    }

    pub fn display(&self) -> StaticDisplay {
        StaticDisplay {
            rotation: self.rotation,
            orientation: self.orientation.unwrap_or_default(),
            size: self.display_size.map(|s| (s.width, s.height)).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl FromStr for DisplaySize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid dimension '{}'", v))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}
