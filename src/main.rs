mod cli;

use anyhow::{Context, Result};
use asl::config::Config;
use asl::screen::RotationSource;
use asl::service::ScreenshotService;
use asl::stub::{StubDaemon, StubFrame};
use cli::{Cli, Commands};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let mut config = Config::from_env();
    cli.global.apply(&mut config);
    init_logging(&config.log_level);

    match cli.command {
        Commands::Probe => {
            let service = build_service(&cli, config);
            if service.probe_availability().wait().await {
                println!("available");
            } else {
                println!("unavailable");
                std::process::exit(1);
            }
        }
        Commands::Capture { json } => {
            let service = build_service(&cli, config);
            let Some(report) = service.capture_report().wait().await else {
                eprintln!("❌ No screenshot was taken (see log for details)");
                std::process::exit(1);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.path.display());
            }
        }
        Commands::Stub {
            ref addr,
            width,
            height,
            bpp,
            truncate,
        } => {
            let addr = addr.clone().unwrap_or_else(|| config.addr());
            let mut frame = StubFrame::test_pattern(width, height, bpp);
            if let Some(at) = truncate {
                frame = frame.truncated(at);
            }
            StubDaemon::bind(&addr, frame)
                .await
                .with_context(|| format!("Failed to bind stub daemon to {}", addr))?
                .run()
                .await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn build_service(cli: &Cli, config: Config) -> ScreenshotService {
    let rotation = RotationSource::select(Arc::new(cli.global.display()));
    ScreenshotService::new(config, rotation, tokio::runtime::Handle::current())
}

/// Logs go to stderr so stdout only carries command output.
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
