//! Loopback entry point.
//!
//! Usage: `bandbridge-loopback [--config PATH] FILE`

mod app;
mod config;
mod receiver;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use bandbridge_ebook::TransferState;

struct Args {
    config: Option<PathBuf>,
    file: PathBuf,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut config = None;
        let mut file = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
                    config = Some(PathBuf::from(path));
                }
                _ if file.is_none() => file = Some(PathBuf::from(arg)),
                _ => anyhow::bail!("unexpected argument: {arg}"),
            }
        }

        let file = file.ok_or_else(|| anyhow::anyhow!("usage: bandbridge-loopback [--config PATH] FILE"))?;
        Ok(Self { config, file })
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting loopback transfer");

    let config = match &args.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    tracing::info!(app_id = %config.session.app_id, chunk_size = config.session.chunk_size, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let state = rt.block_on(app::run(config, &args.file))?;

    tracing::info!(%state, "loopback finished");
    if state != TransferState::Completed {
        std::process::exit(1);
    }
    Ok(())
}
