use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use showroom_podcast::cli::{Args, EXIT_INTERRUPTED};
use showroom_podcast::{AppConfig, Dependencies, Error, ShowroomPodcast, logging};
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<Error>().is_some_and(Error::is_interrupt) => {
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let (config, warnings) = AppConfig::load(&args.file)
        .with_context(|| format!("failed to load configuration from {}", args.file.display()))?;

    let _log_guard = logging::init_logging(config.log_dir.as_deref())
        .context("failed to initialise logging")?;
    for warning in &warnings {
        warning.log();
    }

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        rooms = ?config.list_room_id,
        "showroom-podcast starting"
    );

    let deps = Dependencies::from_config(&config).context("failed to set up clients")?;
    let app = ShowroomPodcast::new(&config, deps);
    app.run().await?;
    Ok(())
}
