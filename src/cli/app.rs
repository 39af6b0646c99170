use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::commands::Commands;
use super::context::CliContext;
use super::env::CliArgs;
use super::explore::cmd_explore;
use super::list::cmd_list;
use super::run::cmd_run;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let loaded = load_config(cli.config.as_ref()).await?;
    let level = cli
        .log_level
        .clone()
        .or_else(|| loaded.config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level, cli.debug)?;

    info!("Starting pagewatch v{}", env!("CARGO_PKG_VERSION"));
    loaded.log_source();
    let LoadedConfig { config, path, .. } = loaded;
    let ctx = CliContext::new(config, path);

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args, &ctx, cli.output).await,
        Commands::Explore(args) => cmd_explore(args, &ctx, cli.output).await,
        Commands::List(args) => cmd_list(args, &ctx, cli.output).await,
    };
    ctx.shutdown().await;

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
