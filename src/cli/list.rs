use anyhow::{Context, Result};
use clap::Args;
use pagewatch_artifact_store::RunSummary;
use tokio::task;

use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct ListArgs {
    /// Maximum number of runs to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

pub async fn cmd_list(args: ListArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let store = ctx.store().await?;
    let mut runs = task::spawn_blocking(move || store.list())
        .await
        .context("store listing task failed")?
        .context("Failed to list runs")?;
    runs.truncate(args.limit);

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&runs)?),
        OutputFormat::Human => print_table(&runs, ctx),
    }
    Ok(())
}

fn print_table(runs: &[RunSummary], ctx: &CliContext) {
    if runs.is_empty() {
        println!("No runs in {}", ctx.config().store.root.display());
        return;
    }
    for run in runs {
        println!(
            "{}  {}  {:<6} {:<24} {}{}",
            run.timestamp.format("%Y-%m-%d %H:%M:%S"),
            run.id,
            if run.passed { "pass" } else { "fail" },
            run.demo_name,
            run.summary,
            if run.has_video { "  [video]" } else { "" }
        );
    }
}
