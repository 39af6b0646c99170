use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use demo_flow::RunOptions;
use pagewatch_core_types::{ExplorationMode, ExplorationPlan};
use tracing::info;

use super::context::CliContext;
use super::output::{print_result, OutputFormat};
use super::plan_file::read_document;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// Skip links whose destination was already visited
    Smart,
    /// Exercise every target
    Exhaustive,
}

impl From<ModeArg> for ExplorationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Smart => ExplorationMode::Smart,
            ModeArg::Exhaustive => ExplorationMode::Exhaustive,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct ExploreArgs {
    /// Exploration plan file (JSON or YAML)
    #[arg(short, long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Override the mode stored in the plan
    #[arg(short, long)]
    pub mode: Option<ModeArg>,

    /// Do not record video
    #[arg(long)]
    pub no_video: bool,

    /// Name stored with the run
    #[arg(short, long)]
    pub name: Option<String>,
}

pub async fn cmd_explore(args: ExploreArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let mut plan: ExplorationPlan = read_document(&args.plan).await?;
    if let Some(mode) = args.mode {
        plan.mode = mode.into();
    }
    info!(
        base = %plan.base_url,
        targets = plan.targets.len(),
        mode = ?plan.mode,
        "Loaded exploration plan"
    );

    let record_video = ctx.config().engine.record_video && !args.no_video;
    let engine = ctx.engine(record_video).await?;
    let mut options = RunOptions::default();
    if !record_video {
        options = options.without_recording();
    }
    if let Some(name) = args.name {
        options = options.with_name(name);
    }

    let result = engine.run_exploration(&plan, options).await;
    print_result(&result, output)?;
    if !result.passed {
        bail!("exploration failed: {}", result.summary);
    }
    Ok(())
}
