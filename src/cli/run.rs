use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use demo_flow::RunOptions;
use pagewatch_core_types::TestPlan;
use tracing::info;

use super::context::CliContext;
use super::output::{print_result, OutputFormat};
use super::plan_file::read_document;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Plan file (JSON or YAML)
    #[arg(short, long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Do not record video
    #[arg(long)]
    pub no_video: bool,

    /// Name stored with the run (defaults to the plan name)
    #[arg(short, long)]
    pub name: Option<String>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let plan: TestPlan = read_document(&args.plan).await?;
    info!(plan = %plan.id, steps = plan.steps.len(), "Loaded plan");

    let record_video = ctx.config().engine.record_video && !args.no_video;
    let engine = ctx.engine(record_video).await?;
    let mut options = RunOptions::default();
    if !record_video {
        options = options.without_recording();
    }
    if let Some(name) = args.name {
        options = options.with_name(name);
    }

    let result = engine.run_plan(&plan, options).await;
    print_result(&result, output)?;
    if !result.passed {
        bail!("run failed: {}", result.summary);
    }
    Ok(())
}
