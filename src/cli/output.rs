use anyhow::Result;
use clap::ValueEnum;
use pagewatch_core_types::DemoResult;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

pub fn print_result(result: &DemoResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Human => {
            let status = if result.passed { "PASSED" } else { "FAILED" };
            println!("{status}  {}  ({} ms)", result.summary, result.duration);
            for step in result.failed_steps() {
                println!(
                    "  step {:>3} {:<14} {}: {}",
                    step.step_number,
                    step.action,
                    step.description,
                    step.error.as_deref().unwrap_or("failed")
                );
            }
            if let Some(video) = &result.video_metadata {
                println!(
                    "  video {} ({} bytes, {}, {} ms)",
                    video.filename, video.file_size, video.resolution, video.duration
                );
            }
        }
    }
    Ok(())
}
