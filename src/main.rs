use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    pagewatch_cli::cli::app::run().await
}
