use clap::Parser;
use strato::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.run().await.map_err(anyhow::Error::new)
}
