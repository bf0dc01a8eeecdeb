use anyhow::Result;
use bulk_order_dispatch::cli;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Log verbosity is controlled via RUST_LOG; default to warnings so the
    // CLI's own output stays readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    cli::run(args).await
}
