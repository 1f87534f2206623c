mod commands;

use anyhow::{Context, Result};
use banking_core::Dispatcher;
use clap::Parser;
use commands::Args;

fn main() -> Result<()> {
    // Parse the CLI arguments
    let args = Args::parse();

    // Initialize logger with default level of info (can be overridden with RUST_LOG)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 1. Initialize the Dispatcher
    let mut dispatcher = Dispatcher::new();

    // 2. Open and process the input file
    log::info!("Processing operations from {}", args.input_file.display());
    let file = std::fs::File::open(&args.input_file)
        .with_context(|| format!("Failed to open input file: {}", args.input_file.display()))?;

    dispatcher
        .process_operations(file)
        .context("Failed to process operations")?;

    log::info!(
        "Processing complete, exporting {} accounts",
        dispatcher.account_count()
    );

    // 3. Export the accounts to stdout
    dispatcher
        .export_accounts(std::io::stdout())
        .context("Failed to export accounts to stdout")?;

    // 4. Optionally export the transfer journal
    if let Some(path) = &args.transfers {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create transfers file: {}", path.display()))?;
        dispatcher
            .export_transfers(file)
            .context("Failed to export transfers")?;
    }

    log::info!("Export complete");

    Ok(())
}
