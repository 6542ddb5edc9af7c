use anyhow::Result;
use clap::Parser;
use csem_rs::cli::{Cli, Command};
use csem_rs::{pipeline, select};
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            if cli.quiet {
                EnvFilter::new("warn")
            } else {
                EnvFilter::new("info")
            }
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Allocate(args) => {
            let stats = pipeline::run(args)?;
            tracing::info!(
                total_records = stats.total_records,
                unaligned_units = stats.unaligned_units,
                reads = stats.reads,
                multi_reads = stats.multi_reads,
                alignments = stats.alignments,
                rounds = stats.rounds,
                final_delta = stats.final_delta,
                "csem-rs: allocation complete"
            );
        }
        Command::Select(args) => {
            let stats = select::run(args)?;
            tracing::info!(
                reads = stats.reads,
                kept = stats.kept,
                "csem-rs: selection complete"
            );
        }
    }
    Ok(())
}
