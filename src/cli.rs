use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "csem-rs",
    about = "Allocate multi-mapped reads by local read density",
    version
)]
pub struct Cli {
    /// Suppress progress messages and set logging level to WARN
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Weight every alignment and write the weights back as ZW tags
    Allocate(AllocateArgs),
    /// Reduce a weighted BAM to one alignment per read
    Select(SelectArgs),
}

#[derive(clap::Args, Debug)]
pub struct AllocateArgs {
    /// Input BAM or SAM, grouped by read name
    pub in_bam: PathBuf,

    /// Output name; weights are written to <NAME>.bam
    #[arg(short = 'o', long = "out", value_name = "NAME")]
    pub out_name: PathBuf,

    /// Fragment length; the density window spans half of it on each side
    #[arg(short = 'f', long = "fragment-length", value_name = "LEN")]
    pub fragment_length: u32,

    /// Number of reallocation rounds
    #[arg(short = 'r', long = "rounds", default_value_t = crate::config::DEFAULT_ROUNDS)]
    pub rounds: usize,

    /// Number of threads (CPUs) to use
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// Place each alignment at the midpoint of its fragment
    #[arg(long)]
    pub extend_reads: bool,

    /// Prior density file
    #[arg(long, value_name = "FILE")]
    pub prior: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectMode {
    /// Keep only reads with a single alignment
    Unique,
    /// Keep one alignment per read, drawn by its weight
    Sample,
}

#[derive(clap::Args, Debug)]
pub struct SelectArgs {
    /// Weighted BAM produced by `allocate` (SAM is accepted too)
    pub in_bam: PathBuf,

    /// Output BAM path
    #[arg(short = 'o', long = "out", value_name = "BAM")]
    pub out_bam: PathBuf,

    #[arg(short = 'm', long, value_enum, default_value_t = SelectMode::Sample)]
    pub mode: SelectMode,

    /// Seed for sampling
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}
