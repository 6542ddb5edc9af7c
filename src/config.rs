use crate::types::Pos;
use std::path::PathBuf;

pub const DEFAULT_ROUNDS: usize = 200;

/// Settings consumed by the allocation engine.
#[derive(Debug, Clone)]
pub struct AllocationConfig {
    /// Radius of the density window around each position.
    pub half_width: Pos,
    /// Number of reallocation rounds; 0 keeps the initial weights.
    pub rounds: usize,
    /// Worker threads used for both the density and the reallocation passes.
    pub threads: usize,
    /// Optional prior density file.
    pub prior: Option<PathBuf>,
}

impl AllocationConfig {
    /// Window settings derived from the sequenced fragment length.
    pub fn from_fragment_length(fragment_length: u32) -> Self {
        Self {
            half_width: Pos::from(fragment_length / 2),
            rounds: DEFAULT_ROUNDS,
            threads: 1,
            prior: None,
        }
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_prior(mut self, prior: Option<PathBuf>) -> Self {
        self.prior = prior;
        self
    }
}
