//! The fixed-round reallocation loop.
//!
//! Each round alternates two parallel phases over the same alignment arena:
//! a density pass partitioned by chromosome (inside [`AllocationTable`]) that
//! leaves every multi-read alignment holding its raw window density, and a
//! normalization pass partitioned by read that turns those densities back
//! into per-read fractions.

use crate::alignment::{AlignmentRecord, AlignmentSet};
use crate::config::AllocationConfig;
use crate::prior::Prior;
use crate::reference::ReferenceTable;
use crate::table::AllocationTable;
use crate::types::Pos;
use anyhow::{anyhow, Result};
use std::ops::Range;
use std::thread;

/// Progress of a finished run.
#[derive(Debug, Clone, Default)]
pub struct AllocationSummary {
    pub unique_reads: usize,
    pub multi_reads: usize,
    /// Largest per-coordinate density change of each round, in order.
    pub round_deltas: Vec<f64>,
}

impl AllocationSummary {
    pub fn final_delta(&self) -> Option<f64> {
        self.round_deltas.last().copied()
    }
}

pub struct Allocator<'a> {
    alignments: &'a AlignmentSet,
    config: AllocationConfig,
    table: AllocationTable,
    // Multi-read groups handled by each worker during normalization.
    read_partitions: Vec<Vec<Range<usize>>>,
    unique_reads: usize,
}

impl<'a> Allocator<'a> {
    /// Seed every alignment weight, split multi reads across workers and
    /// build the density tables. The prior file named in `config` is loaded
    /// here.
    pub fn new(
        alignments: &'a AlignmentSet,
        references: &ReferenceTable,
        config: AllocationConfig,
    ) -> Result<Self> {
        let prior = config.prior.as_deref().map(Prior::load).transpose()?;
        Self::with_prior(alignments, references, config, prior.as_ref())
    }

    /// Like [`Allocator::new`], with prior information supplied directly.
    pub fn with_prior(
        alignments: &'a AlignmentSet,
        references: &ReferenceTable,
        config: AllocationConfig,
        prior: Option<&Prior>,
    ) -> Result<Self> {
        let threads = config.threads.max(1);
        let records = alignments.records();

        let mut read_partitions: Vec<Vec<Range<usize>>> = Vec::new();
        let mut next_worker = 0;
        let mut unique_reads = 0;
        for group in alignments.groups() {
            if group.len() == 1 {
                records[group.start].set_weight(1.0);
                unique_reads += 1;
                continue;
            }

            for idx in group.clone() {
                let chrom_id = records[idx].chrom_id;
                let length = references.try_length(chrom_id).ok_or_else(|| {
                    anyhow!("alignment {} refers to unknown chromosome id {}", idx, chrom_id)
                })?;
                let overlap = window_overlap(records[idx].pos, config.half_width, length);
                records[idx].set_weight(overlap as f64);
            }
            normalize_group(&records[group.clone()]);

            if read_partitions.len() < threads {
                read_partitions.push(Vec::new());
            }
            read_partitions[next_worker].push(group);
            next_worker = (next_worker + 1) % threads;
        }

        let multi_reads: usize = read_partitions.iter().map(Vec::len).sum();
        let table = AllocationTable::build(
            references,
            alignments,
            config.half_width,
            threads,
            prior,
        )?;
        tracing::info!(
            unique_reads,
            multi_reads,
            alignments = alignments.len(),
            "allocation initialized"
        );

        Ok(Self {
            alignments,
            config,
            table,
            read_partitions,
            unique_reads,
        })
    }

    /// Run the configured number of rounds, leaving final weights in the
    /// alignment set.
    pub fn run(&mut self) -> Result<AllocationSummary> {
        let records = self.alignments.records();
        let rounds = self.config.rounds;
        let mut summary = AllocationSummary {
            unique_reads: self.unique_reads,
            multi_reads: self.read_partitions.iter().map(Vec::len).sum(),
            round_deltas: Vec::with_capacity(rounds),
        };

        self.table.update(records, rounds > 0)?;

        for round in 1..=rounds {
            self.normalize_reads(records)?;
            let max_delta = self.table.update(records, round < rounds)?;
            tracing::info!(round, max_delta, "allocation round finished");
            summary.round_deltas.push(max_delta);
        }

        Ok(summary)
    }

    fn normalize_reads(&self, records: &[AlignmentRecord]) -> Result<()> {
        if self.read_partitions.len() <= 1 {
            for groups in &self.read_partitions {
                normalize_groups(records, groups);
            }
            return Ok(());
        }

        thread::scope(|scope| -> Result<()> {
            let handles: Vec<_> = self
                .read_partitions
                .iter()
                .map(|groups| scope.spawn(move || normalize_groups(records, groups)))
                .collect();
            for (worker, handle) in handles.into_iter().enumerate() {
                handle
                    .join()
                    .map_err(|_| anyhow!("read worker {} panicked", worker))?;
            }
            Ok(())
        })
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// Multi-read groups handled by each normalization worker.
    pub fn read_partitions(&self) -> &[Vec<Range<usize>>] {
        &self.read_partitions
    }
}

/// Length of the density window around `pos` that lies on the chromosome,
/// measured over `(pos - w - 1, pos + w]`.
pub fn window_overlap(pos: Pos, half_width: Pos, length: Pos) -> Pos {
    let lower = (-1).max(pos - half_width - 1);
    let upper = (length - 1).min(pos + half_width);
    (upper - lower).max(0)
}

fn normalize_groups(records: &[AlignmentRecord], groups: &[Range<usize>]) {
    for group in groups {
        normalize_group(&records[group.clone()]);
    }
}

/// Rescale a read's alignment weights to sum to one; a read with no
/// positive weight anywhere is spread uniformly.
fn normalize_group(group: &[AlignmentRecord]) {
    let total: f64 = group.iter().map(AlignmentRecord::weight).sum();
    if total <= 0.0 {
        let uniform = 1.0 / group.len() as f64;
        for record in group {
            record.set_weight(uniform);
        }
        return;
    }
    for record in group {
        record.set_weight(record.weight() / total);
    }
}
