use crate::alignment::{AlignmentRecord, AlignmentSet};
use crate::chromosome::ChromosomeModel;
use crate::prior::Prior;
use crate::reference::ReferenceTable;
use crate::types::{ChromId, Pos};
use anyhow::{anyhow, Context, Result};
use std::ops::Range;
use std::thread;

/// All chromosome models plus the static assignment of chromosomes to workers.
#[derive(Debug)]
pub struct AllocationTable {
    chromosomes: Vec<ChromosomeModel>,
    assignments: Vec<Range<usize>>,
    max_delta: f64,
}

impl AllocationTable {
    /// Build one model per reference sequence, feed it the alignments that
    /// land on it and apply the prior, if any.
    ///
    /// Alignment weights must already hold their starting values: unique
    /// read weights are folded into the baseline here.
    pub fn build(
        references: &ReferenceTable,
        alignments: &AlignmentSet,
        half_width: Pos,
        threads: usize,
        prior: Option<&Prior>,
    ) -> Result<Self> {
        let mut chromosomes: Vec<ChromosomeModel> = (0..references.len())
            .map(|id| ChromosomeModel::new(half_width, references.length(id as ChromId)))
            .collect();

        let records = alignments.records();
        for (idx, record) in records.iter().enumerate() {
            let model = chromosomes.get_mut(record.chrom_id as usize).ok_or_else(|| {
                anyhow!(
                    "alignment {} refers to chromosome id {} but only {} are known",
                    idx,
                    record.chrom_id,
                    references.len()
                )
            })?;
            model.add_alignment(idx, record.is_multi);
        }
        for model in chromosomes.iter_mut() {
            model.initialize(records);
        }
        tracing::debug!(chromosomes = chromosomes.len(), "discretization finished");

        if let Some(prior) = prior {
            for (name, segments) in &prior.chromosomes {
                let id = references
                    .id(name)
                    .ok_or_else(|| anyhow!("prior names unknown chromosome '{}'", name))?;
                chromosomes[id as usize]
                    .incorporate_prior(segments, &prior.group_values)
                    .with_context(|| format!("invalid prior for chromosome '{}'", name))?;
            }
            tracing::info!(
                groups = prior.group_values.len(),
                chromosomes = prior.chromosomes.len(),
                "prior information applied"
            );
        }

        let loads: Vec<usize> = chromosomes.iter().map(ChromosomeModel::multi_count).collect();
        let assignments = partition_chromosomes(&loads, threads);
        tracing::debug!(
            workers = assignments.iter().filter(|r| !r.is_empty()).count(),
            "chromosomes assigned to workers"
        );

        Ok(Self {
            chromosomes,
            assignments,
            max_delta: 0.0,
        })
    }

    /// Run one density update over every chromosome, each worker handling
    /// its own chromosomes. Returns once every worker has finished.
    pub fn update(&mut self, records: &[AlignmentRecord], recompute_weights: bool) -> Result<f64> {
        let mut rest: &mut [ChromosomeModel] = &mut self.chromosomes;
        let mut parts: Vec<&mut [ChromosomeModel]> = Vec::with_capacity(self.assignments.len());
        for range in &self.assignments {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            if !head.is_empty() {
                parts.push(head);
            }
            rest = tail;
        }

        if parts.len() <= 1 {
            for part in parts {
                update_chromosomes(part, records, recompute_weights);
            }
        } else {
            thread::scope(|scope| -> Result<()> {
                let handles: Vec<_> = parts
                    .into_iter()
                    .map(|part| {
                        scope.spawn(move || update_chromosomes(part, records, recompute_weights))
                    })
                    .collect();
                for (worker, handle) in handles.into_iter().enumerate() {
                    handle
                        .join()
                        .map_err(|_| anyhow!("chromosome worker {} panicked", worker))?;
                }
                Ok(())
            })?;
        }

        self.max_delta = self
            .chromosomes
            .iter()
            .map(ChromosomeModel::max_delta)
            .fold(0.0, f64::max);
        Ok(self.max_delta)
    }

    pub fn max_delta(&self) -> f64 {
        self.max_delta
    }

    pub fn chromosomes(&self) -> &[ChromosomeModel] {
        &self.chromosomes
    }

    pub fn chromosome(&self, id: ChromId) -> &ChromosomeModel {
        &self.chromosomes[id as usize]
    }

    /// Chromosome id range handled by each worker.
    pub fn assignments(&self) -> &[Range<usize>] {
        &self.assignments
    }
}

fn update_chromosomes(part: &mut [ChromosomeModel], records: &[AlignmentRecord], recompute: bool) {
    for model in part.iter_mut() {
        model.update(records, recompute);
    }
}

/// Split chromosomes `0..loads.len()` into `threads` contiguous ranges with
/// roughly equal total load.
///
/// Walking left to right, a worker is closed once its load reaches the
/// average, or as soon as the workers left would otherwise outnumber the
/// chromosomes left. The last worker takes whatever remains. Workers that
/// get nothing receive an empty range at the end.
pub fn partition_chromosomes(loads: &[usize], threads: usize) -> Vec<Range<usize>> {
    let threads = threads.max(1);
    let m = loads.len();
    let average = loads.iter().sum::<usize>() / threads;

    let mut ranges = Vec::with_capacity(threads);
    let mut start = 0;
    let mut load = 0;
    for (i, &chrom_load) in loads.iter().enumerate() {
        load += chrom_load;
        let worker = ranges.len();
        if worker + 1 < threads
            && i + 1 < m
            && (load >= average || threads - worker - 1 >= m - i - 1)
        {
            ranges.push(start..i + 1);
            start = i + 1;
            load = 0;
        }
    }
    ranges.push(start..m);
    ranges.resize(threads, m..m);
    ranges
}
