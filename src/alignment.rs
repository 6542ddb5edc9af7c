use crate::types::{ChromId, Pos};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn as_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// An `f64` that can be rewritten through a shared reference.
///
/// Weights are written by whichever worker owns the record under the active
/// partition (by chromosome during the density pass, by read group during
/// normalization). Partitions are disjoint and phases are separated by a
/// thread join, so relaxed ordering is enough.
#[derive(Debug, Default)]
pub struct Weight(AtomicU64);

impl Weight {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// One reported location of a read.
///
/// `pos` is a 0-based coordinate and may fall outside the chromosome (read
/// extension can push it past either end).
#[derive(Debug)]
pub struct AlignmentRecord {
    pub chrom_id: ChromId,
    pub pos: Pos,
    pub strand: Strand,
    pub is_multi: bool,
    weight: Weight,
}

impl AlignmentRecord {
    pub fn new(chrom_id: ChromId, pos: Pos, strand: Strand) -> Self {
        Self {
            chrom_id,
            pos,
            strand,
            is_multi: false,
            weight: Weight::default(),
        }
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight.get()
    }

    #[inline]
    pub fn set_weight(&self, value: f64) {
        self.weight.set(value);
    }
}

/// Every alignment of the run, stored once, grouped by originating read.
///
/// Groups are contiguous and kept in input order; everything else refers to
/// alignments by their index here.
#[derive(Debug)]
pub struct AlignmentSet {
    records: Vec<AlignmentRecord>,
    group_starts: Vec<usize>,
}

impl Default for AlignmentSet {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentSet {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            group_starts: vec![0],
        }
    }

    /// Append the alignment to the current read group. Once a group holds
    /// more than one alignment, all of its members are flagged multi.
    ///
    /// Panics if no group was opened with [`AlignmentSet::start_group`].
    pub fn push(&mut self, mut record: AlignmentRecord) {
        assert!(
            self.group_starts.len() > 1,
            "alignment pushed before any read group was started"
        );
        let last = self.group_starts.len() - 1;
        let start = self.group_starts[last - 1];
        let size = self.records.len() - start + 1;
        if size == 2 {
            self.records[start].is_multi = true;
        }
        record.is_multi = size > 1;
        self.records.push(record);
        self.group_starts[last] = self.records.len();
    }

    pub fn start_group(&mut self) {
        // Drop a group that never received an alignment.
        if self.group_starts.len() > 1 && self.current_group_is_empty() {
            return;
        }
        self.group_starts.push(self.records.len());
    }

    /// Convenience for building a whole read group at once.
    pub fn push_group<I>(&mut self, alignments: I)
    where
        I: IntoIterator<Item = AlignmentRecord>,
    {
        self.start_group();
        for record in alignments {
            self.push(record);
        }
    }

    fn current_group_is_empty(&self) -> bool {
        let n = self.group_starts.len();
        self.group_starts[n - 1] == self.group_starts[n - 2]
    }

    pub fn records(&self) -> &[AlignmentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn num_groups(&self) -> usize {
        let n = self.group_starts.len() - 1;
        if n > 0 && self.current_group_is_empty() {
            n - 1
        } else {
            n
        }
    }

    pub fn group(&self, read: usize) -> Range<usize> {
        self.group_starts[read]..self.group_starts[read + 1]
    }

    pub fn groups(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.num_groups()).map(|read| self.group(read))
    }

    /// Final weights in ingestion order.
    pub fn weights(&self) -> Vec<f64> {
        self.records.iter().map(AlignmentRecord::weight).collect()
    }
}
