//! Per-chromosome density model.
//!
//! Only positions hit by at least one multi-read alignment matter: they are
//! discretized into `coords`, and every table below is indexed by them. The
//! density at a coordinate is `baseline + current`, where the baseline holds
//! unique reads and prior information and never changes after set-up, and
//! `current` is the multi-read weight aggregated during the latest update.

use crate::alignment::AlignmentRecord;
use crate::prior::PriorSegment;
use crate::scan::{RangeSumScanner, ScanMode};
use crate::types::Pos;
use anyhow::{bail, Result};

#[derive(Debug)]
pub struct ChromosomeModel {
    half_width: Pos,
    length: Pos,

    // Alignment indices; `multi` is sorted by position after `initialize`.
    multi: Vec<usize>,
    unique: Vec<usize>,

    coords: Vec<Pos>,
    offset: Option<usize>,

    // Run sequence over in-range coordinates and the live multi-read weight
    // at each of them, both indexed by `coordinate index - offset`.
    run_lengths: Vec<Pos>,
    current: Vec<f64>,

    base_window_sums: Vec<f64>,
    base_point_values: Vec<f64>,
    // Set once a prior contributes negative density.
    negative_baseline: bool,

    max_delta: f64,
}

impl ChromosomeModel {
    pub fn new(half_width: Pos, length: Pos) -> Self {
        Self {
            half_width,
            length,
            multi: Vec::new(),
            unique: Vec::new(),
            coords: Vec::new(),
            offset: None,
            run_lengths: Vec::new(),
            current: Vec::new(),
            base_window_sums: Vec::new(),
            base_point_values: Vec::new(),
            negative_baseline: false,
            max_delta: 0.0,
        }
    }

    pub fn add_alignment(&mut self, index: usize, is_multi: bool) {
        if is_multi {
            self.multi.push(index);
        } else {
            self.unique.push(index);
        }
    }

    #[inline]
    fn in_range(&self, pos: Pos) -> bool {
        pos >= 0 && pos < self.length
    }

    /// Discretize multi-read positions and build the baseline tables from
    /// the unique reads.
    pub fn initialize(&mut self, records: &[AlignmentRecord]) {
        self.multi.sort_by_key(|&i| records[i].pos);

        self.coords.clear();
        self.run_lengths.clear();
        self.offset = None;
        let mut prev: Pos = -1;
        for (k, &idx) in self.multi.iter().enumerate() {
            let pos = records[idx].pos;
            let last_of_run = self
                .multi
                .get(k + 1)
                .is_none_or(|&next| records[next].pos != pos);
            if !last_of_run {
                continue;
            }
            if self.in_range(pos) {
                if self.offset.is_none() {
                    self.offset = Some(self.coords.len());
                }
                debug_assert!(prev < pos);
                self.run_lengths.push(pos - prev);
                prev = pos;
            }
            self.coords.push(pos);
        }
        self.current = vec![0.0; self.run_lengths.len()];

        self.unique.sort_by_key(|&i| records[i].pos);
        let mut lengths: Vec<Pos> = Vec::new();
        let mut masses: Vec<f64> = Vec::new();
        let mut last: Pos = -1;
        for &idx in &self.unique {
            let pos = records[idx].pos;
            if pos < 0 {
                continue;
            }
            if pos >= self.length {
                break;
            }
            if last < pos {
                lengths.push(pos - last);
                masses.push(0.0);
                last = pos;
            }
            if let Some(mass) = masses.last_mut() {
                *mass += records[idx].weight();
            }
        }

        self.base_window_sums = vec![0.0; self.coords.len()];
        self.base_point_values = vec![0.0; self.coords.len()];
        self.add_to_baseline(ScanMode::EndValue, &lengths, &masses);
    }

    /// Add prior density to the baseline tables.
    ///
    /// `segments` must cover the chromosome exactly.
    pub fn incorporate_prior(
        &mut self,
        segments: &[PriorSegment],
        group_values: &[f64],
    ) -> Result<()> {
        let mut lengths = Vec::with_capacity(segments.len());
        let mut values = Vec::with_capacity(segments.len());
        let mut covered: Pos = 0;
        for segment in segments {
            let Some(&value) = group_values.get(segment.group) else {
                bail!(
                    "prior group {} out of range ({} groups)",
                    segment.group,
                    group_values.len()
                );
            };
            lengths.push(segment.length);
            values.push(value);
            covered += segment.length;
        }
        if covered != self.length {
            bail!(
                "prior segments cover {} bases but the chromosome has {}",
                covered,
                self.length
            );
        }

        self.negative_baseline |= values.iter().any(|&v| v < 0.0);
        self.add_to_baseline(ScanMode::Rate, &lengths, &values);
        Ok(())
    }

    fn add_to_baseline(&mut self, mode: ScanMode, lengths: &[Pos], values: &[f64]) {
        let mut left = RangeSumScanner::new(mode, lengths, values);
        let mut right = RangeSumScanner::new(mode, lengths, values);
        let mut point = RangeSumScanner::new(mode, lengths, values);

        for (i, &coord) in self.coords.iter().enumerate() {
            self.base_window_sums[i] += right.sum_through(coord + self.half_width)
                - left.sum_through(coord - self.half_width - 1);
            if coord >= 0 && coord < self.length {
                self.base_point_values[i] += point.value_at(coord);
            }
        }
    }

    /// Re-aggregate multi-read weight per coordinate and, when
    /// `recompute_weights` is set, overwrite every multi-read alignment's
    /// weight with its (unnormalized) window density.
    ///
    /// Returns the largest absolute change of any coordinate's aggregate.
    pub fn update(&mut self, records: &[AlignmentRecord], recompute_weights: bool) -> f64 {
        self.max_delta = 0.0;

        if let Some(offset) = self.offset {
            let mut k = offset;
            let mut value = 0.0;
            for j in 0..self.multi.len() {
                let idx = self.multi[j];
                let pos = records[idx].pos;
                if pos < 0 {
                    continue;
                }
                if pos >= self.length {
                    break;
                }
                if pos > self.coords[k] {
                    self.commit(k, offset, value);
                    k += 1;
                    value = 0.0;
                }
                value += records[idx].weight();
            }
            assert!(
                k < self.coords.len() && self.in_range(self.coords[k]),
                "coordinate {k} is not an in-range multi-read position"
            );
            self.commit(k, offset, value);
        }

        if !recompute_weights {
            return self.max_delta;
        }

        let mut left = RangeSumScanner::new(ScanMode::EndValue, &self.run_lengths, &self.current);
        let mut right = RangeSumScanner::new(ScanMode::EndValue, &self.run_lengths, &self.current);

        let mut k: Option<usize> = None;
        let mut value = 0.0;
        for &idx in &self.multi {
            let pos = records[idx].pos;
            if k.is_none_or(|k| pos > self.coords[k]) {
                let next = k.map_or(0, |k| k + 1);
                assert!(
                    next < self.coords.len() && self.coords[next] == pos,
                    "no discretized coordinate for alignment at {pos}"
                );
                k = Some(next);
                let coord = self.coords[next];
                let window = right.sum_through(coord + self.half_width)
                    - left.sum_through(coord - self.half_width - 1);
                let density = self.base_window_sums[next] + window;
                // Only a negative prior can pull a window below zero.
                debug_assert!(
                    self.negative_baseline || density > -1e-9,
                    "negative window density {density} at {pos}"
                );
                value = density.max(0.0);
            }
            records[idx].set_weight(value);
        }

        self.max_delta
    }

    fn commit(&mut self, k: usize, offset: usize, mut value: f64) {
        let floor = self.base_point_values[k];
        if value + floor < 0.0 {
            value = -floor;
        }
        let slot = &mut self.current[k - offset];
        self.max_delta = self.max_delta.max((*slot - value).abs());
        *slot = value;
    }

    pub fn multi_count(&self) -> usize {
        self.multi.len()
    }

    pub fn max_delta(&self) -> f64 {
        self.max_delta
    }

    pub fn length(&self) -> Pos {
        self.length
    }

    pub fn coordinates(&self) -> &[Pos] {
        &self.coords
    }

    /// Index of the first coordinate inside the chromosome, if any.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn baseline_window_sums(&self) -> &[f64] {
        &self.base_window_sums
    }

    pub fn baseline_point_values(&self) -> &[f64] {
        &self.base_point_values
    }

    /// Aggregated multi-read weight at each in-range coordinate.
    pub fn current_values(&self) -> &[f64] {
        &self.current
    }
}
