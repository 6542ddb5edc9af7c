//! Reduce a weighted alignment file to at most one alignment per read.

use crate::bam_input::{self, AlignmentUnit};
use crate::cli::{SelectArgs, SelectMode};
use crate::pipeline::WEIGHT_TAG;
use anyhow::{Context, Result};
use noodles::sam::alignment::io::Write as _;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::{bam, sam};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::fs::File;
use std::io::Write;

#[derive(Debug, Default)]
pub struct SelectStats {
    pub reads: u64,
    pub kept: u64,
}

pub fn run(args: &SelectArgs) -> Result<SelectStats> {
    let header = bam_input::read_header(&args.in_bam)?;
    let out_file = File::create(&args.out_bam)
        .with_context(|| format!("failed to create {}", args.out_bam.display()))?;
    let mut writer = bam::io::Writer::new(out_file);
    writer.write_header(&header)?;

    let mut selector = Selector::new(args.mode, args.seed);
    let mut stats = SelectStats::default();
    let mut group: Vec<AlignmentUnit> = Vec::new();
    let mut current_name: Option<String> = None;

    bam_input::read_units(&args.in_bam, |unit| {
        if !unit.is_aligned() {
            return Ok(());
        }
        let name = unit.name();
        if current_name.as_deref() != Some(name.as_str()) {
            flush_group(&mut selector, &mut group, &header, &mut writer, &mut stats)?;
            current_name = Some(name);
        }
        group.push(unit);
        Ok(())
    })?;
    flush_group(&mut selector, &mut group, &header, &mut writer, &mut stats)?;

    tracing::info!(reads = stats.reads, kept = stats.kept, "selection finished");
    Ok(stats)
}

/// Write the chosen unit of one read, without its `ZW` tag, and empty
/// `group`.
fn flush_group<W: Write>(
    selector: &mut Selector,
    group: &mut Vec<AlignmentUnit>,
    header: &sam::Header,
    writer: &mut bam::io::Writer<W>,
    stats: &mut SelectStats,
) -> Result<()> {
    if group.is_empty() {
        return Ok(());
    }
    stats.reads += 1;
    let weights: Vec<f64> = group.iter().map(unit_weight).collect();
    if let Some(chosen) = selector.choose(&weights) {
        let unit = group.swap_remove(chosen);
        for mut record in unit.into_records() {
            record.data_mut().remove(&WEIGHT_TAG);
            writer.write_alignment_record(header, &record)?;
        }
        stats.kept += 1;
    }
    group.clear();
    Ok(())
}

/// The unit's `ZW` weight; 1.0 when the tag is absent.
fn unit_weight(unit: &AlignmentUnit) -> f64 {
    let data = unit.lead().data();
    match data.get(&WEIGHT_TAG) {
        Some(Value::Float(w)) => f64::from(*w),
        Some(value) => value.as_int().map_or(1.0, |w| w as f64),
        None => 1.0,
    }
}

/// Picks which alignment of a read to keep.
#[derive(Debug)]
pub struct Selector {
    mode: SelectMode,
    rng: Xoshiro256StarStar,
}

impl Selector {
    pub fn new(mode: SelectMode, seed: u64) -> Self {
        Self {
            mode,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
        }
    }

    /// Index of the alignment to keep among a read's `weights`, if any.
    pub fn choose(&mut self, weights: &[f64]) -> Option<usize> {
        match self.mode {
            SelectMode::Unique => (weights.len() == 1).then_some(0),
            SelectMode::Sample => self.sample(weights),
        }
    }

    fn sample(&mut self, weights: &[f64]) -> Option<usize> {
        match weights.len() {
            0 => return None,
            1 => return Some(0),
            _ => {}
        }

        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        for &w in weights {
            total += w.max(0.0);
            cumulative.push(total);
        }
        if total <= 0.0 {
            return Some(self.rng.gen_range(0..weights.len()));
        }

        let target = self.rng.r#gen::<f64>() * total;
        let idx = cumulative.partition_point(|&c| c <= target);
        Some(idx.min(weights.len() - 1))
    }
}
