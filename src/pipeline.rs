use crate::allocate::Allocator;
use crate::bam_input;
use crate::cli::AllocateArgs;
use crate::config::AllocationConfig;
use anyhow::{anyhow, bail, Context, Result};
use noodles::{bam, sam};
use sam::alignment::io::Write as _;
use sam::alignment::record::data::field::Tag;
use sam::alignment::record::MappingQuality;
use sam::alignment::record_buf::data::field::Value;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Tag carrying an alignment's allocated weight.
pub const WEIGHT_TAG: Tag = Tag::new(b'Z', b'W');

#[derive(Debug, Default)]
pub struct Stats {
    pub total_records: u64,
    pub unaligned_units: u64,
    pub reads: u64,
    pub multi_reads: u64,
    pub alignments: u64,
    pub rounds: usize,
    pub final_delta: f64,
}

pub fn run(args: &AllocateArgs) -> Result<Stats> {
    let extend = args.extend_reads.then_some(args.fragment_length);
    let loaded = bam_input::load_alignments(&args.in_bam, extend)?;

    let config = AllocationConfig::from_fragment_length(args.fragment_length)
        .with_rounds(args.rounds)
        .with_threads(args.threads)
        .with_prior(args.prior.clone());

    let summary = {
        let mut allocator = Allocator::new(&loaded.alignments, &loaded.references, config)?;
        allocator.run()?
    };

    let out_path = output_path(&args.out_name);
    write_weights(&args.in_bam, &out_path, &loaded.header, &loaded.alignments.weights())?;
    tracing::info!(path = %out_path.display(), "weights written");

    Ok(Stats {
        total_records: loaded.records,
        unaligned_units: loaded.unaligned,
        reads: loaded.alignments.num_groups() as u64,
        multi_reads: summary.multi_reads as u64,
        alignments: loaded.alignments.len() as u64,
        rounds: summary.round_deltas.len(),
        final_delta: summary.final_delta().unwrap_or(0.0),
    })
}

/// `<name>.bam`, keeping any directory part of `name`.
pub fn output_path(name: &Path) -> PathBuf {
    let mut path = name.as_os_str().to_owned();
    path.push(".bam");
    PathBuf::from(path)
}

/// Copy `input` to a BAM at `output`, tagging every aligned unit with its weight.
///
/// `weights` lists one weight per aligned unit in file order, as produced by
/// [`bam_input::load_alignments`].
pub fn write_weights(input: &Path, output: &Path, header: &sam::Header, weights: &[f64]) -> Result<()> {
    let out_file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = bam::io::Writer::new(out_file);
    writer.write_header(header)?;

    let mut next = 0usize;
    bam_input::read_units(input, |unit| {
        if !unit.is_aligned() {
            for record in unit.records() {
                writer.write_alignment_record(header, record)?;
            }
            return Ok(());
        }

        let weight = *weights
            .get(next)
            .ok_or_else(|| anyhow!("input has more aligned reads than allocated weights"))?
            as f32;
        next += 1;
        let mapq = MappingQuality::new(weight_to_mapq(weight));
        for mut record in unit.into_records() {
            *record.mapping_quality_mut() = mapq;
            record.data_mut().insert(WEIGHT_TAG, Value::Float(weight));
            writer.write_alignment_record(header, &record)?;
        }
        Ok(())
    })?;

    if next != weights.len() {
        bail!(
            "input changed while writing: {} aligned reads for {} weights",
            next,
            weights.len()
        );
    }
    Ok(())
}

/// Phred-scaled probability that the alignment is wrong, capped at 100.
pub fn weight_to_mapq(weight: f32) -> u8 {
    let err = 1.0 - f64::from(weight);
    if err <= 1e-10 {
        return 100;
    }
    (-10.0 * err.log10() + 0.5) as u8
}
