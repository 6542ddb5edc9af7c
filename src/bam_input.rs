use crate::alignment::{AlignmentRecord, AlignmentSet, Strand};
use crate::reference::ReferenceTable;
use crate::types::{ChromId, Pos};
use anyhow::{anyhow, bail, Context, Result};
use noodles::sam::alignment::RecordBuf;
use noodles::{bam, sam};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const PROGRESS_INTERVAL: u64 = 1_000_000;

/// The record(s) reporting one alignment of a read: a single record, or
/// both mates of a pair.
#[derive(Debug)]
pub struct AlignmentUnit {
    // Input order, so output can be written back unchanged.
    records: Vec<RecordBuf>,
    // Index of the leading record: the mapped mate if only one is mapped,
    // otherwise the leftmost one.
    lead: usize,
}

impl AlignmentUnit {
    fn single(record: RecordBuf) -> Self {
        Self {
            records: vec![record],
            lead: 0,
        }
    }

    fn pair(first: RecordBuf, second: RecordBuf) -> Result<Self> {
        let (f1, f2) = (first.flags(), second.flags());
        if !f2.is_segmented() {
            bail!(
                "read '{}' is paired but the next record is not",
                record_name(&first)
            );
        }
        let complementary = (f1.is_first_segment() && f2.is_last_segment())
            || (f1.is_last_segment() && f2.is_first_segment());
        if !complementary {
            bail!("cannot detect both mates of paired read '{}'", record_name(&first));
        }

        let mut lead = 0;
        if f1.is_unmapped() && !f2.is_unmapped() {
            lead = 1;
        } else if !f1.is_unmapped() && !f2.is_unmapped() {
            let p1 = start_position(&first)?;
            let p2 = start_position(&second)?;
            if p1 > p2 {
                lead = 1;
            }
        }

        Ok(Self {
            records: vec![first, second],
            lead,
        })
    }

    pub fn records(&self) -> &[RecordBuf] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RecordBuf> {
        self.records
    }

    pub fn lead(&self) -> &RecordBuf {
        &self.records[self.lead]
    }

    pub fn mate(&self) -> Option<&RecordBuf> {
        if self.records.len() == 2 {
            Some(&self.records[1 - self.lead])
        } else {
            None
        }
    }

    pub fn is_paired(&self) -> bool {
        self.records.len() == 2
    }

    pub fn name(&self) -> String {
        record_name(self.lead())
    }

    /// Aligned when every record of the unit is mapped.
    pub fn is_aligned(&self) -> bool {
        self.records.iter().all(|r| !r.flags().is_unmapped())
    }

    fn strand(&self) -> Strand {
        let flags = self.lead().flags();
        let forward = if self.is_paired() {
            flags.is_first_segment()
        } else {
            !flags.is_reverse_complemented()
        };
        if forward { Strand::Forward } else { Strand::Reverse }
    }

    /// Convert an aligned unit into the allocator's model. With
    /// `fragment_length`, the position is moved to the fragment midpoint.
    pub fn to_alignment(&self, fragment_length: Option<u32>) -> Result<AlignmentRecord> {
        let lead = self.lead();
        let chrom_id = lead
            .reference_sequence_id()
            .ok_or_else(|| anyhow!("mapped read '{}' has no reference id", self.name()))?;
        let chrom_id = ChromId::try_from(chrom_id)
            .map_err(|_| anyhow!("reference id {} out of range", chrom_id))?;
        let start = start_position(lead)?;
        let strand = self.strand();

        let pos = match fragment_length {
            None => start,
            Some(fragment_length) => {
                let fragment_length = Pos::from(fragment_length);
                let tlen = Pos::from(lead.template_length());
                if self.is_paired() && tlen > 0 {
                    start + (tlen - 1) / 2
                } else if strand == Strand::Forward {
                    start + (fragment_length - 1) / 2
                } else {
                    let read_len = lead.sequence().len() as Pos;
                    start + read_len - fragment_length / 2 - 1
                }
            }
        };

        Ok(AlignmentRecord::new(chrom_id, pos, strand))
    }
}

fn record_name(record: &RecordBuf) -> String {
    record.name().map(|n| n.to_string()).unwrap_or_default()
}

/// 0-based alignment start.
fn start_position(record: &RecordBuf) -> Result<Pos> {
    let start = record
        .alignment_start()
        .ok_or_else(|| anyhow!("mapped read '{}' has no position", record_name(record)))?;
    Ok(start.get() as Pos - 1)
}

/// Alignment file flavours accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Bam,
    Sam,
}

impl InputFormat {
    /// Sniff the format from the first bytes: BGZF (gzip magic) is BAM,
    /// anything else is read as plain-text SAM.
    pub fn detect(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let mut magic = Vec::with_capacity(2);
        file.take(2)
            .read_to_end(&mut magic)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if magic == [0x1f, 0x8b] {
            Ok(Self::Bam)
        } else {
            Ok(Self::Sam)
        }
    }
}

fn open_sam(path: &Path) -> Result<sam::io::Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(sam::io::Reader::new(BufReader::new(file)))
}

pub fn read_header(path: &Path) -> Result<sam::Header> {
    let header = match InputFormat::detect(path)? {
        InputFormat::Bam => {
            let mut reader = bam::io::reader::Builder
                .build_from_path(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            reader.read_header()?
        }
        InputFormat::Sam => open_sam(path)?.read_header()?,
    };
    Ok(header)
}

/// Stream every alignment unit of a BAM or SAM file, in file order.
pub fn read_units<F>(path: &Path, f: F) -> Result<u64>
where
    F: FnMut(AlignmentUnit) -> Result<()>,
{
    let count = match InputFormat::detect(path)? {
        InputFormat::Bam => {
            let mut reader = bam::io::reader::Builder
                .build_from_path(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let header = reader.read_header()?;
            stream_units(reader.record_bufs(&header), f)
        }
        InputFormat::Sam => {
            let mut reader = open_sam(path)?;
            let header = reader.read_header()?;
            stream_units(reader.record_bufs(&header), f)
        }
    };
    count.with_context(|| format!("failed to read alignments from {}", path.display()))
}

fn stream_units<I, F>(mut records: I, mut f: F) -> Result<u64>
where
    I: Iterator<Item = io::Result<RecordBuf>>,
    F: FnMut(AlignmentUnit) -> Result<()>,
{
    let mut count: u64 = 0;
    while let Some(result) = records.next() {
        let record = result?;
        let unit = if record.flags().is_segmented() {
            let mate = records.next().ok_or_else(|| {
                anyhow!("failed to read the other mate of paired read '{}'", record_name(&record))
            })??;
            AlignmentUnit::pair(record, mate)?
        } else {
            AlignmentUnit::single(record)
        };

        let before = count;
        count += unit.records().len() as u64;
        if before / PROGRESS_INTERVAL != count / PROGRESS_INTERVAL {
            tracing::debug!(records = count, "reading alignments");
        }
        f(unit)?;
    }
    Ok(count)
}

#[derive(Debug)]
pub struct LoadedAlignments {
    pub header: sam::Header,
    pub references: ReferenceTable,
    pub alignments: AlignmentSet,
    pub records: u64,
    pub unaligned: u64,
}

/// Load every aligned unit of a read-name-grouped BAM or SAM file.
pub fn load_alignments(path: &Path, fragment_length: Option<u32>) -> Result<LoadedAlignments> {
    let header = read_header(path)?;
    let references = ReferenceTable::from_header(&header)?;

    let mut alignments = AlignmentSet::new();
    let mut current_name: Option<String> = None;
    let mut unaligned: u64 = 0;
    let records = read_units(path, |unit| {
        if !unit.is_aligned() {
            unaligned += 1;
            return Ok(());
        }
        let name = unit.name();
        if current_name.as_deref() != Some(name.as_str()) {
            alignments.start_group();
            current_name = Some(name);
        }
        alignments.push(unit.to_alignment(fragment_length)?);
        Ok(())
    })?;

    tracing::info!(
        records,
        unaligned,
        reads = alignments.num_groups(),
        alignments = alignments.len(),
        "loading alignments finished"
    );

    Ok(LoadedAlignments {
        header,
        references,
        alignments,
        records,
        unaligned,
    })
}
