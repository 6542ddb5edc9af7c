use csem_rs::bam_input::{self, InputFormat};
use csem_rs::cli::{AllocateArgs, SelectArgs, SelectMode};
use csem_rs::pipeline::{self, weight_to_mapq, WEIGHT_TAG};
use csem_rs::{select, Strand};
use noodles::sam::alignment::io::Write as _;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::RecordBuf;
use noodles::{bam, sam};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

// One unique read, one read with two alignments, one unmapped read, a pair
// whose mates are listed right-to-left and a pair with an unmapped mate.
const READS_SAM: &str = "\
@HD\tVN:1.6\tSO:unsorted
@SQ\tSN:chr1\tLN:100
@SQ\tSN:chr2\tLN:200
u\t0\tchr1\t11\t60\t4M\t*\t0\t0\tACGT\t*
m\t0\tchr1\t12\t60\t4M\t*\t0\t0\tACGT\t*
m\t16\tchr1\t61\t60\t4M\t*\t0\t0\tACGT\t*
x\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*
p\t147\tchr2\t51\t60\t4M\t=\t31\t-24\tACGT\t*
p\t99\tchr2\t31\t60\t4M\t=\t51\t24\tACGT\t*
q\t73\tchr2\t71\t60\t4M\t=\t71\t0\tACGT\t*
q\t133\tchr2\t71\t0\t*\t=\t71\t0\tACGT\t*
";

const RECORD_NAMES: [&str; 8] = ["u", "m", "m", "x", "p", "p", "q", "q"];

struct Fixture {
    dir: TempDir,
    sam: PathBuf,
    bam: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let sam_path = dir.path().join("reads.sam");
    std::fs::write(&sam_path, READS_SAM).unwrap();

    let bam_path = dir.path().join("reads.bam");
    let mut reader = sam::io::Reader::new(BufReader::new(File::open(&sam_path).unwrap()));
    let header = reader.read_header().unwrap();
    let mut writer = bam::io::Writer::new(File::create(&bam_path).unwrap());
    writer.write_header(&header).unwrap();
    for result in reader.record_bufs(&header) {
        writer.write_alignment_record(&header, &result.unwrap()).unwrap();
    }
    drop(writer);

    Fixture {
        dir,
        sam: sam_path,
        bam: bam_path,
    }
}

fn read_bam(path: &Path) -> Vec<RecordBuf> {
    let mut reader = bam::io::reader::Builder.build_from_path(path).unwrap();
    let header = reader.read_header().unwrap();
    let records: Vec<RecordBuf> = reader.record_bufs(&header).map(|r| r.unwrap()).collect();
    records
}

fn name(record: &RecordBuf) -> String {
    record.name().map(|n| n.to_string()).unwrap_or_default()
}

fn weight(record: &RecordBuf) -> Option<f32> {
    match record.data().get(&WEIGHT_TAG) {
        Some(Value::Float(w)) => Some(*w),
        _ => None,
    }
}

fn mapq(record: &RecordBuf) -> Option<u8> {
    record.mapping_quality().map(u8::from)
}

#[test]
fn format_is_sniffed_from_content() {
    let fx = fixture();
    assert_eq!(InputFormat::detect(&fx.sam).unwrap(), InputFormat::Sam);
    assert_eq!(InputFormat::detect(&fx.bam).unwrap(), InputFormat::Bam);
}

#[test]
fn mates_are_paired_and_leftmost_leads() {
    let fx = fixture();
    for path in [&fx.sam, &fx.bam] {
        let mut units = Vec::new();
        let records = bam_input::read_units(path, |unit| {
            let start = |r: &RecordBuf| r.alignment_start().map(|p| p.get());
            units.push((
                unit.name(),
                unit.is_paired(),
                unit.is_aligned(),
                start(unit.lead()),
                unit.mate().and_then(start),
            ));
            Ok(())
        })
        .unwrap();

        assert_eq!(records, 8);
        let expected = vec![
            ("u".to_string(), false, true, Some(11), None),
            ("m".to_string(), false, true, Some(12), None),
            ("m".to_string(), false, true, Some(61), None),
            ("x".to_string(), false, false, None, None),
            ("p".to_string(), true, true, Some(31), Some(51)),
            ("q".to_string(), true, false, Some(71), Some(71)),
        ];
        assert_eq!(units, expected, "{}", path.display());
    }
}

#[test]
fn alignments_load_from_sam_and_bam() {
    let fx = fixture();
    for path in [&fx.sam, &fx.bam] {
        let loaded = bam_input::load_alignments(path, None).unwrap();

        assert_eq!(loaded.records, 8);
        assert_eq!(loaded.unaligned, 2);
        assert_eq!(loaded.references.len(), 2);
        assert_eq!(loaded.alignments.num_groups(), 3);
        assert_eq!(
            loaded.alignments.groups().collect::<Vec<_>>(),
            vec![0..1, 1..3, 3..4]
        );

        let placed: Vec<(u32, i64, Strand)> = loaded
            .alignments
            .records()
            .iter()
            .map(|r| (r.chrom_id, r.pos, r.strand))
            .collect();
        assert_eq!(
            placed,
            vec![
                (0, 10, Strand::Forward),
                (0, 11, Strand::Forward),
                (0, 60, Strand::Reverse),
                (1, 30, Strand::Forward),
            ]
        );
    }
}

#[test]
fn extended_reads_sit_at_fragment_midpoints() {
    let fx = fixture();
    let loaded = bam_input::load_alignments(&fx.bam, Some(20)).unwrap();
    let positions: Vec<i64> = loaded.alignments.records().iter().map(|r| r.pos).collect();

    // Forward: start + 19/2. Reverse: start + 4 - 10 - 1. Pair: start + 23/2.
    assert_eq!(positions, vec![19, 20, 53, 41]);
}

fn allocate(fx: &Fixture, input: &Path) -> PathBuf {
    let args = AllocateArgs {
        in_bam: input.to_path_buf(),
        out_name: fx.dir.path().join("weighted"),
        fragment_length: 20,
        rounds: 10,
        threads: 2,
        extend_reads: false,
        prior: None,
    };
    let stats = pipeline::run(&args).unwrap();
    assert_eq!(stats.total_records, 8);
    assert_eq!(stats.unaligned_units, 2);
    assert_eq!(stats.reads, 3);
    assert_eq!(stats.multi_reads, 1);
    assert_eq!(stats.rounds, 10);
    fx.dir.path().join("weighted.bam")
}

#[test]
fn weights_are_written_back_in_input_order() {
    let fx = fixture();
    for input in [fx.bam.clone(), fx.sam.clone()] {
        let records = read_bam(&allocate(&fx, &input));

        let names: Vec<String> = records.iter().map(name).collect();
        assert_eq!(names, RECORD_NAMES);

        // Unique read and both mates of the aligned pair.
        for i in [0, 4, 5] {
            assert_eq!(weight(&records[i]), Some(1.0));
            assert_eq!(mapq(&records[i]), Some(100));
        }

        // The alignment next to the unique read wins.
        let near = weight(&records[1]).unwrap();
        let far = weight(&records[2]).unwrap();
        assert!(near > far, "{near} <= {far}");
        assert!((near + far - 1.0).abs() < 1e-6);
        assert_eq!(mapq(&records[1]), Some(weight_to_mapq(near)));
        assert_eq!(mapq(&records[2]), Some(weight_to_mapq(far)));

        // Unaligned units pass through untouched.
        for i in [3, 6, 7] {
            assert_eq!(weight(&records[i]), None);
        }
        assert_eq!(mapq(&records[6]), Some(60));
    }
}

#[test]
fn unique_selection_keeps_single_alignment_reads() {
    let fx = fixture();
    let weighted = allocate(&fx, &fx.bam);
    let out = fx.dir.path().join("unique.bam");

    let args = SelectArgs {
        in_bam: weighted,
        out_bam: out.clone(),
        mode: SelectMode::Unique,
        seed: 0,
    };
    let stats = select::run(&args).unwrap();
    assert_eq!((stats.reads, stats.kept), (3, 2));

    let records = read_bam(&out);
    let names: Vec<String> = records.iter().map(name).collect();
    assert_eq!(names, ["u", "p", "p"]);
    assert!(records.iter().all(|r| weight(r).is_none()));
}

#[test]
fn sampling_keeps_one_alignment_per_read() {
    let fx = fixture();
    let weighted = allocate(&fx, &fx.bam);
    let out = fx.dir.path().join("sampled.bam");

    let args = SelectArgs {
        in_bam: weighted,
        out_bam: out.clone(),
        mode: SelectMode::Sample,
        seed: 7,
    };
    let stats = select::run(&args).unwrap();
    assert_eq!((stats.reads, stats.kept), (3, 3));

    let records = read_bam(&out);
    let names: Vec<String> = records.iter().map(name).collect();
    assert_eq!(names, ["u", "m", "p", "p"]);
    assert!(records.iter().all(|r| weight(r).is_none()));
}

#[test]
fn missing_input_names_the_file() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.bam");
    let err = bam_input::load_alignments(&missing, None).unwrap_err();
    assert!(format!("{err:#}").contains("absent.bam"));
}

#[test]
fn unwritable_outputs_name_the_file() {
    let fx = fixture();
    let blocked = fx.dir.path().join("no_such_dir").join("out.bam");

    let header = bam_input::read_header(&fx.bam).unwrap();
    let err = pipeline::write_weights(&fx.bam, &blocked, &header, &[]).unwrap_err();
    assert!(format!("{err:#}").contains("failed to create"));
    assert!(format!("{err:#}").contains("out.bam"));

    let args = SelectArgs {
        in_bam: fx.bam.clone(),
        out_bam: blocked,
        mode: SelectMode::Sample,
        seed: 0,
    };
    let err = select::run(&args).unwrap_err();
    assert!(format!("{err:#}").contains("out.bam"));
}
