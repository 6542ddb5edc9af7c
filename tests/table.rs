use csem_rs::table::{partition_chromosomes, AllocationTable};
use csem_rs::{AlignmentRecord, AlignmentSet, ReferenceTable, Strand};

#[test]
fn more_threads_than_chromosomes_pads_with_empty_ranges() {
    assert_eq!(partition_chromosomes(&[5, 7], 4), vec![0..1, 1..2, 2..2, 2..2]);
}

#[test]
fn no_chromosomes() {
    assert_eq!(partition_chromosomes(&[], 3), vec![0..0, 0..0, 0..0]);
}

#[test]
fn single_thread_takes_everything() {
    assert_eq!(partition_chromosomes(&[3, 1, 4, 1, 5], 1), vec![0..5]);
}

#[test]
fn equal_loads_split_evenly() {
    assert_eq!(partition_chromosomes(&[10, 10, 10, 10], 2), vec![0..2, 2..4]);
}

#[test]
fn heavy_first_chromosome_gets_its_own_worker() {
    assert_eq!(partition_chromosomes(&[100, 1, 1, 1], 2), vec![0..1, 1..4]);
}

#[test]
fn partitions_are_contiguous_and_non_empty_when_possible() {
    let loads = [8, 0, 3, 12, 1, 1, 0, 9, 4, 2];
    for threads in 1..=12 {
        let ranges = partition_chromosomes(&loads, threads);
        assert_eq!(ranges.len(), threads);

        let mut expected_start = 0;
        for range in &ranges {
            assert_eq!(range.start, expected_start);
            expected_start = range.end;
        }
        assert_eq!(expected_start, loads.len());

        let busy = ranges.iter().filter(|r| !r.is_empty()).count();
        assert_eq!(busy, threads.min(loads.len()), "threads = {threads}");
    }
}

fn sample_data() -> (ReferenceTable, AlignmentSet) {
    let references = ReferenceTable::from_entries([("chr1", 50), ("chr2", 50)]).unwrap();
    let mut alignments = AlignmentSet::new();
    alignments.push_group([AlignmentRecord::new(0, 10, Strand::Forward)]);
    alignments.push_group([
        AlignmentRecord::new(0, 12, Strand::Forward),
        AlignmentRecord::new(1, 30, Strand::Reverse),
    ]);
    for record in alignments.records() {
        record.set_weight(if record.is_multi { 0.5 } else { 1.0 });
    }
    (references, alignments)
}

#[test]
fn unknown_chromosome_id_is_an_error() {
    let references = ReferenceTable::from_entries([("chr1", 50)]).unwrap();
    let mut alignments = AlignmentSet::new();
    alignments.push_group([AlignmentRecord::new(3, 10, Strand::Forward)]);

    assert!(AllocationTable::build(&references, &alignments, 5, 1, None).is_err());
}

#[test]
fn update_with_idle_workers_finishes() {
    let (references, alignments) = sample_data();
    let mut table = AllocationTable::build(&references, &alignments, 5, 8, None).unwrap();

    assert_eq!(table.assignments().len(), 8);
    let delta = table.update(alignments.records(), false).unwrap();
    assert_eq!(delta, 0.5);
    assert_eq!(table.max_delta(), 0.5);
    assert_eq!(table.chromosome(0).current_values(), &[0.5]);
    assert_eq!(table.chromosome(1).current_values(), &[0.5]);
}

#[test]
fn thread_count_does_not_change_densities() {
    let (references, serial_set) = sample_data();
    let (_, parallel_set) = sample_data();

    let mut serial = AllocationTable::build(&references, &serial_set, 5, 1, None).unwrap();
    let mut parallel = AllocationTable::build(&references, &parallel_set, 5, 2, None).unwrap();
    serial.update(serial_set.records(), true).unwrap();
    parallel.update(parallel_set.records(), true).unwrap();

    assert_eq!(serial_set.weights(), parallel_set.weights());
    // chr1 alignment sees the unique read at 10 plus itself.
    assert_eq!(serial_set.weights(), vec![1.0, 1.5, 0.5]);
}
