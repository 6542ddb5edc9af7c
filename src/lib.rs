//! csem-rs: allocate multi-mapped reads by iterative local-density weighting.
//!
//! Every read that aligns to several places spreads one unit of weight over
//! its alignments. Each round, an alignment's share becomes proportional to
//! the read density in a window around it (unique reads, an optional prior,
//! and the current shares of all multi-mapped reads), so reads gravitate to
//! locations that other reads support.
//!
//! # Library usage
//!
//! ```no_run
//! use csem_rs::{AlignmentRecord, AlignmentSet, AllocationConfig, Allocator, ReferenceTable, Strand};
//!
//! # fn main() -> anyhow::Result<()> {
//! let references = ReferenceTable::from_entries([("chr1", 1_000), ("chr2", 800)])?;
//!
//! let mut alignments = AlignmentSet::new();
//! alignments.push_group([AlignmentRecord::new(0, 120, Strand::Forward)]);
//! alignments.push_group([
//!     AlignmentRecord::new(0, 130, Strand::Forward),
//!     AlignmentRecord::new(1, 400, Strand::Reverse),
//! ]);
//!
//! let config = AllocationConfig::from_fragment_length(100).with_rounds(20);
//! let mut allocator = Allocator::new(&alignments, &references, config)?;
//! let summary = allocator.run()?;
//! drop(allocator);
//!
//! let weights = alignments.weights();
//! # let _ = (summary, weights);
//! # Ok(())
//! # }
//! ```

pub mod alignment;
pub mod allocate;
pub mod bam_input;
pub mod chromosome;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod prior;
pub mod reference;
pub mod scan;
pub mod select;
pub mod table;
pub(crate) mod types;

// Flat re-exports for the most commonly used types.
pub use alignment::{AlignmentRecord, AlignmentSet, Strand};
pub use allocate::{AllocationSummary, Allocator};
pub use config::AllocationConfig;
pub use reference::ReferenceTable;
pub use types::{ChromId, Pos};
