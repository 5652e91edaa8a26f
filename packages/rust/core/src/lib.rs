//! Pipeline orchestration for the Oireachtas corpus tools.
//!
//! This crate ties listing, downloading, corpus assembly, and flattening
//! into the end-to-end `harvest` and `flatten` workflows.

pub mod assembler;
pub mod pipeline;
pub mod sink;

pub use assembler::{AssembleResult, MergeResult, assemble, merge_corpora};
pub use pipeline::{
    FlattenSummary, HarvestResult, ProgressReporter, SilentProgress, SourceSummary,
    flatten_into, flatten_to_file, harvest,
};
pub use sink::{DelimitedSink, RowSink};
