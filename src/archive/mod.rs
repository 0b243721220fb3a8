//! The end-to-end pipeline from raw message to archived record.

pub mod assembler;

pub use assembler::{BatchReport, IngestOptions, Outcome, RecordAssembler};
