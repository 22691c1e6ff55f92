//! Table encoding and file output.
//!
//! Entity tables are Parquet files built from Arrow record batches, with a
//! configurable codec. Reference tables are comma-delimited text with a
//! header row. Every write goes through a [`StagedWrite`] so a failed run
//! leaves no partial tables.

pub mod columnar;
pub mod csv;
mod writer;

pub use columnar::ArrowRecord;
pub use csv::{CsvRecord, encode_csv};
pub use writer::{DatasetWriter, StagedWrite, WriteError, WrittenTable, encode_parquet};
