use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use timeseries_gapfill_core::{IntervalError, ParseIntervalError};

use snafu::Snafu;

pub type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CliError {
    #[snafu(display("Input file not found or not accessible: {path}"))]
    InputMissing {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display(
        "Cannot tell the format of {path} from its extension. \
         Pass --input-format csv|parquet."
    ))]
    UnknownInputFormat { path: String },

    #[snafu(display("Failed to read CSV {path}: {source}"))]
    ReadCsv { path: String, source: ArrowError },

    #[snafu(display("Failed to open Parquet {path}: {source}"))]
    OpenParquet { path: String, source: ParquetError },

    #[snafu(display("Failed to decode Parquet {path}: {source}"))]
    DecodeParquet { path: String, source: ArrowError },

    #[snafu(display("Failed to combine input batches: {source}"))]
    ConcatBatches { source: ArrowError },

    #[snafu(display("Invalid --interval '{spec}': {source}"))]
    InvalidInterval {
        spec: String,
        source: ParseIntervalError,
    },

    #[snafu(display("Cannot apply --interval: {source}"))]
    ResolveInterval { source: IntervalError },

    #[snafu(display(
        "--interval '{spec}' is a duration but no key column was given \
         and the input has no timestamp column. Pass --key."
    ))]
    NoTimeColumnForInterval { spec: String },

    #[snafu(display("Failed to read options file {path}"))]
    ReadOptions {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Invalid options file {path}: {source}"))]
    ParseOptions {
        path: String,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to create output file: {path}"))]
    CreateOutput {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to write output: {source}"))]
    WriteOutput { source: ArrowError },

    #[snafu(display("Failed to flush output file"))]
    FlushOutput { source: std::io::Error },

    #[snafu(display("Failed to format column {column} for preview: {source}"))]
    FormatPreview { column: String, source: ArrowError },

    #[snafu(display("Failed to write to stdout"))]
    Stdout { source: std::io::Error },
}
