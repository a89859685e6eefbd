//! Loading CSV and Parquet files into a single record batch.

use std::{
    fs::File,
    io::Seek,
    path::Path,
    sync::Arc,
};

use arrow::{compute::concat_batches, datatypes::SchemaRef, record_batch::RecordBatch};
use arrow_csv::{ReaderBuilder, reader::Format};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use snafu::ResultExt;

use crate::error::{
    CliResult, ConcatBatchesSnafu, DecodeParquetSnafu, InputMissingSnafu, OpenParquetSnafu,
    ReadCsvSnafu, UnknownInputFormatSnafu,
};

/// Rows sampled when inferring a CSV schema.
const CSV_INFER_ROWS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Parquet,
}

impl InputFormat {
    /// Guess from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(InputFormat::Csv),
            "parquet" | "pq" => Some(InputFormat::Parquet),
            _ => None,
        }
    }
}

/// Read `path` as one batch. Multi-batch inputs are concatenated so the gap
/// filler sees the whole series at once.
pub fn load_batch(path: &Path, format: Option<InputFormat>) -> CliResult<RecordBatch> {
    let path_str = path.display().to_string();
    let format = match format.or_else(|| InputFormat::from_path(path)) {
        Some(f) => f,
        None => return UnknownInputFormatSnafu { path: path_str }.fail(),
    };

    let file = File::open(path).context(InputMissingSnafu { path: &path_str })?;

    let (schema, batches) = match format {
        InputFormat::Csv => read_csv(file, &path_str)?,
        InputFormat::Parquet => read_parquet(file, &path_str)?,
    };

    concat_batches(&schema, &batches).context(ConcatBatchesSnafu)
}

fn read_csv(mut file: File, path: &str) -> CliResult<(SchemaRef, Vec<RecordBatch>)> {
    let format = Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(&mut file, Some(CSV_INFER_ROWS))
        .context(ReadCsvSnafu { path })?;
    file.rewind().context(InputMissingSnafu { path })?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(file)
        .context(ReadCsvSnafu { path })?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context(ReadCsvSnafu { path })?;
    Ok((schema, batches))
}

fn read_parquet(file: File, path: &str) -> CliResult<(SchemaRef, Vec<RecordBatch>)> {
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context(OpenParquetSnafu { path })?;
    let schema = builder.schema().clone();
    let reader = builder.build().context(OpenParquetSnafu { path })?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context(DecodeParquetSnafu { path })?;
    Ok((schema, batches))
}
