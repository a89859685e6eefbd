//! Schema report for the `inspect` command.

use std::io::Write;

use arrow::record_batch::RecordBatch;
use snafu::ResultExt;
use tabled::{builder::Builder, settings::Style};
use timeseries_gapfill_core::{GapFillOptions, KeyColumn, SamplingInterval};

use crate::error::{CliResult, StdoutSnafu};

/// List every column with its type and interval metadata, then the column
/// the filler would use as key under `options`.
pub fn write_inspection<W: Write>(
    batch: &RecordBatch,
    options: &GapFillOptions,
    out: &mut W,
) -> CliResult<()> {
    let schema = batch.schema();

    let mut builder = Builder::default();
    builder.push_record(["column", "type", "nullable", "interval"]);
    for field in schema.fields() {
        let interval = match SamplingInterval::from_field(field) {
            Some(i) => i.to_string(),
            None => "-".to_string(),
        };
        builder.push_record([
            field.name().clone(),
            field.data_type().to_string(),
            field.is_nullable().to_string(),
            interval,
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());

    writeln!(out, "{table}").context(StdoutSnafu)?;
    writeln!(out, "rows: {}", batch.num_rows()).context(StdoutSnafu)?;

    match KeyColumn::locate(batch, options) {
        Ok(key) => writeln!(out, "key: {} (interval {})", key.name, key.interval),
        Err(reason) => writeln!(out, "key: none ({reason})"),
    }
    .context(StdoutSnafu)
}
