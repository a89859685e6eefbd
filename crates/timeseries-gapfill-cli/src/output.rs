use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use arrow::{
    record_batch::RecordBatch,
    util::display::{ArrayFormatter, FormatOptions},
};
use snafu::ResultExt;
use tabled::{
    Table,
    builder::Builder,
    settings::{Alignment, Panel, Style},
};
use timeseries_gapfill_core::GapFillOutcome;

use crate::error::{
    CliResult, CreateOutputSnafu, FlushOutputSnafu, FormatPreviewSnafu, StdoutSnafu,
    WriteOutputSnafu,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Jsonl,
}

enum OutputWriter {
    Csv(Box<arrow_csv::Writer<BufWriter<File>>>),
    Jsonl(Box<arrow_json::LineDelimitedWriter<BufWriter<File>>>),
}

impl OutputWriter {
    fn create(path: &Path, format: OutputFormat) -> CliResult<Self> {
        let file = File::create(path).context(CreateOutputSnafu {
            path: path.display().to_string(),
        })?;
        let writer = BufWriter::new(file);

        match format {
            // The CSV writer does not support list or struct columns.
            OutputFormat::Csv => Ok(OutputWriter::Csv(Box::new(
                arrow_csv::WriterBuilder::new().with_header(true).build(writer),
            ))),
            OutputFormat::Jsonl => Ok(OutputWriter::Jsonl(Box::new(
                arrow_json::LineDelimitedWriter::new(writer),
            ))),
        }
    }

    fn write_batch(&mut self, batch: &RecordBatch) -> CliResult<()> {
        match self {
            OutputWriter::Csv(w) => w.write(batch).context(WriteOutputSnafu),
            OutputWriter::Jsonl(w) => w.write_batches(&[batch]).context(WriteOutputSnafu),
        }
    }

    fn finish(self) -> CliResult<()> {
        let mut inner = match self {
            OutputWriter::Csv(w) => w.into_inner(),
            OutputWriter::Jsonl(mut w) => {
                w.finish().context(WriteOutputSnafu)?;
                w.into_inner()
            }
        };
        inner.flush().context(FlushOutputSnafu)
    }
}

/// Write `batch` to `path` in `format`.
pub fn write_batch_to(path: &Path, format: OutputFormat, batch: &RecordBatch) -> CliResult<()> {
    let mut writer = OutputWriter::create(path, format)?;
    writer.write_batch(batch)?;
    writer.finish()
}

/// Column names plus the first `max_rows` rows rendered as strings.
pub fn preview_rows(
    batch: &RecordBatch,
    max_rows: usize,
) -> CliResult<(Vec<String>, Vec<Vec<String>>)> {
    let schema = batch.schema();
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

    let options = FormatOptions::default().with_null("null");
    let formatters = batch
        .columns()
        .iter()
        .zip(&columns)
        .map(|(array, name)| {
            ArrayFormatter::try_new(array.as_ref(), &options)
                .context(FormatPreviewSnafu { column: name })
        })
        .collect::<CliResult<Vec<_>>>()?;

    let rows = (0..batch.num_rows().min(max_rows))
        .map(|row| formatters.iter().map(|f| f.value(row).to_string()).collect())
        .collect();

    Ok((columns, rows))
}

/// The preview grid: a title row spanning all columns, then the header and
/// the rows shown.
fn preview_table(columns: &[String], rows: &[Vec<String>]) -> Option<Table> {
    if columns.is_empty() {
        return None;
    }

    let mut builder = Builder::default();
    builder.push_record(columns);
    rows.iter().for_each(|row| builder.push_record(row));

    let mut table = builder.build();
    table
        .with(Style::sharp())
        .with(Panel::header("Filled output"))
        .with(Alignment::center());
    Some(table)
}

/// Row counts and the filler's outcome, printed after every run.
#[derive(Debug, Clone)]
pub struct FillSummary {
    pub rows_in: usize,
    pub rows_out: usize,
    pub outcome: GapFillOutcome,
}

pub fn write_summary<W: Write>(summary: &FillSummary, out: &mut W) -> CliResult<()> {
    writeln!(out, "rows_in: {}", summary.rows_in).context(StdoutSnafu)?;
    writeln!(out, "rows_out: {}", summary.rows_out).context(StdoutSnafu)?;
    match &summary.outcome {
        GapFillOutcome::Filled {
            key_column,
            inserted_rows,
            gaps,
        } => writeln!(
            out,
            "inserted: {inserted_rows} (gaps: {gaps}, key: {key_column})"
        ),
        GapFillOutcome::Skipped(reason) => writeln!(out, "skipped: {reason}"),
    }
    .context(StdoutSnafu)
}

/// Print a bounded preview of `batch` followed by the summary.
pub fn write_preview<W: Write>(
    batch: &RecordBatch,
    summary: &FillSummary,
    max_rows: usize,
    out: &mut W,
) -> CliResult<()> {
    let (columns, rows) = preview_rows(batch, max_rows)?;
    if let Some(table) = preview_table(&columns, &rows) {
        writeln!(out, "{table}").context(StdoutSnafu)?;
    }

    let total = batch.num_rows();
    if total == 0 {
        writeln!(out, "(no rows)").context(StdoutSnafu)?;
    } else if max_rows == 0 {
        writeln!(out, "(preview suppressed; use --max-rows > 0)").context(StdoutSnafu)?;
    } else if total > max_rows {
        writeln!(out, "({} more rows; use --max-rows)", total - max_rows)
            .context(StdoutSnafu)?;
    }

    write_summary(summary, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use timeseries_gapfill_core::SkipReason;

    fn batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("t", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn preview_table_has_title_header_and_rows() {
        let columns = vec!["t".to_string(), "value".to_string()];
        let rows = vec![vec!["1".to_string(), "null".to_string()]];
        let rendered = preview_table(&columns, &rows).unwrap().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[1].contains("Filled output"));
        assert!(rendered.contains("value"));
        assert!(rendered.contains("null"));

        assert!(preview_table(&[], &[]).is_none());
    }

    #[test]
    fn preview_rows_formats_nulls_and_truncates() {
        let (columns, rows) = preview_rows(&batch(), 2).unwrap();
        assert_eq!(columns, vec!["t", "name"]);
        assert_eq!(
            rows,
            vec![
                vec!["1".to_string(), "a".to_string()],
                vec!["2".to_string(), "null".to_string()],
            ]
        );
    }

    #[test]
    fn preview_mentions_hidden_rows_and_summary() {
        let summary = FillSummary {
            rows_in: 2,
            rows_out: 3,
            outcome: GapFillOutcome::Filled {
                key_column: "t".to_string(),
                inserted_rows: 1,
                gaps: 1,
            },
        };
        let mut buf = Vec::new();
        write_preview(&batch(), &summary, 1, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("(2 more rows; use --max-rows)"));
        assert!(text.contains("rows_out: 3"));
        assert!(text.contains("inserted: 1 (gaps: 1, key: t)"));
    }

    #[test]
    fn zero_max_rows_suppresses_preview_rows() {
        let summary = FillSummary {
            rows_in: 3,
            rows_out: 3,
            outcome: GapFillOutcome::Skipped(SkipReason::NoInterval),
        };
        let mut buf = Vec::new();
        write_preview(&batch(), &summary, 0, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("(preview suppressed; use --max-rows > 0)"));
        assert!(!text.contains("null"));
        assert!(text.contains("skipped: no column carries a sampling interval"));
    }

    #[test]
    fn summary_reports_skip_reason() {
        let summary = FillSummary {
            rows_in: 1,
            rows_out: 1,
            outcome: GapFillOutcome::Skipped(SkipReason::TooFewRows { rows: 1 }),
        };
        let mut buf = Vec::new();
        write_summary(&summary, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("skipped: 1 row(s); need at least 2"));
    }

    #[test]
    fn writes_csv_with_empty_nulls() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::TempDir::new()?;
        let path = tmp.path().join("out.csv");
        write_batch_to(&path, OutputFormat::Csv, &batch())?;
        let text = std::fs::read_to_string(&path)?;
        assert_eq!(text, "t,name\n1,a\n2,\n3,c\n");
        Ok(())
    }

    #[test]
    fn writes_jsonl_one_object_per_row() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = tempfile::TempDir::new()?;
        let path = tmp.path().join("out.jsonl");
        write_batch_to(&path, OutputFormat::Jsonl, &batch())?;
        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"t":1,"name":"a"}"#);
        assert_eq!(lines[1], r#"{"t":2}"#);
        Ok(())
    }
}
