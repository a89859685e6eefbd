//! Turning command-line flags (and an optional JSON options file) into
//! [`GapFillOptions`].

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use arrow::{datatypes::DataType, record_batch::RecordBatch};
use snafu::ResultExt;
use timeseries_gapfill_core::{FillMode, GapFillOptions, IntervalSpec};

use crate::error::{
    CliResult, InvalidIntervalSnafu, NoTimeColumnForIntervalSnafu, ParseOptionsSnafu,
    ReadOptionsSnafu, ResolveIntervalSnafu,
};

/// Fill settings as given on the command line. Every field is optional so
/// flags only override what they name.
#[derive(Debug, Clone, Default)]
pub struct FillFlags {
    pub options_file: Option<PathBuf>,
    pub key: Option<String>,
    pub interval: Option<String>,
    pub mode: Option<FillMode>,
    pub range_min: Option<f64>,
    pub range_max: Option<f64>,
    pub max_output_rows: Option<usize>,
}

fn read_options_file(path: &Path) -> CliResult<GapFillOptions> {
    let path_str = path.display().to_string();
    let file = File::open(path).context(ReadOptionsSnafu { path: &path_str })?;
    serde_json::from_reader(BufReader::new(file)).context(ParseOptionsSnafu { path: path_str })
}

/// Name and type of the column an interval should be resolved against:
/// the explicit key, else the first timestamp column.
fn interval_target<'a>(
    batch: &'a RecordBatch,
    key: Option<&str>,
) -> Option<(&'a str, &'a DataType)> {
    let schema = batch.schema_ref();
    let field = match key {
        Some(name) => schema.field_with_name(name).ok()?,
        None => schema
            .fields()
            .iter()
            .find(|f| matches!(f.data_type(), DataType::Timestamp(_, _)))?
            .as_ref(),
    };
    Some((field.name().as_str(), field.data_type()))
}

/// Build the options for `batch` from `flags`.
pub fn build_options(flags: &FillFlags, batch: &RecordBatch) -> CliResult<GapFillOptions> {
    let mut options = match &flags.options_file {
        Some(path) => read_options_file(path)?,
        None => GapFillOptions::default(),
    };

    if let Some(key) = &flags.key {
        options.key_column = Some(key.clone());
    }

    if let Some(raw) = &flags.interval {
        let spec = IntervalSpec::parse(raw).context(InvalidIntervalSnafu { spec: raw })?;
        let interval = match (interval_target(batch, options.key_column.as_deref()), spec) {
            (Some((column, data_type)), spec) => spec
                .resolve(column, data_type)
                .context(ResolveIntervalSnafu)?,
            // A missing key column is reported by the filler as a skip.
            (None, IntervalSpec::Native(interval)) => interval,
            (None, IntervalSpec::Duration(_)) => {
                return NoTimeColumnForIntervalSnafu { spec: raw }.fail();
            }
        };
        options.interval = Some(interval);
    }

    if let Some(mode) = flags.mode {
        options.mode = mode;
    }

    if flags.range_min.is_some() || flags.range_max.is_some() {
        let mut range = options.range.unwrap_or_default();
        if flags.range_min.is_some() {
            range.min = flags.range_min;
        }
        if flags.range_max.is_some() {
            range.max = flags.range_max;
        }
        options.range = Some(range);
    }

    if let Some(limit) = flags.max_output_rows {
        options.max_output_rows = limit;
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, TimestampMillisecondArray};
    use arrow::datatypes::{Field, Schema, TimeUnit};
    use tempfile::TempDir;

    use crate::error::CliError;
    use timeseries_gapfill_core::FillRange;

    fn ts_batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("v", DataType::Float64, true),
            Field::new(
                "ts",
                DataType::Timestamp(TimeUnit::Millisecond, None),
                false,
            ),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(TimestampMillisecondArray::from(vec![0, 120_000])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn duration_resolves_against_first_timestamp_column() {
        let flags = FillFlags {
            interval: Some("1m".to_string()),
            ..Default::default()
        };
        let options = build_options(&flags, &ts_batch()).unwrap();
        assert_eq!(options.interval.map(|i| i.get()), Some(60_000.0));
        assert_eq!(options.key_column, None);
    }

    #[test]
    fn duration_on_numeric_key_is_rejected() {
        let flags = FillFlags {
            key: Some("v".to_string()),
            interval: Some("1m".to_string()),
            ..Default::default()
        };
        let err = build_options(&flags, &ts_batch()).unwrap_err();
        assert!(matches!(err, CliError::ResolveInterval { .. }));
    }

    #[test]
    fn bad_interval_spec_is_reported() {
        let flags = FillFlags {
            interval: Some("ten minutes".to_string()),
            ..Default::default()
        };
        let err = build_options(&flags, &ts_batch()).unwrap_err();
        assert!(matches!(err, CliError::InvalidInterval { .. }));
    }

    #[test]
    fn flags_override_options_file() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("opts.json");
        let mut f = File::create(&path)?;
        write!(
            f,
            r#"{{"key_column":"ts","interval":30000,"mode":"break","range":{{"min":-60000,"max":null}}}}"#
        )?;
        drop(f);

        let flags = FillFlags {
            options_file: Some(path),
            mode: Some(FillMode::All),
            range_max: Some(600_000.0),
            ..Default::default()
        };
        let options = build_options(&flags, &ts_batch())?;
        assert_eq!(options.key_column.as_deref(), Some("ts"));
        assert_eq!(options.interval.map(|i| i.get()), Some(30_000.0));
        assert_eq!(options.mode, FillMode::All);
        assert_eq!(
            options.range,
            Some(FillRange {
                min: Some(-60_000.0),
                max: Some(600_000.0)
            })
        );
        Ok(())
    }

    #[test]
    fn malformed_options_file() -> Result<(), Box<dyn std::error::Error>> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("opts.json");
        std::fs::write(&path, "{not json")?;
        let flags = FillFlags {
            options_file: Some(path),
            ..Default::default()
        };
        let err = build_options(&flags, &ts_batch()).unwrap_err();
        assert!(matches!(err, CliError::ParseOptions { .. }));
        Ok(())
    }
}
