#![allow(dead_code)]

use std::{fs::File, path::Path, sync::Arc};

use arrow::array::{Float64Builder, StringBuilder, TimestampMillisecondBuilder};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use timeseries_gapfill_core::{SamplingInterval, with_interval};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn write_csv(path: &Path, contents: &str) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Write `(ts_ms, sensor, reading)` rows to Parquet. With `interval_ms`
/// set, the `ts` field carries interval metadata.
pub fn write_parquet_rows(
    path: &Path,
    rows: &[(i64, &str, Option<f64>)],
    interval_ms: Option<f64>,
) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut ts_builder = TimestampMillisecondBuilder::with_capacity(rows.len());
    let mut sensor_builder = StringBuilder::new();
    let mut reading_builder = Float64Builder::with_capacity(rows.len());

    for (ts, sensor, reading) in rows {
        ts_builder.append_value(*ts);
        sensor_builder.append_value(sensor);
        reading_builder.append_option(*reading);
    }

    let mut ts_field = Field::new(
        "ts",
        DataType::Timestamp(TimeUnit::Millisecond, None),
        false,
    );
    if let Some(interval) = interval_ms {
        let interval = SamplingInterval::new(interval).ok_or("interval must be > 0")?;
        ts_field = with_interval(ts_field, interval);
    }

    let schema = Arc::new(Schema::new(vec![
        ts_field,
        Field::new("sensor", DataType::Utf8, false),
        Field::new("reading", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(ts_builder.finish()) as _,
            Arc::new(sensor_builder.finish()),
            Arc::new(reading_builder.finish()),
        ],
    )?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
