//! Sampling interval configuration for key columns.
//!
//! The interval that drives gap detection is attached to exactly one column
//! of a batch, as Arrow field metadata under [`INTERVAL_METADATA_KEY`]. The
//! stored value is a plain decimal number in the column's *native* units:
//!
//! - `Timestamp(Millisecond, _)` columns store milliseconds, `Timestamp(Second, _)`
//!   seconds, and so on.
//! - Integer and floating-point columns store the raw step between values.
//!
//! Callers that think in wall-clock durations (`1m`, `500ms`) go through
//! [`IntervalSpec`], which resolves a duration against the key column's data
//! type. Attaching the metadata is the upstream data-source layer's job;
//! [`with_interval`] and [`batch_with_interval`] are provided for it.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use arrow::{
    datatypes::{DataType, Field, Schema, TimeUnit},
    error::ArrowError,
    record_batch::RecordBatch,
};
use chrono::Duration;
use log::warn;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Field metadata key holding a column's sampling interval.
pub const INTERVAL_METADATA_KEY: &str = "interval";

/// A validated sampling interval: finite and strictly positive.
///
/// The value is expressed in the native units of the key column it belongs
/// to (see the module docs).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SamplingInterval(f64);

impl SamplingInterval {
    /// Returns `Some` if `value` is finite and `> 0`.
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(SamplingInterval(value))
    }

    /// The interval in the key column's native units.
    pub fn get(self) -> f64 {
        self.0
    }

    /// Read the interval attached to `field`, if any.
    ///
    /// Metadata that is present but does not parse to a finite, positive
    /// number is treated as absent (and logged).
    pub fn from_field(field: &Field) -> Option<Self> {
        let raw = field.metadata().get(INTERVAL_METADATA_KEY)?;
        let parsed = raw.trim().parse::<f64>().ok().and_then(SamplingInterval::new);
        if parsed.is_none() {
            warn!(
                "Ignoring unusable interval metadata on column {}: {raw:?}",
                field.name()
            );
        }
        parsed
    }
}

impl fmt::Display for SamplingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SamplingInterval> for f64 {
    fn from(value: SamplingInterval) -> Self {
        value.0
    }
}

impl TryFrom<f64> for SamplingInterval {
    type Error = ParseIntervalError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        SamplingInterval::new(value).context(NotPositiveSnafu {
            spec: value.to_string(),
        })
    }
}

/// Errors produced when parsing a human-friendly interval spec (e.g. `15m`).
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum ParseIntervalError {
    /// The spec string was empty or only whitespace.
    #[snafu(display("interval spec is empty"))]
    Empty,

    /// The spec started with a unit and no numeric value.
    #[snafu(display("interval spec '{spec}' is missing a numeric value"))]
    MissingNumber {
        /// The original spec string.
        spec: String,
    },

    /// The numeric portion of a duration spec failed to parse.
    #[snafu(display("invalid interval value in '{spec}': {source}"))]
    InvalidNumber {
        /// The original spec string.
        spec: String,
        /// The parse error returned by `u64::from_str`.
        source: std::num::ParseIntError,
    },

    /// The spec is neither a number nor a number followed by a unit.
    #[snafu(display("interval spec '{spec}' is not a number or a duration like 15m"))]
    Malformed {
        /// The original spec string.
        spec: String,
    },

    /// The value was zero, negative, or not finite.
    #[snafu(display("interval must be a finite number > 0 (got '{spec}')"))]
    NotPositive {
        /// The original spec string.
        spec: String,
    },

    /// The duration does not fit in a `chrono::Duration`.
    #[snafu(display("interval '{spec}' is too large"))]
    TooLarge {
        /// The original spec string.
        spec: String,
    },

    /// The spec used an unsupported unit suffix.
    #[snafu(display("unknown interval unit '{unit}' in '{spec}' (expected ms|s|m|h|d)"))]
    UnknownUnit {
        /// The original spec string.
        spec: String,
        /// The unrecognized unit suffix.
        unit: String,
    },
}

/// Errors raised while attaching or resolving an interval for a column.
#[derive(Debug, Snafu)]
pub enum IntervalError {
    /// The named column does not exist in the batch schema.
    #[snafu(display("column {column} not found in schema"))]
    ColumnNotFound {
        /// The requested column name.
        column: String,
    },

    /// A wall-clock duration was given for a column that is not a timestamp.
    #[snafu(display(
        "duration interval '{spec}' needs a timestamp column, but {column} is {data_type}; \
         use a bare number for numeric columns"
    ))]
    DurationOnNonTimeColumn {
        /// The key column name.
        column: String,
        /// The key column's data type.
        data_type: DataType,
        /// The interval spec as written.
        spec: String,
    },

    /// The duration cannot be represented in the column's time unit.
    #[snafu(display("interval '{spec}' overflows the {unit:?} unit of column {column}"))]
    DurationOverflow {
        /// The key column name.
        column: String,
        /// The column's timestamp unit.
        unit: TimeUnit,
        /// The interval spec as written.
        spec: String,
    },

    /// Rebuilding the batch with updated metadata failed.
    #[snafu(display("failed to rebuild batch with interval metadata: {source}"))]
    Arrow {
        /// Underlying Arrow error.
        source: ArrowError,
    },
}

/// A user-facing interval: either a bare number in native units or a
/// wall-clock duration that still needs a timestamp column to resolve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalSpec {
    /// A number already expressed in the key column's native units.
    Native(SamplingInterval),
    /// A wall-clock duration (`15m`, `500ms`, `1d`).
    Duration(Duration),
}

impl FromStr for IntervalSpec {
    type Err = ParseIntervalError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let spec = input.trim();
        if spec.is_empty() {
            return Err(ParseIntervalError::Empty);
        }

        // A bare number (including `1.5` or `1e3`) is taken as native units.
        if let Ok(value) = spec.parse::<f64>() {
            let interval = SamplingInterval::try_from(value).map_err(|_| {
                ParseIntervalError::NotPositive {
                    spec: spec.to_string(),
                }
            })?;
            return Ok(IntervalSpec::Native(interval));
        }

        let Some(unit_start) = spec
            .char_indices()
            .find(|(_, c)| c.is_ascii_alphabetic())
            .map(|(i, _)| i)
        else {
            return MalformedSnafu { spec }.fail();
        };

        if unit_start == 0 {
            return Err(ParseIntervalError::MissingNumber {
                spec: spec.to_string(),
            });
        }

        let (num_str, unit_str) = spec.split_at(unit_start);
        let value: u64 = num_str.trim().parse().context(InvalidNumberSnafu { spec })?;

        if value == 0 {
            return Err(ParseIntervalError::NotPositive {
                spec: spec.to_string(),
            });
        }

        let value = i64::try_from(value).map_err(|_| ParseIntervalError::TooLarge {
            spec: spec.to_string(),
        })?;

        let unit = unit_str.trim().to_ascii_lowercase();
        let duration = match unit.as_str() {
            "ms" | "msec" | "msecs" | "millis" | "millisecond" | "milliseconds" => {
                Duration::try_milliseconds(value)
            }
            "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(value),
            "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(value),
            "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(value),
            "d" | "day" | "days" => Duration::try_days(value),
            _ => {
                return Err(ParseIntervalError::UnknownUnit {
                    spec: spec.to_string(),
                    unit: unit_str.trim().to_string(),
                });
            }
        };

        duration
            .map(IntervalSpec::Duration)
            .context(TooLargeSnafu { spec })
    }
}

impl IntervalSpec {
    /// Parse a human-friendly interval spec (e.g. `15m`, `500ms`, `2`).
    ///
    /// # Errors
    /// Returns [`ParseIntervalError`] if the spec is empty, has an invalid or
    /// non-positive number, overflows, or uses an unsupported unit.
    pub fn parse(spec: &str) -> Result<Self, ParseIntervalError> {
        spec.parse()
    }

    /// Resolve this spec into a [`SamplingInterval`] in the native units of
    /// `column` (whose type is `data_type`).
    ///
    /// Durations only resolve against timestamp columns; native numbers are
    /// accepted for any column.
    pub fn resolve(
        &self,
        column: &str,
        data_type: &DataType,
    ) -> Result<SamplingInterval, IntervalError> {
        let duration = match self {
            IntervalSpec::Native(interval) => return Ok(*interval),
            IntervalSpec::Duration(duration) => *duration,
        };

        let DataType::Timestamp(unit, _) = data_type else {
            return DurationOnNonTimeColumnSnafu {
                column,
                data_type: data_type.clone(),
                spec: self.to_string(),
            }
            .fail();
        };

        let native = match unit {
            TimeUnit::Second => Some(duration.num_milliseconds() as f64 / 1_000.0),
            TimeUnit::Millisecond => Some(duration.num_milliseconds() as f64),
            TimeUnit::Microsecond => duration.num_microseconds().map(|v| v as f64),
            TimeUnit::Nanosecond => duration.num_nanoseconds().map(|v| v as f64),
        };

        native
            .and_then(SamplingInterval::new)
            .context(DurationOverflowSnafu {
                column,
                unit: *unit,
                spec: self.to_string(),
            })
    }
}

impl fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalSpec::Native(interval) => write!(f, "{interval}"),
            IntervalSpec::Duration(duration) => write!(f, "{}ms", duration.num_milliseconds()),
        }
    }
}

/// Return `field` with `interval` recorded in its metadata.
pub fn with_interval(field: Field, interval: SamplingInterval) -> Field {
    let mut metadata = field.metadata().clone();
    metadata.insert(INTERVAL_METADATA_KEY.to_string(), interval.to_string());
    field.with_metadata(metadata)
}

fn without_interval(field: Field) -> Field {
    if !field.metadata().contains_key(INTERVAL_METADATA_KEY) {
        return field;
    }
    let metadata: HashMap<String, String> = field
        .metadata()
        .iter()
        .filter(|(k, _)| k.as_str() != INTERVAL_METADATA_KEY)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    field.with_metadata(metadata)
}

/// Return a copy of `batch` where `column` carries `interval` and no other
/// column carries an interval.
///
/// Column data is shared with the input; only the schema is rebuilt.
pub fn batch_with_interval(
    batch: &RecordBatch,
    column: &str,
    interval: SamplingInterval,
) -> Result<RecordBatch, IntervalError> {
    let schema = batch.schema_ref();
    let (index, _) = schema
        .column_with_name(column)
        .context(ColumnNotFoundSnafu { column })?;

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let f = f.as_ref().clone();
            if i == index {
                with_interval(f, interval)
            } else {
                without_interval(f)
            }
        })
        .collect();

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    RecordBatch::try_new(schema, batch.columns().to_vec()).context(ArrowSnafu)
}
