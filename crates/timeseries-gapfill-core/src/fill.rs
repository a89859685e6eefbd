//! Gap filling for evenly sampled batches.
//!
//! Given a batch whose key column (timestamp or numeric) is nondecreasing
//! and carries a sampling interval, [`fill_gaps`] returns a batch where every
//! sample the interval implies is missing is present as a synthetic row:
//!
//! - For each consecutive pair `(key[i], key[i+1])` the number of whole steps
//!   is `round((key[i+1] - key[i]) / interval)`, rounding half away from zero
//!   (half-up, since differences are nonnegative).
//! - `steps <= 1` leaves the pair alone, so spacing only needs to be close to
//!   the interval, not exact.
//! - Otherwise `steps - 1` rows are inserted with keys `key[i] + interval`,
//!   `key[i] + 2*interval`, ... obtained by repeated addition from the left
//!   endpoint. Drift may accumulate inside one gap but resets at each
//!   original sample; nothing is snapped to a global grid.
//! - Synthetic rows hold nulls in every non-key column. Original rows are
//!   never dropped or reordered.
//!
//! Integer and timestamp keys are handled in exact integer arithmetic, so a
//! nanosecond key gets exactly `key[i] + k * interval`. Their interval must
//! be a whole number of ticks; anything else is skipped, since rounding
//! synthetic keys to ticks would break idempotence. Range extension is
//! clamped to what the key's data type can hold.
//!
//! Round-half-up keeps the operation idempotent: after a fill, the ratio
//! between the last synthetic key and the next original key lies in
//! `[0.5, 1.5)`, which rounds to a single step.
//!
//! The filler never returns an error. Any disqualifying input (no interval,
//! unsupported key type, fewer than two rows, nulls or out-of-order keys, ...)
//! yields the input batch unchanged together with a [`SkipReason`].
//!
//! The output is assembled append-only: a "take plan" of row indices is
//! built with a null index for each synthetic row, non-key columns are
//! gathered with Arrow's `take` kernel (null index -> null value), and the
//! key column is rebuilt from the planned key values.

use std::{fmt, sync::Arc};

use arrow::{
    array::{ArrayRef, UInt64Builder},
    compute::take,
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    interval::SamplingInterval,
    key_column::{KeyColumn, KeyValues},
};

/// Default ceiling on the number of rows a fill may produce.
pub const DEFAULT_MAX_OUTPUT_ROWS: usize = 10_000_000;

/// How many synthetic rows a gap receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// One synthetic row for every missing step.
    #[default]
    All,
    /// A single synthetic row at `key[i] + interval`, enough to break a line.
    Break,
}

/// Bounds to extend filling beyond the first and last samples, in the key
/// column's native units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FillRange {
    /// Fill backwards from the first key while `key - k * interval >= min`.
    pub min: Option<f64>,
    /// Fill forwards from the last key while `key + k * interval <= max`.
    pub max: Option<f64>,
}

/// Configuration for a fill, passed explicitly at call time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFillOptions {
    /// Use this column as key instead of the first column carrying interval
    /// metadata.
    pub key_column: Option<String>,
    /// Interval override. Without `key_column`, the first timestamp column
    /// becomes the key.
    pub interval: Option<SamplingInterval>,
    /// Rows inserted per gap.
    pub mode: FillMode,
    /// Optional leading/trailing extension.
    pub range: Option<FillRange>,
    /// Skip (return the input unchanged) if the filled batch would exceed
    /// this many rows.
    pub max_output_rows: usize,
}

impl Default for GapFillOptions {
    fn default() -> Self {
        GapFillOptions {
            key_column: None,
            interval: None,
            mode: FillMode::All,
            range: None,
            max_output_rows: DEFAULT_MAX_OUTPUT_ROWS,
        }
    }
}

/// Why a batch was returned unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No column carries interval metadata and no override was given.
    NoInterval,
    /// Interval metadata is present but not a finite number > 0.
    InvalidInterval {
        /// Column carrying the metadata.
        column: String,
        /// Raw metadata value.
        value: String,
    },
    /// The configured key column does not exist.
    KeyColumnNotFound {
        /// Requested column name.
        column: String,
    },
    /// An interval override was given without a key column and the batch has
    /// no timestamp column.
    NoTimeColumn,
    /// The key column is neither a timestamp nor numeric.
    UnsupportedKeyType {
        /// Key column name.
        column: String,
        /// Its data type.
        data_type: DataType,
    },
    /// Fewer than two rows; spacing cannot be inferred.
    TooFewRows {
        /// Row count of the input.
        rows: usize,
    },
    /// The key column contains nulls.
    NullKey {
        /// Key column name.
        column: String,
    },
    /// A floating-point key is NaN.
    NanKey {
        /// Key column name.
        column: String,
    },
    /// A key (read, or synthesized next to the `i64` limits) does not fit
    /// in `i64`.
    KeyOutOfRange {
        /// Key column name.
        column: String,
    },
    /// An integer or timestamp key with an interval that is not a whole
    /// number of ticks; synthetic keys could not land on exact multiples.
    FractionalInterval {
        /// Key column name.
        column: String,
        /// The configured interval.
        interval: f64,
    },
    /// Key values could not be read.
    KeyCast {
        /// Key column name.
        column: String,
        /// Arrow error message.
        message: String,
    },
    /// `key[row] > key[row + 1]`.
    OutOfOrder {
        /// Key column name.
        column: String,
        /// First row whose successor is smaller.
        row: usize,
    },
    /// The filled batch would exceed `max_output_rows`.
    TooManyRows {
        /// Rows the fill would produce.
        required: usize,
        /// Configured ceiling.
        limit: usize,
    },
    /// Assembling the output batch failed.
    Rebuild {
        /// Arrow error message.
        message: String,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoInterval => write!(f, "no column carries a sampling interval"),
            SkipReason::InvalidInterval { column, value } => {
                write!(f, "interval {value:?} on column {column} is not a number > 0")
            }
            SkipReason::KeyColumnNotFound { column } => {
                write!(f, "key column {column} not found")
            }
            SkipReason::NoTimeColumn => write!(f, "no timestamp column to use as key"),
            SkipReason::UnsupportedKeyType { column, data_type } => {
                write!(f, "key column {column} has unsupported type {data_type}")
            }
            SkipReason::TooFewRows { rows } => write!(f, "{rows} row(s); need at least 2"),
            SkipReason::NullKey { column } => write!(f, "key column {column} contains nulls"),
            SkipReason::NanKey { column } => write!(f, "key column {column} contains NaN"),
            SkipReason::KeyOutOfRange { column } => {
                write!(f, "key column {column} has values outside the i64 range")
            }
            SkipReason::FractionalInterval { column, interval } => write!(
                f,
                "interval {interval} is not a whole number of ticks for key column {column}"
            ),
            SkipReason::KeyCast { column, message } => {
                write!(f, "cannot read key column {column}: {message}")
            }
            SkipReason::OutOfOrder { column, row } => {
                write!(f, "key column {column} decreases after row {row}")
            }
            SkipReason::TooManyRows { required, limit } => {
                write!(f, "fill would produce {required} rows (limit {limit})")
            }
            SkipReason::Rebuild { message } => write!(f, "failed to assemble output: {message}"),
        }
    }
}

/// What a fill did.
#[derive(Debug, Clone, PartialEq)]
pub enum GapFillOutcome {
    /// Preconditions held; `inserted_rows` may be zero.
    Filled {
        /// Key column used.
        key_column: String,
        /// Synthetic rows added.
        inserted_rows: usize,
        /// Gaps (including range extensions) that received rows.
        gaps: usize,
    },
    /// The input was returned unchanged.
    Skipped(SkipReason),
}

impl GapFillOutcome {
    /// Synthetic rows added (zero when skipped).
    pub fn inserted_rows(&self) -> usize {
        match self {
            GapFillOutcome::Filled { inserted_rows, .. } => *inserted_rows,
            GapFillOutcome::Skipped(_) => 0,
        }
    }

    /// The skip reason, if the fill was skipped.
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            GapFillOutcome::Skipped(reason) => Some(reason),
            GapFillOutcome::Filled { .. } => None,
        }
    }
}

/// A filled batch plus its outcome.
#[derive(Debug, Clone)]
pub struct GapFill {
    /// The output batch (the input itself when nothing was inserted).
    pub batch: RecordBatch,
    /// What happened.
    pub outcome: GapFillOutcome,
}

/// Fill gaps using the interval attached to the batch's key column.
pub fn fill_gaps(batch: &RecordBatch) -> RecordBatch {
    fill_gaps_with(batch, &GapFillOptions::default()).batch
}

/// Fill each batch independently.
pub fn fill_gaps_batches(batches: &[RecordBatch], options: &GapFillOptions) -> Vec<RecordBatch> {
    batches
        .iter()
        .map(|batch| fill_gaps_with(batch, options).batch)
        .collect()
}

/// Fill gaps with explicit options, reporting what happened.
pub fn fill_gaps_with(batch: &RecordBatch, options: &GapFillOptions) -> GapFill {
    match try_fill(batch, options) {
        Ok((filled, outcome)) => {
            debug!(
                "Gap fill: {} -> {} rows ({} inserted)",
                batch.num_rows(),
                filled.num_rows(),
                outcome.inserted_rows()
            );
            GapFill {
                batch: filled,
                outcome,
            }
        }
        Err(reason) => {
            if matches!(reason, SkipReason::Rebuild { .. }) {
                warn!("Gap fill skipped: {reason}");
            } else {
                debug!("Gap fill skipped: {reason}");
            }
            GapFill {
                batch: batch.clone(),
                outcome: GapFillOutcome::Skipped(reason),
            }
        }
    }
}

fn try_fill(
    batch: &RecordBatch,
    options: &GapFillOptions,
) -> Result<(RecordBatch, GapFillOutcome), SkipReason> {
    let key = KeyColumn::locate(batch, options)?;

    let rows = batch.num_rows();
    if rows < 2 {
        return Err(SkipReason::TooFewRows { rows });
    }

    let values = key.values(batch)?;
    if let Some(row) = values.first_descent() {
        return Err(SkipReason::OutOfOrder {
            column: key.name.clone(),
            row,
        });
    }

    let range = options.range.unwrap_or_default();
    let plan = match &values {
        KeyValues::Int(keys) => {
            let axis = Ticks::new(&key, range)?;
            plan_fill(keys, axis, options, &key.name)?.finish(KeyValues::Int)
        }
        KeyValues::Float(keys) => {
            let axis = Real::new(&key, range);
            plan_fill(keys, axis, options, &key.name)?.finish(KeyValues::Float)
        }
    };

    let outcome = GapFillOutcome::Filled {
        key_column: key.name.clone(),
        inserted_rows: plan.inserted,
        gaps: plan.gaps,
    };

    if plan.inserted == 0 {
        return Ok((batch.clone(), outcome));
    }

    let filled = assemble(batch, &key, plan).map_err(|e| SkipReason::Rebuild {
        message: e.to_string(),
    })?;
    Ok((filled, outcome))
}

/// Number of whole steps between two keys, rounded half away from zero.
fn steps_between(left: f64, right: f64, interval: f64) -> f64 {
    ((right - left) / interval).round()
}

/// Missing samples between two keys (`steps - 1`, never negative).
fn missing_between(left: f64, right: f64, interval: f64) -> usize {
    let steps = steps_between(left, right, interval);
    if steps > 1.0 {
        // `as` saturates for absurd gaps; the row ceiling catches those.
        (steps - 1.0) as usize
    } else {
        0
    }
}

/// Whole steps that fit in `span` (for range extension).
fn steps_within(span: f64, interval: f64) -> usize {
    let steps = (span / interval).floor();
    if steps >= 1.0 { steps as usize } else { 0 }
}

/// Ticks above this can never produce a second step between two `i64` keys.
const MAX_TICK: f64 = (1u128 << 80) as f64;

fn saturating_usize(n: i128) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}

/// Spacing arithmetic in one key representation.
trait Axis {
    type Key: Copy;

    /// Samples missing strictly between `left` and `right`.
    fn missing(&self, left: Self::Key, right: Self::Key) -> usize;

    /// Whole steps from `first` down to the lower range bound.
    fn leading(&self, first: Self::Key) -> usize;

    /// Whole steps from `last` up to the upper range bound.
    fn trailing(&self, last: Self::Key) -> usize;

    /// The neighbouring sample one interval away, `None` outside the key type.
    fn step(&self, key: Self::Key, forward: bool) -> Option<Self::Key>;
}

/// Integer-backed keys (integers and timestamps): exact arithmetic on a
/// whole number of ticks.
struct Ticks {
    tick: i128,
    lo: Option<i128>,
    hi: Option<i128>,
}

impl Ticks {
    fn new(key: &KeyColumn, range: FillRange) -> Result<Self, SkipReason> {
        let interval = key.interval.get();
        if interval.fract() != 0.0 {
            return Err(SkipReason::FractionalInterval {
                column: key.name.clone(),
                interval,
            });
        }

        // Range bounds are clamped to what the column type can hold; `as`
        // saturates infinities.
        let (type_min, type_max) = key.int_domain();
        Ok(Ticks {
            tick: interval.min(MAX_TICK) as i128,
            lo: range
                .min
                .filter(|v| !v.is_nan())
                .map(|v| (v.ceil() as i128).max(type_min.into())),
            hi: range
                .max
                .filter(|v| !v.is_nan())
                .map(|v| (v.floor() as i128).min(type_max.into())),
        })
    }
}

impl Axis for Ticks {
    type Key = i64;

    fn missing(&self, left: i64, right: i64) -> usize {
        let diff = i128::from(right) - i128::from(left);
        // floor(diff / tick + 1/2): round half up for nonnegative diffs.
        let steps = (2 * diff + self.tick) / (2 * self.tick);
        saturating_usize(steps - 1)
    }

    fn leading(&self, first: i64) -> usize {
        self.lo
            .map(|lo| saturating_usize((i128::from(first) - lo) / self.tick))
            .unwrap_or(0)
    }

    fn trailing(&self, last: i64) -> usize {
        self.hi
            .map(|hi| saturating_usize((hi - i128::from(last)) / self.tick))
            .unwrap_or(0)
    }

    fn step(&self, key: i64, forward: bool) -> Option<i64> {
        let delta = if forward { self.tick } else { -self.tick };
        i64::try_from(i128::from(key) + delta).ok()
    }
}

/// Floating-point keys.
struct Real {
    interval: f64,
    lo: Option<f64>,
    hi: Option<f64>,
}

impl Real {
    fn new(key: &KeyColumn, range: FillRange) -> Self {
        let (type_min, type_max) = key.float_domain();
        Real {
            interval: key.interval.get(),
            lo: range.min.filter(|v| !v.is_nan()).map(|v| v.max(type_min)),
            hi: range.max.filter(|v| !v.is_nan()).map(|v| v.min(type_max)),
        }
    }
}

impl Axis for Real {
    type Key = f64;

    fn missing(&self, left: f64, right: f64) -> usize {
        missing_between(left, right, self.interval)
    }

    fn leading(&self, first: f64) -> usize {
        self.lo
            .map(|lo| steps_within(first - lo, self.interval))
            .unwrap_or(0)
    }

    fn trailing(&self, last: f64) -> usize {
        self.hi
            .map(|hi| steps_within(hi - last, self.interval))
            .unwrap_or(0)
    }

    fn step(&self, key: f64, forward: bool) -> Option<f64> {
        Some(if forward {
            key + self.interval
        } else {
            key - self.interval
        })
    }
}

/// Output rows in order: a take index per row (null for synthetic rows)
/// and the key of every row.
struct FillPlan<K> {
    take: UInt64Builder,
    keys: Vec<K>,
    inserted: usize,
    gaps: usize,
}

impl<K: Copy> FillPlan<K> {
    fn original(&mut self, row: usize, key: K) {
        self.take.append_value(row as u64);
        self.keys.push(key);
    }

    fn synthetic(&mut self, key: K) {
        self.take.append_null();
        self.keys.push(key);
        self.inserted += 1;
    }

    fn finish(self, keys: impl FnOnce(Vec<K>) -> KeyValues) -> Planned {
        Planned {
            take: self.take,
            keys: keys(self.keys),
            inserted: self.inserted,
            gaps: self.gaps,
        }
    }
}

struct Planned {
    take: UInt64Builder,
    keys: KeyValues,
    inserted: usize,
    gaps: usize,
}

struct Planner<'a, A: Axis> {
    keys: &'a [A::Key],
    axis: A,
    mode: FillMode,
}

impl<A: Axis> Planner<'_, A> {
    fn per_gap(&self, missing: usize) -> usize {
        match self.mode {
            FillMode::All => missing,
            FillMode::Break => missing.min(1),
        }
    }

    fn leading(&self) -> usize {
        self.keys
            .first()
            .map_or(0, |&first| self.per_gap(self.axis.leading(first)))
    }

    fn trailing(&self) -> usize {
        self.keys
            .last()
            .map_or(0, |&last| self.per_gap(self.axis.trailing(last)))
    }

    fn count_insertions(&self) -> usize {
        let inner = self.keys.windows(2).fold(0usize, |acc, w| {
            acc.saturating_add(self.per_gap(self.axis.missing(w[0], w[1])))
        });
        inner
            .saturating_add(self.leading())
            .saturating_add(self.trailing())
    }

    /// `count` keys one interval apart, walking away from `origin`.
    fn run(&self, origin: A::Key, count: usize, forward: bool) -> Option<Vec<A::Key>> {
        let mut keys = Vec::with_capacity(count);
        let mut key = origin;
        for _ in 0..count {
            key = self.axis.step(key, forward)?;
            keys.push(key);
        }
        Some(keys)
    }

    fn plan(&self, capacity: usize) -> Option<FillPlan<A::Key>> {
        let mut plan = FillPlan {
            take: UInt64Builder::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            inserted: 0,
            gaps: 0,
        };

        let (Some(&first), Some(&last)) = (self.keys.first(), self.keys.last()) else {
            return Some(plan);
        };

        let leading = self.leading();
        if leading > 0 {
            for key in self.run(first, leading, false)?.into_iter().rev() {
                plan.synthetic(key);
            }
            plan.gaps += 1;
        }

        for (i, &left) in self.keys.iter().enumerate() {
            plan.original(i, left);
            let Some(&right) = self.keys.get(i + 1) else {
                break;
            };

            let count = self.per_gap(self.axis.missing(left, right));
            if count == 0 {
                continue;
            }
            for key in self.run(left, count, true)? {
                plan.synthetic(key);
            }
            plan.gaps += 1;
        }

        let trailing = self.trailing();
        if trailing > 0 {
            for key in self.run(last, trailing, true)? {
                plan.synthetic(key);
            }
            plan.gaps += 1;
        }

        Some(plan)
    }
}

fn plan_fill<A: Axis>(
    keys: &[A::Key],
    axis: A,
    options: &GapFillOptions,
    column: &str,
) -> Result<FillPlan<A::Key>, SkipReason> {
    let planner = Planner {
        keys,
        axis,
        mode: options.mode,
    };

    let required = keys.len().saturating_add(planner.count_insertions());
    if required > options.max_output_rows {
        return Err(SkipReason::TooManyRows {
            required,
            limit: options.max_output_rows,
        });
    }

    planner
        .plan(required)
        .ok_or_else(|| SkipReason::KeyOutOfRange {
            column: column.to_string(),
        })
}

fn assemble(
    batch: &RecordBatch,
    key: &KeyColumn,
    mut plan: Planned,
) -> Result<RecordBatch, ArrowError> {
    let indices = plan.take.finish();
    let schema = batch.schema_ref();

    let mut fields: Vec<Field> = Vec::with_capacity(batch.num_columns());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());

    for (i, (field, column)) in schema.fields().iter().zip(batch.columns()).enumerate() {
        if i == key.index {
            fields.push(field.as_ref().clone());
            columns.push(key.build(&plan.keys)?);
        } else {
            // Synthetic rows are null, so every data column becomes nullable.
            fields.push(field.as_ref().clone().with_nullable(true));
            columns.push(take(column.as_ref(), &indices, None)?);
        }
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    RecordBatch::try_new(schema, columns)
}
