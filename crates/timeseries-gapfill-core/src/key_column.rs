//! Key column discovery and typed access to key values.
//!
//! The key column is the one column whose spacing drives gap detection. It
//! must be a timestamp or a plain numeric column; its values are read into a
//! [`KeyValues`] buffer (exact `i64` for integer-backed columns, `f64` for
//! floating-point ones) and the filled key column is rebuilt from the same
//! buffer type, then cast back to the original Arrow data type so units and
//! timezones survive.

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, AsArray, Float64Builder, Int64Builder},
    compute::cast,
    datatypes::{DataType, Field, Float64Type, Int64Type, TimeUnit},
    error::ArrowError,
    record_batch::RecordBatch,
};

use crate::{
    fill::{GapFillOptions, SkipReason},
    interval::SamplingInterval,
};

/// The kinds of column that can act as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// A timestamp column of the given unit (timezone is irrelevant to spacing).
    Time(TimeUnit),
    /// A signed or unsigned integer column.
    Integer,
    /// A floating-point column.
    Float,
}

impl KeyKind {
    /// Classify `data_type`, returning `None` for kinds that cannot be keys
    /// (strings, booleans, dates, nested types, ...).
    pub fn of(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Timestamp(unit, _) => Some(KeyKind::Time(*unit)),
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Some(KeyKind::Integer),
            DataType::Float32 | DataType::Float64 => Some(KeyKind::Float),
            _ => None,
        }
    }

    fn is_integer_backed(self) -> bool {
        !matches!(self, KeyKind::Float)
    }
}

/// Key values in a uniform numeric representation.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValues {
    /// Timestamps and integer columns.
    Int(Vec<i64>),
    /// Floating-point columns.
    Float(Vec<f64>),
}

impl KeyValues {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            KeyValues::Int(v) => v.len(),
            KeyValues::Float(v) => v.len(),
        }
    }

    /// True when there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First row `i` with `key[i] > key[i + 1]`, compared in the native
    /// representation.
    pub fn first_descent(&self) -> Option<usize> {
        match self {
            KeyValues::Int(v) => v.windows(2).position(|w| w[0] > w[1]),
            KeyValues::Float(v) => v.windows(2).position(|w| w[0] > w[1]),
        }
    }
}

/// The resolved key column of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyColumn {
    /// Position of the column in the batch.
    pub index: usize,
    /// Column name.
    pub name: String,
    /// Original Arrow data type, restored on rebuild.
    pub data_type: DataType,
    /// Key classification.
    pub kind: KeyKind,
    /// Expected spacing between consecutive keys, in native units.
    pub interval: SamplingInterval,
}

impl KeyColumn {
    /// Pick the key column of `batch`.
    ///
    /// Selection rules:
    /// - `options.key_column` names the column explicitly;
    /// - otherwise, with `options.interval` set, the first timestamp column;
    /// - otherwise, the first column carrying interval metadata.
    ///
    /// The interval is `options.interval` when given, else the column's
    /// metadata.
    pub fn locate(batch: &RecordBatch, options: &GapFillOptions) -> Result<Self, SkipReason> {
        let schema = batch.schema_ref();

        let (index, field) = match (&options.key_column, options.interval) {
            (Some(name), _) => {
                schema
                    .column_with_name(name)
                    .ok_or_else(|| SkipReason::KeyColumnNotFound {
                        column: name.clone(),
                    })?
            }
            (None, Some(_)) => schema
                .fields()
                .iter()
                .enumerate()
                .find(|(_, f)| matches!(KeyKind::of(f.data_type()), Some(KeyKind::Time(_))))
                .map(|(i, f)| (i, f.as_ref()))
                .ok_or(SkipReason::NoTimeColumn)?,
            (None, None) => first_interval_field(schema.fields().iter().map(|f| f.as_ref()))?,
        };

        let interval = match options.interval {
            Some(interval) => interval,
            None => interval_of(field)?,
        };

        let kind = KeyKind::of(field.data_type()).ok_or_else(|| SkipReason::UnsupportedKeyType {
            column: field.name().clone(),
            data_type: field.data_type().clone(),
        })?;

        Ok(KeyColumn {
            index,
            name: field.name().clone(),
            data_type: field.data_type().clone(),
            kind,
            interval,
        })
    }

    /// Read the key values of `batch`.
    ///
    /// Fails (as a skip) on nulls, NaNs, and unsigned values above `i64::MAX`.
    pub fn values(&self, batch: &RecordBatch) -> Result<KeyValues, SkipReason> {
        let array = batch.column(self.index);
        if array.null_count() > 0 {
            return Err(SkipReason::NullKey {
                column: self.name.clone(),
            });
        }

        let cast_err = |e: ArrowError| SkipReason::KeyCast {
            column: self.name.clone(),
            message: e.to_string(),
        };

        if self.kind.is_integer_backed() {
            let ints = cast(array.as_ref(), &DataType::Int64).map_err(cast_err)?;
            // Safe casts turn out-of-range u64 values into nulls.
            if ints.null_count() > 0 {
                return Err(SkipReason::KeyOutOfRange {
                    column: self.name.clone(),
                });
            }
            Ok(KeyValues::Int(
                ints.as_primitive::<Int64Type>().values().to_vec(),
            ))
        } else {
            let floats = cast(array.as_ref(), &DataType::Float64).map_err(cast_err)?;
            let values = floats.as_primitive::<Float64Type>().values().to_vec();
            if values.iter().any(|v| v.is_nan()) {
                return Err(SkipReason::NanKey {
                    column: self.name.clone(),
                });
            }
            Ok(KeyValues::Float(values))
        }
    }

    /// Smallest and largest keys the column type can hold, as read into
    /// `i64` (unsigned 64-bit keys are capped at `i64::MAX`).
    pub(crate) fn int_domain(&self) -> (i64, i64) {
        match self.data_type {
            DataType::Int8 => (i8::MIN.into(), i8::MAX.into()),
            DataType::Int16 => (i16::MIN.into(), i16::MAX.into()),
            DataType::Int32 => (i32::MIN.into(), i32::MAX.into()),
            DataType::UInt8 => (0, u8::MAX.into()),
            DataType::UInt16 => (0, u16::MAX.into()),
            DataType::UInt32 => (0, u32::MAX.into()),
            DataType::UInt64 => (0, i64::MAX),
            _ => (i64::MIN, i64::MAX),
        }
    }

    /// Finite range of a floating-point key column.
    pub(crate) fn float_domain(&self) -> (f64, f64) {
        match self.data_type {
            DataType::Float32 => (f32::MIN.into(), f32::MAX.into()),
            _ => (f64::MIN, f64::MAX),
        }
    }

    /// Build an array of this column's original type from `keys`.
    pub fn build(&self, keys: &KeyValues) -> Result<ArrayRef, ArrowError> {
        let array: ArrayRef = match keys {
            KeyValues::Int(values) => {
                let mut builder = Int64Builder::with_capacity(values.len());
                builder.append_slice(values);
                Arc::new(builder.finish())
            }
            KeyValues::Float(values) => {
                let mut builder = Float64Builder::with_capacity(values.len());
                builder.append_slice(values);
                Arc::new(builder.finish())
            }
        };

        if array.data_type() == &self.data_type {
            Ok(array)
        } else {
            cast(array.as_ref(), &self.data_type)
        }
    }
}

fn interval_of(field: &Field) -> Result<SamplingInterval, SkipReason> {
    SamplingInterval::from_field(field).ok_or_else(|| invalid_interval(field))
}

fn invalid_interval(field: &Field) -> SkipReason {
    match field.metadata().get(crate::interval::INTERVAL_METADATA_KEY) {
        Some(raw) => SkipReason::InvalidInterval {
            column: field.name().clone(),
            value: raw.clone(),
        },
        None => SkipReason::NoInterval,
    }
}

/// First field with a usable interval; if none is usable but some field
/// carries unusable metadata, report that one.
fn first_interval_field<'a>(
    fields: impl Iterator<Item = &'a Field>,
) -> Result<(usize, &'a Field), SkipReason> {
    let mut first_invalid = None;
    for (i, field) in fields.enumerate() {
        if !field
            .metadata()
            .contains_key(crate::interval::INTERVAL_METADATA_KEY)
        {
            continue;
        }
        if SamplingInterval::from_field(field).is_some() {
            return Ok((i, field));
        }
        first_invalid.get_or_insert_with(|| invalid_interval(field));
    }
    Err(first_invalid.unwrap_or(SkipReason::NoInterval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::with_interval;
    use arrow::array::{
        Float32Array, Int32Array, StringArray, TimestampMillisecondArray, UInt64Array,
    };
    use arrow::datatypes::Schema;
    use std::collections::HashMap;

    fn iv(v: f64) -> SamplingInterval {
        SamplingInterval::new(v).unwrap()
    }

    fn batch(fields: Vec<Field>, columns: Vec<ArrayRef>) -> RecordBatch {
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    #[test]
    fn kind_classification() {
        assert_eq!(
            KeyKind::of(&DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))),
            Some(KeyKind::Time(TimeUnit::Nanosecond))
        );
        assert_eq!(KeyKind::of(&DataType::UInt16), Some(KeyKind::Integer));
        assert_eq!(KeyKind::of(&DataType::Float32), Some(KeyKind::Float));
        assert_eq!(KeyKind::of(&DataType::Utf8), None);
        assert_eq!(KeyKind::of(&DataType::Boolean), None);
        assert_eq!(KeyKind::of(&DataType::Date32), None);
    }

    #[test]
    fn locate_prefers_metadata_column() {
        let b = batch(
            vec![
                Field::new("a", DataType::Int32, false),
                with_interval(Field::new("b", DataType::Int32, false), iv(3.0)),
            ],
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(Int32Array::from(vec![3, 6])),
            ],
        );
        let key = KeyColumn::locate(&b, &GapFillOptions::default()).unwrap();
        assert_eq!(key.index, 1);
        assert_eq!(key.name, "b");
        assert_eq!(key.interval.get(), 3.0);
        assert_eq!(key.kind, KeyKind::Integer);
    }

    #[test]
    fn locate_reports_invalid_metadata() {
        let field = Field::new("a", DataType::Int32, false).with_metadata(HashMap::from([(
            crate::interval::INTERVAL_METADATA_KEY.to_string(),
            "-2".to_string(),
        )]));
        let b = batch(vec![field], vec![Arc::new(Int32Array::from(vec![1, 2]))]);
        let err = KeyColumn::locate(&b, &GapFillOptions::default()).unwrap_err();
        assert_eq!(
            err,
            SkipReason::InvalidInterval {
                column: "a".to_string(),
                value: "-2".to_string()
            }
        );
    }

    #[test]
    fn locate_with_interval_override_picks_first_time_column() {
        let b = batch(
            vec![
                Field::new("v", DataType::Float32, true),
                Field::new(
                    "ts",
                    DataType::Timestamp(TimeUnit::Millisecond, None),
                    false,
                ),
            ],
            vec![
                Arc::new(Float32Array::from(vec![1.0, 2.0])),
                Arc::new(TimestampMillisecondArray::from(vec![0, 1_000])),
            ],
        );
        let options = GapFillOptions {
            interval: Some(iv(500.0)),
            ..Default::default()
        };
        let key = KeyColumn::locate(&b, &options).unwrap();
        assert_eq!(key.name, "ts");
        assert_eq!(key.kind, KeyKind::Time(TimeUnit::Millisecond));

        let no_time = batch(
            vec![Field::new("v", DataType::Float32, true)],
            vec![Arc::new(Float32Array::from(vec![1.0, 2.0]))],
        );
        assert_eq!(
            KeyColumn::locate(&no_time, &options).unwrap_err(),
            SkipReason::NoTimeColumn
        );
    }

    #[test]
    fn locate_rejects_text_key() {
        let b = batch(
            vec![with_interval(Field::new("s", DataType::Utf8, false), iv(1.0))],
            vec![Arc::new(StringArray::from(vec!["a", "b"]))],
        );
        let err = KeyColumn::locate(&b, &GapFillOptions::default()).unwrap_err();
        assert!(matches!(err, SkipReason::UnsupportedKeyType { column, .. } if column == "s"));
    }

    #[test]
    fn values_reject_oversized_unsigned() {
        let b = batch(
            vec![with_interval(Field::new("u", DataType::UInt64, false), iv(1.0))],
            vec![Arc::new(UInt64Array::from(vec![1, u64::MAX]))],
        );
        let key = KeyColumn::locate(&b, &GapFillOptions::default()).unwrap();
        assert_eq!(
            key.values(&b).unwrap_err(),
            SkipReason::KeyOutOfRange {
                column: "u".to_string()
            }
        );
    }

    #[test]
    fn first_descent_finds_out_of_order_pair() {
        assert_eq!(KeyValues::Int(vec![1, 2, 2, 3]).first_descent(), None);
        assert_eq!(KeyValues::Int(vec![1, 3, 2]).first_descent(), Some(1));
        assert_eq!(KeyValues::Float(vec![0.5, 0.25]).first_descent(), Some(0));
    }

    #[test]
    fn domains_follow_the_data_type() {
        let key = |data_type: DataType| KeyColumn {
            index: 0,
            name: "k".to_string(),
            kind: KeyKind::of(&data_type).unwrap(),
            data_type,
            interval: iv(1.0),
        };
        assert_eq!(key(DataType::UInt8).int_domain(), (0, 255));
        assert_eq!(key(DataType::Int16).int_domain(), (-32_768, 32_767));
        assert_eq!(key(DataType::UInt64).int_domain(), (0, i64::MAX));
        assert_eq!(
            key(DataType::Timestamp(TimeUnit::Nanosecond, None)).int_domain(),
            (i64::MIN, i64::MAX)
        );
        assert_eq!(
            key(DataType::Float32).float_domain(),
            (f32::MIN as f64, f32::MAX as f64)
        );
    }

    #[test]
    fn build_restores_timestamp_type_and_timezone() {
        let dt = DataType::Timestamp(TimeUnit::Millisecond, Some("America/New_York".into()));
        let key = KeyColumn {
            index: 0,
            name: "ts".to_string(),
            data_type: dt.clone(),
            kind: KeyKind::Time(TimeUnit::Millisecond),
            interval: iv(1_000.0),
        };
        let array = key.build(&KeyValues::Int(vec![0, 1_000, 2_000])).unwrap();
        assert_eq!(array.data_type(), &dt);
        assert_eq!(array.len(), 3);
    }
}
