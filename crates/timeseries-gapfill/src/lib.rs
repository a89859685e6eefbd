//! # timeseries-gapfill
//!
//! Null-fill missing samples in evenly sampled Arrow time-series batches.
//!
//! This crate is the supported public entry point and provides a small, stable surface.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use arrow::array::{Float64Array, Int64Array};
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use timeseries_gapfill::prelude::*;
//!
//! let schema = Schema::new(vec![
//!     with_interval(
//!         Field::new("t", DataType::Int64, false),
//!         SamplingInterval::new(1.0).unwrap(),
//!     ),
//!     Field::new("v", DataType::Float64, true),
//! ]);
//! let batch = RecordBatch::try_new(
//!     Arc::new(schema),
//!     vec![
//!         Arc::new(Int64Array::from(vec![1, 3])),
//!         Arc::new(Float64Array::from(vec![0.5, 1.5])),
//!     ],
//! )
//! .unwrap();
//!
//! let filled = fill_gaps(&batch);
//! assert_eq!(filled.num_rows(), 3);
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Interval configuration namespace (wrapper-only).
pub mod interval {
    pub use timeseries_gapfill_core::interval::{
        INTERVAL_METADATA_KEY, IntervalError, IntervalSpec, ParseIntervalError,
        SamplingInterval, batch_with_interval, with_interval,
    };
}

pub use timeseries_gapfill_core::fill::{
    DEFAULT_MAX_OUTPUT_ROWS, FillMode, FillRange, GapFill, GapFillOptions, GapFillOutcome,
    SkipReason, fill_gaps, fill_gaps_batches, fill_gaps_with,
};
pub use timeseries_gapfill_core::key_column::KeyKind;
