//! Core engine for filling gaps in evenly sampled time-series batches.
//!
//! This crate provides the building blocks for `timeseries-gapfill`:
//!
//! - Sampling interval configuration carried as Arrow field metadata, plus
//!   a human-friendly duration spec (`15m`, `500ms`, ...) that resolves into
//!   a column's native units (`interval` module).
//! - Key column discovery and typed extraction of key values for time and
//!   numeric columns (`key_column` module).
//! - The gap filler itself, which inserts null-valued rows wherever the
//!   interval implies missing samples (`fill` module).
//!
//! The filler never fails: every disqualifying input degrades to returning
//! the batch unchanged, with a [`fill::SkipReason`] available for
//! diagnostics. Higher-level crates (the CLI, the public wrapper) depend on
//! this core crate rather than re-implementing the transformation.
#![deny(missing_docs)]
pub mod fill;
pub mod interval;
pub mod key_column;

pub use fill::{
    FillMode, FillRange, GapFill, GapFillOptions, GapFillOutcome, SkipReason, fill_gaps,
    fill_gaps_batches, fill_gaps_with,
};
pub use interval::{
    INTERVAL_METADATA_KEY, IntervalError, IntervalSpec, ParseIntervalError, SamplingInterval,
    batch_with_interval, with_interval,
};
pub use key_column::{KeyColumn, KeyKind, KeyValues};
