//! Wrapper prelude.
//!
//! The `timeseries-gapfill` crate is the supported public entry point.
//! Downstream code should prefer importing from this prelude instead of
//! depending on internal core module paths.

pub use crate::interval::{IntervalSpec, SamplingInterval, batch_with_interval, with_interval};
pub use crate::{
    FillMode, FillRange, GapFill, GapFillOptions, GapFillOutcome, SkipReason, fill_gaps,
    fill_gaps_batches, fill_gaps_with,
};
