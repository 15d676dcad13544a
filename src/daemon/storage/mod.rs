//!  Storage is organized through [aggregation_store::SqliteAggregationStore].
//!  The basic idea is:
//!   - Every tick is applied as increments to daily, hourly, per-app and per-key tables.
//!   - Rows are keyed by the local calendar date and only appear once something positive was
//!     recorded for them.
//!   - Queries fill in missing days and hours so callers always get fixed length ranges.

pub mod aggregation_store;
pub mod calendar;
pub mod entities;
