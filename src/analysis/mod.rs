//! Aggregation of activation rows.
//!
//! Column resolution, the single-pass aggregator and cluster scoring.

pub mod aggregator;
pub mod fields;
pub mod targets;

pub use aggregator::*;
pub use fields::Field;
pub use targets::{scorecard, AchievementBand, Scorecard};
