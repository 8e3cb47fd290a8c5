//! Commit aggregation into report statistics.

pub mod aggregate;
pub mod category;
pub mod delta;

pub use aggregate::{
    AreaCount, CategoryCounts, FileActivity, Statistics, aggregate, aggregate_with_prior,
};
pub use category::{Category, ConventionalPrefix, categorize, parse_prefix};
pub use delta::{Comparison, Delta, Headline};
