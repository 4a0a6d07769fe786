//! Data quality scoring.
//!
//! This module scores the final dataset on completeness, class balance and
//! size adequacy, each on a 0-100 scale.

mod scorer;

pub use scorer::QualityScorer;
