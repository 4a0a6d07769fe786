use crate::config::PipelineConfig;
use crate::types::QualityScore;
use crate::utils::numeric_values;
use polars::prelude::*;

/// Computes the 0-100 quality score of a dataset.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    target_column: String,
    target_rows: usize,
}

impl QualityScorer {
    pub fn new(target_column: impl Into<String>, target_rows: usize) -> Self {
        Self {
            target_column: target_column.into(),
            target_rows: target_rows.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.schema.target_column.clone(), config.target_rows)
    }

    /// `100 * (1 - missing cells / all cells)`; an empty dataset is complete.
    pub fn completeness(df: &DataFrame) -> f64 {
        let cells = df.height() * df.width();
        if cells == 0 {
            return 100.0;
        }
        let missing: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
        100.0 * (1.0 - missing as f64 / cells as f64)
    }

    /// `100 * min(class count) / max(class count)` over both classes, or
    /// `None` when the target column is absent.
    pub fn class_balance(&self, df: &DataFrame) -> Option<f64> {
        let target = df.column(&self.target_column).ok()?;
        let values = numeric_values(target.as_materialized_series()).ok()?;

        let positives = values.iter().flatten().filter(|v| **v != 0.0).count();
        let negatives = values.iter().flatten().count() - positives;
        let largest = positives.max(negatives);
        if largest == 0 {
            return Some(0.0);
        }
        Some((100.0 * positives.min(negatives) as f64 / largest as f64).min(100.0))
    }

    /// `100 * min(rows / target rows, 1)`.
    pub fn size_adequacy(&self, df: &DataFrame) -> f64 {
        100.0 * (df.height() as f64 / self.target_rows as f64).min(1.0)
    }

    /// Mean of the available sub-scores.
    pub fn score(&self, df: &DataFrame) -> QualityScore {
        let completeness = Self::completeness(df);
        let class_balance = self.class_balance(df);
        let size_adequacy = self.size_adequacy(df);

        let parts: Vec<f64> = [Some(completeness), class_balance, Some(size_adequacy)]
            .into_iter()
            .flatten()
            .collect();
        let overall = parts.iter().sum::<f64>() / parts.len() as f64;

        QualityScore {
            completeness,
            class_balance,
            size_adequacy,
            overall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_score_averages_three_parts() {
        let df = df!(
            "x" => [Some(1.0), None, Some(3.0), Some(4.0)],
            "readmitted_30_days" => [0, 0, 0, 1]
        )
        .unwrap();
        let score = QualityScorer::new("readmitted_30_days", 8).score(&df);

        assert_eq!(score.completeness, 87.5);
        assert!((score.class_balance.unwrap() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(score.size_adequacy, 50.0);
        let expected = (87.5 + 100.0 / 3.0 + 50.0) / 3.0;
        assert!((score.overall - expected).abs() < 1e-9);
    }

    #[test]
    fn test_missing_target_drops_balance() {
        let df = df!("x" => [1.0, 2.0]).unwrap();
        let score = QualityScorer::new("readmitted_30_days", 2).score(&df);
        assert_eq!(score.class_balance, None);
        assert_eq!(score.overall, 100.0);
    }

    #[test]
    fn test_single_class_and_empty_datasets() {
        let df = df!("readmitted_30_days" => [0, 0, 0]).unwrap();
        let scorer = QualityScorer::new("readmitted_30_days", 50_000);
        assert_eq!(scorer.class_balance(&df), Some(0.0));

        let empty = DataFrame::empty();
        assert_eq!(QualityScorer::completeness(&empty), 100.0);
        let score = scorer.score(&empty);
        assert!(score.overall.is_finite());
        assert!((0.0..=100.0).contains(&score.overall));
    }
}
