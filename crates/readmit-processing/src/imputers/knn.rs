use crate::utils::{median, numeric_values};
use polars::prelude::*;

/// Single-column nearest-neighbour imputer.
///
/// Only the column itself is consulted. A missing entry carries no
/// coordinate of its own, so it is placed at the column's observed median
/// and filled with the mean of the `k` observed values nearest to that
/// point. Ties in distance go to the earlier row.
pub struct KNNImputer {
    n_neighbors: usize,
}

impl KNNImputer {
    /// Create a new KNN imputer with specified number of neighbors
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
        }
    }

    /// Value used for every missing entry, or `None` without observations.
    pub fn estimate(&self, values: &[Option<f64>]) -> Option<f64> {
        let anchor = median(values)?;

        let mut neighbours: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .filter_map(|(row, v)| v.map(|v| (row, v)))
            .collect();
        neighbours.sort_by(|(a_row, a), (b_row, b)| {
            (a - anchor)
                .abs()
                .total_cmp(&(b - anchor).abs())
                .then(a_row.cmp(b_row))
        });

        let k = self.n_neighbors.min(neighbours.len());
        let sum: f64 = neighbours[..k].iter().map(|(_, v)| v).sum();
        Some(sum / k as f64)
    }

    /// Fill the missing entries of a numeric series.
    ///
    /// Returns `None` when the series has no observed values.
    pub fn fit_transform(&self, series: &Series) -> PolarsResult<Option<(Series, f64)>> {
        let values = numeric_values(series)?;
        let Some(fill) = self.estimate(&values) else {
            return Ok(None);
        };

        let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
        Ok(Some((Series::new(series.name().clone(), filled), fill)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_uses_values_nearest_the_median() {
        let imputer = KNNImputer::new(3);
        // median 5; nearest three are 4, 5, 6
        let values = [Some(1.0), Some(4.0), None, Some(5.0), Some(6.0), Some(100.0)];
        assert_eq!(imputer.estimate(&values), Some(5.0));
    }

    #[test]
    fn test_estimate_with_fewer_observations_than_k() {
        let imputer = KNNImputer::new(5);
        assert_eq!(imputer.estimate(&[Some(2.0), None, Some(4.0)]), Some(3.0));
        assert_eq!(imputer.estimate(&[None, None]), None);
    }

    #[test]
    fn test_zero_neighbours_is_treated_as_one() {
        let imputer = KNNImputer::new(0);
        assert_eq!(imputer.estimate(&[Some(1.0), Some(2.0), Some(9.0)]), Some(2.0));
    }

    #[test]
    fn test_fit_transform_fills_every_gap() {
        let imputer = KNNImputer::new(2);
        let series = Series::new("x".into(), &[Some(10), None, Some(20), None, Some(30)]);
        let (filled, fill) = imputer.fit_transform(&series).unwrap().unwrap();

        // median 20; nearest two are 20 and then 10 (earlier row wins the tie with 30)
        assert_eq!(fill, 15.0);
        assert_eq!(filled.null_count(), 0);
        assert_eq!(filled.f64().unwrap().get(3), Some(15.0));
        assert_eq!(filled.f64().unwrap().get(4), Some(30.0));
    }
}
