//! Random forest impurity importance for a binary target.
//!
//! Trees are grown with the CART Gini criterion on bootstrap samples,
//! drawing `floor(sqrt(F))` candidate features per split. Each tree is
//! seeded with `seed + tree_index`, so results do not depend on how the
//! trees are scheduled across threads.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;

/// Ensemble settings.
#[derive(Debug, Clone, Copy)]
pub struct RandomForest {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

/// Column-major feature matrix with a binary label per row.
pub struct TrainingSet<'a> {
    pub features: &'a [Vec<f64>],
    pub labels: &'a [bool],
}

impl TrainingSet<'_> {
    fn n_rows(&self) -> usize {
        self.labels.len()
    }

    fn n_features(&self) -> usize {
        self.features.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ClassCounts {
    negative: usize,
    positive: usize,
}

impl ClassCounts {
    fn from_rows(rows: &[usize], labels: &[bool]) -> Self {
        let mut counts = Self::default();
        for &row in rows {
            counts.add(labels[row]);
        }
        counts
    }

    fn add(&mut self, label: bool) {
        if label {
            self.positive += 1;
        } else {
            self.negative += 1;
        }
    }

    fn remove(&mut self, label: bool) {
        if label {
            self.positive -= 1;
        } else {
            self.negative -= 1;
        }
    }

    fn total(&self) -> usize {
        self.negative + self.positive
    }

    fn gini(&self) -> f64 {
        let n = self.total() as f64;
        if n == 0.0 {
            return 0.0;
        }
        let p = self.positive as f64 / n;
        let q = self.negative as f64 / n;
        1.0 - p * p - q * q
    }

    /// Weighted impurity `n * gini`.
    fn weighted_gini(&self) -> f64 {
        self.total() as f64 * self.gini()
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

struct TreeGrower<'a> {
    data: &'a TrainingSet<'a>,
    max_depth: Option<usize>,
    max_features: usize,
    rng: StdRng,
    importances: Vec<f64>,
}

impl TreeGrower<'_> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) {
        let counts = ClassCounts::from_rows(&rows, self.data.labels);
        if rows.len() < 2
            || counts.positive == 0
            || counts.negative == 0
            || self.max_depth.is_some_and(|max| depth >= max)
        {
            return;
        }

        let Some(split) = self.best_split(&rows, counts) else {
            return;
        };
        self.importances[split.feature] += split.decrease;

        let column = &self.data.features[split.feature];
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| column[row] <= split.threshold);

        self.grow(left, depth + 1);
        self.grow(right, depth + 1);
    }

    /// Visits features in random order. At least `max_features` are
    /// evaluated, and the search goes on past that until a valid split has
    /// been found.
    fn best_split(&mut self, rows: &[usize], counts: ClassCounts) -> Option<Split> {
        let mut order: Vec<usize> = (0..self.data.n_features()).collect();
        order.shuffle(&mut self.rng);

        let mut best: Option<Split> = None;
        for (visited, &feature) in order.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.split_on(feature, rows, counts) {
                if best.as_ref().is_none_or(|b| candidate.decrease > b.decrease) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn split_on(&self, feature: usize, rows: &[usize], counts: ClassCounts) -> Option<Split> {
        let column = &self.data.features[feature];
        let labels = self.data.labels;

        let mut sorted: Vec<usize> = rows.to_vec();
        sorted.sort_by(|a, b| column[*a].total_cmp(&column[*b]));

        let parent = counts.weighted_gini();
        let mut left = ClassCounts::default();
        let mut right = counts;
        let mut best: Option<Split> = None;

        for pair in sorted.windows(2) {
            let (row, next) = (pair[0], pair[1]);
            left.add(labels[row]);
            right.remove(labels[row]);

            let (value, next_value) = (column[row], column[next]);
            if value >= next_value {
                continue;
            }

            let decrease = parent - left.weighted_gini() - right.weighted_gini();
            if best.as_ref().is_none_or(|b| decrease > b.decrease) {
                let mut threshold = value + (next_value - value) / 2.0;
                if threshold >= next_value {
                    threshold = value;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    decrease,
                });
            }
        }
        best
    }
}

impl RandomForest {
    pub fn new(n_trees: usize, max_depth: Option<usize>, seed: u64) -> Self {
        Self {
            n_trees: n_trees.max(1),
            max_depth,
            seed,
        }
    }

    fn tree_importances(&self, data: &TrainingSet<'_>, tree: usize) -> Vec<f64> {
        let n_rows = data.n_rows();
        let n_features = data.n_features();
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(tree as u64));

        let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);

        let mut grower = TreeGrower {
            data,
            max_depth: self.max_depth,
            max_features,
            rng,
            importances: vec![0.0; n_features],
        };
        grower.grow(sample, 0);

        let mut importances = grower.importances;
        normalize_sum(&mut importances);
        importances
    }

    /// Mean decrease in impurity per feature, summing to 1 unless no tree
    /// found a single split.
    pub fn feature_importances(&self, data: &TrainingSet<'_>) -> Vec<f64> {
        let n_features = data.n_features();
        if n_features == 0 || data.n_rows() == 0 {
            return vec![0.0; n_features];
        }

        let per_tree: Vec<Vec<f64>> = (0..self.n_trees)
            .into_par_iter()
            .map(|tree| self.tree_importances(data, tree))
            .collect();

        let mut totals = vec![0.0; n_features];
        for importances in &per_tree {
            for (total, value) in totals.iter_mut().zip(importances) {
                *total += value;
            }
        }
        for total in totals.iter_mut() {
            *total /= self.n_trees as f64;
        }
        normalize_sum(&mut totals);
        totals
    }
}

fn normalize_sum(values: &mut [f64]) {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for value in values.iter_mut() {
            *value /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<bool>) {
        let labels: Vec<bool> = (0..200).map(|i| i % 2 == 0).collect();
        let informative: Vec<f64> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| if *l { 10.0 + (i % 7) as f64 } else { (i % 7) as f64 })
            .collect();
        let noise: Vec<f64> = (0..200).map(|i| ((i * 37) % 11) as f64).collect();
        (vec![noise, informative], labels)
    }

    #[test]
    fn test_gini() {
        let counts = ClassCounts {
            negative: 5,
            positive: 5,
        };
        assert!((counts.gini() - 0.5).abs() < 1e-12);
        assert_eq!(ClassCounts::default().gini(), 0.0);
    }

    #[test]
    fn test_informative_feature_dominates() {
        let (features, labels) = separable();
        let data = TrainingSet {
            features: &features,
            labels: &labels,
        };
        let importances = RandomForest::new(20, None, 42).feature_importances(&data);

        assert_eq!(importances.len(), 2);
        assert!(importances[1] > importances[0]);
        let sum: f64 = importances.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_gives_same_importances() {
        let (features, labels) = separable();
        let data = TrainingSet {
            features: &features,
            labels: &labels,
        };
        let forest = RandomForest::new(10, Some(3), 7);
        assert_eq!(forest.feature_importances(&data), forest.feature_importances(&data));
    }

    #[test]
    fn test_single_class_has_no_importance() {
        let features = vec![vec![1.0, 2.0, 3.0]];
        let labels = vec![true, true, true];
        let data = TrainingSet {
            features: &features,
            labels: &labels,
        };
        assert_eq!(RandomForest::new(5, None, 1).feature_importances(&data), vec![0.0]);
    }
}
