//! Mutual information between a continuous feature and a discrete target.
//!
//! Nearest-neighbour estimator of Ross (2014): for every sample, the
//! distance to its k-th neighbour within the same class sets a radius, and
//! the number of samples of any class inside that radius enters the
//! estimate through the digamma function.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

/// Digamma function for positive arguments.
pub fn digamma(x: f64) -> f64 {
    let mut x = x;
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln() - 0.5 * inv
        - inv2 * (1.0 / 12.0 - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 / 240.0)))
}

/// Largest float strictly below `d`, towards zero.
fn shrink_radius(d: f64) -> f64 {
    if d > 0.0 {
        f64::from_bits(d.to_bits() - 1)
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Estimator settings.
#[derive(Debug, Clone, Copy)]
pub struct MutualInfoEstimator {
    pub n_neighbors: usize,
    pub seed: u64,
}

impl MutualInfoEstimator {
    pub fn new(n_neighbors: usize, seed: u64) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            seed,
        }
    }

    /// Feature scaled to unit standard deviation plus a tiny amount of
    /// seeded noise that separates repeated values.
    fn prepare(&self, values: &[f64], rng: &mut StdRng) -> Vec<f64> {
        let std = std_dev(values);
        let scaled: Vec<f64> = if std > 0.0 {
            values.iter().map(|v| v / std).collect()
        } else {
            values.to_vec()
        };
        let mean_abs = scaled.iter().map(|v| v.abs()).sum::<f64>() / scaled.len() as f64;
        let amplitude = 1e-10 * mean_abs.max(1.0);
        scaled
            .into_iter()
            .map(|v| v + amplitude * rng.gen_range(-1.0..1.0))
            .collect()
    }

    /// Estimate in nats for each feature, never negative.
    ///
    /// Feature `i` uses noise seeded with `seed + i`.
    pub fn estimate_all(&self, features: &[Vec<f64>], labels: &[bool]) -> Vec<f64> {
        features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
                self.estimate(&self.prepare(feature, &mut rng), labels)
            })
            .collect()
    }

    /// Estimate for one already prepared feature.
    pub fn estimate(&self, values: &[f64], labels: &[bool]) -> f64 {
        let mut by_class: BTreeMap<bool, Vec<f64>> = BTreeMap::new();
        for (value, label) in values.iter().zip(labels) {
            by_class.entry(*label).or_default().push(*value);
        }

        // Samples alone in their class carry no neighbour information.
        let mut all: Vec<f64> = Vec::with_capacity(values.len());
        for class_values in by_class.values_mut() {
            if class_values.len() > 1 {
                class_values.sort_by(f64::total_cmp);
                all.extend_from_slice(class_values);
            }
        }
        if all.is_empty() {
            return 0.0;
        }
        all.sort_by(f64::total_cmp);

        let mut sum_k = 0.0;
        let mut sum_class = 0.0;
        let mut sum_within = 0.0;
        for class_values in by_class.values().filter(|v| v.len() > 1) {
            let count = class_values.len();
            let k = self.n_neighbors.min(count - 1);
            for position in 0..count {
                let x = class_values[position];
                let radius = shrink_radius(kth_neighbour_distance(class_values, position, k));
                let lower = all.partition_point(|v| *v < x - radius);
                let upper = all.partition_point(|v| *v <= x + radius);

                sum_k += digamma(k as f64);
                sum_class += digamma(count as f64);
                sum_within += digamma((upper - lower) as f64);
            }
        }

        let n = all.len() as f64;
        let mi = digamma(n) + sum_k / n - sum_class / n - sum_within / n;
        mi.max(0.0)
    }
}

/// Distance from `sorted[position]` to its k-th nearest other value.
fn kth_neighbour_distance(sorted: &[f64], position: usize, k: usize) -> f64 {
    let x = sorted[position];
    let mut left = position;
    let mut right = position + 1;
    let mut distance = 0.0;
    for _ in 0..k {
        let left_distance = (left > 0).then(|| x - sorted[left - 1]);
        let right_distance = (right < sorted.len()).then(|| sorted[right] - x);
        distance = match (left_distance, right_distance) {
            (Some(l), Some(r)) if l <= r => {
                left -= 1;
                l
            }
            (_, Some(r)) => {
                right += 1;
                r
            }
            (Some(l), None) => {
                left -= 1;
                l
            }
            (None, None) => break,
        };
    }
    distance
}
