//! Model evaluation
//!
//! One protocol for every model: probabilities from the classifier, hard
//! labels at a fixed threshold, and ratio metrics that evaluate to zero
//! instead of failing on an empty denominator.

use ndarray::{Array1, Array2};

use crate::error::Result;
use crate::model::{mean_bce, Classifier};
use crate::types::MetricSet;

/// Default decision threshold on predicted fraud probability
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Evaluate `model` on a held-out split
///
/// Pure and deterministic. `training_samples` is left at zero and
/// `test_samples` is the number of evaluated rows; the caller fills in the
/// training count.
pub fn evaluate<C: Classifier + ?Sized>(
    model: &C,
    x: &Array2<f32>,
    y: &Array1<f32>,
    threshold: f64,
) -> Result<MetricSet> {
    let probabilities = model.predict_proba(x)?;
    Ok(metrics_from_probabilities(&probabilities, y, threshold))
}

/// Metric set from predicted probabilities and 0/1 labels
pub fn metrics_from_probabilities(p: &Array1<f32>, y: &Array1<f32>, threshold: f64) -> MetricSet {
    let mut confusion = Confusion::default();
    for (&prob, &label) in p.iter().zip(y.iter()) {
        let predicted = f64::from(prob) > threshold;
        confusion.record(predicted, label > 0.5);
    }

    MetricSet {
        accuracy: confusion.accuracy(),
        loss: f64::from(mean_bce(p, y)),
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1: confusion.f1(),
        auc: roc_auc(p, y),
        training_samples: 0,
        test_samples: y.len(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Confusion {
    tp: usize,
    fp: usize,
    tn: usize,
    fn_: usize,
}

impl Confusion {
    fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.tp += 1,
            (true, false) => self.fp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fn_ += 1,
        }
    }

    fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Area under the ROC curve via the rank-sum statistic
///
/// Tied scores share their average rank. With a single class present the
/// curve is undefined and 0.5 is returned.
pub fn roc_auc(p: &Array1<f32>, y: &Array1<f32>) -> f64 {
    let positives = y.iter().filter(|&&v| v > 0.5).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..p.len()).collect();
    order.sort_by(|&a, &b| p[a].total_cmp(&p[b]));

    let mut positive_rank_sum = 0.0f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && p[order[j + 1]] == p[order[i]] {
            j += 1;
        }
        // ranks are 1-based; ties i..=j share the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y[idx] > 0.5 {
                positive_rank_sum += mean_rank;
            }
        }
        i = j + 1;
    }

    let pos = positives as f64;
    let neg = negatives as f64;
    (positive_rank_sum - pos * (pos + 1.0) / 2.0) / (pos * neg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use ndarray::array;

    /// Returns the first feature column as the probability
    struct Passthrough;

    impl Classifier for Passthrough {
        fn input_dim(&self) -> usize {
            1
        }

        fn predict_proba(&self, x: &Array2<f32>) -> Result<Array1<f32>> {
            Ok(x.column(0).to_owned())
        }
    }

    #[test]
    fn test_perfect_classifier() {
        let x = array![[0.9f32], [0.8], [0.1], [0.2]];
        let y = array![1.0f32, 1.0, 0.0, 0.0];
        let m = evaluate(&Passthrough, &x, &y, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
        assert_eq!(m.auc, 1.0);
        assert_eq!(m.test_samples, 4);
    }

    #[test]
    fn test_mixed_predictions() {
        // predicted: 1, 0, 1, 0 ; actual: 1, 1, 0, 0
        let x = array![[0.7f32], [0.4], [0.6], [0.3]];
        let y = array![1.0f32, 1.0, 0.0, 0.0];
        let m = evaluate(&Passthrough, &x, &y, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(m.accuracy, 0.5);
        assert_eq!(m.precision, 0.5);
        assert_eq!(m.recall, 0.5);
        assert_eq!(m.f1, 0.5);
        assert_eq!(m.auc, 0.75);
    }

    #[test]
    fn test_threshold_is_strict() {
        let x = array![[0.5f32]];
        let y = array![1.0f32];
        let m = evaluate(&Passthrough, &x, &y, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(m.recall, 0.0);
    }

    #[test]
    fn test_zero_denominators_evaluate_to_zero() {
        // never predicts fraud and there is no fraud
        let x = array![[0.1f32], [0.2]];
        let y = array![0.0f32, 0.0];
        let m = evaluate(&Passthrough, &x, &y, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert_eq!(m.auc, 0.5);
    }

    #[test]
    fn test_auc_ties_share_rank() {
        let p = array![0.5f32, 0.5, 0.5, 0.5];
        let y = array![1.0f32, 0.0, 1.0, 0.0];
        assert_eq!(roc_auc(&p, &y), 0.5);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let x = array![[0.7f32], [0.4], [0.6], [0.3], [0.55]];
        let y = array![1.0f32, 1.0, 0.0, 0.0, 1.0];
        let first = evaluate(&Passthrough, &x, &y, DEFAULT_THRESHOLD).unwrap();
        let second = evaluate(&Passthrough, &x, &y, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(first, second);
    }
}
