//! Stratified train/test split

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, RetrainError};

/// Row partition shared by both training strategies
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f32>,
    pub y_train: Array1<f32>,
    pub x_test: Array2<f32>,
    pub y_test: Array1<f32>,
}

impl Split {
    pub fn training_samples(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_samples(&self) -> usize {
        self.y_test.len()
    }
}

/// Split rows so each class keeps its proportion in both partitions
///
/// Each class is shuffled with a seeded RNG and `round(n_class * test_fraction)`
/// of its rows go to the test partition. Identical inputs and seed always
/// give identical partitions.
pub fn stratified_split(
    x: &Array2<f32>,
    y: &Array1<f32>,
    test_fraction: f64,
    seed: u64,
) -> Result<Split> {
    if x.nrows() != y.len() {
        return Err(RetrainError::TrainingFailure(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(RetrainError::TrainingFailure(format!(
            "test fraction {} outside (0, 1)",
            test_fraction
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_idx = Vec::with_capacity(y.len());
    let mut test_idx = Vec::new();

    for (class, name) in [(0.0f32, "legitimate"), (1.0f32, "fraud")] {
        let mut members: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(&mut rng);

        let n_test = ((members.len() as f64) * test_fraction).round() as usize;
        let n_test = n_test.min(members.len().saturating_sub(1));
        // Every class must appear in both partitions
        if n_test == 0 {
            return Err(RetrainError::TrainingFailure(format!(
                "too few {} rows ({}) for a stratified split",
                name,
                members.len()
            )));
        }
        test_idx.extend_from_slice(&members[..n_test]);
        train_idx.extend_from_slice(&members[n_test..]);
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();

    Ok(Split {
        x_train: x.select(Axis(0), &train_idx),
        y_train: y.select(Axis(0), &train_idx),
        x_test: x.select(Axis(0), &test_idx),
        y_test: y.select(Axis(0), &test_idx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(legit: usize, fraud: usize) -> (Array2<f32>, Array1<f32>) {
        let n = legit + fraud;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f32);
        let y = Array1::from_shape_fn(n, |i| if i < legit { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_split_preserves_class_balance() {
        let (x, y) = data(300, 200);
        let split = stratified_split(&x, &y, 0.2, 42).unwrap();

        assert_eq!(split.training_samples(), 400);
        assert_eq!(split.test_samples(), 100);
        assert_eq!(split.y_test.sum(), 40.0);
        assert_eq!(split.y_train.sum(), 160.0);
    }

    #[test]
    fn test_split_is_deterministic_per_seed() {
        let (x, y) = data(30, 20);
        let a = stratified_split(&x, &y, 0.2, 42).unwrap();
        let b = stratified_split(&x, &y, 0.2, 42).unwrap();
        let c = stratified_split(&x, &y, 0.2, 7).unwrap();

        assert_eq!(a.x_test, b.x_test);
        assert_eq!(a.y_train, b.y_train);
        assert_ne!(a.x_test, c.x_test);
    }

    #[test]
    fn test_small_class_keeps_rows_on_both_sides() {
        let (x, y) = data(10, 3);
        let split = stratified_split(&x, &y, 0.2, 42).unwrap();
        assert_eq!(split.y_test.sum(), 1.0);
        assert_eq!(split.y_train.sum(), 2.0);
        assert_eq!(split.training_samples() + split.test_samples(), 13);
    }

    #[test]
    fn test_class_too_small_for_test_partition_fails() {
        // round(2 * 0.2) == 0 leaves no fraud row to evaluate on
        let (x, y) = data(2, 2);
        let err = stratified_split(&x, &y, 0.2, 42).unwrap_err();
        assert!(matches!(err, RetrainError::TrainingFailure(msg) if msg.contains("legitimate")));

        let (x, y) = data(10, 1);
        assert!(stratified_split(&x, &y, 0.2, 42).is_err());
    }

    #[test]
    fn test_single_class_fails() {
        let (x, y) = data(20, 0);
        let err = stratified_split(&x, &y, 0.2, 42).unwrap_err();
        assert!(matches!(err, RetrainError::TrainingFailure(msg) if msg.contains("fraud")));
    }

    #[test]
    fn test_mismatched_lengths_fail() {
        let (x, _) = data(3, 3);
        let y = Array1::zeros(5);
        assert!(matches!(
            stratified_split(&x, &y, 0.2, 42),
            Err(RetrainError::TrainingFailure(_))
        ));
    }
}
