use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::encoder::EncodedDataset;
use crate::error::{PredictorError, Result};

/// Labeled rows ready for a classifier.
#[derive(Debug, Clone)]
pub struct LabeledSplit {
    pub features: Array2<f64>,
    pub labels: Array1<bool>,
}

impl LabeledSplit {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|v| **v).count() as f64 / self.labels.len() as f64
    }
}

/// Shuffled train/test split that keeps the no-show share equal in both
/// halves. Deterministic in `seed`.
pub fn stratified_split(
    dataset: &EncodedDataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(LabeledSplit, LabeledSplit)> {
    let labels = dataset
        .labels
        .as_ref()
        .ok_or_else(|| PredictorError::Training("dataset has unlabeled rows".to_string()))?;
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(PredictorError::Training(format!(
            "test fraction {test_fraction} outside (0, 1)"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for class in [false, true] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            continue;
        }
        indices.shuffle(&mut rng);

        let test_size = ((indices.len() as f64) * test_fraction).round().max(1.0) as usize;
        let test_size = test_size.min(indices.len().saturating_sub(1));
        test_indices.extend_from_slice(&indices[..test_size]);
        train_indices.extend_from_slice(&indices[test_size..]);
    }

    train_indices.shuffle(&mut rng);
    test_indices.shuffle(&mut rng);

    if train_indices.is_empty() || test_indices.is_empty() {
        return Err(PredictorError::Training(
            "stratified split produced an empty train or test set".to_string(),
        ));
    }

    Ok((
        select(dataset, labels, &train_indices),
        select(dataset, labels, &test_indices),
    ))
}

fn select(dataset: &EncodedDataset, labels: &Array1<bool>, indices: &[usize]) -> LabeledSplit {
    LabeledSplit {
        features: dataset.features.select(Axis(0), indices),
        labels: labels.select(Axis(0), indices),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(positives: usize, negatives: usize) -> EncodedDataset {
        let n = positives + negatives;
        let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        let labels = Array1::from_iter((0..n).map(|i| i < positives));
        EncodedDataset {
            features,
            labels: Some(labels),
        }
    }

    #[test]
    fn keeps_class_proportions() {
        let (train, test) = stratified_split(&dataset(200, 800), 0.2, 42).unwrap();
        assert_eq!(test.len(), 200);
        assert_eq!(train.len(), 800);
        assert_eq!(test.labels.iter().filter(|v| **v).count(), 40);
        assert!((train.positive_rate() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn rows_stay_paired_with_labels() {
        let data = dataset(30, 70);
        let (train, _) = stratified_split(&data, 0.2, 1).unwrap();
        for (row, label) in train.features.rows().into_iter().zip(train.labels.iter()) {
            let original = (row[0] / 2.0) as usize;
            assert_eq!(*label, original < 30);
        }
    }

    #[test]
    fn same_seed_same_split() {
        let data = dataset(50, 150);
        let (a, _) = stratified_split(&data, 0.2, 9).unwrap();
        let (b, _) = stratified_split(&data, 0.2, 9).unwrap();
        assert_eq!(a.features, b.features);
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn unlabeled_dataset_is_rejected() {
        let mut data = dataset(5, 5);
        data.labels = None;
        assert!(matches!(
            stratified_split(&data, 0.2, 1),
            Err(PredictorError::Training(_))
        ));
    }

    #[test]
    fn rejects_bad_fraction() {
        assert!(stratified_split(&dataset(5, 5), 0.0, 1).is_err());
        assert!(stratified_split(&dataset(5, 5), 1.0, 1).is_err());
    }
}
