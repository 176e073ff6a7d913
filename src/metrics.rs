//! Binary classification metrics with "will no-show" as the positive class.
//! Ratios with an empty denominator are reported as 0.0.

use ndarray::Array1;
use serde::Serialize;

use crate::error::{PredictorError, Result};
use crate::models::ModelMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionCounts {
    pub fn from_predictions(labels: &Array1<bool>, predicted: &Array1<bool>) -> Self {
        let mut counts = ConfusionCounts::default();
        for (actual, guess) in labels.iter().zip(predicted.iter()) {
            match (*actual, *guess) {
                (true, true) => counts.true_positive += 1,
                (false, true) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (true, false) => counts.false_negative += 1,
            }
        }
        counts
    }

    fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn evaluate(
    labels: &Array1<bool>,
    predicted: &Array1<bool>,
    probabilities: &Array1<f64>,
) -> Result<ModelMetrics> {
    let counts = ConfusionCounts::from_predictions(labels, predicted);
    Ok(ModelMetrics {
        accuracy: counts.accuracy(),
        precision: counts.precision(),
        recall: counts.recall(),
        f1: counts.f1(),
        roc_auc: roc_auc(labels, probabilities)?,
    })
}

/// Area under the ROC curve via the rank-sum statistic. Tied scores share
/// their average rank, so the result matches the trapezoidal curve area.
pub fn roc_auc(labels: &Array1<bool>, scores: &Array1<f64>) -> Result<f64> {
    let positives = labels.iter().filter(|v| **v).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(PredictorError::Training(
            "ROC-AUC needs both classes in the evaluation set".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*a].total_cmp(&scores[*b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based
        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        for idx in &order[start..=end] {
            if labels[*idx] {
                positive_rank_sum += average_rank;
            }
        }
        start = end + 1;
    }

    let positives = positives as f64;
    let negatives = negatives as f64;
    Ok((positive_rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives))
}

/// ROC curve at every distinct score threshold, highest first. Starts at
/// (0, 0), ends at (1, 1), and drops points collinear with their neighbours.
pub fn roc_curve(labels: &Array1<bool>, scores: &Array1<f64>) -> Vec<RocPoint> {
    let positives = labels.iter().filter(|v| **v).count() as f64;
    let negatives = labels.len() as f64 - positives;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

    let mut points = vec![RocPoint { fpr: 0.0, tpr: 0.0 }];
    let (mut tp, mut fp) = (0.0, 0.0);
    for (position, idx) in order.iter().enumerate() {
        if labels[*idx] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let threshold_ends = order
            .get(position + 1)
            .map_or(true, |next| scores[*next] != scores[*idx]);
        if threshold_ends {
            points.push(RocPoint {
                fpr: if negatives > 0.0 { fp / negatives } else { 0.0 },
                tpr: if positives > 0.0 { tp / positives } else { 0.0 },
            });
        }
    }

    drop_collinear(points)
}

fn drop_collinear(points: Vec<RocPoint>) -> Vec<RocPoint> {
    if points.len() <= 2 {
        return points;
    }
    let mut kept = Vec::with_capacity(points.len());
    kept.push(points[0]);
    for window in points.windows(3) {
        let (a, b, c) = (window[0], window[1], window[2]);
        let cross = (b.fpr - a.fpr) * (c.tpr - b.tpr) - (b.tpr - a.tpr) * (c.fpr - b.fpr);
        if cross.abs() > f64::EPSILON {
            kept.push(b);
        }
    }
    if let Some(last) = points.last() {
        kept.push(*last);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[u8]) -> Array1<bool> {
        values.iter().map(|v| *v == 1).collect()
    }

    #[test]
    fn confusion_counts_drive_ratios() {
        let actual = labels(&[1, 1, 0, 0, 1]);
        let predicted = labels(&[1, 0, 1, 0, 1]);
        let counts = ConfusionCounts::from_predictions(&actual, &predicted);

        assert_eq!(counts.true_positive, 2);
        assert_eq!(counts.false_positive, 1);
        assert_eq!(counts.false_negative, 1);
        assert!((counts.accuracy() - 0.6).abs() < 1e-12);
        assert!((counts.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((counts.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((counts.f1() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_division_reports_zero() {
        let actual = labels(&[1, 0]);
        let predicted = labels(&[0, 0]);
        let counts = ConfusionCounts::from_predictions(&actual, &predicted);
        assert_eq!(counts.precision(), 0.0);
        assert_eq!(counts.f1(), 0.0);
    }

    #[test]
    fn perfect_ranking_has_unit_auc() {
        let actual = labels(&[0, 0, 1, 1]);
        let scores = Array1::from(vec![0.1, 0.2, 0.8, 0.9]);
        assert_eq!(roc_auc(&actual, &scores).unwrap(), 1.0);
    }

    #[test]
    fn known_auc_value() {
        // sklearn: roc_auc_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) == 0.75
        let actual = labels(&[0, 0, 1, 1]);
        let scores = Array1::from(vec![0.1, 0.4, 0.35, 0.8]);
        assert!((roc_auc(&actual, &scores).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn tied_scores_count_half() {
        let actual = labels(&[0, 1]);
        let scores = Array1::from(vec![0.5, 0.5]);
        assert!((roc_auc(&actual, &scores).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_class_auc_is_an_error() {
        let actual = labels(&[1, 1]);
        let scores = Array1::from(vec![0.2, 0.9]);
        assert!(roc_auc(&actual, &scores).is_err());
    }

    #[test]
    fn curve_spans_unit_square() {
        let actual = labels(&[0, 0, 1, 1]);
        let scores = Array1::from(vec![0.1, 0.4, 0.35, 0.8]);
        let curve = roc_curve(&actual, &scores);

        assert_eq!(curve.first(), Some(&RocPoint { fpr: 0.0, tpr: 0.0 }));
        assert_eq!(curve.last(), Some(&RocPoint { fpr: 1.0, tpr: 1.0 }));
        for pair in curve.windows(2) {
            assert!(pair[1].fpr >= pair[0].fpr);
            assert!(pair[1].tpr >= pair[0].tpr);
        }
    }

    #[test]
    fn curve_area_matches_auc() {
        let actual = labels(&[0, 1, 0, 1, 1, 0, 0, 1]);
        let scores = Array1::from(vec![0.2, 0.7, 0.7, 0.4, 0.9, 0.1, 0.5, 0.5]);
        let curve = roc_curve(&actual, &scores);
        let area: f64 = curve
            .windows(2)
            .map(|p| (p[1].fpr - p[0].fpr) * (p[1].tpr + p[0].tpr) / 2.0)
            .sum();
        assert!((area - roc_auc(&actual, &scores).unwrap()).abs() < 1e-12);
    }
}
