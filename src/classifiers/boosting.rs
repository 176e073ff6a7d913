use std::collections::HashMap;

use ndarray::{Array1, Array2};

use super::tree::{RegressionTree, TreeParams};
use super::{sigmoid, Classifier};
use crate::error::{PredictorError, Result};

#[derive(Debug, Clone, Copy)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.1,
            max_depth: 6,
        }
    }
}

/// Gradient boosted trees on the binomial deviance. Each round fits a tree
/// to the residuals, then replaces its leaf values with one Newton step.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    params: BoostingParams,
    initial_log_odds: f64,
    trees: Vec<RegressionTree>,
    importance: Option<Array1<f64>>,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            initial_log_odds: 0.0,
            trees: Vec::new(),
            importance: None,
        }
    }

    fn raw_scores(&self, features: &Array2<f64>) -> Array1<f64> {
        features
            .rows()
            .into_iter()
            .map(|row| {
                self.initial_log_odds
                    + self
                        .trees
                        .iter()
                        .map(|tree| self.params.learning_rate * tree.predict_row(row))
                        .sum::<f64>()
            })
            .collect()
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &'static str {
        "Gradient Boosting"
    }

    fn fit(&mut self, features: &Array2<f64>, labels: &Array1<bool>) -> Result<()> {
        let n_rows = features.nrows();
        if n_rows == 0 {
            return Err(PredictorError::Training("no rows to fit".to_string()));
        }

        let targets: Vec<f64> = labels.iter().map(|l| if *l { 1.0 } else { 0.0 }).collect();
        let prior = (targets.iter().sum::<f64>() / n_rows as f64).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth: self.params.max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        };
        let weights = vec![1.0; n_rows];
        let mut scores = vec![self.initial_log_odds; n_rows];
        let mut trees = Vec::with_capacity(self.params.n_rounds);
        let mut importance = Array1::<f64>::zeros(features.ncols());

        for _ in 0..self.params.n_rounds {
            let probabilities: Vec<f64> = scores.iter().map(|s| sigmoid(*s)).collect();
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&probabilities)
                .map(|(y, p)| y - p)
                .collect();

            let mut tree = RegressionTree::fit(features, &residuals, &weights, tree_params);

            // numerator and denominator of the Newton step per leaf
            let mut steps: HashMap<usize, (f64, f64)> = HashMap::new();
            let leaves: Vec<usize> = features
                .rows()
                .into_iter()
                .map(|row| tree.leaf_index(row))
                .collect();
            for (i, leaf) in leaves.iter().enumerate() {
                let entry = steps.entry(*leaf).or_insert((0.0, 0.0));
                entry.0 += residuals[i];
                entry.1 += probabilities[i] * (1.0 - probabilities[i]);
            }
            for (leaf, (numerator, denominator)) in &steps {
                let value = if denominator.abs() < 1e-12 {
                    0.0
                } else {
                    numerator / denominator
                };
                tree.set_leaf_value(*leaf, value);
            }

            for (i, row) in features.rows().into_iter().enumerate() {
                scores[i] += self.params.learning_rate * tree.predict_row(row);
            }
            importance += &Array1::from(tree.feature_importance().to_vec());
            trees.push(tree);
        }

        let total = importance.sum();
        if total > 0.0 {
            importance /= total;
        }

        self.trees = trees;
        self.importance = Some(importance);
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        if self.importance.is_none() {
            return Err(PredictorError::UntrainedModel);
        }
        Ok(self.raw_scores(features).mapv(sigmoid))
    }

    fn feature_importance(&self) -> Option<Array1<f64>> {
        self.importance.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::test_support::separable;

    fn quick() -> GradientBoosting {
        GradientBoosting::new(BoostingParams {
            n_rounds: 20,
            max_depth: 3,
            ..BoostingParams::default()
        })
    }

    #[test]
    fn training_loss_falls() {
        let (features, labels) = separable(200, 5);
        let mut model = quick();
        model.fit(&features, &labels).unwrap();

        let probabilities = model.predict_proba(&features).unwrap();
        let prior = labels.iter().filter(|l| **l).count() as f64 / labels.len() as f64;
        let log_loss = |p: f64, y: bool| if y { -p.ln() } else { -(1.0 - p).ln() };
        let fitted: f64 = probabilities
            .iter()
            .zip(labels.iter())
            .map(|(p, y)| log_loss(p.clamp(1e-12, 1.0 - 1e-12), *y))
            .sum();
        let baseline: f64 = labels.iter().map(|y| log_loss(prior, *y)).sum();
        assert!(fitted < baseline * 0.5);
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        let (features, labels) = separable(100, 6);
        let mut model = quick();
        model.fit(&features, &labels).unwrap();
        assert!(model
            .predict_proba(&features)
            .unwrap()
            .iter()
            .all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn importance_favours_signal_column() {
        let (features, labels) = separable(200, 7);
        let mut model = quick();
        model.fit(&features, &labels).unwrap();
        let importance = model.feature_importance().unwrap();
        assert!(importance[0] > importance[2]);
    }
}
