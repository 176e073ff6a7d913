use linfa::prelude::*;
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::{balanced_class_weights, fit_error, Classifier};
use crate::error::{PredictorError, Result};

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    /// Minimum summed sample weight a node needs before it may split
    pub min_weight_split: f32,
    pub min_weight_leaf: f32,
    /// Share of the columns each tree sees
    pub feature_subsample: f64,
    pub balanced: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_weight_split: 5.0,
            min_weight_leaf: 2.0,
            feature_subsample: 0.7,
            balanced: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct Member {
    columns: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Bagged Gini trees, each fitted on a bootstrap sample and a random column
/// subset. The probability is the share of trees voting no-show.
#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    members: Vec<Member>,
    importance: Option<Array1<f64>>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            members: Vec::new(),
            importance: None,
        }
    }

    fn fit_member(
        &self,
        features: &Array2<f64>,
        labels: &Array1<bool>,
        class_weights: [f64; 2],
        seed: u64,
    ) -> Result<Member> {
        let n_rows = features.nrows();
        let n_features = features.ncols();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut draws = vec![0u32; n_rows];
        for _ in 0..n_rows {
            draws[rng.gen_range(0..n_rows)] += 1;
        }
        let rows: Vec<usize> = (0..n_rows).filter(|&i| draws[i] > 0).collect();

        let n_columns = ((n_features as f64 * self.params.feature_subsample).round() as usize)
            .clamp(1, n_features);
        let mut columns = sample(&mut rng, n_features, n_columns).into_vec();
        columns.sort_unstable();

        let records = features.select(Axis(0), &rows).select(Axis(1), &columns);
        let targets: Array1<usize> = rows.iter().map(|&i| usize::from(labels[i])).collect();
        // bootstrap multiplicity folded into the sample weight
        let weights: Array1<f32> = rows
            .iter()
            .map(|&i| draws[i] as f32 * class_weights[usize::from(labels[i])] as f32)
            .collect();
        let dataset = Dataset::new(records, targets).with_weights(weights);

        let tree: DecisionTree<f64, usize> = DecisionTree::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(Some(self.params.max_depth))
            .min_weight_split(self.params.min_weight_split)
            .min_weight_leaf(self.params.min_weight_leaf)
            .fit(&dataset)
            .map_err(|err| fit_error(self.name(), err))?;

        Ok(Member { columns, tree })
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn fit(&mut self, features: &Array2<f64>, labels: &Array1<bool>) -> Result<()> {
        let n_features = features.ncols();
        if features.nrows() == 0 || n_features == 0 {
            return Err(PredictorError::Training("no rows to fit".to_string()));
        }

        let class_weights = if self.params.balanced {
            balanced_class_weights(labels)
        } else {
            [1.0, 1.0]
        };
        let mut seeder = StdRng::seed_from_u64(self.params.seed);
        let tree_seeds: Vec<u64> = (0..self.params.n_trees).map(|_| seeder.gen()).collect();

        let members = tree_seeds
            .into_par_iter()
            .map(|seed| self.fit_member(features, labels, class_weights, seed))
            .collect::<Result<Vec<Member>>>()?;

        let mut importance = Array1::<f64>::zeros(n_features);
        for member in &members {
            let per_tree = member.tree.feature_importance();
            let total: f64 = per_tree.iter().sum();
            if total <= 0.0 {
                continue;
            }
            for (value, column) in per_tree.iter().zip(&member.columns) {
                importance[*column] += value / total;
            }
        }
        let total = importance.sum();
        if total > 0.0 {
            importance /= total;
        }

        self.members = members;
        self.importance = Some(importance);
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        if self.members.is_empty() {
            return Err(PredictorError::UntrainedModel);
        }
        let mut votes = Array1::<f64>::zeros(features.nrows());
        for member in &self.members {
            let subset = features.select(Axis(1), &member.columns);
            let predicted: Array1<usize> = member.tree.predict(&subset);
            votes.zip_mut_with(&predicted, |total, label| *total += *label as f64);
        }
        Ok(votes / self.members.len() as f64)
    }

    fn feature_importance(&self) -> Option<Array1<f64>> {
        self.importance.clone()
    }
}
