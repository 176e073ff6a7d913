//! Classification algorithms behind a common fit / predict capability.
//!
//! - [`forest`]: bagged `linfa-trees` decision trees
//! - [`boosting`]: gradient boosted trees, grown in-crate
//! - [`logistic`]: L2 logistic regression via `linfa-logistic`
//! - [`svm`]: RBF kernel support vector machine via `linfa-svm`

use ndarray::{Array1, Array2};

use crate::error::{PredictorError, Result};

pub mod boosting;
pub mod forest;
pub mod logistic;
pub mod svm;
pub mod tree;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use logistic::{LogisticParams, LogisticRegression};
pub use svm::{KernelSvm, SvmParams};

/// A binary classifier where `true` means the patient will not show up.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&mut self, features: &Array2<f64>, labels: &Array1<bool>) -> Result<()>;

    /// Probability of the positive class per row.
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>>;

    fn predict(&self, features: &Array2<f64>) -> Result<Array1<bool>> {
        Ok(self.predict_proba(features)?.mapv(|p| p > 0.5))
    }

    /// Per-feature weights in training column order, when the algorithm has them.
    fn feature_importance(&self) -> Option<Array1<f64>> {
        None
    }
}

/// The fixed training menu. Order matters: it breaks ROC-AUC ties.
pub fn default_menu(seed: u64) -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(RandomForest::new(ForestParams {
            seed,
            ..ForestParams::default()
        })),
        Box::new(GradientBoosting::new(BoostingParams::default())),
        Box::new(LogisticRegression::new(LogisticParams::default())),
        Box::new(KernelSvm::new(SvmParams::default())),
    ]
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `n / (2 * n_class)` per class, indexed by `usize::from(label)`.
pub(crate) fn balanced_class_weights(labels: &Array1<bool>) -> [f64; 2] {
    let n = labels.len() as f64;
    let positives = labels.iter().filter(|l| **l).count() as f64;
    let negatives = n - positives;
    let weight = |count: f64| if count > 0.0 { n / (2.0 * count) } else { 1.0 };
    [weight(negatives), weight(positives)]
}

/// Row indices with the minority class repeated until both classes have the
/// same count. Stands in for class weights where the learner takes none.
pub(crate) fn balanced_rows(labels: &Array1<bool>) -> Vec<usize> {
    let (positives, negatives): (Vec<usize>, Vec<usize>) =
        (0..labels.len()).partition(|&i| labels[i]);
    let (minority, majority) = if positives.len() < negatives.len() {
        (positives, negatives)
    } else {
        (negatives, positives)
    };
    if minority.is_empty() {
        return majority;
    }

    let mut rows = majority.clone();
    rows.extend(minority.iter().cycle().take(majority.len()).copied());
    rows.sort_unstable();
    rows
}

pub(crate) fn fit_error(model: &str, err: impl std::fmt::Display) -> PredictorError {
    PredictorError::Training(format!("{model}: {err}"))
}
