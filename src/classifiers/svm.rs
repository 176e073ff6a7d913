use linfa::dataset::Pr;
use linfa::prelude::*;
use linfa::Dataset;
use linfa_preprocessing::linear_scaling::LinearScaler;
use linfa_svm::Svm;
use ndarray::{Array1, Array2};

use super::{balanced_class_weights, fit_error, Classifier};
use crate::error::{PredictorError, Result};

#[derive(Debug, Clone, Copy)]
pub struct SvmParams {
    pub c: f64,
    /// Gaussian kernel width; `None` uses the column count, which on
    /// standardised inputs matches a gamma of `1 / (n_features * var)`.
    pub kernel_width: Option<f64>,
    pub balanced: bool,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel_width: None,
            balanced: true,
        }
    }
}

struct Fitted {
    scaler: LinearScaler<f64>,
    model: Svm<f64, Pr>,
}

/// RBF-kernel support vector classifier over every training row, with
/// Platt-scaled probabilities. Class balance scales the per-class penalty.
/// The kernel matrix is dense, so memory grows with the square of the rows.
pub struct KernelSvm {
    params: SvmParams,
    fitted: Option<Fitted>,
}

impl KernelSvm {
    pub fn new(params: SvmParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }
}

impl Classifier for KernelSvm {
    fn name(&self) -> &'static str {
        "SVM"
    }

    fn fit(&mut self, features: &Array2<f64>, labels: &Array1<bool>) -> Result<()> {
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(PredictorError::Training("no rows to fit".to_string()));
        }

        let scaler = LinearScaler::standard()
            .fit(&Dataset::new(features.to_owned(), labels.clone()))
            .map_err(|err| fit_error(self.name(), err))?;
        let scaled: Array2<f64> = scaler.transform(features.to_owned());
        let train = Dataset::new(scaled, labels.clone());

        let [negative, positive] = if self.params.balanced {
            balanced_class_weights(labels)
        } else {
            [1.0, 1.0]
        };
        let width = self
            .params
            .kernel_width
            .unwrap_or(features.ncols() as f64);

        let model = Svm::<_, Pr>::params()
            .pos_neg_weights(self.params.c * positive, self.params.c * negative)
            .gaussian_kernel(width)
            .fit(&train)
            .map_err(|err| fit_error(self.name(), err))?;

        self.fitted = Some(Fitted { scaler, model });
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PredictorError::UntrainedModel)?;
        let scaled: Array2<f64> = fitted.scaler.transform(features.to_owned());
        let probabilities: Array1<Pr> = fitted.model.predict(&scaled);
        Ok(probabilities.mapv(|p| f64::from(*p)))
    }
}
