use linfa::prelude::*;
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression as LinfaLogistic};
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2, Axis};

use super::{balanced_rows, fit_error, Classifier};
use crate::error::{PredictorError, Result};

#[derive(Debug, Clone, Copy)]
pub struct LogisticParams {
    /// Inverse L2 strength, as in liblinear
    pub c: f64,
    pub max_iter: u64,
    pub gradient_tolerance: f64,
    pub balanced: bool,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            gradient_tolerance: 1e-4,
            balanced: true,
        }
    }
}

struct Fitted {
    scaler: LinearScaler<f64>,
    model: FittedLogisticRegression<f64, usize>,
}

/// L2-regularised logistic regression on standardised inputs. Class balance
/// comes from repeating minority rows, since the solver takes no weights.
pub struct LogisticRegression {
    params: LogisticParams,
    fitted: Option<Fitted>,
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| f.model.params())
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "Logistic Regression"
    }

    fn fit(&mut self, features: &Array2<f64>, labels: &Array1<bool>) -> Result<()> {
        if features.nrows() == 0 {
            return Err(PredictorError::Training("no rows to fit".to_string()));
        }

        let targets: Array1<usize> = labels.mapv(usize::from);
        let scaler = LinearScaler::standard()
            .fit(&Dataset::new(features.to_owned(), targets.clone()))
            .map_err(|err| fit_error(self.name(), err))?;
        let scaled: Array2<f64> = scaler.transform(features.to_owned());

        let rows = if self.params.balanced {
            balanced_rows(labels)
        } else {
            (0..labels.len()).collect()
        };
        let train = Dataset::new(scaled.select(Axis(0), &rows), targets.select(Axis(0), &rows));

        // linfa's alpha scales the 0.5 * |w|^2 term, the inverse of C
        let model = LinfaLogistic::default()
            .alpha(1.0 / self.params.c)
            .max_iterations(self.params.max_iter)
            .gradient_tolerance(self.params.gradient_tolerance)
            .fit(&train)
            .map_err(|err| fit_error(self.name(), err))?;

        if model.params().iter().any(|c| !c.is_finite()) || !model.intercept().is_finite() {
            return Err(PredictorError::Training(
                "logistic regression diverged".to_string(),
            ));
        }

        self.fitted = Some(Fitted { scaler, model });
        Ok(())
    }

    /// Probability of the larger label, which is the no-show class.
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PredictorError::UntrainedModel)?;
        let scaled: Array2<f64> = fitted.scaler.transform(features.to_owned());
        Ok(fitted.model.predict_probabilities(&scaled))
    }

    /// Absolute coefficient per feature, on the standardised scale.
    fn feature_importance(&self) -> Option<Array1<f64>> {
        self.coefficients().map(|c| c.mapv(f64::abs))
    }
}
