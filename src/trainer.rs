use std::fmt;
use std::time::{Duration, Instant};

use ndarray::Array1;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::classifiers::Classifier;
use crate::dataset::LabeledSplit;
use crate::error::{PredictorError, Result};
use crate::metrics::{self, RocPoint};
use crate::models::ModelMetrics;

/// One fitted menu entry and its held-out evaluation.
pub struct ModelResult {
    pub name: &'static str,
    pub model: Box<dyn Classifier>,
    pub metrics: ModelMetrics,
    pub predictions: Array1<bool>,
    pub probabilities: Array1<f64>,
    pub fit_duration: Duration,
}

impl fmt::Debug for ModelResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelResult")
            .field("name", &self.name)
            .field("metrics", &self.metrics)
            .field("fit_duration", &self.fit_duration)
            .finish_non_exhaustive()
    }
}

/// Every menu entry in menu order, plus the index of the winner.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub results: Vec<ModelResult>,
    pub best: usize,
    pub test_labels: Array1<bool>,
}

impl TrainingOutcome {
    pub fn best(&self) -> &ModelResult {
        &self.results[self.best]
    }

    pub fn roc_curve(&self) -> Vec<RocPoint> {
        metrics::roc_curve(&self.test_labels, &self.best().probabilities)
    }
}

/// Index of the strictly highest ROC-AUC. Ties keep the earlier entry.
pub fn select_best(metrics: &[ModelMetrics]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, candidate) in metrics.iter().enumerate() {
        match best {
            Some(current) if candidate.roc_auc <= metrics[current].roc_auc => {}
            _ => best = Some(i),
        }
    }
    best
}

fn require_both_classes(split: &LabeledSplit, which: &str) -> Result<()> {
    let positives = split.labels.iter().filter(|l| **l).count();
    if positives == 0 || positives == split.len() {
        return Err(PredictorError::Training(format!(
            "{which} split needs both show and no-show rows"
        )));
    }
    Ok(())
}

fn fit_and_evaluate(
    mut model: Box<dyn Classifier>,
    train: &LabeledSplit,
    test: &LabeledSplit,
) -> Result<ModelResult> {
    let name = model.name();
    let started = Instant::now();
    model.fit(&train.features, &train.labels)?;
    let fit_duration = started.elapsed();

    let probabilities = model.predict_proba(&test.features)?;
    let predictions = model.predict(&test.features)?;
    let metrics = metrics::evaluate(&test.labels, &predictions, &probabilities)?;

    info!(
        model = name,
        accuracy = %format!("{:.3}", metrics.accuracy),
        precision = %format!("{:.3}", metrics.precision),
        recall = %format!("{:.3}", metrics.recall),
        f1 = %format!("{:.3}", metrics.f1),
        roc_auc = %format!("{:.3}", metrics.roc_auc),
        fit_ms = fit_duration.as_millis() as u64,
        "evaluated model"
    );

    Ok(ModelResult {
        name,
        model,
        metrics,
        predictions,
        probabilities,
        fit_duration,
    })
}

/// Fits every classifier in `menu` on `train`, scores each on `test` and
/// keeps all results. Nothing is returned unless the whole menu succeeds.
pub fn train_models(
    train: &LabeledSplit,
    test: &LabeledSplit,
    menu: Vec<Box<dyn Classifier>>,
    parallel: bool,
) -> Result<TrainingOutcome> {
    if menu.is_empty() {
        return Err(PredictorError::Training("empty model menu".to_string()));
    }
    require_both_classes(train, "training")?;
    require_both_classes(test, "test")?;

    info!(
        train_rows = train.len(),
        test_rows = test.len(),
        train_no_show_rate = %format!("{:.3}", train.positive_rate()),
        test_no_show_rate = %format!("{:.3}", test.positive_rate()),
        models = menu.len(),
        "training model menu"
    );

    let results: Vec<ModelResult> = if parallel {
        menu.into_par_iter()
            .map(|model| fit_and_evaluate(model, train, test))
            .collect::<Result<_>>()?
    } else {
        menu.into_iter()
            .map(|model| fit_and_evaluate(model, train, test))
            .collect::<Result<_>>()?
    };

    let scores: Vec<ModelMetrics> = results.iter().map(|r| r.metrics).collect();
    let best = select_best(&scores)
        .ok_or_else(|| PredictorError::Training("no model was evaluated".to_string()))?;
    debug!(?scores, "menu scores");
    info!(
        best_model = results[best].name,
        roc_auc = %format!("{:.3}", results[best].metrics.roc_auc),
        "selected best model"
    );

    Ok(TrainingOutcome {
        results,
        best,
        test_labels: test.labels.clone(),
    })
}
