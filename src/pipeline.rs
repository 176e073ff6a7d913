use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::classifiers::Classifier;
use crate::config::PipelineConfig;
use crate::dataset::stratified_split;
use crate::encoder::{FeatureEncoder, FEATURE_NAMES};
use crate::error::{PredictorError, Result};
use crate::features::engineer_all;
use crate::generator::{self, GenerationSummary};
use crate::models::AppointmentRecord;
use crate::trainer::{train_models, TrainingOutcome};

/// Everything a prediction needs from one completed training run. Built in
/// full before it becomes visible to readers.
#[derive(Debug)]
pub struct TrainedState {
    pub run_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub encoder: FeatureEncoder,
    pub outcome: TrainingOutcome,
    pub dataset: GenerationSummary,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl TrainedState {
    /// Best model importances paired with column names, highest first.
    pub fn ranked_importance(&self) -> Option<Vec<(&'static str, f64)>> {
        let importance = self.outcome.best().model.feature_importance()?;
        let mut ranked: Vec<(&'static str, f64)> = FEATURE_NAMES
            .iter()
            .copied()
            .zip(importance.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Some(ranked)
    }
}

/// Engineers, encodes, splits and trains on labeled `records`.
pub fn train_on_records(
    records: Vec<AppointmentRecord>,
    config: &PipelineConfig,
    menu: Vec<Box<dyn Classifier>>,
) -> Result<TrainedState> {
    if records.is_empty() {
        return Err(PredictorError::Training("no appointments to train on".to_string()));
    }
    if let Some(position) = records.iter().position(|r| r.no_show.is_none()) {
        return Err(PredictorError::malformed(
            "No-show",
            format!("row {} has no outcome", position + 1),
        ));
    }
    for record in &records {
        record.validate()?;
    }

    let dataset = generator::summarize(&records);
    let engineered = engineer_all(records);
    let mut encoder = FeatureEncoder::new(config.encoder.clone());
    let encoded = encoder.fit(&engineered);
    let (train, test) = stratified_split(&encoded, config.test_fraction, config.seed)?;
    let (train_rows, test_rows) = (train.len(), test.len());

    let outcome = train_models(&train, &test, menu, config.parallel)?;
    let state = TrainedState {
        run_id: Uuid::new_v4(),
        trained_at: Utc::now(),
        encoder,
        outcome,
        dataset,
        train_rows,
        test_rows,
    };
    info!(
        run_id = %state.run_id,
        best_model = state.outcome.best().name,
        "training run complete"
    );
    Ok(state)
}

/// Generates `config.records` synthetic appointments and trains on them.
pub fn train_synthetic(
    config: &PipelineConfig,
    menu: Vec<Box<dyn Classifier>>,
) -> Result<TrainedState> {
    let records = generator::generate(config.records, config.seed)?;
    train_on_records(records, config, menu)
}
