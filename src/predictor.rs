use std::sync::{Arc, RwLock};

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PredictorError, Result};
use crate::metrics::RocPoint;
use crate::models::{
    AppointmentRecord, EngineeredRecord, ModelMetrics, Prediction, PredictionRequest, RiskTier,
    MAX_AGE, MAX_HANDICAP, MAX_WEEKDAY,
};
use crate::pipeline::TrainedState;

const TOP_FEATURES: usize = 10;

/// Holds the latest completed training run. Readers take a cheap `Arc`
/// snapshot; a retrain swaps the whole state in one write.
#[derive(Debug, Default)]
pub struct ModelStore {
    slot: RwLock<Option<Arc<TrainedState>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureWeight {
    pub feature: &'static str,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub name: &'static str,
    pub metrics: ModelMetrics,
}

/// Best model metrics plus the diagnostics the dashboard plots.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    #[serde(flatten)]
    pub metrics: ModelMetrics,
    pub best_model: &'static str,
    pub run_id: Uuid,
    pub roc_curve: Vec<RocPoint>,
    pub feature_importance: Option<Vec<FeatureWeight>>,
    pub models: Vec<ModelSummary>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, state: TrainedState) -> Result<Arc<TrainedState>> {
        let state = Arc::new(state);
        *self.slot.write()? = Some(Arc::clone(&state));
        Ok(state)
    }

    pub fn is_trained(&self) -> Result<bool> {
        Ok(self.slot.read()?.is_some())
    }

    pub fn current(&self) -> Result<Arc<TrainedState>> {
        self.slot
            .read()?
            .as_ref()
            .map(Arc::clone)
            .ok_or(PredictorError::UntrainedModel)
    }

    /// Scores one appointment with the retained best model.
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        let state = self.current()?;
        predict_with(&state, request)
    }

    pub fn performance(&self) -> Result<PerformanceReport> {
        let state = self.current()?;
        Ok(performance_of(&state))
    }
}

pub fn predict_with(state: &TrainedState, request: &PredictionRequest) -> Result<Prediction> {
    let engineered = EngineeredRecord::from(request_to_record(request)?);
    let encoded = state.encoder.apply(std::slice::from_ref(&engineered));
    let best = state.outcome.best();

    let probability = first(best.model.predict_proba(&encoded.features)?.to_vec())?;
    let will_miss = first(best.model.predict(&encoded.features)?.to_vec())?;
    debug!(
        model = best.name,
        risk_score = engineered.features.risk_score,
        probability,
        "scored appointment"
    );

    Ok(Prediction {
        no_show_probability: probability,
        prediction: u8::from(will_miss),
        risk_level: RiskTier::from_probability(probability),
    })
}

fn first<T: Copy>(values: Vec<T>) -> Result<T> {
    values
        .first()
        .copied()
        .ok_or_else(|| PredictorError::Training("model returned no output".to_string()))
}

pub fn performance_of(state: &TrainedState) -> PerformanceReport {
    let best = state.outcome.best();
    let feature_importance = state.ranked_importance().map(|ranked| {
        ranked
            .into_iter()
            .take(TOP_FEATURES)
            .map(|(feature, importance)| FeatureWeight {
                feature,
                importance,
            })
            .collect()
    });

    PerformanceReport {
        metrics: best.metrics,
        best_model: best.name,
        run_id: state.run_id,
        roc_curve: state.outcome.roc_curve(),
        feature_importance,
        models: state
            .outcome
            .results
            .iter()
            .map(|r| ModelSummary {
                name: r.name,
                metrics: r.metrics,
            })
            .collect(),
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| PredictorError::malformed(field, "missing"))
}

fn flag_field(value: Option<u8>, field: &str) -> Result<bool> {
    match required(value, field)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(PredictorError::malformed(field, format!("expected 0 or 1, found {other}"))),
    }
}

fn bounded(value: Option<u8>, field: &str, max: u8) -> Result<u8> {
    let value = required(value, field)?;
    if value > max {
        return Err(PredictorError::malformed(field, format!("{value} > {max}")));
    }
    Ok(value)
}

/// Builds a raw record from request fields. The submitted weekdays are
/// authoritative and may disagree with the nominal timestamps, so the record
/// is not passed through `validate`. Features only read `days_between` and
/// the explicit weekday fields.
fn request_to_record(request: &PredictionRequest) -> Result<AppointmentRecord> {
    let gender = required(request.gender.clone(), "Gender")?;
    if gender.trim().is_empty() {
        return Err(PredictorError::malformed("Gender", "empty"));
    }
    let age = bounded(request.age, "Age", MAX_AGE)?;
    let handicap = bounded(request.handicap, "Handcap", MAX_HANDICAP)?;
    let days_between = required(request.days_between, "days_between")?;
    let scheduled_weekday = bounded(request.scheduled_weekday, "scheduled_weekday", MAX_WEEKDAY)?;
    let appointment_weekday =
        bounded(request.appointment_weekday, "appointment_weekday", MAX_WEEKDAY)?;

    let scheduled_at = NaiveDate::from_ymd_opt(2016, 4, 25)
        .and_then(|monday| monday.checked_add_signed(Duration::days(i64::from(scheduled_weekday))))
        .and_then(|day| day.and_hms_opt(8, 0, 0))
        .ok_or_else(|| PredictorError::malformed("scheduled_weekday", "out of range"))?;
    let appointment_at = scheduled_at
        .checked_add_signed(Duration::days(i64::from(days_between)))
        .ok_or_else(|| PredictorError::malformed("days_between", "out of range"))?;

    Ok(AppointmentRecord {
        patient_id: 0,
        appointment_id: 0,
        gender: gender.trim().to_string(),
        age,
        neighbourhood: String::new(),
        scholarship: flag_field(request.scholarship, "Scholarship")?,
        hypertension: flag_field(request.hypertension, "Hipertension")?,
        diabetes: flag_field(request.diabetes, "Diabetes")?,
        alcoholism: flag_field(request.alcoholism, "Alcoholism")?,
        handicap,
        sms_received: flag_field(request.sms_received, "SMS_received")?,
        scheduled_at,
        appointment_at,
        days_between,
        scheduled_weekday,
        appointment_weekday,
        no_show: None,
    })
}
