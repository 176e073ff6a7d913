use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::error::Result;
use super::AppState;
use crate::error::PredictorError;
use crate::models::{ModelMetrics, Prediction, PredictionRequest};
use crate::pipeline::train_synthetic;
use crate::predictor::{predict_with, PerformanceReport};

const DASHBOARD_HTML: &str = include_str!("dashboard.html");
const MAX_TRAINING_RECORDS: usize = 500_000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TrainRequest {
    pub records: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub success: bool,
    pub run_id: Uuid,
    pub best_model: &'static str,
    pub metrics: ModelMetrics,
}

/// Empty bodies decode to the default value. Decoding failures name the JSON
/// key that failed, or `body` when the document itself is unreadable.
fn decode_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let deserializer = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let field = if path == "." { "body".to_string() } else { path };
        PredictorError::malformed(field, err.inner().to_string()).into()
    })
}

pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// Regenerates data and retrains the whole menu off the async runtime.
pub async fn train(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<TrainResponse>> {
    let overrides: TrainRequest = decode_body(&body)?;
    let mut config = state.config.clone();
    if let Some(records) = overrides.records {
        if records > MAX_TRAINING_RECORDS {
            return Err(PredictorError::malformed(
                "records",
                format!("at most {MAX_TRAINING_RECORDS}"),
            )
            .into());
        }
        config.records = records;
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }

    info!(records = config.records, seed = config.seed, "training requested");
    let menu = (state.menu)(config.seed);
    let trained = tokio::task::spawn_blocking(move || train_synthetic(&config, menu)).await??;
    let trained = state.store.replace(trained)?;
    let best = trained.outcome.best();

    Ok(Json(TrainResponse {
        success: true,
        run_id: trained.run_id,
        best_model: best.name,
        metrics: best.metrics,
    }))
}

pub async fn model_performance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PerformanceReport>> {
    Ok(Json(state.store.performance()?))
}

pub async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Prediction>> {
    // untrained is reported before the payload is decoded
    let snapshot = state.store.current()?;
    let request: PredictionRequest = decode_body(&body)?;
    Ok(Json(predict_with(&snapshot, &request)?))
}
