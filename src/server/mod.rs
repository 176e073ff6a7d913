//! JSON API and dashboard over a shared [`ModelStore`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::classifiers::Classifier;
use crate::config::PipelineConfig;
use crate::predictor::ModelStore;

pub mod error;
pub mod handlers;

pub use error::ServerError;

/// Builds the classifier menu for a training seed.
pub type MenuFactory = fn(u64) -> Vec<Box<dyn Classifier>>;

pub struct AppState {
    pub store: ModelStore,
    pub config: PipelineConfig,
    pub menu: MenuFactory,
}

impl AppState {
    pub fn new(store: ModelStore, config: PipelineConfig, menu: MenuFactory) -> Self {
        Self {
            store,
            config,
            menu,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/train", post(handlers::train))
        .route("/model_performance", get(handlers::model_performance))
        .route("/predict", post(handlers::predict))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "dashboard listening");
    axum::serve(listener, router(state)).await
}
