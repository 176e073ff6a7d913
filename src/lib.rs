//! Predicts whether a patient will miss a scheduled medical appointment.
//!
//! Synthetic appointments come from [`generator`], gain derived columns in
//! [`features`] and become a numeric matrix in [`encoder`]. [`trainer`] fits
//! the classifier menu and keeps the best model by ROC-AUC; [`predictor`]
//! holds the latest run and scores single appointments. [`server`] exposes
//! it all over HTTP.

pub mod classifiers;
pub mod config;
pub mod dataset;
pub mod db;
pub mod encoder;
pub mod error;
pub mod features;
pub mod generator;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod report;
pub mod server;
pub mod table;
pub mod trainer;

pub use error::{PredictorError, Result};
