use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Gender codes used when the encoder has not been fitted, or when a value
/// was never seen during fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub fallback_gender_codes: BTreeMap<String, f64>,
    pub fallback_code: f64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        let mut fallback_gender_codes = BTreeMap::new();
        fallback_gender_codes.insert("F".to_string(), 0.0);
        fallback_gender_codes.insert("M".to_string(), 1.0);
        Self {
            fallback_gender_codes,
            fallback_code: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of synthetic appointments generated per training run
    pub records: usize,
    pub seed: u64,
    /// Share of rows held out for evaluation
    pub test_fraction: f64,
    /// Fit menu entries on the rayon pool
    pub parallel: bool,
    pub encoder: EncoderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            records: 10_000,
            seed: 42,
            test_fraction: 0.2,
            parallel: true,
            encoder: EncoderConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Loads `path` when given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
