use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use tracing::warn;

use crate::config::EncoderConfig;
use crate::models::EngineeredRecord;

/// Model input columns, in the order every classifier is trained with.
pub const FEATURE_NAMES: [&str; 14] = [
    "Age",
    "Gender",
    "Scholarship",
    "Hipertension",
    "Diabetes",
    "Alcoholism",
    "Handcap",
    "SMS_received",
    "days_between",
    "scheduled_weekday",
    "appointment_weekday",
    "total_conditions",
    "risk_score",
    "is_weekend",
];

pub const N_FEATURES: usize = FEATURE_NAMES.len();

#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub features: Array2<f64>,
    /// Present only when every input record carried an outcome.
    pub labels: Option<Array1<bool>>,
}

impl EncodedDataset {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }
}

#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    config: EncoderConfig,
    gender_codes: Option<BTreeMap<String, f64>>,
}

impl FeatureEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config,
            gender_codes: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.gender_codes.is_some()
    }

    /// Learns the gender mapping (sorted distinct values numbered from zero)
    /// and encodes `records` with it.
    pub fn fit(&mut self, records: &[EngineeredRecord]) -> EncodedDataset {
        let mut distinct: Vec<&str> = records.iter().map(|r| r.record.gender.as_str()).collect();
        distinct.sort_unstable();
        distinct.dedup();

        let codes = distinct
            .into_iter()
            .enumerate()
            .map(|(code, value)| (value.to_string(), code as f64))
            .collect();
        self.gender_codes = Some(codes);

        self.apply(records)
    }

    /// Encodes `records` with the stored mapping. Unknown categories, or a
    /// call before `fit`, fall back to the configured mapping.
    pub fn apply(&self, records: &[EngineeredRecord]) -> EncodedDataset {
        let mut features = Array2::<f64>::zeros((records.len(), N_FEATURES));
        for (i, engineered) in records.iter().enumerate() {
            let gender = self.gender_code(&engineered.record.gender);
            let row = encode_row(engineered, gender);
            for (j, value) in row.iter().enumerate() {
                features[(i, j)] = *value;
            }
        }

        let labels: Option<Vec<bool>> = records.iter().map(|r| r.record.no_show).collect();
        EncodedDataset {
            features,
            labels: labels.map(Array1::from),
        }
    }

    pub fn gender_code(&self, gender: &str) -> f64 {
        if let Some(code) = self.gender_codes.as_ref().and_then(|codes| codes.get(gender)) {
            return *code;
        }
        if self.gender_codes.is_some() {
            warn!(gender, "gender not seen during fitting, using fallback code");
        }
        self.config
            .fallback_gender_codes
            .get(gender)
            .copied()
            .unwrap_or(self.config.fallback_code)
    }
}

fn encode_row(engineered: &EngineeredRecord, gender: f64) -> [f64; N_FEATURES] {
    let record = &engineered.record;
    let features = &engineered.features;
    [
        f64::from(record.age),
        gender,
        flag(record.scholarship),
        flag(record.hypertension),
        flag(record.diabetes),
        flag(record.alcoholism),
        f64::from(record.handicap),
        flag(record.sms_received),
        f64::from(record.days_between),
        f64::from(record.scheduled_weekday),
        f64::from(record.appointment_weekday),
        f64::from(features.total_conditions),
        features.risk_score,
        flag(features.is_weekend),
    ]
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
