use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{PredictorError, Result};

pub const MAX_AGE: u8 = 95;
pub const MAX_HANDICAP: u8 = 4;
pub const MAX_WEEKDAY: u8 = 6;

/// One scheduled appointment. Column names follow the public no-show dataset
/// so exported CSVs load into the usual notebooks unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    #[serde(rename = "PatientId")]
    pub patient_id: i64,
    #[serde(rename = "AppointmentID")]
    pub appointment_id: i64,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Age")]
    pub age: u8,
    #[serde(rename = "Neighbourhood")]
    pub neighbourhood: String,
    #[serde(rename = "Scholarship", with = "flag")]
    pub scholarship: bool,
    #[serde(rename = "Hipertension", with = "flag")]
    pub hypertension: bool,
    #[serde(rename = "Diabetes", with = "flag")]
    pub diabetes: bool,
    #[serde(rename = "Alcoholism", with = "flag")]
    pub alcoholism: bool,
    #[serde(rename = "Handcap")]
    pub handicap: u8,
    #[serde(rename = "SMS_received", with = "flag")]
    pub sms_received: bool,
    #[serde(rename = "ScheduledDay")]
    pub scheduled_at: NaiveDateTime,
    #[serde(rename = "AppointmentDay")]
    pub appointment_at: NaiveDateTime,
    pub days_between: u32,
    pub scheduled_weekday: u8,
    pub appointment_weekday: u8,
    #[serde(rename = "No-show", with = "optional_flag", default)]
    pub no_show: Option<bool>,
}

impl AppointmentRecord {
    /// Checks the cross-field invariants. Loaders call this on every row so a
    /// bad export fails on the offending column instead of skewing training.
    pub fn validate(&self) -> Result<()> {
        if self.appointment_at < self.scheduled_at {
            return Err(PredictorError::malformed(
                "AppointmentDay",
                "appointment precedes scheduling",
            ));
        }
        let expected = days_between(self.scheduled_at, self.appointment_at);
        if i64::from(self.days_between) != expected {
            return Err(PredictorError::malformed(
                "days_between",
                format!("expected {expected}, found {}", self.days_between),
            ));
        }
        if self.age > MAX_AGE {
            return Err(PredictorError::malformed("Age", format!("{} > {MAX_AGE}", self.age)));
        }
        if self.handicap > MAX_HANDICAP {
            return Err(PredictorError::malformed(
                "Handcap",
                format!("{} > {MAX_HANDICAP}", self.handicap),
            ));
        }
        if self.scheduled_weekday > MAX_WEEKDAY {
            return Err(PredictorError::malformed("scheduled_weekday", "must be 0-6"));
        }
        if self.appointment_weekday > MAX_WEEKDAY {
            return Err(PredictorError::malformed("appointment_weekday", "must be 0-6"));
        }
        for (field, stored, at) in [
            ("scheduled_weekday", self.scheduled_weekday, self.scheduled_at),
            ("appointment_weekday", self.appointment_weekday, self.appointment_at),
        ] {
            let expected = weekday_index(at);
            if stored != expected {
                return Err(PredictorError::malformed(
                    field,
                    format!("expected {expected}, found {stored}"),
                ));
            }
        }
        Ok(())
    }
}

pub fn days_between(scheduled: NaiveDateTime, appointment: NaiveDateTime) -> i64 {
    (appointment.date() - scheduled.date()).num_days()
}

/// Weekday index with 0 = Monday and 6 = Sunday.
pub fn weekday_index(at: NaiveDateTime) -> u8 {
    at.weekday().num_days_from_monday() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Child,
    YoungAdult,
    Adult,
    MiddleAged,
    Senior,
}

impl AgeGroup {
    pub fn from_age(age: u8) -> Self {
        match age {
            0..=17 => AgeGroup::Child,
            18..=34 => AgeGroup::YoungAdult,
            35..=49 => AgeGroup::Adult,
            50..=64 => AgeGroup::MiddleAged,
            _ => AgeGroup::Senior,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Child => "child",
            AgeGroup::YoungAdult => "young_adult",
            AgeGroup::Adult => "adult",
            AgeGroup::MiddleAged => "middle_aged",
            AgeGroup::Senior => "senior",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineeredFeatures {
    pub age_group: AgeGroup,
    pub total_conditions: u8,
    pub risk_score: f64,
    pub is_weekend: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredRecord {
    pub record: AppointmentRecord,
    pub features: EngineeredFeatures,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.6 {
            RiskTier::High
        } else if probability > 0.3 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub no_show_probability: f64,
    pub prediction: u8,
    pub risk_level: RiskTier,
}

/// Attributes submitted for a single prediction. Every field is optional at
/// the serde level so a missing one is reported by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(alias = "Age")]
    pub age: Option<u8>,
    #[serde(alias = "Gender")]
    pub gender: Option<String>,
    #[serde(alias = "Scholarship")]
    pub scholarship: Option<u8>,
    #[serde(alias = "Hipertension")]
    pub hypertension: Option<u8>,
    #[serde(alias = "Diabetes")]
    pub diabetes: Option<u8>,
    #[serde(alias = "Alcoholism")]
    pub alcoholism: Option<u8>,
    #[serde(alias = "Handcap")]
    pub handicap: Option<u8>,
    #[serde(alias = "SMS_received")]
    pub sms_received: Option<u8>,
    pub days_between: Option<u32>,
    pub scheduled_weekday: Option<u8>,
    pub appointment_weekday: Option<u8>,
}

mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(serde::de::Error::custom(format!("expected 0 or 1, found {other}"))),
        }
    }
}

mod optional_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&u8::from(*v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<bool>, D::Error> {
        match Option::<u8>::deserialize(deserializer)? {
            None => Ok(None),
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected 0 or 1, found {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    fn sample_record() -> AppointmentRecord {
        let scheduled_at = at(2016, 4, 25, 9);
        let appointment_at = at(2016, 4, 29, 9);
        AppointmentRecord {
            patient_id: 1_234_567,
            appointment_id: 5_600_000,
            gender: "F".to_string(),
            age: 42,
            neighbourhood: "JARDIM DA PENHA".to_string(),
            scholarship: false,
            hypertension: true,
            diabetes: false,
            alcoholism: false,
            handicap: 0,
            sms_received: true,
            scheduled_at,
            appointment_at,
            days_between: 4,
            scheduled_weekday: weekday_index(scheduled_at),
            appointment_weekday: weekday_index(appointment_at),
            no_show: Some(false),
        }
    }

    #[test]
    fn weekday_index_starts_on_monday() {
        // 2016-04-25 was a Monday
        assert_eq!(weekday_index(at(2016, 4, 25, 0)), 0);
        assert_eq!(weekday_index(at(2016, 4, 30, 0)), 5);
        assert_eq!(weekday_index(at(2016, 5, 1, 0)), 6);
    }

    #[test]
    fn valid_record_passes() {
        assert!(sample_record().validate().is_ok());
    }

    #[test]
    fn rejects_appointment_before_scheduling() {
        let mut record = sample_record();
        record.appointment_at = at(2016, 4, 20, 9);
        let err = record.validate().unwrap_err();
        assert!(matches!(err, PredictorError::MalformedRecord { ref field, .. } if field == "AppointmentDay"));
    }

    #[test]
    fn rejects_inconsistent_days_between() {
        let mut record = sample_record();
        record.days_between = 7;
        let err = record.validate().unwrap_err();
        assert!(matches!(err, PredictorError::MalformedRecord { ref field, .. } if field == "days_between"));
    }

    #[test]
    fn rejects_weekday_that_disagrees_with_its_date() {
        let mut record = sample_record();
        record.appointment_weekday = (record.appointment_weekday + 1) % 7;
        let err = record.validate().unwrap_err();
        assert!(matches!(err, PredictorError::MalformedRecord { ref field, .. } if field == "appointment_weekday"));
    }

    #[test]
    fn rejects_out_of_range_handicap() {
        let mut record = sample_record();
        record.handicap = 5;
        assert!(record.validate().is_err());
    }

    #[test]
    fn age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(17), AgeGroup::Child);
        assert_eq!(AgeGroup::from_age(18), AgeGroup::YoungAdult);
        assert_eq!(AgeGroup::from_age(35), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(50), AgeGroup::MiddleAged);
        assert_eq!(AgeGroup::from_age(64), AgeGroup::MiddleAged);
        assert_eq!(AgeGroup::from_age(65), AgeGroup::Senior);
        assert_eq!(AgeGroup::from_age(95), AgeGroup::Senior);
    }

    #[test]
    fn risk_tier_boundaries_are_exclusive() {
        assert_eq!(RiskTier::from_probability(0.30), RiskTier::Low);
        assert_eq!(RiskTier::from_probability(0.30001), RiskTier::Medium);
        assert_eq!(RiskTier::from_probability(0.60), RiskTier::Medium);
        assert_eq!(RiskTier::from_probability(0.60001), RiskTier::High);
        assert_eq!(RiskTier::from_probability(0.0), RiskTier::Low);
    }

    #[test]
    fn prediction_request_accepts_dataset_column_names() {
        let json = r#"{"Age": 30, "Gender": "M", "SMS_received": 1, "days_between": 3}"#;
        let request: PredictionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.age, Some(30));
        assert_eq!(request.gender.as_deref(), Some("M"));
        assert_eq!(request.sms_received, Some(1));
        assert_eq!(request.scholarship, None);
    }
}
