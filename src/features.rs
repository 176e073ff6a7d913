use crate::models::{AgeGroup, AppointmentRecord, EngineeredFeatures, EngineeredRecord};

/// Saturday and Sunday under the 0 = Monday numbering.
pub fn is_weekend(weekday: u8) -> bool {
    weekday == 5 || weekday == 6
}

pub fn total_conditions(record: &AppointmentRecord) -> u8 {
    u8::from(record.hypertension)
        + u8::from(record.diabetes)
        + u8::from(record.alcoholism)
        + u8::from(record.handicap > 0)
}

/// Heuristic no-show risk used as a model input. Unclamped, ranges 0.0-1.3.
pub fn risk_score(age: u8, sms_received: bool, days_between: u32, scholarship: bool) -> f64 {
    let minor = if age < 18 { 0.3 } else { 0.0 };
    let very_old = if age > 80 { 0.1 } else { 0.0 };
    let no_reminder = if sms_received { 0.0 } else { 0.4 };
    let lead_time = (f64::from(days_between) / 30.0).min(1.0) * 0.3;
    let financial = if scholarship { 0.2 } else { 0.0 };
    minor + very_old + no_reminder + lead_time + financial
}

pub fn engineer(record: &AppointmentRecord) -> EngineeredFeatures {
    EngineeredFeatures {
        age_group: AgeGroup::from_age(record.age),
        total_conditions: total_conditions(record),
        risk_score: risk_score(
            record.age,
            record.sms_received,
            record.days_between,
            record.scholarship,
        ),
        is_weekend: is_weekend(record.appointment_weekday),
    }
}

pub fn engineer_all(records: Vec<AppointmentRecord>) -> Vec<EngineeredRecord> {
    records.into_iter().map(EngineeredRecord::from).collect()
}

impl From<AppointmentRecord> for EngineeredRecord {
    fn from(record: AppointmentRecord) -> Self {
        let features = engineer(&record);
        EngineeredRecord { record, features }
    }
}

impl EngineeredRecord {
    /// Recomputes the derived features from the raw fields. Applying this to
    /// an already engineered record leaves it unchanged.
    pub fn reengineer(self) -> Self {
        EngineeredRecord::from(self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator;
    use proptest::prelude::*;

    #[test]
    fn minor_without_reminder_scores_high() {
        let score = risk_score(10, false, 40, true);
        assert!((score - 1.2).abs() < 1e-9);
    }

    #[test]
    fn adult_with_reminder_scores_low() {
        assert_eq!(risk_score(40, true, 0, false), 0.0);
        assert!((risk_score(85, true, 15, false) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn weekend_flag_uses_monday_zero() {
        assert!(!is_weekend(0));
        assert!(!is_weekend(4));
        assert!(is_weekend(5));
        assert!(is_weekend(6));
    }

    #[test]
    fn conditions_count_handicap_once() {
        let mut record = generator::generate(1, 9).unwrap().remove(0);
        record.hypertension = true;
        record.diabetes = true;
        record.alcoholism = false;
        record.handicap = 3;
        assert_eq!(total_conditions(&record), 3);
    }

    #[test]
    fn reengineering_is_a_no_op() {
        for engineered in engineer_all(generator::generate(100, 5).unwrap()) {
            let again = engineered.clone().reengineer();
            assert_eq!(again, engineered);
        }
    }

    proptest! {
        #[test]
        fn every_age_maps_to_one_group(age in 0u8..=95) {
            let group = AgeGroup::from_age(age);
            let expected = match age {
                a if a < 18 => AgeGroup::Child,
                a if a < 35 => AgeGroup::YoungAdult,
                a if a < 50 => AgeGroup::Adult,
                a if a < 65 => AgeGroup::MiddleAged,
                _ => AgeGroup::Senior,
            };
            prop_assert_eq!(group, expected);
        }

        #[test]
        fn risk_grows_with_lead_time(
            age in 0u8..=95,
            sms in any::<bool>(),
            scholarship in any::<bool>(),
            days in 0u32..179,
            extra in 0u32..60,
        ) {
            let shorter = risk_score(age, sms, days, scholarship);
            let longer = risk_score(age, sms, days + extra, scholarship);
            prop_assert!(longer >= shorter);
        }

        #[test]
        fn missing_reminder_never_lowers_risk(
            age in 0u8..=95,
            scholarship in any::<bool>(),
            days in 0u32..179,
        ) {
            prop_assert!(risk_score(age, false, days, scholarship) >= risk_score(age, true, days, scholarship));
        }
    }
}
