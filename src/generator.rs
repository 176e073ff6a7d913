//! Synthetic appointment data with known no-show drivers.
//!
//! The label probability is built from a base rate plus additive effects, so
//! a model trained on the output has real signal to find: minors, missing SMS
//! reminders, long lead times, weekend slots and scholarship holders miss
//! more often; seniors and patients with chronic conditions miss less.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp1;
use serde::Serialize;
use tracing::info;

use crate::error::{PredictorError, Result};
use crate::models::{weekday_index, AppointmentRecord, MAX_AGE};

const NEIGHBOURHOODS: [&str; 3] = ["JARDIM DA PENHA", "MATA DA PRAIA", "PONTAL DE CAMBURI"];
const HANDICAP_WEIGHTS: [f64; 5] = [0.92, 0.05, 0.02, 0.008, 0.002];

const AGE_SCALE: f64 = 25.0;
const LEAD_TIME_SCALE: f64 = 7.0;
const MAX_LEAD_DAYS: f64 = 179.0;
/// Scheduling offsets span four whole weeks so weekdays come out uniform.
const SCHEDULING_WINDOW_DAYS: i64 = 28;

const BASE_NO_SHOW: f64 = 0.20;
const MIN_NO_SHOW: f64 = 0.05;
const MAX_NO_SHOW: f64 = 0.85;

#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub count: usize,
    pub no_show_rate: f64,
    pub min_age: u8,
    pub max_age: u8,
    pub min_days_between: u32,
    pub max_days_between: u32,
}

/// Generates `count` labeled appointments. Identical `(count, seed)` pairs
/// produce identical tables.
pub fn generate(count: usize, seed: u64) -> Result<Vec<AppointmentRecord>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let base = NaiveDate::from_ymd_opt(2016, 4, 29)
        .ok_or_else(|| PredictorError::Generation("invalid base date".to_string()))?;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(generate_one(&mut rng, base)?);
    }

    let summary = summarize(&records);
    info!(
        count = summary.count,
        no_show_rate = %format!("{:.1}%", summary.no_show_rate * 100.0),
        age_range = %format!("{}-{}", summary.min_age, summary.max_age),
        days_between_range = %format!("{}-{}", summary.min_days_between, summary.max_days_between),
        "generated synthetic appointments"
    );

    Ok(records)
}

fn generate_one(rng: &mut StdRng, base: NaiveDate) -> Result<AppointmentRecord> {
    let age = exponential(rng, AGE_SCALE).min(f64::from(MAX_AGE)) as u8;
    let gender = if rng.gen_bool(0.5) { "M" } else { "F" };

    let age_factor = f64::from(age) / 100.0;
    let hypertension = rng.gen_bool((age_factor * 0.4 + 0.1).clamp(0.0, 0.8));
    let diabetes = rng.gen_bool((age_factor * 0.3 + 0.05).clamp(0.0, 0.4));
    let alcoholism = rng.gen_bool(0.05);
    let scholarship = rng.gen_bool((0.3 - age_factor * 0.2).clamp(0.05, 0.3));
    let handicap = weighted_level(rng, &HANDICAP_WEIGHTS);
    let sms_received = rng.gen_bool(0.68);
    let days_between = exponential(rng, LEAD_TIME_SCALE).min(MAX_LEAD_DAYS) as u32;

    let offset = rng.gen_range(0..SCHEDULING_WINDOW_DAYS);
    let hour = rng.gen_range(7..18);
    let minute = rng.gen_range(0..60);
    let scheduled_at = (base - Duration::days(offset))
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| PredictorError::Generation("invalid scheduling time".to_string()))?;
    let appointment_at = scheduled_at + Duration::days(i64::from(days_between));
    let appointment_weekday = weekday_index(appointment_at);

    let probability = no_show_probability(
        age,
        sms_received,
        days_between,
        u8::from(hypertension) + u8::from(diabetes),
        appointment_weekday,
        scholarship,
    );
    let no_show = rng.gen_bool(probability);

    Ok(AppointmentRecord {
        patient_id: rng.gen_range(1_000_000..9_999_999),
        appointment_id: rng.gen_range(5_000_000..6_000_000),
        gender: gender.to_string(),
        age,
        neighbourhood: NEIGHBOURHOODS[rng.gen_range(0..NEIGHBOURHOODS.len())].to_string(),
        scholarship,
        hypertension,
        diabetes,
        alcoholism,
        handicap,
        sms_received,
        scheduled_at,
        appointment_at,
        days_between,
        scheduled_weekday: weekday_index(scheduled_at),
        appointment_weekday,
        no_show: Some(no_show),
    })
}

/// True no-show probability behind the generated labels.
pub fn no_show_probability(
    age: u8,
    sms_received: bool,
    days_between: u32,
    chronic_conditions: u8,
    appointment_weekday: u8,
    scholarship: bool,
) -> f64 {
    let age_effect = if age < 18 {
        0.15
    } else if age > 65 {
        -0.05
    } else {
        0.0
    };
    let sms_effect = if sms_received { -0.05 } else { 0.25 };
    let lead_time_effect = (f64::from(days_between) * 0.01).min(0.3);
    let health_effect = -f64::from(chronic_conditions) * 0.05;
    let weekend_effect = if appointment_weekday >= 5 { 0.1 } else { 0.0 };
    let scholarship_effect = if scholarship { 0.08 } else { 0.0 };

    (BASE_NO_SHOW
        + age_effect
        + sms_effect
        + lead_time_effect
        + health_effect
        + weekend_effect
        + scholarship_effect)
        .clamp(MIN_NO_SHOW, MAX_NO_SHOW)
}

fn exponential(rng: &mut StdRng, scale: f64) -> f64 {
    let draw: f64 = rng.sample(Exp1);
    (draw * scale).max(0.0)
}

fn weighted_level(rng: &mut StdRng, weights: &[f64]) -> u8 {
    let total: f64 = weights.iter().sum();
    let mut target = rng.gen::<f64>() * total;
    for (level, weight) in weights.iter().enumerate() {
        if target < *weight {
            return level as u8;
        }
        target -= weight;
    }
    (weights.len() - 1) as u8
}

pub fn summarize(records: &[AppointmentRecord]) -> GenerationSummary {
    let labeled: Vec<bool> = records.iter().filter_map(|r| r.no_show).collect();
    let no_show_rate = if labeled.is_empty() {
        0.0
    } else {
        labeled.iter().filter(|v| **v).count() as f64 / labeled.len() as f64
    };

    GenerationSummary {
        count: records.len(),
        no_show_rate,
        min_age: records.iter().map(|r| r.age).min().unwrap_or(0),
        max_age: records.iter().map(|r| r.age).max().unwrap_or(0),
        min_days_between: records.iter().map(|r| r.days_between).min().unwrap_or(0),
        max_days_between: records.iter().map(|r| r.days_between).max().unwrap_or(0),
    }
}
