use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::generator;
use crate::models::AppointmentRecord;
use crate::table;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts `records`, skipping appointment ids already stored. Returns the
/// number of new rows.
pub async fn insert_appointments(
    pool: &PgPool,
    records: &[AppointmentRecord],
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for record in records {
        let days_between =
            i32::try_from(record.days_between).context("days_between exceeds INTEGER")?;

        let result = sqlx::query(
            r#"
            INSERT INTO noshow_predictor.appointments
            (appointment_id, patient_id, gender, age, neighbourhood, scholarship,
             hypertension, diabetes, alcoholism, handicap, sms_received,
             scheduled_at, appointment_at, days_between, scheduled_weekday,
             appointment_weekday, no_show)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (appointment_id) DO NOTHING
            "#,
        )
        .bind(record.appointment_id)
        .bind(record.patient_id)
        .bind(&record.gender)
        .bind(i16::from(record.age))
        .bind(&record.neighbourhood)
        .bind(record.scholarship)
        .bind(record.hypertension)
        .bind(record.diabetes)
        .bind(record.alcoholism)
        .bind(i16::from(record.handicap))
        .bind(record.sms_received)
        .bind(record.scheduled_at)
        .bind(record.appointment_at)
        .bind(days_between)
        .bind(i16::from(record.scheduled_weekday))
        .bind(i16::from(record.appointment_weekday))
        .bind(record.no_show)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn seed(pool: &PgPool, count: usize, seed: u64) -> anyhow::Result<usize> {
    let records = generator::generate(count, seed).context("failed to generate appointments")?;
    insert_appointments(pool, &records).await
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let records = table::read_csv(csv_path)
        .with_context(|| format!("failed to read {}", csv_path.display()))?;
    insert_appointments(pool, &records).await
}

/// Loads every labeled appointment, oldest first.
pub async fn fetch_appointments(pool: &PgPool) -> anyhow::Result<Vec<AppointmentRecord>> {
    let rows = sqlx::query(
        "SELECT appointment_id, patient_id, gender, age, neighbourhood, scholarship, \
         hypertension, diabetes, alcoholism, handicap, sms_received, scheduled_at, \
         appointment_at, days_between, scheduled_weekday, appointment_weekday, no_show \
         FROM noshow_predictor.appointments \
         WHERE no_show IS NOT NULL \
         ORDER BY appointment_at, appointment_id",
    )
    .fetch_all(pool)
    .await?;

    let mut appointments = Vec::with_capacity(rows.len());
    for row in rows {
        let record = record_from_row(&row)?;
        record
            .validate()
            .with_context(|| format!("appointment {} failed validation", record.appointment_id))?;
        appointments.push(record);
    }

    Ok(appointments)
}

fn small(row: &PgRow, column: &str) -> anyhow::Result<u8> {
    let value: i16 = row.try_get(column)?;
    u8::try_from(value).with_context(|| format!("{column} out of range: {value}"))
}

fn record_from_row(row: &PgRow) -> anyhow::Result<AppointmentRecord> {
    let days_between: i32 = row.try_get("days_between")?;
    Ok(AppointmentRecord {
        patient_id: row.try_get("patient_id")?,
        appointment_id: row.try_get("appointment_id")?,
        gender: row.try_get("gender")?,
        age: small(row, "age")?,
        neighbourhood: row.try_get("neighbourhood")?,
        scholarship: row.try_get("scholarship")?,
        hypertension: row.try_get("hypertension")?,
        diabetes: row.try_get("diabetes")?,
        alcoholism: row.try_get("alcoholism")?,
        handicap: small(row, "handicap")?,
        sms_received: row.try_get("sms_received")?,
        scheduled_at: row.try_get("scheduled_at")?,
        appointment_at: row.try_get("appointment_at")?,
        days_between: u32::try_from(days_between)
            .with_context(|| format!("days_between out of range: {days_between}"))?,
        scheduled_weekday: small(row, "scheduled_weekday")?,
        appointment_weekday: small(row, "appointment_weekday")?,
        no_show: row.try_get("no_show")?,
    })
}
