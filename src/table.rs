use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::models::AppointmentRecord;

pub fn read_records<R: Read>(reader: R) -> Result<Vec<AppointmentRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for row in reader.deserialize::<AppointmentRecord>() {
        let record = row?;
        record.validate()?;
        records.push(record);
    }
    Ok(records)
}

/// Loads and validates an appointment CSV with the dataset's column names.
pub fn read_csv(path: &Path) -> Result<Vec<AppointmentRecord>> {
    let file = std::fs::File::open(path)?;
    let records = read_records(file)?;
    info!(path = %path.display(), rows = records.len(), "loaded appointments");
    Ok(records)
}

pub fn write_records<W: Write>(writer: W, records: &[AppointmentRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, records: &[AppointmentRecord]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_records(file, records)?;
    info!(path = %path.display(), rows = records.len(), "wrote appointments");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictorError;
    use crate::generator::generate;

    const HEADER: &str = "PatientId,AppointmentID,Gender,Age,Neighbourhood,Scholarship,\
Hipertension,Diabetes,Alcoholism,Handcap,SMS_received,ScheduledDay,AppointmentDay,\
days_between,scheduled_weekday,appointment_weekday,No-show";

    #[test]
    fn writes_dataset_headers_and_flags() {
        let records = generate(3, 42).unwrap();
        let mut buffer = Vec::new();
        write_records(&mut buffer, &records).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER));
        let first: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert!(["0", "1"].contains(&first[5]));
        assert!(["0", "1"].contains(&first[16]));
    }

    #[test]
    fn reads_back_what_it_writes() {
        let records = generate(25, 9).unwrap();
        let mut buffer = Vec::new();
        write_records(&mut buffer, &records).unwrap();
        assert_eq!(read_records(buffer.as_slice()).unwrap(), records);
    }

    #[test]
    fn rejects_inconsistent_lead_time() {
        let csv = format!(
            "{HEADER}\n1,2,F,30,CENTRO,0,0,0,0,0,1,2016-04-29T08:00:00,2016-05-02T08:00:00,9,4,0,0\n"
        );
        let err = read_records(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PredictorError::MalformedRecord { ref field, .. } if field == "days_between"));
    }

    #[test]
    fn missing_outcome_column_reads_as_unlabeled() {
        let header = HEADER.trim_end_matches(",No-show");
        let csv = format!(
            "{header}\n1,2,M,30,CENTRO,0,1,0,0,0,1,2016-04-29T08:00:00,2016-05-02T08:00:00,3,4,0\n"
        );
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].no_show, None);
        assert!(records[0].hypertension);
    }
}
