//! Patient care records: health portfolio, medical history and doctor feedback.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::authorization::AuthorizationError;
use crate::db::{self, DatabaseError};
use crate::models::enums::BloodGroup;
use crate::models::{Feedback, HealthPortfolio, MedicalHistoryEntry};

const MAX_AGE: u32 = 150;

#[derive(Error, Debug)]
pub enum CareRecordError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ─── Health portfolio ───

/// Partial portfolio update. The first write must carry age, blood group,
/// weight and height; later writes may change any subset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioUpdate {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default, alias = "bloodGroup")]
    pub blood_group: Option<String>,
    #[serde(default, alias = "weight")]
    pub weight_kg: Option<f64>,
    #[serde(default, alias = "height")]
    pub height_cm: Option<f64>,
    #[serde(default, alias = "chronicDiseases")]
    pub chronic_diseases: Option<Vec<String>>,
    #[serde(default)]
    pub allergies: Option<Vec<String>>,
}

fn parse_blood_group(raw: &str) -> Result<BloodGroup, CareRecordError> {
    match raw.trim().to_uppercase().as_str() {
        "A+" => Ok(BloodGroup::APositive),
        "A-" => Ok(BloodGroup::ANegative),
        "B+" => Ok(BloodGroup::BPositive),
        "B-" => Ok(BloodGroup::BNegative),
        "O+" => Ok(BloodGroup::OPositive),
        "O-" => Ok(BloodGroup::ONegative),
        "AB+" => Ok(BloodGroup::AbPositive),
        "AB-" => Ok(BloodGroup::AbNegative),
        _ => Err(CareRecordError::Validation(
            "blood_group must be one of A+, A-, B+, B-, O+, O-, AB+, AB-".into(),
        )),
    }
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn missing(field: &str) -> CareRecordError {
    CareRecordError::Validation(format!("{field} is required"))
}

pub fn get_portfolio(conn: &Connection, patient_id: &Uuid) -> Result<HealthPortfolio, CareRecordError> {
    db::get_portfolio(conn, patient_id)?.ok_or(CareRecordError::NotFound("Health portfolio"))
}

/// A doctor's view of a patient's portfolio.
pub fn get_patient_portfolio(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<HealthPortfolio, CareRecordError> {
    if db::get_patient(conn, patient_id)?.is_none() {
        return Err(CareRecordError::NotFound("Patient"));
    }
    get_portfolio(conn, patient_id)
}

pub fn upsert_portfolio(
    conn: &Connection,
    patient_id: &Uuid,
    update: &PortfolioUpdate,
) -> Result<HealthPortfolio, CareRecordError> {
    let existing = db::get_portfolio(conn, patient_id)?;

    let age = update
        .age
        .or(existing.as_ref().map(|p| p.age))
        .ok_or_else(|| missing("age"))?;
    if age > MAX_AGE {
        return Err(CareRecordError::Validation(format!("age must be at most {MAX_AGE}")));
    }
    let blood_group = match update.blood_group.as_deref() {
        Some(raw) => parse_blood_group(raw)?,
        None => existing
            .as_ref()
            .map(|p| p.blood_group)
            .ok_or_else(|| missing("blood_group"))?,
    };
    let weight_kg = update
        .weight_kg
        .or(existing.as_ref().map(|p| p.weight_kg))
        .ok_or_else(|| missing("weight"))?;
    let height_cm = update
        .height_cm
        .or(existing.as_ref().map(|p| p.height_cm))
        .ok_or_else(|| missing("height"))?;
    if !(weight_kg.is_finite() && weight_kg > 0.0) {
        return Err(CareRecordError::Validation("weight must be greater than 0".into()));
    }
    if !(height_cm.is_finite() && height_cm > 0.0) {
        return Err(CareRecordError::Validation("height must be greater than 0".into()));
    }

    let portfolio = HealthPortfolio {
        patient_id: *patient_id,
        age,
        blood_group,
        weight_kg,
        height_cm,
        chronic_diseases: match &update.chronic_diseases {
            Some(list) => clean_list(list),
            None => existing.as_ref().map(|p| p.chronic_diseases.clone()).unwrap_or_default(),
        },
        allergies: match &update.allergies {
            Some(list) => clean_list(list),
            None => existing.as_ref().map(|p| p.allergies.clone()).unwrap_or_default(),
        },
        last_updated: Utc::now(),
    };
    db::upsert_portfolio(conn, &portfolio)?;
    tracing::debug!(patient_id = %patient_id, created = existing.is_none(), "Health portfolio saved");
    Ok(portfolio)
}

// ─── Medical history ───

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicalHistoryUpsert {
    #[serde(default)]
    pub illness: Option<String>,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, alias = "doctors")]
    pub doctor_ids: Vec<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Insert the entry for (patient, illness) or replace its details.
pub fn upsert_medical_history(
    conn: &Connection,
    patient_id: &Uuid,
    req: &MedicalHistoryUpsert,
) -> Result<MedicalHistoryEntry, CareRecordError> {
    let illness = optional_text(req.illness.as_deref()).ok_or_else(|| missing("illness"))?;
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if end < start {
            return Err(CareRecordError::Validation(
                "end_date cannot be before start_date".into(),
            ));
        }
    }
    for doctor_id in &req.doctor_ids {
        if db::get_doctor(conn, doctor_id)?.is_none() {
            return Err(CareRecordError::NotFound("Doctor"));
        }
    }

    let entry = MedicalHistoryEntry {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        illness,
        treatment: optional_text(req.treatment.as_deref()),
        start_date: req.start_date,
        end_date: req.end_date,
        doctor_ids: req.doctor_ids.clone(),
        notes: optional_text(req.notes.as_deref()),
    };
    Ok(db::upsert_medical_history(conn, &entry)?)
}

/// A doctor's view of a patient's history, without the treating-doctor ids.
pub fn list_patient_history(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicalHistoryEntry>, CareRecordError> {
    if db::get_patient(conn, patient_id)?.is_none() {
        return Err(CareRecordError::NotFound("Patient"));
    }
    let mut entries = db::list_medical_history(conn, patient_id)?;
    for entry in &mut entries {
        entry.doctor_ids.clear();
    }
    Ok(entries)
}

// ─── Feedback ───

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    #[serde(alias = "doctorId")]
    pub doctor_id: Uuid,
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, alias = "appointmentId")]
    pub appointment_id: Option<Uuid>,
}

pub fn add_feedback(
    conn: &Connection,
    patient_id: &Uuid,
    req: &NewFeedback,
) -> Result<Feedback, CareRecordError> {
    let rating = u8::try_from(req.rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| CareRecordError::Validation("rating must be between 1 and 5".into()))?;
    if db::get_doctor(conn, &req.doctor_id)?.is_none() {
        return Err(CareRecordError::NotFound("Doctor"));
    }
    if let Some(appointment_id) = req.appointment_id {
        let appt =
            db::get_appointment(conn, &appointment_id)?.ok_or(CareRecordError::NotFound("Appointment"))?;
        if appt.patient_id != *patient_id {
            return Err(AuthorizationError::NotParticipant.into());
        }
        if appt.doctor_id != req.doctor_id {
            return Err(CareRecordError::Validation(
                "Appointment is with a different doctor".into(),
            ));
        }
    }

    let feedback = Feedback {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        doctor_id: req.doctor_id,
        appointment_id: req.appointment_id,
        rating,
        comment: optional_text(req.comment.as_deref()),
        created_at: Utc::now(),
    };
    match db::insert_feedback(conn, &feedback) {
        Ok(()) => {}
        Err(e) if e.is_unique_violation() => {
            return Err(CareRecordError::Validation(
                "Feedback was already submitted for this appointment".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(
        feedback_id = %feedback.id,
        doctor_id = %feedback.doctor_id,
        rating = feedback.rating,
        "Feedback added"
    );
    Ok(feedback)
}

pub fn feedback_for_doctor(conn: &Connection, doctor_id: &Uuid) -> Result<Vec<Feedback>, CareRecordError> {
    Ok(db::list_feedback_for_doctor(conn, doctor_id)?)
}

pub fn all_feedback(conn: &Connection) -> Result<Vec<Feedback>, CareRecordError> {
    Ok(db::list_all_feedback(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::{book, BookingRequest};
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn full_portfolio() -> PortfolioUpdate {
        PortfolioUpdate {
            age: Some(34),
            blood_group: Some("ab-".into()),
            weight_kg: Some(70.5),
            height_cm: Some(172.0),
            chronic_diseases: Some(vec!["Asthma".into(), " ".into()]),
            allergies: None,
        }
    }

    #[test]
    fn portfolio_missing_is_not_found() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        assert!(matches!(
            get_portfolio(&conn, &p.id),
            Err(CareRecordError::NotFound("Health portfolio"))
        ));
        assert!(matches!(
            get_patient_portfolio(&conn, &Uuid::new_v4()),
            Err(CareRecordError::NotFound("Patient"))
        ));
    }

    #[test]
    fn portfolio_first_write_then_partial_update() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");

        let first = upsert_portfolio(&conn, &p.id, &full_portfolio()).unwrap();
        assert_eq!(first.blood_group, BloodGroup::AbNegative);
        assert_eq!(first.chronic_diseases, vec!["Asthma".to_string()]);

        let partial = PortfolioUpdate {
            weight_kg: Some(68.0),
            ..Default::default()
        };
        let second = upsert_portfolio(&conn, &p.id, &partial).unwrap();
        assert_eq!(second.weight_kg, 68.0);
        assert_eq!(second.age, 34);
        assert_eq!(second.chronic_diseases, first.chronic_diseases);
        assert_eq!(get_patient_portfolio(&conn, &p.id).unwrap(), second);
    }

    #[test]
    fn portfolio_values_are_validated() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");

        let partial = PortfolioUpdate {
            age: Some(30),
            ..Default::default()
        };
        assert!(matches!(
            upsert_portfolio(&conn, &p.id, &partial),
            Err(CareRecordError::Validation(msg)) if msg.starts_with("blood_group")
        ));

        let mut bad = full_portfolio();
        bad.blood_group = Some("C+".into());
        assert!(upsert_portfolio(&conn, &p.id, &bad).is_err());

        let mut bad = full_portfolio();
        bad.height_cm = Some(0.0);
        assert!(upsert_portfolio(&conn, &p.id, &bad).is_err());

        let mut bad = full_portfolio();
        bad.age = Some(200);
        assert!(upsert_portfolio(&conn, &p.id, &bad).is_err());
    }

    #[test]
    fn history_upserts_by_illness_and_hides_doctors() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let d = fixtures::doctor(&conn, "d@example.com");

        let req = MedicalHistoryUpsert {
            illness: Some("Asthma".into()),
            treatment: Some("Inhaler".into()),
            doctor_ids: vec![d.id],
            ..Default::default()
        };
        let first = upsert_medical_history(&conn, &p.id, &req).unwrap();
        let second = upsert_medical_history(
            &conn,
            &p.id,
            &MedicalHistoryUpsert {
                treatment: Some("Steroids".into()),
                ..req
            },
        )
        .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.doctor_ids, vec![d.id]);

        let listed = list_patient_history(&conn, &p.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].treatment.as_deref(), Some("Steroids"));
        assert!(listed[0].doctor_ids.is_empty());
    }

    #[test]
    fn history_rejects_reversed_dates() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let req = MedicalHistoryUpsert {
            illness: Some("Flu".into()),
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        assert!(matches!(
            upsert_medical_history(&conn, &p.id, &req),
            Err(CareRecordError::Validation(_))
        ));
    }

    #[test]
    fn feedback_is_one_per_appointment() {
        let conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let d = fixtures::doctor(&conn, "d@example.com");
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let appt = book(
            &conn,
            &p.id,
            &BookingRequest {
                doctor_id: d.id,
                date: Some(date),
            },
            date,
        )
        .unwrap();

        let req = NewFeedback {
            doctor_id: d.id,
            rating: 5,
            comment: Some("Great".into()),
            appointment_id: Some(appt.id),
        };
        add_feedback(&conn, &p.id, &req).unwrap();
        assert!(matches!(
            add_feedback(&conn, &p.id, &req),
            Err(CareRecordError::Validation(_))
        ));

        // Unlinked feedback is unrestricted.
        let unlinked = NewFeedback {
            appointment_id: None,
            rating: 3,
            ..req
        };
        add_feedback(&conn, &p.id, &unlinked).unwrap();
        assert_eq!(feedback_for_doctor(&conn, &d.id).unwrap().len(), 2);
        assert_eq!(all_feedback(&conn).unwrap().len(), 2);
    }

    #[test]
    fn feedback_checks_rating_and_ownership() {
        let conn = open_memory_database().unwrap();
        let owner = fixtures::patient(&conn, "owner@example.com");
        let other = fixtures::patient(&conn, "other@example.com");
        let d = fixtures::doctor(&conn, "d@example.com");
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let appt = book(
            &conn,
            &owner.id,
            &BookingRequest {
                doctor_id: d.id,
                date: Some(date),
            },
            date,
        )
        .unwrap();

        for rating in [0, 6, -1] {
            let req = NewFeedback {
                doctor_id: d.id,
                rating,
                comment: None,
                appointment_id: None,
            };
            assert!(matches!(
                add_feedback(&conn, &owner.id, &req),
                Err(CareRecordError::Validation(_))
            ));
        }

        let req = NewFeedback {
            doctor_id: d.id,
            rating: 4,
            comment: None,
            appointment_id: Some(appt.id),
        };
        assert!(matches!(
            add_feedback(&conn, &other.id, &req),
            Err(CareRecordError::Forbidden(AuthorizationError::NotParticipant))
        ));

        let other_doctor = fixtures::doctor(&conn, "d2@example.com");
        let req = NewFeedback {
            doctor_id: other_doctor.id,
            ..req
        };
        assert!(matches!(
            add_feedback(&conn, &owner.id, &req),
            Err(CareRecordError::Validation(_))
        ));
    }
}
