//! Prescriptions, one per appointment.
//!
//! Only the appointment's patient and doctor can read or change it. Image
//! references come from the external storage service; the upload itself
//! happens elsewhere.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::appointment::{self, AppointmentError};
use crate::authorization::AuthorizationError;
use crate::db::{self, DatabaseError};
use crate::models::{PrescribedMedicine, Prescription, Principal};

#[derive(Error, Debug)]
pub enum PrescriptionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<AppointmentError> for PrescriptionError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(what) => PrescriptionError::NotFound(what),
            AppointmentError::Forbidden(e) => PrescriptionError::Forbidden(e),
            AppointmentError::Database(e) => PrescriptionError::Database(e),
            other => PrescriptionError::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionUpsert {
    #[serde(alias = "appointmentId")]
    pub appointment_id: Uuid,
    #[serde(alias = "prescribedMedicines")]
    pub medicines: Vec<PrescribedMedicine>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

fn validate_medicines(medicines: &[PrescribedMedicine]) -> Result<Vec<PrescribedMedicine>, PrescriptionError> {
    if medicines.is_empty() {
        return Err(PrescriptionError::Validation(
            "At least one medicine is required".into(),
        ));
    }
    medicines
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let field = |name: &str, value: &str| -> Result<String, PrescriptionError> {
                let value = value.trim();
                if value.is_empty() {
                    Err(PrescriptionError::Validation(format!(
                        "Medicine {} is missing {name}",
                        i + 1
                    )))
                } else {
                    Ok(value.to_string())
                }
            };
            Ok(PrescribedMedicine {
                name: field("name", &m.name)?,
                dosage: field("dosage", &m.dosage)?,
                frequency: field("frequency", &m.frequency)?,
                duration: field("duration", &m.duration)?,
                instructions: m
                    .instructions
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            })
        })
        .collect()
}

fn validate_images(images: &[String]) -> Result<Vec<String>, PrescriptionError> {
    images
        .iter()
        .map(|r| {
            let r = r.trim();
            if r.is_empty() {
                Err(PrescriptionError::Validation("Image references cannot be empty".into()))
            } else {
                Ok(r.to_string())
            }
        })
        .collect()
}

/// Create or replace the appointment's prescription.
pub fn upsert(
    conn: &Connection,
    principal: &Principal,
    req: &PrescriptionUpsert,
) -> Result<Prescription, PrescriptionError> {
    appointment::get_for_participant(conn, principal, &req.appointment_id)?;
    let medicines = validate_medicines(&req.medicines)?;
    let images = req.images.as_deref().map(validate_images).transpose()?;

    let prescription =
        db::upsert_prescription(conn, &req.appointment_id, &medicines, images.as_deref(), Utc::now())?;
    tracing::info!(
        appointment_id = %req.appointment_id,
        prescription_id = %prescription.id,
        medicines = prescription.medicines.len(),
        "Prescription saved"
    );
    Ok(prescription)
}

pub fn get(
    conn: &Connection,
    principal: &Principal,
    appointment_id: &Uuid,
) -> Result<Prescription, PrescriptionError> {
    appointment::get_for_participant(conn, principal, appointment_id)?;
    db::get_prescription_for_appointment(conn, appointment_id)?
        .ok_or(PrescriptionError::NotFound("Prescription"))
}

/// Append image references to an existing prescription.
pub fn attach_images(
    conn: &Connection,
    principal: &Principal,
    appointment_id: &Uuid,
    refs: &[String],
) -> Result<Prescription, PrescriptionError> {
    let mut prescription = get(conn, principal, appointment_id)?;
    let refs = validate_images(refs)?;
    if refs.is_empty() {
        return Err(PrescriptionError::Validation("No image references given".into()));
    }
    prescription.images.extend(refs);
    prescription.updated_at = Utc::now();
    db::set_prescription_images(conn, appointment_id, &prescription.images, prescription.updated_at)?;
    Ok(prescription)
}

pub fn delete(
    conn: &Connection,
    principal: &Principal,
    appointment_id: &Uuid,
) -> Result<(), PrescriptionError> {
    appointment::get_for_participant(conn, principal, appointment_id)?;
    if db::delete_prescription_for_appointment(conn, appointment_id)? {
        tracing::info!(appointment_id = %appointment_id, "Prescription deleted");
        Ok(())
    } else {
        Err(PrescriptionError::NotFound("Prescription"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::appointment::{book, BookingRequest};
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn amoxicillin() -> PrescribedMedicine {
        PrescribedMedicine {
            name: "Amoxicillin".into(),
            dosage: "500mg".into(),
            frequency: "3x daily".into(),
            duration: "7 days".into(),
            instructions: Some("  after meals ".into()),
        }
    }

    struct Fixture {
        conn: Connection,
        patient: Principal,
        doctor: Principal,
        appointment_id: Uuid,
    }

    fn fixture() -> Fixture {
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
        Fixture {
            conn,
            patient: Principal::Patient(p),
            doctor: Principal::Doctor(d),
            appointment_id: appt.id,
        }
    }

    fn upsert_req(appointment_id: Uuid, medicines: Vec<PrescribedMedicine>) -> PrescriptionUpsert {
        PrescriptionUpsert {
            appointment_id,
            medicines,
            images: None,
        }
    }

    #[test]
    fn doctor_writes_patient_reads() {
        let f = fixture();
        let saved = upsert(&f.conn, &f.doctor, &upsert_req(f.appointment_id, vec![amoxicillin()])).unwrap();
        assert_eq!(saved.medicines[0].instructions.as_deref(), Some("after meals"));

        let read = get(&f.conn, &f.patient, &f.appointment_id).unwrap();
        assert_eq!(read.id, saved.id);
    }

    #[test]
    fn upsert_twice_keeps_one_record() {
        let f = fixture();
        let first = upsert(&f.conn, &f.doctor, &upsert_req(f.appointment_id, vec![amoxicillin()])).unwrap();
        let mut changed = amoxicillin();
        changed.dosage = "250mg".into();
        let second = upsert(&f.conn, &f.doctor, &upsert_req(f.appointment_id, vec![changed])).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.medicines[0].dosage, "250mg");
    }

    #[test]
    fn medicines_are_validated() {
        let f = fixture();
        assert!(matches!(
            upsert(&f.conn, &f.doctor, &upsert_req(f.appointment_id, vec![])),
            Err(PrescriptionError::Validation(_))
        ));
        let mut blank = amoxicillin();
        blank.frequency = " ".into();
        assert!(matches!(
            upsert(&f.conn, &f.doctor, &upsert_req(f.appointment_id, vec![blank])),
            Err(PrescriptionError::Validation(msg)) if msg.contains("frequency")
        ));
    }

    #[test]
    fn outsiders_are_forbidden() {
        let f = fixture();
        let outsider = Principal::Doctor(fixtures::doctor(&f.conn, "other@example.com"));
        assert!(matches!(
            upsert(&f.conn, &outsider, &upsert_req(f.appointment_id, vec![amoxicillin()])),
            Err(PrescriptionError::Forbidden(_))
        ));
        assert!(matches!(
            upsert(&f.conn, &f.doctor, &upsert_req(Uuid::new_v4(), vec![amoxicillin()])),
            Err(PrescriptionError::NotFound("Appointment"))
        ));
    }

    #[test]
    fn images_append_and_delete_removes() {
        let f = fixture();
        assert!(matches!(
            attach_images(&f.conn, &f.patient, &f.appointment_id, &["a.png".into()]),
            Err(PrescriptionError::NotFound("Prescription"))
        ));

        upsert(&f.conn, &f.doctor, &upsert_req(f.appointment_id, vec![amoxicillin()])).unwrap();
        attach_images(&f.conn, &f.patient, &f.appointment_id, &["a.png".into()]).unwrap();
        let with_two = attach_images(&f.conn, &f.patient, &f.appointment_id, &["b.png".into()]).unwrap();
        assert_eq!(with_two.images, vec!["a.png".to_string(), "b.png".to_string()]);
        assert_eq!(get(&f.conn, &f.doctor, &f.appointment_id).unwrap().images.len(), 2);

        delete(&f.conn, &f.patient, &f.appointment_id).unwrap();
        assert!(matches!(
            get(&f.conn, &f.patient, &f.appointment_id),
            Err(PrescriptionError::NotFound("Prescription"))
        ));
    }
}
