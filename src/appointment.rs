//! Appointment lifecycle.
//!
//! ```text
//! Scheduled ──confirm (doctor)──▶ Completed
//!     └──────cancel (either)────▶ Cancelled
//! ```
//!
//! Completed and Cancelled are terminal. Transitions are conditional updates
//! on `status = 'scheduled'`, so two racing requests cannot both win, and the
//! one-Scheduled-per-(patient, doctor, date) rule is a partial unique index.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::authorization::{require_participant, AppointmentRole, AuthorizationError};
use crate::db::{self, DatabaseError};
use crate::models::enums::AppointmentStatus;
use crate::models::{Appointment, AppointmentSummary, Principal};

pub const DUPLICATE_BOOKING_MESSAGE: &str =
    "You already have an appointment with this doctor on the same date.";

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{}", DUPLICATE_BOOKING_MESSAGE)]
    DuplicateAppointment,

    #[error("Appointment is already {from}")]
    InvalidTransition { from: AppointmentStatus },

    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    #[serde(alias = "doctorId")]
    pub doctor_id: Uuid,
    /// Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Which appointments a doctor listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Only(AppointmentStatus),
    All,
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::Only(AppointmentStatus::Scheduled)
    }
}

impl StatusFilter {
    /// `None` gives the default (Scheduled); `"all"` disables filtering.
    pub fn parse(raw: Option<&str>) -> Result<Self, AppointmentError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::default());
        };
        let lowered = raw.to_lowercase();
        if lowered == "all" {
            return Ok(Self::All);
        }
        lowered
            .parse::<AppointmentStatus>()
            .map(Self::Only)
            .map_err(|_| {
                AppointmentError::Validation(format!(
                    "Unknown status filter '{raw}'; use scheduled, completed, cancelled or all"
                ))
            })
    }

    fn as_status(self) -> Option<AppointmentStatus> {
        match self {
            Self::Only(status) => Some(status),
            Self::All => None,
        }
    }
}

/// Book a new Scheduled appointment for `patient_id`.
pub fn book(
    conn: &Connection,
    patient_id: &Uuid,
    req: &BookingRequest,
    today: NaiveDate,
) -> Result<Appointment, AppointmentError> {
    let date = req.date.unwrap_or(today);
    if db::get_doctor(conn, &req.doctor_id)?.is_none() {
        return Err(AppointmentError::NotFound("Doctor"));
    }

    let now = Utc::now();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: *patient_id,
        doctor_id: req.doctor_id,
        date,
        status: AppointmentStatus::Scheduled,
        prescription_id: None,
        feedback_id: None,
        created_at: now,
        updated_at: now,
    };

    match db::insert_appointment(conn, &appointment) {
        Ok(()) => {
            tracing::info!(
                appointment_id = %appointment.id,
                patient_id = %patient_id,
                doctor_id = %req.doctor_id,
                %date,
                "Appointment booked"
            );
            Ok(appointment)
        }
        Err(e) if e.is_unique_violation() => {
            tracing::info!(patient_id = %patient_id, doctor_id = %req.doctor_id, %date, "Duplicate booking refused");
            Err(AppointmentError::DuplicateAppointment)
        }
        Err(e) => Err(e.into()),
    }
}

/// Load an appointment the caller takes part in.
pub fn get_for_participant(
    conn: &Connection,
    principal: &Principal,
    appointment_id: &Uuid,
) -> Result<(Appointment, AppointmentRole), AppointmentError> {
    let appointment =
        db::get_appointment(conn, appointment_id)?.ok_or(AppointmentError::NotFound("Appointment"))?;
    let role = require_participant(principal, &appointment)?;
    Ok((appointment, role))
}

/// Scheduled → Completed. Only the assigned doctor may confirm.
pub fn confirm(
    conn: &Connection,
    principal: &Principal,
    appointment_id: &Uuid,
) -> Result<Appointment, AppointmentError> {
    let (appointment, role) = get_for_participant(conn, principal, appointment_id)?;
    if role != AppointmentRole::AssignedDoctor {
        return Err(AuthorizationError::NotParticipant.into());
    }
    transition(conn, appointment, AppointmentStatus::Completed)
}

/// Scheduled → Cancelled. The patient or the doctor may cancel.
pub fn cancel(
    conn: &Connection,
    principal: &Principal,
    appointment_id: &Uuid,
) -> Result<Appointment, AppointmentError> {
    let (appointment, _) = get_for_participant(conn, principal, appointment_id)?;
    transition(conn, appointment, AppointmentStatus::Cancelled)
}

fn transition(
    conn: &Connection,
    appointment: Appointment,
    to: AppointmentStatus,
) -> Result<Appointment, AppointmentError> {
    if appointment.status.is_terminal() {
        return Err(AppointmentError::InvalidTransition {
            from: appointment.status,
        });
    }

    let moved = db::transition_appointment(
        conn,
        &appointment.id,
        AppointmentStatus::Scheduled,
        to,
        Utc::now(),
    )?;
    let current =
        db::get_appointment(conn, &appointment.id)?.ok_or(AppointmentError::NotFound("Appointment"))?;
    if !moved {
        // Lost a race with another transition.
        return Err(AppointmentError::InvalidTransition {
            from: current.status,
        });
    }

    tracing::info!(appointment_id = %current.id, to = %to, "Appointment status changed");
    Ok(current)
}

pub fn list_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<AppointmentSummary>, AppointmentError> {
    Ok(db::list_patient_appointments(conn, patient_id)?)
}

pub fn list_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
    filter: StatusFilter,
) -> Result<Vec<AppointmentSummary>, AppointmentError> {
    Ok(db::list_doctor_appointments(conn, doctor_id, filter.as_status())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Doctor, Patient};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn setup(conn: &Connection) -> (Patient, Doctor) {
        (
            fixtures::patient(conn, "p1@example.com"),
            fixtures::doctor(conn, "d1@example.com"),
        )
    }

    fn request(doctor: &Doctor, date: NaiveDate) -> BookingRequest {
        BookingRequest {
            doctor_id: doctor.id,
            date: Some(date),
        }
    }

    #[test]
    fn duplicate_booking_is_refused_until_first_is_terminal() {
        let conn = open_memory_database().unwrap();
        let (p, d) = setup(&conn);
        let first = book(&conn, &p.id, &request(&d, day(15)), day(1)).unwrap();
        assert_eq!(first.status, AppointmentStatus::Scheduled);

        assert!(matches!(
            book(&conn, &p.id, &request(&d, day(15)), day(1)),
            Err(AppointmentError::DuplicateAppointment)
        ));

        cancel(&conn, &Principal::Patient(p.clone()), &first.id).unwrap();
        assert!(book(&conn, &p.id, &request(&d, day(15)), day(1)).is_ok());
    }

    #[test]
    fn booking_defaults_to_today_and_accepts_any_date() {
        let conn = open_memory_database().unwrap();
        let (p, d) = setup(&conn);
        let appt = book(
            &conn,
            &p.id,
            &BookingRequest {
                doctor_id: d.id,
                date: None,
            },
            day(10),
        )
        .unwrap();
        assert_eq!(appt.date, day(10));

        let earlier = book(&conn, &p.id, &request(&d, day(9)), day(10)).unwrap();
        assert_eq!(earlier.date, day(9));
    }

    #[test]
    fn unknown_doctor_is_not_found() {
        let conn = open_memory_database().unwrap();
        let (p, _) = setup(&conn);
        let req = BookingRequest {
            doctor_id: Uuid::new_v4(),
            date: Some(day(15)),
        };
        assert!(matches!(
            book(&conn, &p.id, &req, day(1)),
            Err(AppointmentError::NotFound("Doctor"))
        ));
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        let conn = open_memory_database().unwrap();
        let (p, d) = setup(&conn);
        let appt = book(&conn, &p.id, &request(&d, day(15)), day(1)).unwrap();
        let doctor = Principal::Doctor(d);

        let done = confirm(&conn, &doctor, &appt.id).unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);

        assert!(matches!(
            cancel(&conn, &doctor, &appt.id),
            Err(AppointmentError::InvalidTransition {
                from: AppointmentStatus::Completed
            })
        ));
        assert!(matches!(
            confirm(&conn, &doctor, &appt.id),
            Err(AppointmentError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn only_assigned_doctor_confirms() {
        let conn = open_memory_database().unwrap();
        let (p, d) = setup(&conn);
        let other = fixtures::doctor(&conn, "d2@example.com");
        let appt = book(&conn, &p.id, &request(&d, day(15)), day(1)).unwrap();

        assert!(matches!(
            confirm(&conn, &Principal::Doctor(other), &appt.id),
            Err(AppointmentError::Forbidden(_))
        ));
        assert!(matches!(
            confirm(&conn, &Principal::Patient(p), &appt.id),
            Err(AppointmentError::Forbidden(_))
        ));
    }

    #[test]
    fn strangers_cannot_cancel() {
        let conn = open_memory_database().unwrap();
        let (p, d) = setup(&conn);
        let stranger = fixtures::patient(&conn, "p2@example.com");
        let appt = book(&conn, &p.id, &request(&d, day(15)), day(1)).unwrap();

        assert!(matches!(
            cancel(&conn, &Principal::Patient(stranger), &appt.id),
            Err(AppointmentError::Forbidden(_))
        ));
        assert!(matches!(
            cancel(&conn, &Principal::Doctor(d), &Uuid::new_v4()),
            Err(AppointmentError::NotFound("Appointment"))
        ));
    }

    #[test]
    fn doctor_listing_defaults_to_scheduled() {
        let conn = open_memory_database().unwrap();
        let (p, d) = setup(&conn);
        let a = book(&conn, &p.id, &request(&d, day(15)), day(1)).unwrap();
        book(&conn, &p.id, &request(&d, day(16)), day(1)).unwrap();
        cancel(&conn, &Principal::Patient(p.clone()), &a.id).unwrap();

        let scheduled = list_for_doctor(&conn, &d.id, StatusFilter::default()).unwrap();
        assert_eq!(scheduled.len(), 1);
        let all = list_for_doctor(&conn, &d.id, StatusFilter::All).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(list_for_patient(&conn, &p.id).unwrap().len(), 2);
    }

    #[test]
    fn status_filter_parsing() {
        assert_eq!(StatusFilter::parse(None).unwrap(), StatusFilter::default());
        assert_eq!(StatusFilter::parse(Some("ALL")).unwrap(), StatusFilter::All);
        assert_eq!(
            StatusFilter::parse(Some("Completed")).unwrap(),
            StatusFilter::Only(AppointmentStatus::Completed)
        );
        assert!(StatusFilter::parse(Some("pending")).is_err());
    }
}
