//! Role checks for authenticated principals.
//!
//! Two pure rules, no state:
//! 1. Route kind: the principal must be of the kind the route serves.
//! 2. Appointment relation: the caller must be the appointment's patient
//!    or its doctor before touching it or its prescription.

use thiserror::Error;

use crate::models::enums::PrincipalKind;
use crate::models::{Appointment, Principal};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("This resource is only available to {required} accounts")]
    WrongKind { required: PrincipalKind },

    #[error("You are not a participant of this appointment")]
    NotParticipant,
}

/// How the caller relates to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentRole {
    OwningPatient,
    AssignedDoctor,
    Unrelated,
}

impl AppointmentRole {
    pub fn is_participant(self) -> bool {
        !matches!(self, Self::Unrelated)
    }
}

/// Allow only principals of `required` kind.
pub fn authorize(principal: &Principal, required: PrincipalKind) -> Result<(), AuthorizationError> {
    if principal.kind() == required {
        Ok(())
    } else {
        Err(AuthorizationError::WrongKind { required })
    }
}

pub fn appointment_role(principal: &Principal, appointment: &Appointment) -> AppointmentRole {
    match principal {
        Principal::Patient(p) if p.id == appointment.patient_id => AppointmentRole::OwningPatient,
        Principal::Doctor(d) if d.id == appointment.doctor_id => AppointmentRole::AssignedDoctor,
        _ => AppointmentRole::Unrelated,
    }
}

/// Allow the appointment's patient or doctor; returns which one.
pub fn require_participant(
    principal: &Principal,
    appointment: &Appointment,
) -> Result<AppointmentRole, AuthorizationError> {
    let role = appointment_role(principal, appointment);
    if role.is_participant() {
        Ok(role)
    } else {
        Err(AuthorizationError::NotParticipant)
    }
}
