//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table family; every public function is re-exported here.

mod appointment;
mod audit;
mod conversation;
mod doctor;
mod feedback;
mod insight;
mod medical_history;
mod patient;
mod portfolio;
mod prescription;
mod reminder;
mod session;

pub use appointment::*;
pub use audit::*;
pub use conversation::*;
pub use doctor::*;
pub use feedback::*;
pub use insight::*;
pub use medical_history::*;
pub use patient::*;
pub use portfolio::*;
pub use prescription::*;
pub use reminder::*;
pub use session::*;

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared row builders for repository and domain tests.

    use chrono::Utc;
    use rusqlite::Connection;
    use uuid::Uuid;

    use crate::models::*;

    pub fn patient(conn: &Connection, email: &str) -> Patient {
        let patient = Patient {
            id: Uuid::new_v4(),
            name: "Test Patient".into(),
            email: email.into(),
            phone: None,
            gender: None,
            created_at: Utc::now(),
        };
        super::insert_patient(conn, &patient, "hash").unwrap();
        patient
    }

    pub fn doctor(conn: &Connection, email: &str) -> Doctor {
        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Test".into(),
            email: email.into(),
            phone: None,
            address: None,
            specializations: vec!["Cardiology".into()],
            hospitals: vec![],
            experience_years: Some(10),
            rating: None,
            created_at: now,
            updated_at: now,
        };
        super::insert_doctor(conn, &doctor, "hash").unwrap();
        doctor
    }
}
