use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Gender, PrincipalKind};

/// A patient account. The password hash never leaves the repository layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalAffiliation {
    pub name: String,
    pub address: String,
    pub specialty: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub specializations: Vec<String>,
    pub hospitals: Vec<HospitalAffiliation>,
    pub experience_years: Option<u32>,
    pub rating: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An authenticated actor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "account")]
pub enum Principal {
    Patient(Patient),
    Doctor(Doctor),
}

impl Principal {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::Patient(_) => PrincipalKind::Patient,
            Principal::Doctor(_) => PrincipalKind::Doctor,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Principal::Patient(p) => p.id,
            Principal::Doctor(d) => d.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Principal::Patient(p) => &p.name,
            Principal::Doctor(d) => &d.name,
        }
    }
}
