use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ReminderType, RepeatRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub medication: String,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
    /// 24h `HH:MM`.
    pub time: String,
    pub date: NaiveDate,
    pub repeat: RepeatRule,
    pub status: bool,
    pub created_at: DateTime<Utc>,
}
