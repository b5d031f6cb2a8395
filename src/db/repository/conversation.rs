use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{uuid_column, DatabaseError};
use crate::models::*;

/// A patient's chatbot conversation, oldest message first.
pub fn get_chat_messages(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ChatMessage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, sender, message, timestamp FROM chat_messages
         WHERE patient_id = ?1 ORDER BY seq",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(ChatMessage {
            id: uuid_column(row, 0)?,
            sender: row.get(1)?,
            message: row.get(2)?,
            timestamp: row.get(3)?,
        })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Append messages to the end of a patient's conversation, atomically.
pub fn append_chat_messages(
    conn: &mut Connection,
    patient_id: &Uuid,
    messages: &[ChatMessage],
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    {
        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM chat_messages WHERE patient_id = ?1",
            params![patient_id.to_string()],
            |row| row.get(0),
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO chat_messages (id, patient_id, sender, message, timestamp, seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (offset, msg) in messages.iter().enumerate() {
            stmt.execute(params![
                msg.id.to_string(),
                patient_id.to_string(),
                msg.sender,
                msg.message,
                msg.timestamp,
                next_seq + offset as i64,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::ChatSender;

    fn message(sender: ChatSender, text: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            sender,
            message: text.into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn appended_pairs_keep_conversation_order() {
        let mut conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");

        append_chat_messages(
            &mut conn,
            &p.id,
            &[message(ChatSender::User, "hi"), message(ChatSender::Bot, "hello")],
        )
        .unwrap();
        append_chat_messages(
            &mut conn,
            &p.id,
            &[message(ChatSender::User, "again"), message(ChatSender::Bot, "sure")],
        )
        .unwrap();

        let texts: Vec<String> = get_chat_messages(&conn, &p.id)
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(texts, vec!["hi", "hello", "again", "sure"]);
    }

    #[test]
    fn conversations_are_per_patient() {
        let mut conn = open_memory_database().unwrap();
        let a = fixtures::patient(&conn, "a@example.com");
        let b = fixtures::patient(&conn, "b@example.com");
        append_chat_messages(&mut conn, &a.id, &[message(ChatSender::User, "hi")]).unwrap();
        assert!(get_chat_messages(&conn, &b.id).unwrap().is_empty());
    }
}
