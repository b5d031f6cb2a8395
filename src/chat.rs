//! Patient chatbot: one conversation per patient, replies from the
//! configured completion service.
//!
//! A turn is all-or-nothing. The user message and the reply are stored in one
//! transaction after the completion succeeds; a failed completion stores nothing.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::completion_service::{CompletionError, TextCompletionService};
use crate::db::{self, DatabaseError};
use crate::models::enums::ChatSender;
use crate::models::ChatMessage;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const FALLBACK_REPLY: &str = "I'm not sure. Please consult a doctor.";

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("Chat assistant unavailable: {0}")]
    Upstream(#[from] CompletionError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of one exchange.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user: ChatMessage,
    pub reply: ChatMessage,
}

fn validate_text(raw: Option<&str>) -> Result<String, ChatError> {
    let text = raw.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(ChatError::Validation("Message cannot be empty".into()));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::Validation(format!(
            "Message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(text.to_string())
}

fn message(sender: ChatSender, text: String) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4(),
        sender,
        message: text,
        timestamp: Utc::now(),
    }
}

/// Run one exchange. Blocks on the completion service, so callers on the
/// async runtime go through `spawn_blocking`.
pub fn send_message(
    conn: &mut Connection,
    completion: &dyn TextCompletionService,
    patient_id: &Uuid,
    req: &ChatRequest,
) -> Result<ChatTurn, ChatError> {
    let text = validate_text(req.message.as_deref())?;

    let mut history = db::get_chat_messages(conn, patient_id)?;
    let user = message(ChatSender::User, text);
    history.push(user.clone());

    let reply_text = match completion.respond(&history) {
        Ok(reply) if reply.trim().is_empty() => FALLBACK_REPLY.to_string(),
        Ok(reply) => reply.trim().to_string(),
        Err(e) => {
            tracing::warn!(patient_id = %patient_id, error = %e, "Completion service failed");
            return Err(e.into());
        }
    };
    let reply = message(ChatSender::Bot, reply_text);

    db::append_chat_messages(conn, patient_id, &[user.clone(), reply.clone()])?;
    tracing::debug!(patient_id = %patient_id, history_len = history.len(), "Chat turn stored");
    Ok(ChatTurn { user, reply })
}

pub fn history(conn: &Connection, patient_id: &Uuid) -> Result<Vec<ChatMessage>, ChatError> {
    Ok(db::get_chat_messages(conn, patient_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion_service::MockCompletionService;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn ask(text: &str) -> ChatRequest {
        ChatRequest {
            message: Some(text.into()),
        }
    }

    #[test]
    fn turn_stores_both_messages() {
        let mut conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let bot = MockCompletionService::replying("Drink water.");

        let turn = send_message(&mut conn, &bot, &p.id, &ask(" I have a headache ")).unwrap();
        assert_eq!(turn.user.message, "I have a headache");
        assert_eq!(turn.reply.message, "Drink water.");

        let stored = history(&conn, &p.id).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].sender, ChatSender::User);
        assert_eq!(stored[1].sender, ChatSender::Bot);
    }

    #[test]
    fn failed_completion_stores_nothing() {
        let mut conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let bot = MockCompletionService::failing();

        assert!(matches!(
            send_message(&mut conn, &bot, &p.id, &ask("hello")),
            Err(ChatError::Upstream(_))
        ));
        assert_eq!(bot.calls(), 1);
        assert!(history(&conn, &p.id).unwrap().is_empty());
    }

    #[test]
    fn empty_reply_uses_fallback() {
        let mut conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let bot = MockCompletionService::replying("  ");

        let turn = send_message(&mut conn, &bot, &p.id, &ask("hello")).unwrap();
        assert_eq!(turn.reply.message, FALLBACK_REPLY);
    }

    #[test]
    fn invalid_text_never_reaches_the_service() {
        let mut conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let bot = MockCompletionService::replying("ok");

        let too_long = "a".repeat(MAX_MESSAGE_CHARS + 1);
        for req in [ChatRequest::default(), ask("   "), ask(&too_long)] {
            assert!(matches!(
                send_message(&mut conn, &bot, &p.id, &req),
                Err(ChatError::Validation(_))
            ));
        }
        assert_eq!(bot.calls(), 0);
    }

    #[test]
    fn history_accumulates_in_order() {
        let mut conn = open_memory_database().unwrap();
        let p = fixtures::patient(&conn, "p@example.com");
        let bot = MockCompletionService::replying("noted");

        send_message(&mut conn, &bot, &p.id, &ask("first")).unwrap();
        send_message(&mut conn, &bot, &p.id, &ask("second")).unwrap();
        let stored = history(&conn, &p.id).unwrap();
        let texts: Vec<&str> = stored.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, ["first", "noted", "second", "noted"]);
    }
}
