//! Text-completion capability behind the chatbot.
//!
//! Handlers never build an HTTP client themselves: `CoreState` owns one
//! `TextCompletionService` chosen at startup, and tests swap in a mock.
//! Implementations are blocking; callers run them on the blocking pool.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::CompletionConfig;
use crate::models::enums::ChatSender;
use crate::models::ChatMessage;

pub const SYSTEM_PROMPT: &str = "You are Medinest's medical assistant. If unsure, advise the \
user to consult a doctor. Avoid discussing complex diseases without proper context. Keep \
responses direct and professional.";

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Cannot connect to completion service at {0}")]
    Connection(String),

    #[error("Completion service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unreadable completion response: {0}")]
    ResponseParsing(String),
}

/// Produces the assistant's next reply from a conversation, oldest first.
/// The last entry is the message being answered.
pub trait TextCompletionService {
    fn respond(&self, history: &[ChatMessage]) -> Result<String, CompletionError>;
}

// ═══════════════════════════════════════════════════════════
// Ollama-compatible HTTP backend
// ═══════════════════════════════════════════════════════════

pub struct OllamaCompletionService {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaCompletionService {
    /// Build the client up front. Must not be called from inside an async
    /// context: the blocking client owns its own runtime.
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
            timeout_secs: config.timeout.as_secs(),
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<RoleMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct RoleMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

fn role_messages(history: &[ChatMessage]) -> Vec<RoleMessage<'_>> {
    std::iter::once(RoleMessage {
        role: "system",
        content: SYSTEM_PROMPT,
    })
    .chain(history.iter().map(|m| RoleMessage {
        role: match m.sender {
            ChatSender::User => "user",
            ChatSender::Bot => "assistant",
        },
        content: &m.message,
    }))
    .collect()
}

impl TextCompletionService for OllamaCompletionService {
    fn respond(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: role_messages(history),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    CompletionError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    CompletionError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    CompletionError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| CompletionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.message.content)
    }
}

// ═══════════════════════════════════════════════════════════
// Keyword responder (no backend configured)
// ═══════════════════════════════════════════════════════════

/// Offline fallback that answers from a few keyword rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedResponder;

const RULES: &[(&[&str], &str)] = &[
    (
        &["emergency", "chest pain", "can't breathe", "cannot breathe", "bleeding", "unconscious"],
        "This sounds urgent. Please call your local emergency number or go to the nearest emergency department now.",
    ),
    (
        &["appointment", "book", "schedule", "reschedule"],
        "You can book or cancel appointments from the Appointments section. Pick a doctor and a date; you can hold one appointment per doctor per day.",
    ),
    (
        &["reminder", "alarm", "remind"],
        "Set up medication or appointment reminders from the Reminders section. You can pause a reminder at any time without deleting it.",
    ),
    (
        &["prescription", "medicine", "medication", "dose", "dosage"],
        "Your prescriptions are listed under each completed appointment. Follow the dosage your doctor wrote and ask them before changing it.",
    ),
];

const DEFAULT_RULE_REPLY: &str =
    "I can help with appointments, reminders and prescriptions. For anything about your health, please consult a doctor.";

impl TextCompletionService for RuleBasedResponder {
    fn respond(&self, history: &[ChatMessage]) -> Result<String, CompletionError> {
        let last = history
            .iter()
            .rev()
            .find(|m| m.sender == ChatSender::User)
            .map(|m| m.message.to_lowercase())
            .unwrap_or_default();

        let reply = RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| last.contains(k)))
            .map(|(_, reply)| *reply)
            .unwrap_or(DEFAULT_RULE_REPLY);
        Ok(reply.to_string())
    }
}

// ═══════════════════════════════════════════════════════════
// Test double
// ═══════════════════════════════════════════════════════════

/// Mock completion service for testing: returns a fixed reply or fails.
#[cfg(test)]
pub struct MockCompletionService {
    reply: Option<String>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockCompletionService {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl TextCompletionService for MockCompletionService {
    fn respond(&self, _history: &[ChatMessage]) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| CompletionError::Connection("mock".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(text: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            sender: ChatSender::User,
            message: text.into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn rules_match_case_insensitively() {
        let reply = RuleBasedResponder
            .respond(&[user("How do I BOOK a visit?")])
            .unwrap();
        assert!(reply.contains("Appointments"));
    }

    #[test]
    fn emergencies_take_priority() {
        let reply = RuleBasedResponder
            .respond(&[user("chest pain, need an appointment")])
            .unwrap();
        assert!(reply.contains("emergency"));
    }

    #[test]
    fn unknown_topics_advise_a_doctor() {
        let reply = RuleBasedResponder.respond(&[user("hello there")]).unwrap();
        assert_eq!(reply, DEFAULT_RULE_REPLY);
    }

    #[test]
    fn role_mapping_starts_with_system_prompt() {
        let mut bot = user("earlier answer");
        bot.sender = ChatSender::Bot;
        let history = vec![user("hi"), bot, user("again")];
        let roles: Vec<&str> = role_messages(&history).iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[test]
    fn unreachable_backend_reports_connection_error() {
        let service = OllamaCompletionService::new(&CompletionConfig {
            url: "http://127.0.0.1:1".into(),
            model: "test".into(),
            timeout: std::time::Duration::from_secs(2),
        })
        .unwrap();
        let err = service.respond(&[user("hi")]).unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Connection(_) | CompletionError::HttpClient(_)
        ));
    }

    #[test]
    fn mock_counts_calls() {
        let mock = MockCompletionService::replying("ok");
        assert_eq!(mock.respond(&[user("hi")]).unwrap(), "ok");
        assert!(MockCompletionService::failing().respond(&[]).is_err());
        assert_eq!(mock.calls(), 1);
    }
}
