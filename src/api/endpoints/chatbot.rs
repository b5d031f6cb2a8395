//! Chatbot endpoints: `chatbot/message`, `chatbot/history`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use super::{blocking, body};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiMessage, PatientContext};
use crate::chat::{self, ChatRequest};
use crate::models::ChatMessage;

#[derive(Serialize)]
pub struct ReplyPayload {
    pub reply: String,
    pub user_message: ChatMessage,
    pub bot_message: ChatMessage,
}

#[derive(Serialize)]
pub struct HistoryPayload {
    pub history: Vec<ChatMessage>,
}

/// Completion may take seconds, so the whole turn runs on the blocking pool.
pub async fn message(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ApiMessage<ReplyPayload>>, ApiError> {
    let req = body(payload)?;
    let turn = blocking(&ctx, move |conn, core| {
        let completion = core.completion();
        Ok(chat::send_message(conn, completion.as_ref(), &user.id, &req)?)
    })
    .await?;
    Ok(Json(ApiMessage::new(
        "Message sent successfully",
        ReplyPayload {
            reply: turn.reply.message.clone(),
            user_message: turn.user,
            bot_message: turn.reply,
        },
    )))
}

pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(PatientContext(user)): Extension<PatientContext>,
) -> Result<Json<ApiMessage<HistoryPayload>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let history = chat::history(&conn, &user.id)?;
    Ok(Json(ApiMessage::new("Chat history fetched successfully", HistoryPayload { history })))
}
