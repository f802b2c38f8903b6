//! Predefined context handlers

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::chat::{answer_question, require_question, ChatResponse};
use crate::AppState;
use docchat_common::{
    errors::{AppError, Result},
    metrics,
};

/// Context file status
#[derive(Serialize)]
pub struct ContextStatusResponse {
    pub loaded: bool,
    pub file_path: String,

    /// Character count of the loaded text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characters: Option<usize>,
}

/// Question answered strictly from the predefined context
#[derive(Debug, Deserialize, Validate)]
pub struct ContextQaRequest {
    #[validate(length(max = 20000))]
    pub question: Option<String>,

    #[validate(length(max = 256))]
    pub conversation_id: Option<String>,
}

/// Report whether the context file was loaded at startup
pub async fn context_status(State(state): State<AppState>) -> Json<ContextStatusResponse> {
    let context = &state.stores.context;

    Json(ContextStatusResponse {
        loaded: context.is_loaded(),
        file_path: context.path().display().to_string(),
        characters: context.char_count(),
    })
}

/// Answer a question from the predefined context only
pub async fn context_qa(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ContextQaRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let Json(request) = payload?;
    let question = require_question(request.question.as_deref())?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let context = state.stores.context.clone();
    let text = context.text().ok_or_else(|| AppError::ContextUnavailable {
        path: context.path().display().to_string(),
    })?;

    let conversation_id = state.conversation_id(request.conversation_id.as_deref());
    metrics::record_chat("context");

    let (answer, kind) = answer_question(&state, question, None, Some(text), &conversation_id).await;

    Ok(Json(ChatResponse {
        success: true,
        answer,
        kind: "context",
        conversation_id,
        session_id: None,
        context: Some(kind),
    }))
}
