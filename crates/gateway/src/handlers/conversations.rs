//! Conversation management handlers

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use docchat_common::{
    conversation::ConversationEntry,
    errors::{AppError, Result},
    metrics,
};

/// Clear conversation request; the body may be omitted entirely
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ClearConversationRequest {
    #[validate(length(max = 256))]
    pub conversation_id: Option<String>,
}

#[derive(Serialize)]
pub struct ClearConversationResponse {
    pub success: bool,
    pub conversation_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[validate(length(max = 256))]
    pub conversation_id: Option<String>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub conversation_id: String,
    pub count: usize,
    pub history: Vec<ConversationEntry>,
}

/// Drop a conversation's log
pub async fn clear_conversation(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ClearConversationRequest>, JsonRejection>,
) -> Result<Json<ClearConversationResponse>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ClearConversationRequest::default(),
        Err(e) => return Err(e.into()),
    };

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("conversation_id".to_string()),
    })?;

    let conversation_id = state.conversation_id(request.conversation_id.as_deref());
    let conversations = &state.stores.conversations;
    conversations.clear(&conversation_id).await;
    metrics::set_active_conversations(conversations.len().await);

    Ok(Json(ClearConversationResponse {
        success: true,
        message: format!("Conversation '{}' cleared", conversation_id),
        conversation_id,
    }))
}

/// Full log of a conversation, oldest first
pub async fn conversation_history(
    State(state): State<AppState>,
    query: std::result::Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>> {
    let Query(query) = query?;

    query.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("conversation_id".to_string()),
    })?;

    let conversation_id = state.conversation_id(query.conversation_id.as_deref());
    let history = state.stores.conversations.get(&conversation_id).await;

    Ok(Json(HistoryResponse {
        success: true,
        conversation_id,
        count: history.len(),
        history,
    }))
}
