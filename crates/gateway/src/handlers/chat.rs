//! Chat handlers
//!
//! `/api/chat` accepts either a multipart upload (`image` or `file`, with an
//! optional `question`) or a JSON question. Every answered question is
//! appended to the caller's conversation.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use docchat_common::{
    context::{select_excerpt_with, PromptKind, PromptSource},
    conversation::ConversationEntry,
    documents::{self, TempUpload},
    errors::{AppError, Result},
    metrics,
};

/// Question asked about an image when the form carries none
pub const DEFAULT_IMAGE_QUESTION: &str = "What is in this image?";

/// JSON chat request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(max = 20000))]
    pub question: Option<String>,

    /// Ground the answer in the predefined context file
    #[serde(default)]
    pub use_context: bool,

    /// Session id returned by a previous document upload
    #[validate(length(max = 256))]
    pub session_id: Option<String>,

    #[validate(length(max = 256))]
    pub conversation_id: Option<String>,
}

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub answer: String,

    /// `text`, `document`, `image` or `context`
    #[serde(rename = "type")]
    pub kind: &'static str,

    pub conversation_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Which prompt source grounded the answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<PromptKind>,
}

/// A file part of a multipart form
struct UploadedFile {
    filename: String,
    bytes: Bytes,
}

#[derive(Default)]
struct UploadForm {
    image: Option<UploadedFile>,
    file: Option<UploadedFile>,
    question: Option<String>,
    conversation_id: Option<String>,
}

/// Universal chat endpoint
pub async fn chat(State(state): State<AppState>, request: Request) -> Result<Json<ChatResponse>> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &state).await?;
        chat_upload(state, multipart).await
    } else {
        let Json(body) = Json::<ChatRequest>::from_request(request, &state).await?;
        chat_text(state, body).await
    }
}

async fn chat_text(state: AppState, request: ChatRequest) -> Result<Json<ChatResponse>> {
    let question = require_question(request.question.as_deref())?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let conversation_id = state.conversation_id(request.conversation_id.as_deref());

    let document = match request.session_id.as_deref() {
        Some(id) if !id.is_empty() => state.stores.documents.get(id).await,
        _ => None,
    };
    let predefined = if request.use_context {
        state.stores.context.text()
    } else {
        None
    };

    metrics::record_chat("text");

    let (answer, kind) =
        answer_question(&state, question, document.as_deref(), predefined, &conversation_id).await;

    Ok(Json(ChatResponse {
        success: true,
        answer,
        kind: "text",
        conversation_id,
        session_id: request.session_id.filter(|_| kind == PromptKind::Document),
        context: Some(kind),
    }))
}

async fn chat_upload(state: AppState, multipart: Multipart) -> Result<Json<ChatResponse>> {
    let form = read_form(multipart).await?;
    let conversation_id = state.conversation_id(form.conversation_id.as_deref());

    if let Some(image) = form.image {
        return chat_image(&state, image, form.question, conversation_id).await;
    }
    if let Some(file) = form.file {
        return chat_document(&state, file, form.question, conversation_id).await;
    }

    Err(AppError::MissingField {
        field: "file or image".to_string(),
    })
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                let upload = Some(UploadedFile { filename, bytes });
                if name == "image" {
                    form.image = upload;
                } else {
                    form.file = upload;
                }
            }
            "question" => form.question = Some(field.text().await?),
            "conversation_id" => form.conversation_id = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(form)
}

async fn chat_image(
    state: &AppState,
    image: UploadedFile,
    question: Option<String>,
    conversation_id: String,
) -> Result<Json<ChatResponse>> {
    let uploads = &state.config.uploads;
    check_extension("image", &image.filename, &uploads.image_extensions)?;
    metrics::record_chat("image");

    let question = question
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_IMAGE_QUESTION.to_string());

    let upload = TempUpload::write(&uploads.upload_dir, &image.filename, &image.bytes).await?;
    let answer = describe_image(state, upload.path(), &image.filename, &question).await;
    drop(upload);

    if let Some(answer) = &answer {
        record_turn(state, &conversation_id, &question, answer).await;
    }
    let answer = answer.unwrap_or_else(|| unreadable_image_answer(&image.filename));

    Ok(Json(ChatResponse {
        success: true,
        answer,
        kind: "image",
        conversation_id,
        session_id: None,
        context: None,
    }))
}

/// Ask the vision model about the image at `path`
///
/// `None` when the image cannot be read back; nothing is sent upstream then.
pub(crate) async fn describe_image(
    state: &AppState,
    path: &std::path::Path,
    filename: &str,
    question: &str,
) -> Option<String> {
    let Some(encoded) = documents::encode_image(path).await else {
        tracing::warn!(filename = %filename, "Image unreadable, skipping inference");
        return None;
    };
    Some(state.inference.generate_from_image(&encoded, question).await)
}

pub(crate) fn unreadable_image_answer(filename: &str) -> String {
    format!("Error: could not read uploaded image '{}'", filename)
}

async fn chat_document(
    state: &AppState,
    file: UploadedFile,
    question: Option<String>,
    conversation_id: String,
) -> Result<Json<ChatResponse>> {
    let uploads = &state.config.uploads;
    check_extension("document", &file.filename, &uploads.document_extensions)?;
    metrics::record_chat("document");

    let filename = documents::secure_filename(&file.filename);
    let session_id = documents::session_id_for(&file.filename);
    let extension = documents::extension(&filename).unwrap_or_default();

    let upload = TempUpload::write(&uploads.upload_dir, &filename, &file.bytes).await?;
    let path = upload.path().to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || documents::extract_text(&path, &extension))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Extraction task failed: {}", e),
        })?;
    drop(upload);

    // A failed extraction still binds the session, with empty content
    let text = extracted.unwrap_or_default();
    tracing::info!(
        session_id = %session_id,
        characters = text.chars().count(),
        "Document stored"
    );
    state.stores.documents.put(&session_id, text.clone()).await;

    let (answer, context) = match question.filter(|q| !q.is_empty()) {
        Some(question) => {
            let (answer, kind) =
                answer_question(state, &question, Some(&text), None, &conversation_id).await;
            (answer, Some(kind))
        }
        None => (
            format!(
                "File '{}' uploaded successfully. You can now ask questions about it.",
                filename
            ),
            None,
        ),
    };

    Ok(Json(ChatResponse {
        success: true,
        answer,
        kind: "document",
        conversation_id,
        session_id: Some(session_id),
        context,
    }))
}

/// Reject missing or empty questions
pub(crate) fn require_question(question: Option<&str>) -> Result<&str> {
    match question {
        Some(q) if !q.is_empty() => Ok(q),
        _ => Err(AppError::Validation {
            message: "No question provided".to_string(),
            field: Some("question".to_string()),
        }),
    }
}

fn check_extension(kind: &str, filename: &str, allowed: &[String]) -> Result<()> {
    let accepted = documents::allowed_file(filename, allowed);
    metrics::record_upload(kind, accepted);

    if accepted {
        tracing::info!(kind = %kind, filename = %filename, "Upload accepted");
        Ok(())
    } else {
        Err(AppError::UnsupportedFileType {
            filename: filename.to_string(),
            allowed: allowed.join(", "),
        })
    }
}

/// Compose a prompt from the best available source, ask the model and
/// record the turn
pub(crate) async fn answer_question(
    state: &AppState,
    question: &str,
    document: Option<&str>,
    predefined: Option<&str>,
    conversation_id: &str,
) -> (String, PromptKind) {
    let options = state.config.context.excerpt_options();
    let history = state
        .stores
        .conversations
        .render(conversation_id, state.config.conversation.history_turns)
        .await;

    let excerpt = |content: &str| {
        let excerpt = select_excerpt_with(content, question, &options);
        metrics::record_excerpt(excerpt.text.chars().count());
        excerpt.text
    };
    let document_excerpt = document.map(excerpt);
    let predefined_excerpt = match document_excerpt {
        Some(_) => None,
        None => predefined.map(excerpt),
    };

    let source = PromptSource::choose(document_excerpt, predefined_excerpt, &history);
    let kind = source.kind();
    let prompt = source.render(question, &history);

    tracing::debug!(
        conversation_id = %conversation_id,
        prompt_kind = kind.as_str(),
        prompt_chars = prompt.chars().count(),
        "Prompt composed"
    );

    let model = state.inference.text_model().to_string();
    let answer = state.inference.generate_text(&prompt, &model).await;

    record_turn(state, conversation_id, question, &answer).await;

    (answer, kind)
}

async fn record_turn(state: &AppState, conversation_id: &str, question: &str, answer: &str) {
    let conversations = &state.stores.conversations;
    conversations
        .append(conversation_id, ConversationEntry::now(question, answer))
        .await;
    metrics::set_active_conversations(conversations.len().await);
}
