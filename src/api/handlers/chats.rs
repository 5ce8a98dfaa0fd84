use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Chat, ChatSummary, Message, MessagePage},
    services::{auth::Claims, chat::ChatService, registry::ChatRegistry},
    AppState,
};

use super::super::middleware::get_user_id;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<ChatSummary>>> {
    let user_id = get_user_id(&claims)?;

    let chat_service = ChatService::new(state.db, state.config.chat.clone());
    let chats = chat_service.list_chats_for_user(user_id).await?;

    Ok(Json(chats))
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub meetup_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub participant_ids: Vec<Uuid>,
}

pub async fn create_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChatRequest>,
) -> AppResult<Json<Chat>> {
    get_user_id(&claims)?;

    let registry = ChatRegistry::new(state.db);
    let chat = registry
        .create_chat(req.meetup_id, &req.name, req.description, req.participant_ids)
        .await?;

    Ok(Json(chat))
}

#[derive(Debug, Serialize)]
pub struct ChatIdResponse {
    pub chat_id: Uuid,
}

pub async fn get_chat_for_meetup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(meetup_id): Path<Uuid>,
) -> AppResult<Json<ChatIdResponse>> {
    get_user_id(&claims)?;

    let registry = ChatRegistry::new(state.db);
    let chat = registry.chat_for_meetup(meetup_id).await?;

    Ok(Json(ChatIdResponse { chat_id: chat.id }))
}

pub async fn delete_chat_for_meetup(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(meetup_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    get_user_id(&claims)?;

    let registry = ChatRegistry::new(state.db);
    registry.remove_chat_for_meetup(meetup_id).await?;

    Ok(Json(MessageResponse {
        message: "Chat deleted".to_string(),
    }))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
) -> AppResult<Json<Chat>> {
    let user_id = get_user_id(&claims)?;

    let registry = ChatRegistry::new(state.db);
    let chat = registry.get_chat(chat_id).await?;
    if !chat.is_participant(user_id) {
        return Err(AppError::NotParticipant);
    }

    Ok(Json(chat))
}

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
}

pub async fn add_participant(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<AddParticipantRequest>,
) -> AppResult<Json<Chat>> {
    get_user_id(&claims)?;

    let registry = ChatRegistry::new(state.db);
    let chat = registry.add_participant(chat_id, req.user_id).await?;

    Ok(Json(chat))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
    pub before: Option<Ulid>,
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<MessagePage>> {
    let user_id = get_user_id(&claims)?;

    let chat_service = ChatService::new(state.db, state.config.chat.clone());
    let page = chat_service
        .fetch_page(chat_id, user_id, query.limit, query.before)
        .await?;

    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(chat_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<Message>> {
    let user_id = get_user_id(&claims)?;

    let chat_service = ChatService::new(state.db, state.config.chat.clone());
    let message = chat_service
        .send_message(chat_id, user_id, &req.content)
        .await?;

    Ok(Json(message))
}
