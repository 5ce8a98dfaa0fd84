use axum::{
    extract::{Path, State},
    Extension, Json,
};
use ulid::Ulid;

use crate::{
    error::AppResult,
    models::Receipt,
    services::{auth::Claims, chat::ChatService, delivery::DeliveryTracker},
    AppState,
};

use super::super::middleware::get_user_id;

pub async fn mark_delivered(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Ulid>,
) -> AppResult<Json<Receipt>> {
    let user_id = get_user_id(&claims)?;

    let chat_service = ChatService::new(state.db, state.config.chat.clone());
    let receipt = chat_service.acknowledge_delivered(message_id, user_id).await?;

    Ok(Json(receipt))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Ulid>,
) -> AppResult<Json<Receipt>> {
    let user_id = get_user_id(&claims)?;

    let chat_service = ChatService::new(state.db, state.config.chat.clone());
    let receipt = chat_service.acknowledge_read(message_id, user_id).await?;

    Ok(Json(receipt))
}

pub async fn get_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Ulid>,
) -> AppResult<Json<Option<Receipt>>> {
    let user_id = get_user_id(&claims)?;

    let tracker = DeliveryTracker::new(state.db);
    let receipt = tracker.status_for(message_id, user_id).await?;

    Ok(Json(receipt))
}
