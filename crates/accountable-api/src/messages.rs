use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use accountable_types::api::{MessageQuery, SendMessageRequest, UnreadQuery};
use accountable_types::models::{Message, MessageKind, Partnership, User};
use accountable_types::notifications::NotificationEvent;

use crate::error::ApiError;
use crate::notifications::notify_partner;
use crate::state::AppState;

async fn conversation(state: &AppState, partnership_id: Uuid, user_id: Uuid) -> Result<Partnership, ApiError> {
    state
        .db(move |db| db.get_partnership_for_member(partnership_id, user_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Partnership not found or you don't have access"))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let partnership = conversation(&state, req.partnership_id, user.id).await?;
    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("Message content is required"));
    }

    let message = Message {
        id: Uuid::new_v4(),
        partnership_id: partnership.id,
        sender_id: user.id,
        content: req.content,
        kind: MessageKind::Text,
        read_at: None,
        created_at: Utc::now(),
    };
    let stored = message.clone();
    state.db(move |db| db.insert_message(&stored)).await?;
    debug!("Message {} sent in partnership {}", message.id, partnership.id);

    let event = NotificationEvent::new_message(user.full_name(), partnership.id, message.id, &message.content);
    notify_partner(&state, user.id, &partnership, event).await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// One page, oldest first. `before_id` walks further back.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let partnership = conversation(&state, query.partnership_id, user.id).await?;
    let rows = state
        .db(move |db| db.list_messages(partnership.id, query.limit, query.before_id))
        .await?;
    Ok(Json(rows))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<UnreadQuery>,
) -> Result<Json<u64>, ApiError> {
    let partnership = conversation(&state, query.partnership_id, user.id).await?;
    let count = state
        .db(move |db| db.count_unread_messages(partnership.id, user.id))
        .await?;
    Ok(Json(count))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    conversation(&state, partnership_id, user.id).await?;
    state
        .db(move |db| db.mark_messages_read(user.id, partnership_id, Utc::now()))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
