use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use accountable_types::api::NotificationQuery;
use accountable_types::models::{Partnership, User};
use accountable_types::notifications::{Notification, NotificationEvent};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_NOTIFICATIONS: u32 = 100;

/// Best-effort fan-out: a failed insert is logged and reported as `None`,
/// never as an error to the enclosing request.
pub async fn notify(state: &AppState, recipient: Uuid, event: NotificationEvent) -> Option<Notification> {
    let notification = Notification::for_event(recipient, &event, Utc::now());
    let kind = notification.kind;

    let stored = state
        .db(move |db| {
            db.insert_notification(&notification)?;
            Ok(notification)
        })
        .await;

    match stored {
        Ok(n) => {
            debug!("Notified {} ({})", recipient, kind);
            Some(n)
        }
        Err(e) => {
            warn!("Failed to create {} notification for {}: {:?}", kind, recipient, e);
            None
        }
    }
}

/// Notify the other member of `partnership`, unless they are still an
/// unregistered placeholder.
pub async fn notify_partner(
    state: &AppState,
    actor_id: Uuid,
    partnership: &Partnership,
    event: NotificationEvent,
) -> Option<Notification> {
    if !partnership.is_user_exists {
        return None;
    }
    let partner_id = partnership.partner_of(actor_id)?;
    notify(state, partner_id, event).await
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let limit = query.limit.clamp(1, MAX_NOTIFICATIONS);
    let rows = state
        .db(move |db| db.list_notifications(user.id, limit, query.unread_only))
        .await?;
    Ok(Json(rows))
}

/// Always 204: an unknown id, or someone else's, changes nothing.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .db(move |db| db.mark_notification_read(notification_id, user.id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<StatusCode, ApiError> {
    let n = state.db(move |db| db.mark_all_notifications_read(user.id)).await?;
    debug!("Marked {} notifications read for {}", n, user.id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<u64>, ApiError> {
    let count = state.db(move |db| db.count_unread_notifications(user.id)).await?;
    Ok(Json(count))
}
