use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use accountable_types::api::{CheckInQuery, CompleteCheckInRequest, CreateCheckInRequest};
use accountable_types::models::{CheckIn, CheckInUpdate, Partnership, User, append_notes};
use accountable_types::notifications::NotificationEvent;

use crate::error::ApiError;
use crate::notifications::notify_partner;
use crate::partnerships::member_partnership;
use crate::state::AppState;

fn already_completed() -> ApiError {
    ApiError::bad_request("Check-in is already completed")
}

async fn checkin_for_member(
    state: &AppState,
    checkin_id: Uuid,
    user_id: Uuid,
) -> Result<(CheckIn, Partnership), ApiError> {
    let found = state
        .db(move |db| {
            let Some(checkin) = db.get_checkin(checkin_id)? else {
                return Ok(None);
            };
            let partnership = db.get_partnership(checkin.partnership_id)?;
            Ok(Some((checkin, partnership)))
        })
        .await?;

    match found {
        None => Err(ApiError::not_found("Check-in not found")),
        Some((checkin, Some(p))) if p.is_member(user_id) => Ok((checkin, p)),
        Some(_) => Err(ApiError::forbidden("You don't have access to this check-in")),
    }
}

pub async fn create_checkin(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateCheckInRequest>,
) -> Result<(StatusCode, Json<CheckIn>), ApiError> {
    let partnership = member_partnership(&state, req.partnership_id, user.id).await?;

    let now = Utc::now();
    let checkin = CheckIn {
        id: Uuid::new_v4(),
        partnership_id: partnership.id,
        scheduled_at: req.scheduled_at,
        notes: req.notes,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    let stored = checkin.clone();
    state.db(move |db| db.insert_checkin(&stored)).await?;
    info!("Check-in {} scheduled in partnership {}", checkin.id, partnership.id);

    let event = NotificationEvent::CheckinScheduled {
        partner_name: user.full_name(),
        checkin_id: checkin.id,
        scheduled_at: checkin.scheduled_at,
    };
    notify_partner(&state, user.id, &partnership, event).await;

    Ok((StatusCode::CREATED, Json(checkin)))
}

/// Soonest first, across one partnership or every partnership of the caller.
pub async fn list_checkins(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<CheckInQuery>,
) -> Result<Json<Vec<CheckIn>>, ApiError> {
    let completed = query.completed;
    let rows = match query.partnership_id {
        Some(partnership_id) => {
            member_partnership(&state, partnership_id, user.id).await?;
            state
                .db(move |db| db.list_checkins(&[partnership_id], completed))
                .await?
        }
        None => {
            state
                .db(move |db| {
                    let ids = db.partnership_ids_for_user(user.id)?;
                    db.list_checkins(&ids, completed)
                })
                .await?
        }
    };
    Ok(Json(rows))
}

pub async fn get_checkin(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(checkin_id): Path<Uuid>,
) -> Result<Json<CheckIn>, ApiError> {
    let (checkin, _) = checkin_for_member(&state, checkin_id, user.id).await?;
    Ok(Json(checkin))
}

pub async fn update_checkin(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(checkin_id): Path<Uuid>,
    Json(update): Json<CheckInUpdate>,
) -> Result<Json<CheckIn>, ApiError> {
    let (mut checkin, _) = checkin_for_member(&state, checkin_id, user.id).await?;
    if update.is_empty() {
        return Ok(Json(checkin));
    }
    update.apply(&mut checkin);
    checkin.updated_at = Utc::now();

    let stored = checkin.clone();
    if !state.db(move |db| db.update_checkin(&stored)).await? {
        return Err(ApiError::not_found("Check-in not found"));
    }
    Ok(Json(checkin))
}

/// One-way: a completed check-in cannot be completed again. Notes sent here
/// are appended to the scheduling notes.
pub async fn complete_checkin(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(checkin_id): Path<Uuid>,
    body: Option<Json<CompleteCheckInRequest>>,
) -> Result<Json<CheckIn>, ApiError> {
    let (checkin, partnership) = checkin_for_member(&state, checkin_id, user.id).await?;
    if checkin.is_completed() {
        return Err(already_completed());
    }

    let addition = body.and_then(|Json(b)| b.notes);
    let notes = append_notes(checkin.notes.as_deref(), addition.as_deref());
    let completed = state
        .db(move |db| db.complete_checkin(checkin_id, notes.as_deref(), Utc::now()))
        .await?
        .ok_or_else(already_completed)?;
    info!("Check-in {} completed by {}", checkin_id, user.id);

    let event = NotificationEvent::CheckinCompleted {
        partner_name: user.full_name(),
        checkin_id,
    };
    notify_partner(&state, user.id, &partnership, event).await;

    Ok(Json(completed))
}

/// Send the partner a reminder for an upcoming check-in.
pub async fn remind(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(checkin_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let (checkin, partnership) = checkin_for_member(&state, checkin_id, user.id).await?;
    if checkin.is_completed() {
        return Err(already_completed());
    }

    let event = NotificationEvent::CheckinReminder {
        partner_name: user.full_name(),
        checkin_id,
        scheduled_at: checkin.scheduled_at,
    };
    notify_partner(&state, user.id, &partnership, event).await;
    Ok(StatusCode::NO_CONTENT)
}
