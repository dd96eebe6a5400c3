use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use accountable_types::api::{CreateProgressRequest, ProgressQuery};
use accountable_types::models::{ProgressUpdate, User};

use crate::error::ApiError;
use crate::goals::{goal_for_member, record_progress};
use crate::state::AppState;

pub async fn create_progress(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateProgressRequest>,
) -> Result<(StatusCode, Json<ProgressUpdate>), ApiError> {
    let update = record_progress(&state, &user, req.goal_id, req.description, req.progress_value).await?;
    Ok((StatusCode::CREATED, Json(update)))
}

/// Oldest first.
pub async fn list_progress(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<Vec<ProgressUpdate>>, ApiError> {
    let goal_id = query.goal_id;
    goal_for_member(&state, goal_id, user.id).await?;
    let rows = state
        .db(move |db| db.list_progress_for_goal(goal_id, false))
        .await?;
    Ok(Json(rows))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(update_id): Path<Uuid>,
) -> Result<Json<ProgressUpdate>, ApiError> {
    let user_id = user.id;
    let (update, member) = state
        .db(move |db| {
            let Some(update) = db.get_progress(update_id)? else {
                return Ok(None);
            };
            let Some(goal) = db.get_goal(update.goal_id)? else {
                return Ok(Some((update, None)));
            };
            let member = db
                .get_partnership(goal.partnership_id)?
                .is_some_and(|p| p.is_member(user_id));
            Ok(Some((update, Some(member))))
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Progress update not found"))?;

    match member {
        None => Err(ApiError::not_found("Associated goal not found")),
        Some(false) => Err(ApiError::forbidden("You don't have access to this progress update")),
        Some(true) => Ok(Json(update)),
    }
}

/// Author only.
pub async fn delete_progress(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(update_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let update = state
        .db(move |db| db.get_progress(update_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Progress update not found"))?;
    if update.user_id != user.id {
        return Err(ApiError::forbidden("You can only delete your own progress updates"));
    }

    state.db(move |db| db.delete_progress(update_id)).await?;
    info!("Progress update {} deleted by {}", update_id, user.id);
    Ok(StatusCode::NO_CONTENT)
}
