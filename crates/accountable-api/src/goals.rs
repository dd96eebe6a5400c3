use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use accountable_types::api::{AddProgressRequest, CreateGoalRequest, GoalQuery};
use accountable_types::models::{
    Goal, GoalStatus, GoalUpdate, GoalWithProgress, Partnership, ProgressUpdate, User,
    completion_percentage,
};
use accountable_types::notifications::NotificationEvent;

use crate::error::ApiError;
use crate::notifications::notify_partner;
use crate::partnerships::member_partnership;
use crate::state::AppState;

/// The goal and its partnership. A missing goal is 404; a caller outside
/// the partnership is 403.
pub(crate) async fn goal_for_member(
    state: &AppState,
    goal_id: Uuid,
    user_id: Uuid,
) -> Result<(Goal, Partnership), ApiError> {
    let found = state
        .db(move |db| {
            let Some(goal) = db.get_goal(goal_id)? else {
                return Ok(None);
            };
            let partnership = db.get_partnership(goal.partnership_id)?;
            Ok(Some((goal, partnership)))
        })
        .await?;

    match found {
        None => Err(ApiError::not_found("Goal not found")),
        Some((goal, Some(p))) if p.is_member(user_id) => Ok((goal, p)),
        Some(_) => Err(ApiError::forbidden("You don't have access to this goal")),
    }
}

pub async fn create_goal(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<Goal>), ApiError> {
    let partnership = member_partnership(&state, req.partnership_id, user.id).await?;
    if req.user_id != user.id {
        return Err(ApiError::forbidden("You can only create goals for yourself"));
    }
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_request("Goal title is required"));
    }

    let now = Utc::now();
    let goal = Goal {
        id: Uuid::new_v4(),
        user_id: user.id,
        partnership_id: partnership.id,
        title,
        description: req.description,
        status: req.status,
        start_date: now,
        target_date: req.target_date,
        created_at: now,
        updated_at: now,
    };
    let stored = goal.clone();
    state.db(move |db| db.insert_goal(&stored)).await?;
    info!("Goal {} created by {} in partnership {}", goal.id, user.id, partnership.id);

    let event = NotificationEvent::GoalCreated {
        user_name: user.full_name(),
        goal_id: goal.id,
        goal_title: goal.title.clone(),
    };
    notify_partner(&state, user.id, &partnership, event).await;

    Ok((StatusCode::CREATED, Json(goal)))
}

/// Goals of one partnership (members only), or else the caller's own goals.
pub async fn list_goals(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<GoalQuery>,
) -> Result<Json<Vec<Goal>>, ApiError> {
    let rows = match query.partnership_id {
        Some(partnership_id) => {
            member_partnership(&state, partnership_id, user.id).await?;
            state
                .db(move |db| db.list_goals_for_partnership(partnership_id, query.status))
                .await?
        }
        None => {
            state
                .db(move |db| db.list_goals_for_user(user.id, query.status))
                .await?
        }
    };
    Ok(Json(rows))
}

pub async fn get_goal(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(goal_id): Path<Uuid>,
) -> Result<Json<GoalWithProgress>, ApiError> {
    let (goal, _) = goal_for_member(&state, goal_id, user.id).await?;
    let progress_updates = state
        .db(move |db| db.list_progress_for_goal(goal_id, true))
        .await?;

    Ok(Json(GoalWithProgress {
        completion_percentage: completion_percentage(progress_updates.len()),
        goal,
        progress_updates,
    }))
}

/// Owner-only. Any goal status may follow any other.
pub async fn update_goal(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(goal_id): Path<Uuid>,
    Json(update): Json<GoalUpdate>,
) -> Result<Json<Goal>, ApiError> {
    let owner = user.id;
    let found = state
        .db(move |db| {
            let Some(goal) = db.get_goal(goal_id)?.filter(|g| g.user_id == owner) else {
                return Ok(None);
            };
            let partnership = db.get_partnership(goal.partnership_id)?;
            Ok(Some((goal, partnership)))
        })
        .await?;
    let Some((mut goal, partnership)) = found else {
        return Err(ApiError::not_found("Goal not found or you're not the owner"));
    };

    if update.is_empty() {
        return Ok(Json(goal));
    }
    let previous_status = goal.status;
    update.apply(&mut goal);
    goal.updated_at = Utc::now();

    let stored = goal.clone();
    if !state.db(move |db| db.update_goal(&stored)).await? {
        return Err(ApiError::not_found("Goal not found or you're not the owner"));
    }

    if let Some(partnership) = partnership {
        let (user_name, goal_title) = (user.full_name(), goal.title.clone());
        let event = if goal.status == GoalStatus::Completed && previous_status != GoalStatus::Completed {
            NotificationEvent::GoalCompleted {
                user_name,
                goal_id,
                goal_title,
            }
        } else {
            NotificationEvent::GoalUpdated {
                user_name,
                goal_id,
                goal_title,
            }
        };
        notify_partner(&state, user.id, &partnership, event).await;
    }

    Ok(Json(goal))
}

pub async fn add_progress(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(goal_id): Path<Uuid>,
    Json(req): Json<AddProgressRequest>,
) -> Result<(StatusCode, Json<ProgressUpdate>), ApiError> {
    let update = record_progress(&state, &user, goal_id, req.description, req.progress_value).await?;
    Ok((StatusCode::CREATED, Json(update)))
}

/// Append a progress update. The caller must be a partnership member and
/// the goal's owner; partners can read but not add.
pub(crate) async fn record_progress(
    state: &AppState,
    user: &User,
    goal_id: Uuid,
    description: String,
    progress_value: Option<f64>,
) -> Result<ProgressUpdate, ApiError> {
    let (goal, partnership) = goal_for_member(state, goal_id, user.id).await?;
    if goal.user_id != user.id {
        return Err(ApiError::forbidden("You can only update progress for your own goals"));
    }
    let description = description.trim().to_string();
    if description.is_empty() {
        return Err(ApiError::bad_request("Progress description is required"));
    }

    let update = ProgressUpdate {
        id: Uuid::new_v4(),
        goal_id,
        user_id: user.id,
        description,
        progress_value,
        created_at: Utc::now(),
    };
    let stored = update.clone();
    state.db(move |db| db.insert_progress(&stored)).await?;

    let event = NotificationEvent::ProgressUpdate {
        user_name: user.full_name(),
        goal_id,
        goal_title: goal.title,
        progress_id: update.id,
        progress_description: update.description.clone(),
    };
    notify_partner(state, user.id, &partnership, event).await;

    Ok(update)
}
