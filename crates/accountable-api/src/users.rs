use axum::{
    Extension, Json,
    extract::{Query, State},
};
use chrono::Utc;

use accountable_types::api::{SearchQuery, StatusQuery};
use accountable_types::models::{Goal, Partnership, User, UserUpdate};

use crate::error::ApiError;
use crate::state::AppState;

const MIN_SEARCH_LEN: usize = 3;
const SEARCH_LIMIT: u32 = 10;

pub async fn get_me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(mut user): Extension<User>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    if update.is_empty() {
        return Ok(Json(user));
    }
    update.apply(&mut user);
    user.updated_at = Utc::now();

    let stored = user.clone();
    state.db(move |db| db.update_user(&stored)).await?;
    Ok(Json(user))
}

pub async fn my_partnerships(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Partnership>>, ApiError> {
    let rows = state
        .db(move |db| db.list_partnerships_for_user(user.id, None))
        .await?;
    Ok(Json(rows))
}

pub async fn my_goals(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<Goal>>, ApiError> {
    let rows = state
        .db(move |db| db.list_goals_for_user(user.id, query.status))
        .await?;
    Ok(Json(rows))
}

/// Case-insensitive email substring search over other users. Served at
/// both `/users/search` and `/partnerships/search`.
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let q = query.q.trim().to_string();
    if q.chars().count() < MIN_SEARCH_LEN {
        return Err(ApiError::bad_request("Search query must be at least 3 characters"));
    }
    let rows = state
        .db(move |db| db.search_users_by_email(&q, user.id, SEARCH_LIMIT))
        .await?;
    Ok(Json(rows))
}
