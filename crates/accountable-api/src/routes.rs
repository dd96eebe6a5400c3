use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Settings;
use crate::middleware::{panic_response, request_guard, require_auth};
use crate::state::AppState;
use crate::{auth, checkins, goals, messages, notifications, partnerships, progress, users};

/// The whole HTTP surface with its middleware stack.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/validate-invitation/{token}", get(auth::validate_invitation))
        .route(
            "/partnerships/invitations/{token}/validate",
            get(auth::validate_invitation),
        );

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users/me", get(users::get_me).put(users::update_me))
        .route("/users/me/partnerships", get(users::my_partnerships))
        .route("/users/me/goals", get(users::my_goals))
        .route("/users/search", get(users::search))
        // Partnerships
        .route(
            "/partnerships",
            post(partnerships::create_partnership).get(partnerships::list_partnerships),
        )
        .route("/partnerships/search", get(users::search))
        .route("/partnerships/invitations", get(partnerships::list_invitations))
        .route(
            "/partnerships/{partnership_id}",
            get(partnerships::get_partnership).put(partnerships::update_partnership),
        )
        .route("/partnerships/{partnership_id}/accept", post(partnerships::accept))
        .route("/partnerships/{partnership_id}/decline", post(partnerships::decline))
        .route("/partnerships/{partnership_id}/finalize", post(partnerships::finalize))
        .route("/partnerships/{partnership_id}/end-trial", post(partnerships::end_trial))
        .route(
            "/partnerships/{partnership_id}/agreement",
            get(partnerships::get_agreement).post(partnerships::upsert_agreement),
        )
        // Goals
        .route("/goals", post(goals::create_goal).get(goals::list_goals))
        .route("/goals/{goal_id}", get(goals::get_goal).put(goals::update_goal))
        .route("/goals/{goal_id}/progress", post(goals::add_progress))
        // Progress
        .route("/progress", post(progress::create_progress).get(progress::list_progress))
        .route(
            "/progress/{update_id}",
            get(progress::get_progress).delete(progress::delete_progress),
        )
        // Check-ins
        .route("/checkins", post(checkins::create_checkin).get(checkins::list_checkins))
        .route(
            "/checkins/{checkin_id}",
            get(checkins::get_checkin).put(checkins::update_checkin),
        )
        .route("/checkins/{checkin_id}/complete", post(checkins::complete_checkin))
        .route("/checkins/{checkin_id}/remind", post(checkins::remind))
        // Messages
        .route("/messages", post(messages::send_message).get(messages::list_messages))
        .route("/messages/unread", get(messages::unread_count))
        .route("/messages/{partnership_id}/mark-read", post(messages::mark_read))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/{notification_id}/read", post(notifications::mark_read))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(request_guard))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.settings))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

fn cors(settings: &Settings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    match HeaderValue::from_str(&settings.frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!("FRONTEND_URL '{}' is not a valid origin, CORS disabled", settings.frontend_url);
            layer
        }
    }
}
