use std::any::Any;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use crate::auth;
use crate::error::{ApiError, InternalFailure, internal_error_body};
use crate::state::AppState;

/// Resolve the bearer token to a stored user and hand it to handlers as
/// `Extension<User>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let rejected = || ApiError::Unauthorized("Could not validate credentials".into());

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(rejected)?;

    let claims = auth::decode_token(&state.settings.jwt_secret, token).map_err(|_| rejected())?;

    let user_id = claims.sub;
    let user = state
        .db(move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(rejected)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Outermost guard: times every request, and renders internal failures
/// (including caught panics) as one 500 body that names the path.
pub async fn request_guard(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    info!("Request started: {} {}", method, path);

    let mut response = next.run(req).await;
    if let Some(InternalFailure(detail)) = response.extensions_mut().remove::<InternalFailure>() {
        response = internal_error_body(&detail, &path);
    }

    let elapsed = started.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&elapsed.to_string()) {
        response.headers_mut().insert("x-process-time", value);
    }
    info!(
        "Request completed: {} {} - Status: {} - Time: {:.3}s",
        method,
        path,
        response.status().as_u16(),
        elapsed
    );
    response
}

/// `CatchPanicLayer` handler.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    error!("Unhandled panic: {}", detail);
    InternalFailure(detail).into_response()
}
