use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use accountable_types::api::{Claims, InvitationDetails, LoginForm, RegisterRequest, TokenResponse};
use accountable_types::models::User;
use accountable_types::notifications::NotificationEvent;

use crate::config::Settings;
use crate::error::ApiError;
use crate::notifications::notify;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = req.email.trim().to_string();
    if !looks_like_email(&email) {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::bad_request("First and last name are required"));
    }

    let lookup = email.clone();
    let taken = state
        .db(move |db| {
            Ok(db.get_identity_by_email(&lookup)?.is_some() || db.get_user_by_email(&lookup)?.is_some())
        })
        .await?;
    if taken {
        return Err(email_taken());
    }

    let password_hash = hash_password(&req.password)?;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        time_zone: req.time_zone,
        avatar_url: req.avatar_url,
        bio: None,
        created_at: now,
        updated_at: now,
    };

    create_account(&state, &user, password_hash).await?;
    info!("Registered user {}", user.id);

    if let Some(token) = req.invitation_token.as_deref().filter(|t| !t.trim().is_empty()) {
        link_invitation(&state, token, &user).await;
    }

    Ok((StatusCode::CREATED, Json(user)))
}

/// Identity account first, then the profile row. A failed profile insert
/// deletes the identity again so the email stays free.
async fn create_account(state: &AppState, user: &User, password_hash: String) -> Result<(), ApiError> {
    let (id, email, now) = (user.id, user.email.clone(), user.created_at);
    let created = state
        .db(move |db| db.create_identity(id, &email, &password_hash, now))
        .await?;
    if !created {
        return Err(email_taken());
    }

    let profile = user.clone();
    if let Err(e) = state.db(move |db| db.insert_user(&profile)).await {
        match state.db(move |db| db.delete_identity(id)).await {
            Ok(_) => warn!("Profile insert failed, removed identity {}", id),
            Err(rollback) => error!("Failed to remove identity {} after profile insert failed: {:?}", id, rollback),
        }
        return Err(e);
    }
    Ok(())
}

fn email_taken() -> ApiError {
    ApiError::Conflict("Email already registered".into())
}

/// Bind a freshly registered user to the placeholder partnership their
/// invitation created. Any reason the token cannot be redeemed leaves the
/// registration standing.
async fn link_invitation(state: &AppState, token: &str, user: &User) {
    let now = Utc::now();
    let token = token.to_string();
    let user_id = user.id;

    let redeemed = state
        .db(move |db| {
            let Some(invitation) = db.get_pending_invitation_by_token(&token)? else {
                return Ok(None);
            };
            if invitation.is_expired_at(now) {
                db.expire_invitation(invitation.id, now)?;
                return Ok(None);
            }
            db.redeem_invitation(&token, user_id, now)
        })
        .await;

    match redeemed {
        Ok(Some(redemption)) => {
            info!(
                "User {} joined partnership {} by invitation",
                user.id, redemption.partnership.id
            );
            notify(
                state,
                redemption.inviter_id,
                NotificationEvent::PartnershipAccepted {
                    partner_name: user.full_name(),
                    partnership_id: redemption.partnership.id,
                },
            )
            .await;
        }
        Ok(None) => debug!("Invitation token not redeemable, skipping linkage for {}", user.id),
        Err(e) => warn!("Invitation linkage failed for {}: {:?}", user.id, e),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let rejected = || ApiError::Unauthorized("Incorrect username or password".into());

    let email = form.username.trim().to_string();
    let identity = state
        .db(move |db| db.get_identity_by_email(&email))
        .await?
        .ok_or_else(rejected)?;

    if !verify_password(&form.password, &identity.password_hash)? {
        return Err(rejected());
    }

    let id = identity.id;
    let user = state
        .db(move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(rejected)?;

    let access_token = create_token(&state.settings, user.id)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    }))
}

pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// Public. Looking an invitation up past its expiry flips it to `expired`,
/// so a second look finds nothing.
pub async fn validate_invitation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationDetails>, ApiError> {
    let now = Utc::now();
    let invitation = state
        .db(move |db| db.get_pending_invitation_by_token(&token))
        .await?
        .ok_or_else(|| ApiError::not_found("Invalid or expired invitation token"))?;

    if invitation.is_expired_at(now) {
        let id = invitation.id;
        state.db(move |db| db.expire_invitation(id, now)).await?;
        return Err(ApiError::bad_request("Invitation has expired"));
    }

    let inviter_id = invitation.inviter_id;
    let inviter_name = state
        .db(move |db| db.get_user_by_id(inviter_id))
        .await?
        .map(|u| u.full_name())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Someone".into());

    Ok(Json(InvitationDetails {
        valid: true,
        email: invitation.email,
        inviter_name,
        message: invitation.message,
    }))
}

pub fn create_token(settings: &Settings, user_id: Uuid) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::minutes(settings.token_ttl_minutes)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Signature and expiry check.
pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("stored hash unreadable: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
