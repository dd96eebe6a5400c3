use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::RngCore;
use tracing::{info, warn};
use uuid::Uuid;

use accountable_db::models::{NewInvitation, NewPartnershipRequest, RequestOutcome};
use accountable_types::api::{CreatePartnershipRequest, PartnershipQuery};
use accountable_types::lifecycle::{self, PartnershipAction, TransitionError};
use accountable_types::models::{
    AgreementTerms, InvitationStatus, Message, MessageKind, Partnership, PartnershipAgreement,
    PartnershipStatus, PartnershipUpdate, PendingInvitation, User,
};
use accountable_types::notifications::NotificationEvent;

use crate::email::invitation_email;
use crate::error::ApiError;
use crate::notifications::{notify, notify_partner};
use crate::state::AppState;

const TOKEN_BYTES: usize = 32;

fn not_found() -> ApiError {
    ApiError::not_found("Partnership not found")
}

/// The partnership, if the caller is one of its members; 404 otherwise.
pub(crate) async fn member_partnership(
    state: &AppState,
    partnership_id: Uuid,
    user_id: Uuid,
) -> Result<Partnership, ApiError> {
    state
        .db(move |db| db.get_partnership_for_member(partnership_id, user_id))
        .await?
        .ok_or_else(not_found)
}

pub async fn create_partnership(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreatePartnershipRequest>,
) -> Result<(StatusCode, Json<Partnership>), ApiError> {
    let partner_email = req.partner_email.trim().to_string();
    if partner_email.eq_ignore_ascii_case(&user.email) {
        return Err(ApiError::bad_request("You cannot partner with yourself"));
    }

    let lookup = partner_email.clone();
    let partner = state.db(move |db| db.get_user_by_email(&lookup)).await?;

    if !req.is_user_exists {
        if partner.is_some() {
            return Err(ApiError::bad_request(
                "A user with that email already exists, send them a partnership request instead",
            ));
        }
        return invite_by_email(&state, &user, partner_email, req).await;
    }

    let partner = partner.ok_or_else(|| ApiError::not_found("User with that email not found"))?;

    let now = Utc::now();
    let partnership = Partnership {
        id: Uuid::new_v4(),
        user_one: user.id,
        user_two: partner.id,
        status: PartnershipStatus::Pending,
        trial_end_date: Some(lifecycle::trial_end_from(now)),
        is_user_exists: true,
        created_at: now,
        updated_at: now,
    };
    let note = req
        .message
        .filter(|m| !m.trim().is_empty())
        .map(|content| Message {
            id: Uuid::new_v4(),
            partnership_id: partnership.id,
            sender_id: user.id,
            content,
            kind: MessageKind::Invitation,
            read_at: None,
            created_at: now,
        });
    let request = NewPartnershipRequest {
        partnership,
        agreement: req.agreement,
        note,
    };

    let partnership = match state.db(move |db| db.create_partnership_request(request)).await? {
        RequestOutcome::Created(p) => p,
        RequestOutcome::AlreadyPaired => {
            return Err(ApiError::Conflict(
                "A partnership already exists between these users".into(),
            ));
        }
    };
    info!("Partnership {} requested by {} to {}", partnership.id, user.id, partner.id);

    notify(
        &state,
        partner.id,
        NotificationEvent::PartnershipRequest {
            sender_name: user.full_name(),
            partnership_id: partnership.id,
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(partnership)))
}

/// Email invitation for someone without an account: a placeholder
/// partnership plus a pending invitation, then a best-effort email.
async fn invite_by_email(
    state: &AppState,
    inviter: &User,
    email: String,
    req: CreatePartnershipRequest,
) -> Result<(StatusCode, Json<Partnership>), ApiError> {
    let now = Utc::now();
    let placeholder = Partnership {
        id: Uuid::new_v4(),
        user_one: inviter.id,
        user_two: Uuid::new_v4(),
        status: PartnershipStatus::Pending,
        trial_end_date: Some(lifecycle::trial_end_from(now)),
        is_user_exists: false,
        created_at: now,
        updated_at: now,
    };
    let token = new_invitation_token();
    let message = req.message.filter(|m| !m.trim().is_empty());
    let new = NewInvitation {
        invitation: PendingInvitation {
            id: Uuid::new_v4(),
            email: email.clone(),
            inviter_id: inviter.id,
            partnership_id: Some(placeholder.id),
            invitation_token: token.clone(),
            status: InvitationStatus::Pending,
            agreement: req.agreement,
            message: message.clone(),
            expires_at: lifecycle::invitation_expiry_from(now),
            created_at: now,
            updated_at: now,
        },
        placeholder: placeholder.clone(),
    };

    state.db(move |db| db.create_invitation(&new)).await?;
    info!("Invitation for partnership {} created by {}", placeholder.id, inviter.id);

    let settings = &state.settings;
    let rendered = invitation_email(
        &settings.app_name,
        &settings.frontend_url,
        &inviter.full_name(),
        &token,
        message.as_deref(),
    );
    if let Err(e) = state.mailer.send_html(&email, &rendered.subject, rendered.html).await {
        warn!("Failed to send invitation email to {}: {:?}", email, e);
    }

    Ok((StatusCode::CREATED, Json(placeholder)))
}

fn new_invitation_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub async fn list_partnerships(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PartnershipQuery>,
) -> Result<Json<Vec<Partnership>>, ApiError> {
    let rows = state
        .db(move |db| db.list_partnerships_for_user(user.id, query.status))
        .await?;
    Ok(Json(rows))
}

pub async fn get_partnership(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
) -> Result<Json<Partnership>, ApiError> {
    Ok(Json(member_partnership(&state, partnership_id, user.id).await?))
}

/// Member-driven partial update. A status change runs as the lifecycle
/// action it stands for, with that action's caller and date rules; terminal
/// partnerships keep their trial end date.
pub async fn update_partnership(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
    Json(update): Json<PartnershipUpdate>,
) -> Result<Json<Partnership>, ApiError> {
    let current = member_partnership(&state, partnership_id, user.id).await?;
    if update.is_empty() {
        return Ok(Json(current));
    }

    let now = Utc::now();
    let expected = current.status;
    let action = match update.status {
        Some(status) => lifecycle::action_for_change(expected, status).map_err(transition_error)?,
        None => None,
    };

    let mut next = current;
    if let Some(action) = action {
        let planned = lifecycle::plan(&next, user.id, action, now).map_err(transition_error)?;
        next.status = planned.to;
        next.trial_end_date = planned.trial_end_date;
    }
    if let Some(trial_end_date) = update.trial_end_date {
        if next.status.is_terminal() {
            return Err(ApiError::bad_request(format!(
                "Cannot change the trial end date of a partnership that is {}",
                next.status
            )));
        }
        next.trial_end_date = Some(trial_end_date);
    }
    next.updated_at = now;

    let written = next.clone();
    if !state.db(move |db| db.update_partnership(&written, expected)).await? {
        return Err(ApiError::bad_request("Partnership changed concurrently, try again"));
    }

    if let Some(action) = action {
        info!("Partnership {} updated by {}: {} -> {}", next.id, user.id, expected, next.status);
        if let Some(event) = transition_event(action, user.full_name(), next.id) {
            notify_partner(&state, user.id, &next, event).await;
        }
    }

    Ok(Json(next))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
) -> Result<Json<Partnership>, ApiError> {
    transition(&state, &user, partnership_id, PartnershipAction::Accept).await
}

pub async fn decline(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
) -> Result<Json<Partnership>, ApiError> {
    transition(&state, &user, partnership_id, PartnershipAction::Decline).await
}

pub async fn finalize(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
) -> Result<Json<Partnership>, ApiError> {
    transition(&state, &user, partnership_id, PartnershipAction::Finalize).await
}

pub async fn end_trial(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
) -> Result<Json<Partnership>, ApiError> {
    transition(&state, &user, partnership_id, PartnershipAction::EndTrial).await
}

async fn transition(
    state: &AppState,
    user: &User,
    partnership_id: Uuid,
    action: PartnershipAction,
) -> Result<Json<Partnership>, ApiError> {
    let current = member_partnership(state, partnership_id, user.id).await?;

    let now = Utc::now();
    let planned = lifecycle::plan(&current, user.id, action, now).map_err(transition_error)?;

    let (from, to) = (planned.from, planned.to);
    let updated = state
        .db(move |db| db.apply_transition(partnership_id, &planned, now))
        .await?
        .ok_or_else(|| ApiError::bad_request("Partnership changed concurrently, try again"))?;
    info!("Partnership {} {}: {} -> {} by {}", partnership_id, action.verb(), from, to, user.id);

    if let Some(event) = transition_event(action, user.full_name(), partnership_id) {
        notify_partner(state, user.id, &updated, event).await;
    }

    Ok(Json(updated))
}

fn transition_error(e: TransitionError) -> ApiError {
    match e {
        TransitionError::NotMember => not_found(),
        TransitionError::NotRecipient(_) => ApiError::forbidden(e.to_string()),
        TransitionError::InvalidState { .. } | TransitionError::IllegalChange { .. } => {
            ApiError::bad_request(e.to_string())
        }
    }
}

/// What the other member hears about a transition. Finalizing is silent.
fn transition_event(
    action: PartnershipAction,
    partner_name: String,
    partnership_id: Uuid,
) -> Option<NotificationEvent> {
    match action {
        PartnershipAction::Accept => Some(NotificationEvent::PartnershipAccepted {
            partner_name,
            partnership_id,
        }),
        PartnershipAction::Decline => Some(NotificationEvent::PartnershipDeclined {
            partner_name,
            partnership_id,
        }),
        PartnershipAction::EndTrial => Some(NotificationEvent::PartnershipEnded {
            partner_name,
            partnership_id,
        }),
        PartnershipAction::Finalize => None,
    }
}

// -- Agreements --

pub async fn get_agreement(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
) -> Result<Json<PartnershipAgreement>, ApiError> {
    member_partnership(&state, partnership_id, user.id).await?;
    let agreement = state
        .db(move |db| db.get_agreement(partnership_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Agreement not found"))?;
    Ok(Json(agreement))
}

/// Create-or-replace the partnership's agreement.
pub async fn upsert_agreement(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(partnership_id): Path<Uuid>,
    Json(terms): Json<AgreementTerms>,
) -> Result<Json<PartnershipAgreement>, ApiError> {
    member_partnership(&state, partnership_id, user.id).await?;
    let by = user.id;
    let agreement = state
        .db(move |db| db.upsert_agreement(partnership_id, &terms, by, Utc::now()))
        .await?;
    Ok(Json(agreement))
}

// -- Invitations --

/// Invitations the caller has sent, newest first.
pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<PendingInvitation>>, ApiError> {
    let rows = state
        .db(move |db| db.list_invitations_by_inviter(user.id))
        .await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitation_tokens_are_url_safe_and_distinct() {
        let a = new_invitation_token();
        let b = new_invitation_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
