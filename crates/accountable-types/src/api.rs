use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AgreementTerms, GoalStatus, PartnershipStatus};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub time_zone: String,
    pub avatar_url: Option<String>,
    pub invitation_token: Option<String>,
}

/// OAuth2 password-grant form. `username` carries the email address;
/// `grant_type`, `scope` and client fields are accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationDetails {
    pub valid: bool,
    pub email: String,
    pub inviter_name: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

// -- Partnerships --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePartnershipRequest {
    pub partner_email: String,
    pub message: Option<String>,
    pub agreement: Option<AgreementTerms>,
    /// `false` sends an email invitation to someone without an account.
    #[serde(default = "default_true")]
    pub is_user_exists: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct PartnershipQuery {
    pub status: Option<PartnershipStatus>,
}

// -- Goals & progress --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGoalRequest {
    pub user_id: Uuid,
    pub partnership_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_date: Option<DateTime<Utc>>,
    #[serde(default = "default_goal_status")]
    pub status: GoalStatus,
}

fn default_goal_status() -> GoalStatus {
    GoalStatus::Active
}

#[derive(Debug, Default, Deserialize)]
pub struct GoalQuery {
    pub partnership_id: Option<Uuid>,
    pub status: Option<GoalStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<GoalStatus>,
}

/// Body of `POST /goals/{id}/progress`; the goal comes from the path.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddProgressRequest {
    pub description: String,
    pub progress_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProgressRequest {
    pub goal_id: Uuid,
    pub description: String,
    pub progress_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub goal_id: Uuid,
}

// -- Check-ins --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCheckInRequest {
    pub partnership_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteCheckInRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckInQuery {
    pub partnership_id: Option<Uuid>,
    pub completed: Option<bool>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub partnership_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub partnership_id: Uuid,
    #[serde(default = "default_message_limit")]
    pub limit: u32,
    /// Cursor: only messages strictly older than this one are returned.
    pub before_id: Option<Uuid>,
}

fn default_message_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
pub struct UnreadQuery {
    pub partnership_id: Uuid,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_notification_limit")]
    pub limit: u32,
    #[serde(default)]
    pub unread_only: bool,
}

fn default_notification_limit() -> u32 {
    20
}
