use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored status string does not name a known variant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Closed string enums stored as TEXT and sent over the wire in snake_case.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::models::UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

pub(crate) use string_enum;

string_enum!(
    /// Partnership lifecycle state. `Active` and `Ended` are terminal.
    PartnershipStatus, "partnership status" {
        Pending => "pending",
        Trial => "trial",
        Active => "active",
        Ended => "ended",
    }
);

string_enum!(InvitationStatus, "invitation status" {
    Pending => "pending",
    Accepted => "accepted",
    Expired => "expired",
});

string_enum!(GoalStatus, "goal status" {
    Active => "active",
    Completed => "completed",
    Abandoned => "abandoned",
});

string_enum!(
    /// `Invitation` marks the note a requester attaches to a partnership request.
    MessageKind, "message kind" {
        Text => "text",
        Invitation => "invitation",
    }
);

// -- Users --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub time_zone: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Self-service profile update. Only present fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub time_zone: Option<String>,
    pub bio: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.avatar_url.is_none()
            && self.time_zone.is_none()
            && self.bio.is_none()
    }

    pub fn apply(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(avatar_url) = self.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(time_zone) = self.time_zone {
            user.time_zone = time_zone;
        }
        if let Some(bio) = self.bio {
            user.bio = Some(bio);
        }
    }
}

// -- Partnerships --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partnership {
    pub id: Uuid,
    pub user_one: Uuid,
    /// A placeholder id until an invited non-member registers.
    pub user_two: Uuid,
    pub status: PartnershipStatus,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub is_user_exists: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Partnership {
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.user_one == user_id || self.user_two == user_id
    }

    /// The other participant, if `user_id` is a member.
    pub fn partner_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.user_one == user_id {
            Some(self.user_two)
        } else if self.user_two == user_id {
            Some(self.user_one)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartnershipUpdate {
    pub status: Option<PartnershipStatus>,
    pub trial_end_date: Option<DateTime<Utc>>,
}

impl PartnershipUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.trial_end_date.is_none()
    }
}

/// Terms two partners agree on. Shared by agreement rows and invitation payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgreementTerms {
    pub communication_frequency: Option<String>,
    pub check_in_days: Vec<String>,
    pub expectations: Option<String>,
    pub commitment_level: Option<String>,
    pub feedback_style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnershipAgreement {
    pub id: Uuid,
    pub partnership_id: Uuid,
    #[serde(flatten)]
    pub terms: AgreementTerms,
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInvitation {
    pub id: Uuid,
    pub email: String,
    pub inviter_id: Uuid,
    /// The placeholder partnership this invitation resolves into.
    pub partnership_id: Option<Uuid>,
    pub invitation_token: String,
    pub status: InvitationStatus,
    pub agreement: Option<AgreementTerms>,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingInvitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// -- Goals & progress --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub partnership_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: GoalStatus,
    pub start_date: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner-only partial goal update. Any status may follow any status.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<GoalStatus>,
    pub target_date: Option<DateTime<Utc>>,
}

impl GoalUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.target_date.is_none()
    }

    pub fn apply(self, goal: &mut Goal) {
        if let Some(title) = self.title {
            goal.title = title;
        }
        if let Some(description) = self.description {
            goal.description = Some(description);
        }
        if let Some(status) = self.status {
            goal.status = status;
        }
        if let Some(target_date) = self.target_date {
            goal.target_date = Some(target_date);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub progress_value: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalWithProgress {
    #[serde(flatten)]
    pub goal: Goal,
    /// Newest first.
    pub progress_updates: Vec<ProgressUpdate>,
    pub completion_percentage: u32,
}

/// Placeholder heuristic: ten points per progress update, capped at 100.
/// Not a measure of real completion.
pub fn completion_percentage(update_count: usize) -> u32 {
    let points = update_count.saturating_mul(10).min(100);
    points as u32
}

// -- Check-ins --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub id: Uuid,
    pub partnership_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckIn {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Reschedule and/or replace notes. Completion has its own operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckInUpdate {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl CheckInUpdate {
    pub fn is_empty(&self) -> bool {
        self.scheduled_at.is_none() && self.notes.is_none()
    }

    pub fn apply(self, checkin: &mut CheckIn) {
        if let Some(scheduled_at) = self.scheduled_at {
            checkin.scheduled_at = scheduled_at;
        }
        if let Some(notes) = self.notes {
            checkin.notes = Some(notes);
        }
    }
}

/// Notes after completing a check-in: completion notes are appended below
/// whatever was written while scheduling.
pub fn append_notes(existing: Option<&str>, addition: Option<&str>) -> Option<String> {
    match (existing, addition.filter(|a| !a.trim().is_empty())) {
        (Some(old), Some(new)) if !old.trim().is_empty() => Some(format!("{old}\n\n{new}")),
        (_, Some(new)) => Some(new.to_string()),
        (old, None) => old.map(str::to_string),
    }
}

// -- Messages --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub partnership_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    /// Kept for wire compatibility; unread state comes from read watermarks.
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReadWatermark {
    pub user_id: Uuid,
    pub partnership_id: Uuid,
    pub last_read_at: DateTime<Utc>,
}
