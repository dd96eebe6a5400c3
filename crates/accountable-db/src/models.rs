//! Row and write-set types that never leave the DB layer or that bundle
//! several rows into one transactional write.

use accountable_types::models::{AgreementTerms, Message, Partnership, PendingInvitation};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identity provider account. The hash is never serialized.
pub struct IdentityRow {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A partnership request to an existing user, with its optional agreement
/// and invitation note, written in one transaction.
pub struct NewPartnershipRequest {
    pub partnership: Partnership,
    pub agreement: Option<AgreementTerms>,
    pub note: Option<Message>,
}

pub enum RequestOutcome {
    Created(Partnership),
    /// A non-ended partnership already pairs these two users.
    AlreadyPaired,
}

/// An email invitation and the placeholder partnership it will resolve into.
pub struct NewInvitation {
    pub invitation: PendingInvitation,
    pub placeholder: Partnership,
}

/// What registering with an invitation token linked up.
pub struct Redemption {
    pub partnership: Partnership,
    pub inviter_id: Uuid,
}
