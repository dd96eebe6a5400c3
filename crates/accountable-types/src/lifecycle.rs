//! Partnership lifecycle.
//!
//! ```text
//! pending --accept--> trial --finalize--> active
//!    |                  |
//!    +--decline--> ended <--end-trial--+
//! ```
//!
//! Transitions are pure here; persisting one is a compare-and-set on the
//! prior status so two racing requests cannot both apply.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{Partnership, PartnershipStatus};

pub const TRIAL_PERIOD_DAYS: i64 = 14;
pub const INVITATION_TTL_DAYS: i64 = 7;

pub fn trial_end_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(TRIAL_PERIOD_DAYS)
}

pub fn invitation_expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(INVITATION_TTL_DAYS)
}

impl PartnershipStatus {
    pub fn can_transition_to(self, next: PartnershipStatus) -> bool {
        use PartnershipStatus::*;
        matches!(
            (self, next),
            (Pending, Trial) | (Pending, Ended) | (Trial, Active) | (Trial, Ended)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PartnershipStatus::Active | PartnershipStatus::Ended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnershipAction {
    Accept,
    Decline,
    Finalize,
    EndTrial,
}

impl PartnershipAction {
    pub fn required_status(self) -> PartnershipStatus {
        match self {
            Self::Accept | Self::Decline => PartnershipStatus::Pending,
            Self::Finalize | Self::EndTrial => PartnershipStatus::Trial,
        }
    }

    pub fn target_status(self) -> PartnershipStatus {
        match self {
            Self::Accept => PartnershipStatus::Trial,
            Self::Finalize => PartnershipStatus::Active,
            Self::Decline | Self::EndTrial => PartnershipStatus::Ended,
        }
    }

    /// Accept and decline belong to the addressed recipient (`user_two`);
    /// finalize and end-trial to either member.
    pub fn recipient_only(self) -> bool {
        matches!(self, Self::Accept | Self::Decline)
    }

    pub fn verb(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Finalize => "finalize",
            Self::EndTrial => "end the trial of",
        }
    }
}

/// The row values a transition writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: PartnershipStatus,
    pub to: PartnershipStatus,
    pub trial_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("Partnership not found")]
    NotMember,
    #[error("Only the invited partner can {} this partnership", .0.verb())]
    NotRecipient(PartnershipAction),
    #[error("Cannot {} a partnership that is {status}", .action.verb())]
    InvalidState {
        action: PartnershipAction,
        status: PartnershipStatus,
    },
    #[error("Cannot change partnership status from {from} to {to}")]
    IllegalChange {
        from: PartnershipStatus,
        to: PartnershipStatus,
    },
}

pub fn plan(
    partnership: &Partnership,
    actor: Uuid,
    action: PartnershipAction,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if !partnership.is_member(actor) {
        return Err(TransitionError::NotMember);
    }
    if action.recipient_only() && partnership.user_two != actor {
        return Err(TransitionError::NotRecipient(action));
    }
    if partnership.status != action.required_status() {
        return Err(TransitionError::InvalidState {
            action,
            status: partnership.status,
        });
    }

    let trial_end_date = match action {
        PartnershipAction::Accept => Some(trial_end_from(now)),
        PartnershipAction::Finalize => None,
        PartnershipAction::Decline | PartnershipAction::EndTrial => partnership.trial_end_date,
    };

    Ok(Transition {
        from: partnership.status,
        to: action.target_status(),
        trial_end_date,
    })
}

/// The lifecycle action a status written through the generic partnership
/// update stands for. Re-stating the current status is `None`, not an error.
pub fn action_for_change(
    from: PartnershipStatus,
    to: PartnershipStatus,
) -> Result<Option<PartnershipAction>, TransitionError> {
    use PartnershipStatus::*;
    match (from, to) {
        _ if from == to => Ok(None),
        (Pending, Trial) => Ok(Some(PartnershipAction::Accept)),
        (Pending, Ended) => Ok(Some(PartnershipAction::Decline)),
        (Trial, Active) => Ok(Some(PartnershipAction::Finalize)),
        (Trial, Ended) => Ok(Some(PartnershipAction::EndTrial)),
        _ => Err(TransitionError::IllegalChange { from, to }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partnership(status: PartnershipStatus) -> (Partnership, Uuid, Uuid) {
        let now = Utc::now();
        let (one, two) = (Uuid::new_v4(), Uuid::new_v4());
        let p = Partnership {
            id: Uuid::new_v4(),
            user_one: one,
            user_two: two,
            status,
            trial_end_date: Some(trial_end_from(now)),
            is_user_exists: true,
            created_at: now,
            updated_at: now,
        };
        (p, one, two)
    }

    #[test]
    fn accept_is_recipient_only_and_resets_trial_end() {
        let (p, requester, recipient) = partnership(PartnershipStatus::Pending);
        let now = Utc::now() + Duration::days(3);

        assert_eq!(
            plan(&p, requester, PartnershipAction::Accept, now),
            Err(TransitionError::NotRecipient(PartnershipAction::Accept))
        );

        let t = plan(&p, recipient, PartnershipAction::Accept, now).unwrap();
        assert_eq!(t.to, PartnershipStatus::Trial);
        assert_eq!(t.trial_end_date, Some(now + Duration::days(14)));
    }

    #[test]
    fn accept_and_decline_require_pending() {
        for status in [
            PartnershipStatus::Trial,
            PartnershipStatus::Active,
            PartnershipStatus::Ended,
        ] {
            let (p, _, recipient) = partnership(status);
            for action in [PartnershipAction::Accept, PartnershipAction::Decline] {
                assert!(matches!(
                    plan(&p, recipient, action, Utc::now()),
                    Err(TransitionError::InvalidState { .. })
                ));
            }
        }
    }

    #[test]
    fn finalize_and_end_trial_require_trial() {
        for status in [
            PartnershipStatus::Pending,
            PartnershipStatus::Active,
            PartnershipStatus::Ended,
        ] {
            let (p, one, _) = partnership(status);
            for action in [PartnershipAction::Finalize, PartnershipAction::EndTrial] {
                assert!(matches!(
                    plan(&p, one, action, Utc::now()),
                    Err(TransitionError::InvalidState { .. })
                ));
            }
        }

        let (p, one, two) = partnership(PartnershipStatus::Trial);
        let finalized = plan(&p, one, PartnershipAction::Finalize, Utc::now()).unwrap();
        assert_eq!(finalized.to, PartnershipStatus::Active);
        assert_eq!(finalized.trial_end_date, None);

        let ended = plan(&p, two, PartnershipAction::EndTrial, Utc::now()).unwrap();
        assert_eq!(ended.to, PartnershipStatus::Ended);
    }

    #[test]
    fn outsiders_are_not_members() {
        let (p, _, _) = partnership(PartnershipStatus::Trial);
        assert_eq!(
            plan(&p, Uuid::new_v4(), PartnershipAction::Finalize, Utc::now()),
            Err(TransitionError::NotMember)
        );
    }

    #[test]
    fn terminal_states_do_not_move() {
        use PartnershipStatus::*;
        for next in [Pending, Trial, Active, Ended] {
            assert!(!Ended.can_transition_to(next));
            assert!(!Active.can_transition_to(next));
        }
        assert_eq!(action_for_change(Trial, Trial), Ok(None));
        assert!(action_for_change(Trial, Pending).is_err());
        assert!(action_for_change(Ended, Trial).is_err());
    }

    #[test]
    fn status_changes_map_onto_actions() {
        use PartnershipStatus::*;
        assert_eq!(action_for_change(Pending, Trial), Ok(Some(PartnershipAction::Accept)));
        assert_eq!(action_for_change(Pending, Ended), Ok(Some(PartnershipAction::Decline)));
        assert_eq!(action_for_change(Trial, Active), Ok(Some(PartnershipAction::Finalize)));
        assert_eq!(action_for_change(Trial, Ended), Ok(Some(PartnershipAction::EndTrial)));
        assert!(action_for_change(Pending, Active).is_err());

        // Every mapped action agrees with the state graph.
        for from in [Pending, Trial, Active, Ended] {
            for to in [Pending, Trial, Active, Ended] {
                if let Ok(Some(action)) = action_for_change(from, to) {
                    assert!(from.can_transition_to(to));
                    assert_eq!(action.required_status(), from);
                    assert_eq!(action.target_status(), to);
                }
            }
        }
    }
}
