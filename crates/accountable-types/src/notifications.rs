use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::string_enum;

string_enum!(
    /// Stored `type` column of a notification row.
    NotificationType, "notification type" {
        PartnershipRequest => "partnership_request",
        PartnershipAccepted => "partnership_accepted",
        PartnershipDeclined => "partnership_declined",
        PartnershipEnded => "partnership_ended",
        GoalCreated => "goal_created",
        GoalUpdated => "goal_updated",
        GoalCompleted => "goal_completed",
        CheckinScheduled => "checkin_scheduled",
        CheckinReminder => "checkin_reminder",
        CheckinCompleted => "checkin_completed",
        ProgressUpdate => "progress_update",
        NewMessage => "new_message",
    }
);

/// A notification row as returned to its recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_entity_id: Option<Uuid>,
    pub data: Option<serde_json::Value>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// An unread notification for `user_id` rendered from `event`.
    pub fn for_event(user_id: Uuid, event: &NotificationEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: event.kind(),
            title: event.title(),
            message: event.message(),
            related_entity_id: Some(event.related_entity_id()),
            data: Some(event.data()),
            read: false,
            created_at: now,
        }
    }
}

const PREVIEW_LIMIT: usize = 50;
const PREVIEW_KEEP: usize = 47;

/// Messages over 50 characters are cut to 47 plus an ellipsis.
pub fn message_preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_LIMIT {
        let kept: String = content.chars().take(PREVIEW_KEEP).collect();
        format!("{kept}...")
    } else {
        content.to_string()
    }
}

fn format_schedule(at: &DateTime<Utc>) -> String {
    at.format("%A, %B %d at %I:%M %p").to_string()
}

/// Events that fan out into a notification for one recipient. Each variant
/// carries exactly what its title and message need; the serialized variant
/// (minus its tag) is stored as the notification's `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    PartnershipRequest {
        sender_name: String,
        partnership_id: Uuid,
    },
    PartnershipAccepted {
        partner_name: String,
        partnership_id: Uuid,
    },
    PartnershipDeclined {
        partner_name: String,
        partnership_id: Uuid,
    },
    PartnershipEnded {
        partner_name: String,
        partnership_id: Uuid,
    },
    GoalCreated {
        user_name: String,
        goal_id: Uuid,
        goal_title: String,
    },
    GoalUpdated {
        user_name: String,
        goal_id: Uuid,
        goal_title: String,
    },
    GoalCompleted {
        user_name: String,
        goal_id: Uuid,
        goal_title: String,
    },
    CheckinScheduled {
        partner_name: String,
        checkin_id: Uuid,
        scheduled_at: DateTime<Utc>,
    },
    CheckinReminder {
        partner_name: String,
        checkin_id: Uuid,
        scheduled_at: DateTime<Utc>,
    },
    CheckinCompleted {
        partner_name: String,
        checkin_id: Uuid,
    },
    ProgressUpdate {
        user_name: String,
        goal_id: Uuid,
        goal_title: String,
        progress_id: Uuid,
        progress_description: String,
    },
    NewMessage {
        sender_name: String,
        partnership_id: Uuid,
        message_id: Uuid,
        message_preview: String,
    },
}

impl NotificationEvent {
    pub fn new_message(
        sender_name: impl Into<String>,
        partnership_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Self {
        Self::NewMessage {
            sender_name: sender_name.into(),
            partnership_id,
            message_id,
            message_preview: message_preview(content),
        }
    }

    pub fn kind(&self) -> NotificationType {
        match self {
            Self::PartnershipRequest { .. } => NotificationType::PartnershipRequest,
            Self::PartnershipAccepted { .. } => NotificationType::PartnershipAccepted,
            Self::PartnershipDeclined { .. } => NotificationType::PartnershipDeclined,
            Self::PartnershipEnded { .. } => NotificationType::PartnershipEnded,
            Self::GoalCreated { .. } => NotificationType::GoalCreated,
            Self::GoalUpdated { .. } => NotificationType::GoalUpdated,
            Self::GoalCompleted { .. } => NotificationType::GoalCompleted,
            Self::CheckinScheduled { .. } => NotificationType::CheckinScheduled,
            Self::CheckinReminder { .. } => NotificationType::CheckinReminder,
            Self::CheckinCompleted { .. } => NotificationType::CheckinCompleted,
            Self::ProgressUpdate { .. } => NotificationType::ProgressUpdate,
            Self::NewMessage { .. } => NotificationType::NewMessage,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Self::PartnershipRequest { .. } => "New Accountability Partnership Request".into(),
            Self::PartnershipAccepted { .. } => "Partnership Request Accepted".into(),
            Self::PartnershipDeclined { .. } => "Partnership Request Declined".into(),
            Self::PartnershipEnded { .. } => "Partnership Ended".into(),
            Self::GoalCreated { .. } => "New Goal Created".into(),
            Self::GoalUpdated { .. } => "Goal Updated".into(),
            Self::GoalCompleted { .. } => "Goal Completed".into(),
            Self::CheckinScheduled { .. } => "Check-in Scheduled".into(),
            Self::CheckinReminder { .. } => "Upcoming Check-in Reminder".into(),
            Self::CheckinCompleted { .. } => "Check-in Completed".into(),
            Self::ProgressUpdate { .. } => "New Progress Update".into(),
            Self::NewMessage { sender_name, .. } => format!("New Message from {sender_name}"),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::PartnershipRequest { sender_name, .. } => {
                format!("{sender_name} has requested to be your accountability partner.")
            }
            Self::PartnershipAccepted { partner_name, .. } => {
                format!("{partner_name} accepted your accountability partnership request.")
            }
            Self::PartnershipDeclined { partner_name, .. } => {
                format!("{partner_name} declined your accountability partnership request.")
            }
            Self::PartnershipEnded { partner_name, .. } => {
                format!("{partner_name} ended your accountability partnership.")
            }
            Self::GoalCreated { user_name, goal_title, .. } => {
                format!("{user_name} created a new goal: {goal_title}")
            }
            Self::GoalUpdated { user_name, goal_title, .. } => {
                format!("{user_name} updated their goal: {goal_title}")
            }
            Self::GoalCompleted { user_name, goal_title, .. } => {
                format!("{user_name} completed their goal: {goal_title}")
            }
            Self::CheckinScheduled { partner_name, scheduled_at, .. } => {
                format!(
                    "{partner_name} scheduled a check-in for {}.",
                    format_schedule(scheduled_at)
                )
            }
            Self::CheckinReminder { partner_name, scheduled_at, .. } => {
                format!(
                    "You have a check-in with {partner_name} scheduled for {}.",
                    format_schedule(scheduled_at)
                )
            }
            Self::CheckinCompleted { partner_name, .. } => {
                format!("{partner_name} marked your check-in as completed.")
            }
            Self::ProgressUpdate { user_name, goal_title, .. } => {
                format!("{user_name} added a progress update to their goal: {goal_title}")
            }
            Self::NewMessage { sender_name, message_preview, .. } => {
                format!("{sender_name}: {message_preview}")
            }
        }
    }

    pub fn related_entity_id(&self) -> Uuid {
        match self {
            Self::PartnershipRequest { partnership_id, .. }
            | Self::PartnershipAccepted { partnership_id, .. }
            | Self::PartnershipDeclined { partnership_id, .. }
            | Self::PartnershipEnded { partnership_id, .. } => *partnership_id,
            Self::GoalCreated { goal_id, .. }
            | Self::GoalUpdated { goal_id, .. }
            | Self::GoalCompleted { goal_id, .. } => *goal_id,
            Self::CheckinScheduled { checkin_id, .. }
            | Self::CheckinReminder { checkin_id, .. }
            | Self::CheckinCompleted { checkin_id, .. } => *checkin_id,
            Self::ProgressUpdate { progress_id, .. } => *progress_id,
            Self::NewMessage { message_id, .. } => *message_id,
        }
    }

    /// Variant fields without the `type` tag.
    pub fn data(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("type");
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn partnership_request_text() {
        let event = NotificationEvent::PartnershipRequest {
            sender_name: "Ada Lovelace".into(),
            partnership_id: Uuid::nil(),
        };
        assert_eq!(event.kind(), NotificationType::PartnershipRequest);
        assert_eq!(event.title(), "New Accountability Partnership Request");
        assert_eq!(
            event.message(),
            "Ada Lovelace has requested to be your accountability partner."
        );
        assert_eq!(event.data()["sender_name"], "Ada Lovelace");
        assert!(event.data().get("type").is_none());
    }

    #[test]
    fn long_messages_are_previewed() {
        let long = "x".repeat(60);
        let event = NotificationEvent::new_message("Bo", Uuid::nil(), Uuid::nil(), &long);
        let expected = format!("Bo: {}...", "x".repeat(47));
        assert_eq!(event.message(), expected);
        assert_eq!(event.title(), "New Message from Bo");

        let exact = "y".repeat(50);
        assert_eq!(message_preview(&exact), exact);
    }

    #[test]
    fn reminder_formats_schedule() {
        let at = Utc.with_ymd_and_hms(2026, 3, 5, 14, 30, 0).unwrap();
        let event = NotificationEvent::CheckinReminder {
            partner_name: "Sam".into(),
            checkin_id: Uuid::nil(),
            scheduled_at: at,
        };
        assert_eq!(
            event.message(),
            "You have a check-in with Sam scheduled for Thursday, March 05 at 02:30 PM."
        );
    }

    #[test]
    fn progress_points_at_the_update() {
        let progress_id = Uuid::new_v4();
        let event = NotificationEvent::ProgressUpdate {
            user_name: "Kim".into(),
            goal_id: Uuid::new_v4(),
            goal_title: "Read 12 books".into(),
            progress_id,
            progress_description: "finished book 3".into(),
        };
        assert_eq!(event.related_entity_id(), progress_id);
        assert_eq!(event.message(), "Kim added a progress update to their goal: Read 12 books");
    }

    #[test]
    fn type_names_parse_back() {
        assert_eq!(NotificationType::ALL.len(), 12);
        for &kind in NotificationType::ALL {
            assert_eq!(kind.as_str().parse::<NotificationType>().unwrap(), kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
        assert!("unknown".parse::<NotificationType>().is_err());
    }
}
