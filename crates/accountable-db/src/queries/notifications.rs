use accountable_types::notifications::Notification;
use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use super::{col_json, col_opt_uuid, col_parse, col_ts, ts};
use crate::Database;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, type, title, message, related_entity_id, data, read, created_at";

fn map_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: col_parse(row, 0)?,
        user_id: col_parse(row, 1)?,
        kind: col_parse(row, 2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        related_entity_id: col_opt_uuid(row, 5)?,
        data: col_json(row, 6)?,
        read: row.get(7)?,
        created_at: col_ts(row, 8)?,
    })
}

impl Database {
    // -- Notifications --

    pub fn insert_notification(&self, n: &Notification) -> Result<()> {
        let data = n.data.as_ref().map(serde_json::to_string).transpose()?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications
                    (id, user_id, type, title, message, related_entity_id, data, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    n.id.to_string(),
                    n.user_id.to_string(),
                    n.kind.as_str(),
                    n.title,
                    n.message,
                    n.related_entity_id.map(|id| id.to_string()),
                    data,
                    n.read,
                    ts(&n.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Newest first.
    pub fn list_notifications(&self, user_id: Uuid, limit: u32, unread_only: bool) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id.to_string(), unread_only, limit],
                    map_notification,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Scoped to the owner; a foreign or unknown id changes nothing.
    pub fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                [id.to_string(), user_id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id.to_string()],
            )?;
            Ok(n)
        })
    }

    pub fn count_unread_notifications(&self, user_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use accountable_types::notifications::{Notification, NotificationEvent};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::Database;
    use crate::queries::fixtures;

    fn notify(db: &Database, user_id: Uuid, minutes_ago: i64) -> Notification {
        let event = NotificationEvent::PartnershipRequest {
            sender_name: "Ada Lovelace".into(),
            partnership_id: Uuid::new_v4(),
        };
        let n = Notification::for_event(user_id, &event, Utc::now() - Duration::minutes(minutes_ago));
        db.insert_notification(&n).unwrap();
        n
    }

    #[test]
    fn read_state_is_scoped_to_the_owner() {
        let db = fixtures::db();
        let a = fixtures::user(&db, "a@example.com");
        let b = fixtures::user(&db, "b@example.com");

        let older = notify(&db, a.id, 10);
        let newer = notify(&db, a.id, 1);
        notify(&db, b.id, 1);

        let listed = db.list_notifications(a.id, 20, false).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[0].data, newer.data);

        // Someone else's id changes nothing.
        assert!(!db.mark_notification_read(older.id, b.id).unwrap());
        assert_eq!(db.count_unread_notifications(a.id).unwrap(), 2);

        assert!(db.mark_notification_read(older.id, a.id).unwrap());
        let unread = db.list_notifications(a.id, 20, true).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, newer.id);

        assert_eq!(db.mark_all_notifications_read(a.id).unwrap(), 1);
        assert_eq!(db.count_unread_notifications(a.id).unwrap(), 0);
        assert_eq!(db.count_unread_notifications(b.id).unwrap(), 1);
    }

    #[test]
    fn limit_caps_the_page() {
        let db = fixtures::db();
        let a = fixtures::user(&db, "a@example.com");
        for i in 0..5 {
            notify(&db, a.id, i);
        }
        assert_eq!(db.list_notifications(a.id, 3, false).unwrap().len(), 3);
    }
}
