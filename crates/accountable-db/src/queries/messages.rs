use accountable_types::models::{Message, MessageReadWatermark};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::partnerships::insert_message_in;
use super::{col_opt_ts, col_parse, col_ts, ts};
use crate::Database;

/// Upper bound on one history page regardless of the requested limit.
pub const MAX_PAGE: u32 = 200;

const MESSAGE_COLUMNS: &str = "id, partnership_id, sender_id, content, kind, read_at, created_at";

fn map_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: col_parse(row, 0)?,
        partnership_id: col_parse(row, 1)?,
        sender_id: col_parse(row, 2)?,
        content: row.get(3)?,
        kind: col_parse(row, 4)?,
        read_at: col_opt_ts(row, 5)?,
        created_at: col_ts(row, 6)?,
    })
}

impl Database {
    // -- Messages --

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.with_conn(|conn| insert_message_in(conn, message))
    }

    /// One page of history, oldest first. With `before_id`, only messages
    /// strictly older than that message are returned; a cursor that does not
    /// belong to the partnership is ignored.
    pub fn list_messages(
        &self,
        partnership_id: Uuid,
        limit: u32,
        before_id: Option<Uuid>,
    ) -> Result<Vec<Message>> {
        let limit = limit.clamp(1, MAX_PAGE);
        self.with_conn(|conn| {
            let cursor: Option<(String, i64)> = match before_id {
                Some(id) => conn
                    .query_row(
                        "SELECT created_at, rowid FROM messages WHERE id = ?1 AND partnership_id = ?2",
                        [id.to_string(), partnership_id.to_string()],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?,
                None => None,
            };

            let mut rows = match cursor {
                Some((created_at, rowid)) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE partnership_id = ?1
                           AND (created_at < ?2 OR (created_at = ?2 AND rowid < ?3))
                         ORDER BY created_at DESC, rowid DESC
                         LIMIT ?4"
                    ))?;
                    stmt.query_map(
                        rusqlite::params![partnership_id.to_string(), created_at, rowid, limit],
                        map_message,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {MESSAGE_COLUMNS} FROM messages
                         WHERE partnership_id = ?1
                         ORDER BY created_at DESC, rowid DESC
                         LIMIT ?2"
                    ))?;
                    stmt.query_map(rusqlite::params![partnership_id.to_string(), limit], map_message)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
            };

            rows.reverse();
            Ok(rows)
        })
    }

    /// Messages from the partner newer than the caller's watermark, or all of
    /// the partner's messages if the caller never marked the conversation read.
    pub fn count_unread_messages(&self, partnership_id: Uuid, user_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 LEFT JOIN message_reads r
                   ON r.partnership_id = m.partnership_id AND r.user_id = ?2
                 WHERE m.partnership_id = ?1
                   AND m.sender_id != ?2
                   AND (r.last_read_at IS NULL OR m.created_at > r.last_read_at)",
                [partnership_id.to_string(), user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Move the caller's watermark to `now`, creating it on first use.
    pub fn mark_messages_read(
        &self,
        user_id: Uuid,
        partnership_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MessageReadWatermark> {
        self.with_conn(|conn| {
            let args = [user_id.to_string(), partnership_id.to_string(), ts(&now)];
            let updated = conn.execute(
                "UPDATE message_reads SET last_read_at = ?3 WHERE user_id = ?1 AND partnership_id = ?2",
                args.clone(),
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO message_reads (user_id, partnership_id, last_read_at) VALUES (?1, ?2, ?3)",
                    args,
                )?;
            }
            Ok(MessageReadWatermark {
                user_id,
                partnership_id,
                last_read_at: now,
            })
        })
    }

    #[cfg(test)]
    pub(crate) fn get_read_watermark(
        &self,
        user_id: Uuid,
        partnership_id: Uuid,
    ) -> Result<Option<MessageReadWatermark>> {
        self.with_conn(|conn| {
            let mark = conn
                .query_row(
                    "SELECT user_id, partnership_id, last_read_at FROM message_reads
                     WHERE user_id = ?1 AND partnership_id = ?2",
                    [user_id.to_string(), partnership_id.to_string()],
                    |row| {
                        Ok(MessageReadWatermark {
                            user_id: col_parse(row, 0)?,
                            partnership_id: col_parse(row, 1)?,
                            last_read_at: col_ts(row, 2)?,
                        })
                    },
                )
                .optional()?;
            Ok(mark)
        })
    }
}

#[cfg(test)]
mod tests {
    use accountable_types::models::{Message, MessageKind, PartnershipStatus};
    use chrono::{DateTime, Duration, Utc};
    use uuid::Uuid;

    use crate::Database;
    use crate::queries::fixtures;

    fn post(db: &Database, partnership_id: Uuid, sender_id: Uuid, content: &str, at: DateTime<Utc>) -> Message {
        let m = Message {
            id: Uuid::new_v4(),
            partnership_id,
            sender_id,
            content: content.into(),
            kind: MessageKind::Text,
            read_at: None,
            created_at: at,
        };
        db.insert_message(&m).unwrap();
        m
    }

    #[test]
    fn pages_walk_backwards_in_chronological_order() {
        let db = fixtures::db();
        let a = fixtures::user(&db, "a@example.com");
        let b = fixtures::user(&db, "b@example.com");
        let p = fixtures::partnership_between(&db, &a, &b, PartnershipStatus::Active);

        let start = fixtures::at("2026-03-01T09:00:00Z");
        let sent: Vec<Message> = (0..5)
            .map(|i| post(&db, p.id, a.id, &format!("m{i}"), start + Duration::minutes(i)))
            .collect();

        let latest = db.list_messages(p.id, 2, None).unwrap();
        let contents: Vec<_> = latest.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);

        let older = db.list_messages(p.id, 2, Some(latest[0].id)).unwrap();
        let contents: Vec<_> = older.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m1", "m2"]);

        // A cursor from elsewhere is ignored.
        let all = db.list_messages(p.id, 50, Some(Uuid::new_v4())).unwrap();
        assert_eq!(all.len(), sent.len());
    }

    #[test]
    fn same_instant_messages_keep_insertion_order() {
        let db = fixtures::db();
        let a = fixtures::user(&db, "a@example.com");
        let b = fixtures::user(&db, "b@example.com");
        let p = fixtures::partnership_between(&db, &a, &b, PartnershipStatus::Active);

        let at = fixtures::at("2026-03-01T09:00:00Z");
        post(&db, p.id, a.id, "first", at);
        let second = post(&db, p.id, b.id, "second", at);
        post(&db, p.id, a.id, "third", at);

        let before_second = db.list_messages(p.id, 10, Some(second.id)).unwrap();
        assert_eq!(before_second.len(), 1);
        assert_eq!(before_second[0].content, "first");
    }

    #[test]
    fn unread_count_follows_the_watermark() {
        let db = fixtures::db();
        let a = fixtures::user(&db, "a@example.com");
        let b = fixtures::user(&db, "b@example.com");
        let p = fixtures::partnership_between(&db, &a, &b, PartnershipStatus::Active);

        let t0 = Utc::now() - Duration::hours(1);
        post(&db, p.id, a.id, "hi", t0);
        post(&db, p.id, a.id, "you there?", t0 + Duration::minutes(1));
        post(&db, p.id, b.id, "yes", t0 + Duration::minutes(2));

        // Own messages never count.
        assert_eq!(db.count_unread_messages(p.id, b.id).unwrap(), 2);
        assert_eq!(db.count_unread_messages(p.id, a.id).unwrap(), 1);

        db.mark_messages_read(b.id, p.id, Utc::now()).unwrap();
        assert_eq!(db.count_unread_messages(p.id, b.id).unwrap(), 0);

        post(&db, p.id, a.id, "new", Utc::now() + Duration::seconds(1));
        assert_eq!(db.count_unread_messages(p.id, b.id).unwrap(), 1);

        // A second mark moves the existing watermark.
        let later = Utc::now() + Duration::minutes(5);
        db.mark_messages_read(b.id, p.id, later).unwrap();
        let mark = db.get_read_watermark(b.id, p.id).unwrap().unwrap();
        assert_eq!(mark.last_read_at.timestamp_micros(), later.timestamp_micros());
        assert_eq!(db.count_unread_messages(p.id, b.id).unwrap(), 0);
    }
}
