use accountable_types::models::CheckIn;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{col_opt_ts, col_parse, col_ts, opt_ts, ts};
use crate::Database;

const CHECKIN_COLUMNS: &str = "id, partnership_id, scheduled_at, notes, completed_at, created_at, updated_at";

fn map_checkin(row: &Row<'_>) -> rusqlite::Result<CheckIn> {
    Ok(CheckIn {
        id: col_parse(row, 0)?,
        partnership_id: col_parse(row, 1)?,
        scheduled_at: col_ts(row, 2)?,
        notes: row.get(3)?,
        completed_at: col_opt_ts(row, 4)?,
        created_at: col_ts(row, 5)?,
        updated_at: col_ts(row, 6)?,
    })
}

fn query_checkin(conn: &Connection, id: Uuid) -> Result<Option<CheckIn>> {
    let c = conn
        .query_row(
            &format!("SELECT {CHECKIN_COLUMNS} FROM check_ins WHERE id = ?1"),
            [id.to_string()],
            map_checkin,
        )
        .optional()?;
    Ok(c)
}

impl Database {
    // -- Check-ins --

    pub fn insert_checkin(&self, checkin: &CheckIn) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO check_ins (id, partnership_id, scheduled_at, notes, completed_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    checkin.id.to_string(),
                    checkin.partnership_id.to_string(),
                    ts(&checkin.scheduled_at),
                    checkin.notes,
                    opt_ts(&checkin.completed_at),
                    ts(&checkin.created_at),
                    ts(&checkin.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_checkin(&self, id: Uuid) -> Result<Option<CheckIn>> {
        self.with_conn(|conn| query_checkin(conn, id))
    }

    /// Reschedule or replace notes. Never touches `completed_at`.
    pub fn update_checkin(&self, checkin: &CheckIn) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE check_ins SET scheduled_at = ?2, notes = ?3, updated_at = ?4 WHERE id = ?1",
                rusqlite::params![
                    checkin.id.to_string(),
                    ts(&checkin.scheduled_at),
                    checkin.notes,
                    ts(&checkin.updated_at),
                ],
            )?;
            Ok(n > 0)
        })
    }

    /// Set `completed_at` once. Returns `None` if the check-in is missing or
    /// was already completed.
    pub fn complete_checkin(
        &self,
        id: Uuid,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<CheckIn>> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE check_ins SET completed_at = ?2, notes = ?3, updated_at = ?2
                 WHERE id = ?1 AND completed_at IS NULL",
                rusqlite::params![id.to_string(), ts(&now), notes],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_checkin(conn, id)
        })
    }

    /// Check-ins across the given partnerships, soonest first.
    pub fn list_checkins(&self, partnership_ids: &[Uuid], completed: Option<bool>) -> Result<Vec<CheckIn>> {
        if partnership_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; partnership_ids.len()].join(", ");
        let completion = match completed {
            Some(true) => " AND completed_at IS NOT NULL",
            Some(false) => " AND completed_at IS NULL",
            None => "",
        };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHECKIN_COLUMNS} FROM check_ins
                 WHERE partnership_id IN ({placeholders}){completion}
                 ORDER BY scheduled_at ASC"
            ))?;
            let ids: Vec<String> = partnership_ids.iter().map(Uuid::to_string).collect();
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), map_checkin)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
