use accountable_types::models::ProgressUpdate;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::{col_parse, col_ts, ts};
use crate::Database;

const PROGRESS_COLUMNS: &str = "id, goal_id, user_id, description, progress_value, created_at";

fn map_progress(row: &Row<'_>) -> rusqlite::Result<ProgressUpdate> {
    Ok(ProgressUpdate {
        id: col_parse(row, 0)?,
        goal_id: col_parse(row, 1)?,
        user_id: col_parse(row, 2)?,
        description: row.get(3)?,
        progress_value: row.get(4)?,
        created_at: col_ts(row, 5)?,
    })
}

impl Database {
    // -- Progress updates --

    pub fn insert_progress(&self, update: &ProgressUpdate) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO progress_updates (id, goal_id, user_id, description, progress_value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    update.id.to_string(),
                    update.goal_id.to_string(),
                    update.user_id.to_string(),
                    update.description,
                    update.progress_value,
                    ts(&update.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_progress(&self, id: Uuid) -> Result<Option<ProgressUpdate>> {
        self.with_conn(|conn| {
            let update = conn
                .query_row(
                    &format!("SELECT {PROGRESS_COLUMNS} FROM progress_updates WHERE id = ?1"),
                    [id.to_string()],
                    map_progress,
                )
                .optional()?;
            Ok(update)
        })
    }

    pub fn list_progress_for_goal(&self, goal_id: Uuid, newest_first: bool) -> Result<Vec<ProgressUpdate>> {
        let order = if newest_first { "DESC" } else { "ASC" };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROGRESS_COLUMNS} FROM progress_updates
                 WHERE goal_id = ?1
                 ORDER BY created_at {order}, rowid {order}"
            ))?;
            let rows = stmt
                .query_map([goal_id.to_string()], map_progress)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_progress(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM progress_updates WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use accountable_types::models::{Goal, GoalStatus, PartnershipStatus, ProgressUpdate};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::queries::fixtures;

    #[test]
    fn progress_lists_in_both_orders_and_deletes() {
        let db = fixtures::db();
        let a = fixtures::user(&db, "a@example.com");
        let b = fixtures::user(&db, "b@example.com");
        let p = fixtures::partnership_between(&db, &a, &b, PartnershipStatus::Active);
        let now = Utc::now();
        let goal = Goal {
            id: Uuid::new_v4(),
            user_id: a.id,
            partnership_id: p.id,
            title: "Write a novel".into(),
            description: None,
            status: GoalStatus::Active,
            start_date: now,
            target_date: None,
            created_at: now,
            updated_at: now,
        };
        db.insert_goal(&goal).unwrap();

        let updates: Vec<ProgressUpdate> = (0..3i32)
            .map(|i| {
                let u = ProgressUpdate {
                    id: Uuid::new_v4(),
                    goal_id: goal.id,
                    user_id: a.id,
                    description: format!("chapter {i}"),
                    progress_value: Some(f64::from(i) * 10.0),
                    created_at: now + Duration::minutes(i.into()),
                };
                db.insert_progress(&u).unwrap();
                u
            })
            .collect();

        let newest = db.list_progress_for_goal(goal.id, true).unwrap();
        assert_eq!(newest[0].description, "chapter 2");
        let oldest = db.list_progress_for_goal(goal.id, false).unwrap();
        assert_eq!(oldest[0].description, "chapter 0");
        assert_eq!(oldest[1].progress_value, Some(10.0));

        assert!(db.delete_progress(updates[1].id).unwrap());
        assert!(!db.delete_progress(updates[1].id).unwrap());
        assert!(db.get_progress(updates[1].id).unwrap().is_none());
        assert_eq!(db.list_progress_for_goal(goal.id, true).unwrap().len(), 2);
    }
}
