use accountable_types::models::{Goal, GoalStatus};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::{col_opt_ts, col_parse, col_ts, opt_ts, ts};
use crate::Database;

const GOAL_COLUMNS: &str = "id, user_id, partnership_id, title, description, status, start_date, \
     target_date, created_at, updated_at";

fn map_goal(row: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: col_parse(row, 0)?,
        user_id: col_parse(row, 1)?,
        partnership_id: col_parse(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: col_parse(row, 5)?,
        start_date: col_ts(row, 6)?,
        target_date: col_opt_ts(row, 7)?,
        created_at: col_ts(row, 8)?,
        updated_at: col_ts(row, 9)?,
    })
}

impl Database {
    // -- Goals --

    pub fn insert_goal(&self, goal: &Goal) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO goals (id, user_id, partnership_id, title, description, status,
                                    start_date, target_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    goal.id.to_string(),
                    goal.user_id.to_string(),
                    goal.partnership_id.to_string(),
                    goal.title,
                    goal.description,
                    goal.status.as_str(),
                    ts(&goal.start_date),
                    opt_ts(&goal.target_date),
                    ts(&goal.created_at),
                    ts(&goal.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_goal(&self, id: Uuid) -> Result<Option<Goal>> {
        self.with_conn(|conn| {
            let goal = conn
                .query_row(
                    &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"),
                    [id.to_string()],
                    map_goal,
                )
                .optional()?;
            Ok(goal)
        })
    }

    /// Write back the mutable fields. Returns `false` if the goal is gone.
    pub fn update_goal(&self, goal: &Goal) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE goals
                 SET title = ?2, description = ?3, status = ?4, target_date = ?5, updated_at = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    goal.id.to_string(),
                    goal.title,
                    goal.description,
                    goal.status.as_str(),
                    opt_ts(&goal.target_date),
                    ts(&goal.updated_at),
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn list_goals_for_user(&self, user_id: Uuid, status: Option<GoalStatus>) -> Result<Vec<Goal>> {
        self.list_goals_where("user_id = ?1", user_id, status)
    }

    pub fn list_goals_for_partnership(
        &self,
        partnership_id: Uuid,
        status: Option<GoalStatus>,
    ) -> Result<Vec<Goal>> {
        self.list_goals_where("partnership_id = ?1", partnership_id, status)
    }

    /// Goals owned by `user_id` inside one partnership.
    pub fn list_goals_for_user_in_partnership(
        &self,
        user_id: Uuid,
        partnership_id: Uuid,
        status: Option<GoalStatus>,
    ) -> Result<Vec<Goal>> {
        Ok(self
            .list_goals_for_partnership(partnership_id, status)?
            .into_iter()
            .filter(|g| g.user_id == user_id)
            .collect())
    }

    fn list_goals_where(&self, filter: &str, id: Uuid, status: Option<GoalStatus>) -> Result<Vec<Goal>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {GOAL_COLUMNS} FROM goals
                 WHERE {filter} AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![id.to_string(), status.map(|s| s.as_str())],
                    map_goal,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
