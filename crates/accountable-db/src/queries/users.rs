use accountable_types::models::User;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use super::{col_parse, col_ts, ts};
use crate::Database;

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, time_zone, avatar_url, bio, created_at, updated_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: col_parse(row, 0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        time_zone: row.get(4)?,
        avatar_url: row.get(5)?,
        bio: row.get(6)?,
        created_at: col_ts(row, 7)?,
        updated_at: col_ts(row, 8)?,
    })
}

impl Database {
    // -- Users --

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, first_name, last_name, time_zone, avatar_url, bio, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    user.first_name,
                    user.last_name,
                    user.time_zone,
                    user.avatar_url,
                    user.bio,
                    ts(&user.created_at),
                    ts(&user.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    [id.to_string()],
                    map_user,
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                    [email],
                    map_user,
                )
                .optional()?;
            Ok(user)
        })
    }

    /// Write back every mutable profile field.
    pub fn update_user(&self, user: &User) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users
                 SET first_name = ?2, last_name = ?3, time_zone = ?4, avatar_url = ?5, bio = ?6, updated_at = ?7
                 WHERE id = ?1",
                rusqlite::params![
                    user.id.to_string(),
                    user.first_name,
                    user.last_name,
                    user.time_zone,
                    user.avatar_url,
                    user.bio,
                    ts(&user.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Case-insensitive email substring search, excluding `exclude`.
    pub fn search_users_by_email(&self, fragment: &str, exclude: Uuid, limit: u32) -> Result<Vec<User>> {
        let pattern = format!("%{}%", escape_like(fragment));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE email LIKE ?1 ESCAPE '\\' AND id != ?2
                 ORDER BY email
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![pattern, exclude.to_string(), limit], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::queries::fixtures;

    #[test]
    fn search_matches_substring_and_skips_caller() {
        let db = fixtures::db();
        let me = fixtures::user(&db, "me@example.com");
        let _other = fixtures::user(&db, "Partner@Example.com");
        let _unrelated = fixtures::user(&db, "someone@elsewhere.org");

        let found = db.search_users_by_email("example", me.id, 20).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "Partner@Example.com");

        // Wildcards in the query are literal.
        assert!(db.search_users_by_email("%", me.id, 20).unwrap().is_empty());
    }

    #[test]
    fn update_user_persists_profile_fields() {
        let db = fixtures::db();
        let mut user = fixtures::user(&db, "ada@example.com");
        user.bio = Some("Runner".into());
        user.time_zone = "Europe/London".into();
        db.update_user(&user).unwrap();

        let stored = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.bio.as_deref(), Some("Runner"));
        assert_eq!(stored.time_zone, "Europe/London");
    }
}
