use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use super::{col_parse, col_ts, ts};
use crate::Database;
use crate::models::IdentityRow;

impl Database {
    // -- Identity provider --

    /// Returns `false` when the email already has an identity.
    pub fn create_identity(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO auth_identities (id, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (id.to_string(), email, password_hash, ts(&now)),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_identity_by_email(&self, email: &str) -> Result<Option<IdentityRow>> {
        self.with_conn(|conn| query_identity_by_email(conn, email))
    }

    /// Compensating delete for a registration whose profile insert failed.
    pub fn delete_identity(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM auth_identities WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    /// Remove identities with no profile row: the residue of a registration
    /// that died between its two steps. Returns how many were removed.
    pub fn purge_orphaned_identities(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM auth_identities
                 WHERE id NOT IN (SELECT id FROM users)",
                [],
            )?;
            Ok(n)
        })
    }
}

fn query_identity_by_email(conn: &Connection, email: &str) -> Result<Option<IdentityRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, password_hash, created_at FROM auth_identities WHERE email = ?1",
    )?;

    let row = stmt
        .query_row([email], |row| {
            Ok(IdentityRow {
                id: col_parse(row, 0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: col_ts(row, 3)?,
            })
        })
        .optional()?;

    Ok(row)
}
