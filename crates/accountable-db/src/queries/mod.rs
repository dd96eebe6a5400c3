//! `impl Database` blocks, one module per table family, plus the column
//! codecs they share. Timestamps are stored as fixed-width RFC 3339 text
//! (microseconds, `Z`) so SQL string comparison orders them correctly.

mod checkins;
mod goals;
mod identities;
mod invitations;
mod messages;
mod notifications;
mod partnerships;
mod progress;
mod users;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

pub(crate) fn ts(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

pub(crate) fn opt_ts(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(ts)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Parse a TEXT column into any `FromStr` type (ids, status enums).
pub(crate) fn col_parse<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn col_opt_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn col_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn col_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Decode a JSON TEXT column.
pub(crate) fn col_json<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use accountable_types::models::{Partnership, PartnershipStatus, User};
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use crate::Database;
    use crate::models::{NewPartnershipRequest, RequestOutcome};

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, email: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: email.split('@').next().unwrap_or("user").to_string(),
            last_name: "Tester".into(),
            time_zone: "UTC".into(),
            avatar_url: None,
            bio: None,
            created_at: now,
            updated_at: now,
        };
        db.insert_user(&user).unwrap();
        user
    }

    pub fn partnership_between(db: &Database, one: &User, two: &User, status: PartnershipStatus) -> Partnership {
        let now = Utc::now();
        let partnership = Partnership {
            id: Uuid::new_v4(),
            user_one: one.id,
            user_two: two.id,
            status,
            trial_end_date: None,
            is_user_exists: true,
            created_at: now,
            updated_at: now,
        };
        match db
            .create_partnership_request(NewPartnershipRequest {
                partnership,
                agreement: None,
                note: None,
            })
            .unwrap()
        {
            RequestOutcome::Created(p) => p,
            RequestOutcome::AlreadyPaired => panic!("fixture pair already exists"),
        }
    }

    pub fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }
}
