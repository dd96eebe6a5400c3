use accountable_types::lifecycle::Transition;
use accountable_types::models::{
    AgreementTerms, Message, Partnership, PartnershipAgreement, PartnershipStatus,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::invitations::expire_invitations_for_partnership;
use super::{col_opt_ts, col_parse, col_ts, opt_ts, ts};
use crate::Database;
use crate::models::{NewPartnershipRequest, RequestOutcome};

pub(crate) const PARTNERSHIP_COLUMNS: &str =
    "id, user_one, user_two, status, trial_end_date, is_user_exists, created_at, updated_at";

pub(crate) fn map_partnership(row: &Row<'_>) -> rusqlite::Result<Partnership> {
    Ok(Partnership {
        id: col_parse(row, 0)?,
        user_one: col_parse(row, 1)?,
        user_two: col_parse(row, 2)?,
        status: col_parse(row, 3)?,
        trial_end_date: col_opt_ts(row, 4)?,
        is_user_exists: row.get(5)?,
        created_at: col_ts(row, 6)?,
        updated_at: col_ts(row, 7)?,
    })
}

const AGREEMENT_COLUMNS: &str = "id, partnership_id, communication_frequency, check_in_days, expectations, \
     commitment_level, feedback_style, created_by, updated_by, created_at, updated_at";

fn map_agreement(row: &Row<'_>) -> rusqlite::Result<PartnershipAgreement> {
    let days: String = row.get(3)?;
    let check_in_days = serde_json::from_str(&days).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(PartnershipAgreement {
        id: col_parse(row, 0)?,
        partnership_id: col_parse(row, 1)?,
        terms: AgreementTerms {
            communication_frequency: row.get(2)?,
            check_in_days,
            expectations: row.get(4)?,
            commitment_level: row.get(5)?,
            feedback_style: row.get(6)?,
        },
        created_by: col_parse(row, 7)?,
        updated_by: col_parse(row, 8)?,
        created_at: col_ts(row, 9)?,
        updated_at: col_ts(row, 10)?,
    })
}

impl Database {
    // -- Partnerships --

    /// Insert a pending request unless a non-ended partnership already pairs
    /// the two users in either order. The check, the partnership, its
    /// agreement and its invitation note share one transaction.
    pub fn create_partnership_request(&self, req: NewPartnershipRequest) -> Result<RequestOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let p = &req.partnership;
            if find_open_pair(&tx, p.user_one, p.user_two)?.is_some() {
                return Ok(RequestOutcome::AlreadyPaired);
            }

            insert_partnership(&tx, p)?;
            if let Some(terms) = &req.agreement {
                upsert_agreement_in(&tx, p.id, terms, p.user_one, p.created_at)?;
            }
            if let Some(note) = &req.note {
                insert_message_in(&tx, note)?;
            }

            tx.commit()?;
            Ok(RequestOutcome::Created(req.partnership))
        })
    }

    pub fn get_partnership(&self, id: Uuid) -> Result<Option<Partnership>> {
        self.with_conn(|conn| query_partnership(conn, id))
    }

    /// The partnership, only if `user_id` is one of its members. Absence and
    /// non-membership are indistinguishable to the caller.
    pub fn get_partnership_for_member(&self, id: Uuid, user_id: Uuid) -> Result<Option<Partnership>> {
        Ok(self
            .get_partnership(id)?
            .filter(|p| p.is_member(user_id)))
    }

    pub fn list_partnerships_for_user(
        &self,
        user_id: Uuid,
        status: Option<PartnershipStatus>,
    ) -> Result<Vec<Partnership>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PARTNERSHIP_COLUMNS} FROM partnerships
                 WHERE (user_one = ?1 OR user_two = ?1)
                   AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id.to_string(), status.map(|s| s.as_str())],
                    map_partnership,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn partnership_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM partnerships WHERE user_one = ?1 OR user_two = ?1")?;
            let ids = stmt
                .query_map([user_id.to_string()], |row| col_parse(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Compare-and-set a lifecycle transition. Returns the updated row, or
    /// `None` when the status moved since `transition` was planned.
    pub fn apply_transition(
        &self,
        id: Uuid,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> Result<Option<Partnership>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(
                "UPDATE partnerships
                 SET status = ?2, trial_end_date = ?3, updated_at = ?4
                 WHERE id = ?1 AND status = ?5",
                rusqlite::params![
                    id.to_string(),
                    transition.to.as_str(),
                    opt_ts(&transition.trial_end_date),
                    ts(&now),
                    transition.from.as_str(),
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            if transition.to == PartnershipStatus::Ended {
                expire_invitations_for_partnership(&tx, id, now)?;
            }
            let updated = query_partnership(&tx, id)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    /// Write back status and trial end date, guarded on the status the
    /// caller read. Returns `false` if the row changed underneath.
    pub fn update_partnership(&self, p: &Partnership, expected: PartnershipStatus) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(
                "UPDATE partnerships
                 SET status = ?2, trial_end_date = ?3, updated_at = ?4
                 WHERE id = ?1 AND status = ?5",
                rusqlite::params![
                    p.id.to_string(),
                    p.status.as_str(),
                    opt_ts(&p.trial_end_date),
                    ts(&p.updated_at),
                    expected.as_str(),
                ],
            )?;
            if n == 0 {
                return Ok(false);
            }
            if p.status == PartnershipStatus::Ended && expected != PartnershipStatus::Ended {
                expire_invitations_for_partnership(&tx, p.id, p.updated_at)?;
            }
            tx.commit()?;
            Ok(true)
        })
    }

    // -- Agreements --

    /// Create-or-replace keyed by partnership. `created_by` is kept from the
    /// first write; `updated_by` follows every write.
    pub fn upsert_agreement(
        &self,
        partnership_id: Uuid,
        terms: &AgreementTerms,
        by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PartnershipAgreement> {
        self.with_conn(|conn| {
            upsert_agreement_in(conn, partnership_id, terms, by, now)?;
            query_agreement(conn, partnership_id)?
                .context("agreement missing after upsert")
        })
    }

    pub fn get_agreement(&self, partnership_id: Uuid) -> Result<Option<PartnershipAgreement>> {
        self.with_conn(|conn| query_agreement(conn, partnership_id))
    }
}

pub(crate) fn insert_partnership(conn: &Connection, p: &Partnership) -> Result<()> {
    conn.execute(
        "INSERT INTO partnerships (id, user_one, user_two, status, trial_end_date, is_user_exists, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            p.id.to_string(),
            p.user_one.to_string(),
            p.user_two.to_string(),
            p.status.as_str(),
            opt_ts(&p.trial_end_date),
            p.is_user_exists,
            ts(&p.created_at),
            ts(&p.updated_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn query_partnership(conn: &Connection, id: Uuid) -> Result<Option<Partnership>> {
    let p = conn
        .query_row(
            &format!("SELECT {PARTNERSHIP_COLUMNS} FROM partnerships WHERE id = ?1"),
            [id.to_string()],
            map_partnership,
        )
        .optional()?;
    Ok(p)
}

fn find_open_pair(conn: &Connection, a: Uuid, b: Uuid) -> Result<Option<Uuid>> {
    let id = conn
        .query_row(
            "SELECT id FROM partnerships
             WHERE ((user_one = ?1 AND user_two = ?2) OR (user_one = ?2 AND user_two = ?1))
               AND status != 'ended'
             LIMIT 1",
            [a.to_string(), b.to_string()],
            |row| col_parse(row, 0),
        )
        .optional()?;
    Ok(id)
}

pub(crate) fn upsert_agreement_in(
    conn: &Connection,
    partnership_id: Uuid,
    terms: &AgreementTerms,
    by: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO partnership_agreements
            (id, partnership_id, communication_frequency, check_in_days, expectations,
             commitment_level, feedback_style, created_by, updated_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?9)
         ON CONFLICT(partnership_id) DO UPDATE SET
            communication_frequency = excluded.communication_frequency,
            check_in_days = excluded.check_in_days,
            expectations = excluded.expectations,
            commitment_level = excluded.commitment_level,
            feedback_style = excluded.feedback_style,
            updated_by = excluded.updated_by,
            updated_at = excluded.updated_at",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            partnership_id.to_string(),
            terms.communication_frequency,
            serde_json::to_string(&terms.check_in_days)?,
            terms.expectations,
            terms.commitment_level,
            terms.feedback_style,
            by.to_string(),
            ts(&now),
        ],
    )?;
    Ok(())
}

fn query_agreement(conn: &Connection, partnership_id: Uuid) -> Result<Option<PartnershipAgreement>> {
    let a = conn
        .query_row(
            &format!("SELECT {AGREEMENT_COLUMNS} FROM partnership_agreements WHERE partnership_id = ?1"),
            [partnership_id.to_string()],
            map_agreement,
        )
        .optional()?;
    Ok(a)
}

pub(crate) fn insert_message_in(conn: &Connection, m: &Message) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, partnership_id, sender_id, content, kind, read_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            m.id.to_string(),
            m.partnership_id.to_string(),
            m.sender_id.to_string(),
            m.content,
            m.kind.as_str(),
            opt_ts(&m.read_at),
            ts(&m.created_at),
        ],
    )?;
    Ok(())
}
