use accountable_types::models::{
    InvitationStatus, Message, MessageKind, PartnershipStatus, PendingInvitation,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::partnerships::{insert_message_in, insert_partnership, query_partnership, upsert_agreement_in};
use super::{col_json, col_opt_uuid, col_parse, col_ts, ts};
use crate::Database;
use crate::models::{NewInvitation, Redemption};

const INVITATION_COLUMNS: &str = "id, email, inviter_id, partnership_id, invitation_token, status, \
     agreement, message, expires_at, created_at, updated_at";

fn map_invitation(row: &Row<'_>) -> rusqlite::Result<PendingInvitation> {
    Ok(PendingInvitation {
        id: col_parse(row, 0)?,
        email: row.get(1)?,
        inviter_id: col_parse(row, 2)?,
        partnership_id: col_opt_uuid(row, 3)?,
        invitation_token: row.get(4)?,
        status: col_parse(row, 5)?,
        agreement: col_json(row, 6)?,
        message: row.get(7)?,
        expires_at: col_ts(row, 8)?,
        created_at: col_ts(row, 9)?,
        updated_at: col_ts(row, 10)?,
    })
}

impl Database {
    // -- Invitations --

    /// Persist an invitation together with its placeholder partnership.
    pub fn create_invitation(&self, new: &NewInvitation) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_partnership(&tx, &new.placeholder)?;

            let inv = &new.invitation;
            let agreement = inv
                .agreement
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            tx.execute(
                "INSERT INTO pending_invitations
                    (id, email, inviter_id, partnership_id, invitation_token, status,
                     agreement, message, expires_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    inv.id.to_string(),
                    inv.email,
                    inv.inviter_id.to_string(),
                    inv.partnership_id.map(|id| id.to_string()),
                    inv.invitation_token,
                    inv.status.as_str(),
                    agreement,
                    inv.message,
                    ts(&inv.expires_at),
                    ts(&inv.created_at),
                    ts(&inv.updated_at),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    /// Only invitations still in `pending` are found.
    pub fn get_pending_invitation_by_token(&self, token: &str) -> Result<Option<PendingInvitation>> {
        self.with_conn(|conn| query_pending_invitation(conn, token))
    }

    pub fn expire_invitation(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE pending_invitations SET status = 'expired', updated_at = ?2 WHERE id = ?1",
                [id.to_string(), ts(&now)],
            )?;
            Ok(())
        })
    }

    pub fn list_invitations_by_inviter(&self, inviter_id: Uuid) -> Result<Vec<PendingInvitation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INVITATION_COLUMNS} FROM pending_invitations
                 WHERE inviter_id = ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([inviter_id.to_string()], map_invitation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Link a newly registered user to the placeholder partnership of a
    /// pending invitation: mark the invitation accepted, rebind `user_two`,
    /// move the partnership to trial with no end date, copy the agreement
    /// payload and post the invitation note from the inviter. All or nothing.
    ///
    /// Returns `None` when the token no longer names a pending invitation
    /// with a placeholder to bind.
    pub fn redeem_invitation(
        &self,
        token: &str,
        new_user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Redemption>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(inv) = query_pending_invitation(&tx, token)? else {
                return Ok(None);
            };
            let Some(partnership_id) = inv.partnership_id else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE pending_invitations SET status = ?2, updated_at = ?3 WHERE id = ?1",
                [
                    inv.id.to_string(),
                    InvitationStatus::Accepted.as_str().to_string(),
                    ts(&now),
                ],
            )?;

            let rebound = tx.execute(
                "UPDATE partnerships
                 SET user_two = ?2, status = ?3, trial_end_date = NULL, is_user_exists = 1, updated_at = ?4
                 WHERE id = ?1 AND is_user_exists = 0 AND status = ?5",
                rusqlite::params![
                    partnership_id.to_string(),
                    new_user_id.to_string(),
                    PartnershipStatus::Trial.as_str(),
                    ts(&now),
                    PartnershipStatus::Pending.as_str(),
                ],
            )?;
            if rebound == 0 {
                return Ok(None);
            }

            if let Some(terms) = &inv.agreement {
                upsert_agreement_in(&tx, partnership_id, terms, inv.inviter_id, now)?;
            }
            if let Some(note) = inv.message.as_ref().filter(|m| !m.trim().is_empty()) {
                insert_message_in(
                    &tx,
                    &Message {
                        id: Uuid::new_v4(),
                        partnership_id,
                        sender_id: inv.inviter_id,
                        content: note.clone(),
                        kind: MessageKind::Invitation,
                        read_at: None,
                        created_at: now,
                    },
                )?;
            }

            let partnership = query_partnership(&tx, partnership_id)?
                .context("placeholder partnership vanished during redemption")?;
            tx.commit()?;

            Ok(Some(Redemption {
                partnership,
                inviter_id: inv.inviter_id,
            }))
        })
    }
}

/// Invitations still waiting on a partnership that has just ended can no
/// longer be redeemed.
pub(crate) fn expire_invitations_for_partnership(
    conn: &Connection,
    partnership_id: Uuid,
    now: DateTime<Utc>,
) -> Result<usize> {
    let n = conn.execute(
        "UPDATE pending_invitations SET status = 'expired', updated_at = ?2
         WHERE partnership_id = ?1 AND status = 'pending'",
        [partnership_id.to_string(), ts(&now)],
    )?;
    Ok(n)
}

fn query_pending_invitation(conn: &Connection, token: &str) -> Result<Option<PendingInvitation>> {
    let inv = conn
        .query_row(
            &format!(
                "SELECT {INVITATION_COLUMNS} FROM pending_invitations
                 WHERE invitation_token = ?1 AND status = 'pending'"
            ),
            [token],
            map_invitation,
        )
        .optional()?;
    Ok(inv)
}
