use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            -- Identity provider accounts. Kept apart from profiles: a profile
            -- row is written only after its identity exists.
            CREATE TABLE auth_identities (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                time_zone   TEXT NOT NULL,
                avatar_url  TEXT,
                bio         TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            -- user_two has no foreign key: it holds a placeholder id until an
            -- invited non-member registers.
            CREATE TABLE partnerships (
                id              TEXT PRIMARY KEY,
                user_one        TEXT NOT NULL REFERENCES users(id),
                user_two        TEXT NOT NULL,
                status          TEXT NOT NULL
                                CHECK (status IN ('pending', 'trial', 'active', 'ended')),
                trial_end_date  TEXT,
                is_user_exists  INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_partnerships_user_one ON partnerships(user_one);
            CREATE INDEX idx_partnerships_user_two ON partnerships(user_two);

            CREATE TABLE partnership_agreements (
                id                      TEXT PRIMARY KEY,
                partnership_id          TEXT NOT NULL UNIQUE REFERENCES partnerships(id),
                communication_frequency TEXT,
                check_in_days           TEXT NOT NULL DEFAULT '[]',
                expectations            TEXT,
                commitment_level        TEXT,
                feedback_style          TEXT,
                created_by              TEXT NOT NULL REFERENCES users(id),
                updated_by              TEXT NOT NULL REFERENCES users(id),
                created_at              TEXT NOT NULL,
                updated_at              TEXT NOT NULL
            );

            CREATE TABLE pending_invitations (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL,
                inviter_id          TEXT NOT NULL REFERENCES users(id),
                partnership_id      TEXT REFERENCES partnerships(id),
                invitation_token    TEXT NOT NULL UNIQUE,
                status              TEXT NOT NULL
                                    CHECK (status IN ('pending', 'accepted', 'expired')),
                agreement           TEXT,
                message             TEXT,
                expires_at          TEXT NOT NULL,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_invitations_inviter ON pending_invitations(inviter_id, created_at);

            CREATE TABLE goals (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                partnership_id  TEXT NOT NULL REFERENCES partnerships(id),
                title           TEXT NOT NULL,
                description     TEXT,
                status          TEXT NOT NULL
                                CHECK (status IN ('active', 'completed', 'abandoned')),
                start_date      TEXT NOT NULL,
                target_date     TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_goals_user ON goals(user_id);
            CREATE INDEX idx_goals_partnership ON goals(partnership_id);

            CREATE TABLE progress_updates (
                id              TEXT PRIMARY KEY,
                goal_id         TEXT NOT NULL REFERENCES goals(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id),
                description     TEXT NOT NULL,
                progress_value  REAL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_progress_goal ON progress_updates(goal_id, created_at);

            CREATE TABLE check_ins (
                id              TEXT PRIMARY KEY,
                partnership_id  TEXT NOT NULL REFERENCES partnerships(id),
                scheduled_at    TEXT NOT NULL,
                notes           TEXT,
                completed_at    TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_check_ins_partnership ON check_ins(partnership_id, scheduled_at);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                partnership_id  TEXT NOT NULL REFERENCES partnerships(id),
                sender_id       TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                kind            TEXT NOT NULL DEFAULT 'text',
                read_at         TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_partnership ON messages(partnership_id, created_at);

            CREATE TABLE message_reads (
                user_id         TEXT NOT NULL REFERENCES users(id),
                partnership_id  TEXT NOT NULL REFERENCES partnerships(id),
                last_read_at    TEXT NOT NULL,
                PRIMARY KEY (user_id, partnership_id)
            );

            CREATE TABLE notifications (
                id                  TEXT PRIMARY KEY,
                user_id             TEXT NOT NULL REFERENCES users(id),
                type                TEXT NOT NULL,
                title               TEXT NOT NULL,
                message             TEXT NOT NULL,
                related_entity_id   TEXT,
                data                TEXT,
                read                INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
