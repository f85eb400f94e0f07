use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const LATEST_VERSION: i64 = 2;

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Review DB: running migration v1 (initial schema)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE teams (
                name        TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE team_members (
                team_name   TEXT NOT NULL REFERENCES teams(name) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (team_name, user_id)
            );

            CREATE TABLE pull_requests (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                author_id   TEXT NOT NULL REFERENCES users(id),
                status      TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'MERGED')),
                created_at  TEXT NOT NULL,
                merged_at   TEXT,
                CHECK ((status = 'MERGED') = (merged_at IS NOT NULL))
            );

            CREATE TABLE pr_reviewers (
                pull_request_id TEXT NOT NULL REFERENCES pull_requests(id) ON DELETE CASCADE,
                reviewer_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (pull_request_id, reviewer_id)
            );

            CREATE INDEX idx_users_active ON users(is_active);
            CREATE INDEX idx_team_members_user ON team_members(user_id);
            CREATE INDEX idx_pr_author ON pull_requests(author_id);
            CREATE INDEX idx_pr_status ON pull_requests(status);
            CREATE INDEX idx_pr_reviewers_reviewer ON pr_reviewers(reviewer_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    if version < 2 {
        info!("Review DB: running migration v2 (reviewer set guards)");
        let tx = conn.transaction()?;
        tx.execute_batch(
            "
            CREATE TRIGGER pr_reviewers_max_two
            BEFORE INSERT ON pr_reviewers
            WHEN (SELECT COUNT(*) FROM pr_reviewers WHERE pull_request_id = NEW.pull_request_id) >= 2
            BEGIN
                SELECT RAISE(ABORT, 'pull request already has two reviewers');
            END;

            CREATE TRIGGER pr_reviewers_not_author_insert
            BEFORE INSERT ON pr_reviewers
            WHEN NEW.reviewer_id = (SELECT author_id FROM pull_requests WHERE id = NEW.pull_request_id)
            BEGIN
                SELECT RAISE(ABORT, 'author cannot review own pull request');
            END;

            CREATE TRIGGER pr_reviewers_not_author_update
            BEFORE UPDATE OF reviewer_id ON pr_reviewers
            WHEN NEW.reviewer_id = (SELECT author_id FROM pull_requests WHERE id = NEW.pull_request_id)
            BEGIN
                SELECT RAISE(ABORT, 'author cannot review own pull request');
            END;

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}
