use crate::Database;
use crate::models::{
    CreateOutcome, NewPullRequest, PullRequestRow, ReplaceOutcome, ReviewQueueRow, UserRow,
};
use anyhow::Result;
use rusqlite::{Connection, TransactionBehavior, params, params_from_iter};

impl Database {
    // -- Users --

    /// Insert a user, or overwrite name and activity if the id is known.
    pub fn upsert_user(&self, id: &str, username: &str, is_active: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            upsert_user(conn, id, username, is_active)?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Returns false if no such user exists.
    pub fn set_user_active(&self, id: &str, is_active: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_active = ?1 WHERE id = ?2",
                params![is_active, id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Teams --

    /// Create a team, upsert its members and record their memberships in one
    /// transaction. Returns false, writing nothing, if the team already exists.
    pub fn create_team_with_members(&self, name: &str, members: &[UserRow]) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !insert_team(&tx, name)? {
                return Ok(false);
            }

            for member in members {
                upsert_user(&tx, &member.id, &member.username, member.is_active)?;
                add_membership(&tx, name, &member.id)?;
            }

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn team_exists(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM teams WHERE name = ?1)",
                [name],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Members in the order they joined.
    pub fn get_team_members(&self, name: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.is_active
                 FROM team_members tm
                 INNER JOIN users u ON u.id = tm.user_id
                 WHERE tm.team_name = ?1
                 ORDER BY tm.rowid",
            )?;

            let rows = stmt
                .query_map([name], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Idempotent: adding an existing member is a no-op.
    pub fn add_user_to_team(&self, team: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| add_membership(conn, team, user_id))
    }

    /// The user's earliest recorded membership, if any.
    pub fn get_user_team(&self, user_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT team_name FROM team_members WHERE user_id = ?1 ORDER BY rowid LIMIT 1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Number of teams the user belongs to.
    pub fn count_user_teams(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM team_members WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    pub fn active_team_members(&self, team: &str, exclude: &[&str]) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT u.id, u.username, u.is_active
                 FROM team_members tm
                 INNER JOIN users u ON u.id = tm.user_id
                 WHERE tm.team_name = ?1 AND u.is_active = 1",
            );
            if !exclude.is_empty() {
                let placeholders: Vec<String> =
                    (2..=exclude.len() + 1).map(|i| format!("?{}", i)).collect();
                sql.push_str(&format!(" AND u.id NOT IN ({})", placeholders.join(", ")));
            }
            sql.push_str(" ORDER BY tm.rowid");

            let mut stmt = conn.prepare(&sql)?;
            let params = std::iter::once(team).chain(exclude.iter().copied());
            let rows = stmt
                .query_map(params_from_iter(params), map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Pull requests --

    pub fn pr_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Write the PR row and its reviewer rows as one unit, re-checking each
    /// reviewer's eligibility inside the write transaction. Writes nothing
    /// unless the outcome is `Created`.
    pub fn create_pr_atomic(&self, pr: &NewPullRequest<'_>) -> Result<CreateOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM pull_requests WHERE id = ?1)",
                [pr.id],
                |row| row.get(0),
            )?;
            if taken {
                return Ok(CreateOutcome::IdTaken);
            }

            for reviewer_id in pr.reviewers {
                if reviewer_id == pr.author_id || !is_active_member(&tx, pr.team, reviewer_id)? {
                    return Ok(CreateOutcome::Conflict);
                }
            }

            tx.execute(
                "INSERT INTO pull_requests (id, name, author_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![pr.id, pr.name, pr.author_id, pr.status, pr.created_at],
            )?;

            for reviewer_id in pr.reviewers {
                tx.execute(
                    "INSERT INTO pr_reviewers (pull_request_id, reviewer_id) VALUES (?1, ?2)",
                    params![pr.id, reviewer_id],
                )?;
            }

            tx.commit()?;
            Ok(CreateOutcome::Created)
        })
    }

    pub fn get_pr(&self, id: &str) -> Result<Option<PullRequestRow>> {
        self.with_conn(|conn| {
            // One read transaction so the PR row and its reviewers come from
            // the same snapshot.
            let tx = conn.unchecked_transaction()?;
            let row = query_pr(&tx, id)?;
            tx.finish()?;
            Ok(row)
        })
    }

    /// Move an OPEN pull request to `status`. Rows that already left OPEN are
    /// untouched, so `merged_at` is written at most once. Returns whether a
    /// row changed.
    pub fn update_pr_status(&self, id: &str, status: &str, merged_at: Option<&str>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE pull_requests SET status = ?1, merged_at = ?2
                 WHERE id = ?3 AND status = 'OPEN'",
                params![status, merged_at, id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Swap `old_id` for `new_id` on an open pull request, re-checking every
    /// precondition inside the write transaction. The new reviewer takes the
    /// old reviewer's position in the set.
    pub fn replace_reviewer_atomic(
        &self,
        pr_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<ReplaceOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let pr: Option<(String, String)> = tx
                .query_row(
                    "SELECT status, author_id FROM pull_requests WHERE id = ?1",
                    [pr_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((status, author_id)) = pr else {
                return Ok(ReplaceOutcome::PrMissing);
            };
            if status == "MERGED" {
                return Ok(ReplaceOutcome::PrMerged);
            }

            if !is_assigned(&tx, pr_id, old_id)? {
                return Ok(ReplaceOutcome::NotAssigned);
            }

            let new_active: Option<bool> = tx
                .query_row("SELECT is_active FROM users WHERE id = ?1", [new_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if new_id == author_id
                || new_active != Some(true)
                || is_assigned(&tx, pr_id, new_id)?
            {
                return Ok(ReplaceOutcome::Conflict);
            }

            tx.execute(
                "UPDATE pr_reviewers SET reviewer_id = ?3
                 WHERE pull_request_id = ?1 AND reviewer_id = ?2",
                params![pr_id, old_id, new_id],
            )?;

            tx.commit()?;
            Ok(ReplaceOutcome::Replaced)
        })
    }

    /// Pull requests `reviewer_id` is currently assigned to, newest first.
    pub fn get_prs_for_reviewer(&self, reviewer_id: &str) -> Result<Vec<ReviewQueueRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT pr.id, pr.name, pr.author_id, pr.status
                 FROM pull_requests pr
                 INNER JOIN pr_reviewers prr ON pr.id = prr.pull_request_id
                 WHERE prr.reviewer_id = ?1
                 ORDER BY pr.created_at DESC, pr.rowid DESC",
            )?;

            let rows = stmt
                .query_map([reviewer_id], |row| {
                    Ok(ReviewQueueRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        author_id: row.get(2)?,
                        status: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn upsert_user(conn: &Connection, id: &str, username: &str, is_active: bool) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, is_active) VALUES (?1, ?2, ?3)
         ON CONFLICT (id) DO UPDATE SET username = excluded.username, is_active = excluded.is_active",
        params![id, username, is_active],
    )?;
    Ok(())
}

fn insert_team(conn: &Connection, name: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO teams (name) VALUES (?1) ON CONFLICT (name) DO NOTHING",
        [name],
    )?;
    Ok(inserted > 0)
}

fn add_membership(conn: &Connection, team: &str, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO team_members (team_name, user_id) VALUES (?1, ?2)
         ON CONFLICT (team_name, user_id) DO NOTHING",
        params![team, user_id],
    )?;
    Ok(())
}

fn is_assigned(conn: &Connection, pr_id: &str, reviewer_id: &str) -> Result<bool> {
    let assigned = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pr_reviewers WHERE pull_request_id = ?1 AND reviewer_id = ?2)",
        [pr_id, reviewer_id],
        |row| row.get(0),
    )?;
    Ok(assigned)
}

fn is_active_member(conn: &Connection, team: &str, user_id: &str) -> Result<bool> {
    let active = conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM team_members tm
             INNER JOIN users u ON u.id = tm.user_id
             WHERE tm.team_name = ?1 AND tm.user_id = ?2 AND u.is_active = 1
         )",
        [team, user_id],
        |row| row.get(0),
    )?;
    Ok(active)
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        is_active: row.get(2)?,
    })
}

fn query_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT id, username, is_active FROM users WHERE id = ?1",
        [id],
        map_user_row,
    )
    .optional()
}

fn query_pr(conn: &Connection, id: &str) -> Result<Option<PullRequestRow>> {
    let row = conn
        .query_row(
            "SELECT id, name, author_id, status, created_at, merged_at
             FROM pull_requests WHERE id = ?1",
            [id],
            |row| {
                Ok(PullRequestRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    author_id: row.get(2)?,
                    status: row.get(3)?,
                    created_at: row.get(4)?,
                    merged_at: row.get(5)?,
                    reviewers: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut pr) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT reviewer_id FROM pr_reviewers WHERE pull_request_id = ?1 ORDER BY rowid",
    )?;
    pr.reviewers = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    Ok(Some(pr))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
