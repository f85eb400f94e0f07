//! Data-access contract consumed by the engine, and its SQLite implementation.
//!
//! Absence is reported as `Ok(None)` / `Ok(false)`. Errors are infrastructure
//! failures only and are passed through untouched.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use review_db::{Database, NewPullRequest, PullRequestRow, ReviewQueueRow, UserRow};
use review_types::{PrStatus, PullRequest, PullRequestShort, Team, User};

pub use review_db::{CreateOutcome, ReplaceOutcome};

pub trait ReviewStore: Send + Sync {
    fn upsert_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, user_id: &str) -> Result<Option<User>>;
    fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<bool>;

    /// Creates the team, upserts its members and records their memberships
    /// as one unit. Returns false, writing nothing, if the team exists.
    fn create_team(&self, team: &Team) -> Result<bool>;
    fn team_exists(&self, team_name: &str) -> Result<bool>;
    fn get_team_members(&self, team_name: &str) -> Result<Vec<User>>;
    fn add_user_to_team(&self, team_name: &str, user_id: &str) -> Result<()>;
    fn get_user_team(&self, user_id: &str) -> Result<Option<String>>;
    fn count_user_teams(&self, user_id: &str) -> Result<usize>;
    fn active_team_members(&self, team_name: &str, exclude: &[&str]) -> Result<Vec<User>>;

    fn pr_exists(&self, pr_id: &str) -> Result<bool>;
    /// Writes the PR and its reviewers as one unit. Each reviewer must still
    /// be an active member of `team_name` and not the author at write time.
    fn create_pr_atomic(&self, pr: &PullRequest, team_name: &str) -> Result<CreateOutcome>;
    fn get_pr(&self, pr_id: &str) -> Result<Option<PullRequest>>;
    /// Only transitions pull requests that are still open.
    fn update_pr_status(
        &self,
        pr_id: &str,
        status: PrStatus,
        merged_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;
    fn replace_reviewer_atomic(&self, pr_id: &str, old_id: &str, new_id: &str)
    -> Result<ReplaceOutcome>;
    fn get_prs_for_reviewer(&self, reviewer_id: &str) -> Result<Vec<PullRequestShort>>;
}

impl ReviewStore for Database {
    fn upsert_user(&self, user: &User) -> Result<()> {
        Database::upsert_user(self, &user.user_id, &user.username, user.is_active)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(Database::get_user(self, user_id)?.map(user_from_row))
    }

    fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<bool> {
        Database::set_user_active(self, user_id, is_active)
    }

    fn create_team(&self, team: &Team) -> Result<bool> {
        let rows: Vec<UserRow> = team
            .members
            .iter()
            .map(|m| UserRow {
                id: m.user_id.clone(),
                username: m.username.clone(),
                is_active: m.is_active,
            })
            .collect();
        self.create_team_with_members(&team.team_name, &rows)
    }

    fn team_exists(&self, team_name: &str) -> Result<bool> {
        Database::team_exists(self, team_name)
    }

    fn get_team_members(&self, team_name: &str) -> Result<Vec<User>> {
        let rows = Database::get_team_members(self, team_name)?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    fn add_user_to_team(&self, team_name: &str, user_id: &str) -> Result<()> {
        Database::add_user_to_team(self, team_name, user_id)
    }

    fn get_user_team(&self, user_id: &str) -> Result<Option<String>> {
        Database::get_user_team(self, user_id)
    }

    fn count_user_teams(&self, user_id: &str) -> Result<usize> {
        Database::count_user_teams(self, user_id)
    }

    fn active_team_members(&self, team_name: &str, exclude: &[&str]) -> Result<Vec<User>> {
        let rows = Database::active_team_members(self, team_name, exclude)?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }

    fn pr_exists(&self, pr_id: &str) -> Result<bool> {
        Database::pr_exists(self, pr_id)
    }

    fn create_pr_atomic(&self, pr: &PullRequest, team_name: &str) -> Result<CreateOutcome> {
        let created_at = format_timestamp(pr.created_at.unwrap_or_else(Utc::now));
        Database::create_pr_atomic(
            self,
            &NewPullRequest {
                id: &pr.pull_request_id,
                name: &pr.pull_request_name,
                author_id: &pr.author_id,
                team: team_name,
                status: pr.status.as_str(),
                created_at: &created_at,
                reviewers: &pr.assigned_reviewers,
            },
        )
    }

    fn get_pr(&self, pr_id: &str) -> Result<Option<PullRequest>> {
        Database::get_pr(self, pr_id)?.map(pr_from_row).transpose()
    }

    fn update_pr_status(
        &self,
        pr_id: &str,
        status: PrStatus,
        merged_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let merged_at = merged_at.map(format_timestamp);
        Database::update_pr_status(self, pr_id, status.as_str(), merged_at.as_deref())
    }

    fn replace_reviewer_atomic(
        &self,
        pr_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<ReplaceOutcome> {
        Database::replace_reviewer_atomic(self, pr_id, old_id, new_id)
    }

    fn get_prs_for_reviewer(&self, reviewer_id: &str) -> Result<Vec<PullRequestShort>> {
        Database::get_prs_for_reviewer(self, reviewer_id)?
            .into_iter()
            .map(short_from_row)
            .collect()
    }
}

/// RFC 3339 in UTC with fixed microsecond precision, so lexical order in the
/// database matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's datetime('now') format, no timezone
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

fn user_from_row(row: UserRow) -> User {
    User {
        user_id: row.id,
        username: row.username,
        is_active: row.is_active,
    }
}

fn pr_from_row(row: PullRequestRow) -> Result<PullRequest> {
    let status = row
        .status
        .parse::<PrStatus>()
        .with_context(|| format!("pull request '{}'", row.id))?;
    let created_at = parse_timestamp(&row.created_at)?;
    let merged_at = row.merged_at.as_deref().map(parse_timestamp).transpose()?;

    Ok(PullRequest {
        pull_request_id: row.id,
        pull_request_name: row.name,
        author_id: row.author_id,
        status,
        assigned_reviewers: row.reviewers,
        created_at: Some(created_at),
        merged_at,
    })
}

fn short_from_row(row: ReviewQueueRow) -> Result<PullRequestShort> {
    let status = row
        .status
        .parse::<PrStatus>()
        .with_context(|| format!("pull request '{}'", row.id))?;

    Ok(PullRequestShort {
        pull_request_id: row.id,
        pull_request_name: row.name,
        author_id: row.author_id,
        status,
    })
}
