//! Pull request state machine: OPEN -> MERGED, with reviewer assignment and
//! replacement while open.
//!
//! Every write is a single atomic store call whose preconditions are checked
//! again at write time, so concurrent callers cannot both act on the same
//! reviewer slot or swap a reviewer into a merged pull request.

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info, warn};

use review_types::{PrStatus, PullRequest};

use crate::directory::Directory;
use crate::error::{ReviewError, ReviewResult, require};
use crate::selector::ReviewerSelector;
use crate::store::{CreateOutcome, ReplaceOutcome, ReviewStore};

pub const REVIEWERS_PER_PR: usize = 2;

/// Create and reassign rerun selection after a write-time conflict at most
/// this many times.
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct Reassignment {
    pub pr: PullRequest,
    pub replaced_by: String,
}

pub struct PrLifecycle<'a, S: ?Sized> {
    store: &'a S,
    selector: &'a dyn ReviewerSelector,
}

impl<'a, S: ReviewStore + ?Sized> PrLifecycle<'a, S> {
    pub fn new(store: &'a S, selector: &'a dyn ReviewerSelector) -> Self {
        Self { store, selector }
    }

    fn directory(&self) -> Directory<'a, S> {
        Directory::new(self.store)
    }

    /// Open a pull request and assign up to two active teammates of the author.
    pub fn create(&self, pr_id: &str, name: &str, author_id: &str) -> ReviewResult<PullRequest> {
        require("pull_request_id", pr_id)?;
        require("pull_request_name", name)?;
        require("author_id", author_id)?;

        if self.store.pr_exists(pr_id)? {
            return Err(ReviewError::PrExists(pr_id.to_string()));
        }

        let directory = self.directory();
        if !directory.user_exists(author_id)? {
            return Err(ReviewError::not_found("author", author_id));
        }
        let team = directory
            .resolve_team_of(author_id)?
            .ok_or_else(|| ReviewError::not_found("team of author", author_id))?;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let candidates = directory.active_members(&team, &[author_id])?;
            let reviewers: Vec<String> = self
                .selector
                .select(&candidates, REVIEWERS_PER_PR)
                .into_iter()
                .map(|u| u.user_id)
                .collect();
            debug!(
                "PR {}: {} candidates in team {}, assigning {:?}",
                pr_id,
                candidates.len(),
                team,
                reviewers
            );

            let pr = PullRequest {
                pull_request_id: pr_id.to_string(),
                pull_request_name: name.to_string(),
                author_id: author_id.to_string(),
                status: PrStatus::Open,
                assigned_reviewers: reviewers,
                created_at: Some(Utc::now()),
                merged_at: None,
            };

            match self.store.create_pr_atomic(&pr, &team)? {
                CreateOutcome::Created => {
                    let stored = self.load_after_write(pr_id)?;
                    info!(
                        "PR {} opened by {} with reviewers {:?}",
                        pr_id, author_id, stored.assigned_reviewers
                    );
                    return Ok(stored);
                }
                // Lost a race with another create for the same id
                CreateOutcome::IdTaken => {
                    return Err(ReviewError::PrExists(pr_id.to_string()));
                }
                CreateOutcome::Conflict => {
                    warn!(
                        "PR {}: reviewers {:?} became ineligible before write (attempt {}/{})",
                        pr_id, pr.assigned_reviewers, attempt, MAX_WRITE_ATTEMPTS
                    );
                }
            }
        }

        warn!(
            "PR {}: giving up on reviewer assignment after {} conflicting attempts",
            pr_id, MAX_WRITE_ATTEMPTS
        );
        Err(ReviewError::NoCandidate(pr_id.to_string()))
    }

    /// Replace `old_reviewer` with another active member of their team.
    ///
    /// Fails with `NoCandidate` rather than leaving the slot empty.
    pub fn reassign(&self, pr_id: &str, old_reviewer: &str) -> ReviewResult<Reassignment> {
        require("pull_request_id", pr_id)?;
        require("old_user_id", old_reviewer)?;

        let directory = self.directory();

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let pr = self
                .store
                .get_pr(pr_id)?
                .ok_or_else(|| ReviewError::not_found("pull request", pr_id))?;

            if pr.is_merged() {
                return Err(ReviewError::PrMerged(pr_id.to_string()));
            }
            if !pr.has_reviewer(old_reviewer) {
                return Err(not_assigned(pr_id, old_reviewer));
            }

            let team = directory
                .resolve_team_of(old_reviewer)?
                .ok_or_else(|| ReviewError::not_found("team of reviewer", old_reviewer))?;

            let mut excluding: Vec<&str> = vec![pr.author_id.as_str()];
            excluding.extend(pr.assigned_reviewers.iter().map(String::as_str));
            let pool = directory.active_members(&team, &excluding)?;
            debug!(
                "PR {}: {} replacement candidates for {} in team {}",
                pr_id,
                pool.len(),
                old_reviewer,
                team
            );

            let Some(new_reviewer) = self.selector.select(&pool, 1).into_iter().next() else {
                return Err(ReviewError::NoCandidate(pr_id.to_string()));
            };

            match self
                .store
                .replace_reviewer_atomic(pr_id, old_reviewer, &new_reviewer.user_id)?
            {
                ReplaceOutcome::Replaced => {
                    let pr = self.load_after_write(pr_id)?;
                    info!(
                        "PR {}: reviewer {} replaced by {}",
                        pr_id, old_reviewer, new_reviewer.user_id
                    );
                    return Ok(Reassignment {
                        pr,
                        replaced_by: new_reviewer.user_id,
                    });
                }
                ReplaceOutcome::PrMissing => {
                    return Err(ReviewError::not_found("pull request", pr_id));
                }
                ReplaceOutcome::PrMerged => {
                    return Err(ReviewError::PrMerged(pr_id.to_string()));
                }
                ReplaceOutcome::NotAssigned => {
                    return Err(not_assigned(pr_id, old_reviewer));
                }
                ReplaceOutcome::Conflict => {
                    warn!(
                        "PR {}: candidate {} became ineligible before write (attempt {}/{})",
                        pr_id, new_reviewer.user_id, attempt, MAX_WRITE_ATTEMPTS
                    );
                }
            }
        }

        warn!(
            "PR {}: giving up on replacing {} after {} conflicting attempts",
            pr_id, old_reviewer, MAX_WRITE_ATTEMPTS
        );
        Err(ReviewError::NoCandidate(pr_id.to_string()))
    }

    /// Idempotent: merging a merged pull request returns it unchanged.
    pub fn merge(&self, pr_id: &str) -> ReviewResult<PullRequest> {
        require("pull_request_id", pr_id)?;

        let pr = self
            .store
            .get_pr(pr_id)?
            .ok_or_else(|| ReviewError::not_found("pull request", pr_id))?;
        if pr.is_merged() {
            debug!("PR {} already merged", pr_id);
            return Ok(pr);
        }

        let transitioned = self
            .store
            .update_pr_status(pr_id, PrStatus::Merged, Some(Utc::now()))?;

        let stored = self.load_after_write(pr_id)?;
        if transitioned {
            info!("PR {} merged", pr_id);
        }
        Ok(stored)
    }

    fn load_after_write(&self, pr_id: &str) -> ReviewResult<PullRequest> {
        self.store
            .get_pr(pr_id)?
            .ok_or_else(|| anyhow!("pull request {} missing after write", pr_id).into())
    }
}

fn not_assigned(pr_id: &str, reviewer_id: &str) -> ReviewError {
    ReviewError::NotAssigned {
        pull_request_id: pr_id.to_string(),
        reviewer_id: reviewer_id.to_string(),
    }
}
