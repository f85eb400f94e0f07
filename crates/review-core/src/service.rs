use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{info, warn};

use review_types::{PullRequest, PullRequestShort, Team, User, UserWithTeam};

use crate::directory::Directory;
use crate::error::{ReviewError, ReviewResult, require};
use crate::lifecycle::{PrLifecycle, Reassignment};
use crate::selector::{RandomSelector, ReviewerSelector};
use crate::store::ReviewStore;

/// The operations exposed to a transport layer.
///
/// Holds no state between calls other than the store handle and the
/// selection strategy; safe to share across request handlers.
pub struct ReviewService<S> {
    store: S,
    selector: Arc<dyn ReviewerSelector>,
}

impl<S: ReviewStore> ReviewService<S> {
    pub fn new(store: S) -> Self {
        Self::with_selector(store, Arc::new(RandomSelector))
    }

    pub fn with_selector(store: S, selector: Arc<dyn ReviewerSelector>) -> Self {
        Self { store, selector }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn directory(&self) -> Directory<'_, S> {
        Directory::new(&self.store)
    }

    fn lifecycle(&self) -> PrLifecycle<'_, S> {
        PrLifecycle::new(&self.store, self.selector.as_ref())
    }

    // -- Teams --

    pub fn create_team(&self, team_name: &str, members: &[User]) -> ReviewResult<Team> {
        require("team_name", team_name)?;

        let mut seen = HashSet::new();
        for member in members {
            require("user_id", &member.user_id)?;
            if !seen.insert(member.user_id.as_str()) {
                return Err(ReviewError::InvalidInput(format!(
                    "user {} listed more than once",
                    member.user_id
                )));
            }
        }

        let team = Team {
            team_name: team_name.to_string(),
            members: members.to_vec(),
        };
        if !self.store.create_team(&team)? {
            return Err(ReviewError::TeamExists(team_name.to_string()));
        }
        info!("Team {} created with {} members", team_name, members.len());

        for member in members {
            if self.store.count_user_teams(&member.user_id)? > 1 {
                warn!(
                    "User {} now belongs to several teams; reviewer selection uses the earliest",
                    member.user_id
                );
            }
        }

        self.directory()
            .team(team_name)?
            .ok_or_else(|| anyhow!("team {} missing after create", team_name).into())
    }

    pub fn get_team(&self, team_name: &str) -> ReviewResult<Team> {
        require("team_name", team_name)?;

        self.directory()
            .team(team_name)?
            .ok_or_else(|| ReviewError::not_found("team", team_name))
    }

    // -- Users --

    pub fn set_user_active(&self, user_id: &str, is_active: bool) -> ReviewResult<UserWithTeam> {
        require("user_id", user_id)?;

        if !self.store.set_user_active(user_id, is_active)? {
            return Err(ReviewError::not_found("user", user_id));
        }

        let user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| ReviewError::not_found("user", user_id))?;
        let team_name = self.directory().resolve_team_of(user_id)?;
        info!("User {} is_active set to {}", user_id, is_active);

        Ok(UserWithTeam {
            user_id: user.user_id,
            username: user.username,
            team_name,
            is_active: user.is_active,
        })
    }

    /// Pull requests the user currently reviews, newest first.
    pub fn get_review_queue(&self, user_id: &str) -> ReviewResult<Vec<PullRequestShort>> {
        require("user_id", user_id)?;

        if !self.directory().user_exists(user_id)? {
            return Err(ReviewError::not_found("user", user_id));
        }
        Ok(self.store.get_prs_for_reviewer(user_id)?)
    }

    // -- Pull requests --

    pub fn create_pr(&self, pr_id: &str, name: &str, author_id: &str) -> ReviewResult<PullRequest> {
        self.lifecycle().create(pr_id, name, author_id)
    }

    pub fn merge_pr(&self, pr_id: &str) -> ReviewResult<PullRequest> {
        self.lifecycle().merge(pr_id)
    }

    pub fn reassign_reviewer(&self, pr_id: &str, old_user_id: &str) -> ReviewResult<Reassignment> {
        self.lifecycle().reassign(pr_id, old_user_id)
    }
}
