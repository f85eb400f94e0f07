use anyhow::Result;

use review_types::{Team, User};

use crate::store::ReviewStore;

/// Read-only view over team membership and user activity.
pub struct Directory<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: ReviewStore + ?Sized> Directory<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// A user is treated as belonging to a single team; when several
    /// memberships are recorded the earliest one wins.
    pub fn resolve_team_of(&self, user_id: &str) -> Result<Option<String>> {
        self.store.get_user_team(user_id)
    }

    /// Active members of `team_name` minus `excluding`. Order carries no meaning.
    pub fn active_members(&self, team_name: &str, excluding: &[&str]) -> Result<Vec<User>> {
        self.store.active_team_members(team_name, excluding)
    }

    pub fn team_exists(&self, team_name: &str) -> Result<bool> {
        self.store.team_exists(team_name)
    }

    pub fn user_exists(&self, user_id: &str) -> Result<bool> {
        Ok(self.store.get_user(user_id)?.is_some())
    }

    pub fn team(&self, team_name: &str) -> Result<Option<Team>> {
        if !self.store.team_exists(team_name)? {
            return Ok(None);
        }

        Ok(Some(Team {
            team_name: team_name.to_string(),
            members: self.store.get_team_members(team_name)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_db::Database;

    fn member(id: &str, active: bool) -> User {
        User {
            user_id: id.to_string(),
            username: id.to_uppercase(),
            is_active: active,
        }
    }

    fn directory_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let team = Team {
            team_name: "platform".into(),
            members: vec![member("a", true), member("b", true), member("c", false)],
        };
        assert!(ReviewStore::create_team(&db, &team).unwrap());
        db
    }

    #[test]
    fn absence_is_not_an_error() {
        let db = directory_db();
        let dir = Directory::new(&db);

        assert_eq!(dir.resolve_team_of("ghost").unwrap(), None);
        assert!(!dir.user_exists("ghost").unwrap());
        assert!(!dir.team_exists("nope").unwrap());
        assert!(dir.team("nope").unwrap().is_none());
    }

    #[test]
    fn active_members_respect_exclusions() {
        let db = directory_db();
        let dir = Directory::new(&db);

        assert_eq!(dir.resolve_team_of("b").unwrap().as_deref(), Some("platform"));
        let ids: Vec<String> = dir
            .active_members("platform", &["a"])
            .unwrap()
            .into_iter()
            .map(|u| u.user_id)
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn team_lists_all_members_with_flags() {
        let db = directory_db();
        let team = Directory::new(&db).team("platform").unwrap().unwrap();
        assert_eq!(team.members.len(), 3);
        assert!(!team.members[2].is_active);
    }
}
