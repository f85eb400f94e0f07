#![allow(dead_code)]

use std::sync::Arc;

use review_core::{RandomSelector, ReviewService, ReviewStore, ReviewerSelector};
use review_db::{Database, DbOptions};
use review_types::User;
use tempfile::TempDir;

/// Takes candidates in the order the store returned them.
pub struct FirstN;

impl ReviewerSelector for FirstN {
    fn select(&self, candidates: &[User], count: usize) -> Vec<User> {
        candidates.iter().take(count).cloned().collect()
    }
}

pub fn user(id: &str, active: bool) -> User {
    User {
        user_id: id.to_string(),
        username: format!("User {}", id),
        is_active: active,
    }
}

pub fn service_with(selector: Arc<dyn ReviewerSelector>) -> ReviewService<Database> {
    ReviewService::with_selector(Database::open_in_memory().unwrap(), selector)
}

/// Opens `review.db` inside `dir`. Every handle on the same directory shares
/// one database file.
pub fn open_file_db(dir: &TempDir) -> Database {
    Database::open(&dir.path().join("review.db"), &DbOptions::default()).unwrap()
}

/// A service over an on-disk database, so reads go through the read-only
/// reader pool rather than the writer.
pub fn file_backed(dir: &TempDir, selector: Arc<dyn ReviewerSelector>) -> ReviewService<Database> {
    ReviewService::with_selector(open_file_db(dir), selector)
}

pub fn deterministic() -> ReviewService<Database> {
    service_with(Arc::new(FirstN))
}

pub fn random() -> ReviewService<Database> {
    service_with(Arc::new(RandomSelector))
}

/// Team `backend` with author `a` and the given reviewers, all active.
pub fn seed_team(svc: &ReviewService<Database>, others: &[&str]) {
    let mut members = vec![user("a", true)];
    members.extend(others.iter().map(|id| user(id, true)));
    svc.create_team("backend", &members).unwrap();
}

/// Store access through the engine's contract rather than the inherent
/// `Database` methods of the same name.
pub fn store(svc: &ReviewService<Database>) -> &dyn ReviewStore {
    svc.store()
}
