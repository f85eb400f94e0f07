mod common;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use review_core::{RandomSelector, ReviewResult, ReviewService};
use review_db::Database;
use review_types::api::ErrorCode;
use review_types::{PrStatus, PullRequest};

use common::{file_backed, random, seed_team, store};

const THREADS: usize = 8;

/// Runs `op` on `THREADS` threads released at the same instant.
fn race<T, F>(svc: &Arc<ReviewService<Database>>, op: F) -> Vec<ReviewResult<T>>
where
    T: Send + 'static,
    F: Fn(&ReviewService<Database>, usize) -> ReviewResult<T> + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(THREADS));
    let op = Arc::new(op);

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let svc = Arc::clone(svc);
            let barrier = Arc::clone(&barrier);
            let op = Arc::clone(&op);
            thread::spawn(move || {
                barrier.wait();
                op(&svc, i)
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn assert_reviewer_invariants(pr: &PullRequest) {
    assert!(pr.assigned_reviewers.len() <= 2);
    assert!(!pr.has_reviewer(&pr.author_id));
    let distinct: HashSet<&String> = pr.assigned_reviewers.iter().collect();
    assert_eq!(distinct.len(), pr.assigned_reviewers.len());
}

#[test]
fn concurrent_reassign_of_same_reviewer_has_one_winner() {
    let svc = Arc::new(random());
    seed_team(&svc, &["r1", "r2", "r3", "r4", "r5", "r6"]);
    let pr = svc.create_pr("p1", "Add search", "a").unwrap();
    let target = pr.assigned_reviewers[0].clone();

    let op_target = target.clone();
    let results = race(&svc, move |svc, _| svc.reassign_reviewer("p1", &op_target));

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.code(), ErrorCode::NotAssigned);
    }

    let stored = store(&svc).get_pr("p1").unwrap().unwrap();
    assert_reviewer_invariants(&stored);
    assert!(!stored.has_reviewer(&target));
    assert!(stored.has_reviewer(&winners[0].replaced_by));
}

#[test]
fn concurrent_reassign_of_different_reviewers_keeps_set_valid() {
    let svc = Arc::new(random());
    seed_team(&svc, &["r1", "r2", "r3", "r4", "r5", "r6"]);

    for round in 0..10 {
        let id = format!("p{}", round);
        let pr = svc.create_pr(&id, "Change", "a").unwrap();
        let reviewers = Arc::new(pr.assigned_reviewers.clone());

        let op_id = id.clone();
        let results = race(&svc, move |svc, i| {
            svc.reassign_reviewer(&op_id, &reviewers[i % reviewers.len()])
        });

        assert!(results.iter().any(|r| r.is_ok()));
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(
                err.code(),
                ErrorCode::NotAssigned | ErrorCode::NoCandidate
            ));
        }

        let stored = store(&svc).get_pr(&id).unwrap().unwrap();
        assert_eq!(stored.assigned_reviewers.len(), 2);
        assert_reviewer_invariants(&stored);
    }
}

#[test]
fn merge_racing_reassign_never_swaps_after_merge() {
    let svc = Arc::new(random());
    seed_team(&svc, &["r1", "r2", "r3", "r4"]);
    let pr = svc.create_pr("p1", "Add search", "a").unwrap();
    let target = pr.assigned_reviewers[0].clone();

    let results = race(&svc, move |svc, i| {
        if i == 0 {
            svc.merge_pr("p1").map(|_| None)
        } else {
            svc.reassign_reviewer("p1", &target).map(|r| Some(r.replaced_by))
        }
    });

    assert!(results[0].is_ok());
    let merged = store(&svc).get_pr("p1").unwrap().unwrap();
    assert_eq!(merged.status, PrStatus::Merged);
    assert_reviewer_invariants(&merged);

    // Any swap that landed did so before the merge and is still visible.
    for replaced_by in results.iter().filter_map(|r| r.as_ref().ok()).flatten() {
        assert!(merged.has_reviewer(replaced_by));
    }
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(
            err.code(),
            ErrorCode::PrMerged | ErrorCode::NotAssigned
        ));
    }

    // A merged PR is terminal.
    let again = svc.merge_pr("p1").unwrap();
    assert_eq!(again.merged_at, merged.merged_at);
}

#[test]
fn concurrent_create_with_same_id_creates_once() {
    let svc = Arc::new(random());
    seed_team(&svc, &["r1", "r2", "r3"]);

    let results = race(&svc, |svc, i| {
        svc.create_pr("dup", &format!("attempt {}", i), "a")
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.code(), ErrorCode::PrExists);
    }
}

#[test]
fn races_hold_when_reads_use_the_reader_pool() {
    let dir = tempfile::tempdir().unwrap();
    let svc = Arc::new(file_backed(&dir, Arc::new(RandomSelector)));
    seed_team(&svc, &["r1", "r2", "r3", "r4", "r5", "r6"]);

    for round in 0..10 {
        let id = format!("p{}", round);
        let pr = svc.create_pr(&id, "Change", "a").unwrap();
        let target = pr.assigned_reviewers[0].clone();

        let op_id = id.clone();
        let op_target = target.clone();
        let results = race(&svc, move |svc, i| {
            if i == 0 {
                svc.merge_pr(&op_id).map(|_| None)
            } else {
                svc.reassign_reviewer(&op_id, &op_target)
                    .map(|r| Some(r.replaced_by))
            }
        });

        assert!(results[0].is_ok());
        let swaps: Vec<&String> = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .flatten()
            .collect();
        assert!(swaps.len() <= 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(
                err.code(),
                ErrorCode::PrMerged | ErrorCode::NotAssigned
            ));
        }

        let stored = store(&svc).get_pr(&id).unwrap().unwrap();
        assert_eq!(stored.status, PrStatus::Merged);
        assert_reviewer_invariants(&stored);
        match swaps.first() {
            Some(replaced_by) => {
                assert!(stored.has_reviewer(replaced_by));
                assert!(!stored.has_reviewer(&target));
            }
            None => assert_eq!(stored.assigned_reviewers, pr.assigned_reviewers),
        }
    }

    let results = race(&svc, |svc, i| {
        svc.create_pr("dup", &format!("attempt {}", i), "a")
    });
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.code(), ErrorCode::PrExists);
    }
}
