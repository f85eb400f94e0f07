use rand::seq::index;
use review_types::User;

/// Picks reviewers out of a candidate pool.
///
/// Implementations return `min(count, candidates.len())` distinct entries
/// and never modify the pool.
pub trait ReviewerSelector: Send + Sync {
    fn select(&self, candidates: &[User], count: usize) -> Vec<User>;
}

/// Uniform sampling without replacement from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl ReviewerSelector for RandomSelector {
    fn select(&self, candidates: &[User], count: usize) -> Vec<User> {
        let amount = count.min(candidates.len());
        if amount == 0 {
            return Vec::new();
        }

        let mut rng = rand::rng();
        index::sample(&mut rng, candidates.len(), amount)
            .into_iter()
            .map(|i| candidates[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn pool(n: usize) -> Vec<User> {
        (0..n)
            .map(|i| User {
                user_id: format!("u{}", i),
                username: format!("user {}", i),
                is_active: true,
            })
            .collect()
    }

    #[test]
    fn empty_pool_or_zero_count_selects_nothing() {
        assert!(RandomSelector.select(&[], 2).is_empty());
        assert!(RandomSelector.select(&pool(3), 0).is_empty());
    }

    #[test]
    fn count_is_capped_at_pool_size() {
        let candidates = pool(1);
        let picked = RandomSelector.select(&candidates, 2);
        assert_eq!(picked, candidates);
    }

    #[test]
    fn picks_are_distinct_and_from_the_pool() {
        let candidates = pool(5);
        for _ in 0..200 {
            let picked = RandomSelector.select(&candidates, 2);
            assert_eq!(picked.len(), 2);
            assert_ne!(picked[0].user_id, picked[1].user_id);
            assert!(picked.iter().all(|p| candidates.contains(p)));
        }
        assert_eq!(candidates, pool(5));
    }

    #[test]
    fn every_candidate_gets_picked_roughly_equally() {
        let candidates = pool(3);
        let mut hits: HashMap<String, usize> = HashMap::new();

        // Two of three: each candidate should land in about 2/3 of draws,
        // including the last one.
        for _ in 0..3000 {
            for p in RandomSelector.select(&candidates, 2) {
                *hits.entry(p.user_id).or_default() += 1;
            }
        }

        let seen: HashSet<&String> = hits.keys().collect();
        assert_eq!(seen.len(), 3);
        for count in hits.values() {
            assert!((1800..=2200).contains(count), "skewed selection: {:?}", hits);
        }
    }
}
