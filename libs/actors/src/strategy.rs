//! Member Selection Strategies
//!
//! When several cluster members advertise the same service, a strategy
//! picks which one serves the next request. Round-robin shares a cursor
//! across calls; random needs no state at all.

use hive_types::Member;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Policy for picking one member out of a candidate set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteStrategy {
    #[default]
    RoundRobin,
    Random,
    /// Always the lowest-ordered member; useful for sticky routing
    First,
}

impl RouteStrategy {
    /// Pick a member. The cursor is only advanced by round-robin; callers
    /// keep one cursor per candidate set.
    pub fn pick<'a>(&self, members: &'a [Member], cursor: &AtomicUsize) -> Option<&'a Member> {
        if members.is_empty() {
            return None;
        }
        let idx = match self {
            RouteStrategy::RoundRobin => cursor.fetch_add(1, Ordering::Relaxed) % members.len(),
            RouteStrategy::Random => rand::thread_rng().gen_range(0..members.len()),
            RouteStrategy::First => 0,
        };
        members.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(n: u64) -> Vec<Member> {
        (1..=n).map(|id| Member::new(id, "worker")).collect()
    }

    #[test]
    fn empty_set_yields_none() {
        let cursor = AtomicUsize::new(0);
        assert!(RouteStrategy::RoundRobin.pick(&[], &cursor).is_none());
        assert!(RouteStrategy::Random.pick(&[], &cursor).is_none());
    }

    #[test]
    fn round_robin_cycles() {
        let set = members(3);
        let cursor = AtomicUsize::new(0);
        let picks: Vec<u64> = (0..6)
            .map(|_| RouteStrategy::RoundRobin.pick(&set, &cursor).unwrap().id)
            .collect();
        assert_eq!(picks, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn random_stays_in_bounds() {
        let set = members(4);
        let cursor = AtomicUsize::new(0);
        for _ in 0..64 {
            let picked = RouteStrategy::Random.pick(&set, &cursor).unwrap();
            assert!((1..=4).contains(&picked.id));
        }
    }

    #[test]
    fn first_ignores_the_cursor() {
        let set = members(3);
        let cursor = AtomicUsize::new(5);
        for _ in 0..3 {
            assert_eq!(RouteStrategy::First.pick(&set, &cursor).unwrap().id, 1);
        }
    }

    #[test]
    fn single_member_always_selected() {
        let set = members(1);
        let cursor = AtomicUsize::new(7);
        for strategy in [
            RouteStrategy::RoundRobin,
            RouteStrategy::Random,
            RouteStrategy::First,
        ] {
            assert_eq!(strategy.pick(&set, &cursor).unwrap().id, 1);
        }
    }
}
