//! # Candidate Filtering
//!
//! Two passes applied to every page of search results:
//!
//! - **Activity**: drop candidates whose last visit is at least the freshness
//!   threshold in the past. Elapsed time is rounded up to whole days.
//!   A candidate without a last-seen timestamp counts as last seen at the
//!   epoch, which always exceeds the threshold.
//! - **Exclusion**: drop candidates the viewer already put into favorites or
//!   the blacklist.
//!
//! Both passes keep the input order of the survivors.

use std::collections::HashSet;

use crate::vk::VkUser;

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Whole days between `last_seen` and `now`, rounded up
pub fn elapsed_days(now: i64, last_seen: i64) -> i64 {
    let diff = now - last_seen;
    if diff > 0 {
        (diff + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    } else {
        // Truncating division already rounds non-positive values up
        diff / SECONDS_PER_DAY
    }
}

/// Keep candidates seen fewer than `threshold_days` days before `now`
pub fn retain_active(candidates: Vec<VkUser>, now: i64, threshold_days: i64) -> Vec<VkUser> {
    candidates
        .into_iter()
        .filter(|candidate| elapsed_days(now, candidate.last_seen_time()) < threshold_days)
        .collect()
}

/// External identities a viewer has already sorted into a list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedIds {
    pub favorites: HashSet<i64>,
    pub blocked: HashSet<i64>,
}

impl ExcludedIds {
    pub fn contains(&self, vk_id: i64) -> bool {
        self.favorites.contains(&vk_id) || self.blocked.contains(&vk_id)
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty() && self.blocked.is_empty()
    }
}

/// Drop candidates present in either exclusion set
pub fn exclude_known(candidates: Vec<VkUser>, excluded: &ExcludedIds) -> Vec<VkUser> {
    if excluded.is_empty() {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|candidate| !excluded.contains(candidate.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vk::types::LastSeen;

    const NOW: i64 = 1_700_000_000;

    fn candidate(id: i64, last_seen: Option<i64>) -> VkUser {
        VkUser {
            id,
            first_name: format!("First{id}"),
            last_name: format!("Last{id}"),
            sex: 1,
            bdate: None,
            city: None,
            last_seen: last_seen.map(|time| LastSeen {
                time,
                platform: None,
            }),
        }
    }

    fn ids(users: &[VkUser]) -> Vec<i64> {
        users.iter().map(|u| u.id).collect()
    }

    #[test]
    fn test_elapsed_days_rounds_up() {
        assert_eq!(elapsed_days(NOW, NOW), 0);
        assert_eq!(elapsed_days(NOW, NOW - 1), 1);
        assert_eq!(elapsed_days(NOW, NOW - SECONDS_PER_DAY), 1);
        assert_eq!(elapsed_days(NOW, NOW - SECONDS_PER_DAY - 1), 2);
        assert_eq!(elapsed_days(NOW, NOW + 10), 0);
    }

    #[test]
    fn test_activity_boundary_at_ten_days() {
        let candidates = vec![
            candidate(1, Some(NOW - 9 * SECONDS_PER_DAY)),
            candidate(2, Some(NOW - 10 * SECONDS_PER_DAY)),
            candidate(3, Some(NOW - 9 * SECONDS_PER_DAY - 1)),
        ];

        let active = retain_active(candidates, NOW, 10);
        assert_eq!(ids(&active), vec![1]);
    }

    #[test]
    fn test_missing_last_seen_counts_as_inactive() {
        let active = retain_active(vec![candidate(1, None), candidate(2, Some(NOW))], NOW, 10);
        assert_eq!(ids(&active), vec![2]);
    }

    #[test]
    fn test_exclusion_is_exact_set_difference() {
        let candidates: Vec<VkUser> = (1..=8).map(|id| candidate(id, Some(NOW))).collect();
        let excluded = ExcludedIds {
            favorites: [2, 5].into_iter().collect(),
            blocked: [5, 7, 99].into_iter().collect(),
        };

        let kept = exclude_known(candidates, &excluded);
        assert_eq!(ids(&kept), vec![1, 3, 4, 6, 8]);
        assert!(kept.iter().all(|c| !excluded.contains(c.id)));
    }

    #[test]
    fn test_empty_exclusions_keep_everything() {
        let candidates: Vec<VkUser> = (1..=3).map(|id| candidate(id, Some(NOW))).collect();
        let kept = exclude_known(candidates, &ExcludedIds::default());
        assert_eq!(ids(&kept), vec![1, 2, 3]);
    }
}
