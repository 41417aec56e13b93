// Score and rank arithmetic.
//
// Pure functions over score snapshots; no storage access. Overtake and
// next-target computations are full scans over the other users' scores
// (O(users) per applied solve), which is fine at community scale.

use crate::db::User;

/// Milestone granularity below the threshold score.
pub const STEP_SMALL: i64 = 100;
/// Milestone granularity at and above the threshold score.
pub const STEP_LARGE: i64 = 1000;
/// Score at which the milestone granularity widens.
pub const STEP_THRESHOLD: i64 = 1000;

/// Milestone crossed by a score change, if any.
///
/// Thresholds are every 100 points while the old score is below 1000 and
/// every 1000 points afterwards. Returns the highest threshold value the
/// change crossed, e.g. 950 -> 1050 yields 1000 and 95 -> 105 yields 100.
pub fn completed_step(old_score: i64, new_score: i64) -> Option<i64> {
    let granularity = if old_score < STEP_THRESHOLD {
        STEP_SMALL
    } else {
        STEP_LARGE
    };
    if old_score / granularity != new_score / granularity {
        Some((new_score / granularity) * granularity)
    } else {
        None
    }
}

/// Names of the users a score change overtook, ascending by their score.
///
/// A user is overtaken when their (unchanged) score was strictly above the
/// old score and is strictly below the new one. Equal scores are neither
/// above nor exceeded.
pub fn overtaken(others: &[User], old_score: i64, new_score: i64) -> Vec<String> {
    let mut passed: Vec<&User> = others
        .iter()
        .filter(|u| u.score > old_score && u.score < new_score)
        .collect();
    passed.sort_by_key(|u| (u.score, u.id));
    passed.iter().map(|u| u.name.clone()).collect()
}

/// The closest user still strictly above the new score, with the point gap
/// to reach them. None when the user is now the top scorer.
pub fn next_target(others: &[User], new_score: i64) -> Option<(String, i64)> {
    others
        .iter()
        .filter(|u| u.score > new_score)
        .min_by_key(|u| (u.score, u.id))
        .map(|u| (u.name.clone(), u.score - new_score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str, score: i64) -> User {
        User {
            id,
            name: name.to_string(),
            score,
        }
    }

    #[test]
    fn test_step_within_bucket_is_none() {
        assert_eq!(completed_step(80, 95), None);
        assert_eq!(completed_step(0, 99), None);
        assert_eq!(completed_step(1000, 1999), None);
    }

    #[test]
    fn test_step_crossing_small_granularity() {
        assert_eq!(completed_step(95, 105), Some(100));
        assert_eq!(completed_step(199, 200), Some(200));
        assert_eq!(completed_step(0, 100), Some(100));
    }

    #[test]
    fn test_step_crossing_into_large_granularity() {
        // Old score below 1000 keeps the small granularity for the check
        assert_eq!(completed_step(950, 1050), Some(1000));
        assert_eq!(completed_step(999, 1000), Some(1000));
    }

    #[test]
    fn test_step_large_granularity() {
        assert_eq!(completed_step(1500, 2100), Some(2000));
        assert_eq!(completed_step(2100, 2900), None);
        assert_eq!(completed_step(1999, 2000), Some(2000));
    }

    #[test]
    fn test_step_multiple_thresholds_reports_highest() {
        // 50 -> 350 crosses 100, 200 and 300; the crossed value reported is
        // the bucket the new score landed in.
        assert_eq!(completed_step(50, 350), Some(300));
        assert_eq!(completed_step(1000, 4200), Some(4000));
    }

    #[test]
    fn test_overtaken_ascending_by_prior_score() {
        let others = vec![user(2, "B", 120), user(3, "C", 130), user(4, "D", 200)];
        // A at 100 solves a 40-point challenge -> 140, passes B then C
        assert_eq!(overtaken(&others, 100, 140), vec!["B", "C"]);
    }

    #[test]
    fn test_overtaken_none_when_nobody_between() {
        let others = vec![user(2, "B", 500)];
        assert!(overtaken(&others, 100, 140).is_empty());
    }

    #[test]
    fn test_overtaken_excludes_ties() {
        let others = vec![user(2, "B", 100), user(3, "C", 140)];
        // B was tied before (not above); C is tied after (not exceeded)
        assert!(overtaken(&others, 100, 140).is_empty());
    }

    #[test]
    fn test_next_target_reports_gap() {
        let others = vec![user(2, "B", 120), user(3, "C", 130), user(4, "D", 200)];
        assert_eq!(next_target(&others, 140), Some(("D".to_string(), 60)));
    }

    #[test]
    fn test_next_target_none_at_top() {
        let others = vec![user(2, "B", 120), user(3, "C", 130)];
        assert_eq!(next_target(&others, 140), None);
        // A tie at the top also reports no target
        let tied = vec![user(2, "B", 140)];
        assert_eq!(next_target(&tied, 140), None);
    }

    #[test]
    fn test_next_target_tie_between_others_is_stable() {
        let others = vec![user(3, "C", 150), user(2, "B", 150)];
        assert_eq!(next_target(&others, 140), Some(("B".to_string(), 10)));
    }
}
