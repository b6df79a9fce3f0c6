//! Weighted candidate scoring. SPEC_FULL §4.8.4.

use crate::models::{ChangedFile, ScoreFactors};

const FILE_OVERLAP_WEIGHT: f64 = 0.40;
const RECENCY_WEIGHT: f64 = 0.35;
const EXPERTISE_WEIGHT: f64 = 0.25;

const PROD_CODE_MULTIPLIER: f64 = 1.2;
const CRITICAL_FILE_MULTIPLIER: f64 = 1.5;
const REFACTORING_MULTIPLIER: f64 = 0.8;

const CRITICAL_MARKERS: [&str; 8] = [
    "main.go", "handler", "server", "auth", "security", "payment", "database", "migration",
];
const TEST_MARKERS: [&str; 5] = ["_test.", "/test/", "/tests/", ".test.", ".spec."];

const RECENT_ACTIVITY_SCORE: f64 = 0.9;
const WEEK_ACTIVITY_SCORE: f64 = 0.7;
const BIWEEKLY_ACTIVITY_SCORE: f64 = 0.5;
const MONTHLY_ACTIVITY_SCORE: f64 = 0.3;
const BIMONTHLY_ACTIVITY_SCORE: f64 = 0.15;
const QUARTERLY_ACTIVITY_SCORE: f64 = 0.05;
const INACTIVITY_DISCARD_DAYS: f64 = 90.0;

fn is_test_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    TEST_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_critical_file(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    CRITICAL_MARKERS.iter().any(|m| lower.contains(m))
}

fn file_weight(file: &ChangedFile) -> f64 {
    let mut weight = (file.additions + file.deletions).max(1) as f64;
    if !is_test_file(&file.filename) {
        weight *= PROD_CODE_MULTIPLIER;
    }
    if is_critical_file(&file.filename) {
        weight *= CRITICAL_FILE_MULTIPLIER;
    }
    if file.deletions > file.additions {
        weight *= REFACTORING_MULTIPLIER;
    }
    weight
}

/// `file_overlap` factor: the weighted share of the PR's changed-line
/// footprint that the contributor has previously touched, per
/// `touched_by_contributor(filename)`.
pub fn file_overlap_score(
    changed_files: &[ChangedFile],
    touched_by_contributor: impl Fn(&str) -> bool,
) -> f64 {
    let mut touched_weight = 0.0;
    let mut total_weight = 0.0;

    for file in changed_files {
        let weight = file_weight(file);
        total_weight += weight;
        if touched_by_contributor(&file.filename) {
            touched_weight += weight;
        }
    }

    if total_weight == 0.0 {
        0.0
    } else {
        (touched_weight / total_weight).min(1.0)
    }
}

/// Stepped decay on days since the contributor's last relevant activity.
/// Returns `None` once the contributor has been inactive past the discard
/// window, signalling the caller to drop them before scoring.
pub fn recency_score(days_since_activity: f64) -> Option<f64> {
    let score = if days_since_activity <= 1.0 {
        1.0
    } else if days_since_activity <= 3.0 {
        RECENT_ACTIVITY_SCORE
    } else if days_since_activity <= 7.0 {
        WEEK_ACTIVITY_SCORE
    } else if days_since_activity <= 14.0 {
        BIWEEKLY_ACTIVITY_SCORE
    } else if days_since_activity <= 30.0 {
        MONTHLY_ACTIVITY_SCORE
    } else if days_since_activity <= 60.0 {
        BIMONTHLY_ACTIVITY_SCORE
    } else if days_since_activity <= INACTIVITY_DISCARD_DAYS {
        QUARTERLY_ACTIVITY_SCORE
    } else {
        return None;
    };
    Some(score)
}

pub fn total_score(factors: ScoreFactors) -> f64 {
    FILE_OVERLAP_WEIGHT * factors.file_overlap
        + RECENCY_WEIGHT * factors.recency
        + EXPERTISE_WEIGHT * factors.expertise
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, additions: u64, deletions: u64) -> ChangedFile {
        ChangedFile {
            filename: path.to_string(),
            status: "modified".to_string(),
            patch: String::new(),
            additions,
            deletions,
        }
    }

    #[test]
    fn given_contributor_touched_every_file_when_scoring_overlap_then_full_weight() {
        let files = vec![file("src/lib.rs", 10, 0), file("src/auth.rs", 5, 0)];
        let score = file_overlap_score(&files, |_| true);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn given_contributor_touched_no_files_when_scoring_overlap_then_zero() {
        let files = vec![file("src/lib.rs", 10, 0)];
        let score = file_overlap_score(&files, |_| false);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn given_critical_file_touched_when_scoring_overlap_then_weighted_above_proportional_share() {
        let files = vec![file("src/auth.rs", 10, 0), file("src/util.rs", 10, 0)];
        let score = file_overlap_score(&files, |f| f.contains("auth"));
        assert!(score > 0.5);
    }

    #[test]
    fn given_one_day_since_activity_when_scoring_recency_then_full_weight() {
        assert_eq!(recency_score(1.0), Some(1.0));
    }

    #[test]
    fn given_91_days_since_activity_when_scoring_recency_then_discarded() {
        assert_eq!(recency_score(91.0), None);
    }

    #[test]
    fn given_exactly_90_days_when_scoring_recency_then_quarterly_score() {
        assert_eq!(recency_score(90.0), Some(QUARTERLY_ACTIVITY_SCORE));
    }

    #[test]
    fn given_factors_when_totaling_then_weighted_sum() {
        let factors = ScoreFactors {
            file_overlap: 1.0,
            recency: 1.0,
            expertise: 1.0,
        };
        assert!((total_score(factors) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn given_zero_factors_when_totaling_then_zero() {
        let factors = ScoreFactors::default();
        assert_eq!(total_score(factors), 0.0);
    }
}
