//! Line-overlap scoring between the current PR and historical PRs touching
//! the same files. SPEC_FULL §4.8.2.

use super::patch;
use crate::errors::ForgeError;
use crate::forge_client::ForgeClient;
use crate::models::{ChangedFile, OverlapResult, PrInfo};
use chrono::{Duration, Utc};
use futures::future::join_all;
use std::collections::HashMap;

const MAX_HISTORICAL_PRS: usize = 10;
const MAX_ANALYSES_PER_FILE: usize = 3;
const CONTEXT_DISTANCE: i64 = 2;
const NEARBY_LINES: i64 = 5;
const CONTEXT_MATCH_WEIGHT: f64 = 0.5;
const NEARBY_MATCH_WEIGHT: f64 = 0.2;
const OVERLAP_DECAY_DAYS: f64 = 30.0;
const MIN_OVERLAP_THRESHOLD: f64 = 0.0;

struct Accumulator {
    info: PrInfo,
    overlap_count: u64,
    overlap_score: f64,
}

/// Ranks historical PRs by how much their changed lines overlap with the
/// current PR's, across all of the current PR's changed files.
pub async fn line_overlap(
    client: &dyn ForgeClient,
    owner: &str,
    repo: &str,
    changed_files: &[ChangedFile],
) -> Result<Vec<OverlapResult>, ForgeError> {
    let mut accumulated: HashMap<u64, Accumulator> = HashMap::new();

    for file in changed_files {
        let current_core = patch::core_lines(&file.patch);
        if current_core.is_empty() {
            continue;
        }

        let historical = client
            .historical_prs_for_file(owner, repo, &file.filename, MAX_HISTORICAL_PRS)
            .await?;

        let already_saturated: Vec<u64> = accumulated
            .iter()
            .filter(|(_, acc)| acc.overlap_score > MIN_OVERLAP_THRESHOLD)
            .map(|(&num, _)| num)
            .collect();

        let candidates: Vec<&PrInfo> = historical
            .iter()
            .filter(|pr| !already_saturated.contains(&pr.number))
            .take(MAX_ANALYSES_PER_FILE)
            .collect();

        let patches = join_all(candidates.iter().map(|pr| {
            client.file_patch(owner, repo, pr.number, &file.filename)
        }))
        .await;

        for (pr, patch_result) in candidates.into_iter().zip(patches) {
            let Ok(historical_patch) = patch_result else {
                continue;
            };
            let historical_set = patch::changed_lines(&historical_patch);
            if historical_set.is_empty() {
                continue;
            }

            let (exact, context, nearby) = bucket_overlap(&current_core, &historical_set);
            if exact + context + nearby == 0 {
                continue;
            }

            let raw_score = exact as f64 * 1.0
                + context as f64 * CONTEXT_MATCH_WEIGHT
                + nearby as f64 * NEARBY_MATCH_WEIGHT;
            let recency = recency_factor(pr.merged_at);
            let score = raw_score * recency;

            let entry = accumulated.entry(pr.number).or_insert_with(|| Accumulator {
                info: pr.clone(),
                overlap_count: 0,
                overlap_score: 0.0,
            });
            entry.overlap_count += exact + context + nearby;
            entry.overlap_score += score;
        }
    }

    let mut results: Vec<OverlapResult> = accumulated
        .into_values()
        .map(|acc| OverlapResult {
            pr_number: acc.info.number,
            author: acc.info.author,
            merged_by: acc.info.merged_by,
            reviewers: acc.info.reviewers,
            merged_at: acc.info.merged_at,
            overlap_count: acc.overlap_count,
            overlap_score: acc.overlap_score,
        })
        .collect();

    results.sort_by(|a, b| b.overlap_score.partial_cmp(&a.overlap_score).unwrap());
    Ok(results)
}

/// For each line in `current`, finds the minimum distance to any line in
/// `historical` and buckets it into exact (0) / context (1-2) /
/// nearby (3-`NEARBY_LINES`) / ignored (beyond that).
fn bucket_overlap(
    current: &std::collections::BTreeSet<i64>,
    historical: &std::collections::BTreeSet<i64>,
) -> (u64, u64, u64) {
    let (mut exact, mut context, mut nearby) = (0u64, 0u64, 0u64);

    for &line in current {
        let distance = historical
            .iter()
            .map(|&h| (h - line).abs())
            .min()
            .unwrap_or(i64::MAX);

        if distance == 0 {
            exact += 1;
        } else if distance <= CONTEXT_DISTANCE {
            context += 1;
        } else if distance <= NEARBY_LINES {
            nearby += 1;
        }
    }

    (exact, context, nearby)
}

fn recency_factor(merged_at: Option<chrono::DateTime<Utc>>) -> f64 {
    let Some(merged_at) = merged_at else { return 1.0 };
    let days_since = (Utc::now() - merged_at).num_seconds() as f64 / 86_400.0;
    1.0 / (1.0 + days_since.max(0.0) / OVERLAP_DECAY_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_spec_example_hunks_when_bucketed_then_three_exact_matches() {
        let current = patch::core_lines("@@ -10,0 +10,3 @@\n+a\n+b\n+c\n");
        let historical = patch::changed_lines("@@ -0,0 +10,1 @@\n+a\n");
        let (exact, context, nearby) = bucket_overlap(&current, &historical);
        assert_eq!((exact, context, nearby), (3, 0, 0));
        let raw_score = exact as f64 * 1.0 + context as f64 * CONTEXT_MATCH_WEIGHT + nearby as f64 * NEARBY_MATCH_WEIGHT;
        assert_eq!(raw_score, 3.0);
    }

    #[test]
    fn given_recent_merge_when_computing_recency_then_close_to_one() {
        let factor = recency_factor(Some(Utc::now()));
        assert!(factor > 0.99);
    }

    #[test]
    fn given_old_merge_when_computing_recency_then_decayed() {
        let factor = recency_factor(Some(Utc::now() - Duration::days(90)));
        assert!(factor < 0.3);
    }

    #[test]
    fn given_no_merge_date_when_computing_recency_then_full_weight() {
        assert_eq!(recency_factor(None), 1.0);
    }

    #[test]
    fn given_far_apart_lines_when_bucketed_then_ignored() {
        let current: std::collections::BTreeSet<i64> = [100].into_iter().collect();
        let historical: std::collections::BTreeSet<i64> = [1].into_iter().collect();
        assert_eq!(bucket_overlap(&current, &historical), (0, 0, 0));
    }
}
