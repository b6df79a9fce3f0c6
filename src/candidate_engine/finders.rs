//! Directory/project reviewer and author finders. SPEC_FULL §4.8.3.

use crate::classifier::is_likely_bot;
use crate::errors::ForgeError;
use crate::forge_client::ForgeClient;
use crate::models::{ChangedFile, PrInfo};
use std::collections::{HashMap, HashSet};

const MERGER_WEIGHT_MULTIPLIER: u64 = 2;
const RECENT_PRS_PER_DIRECTORY: usize = 50;

/// Parent directories of every changed file, deduplicated and sorted
/// deepest-first (most specific directory wins ties on evaluation order).
pub fn directories_by_depth(changed_files: &[ChangedFile]) -> Vec<String> {
    let mut dirs: HashSet<String> = HashSet::new();
    for file in changed_files {
        if let Some(idx) = file.filename.rfind('/') {
            dirs.insert(file.filename[..idx].to_string());
        } else {
            dirs.insert(String::new());
        }
    }

    let mut sorted: Vec<String> = dirs.into_iter().collect();
    sorted.sort_by(|a, b| {
        let depth_a = a.matches('/').count();
        let depth_b = b.matches('/').count();
        depth_b.cmp(&depth_a).then_with(|| a.cmp(b))
    });
    sorted
}

fn tally_frequencies(prs: &[PrInfo]) -> HashMap<String, u64> {
    let mut freq: HashMap<String, u64> = HashMap::new();
    for pr in prs {
        *freq.entry(pr.author.clone()).or_insert(0) += 1;
        for reviewer in &pr.reviewers {
            *freq.entry(reviewer.clone()).or_insert(0) += 1;
        }
        if let Some(merger) = &pr.merged_by {
            if merger != &pr.author {
                *freq.entry(merger.clone()).or_insert(0) += MERGER_WEIGHT_MULTIPLIER;
            }
        }
    }
    freq
}

fn best_candidate(freq: &HashMap<String, u64>) -> Option<String> {
    freq.iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(login, _)| login.clone())
}

/// Visits directories deepest-first, asks the forge for that directory's
/// recent PR activity, and keeps the highest-frequency contributor that
/// passes `is_valid_reviewer` and isn't the PR author or explicitly
/// excluded. Stops contributing duplicates once a login has already been
/// suggested for a shallower directory.
pub async fn find_directory_reviewers(
    client: &dyn ForgeClient,
    owner: &str,
    repo: &str,
    changed_files: &[ChangedFile],
    pr_author: &str,
    exclude: &[String],
) -> Result<Vec<String>, ForgeError> {
    let directories = directories_by_depth(changed_files);
    let mut suggested = Vec::new();
    let mut seen: HashSet<String> = exclude.iter().cloned().collect();
    seen.insert(pr_author.to_string());

    for directory in directories {
        let recent = client
            .recent_prs_for_directory(owner, repo, &directory, RECENT_PRS_PER_DIRECTORY)
            .await?;
        let mut freq = tally_frequencies(&recent);
        freq.retain(|login, _| !seen.contains(login));

        while let Some(candidate) = best_candidate(&freq) {
            if is_valid_reviewer(client, owner, repo, &candidate).await? {
                seen.insert(candidate.clone());
                suggested.push(candidate);
                break;
            }
            freq.remove(&candidate);
        }
    }

    Ok(suggested)
}

/// A reviewer is valid when they're not a bot and hold write access on the
/// repository. Distinctness is enforced by the caller's `seen` set.
async fn is_valid_reviewer(
    client: &dyn ForgeClient,
    owner: &str,
    repo: &str,
    login: &str,
) -> Result<bool, ForgeError> {
    if is_likely_bot(login) {
        return Ok(false);
    }
    client.has_write_access(owner, repo, login).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> ChangedFile {
        ChangedFile {
            filename: path.to_string(),
            status: "modified".to_string(),
            patch: String::new(),
            additions: 1,
            deletions: 0,
        }
    }

    #[test]
    fn given_mixed_depth_files_when_sorting_directories_then_deepest_first() {
        let files = vec![file("a/b/c.rs"), file("a/d.rs"), file("top.rs")];
        let dirs = directories_by_depth(&files);
        assert_eq!(dirs, vec!["a/b".to_string(), "a".to_string(), String::new()]);
    }

    #[test]
    fn given_ties_when_picking_best_candidate_then_lexicographic_tiebreak() {
        let freq: HashMap<String, u64> = [("zed".to_string(), 3), ("amy".to_string(), 3)].into();
        assert_eq!(best_candidate(&freq), Some("amy".to_string()));
    }

    #[test]
    fn given_merger_distinct_from_author_when_tallying_then_doubly_weighted() {
        let prs = vec![PrInfo {
            number: 1,
            author: "alice".to_string(),
            merged_by: Some("bob".to_string()),
            merged_at: None,
            reviewers: vec![],
        }];
        let freq = tally_frequencies(&prs);
        assert_eq!(freq.get("bob"), Some(&2));
        assert_eq!(freq.get("alice"), Some(&1));
    }

    #[test]
    fn given_self_merge_when_tallying_then_no_double_count() {
        let prs = vec![PrInfo {
            number: 1,
            author: "alice".to_string(),
            merged_by: Some("alice".to_string()),
            merged_at: None,
            reviewers: vec![],
        }];
        let freq = tally_frequencies(&prs);
        assert_eq!(freq.get("alice"), Some(&1));
    }
}
