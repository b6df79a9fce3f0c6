//! Reviewer/author candidate ranking for a pull request. SPEC_FULL §4.8.
//! Composes the patch parser, line-overlap analysis, directory/project
//! finders, and the scoring formula into one ranked list.

pub mod finders;
pub mod overlap;
pub mod patch;
pub mod scoring;

use crate::errors::ForgeError;
use crate::forge_client::ForgeClient;
use crate::models::{CandidateScore, PullRequest, ScoreFactors};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

const TOP_N_LOGGED: usize = 10;

/// Borrows a `ForgeClient` for the lifetime of one ranking pass; holds no
/// state of its own (SPEC_FULL §9: "CandidateEngine borrows ForgeClient, no
/// component holds a back-reference to a composer").
pub struct CandidateEngine<'a> {
    client: &'a dyn ForgeClient,
}

impl<'a> CandidateEngine<'a> {
    pub fn new(client: &'a dyn ForgeClient) -> Self {
        Self { client }
    }

    /// Ranks reviewer/author candidates for `pr`, dropping the PR's own
    /// author and anyone inactive for more than 90 days, sorted descending
    /// by score. Logs the top `TOP_N_LOGGED` candidates.
    pub async fn rank_candidates(&self, pr: &PullRequest) -> Result<Vec<CandidateScore>, ForgeError> {
        let overlaps = overlap::line_overlap(self.client, &pr.owner, &pr.repository, &pr.changed_files).await?;
        let directory_reviewers = finders::find_directory_reviewers(
            self.client,
            &pr.owner,
            &pr.repository,
            &pr.changed_files,
            &pr.author,
            &[],
        )
        .await?;

        let mut last_activity: HashMap<String, DateTime<Utc>> = HashMap::new();
        let mut touched_files: HashMap<String, HashSet<String>> = HashMap::new();

        for result in &overlaps {
            note_activity(&mut last_activity, &result.author, result.merged_at);
            for reviewer in &result.reviewers {
                note_activity(&mut last_activity, reviewer, result.merged_at);
            }
        }

        for file in &pr.changed_files {
            let history = self
                .client
                .historical_prs_for_file(&pr.owner, &pr.repository, &file.filename, 10)
                .await
                .unwrap_or_default();
            for historical_pr in history {
                note_activity(&mut last_activity, &historical_pr.author, historical_pr.merged_at);
                touched_files
                    .entry(historical_pr.author.clone())
                    .or_default()
                    .insert(file.filename.clone());
                for reviewer in &historical_pr.reviewers {
                    note_activity(&mut last_activity, reviewer, historical_pr.merged_at);
                    touched_files
                        .entry(reviewer.clone())
                        .or_default()
                        .insert(file.filename.clone());
                }
            }
        }

        let mut candidates: HashSet<String> = HashSet::new();
        for result in &overlaps {
            candidates.insert(result.author.clone());
            candidates.extend(result.reviewers.iter().cloned());
        }
        candidates.extend(directory_reviewers);
        candidates.remove(&pr.author);

        let mut scored = Vec::with_capacity(candidates.len());
        for login in candidates {
            let days_since = last_activity
                .get(&login)
                .map(|when| (Utc::now() - *when).num_seconds() as f64 / 86_400.0)
                .unwrap_or(f64::INFINITY);

            let Some(recency) = scoring::recency_score(days_since) else {
                continue;
            };

            let touched = touched_files.get(&login).cloned().unwrap_or_default();
            let file_overlap = scoring::file_overlap_score(&pr.changed_files, |f| touched.contains(f));

            let primary_directory = finders::directories_by_depth(&pr.changed_files)
                .into_iter()
                .next()
                .unwrap_or_default();
            let expertise = self
                .client
                .domain_expertise(&pr.owner, &pr.repository, &login, &primary_directory)
                .await
                .unwrap_or(0.0);

            let factors = ScoreFactors {
                file_overlap,
                recency,
                expertise,
            };
            let total = scoring::total_score(factors);

            scored.push(CandidateScore {
                login,
                total,
                factors,
            });
        }

        scored.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap());

        for candidate in scored.iter().take(TOP_N_LOGGED) {
            tracing::info!(
                login = %candidate.login,
                score = candidate.total,
                "ranked reviewer candidate"
            );
        }

        Ok(scored)
    }
}

fn note_activity(map: &mut HashMap<String, DateTime<Utc>>, login: &str, when: Option<DateTime<Utc>>) {
    let Some(when) = when else { return };
    map.entry(login.to_string())
        .and_modify(|existing| {
            if when > *existing {
                *existing = when;
            }
        })
        .or_insert(when);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_newer_activity_when_noting_then_max_kept() {
        let mut map = HashMap::new();
        let earlier = Utc::now() - chrono::Duration::days(10);
        let later = Utc::now();
        note_activity(&mut map, "alice", Some(earlier));
        note_activity(&mut map, "alice", Some(later));
        assert_eq!(map.get("alice"), Some(&later));
    }

    #[test]
    fn given_none_when_noting_activity_then_untouched() {
        let mut map = HashMap::new();
        note_activity(&mut map, "alice", None);
        assert!(map.get("alice").is_none());
    }
}
