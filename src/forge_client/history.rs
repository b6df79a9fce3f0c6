//! Historical-PR lookups backing the overlap and directory/project finders
//! (SPEC_FULL §4.8.2 / §4.8.3) plus the domain-expertise cache (§4.8.4).

use crate::errors::ForgeError;
use crate::forge_client::client::GithubForgeClient;
use crate::forge_client::{urlencode, ForgeClient as _};
use crate::models::PrInfo;
use chrono::Duration;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

const HISTORICAL_PRS_TTL: Duration = Duration::days(28);
const RECENT_ACTIVITY_TTL: Duration = Duration::hours(4);
const DIRECTORY_OWNERS_TTL: Duration = Duration::hours(4);

#[derive(Deserialize)]
struct RawSearchIssue {
    number: u64,
    user: RawUser,
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Deserialize)]
struct RawSearchResult {
    items: Vec<RawSearchIssue>,
}

async fn search_merged_prs(
    client: &GithubForgeClient,
    owner: &str,
    repo: &str,
    term: &str,
    limit: usize,
) -> Result<Vec<PrInfo>, ForgeError> {
    let cancel = CancellationToken::new();
    let query = format!("is:pr is:merged repo:{owner}/{repo} {term}");
    let path = format!("/search/issues?q={}&per_page={}", urlencode(&query), limit.min(100));
    let response = client
        .transport()
        .request(Method::GET, &path, Some(owner), None, &cancel)
        .await?;
    let raw: RawSearchResult = response.json().await.map_err(ForgeError::Http)?;

    let mut out = Vec::with_capacity(raw.items.len());
    for item in raw.items.into_iter().take(limit) {
        if item.pull_request.is_none() {
            continue;
        }
        let pr = client.pull_request(owner, repo, item.number, None).await.ok();
        out.push(PrInfo {
            number: item.number,
            author: item.user.login,
            merged_by: None,
            merged_at: pr.as_ref().and_then(|p| p.last_commit),
            reviewers: pr.map(|p| p.reviewers).unwrap_or_default(),
        });
    }
    Ok(out)
}

/// Up to `limit` most-recent merged PRs whose changed files included
/// `filename`, ordered most-recent-first, cached 28 days per §6.
pub async fn historical_prs_for_file(
    client: &GithubForgeClient,
    owner: &str,
    repo: &str,
    filename: &str,
    limit: usize,
) -> Result<Vec<PrInfo>, ForgeError> {
    let key = format!("pr-history:{owner}/{repo}:{filename}");
    if let Some(cached) = client.cache().get(&key) {
        if let Ok(prs) = serde_json::from_value::<Vec<PrInfo>>(cached) {
            return Ok(prs);
        }
    }

    let prs = search_merged_prs(client, owner, repo, &format!("\"{filename}\""), limit).await?;
    client.cache().set_with_ttl(
        &key,
        serde_json::to_value(&prs).map_err(ForgeError::Json)?,
        HISTORICAL_PRS_TTL,
    );
    Ok(prs)
}

/// Recent merged PRs touching `directory`, cached 4 hours (§6 "recent
/// activity") since this feeds the directory/project finders that are meant
/// to reflect current ownership, not all-time history.
pub async fn recent_prs_for_directory(
    client: &GithubForgeClient,
    owner: &str,
    repo: &str,
    directory: &str,
    limit: usize,
) -> Result<Vec<PrInfo>, ForgeError> {
    let key = format!("recent-prs:{owner}:{repo}:{directory}");
    if let Some(cached) = client.cache().get(&key) {
        if let Ok(prs) = serde_json::from_value::<Vec<PrInfo>>(cached) {
            return Ok(prs);
        }
    }

    let prs = search_merged_prs(client, owner, repo, &format!("\"{directory}\""), limit).await?;
    client.cache().set_with_ttl(
        &key,
        serde_json::to_value(&prs).map_err(ForgeError::Json)?,
        RECENT_ACTIVITY_TTL,
    );
    Ok(prs)
}

/// Cached `[0, 1]` expertise score for `user` over `directory`. On a cache
/// miss, computed as the fraction of recent directory PRs the user
/// authored or reviewed, then cached under the directory-owners TTL.
pub async fn domain_expertise(
    client: &GithubForgeClient,
    owner: &str,
    repo: &str,
    user: &str,
    directory: &str,
) -> Result<f64, ForgeError> {
    let key = format!("domain-expertise:{owner}:{repo}:{user}:{directory}");
    if let Some(cached) = client.cache().get(&key) {
        if let Ok(score) = serde_json::from_value::<f64>(cached) {
            return Ok(score);
        }
    }

    let prs = recent_prs_for_directory(client, owner, repo, directory, 50).await?;
    let score = if prs.is_empty() {
        0.0
    } else {
        let touched = prs
            .iter()
            .filter(|p| p.author == user || p.reviewers.iter().any(|r| r == user))
            .count();
        (touched as f64 / prs.len() as f64).min(1.0)
    };

    client
        .cache()
        .set_with_ttl(&key, json!(score), DIRECTORY_OWNERS_TTL);
    Ok(score)
}
