//! Typed, cache-first operations against the forge's REST and GraphQL
//! surface. SPEC_FULL §4.7. `ForgeClient` is the trait `CandidateEngine`
//! borrows; `GithubForgeClient` is the concrete implementation composing
//! `Transport`, `AuthManager` (via `Transport`), `DiskTier`, and
//! `UserInfoCache`.

mod client;
mod history;
mod pr_counts;
mod util;

pub use client::GithubForgeClient;
pub(crate) use util::urlencode;

use crate::errors::ForgeError;
use crate::models::{ChangedFile, PrInfo, PullRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// An external, richer PR fetcher a caller may register ahead of the native
/// REST path (SPEC_FULL §4.7, "if an external enhanced fetcher is
/// registered, try it first"). No implementation ships in this crate; it
/// exists purely as an extension seam (see DESIGN.md open question).
#[async_trait]
pub trait EnhancedPrFetcher: Send + Sync {
    async fn fetch(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reference_time: DateTime<Utc>,
    ) -> Option<PullRequest>;
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ForgeClient: Send + Sync {
    async fn pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<PullRequest, ForgeError>;

    async fn open_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>, ForgeError>;

    async fn open_pull_requests_for_org(&self, org: &str) -> Result<Vec<PullRequest>, ForgeError>;

    async fn changed_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<ChangedFile>, ForgeError>;

    async fn file_patch(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        filename: &str,
    ) -> Result<String, ForgeError>;

    async fn collaborators(&self, owner: &str, repo: &str) -> Result<Vec<String>, ForgeError>;

    async fn has_write_access(&self, owner: &str, repo: &str, user: &str) -> Result<bool, ForgeError>;

    async fn open_pr_count(
        &self,
        org: &str,
        user: &str,
        ttl: chrono::Duration,
    ) -> Result<u64, ForgeError>;

    async fn batch_open_pr_count(
        &self,
        org: &str,
        users: &[String],
        ttl: chrono::Duration,
    ) -> Result<HashMap<String, u64>, ForgeError>;

    async fn add_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> Result<(), ForgeError>;

    /// Up to `limit` most-recent historical PRs that touched `filename`,
    /// used by the line-overlap analysis (§4.8.2).
    async fn historical_prs_for_file(
        &self,
        owner: &str,
        repo: &str,
        filename: &str,
        limit: usize,
    ) -> Result<Vec<PrInfo>, ForgeError>;

    /// Recent PRs touching `directory`, used by the directory/project
    /// finders (§4.8.3).
    async fn recent_prs_for_directory(
        &self,
        owner: &str,
        repo: &str,
        directory: &str,
        limit: usize,
    ) -> Result<Vec<PrInfo>, ForgeError>;

    /// Cached domain-expertise score in `[0, 1]` for `user` over
    /// `directory` (§4.8.4).
    async fn domain_expertise(
        &self,
        owner: &str,
        repo: &str,
        user: &str,
        directory: &str,
    ) -> Result<f64, ForgeError>;
}
