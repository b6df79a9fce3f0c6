use crate::auth::{AuthManager, PrivateKeyMaterial};
use crate::cache::{DiskTier, MaintenanceHandle};
use crate::classifier::is_likely_bot;
use crate::config::{Credentials, PrivateKeySource, ReviewerConfig};
use crate::errors::ForgeError;
use crate::forge_client::{urlencode, EnhancedPrFetcher, ForgeClient};
use crate::models::{ChangedFile, PullRequest};
use crate::transport::Transport;
use crate::user_cache::UserInfoCache;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const PR_TTL: Duration = Duration::days(20);
const CHANGED_FILES_TTL: Duration = Duration::hours(6);
const COLLABORATORS_TTL: Duration = Duration::hours(6);
const CACHE_DEFAULT_TTL: Duration = Duration::hours(6);

pub struct GithubForgeClient {
    transport: Transport,
    cache: Arc<DiskTier>,
    user_cache: Arc<UserInfoCache>,
    enhanced_fetcher: Option<Arc<dyn EnhancedPrFetcher>>,
    // Held only to keep the sweep/reap background task alive for as long as
    // this client is; never read directly.
    _cache_maintenance: MaintenanceHandle,
}

impl GithubForgeClient {
    /// Wraps `cache` and immediately starts its background sweep/reap task,
    /// tied to this client's lifetime (§4.1/§4.2/§5/§9: no unbounded-lifetime
    /// tasks — the task is cancelled the moment this client is dropped).
    pub fn new(transport: Transport, cache: DiskTier, user_cache: Arc<UserInfoCache>) -> Self {
        let cache = Arc::new(cache);
        let _cache_maintenance = cache.spawn_maintenance();
        Self {
            transport,
            cache,
            user_cache,
            enhanced_fetcher: None,
            _cache_maintenance,
        }
    }

    /// Assembles a `GithubForgeClient` from a loaded `ReviewerConfig`,
    /// wiring up `AuthManager`, `DiskTier`, and `UserInfoCache` per SPEC_FULL
    /// §9 ("ForgeClient owns AuthManager, DiskTier, UserInfoCache").
    pub fn from_config(config: &ReviewerConfig) -> Result<Self, ForgeError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(ForgeError::Http)?;

        let auth = match &config.credentials {
            Credentials::App { app_id, private_key } => {
                let material = match private_key {
                    PrivateKeySource::Inline(bytes) => PrivateKeyMaterial::Inline(bytes.clone()),
                    PrivateKeySource::Path(path) => PrivateKeyMaterial::Path(path.clone()),
                };
                AuthManager::new_app_auth(app_id.clone(), material, config.base_url.clone(), http.clone())
                    .map_err(ForgeError::from)?
            }
            Credentials::PersonalAccessToken(token) => {
                AuthManager::new_pat(token.clone(), config.base_url.clone(), http.clone())
                    .map_err(ForgeError::from)?
            }
        };

        let transport = Transport::new(http, Arc::new(auth), config.base_url.clone());
        let cache = DiskTier::new(config.cache_dir.clone(), CACHE_DEFAULT_TTL)
            .map_err(|e| ForgeError::Config(e.to_string()))?;

        Ok(Self::new(transport, cache, Arc::new(UserInfoCache::new())))
    }

    pub fn with_enhanced_fetcher(mut self, fetcher: Arc<dyn EnhancedPrFetcher>) -> Self {
        self.enhanced_fetcher = Some(fetcher);
        self
    }

    fn pr_cache_key(owner: &str, repo: &str, number: u64) -> String {
        format!("pr:{owner}/{repo}:{number}")
    }

    fn changed_files_cache_key(owner: &str, repo: &str, number: u64) -> String {
        format!("pr-files:{owner}/{repo}:{number}")
    }

    fn collaborators_cache_key(owner: &str, repo: &str) -> String {
        format!("collaborators:{owner}:{repo}")
    }

    fn collaborators_permission_key(owner: &str, repo: &str) -> String {
        format!("collaborators-permission:{owner}:{repo}")
    }

    async fn fetch_pull_request_native(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, ForgeError> {
        let token = CancellationToken::new();
        let path = format!("/repos/{owner}/{repo}/pulls/{number}");
        let response = self
            .transport
            .request(Method::GET, &path, Some(owner), None, &token)
            .await?;
        let raw: RawPullRequest = response.json().await.map_err(ForgeError::Http)?;

        let changed_files = self.changed_files(owner, repo, number).await.unwrap_or_default();
        let last_commit = self.last_commit_time(owner, repo, &raw.head.sha).await;
        let last_review = self.last_review_time(owner, repo, number).await;

        let pr = PullRequest {
            number: raw.number,
            title: raw.title,
            state: raw.state,
            draft: raw.draft,
            author: raw.user.login,
            owner: owner.to_string(),
            repository: repo.to_string(),
            created_at: parse_rfc3339_or_now(&raw.created_at),
            updated_at: parse_rfc3339_or_now(&raw.updated_at),
            last_commit,
            last_review,
            assignees: raw.assignees.into_iter().map(|a| a.login).collect(),
            reviewers: raw
                .requested_reviewers
                .into_iter()
                .map(|r| r.login)
                .collect(),
            changed_files,
        };

        self.cache.set_with_ttl(
            &Self::pr_cache_key(owner, repo, number),
            serde_json::to_value(&pr).map_err(ForgeError::Json)?,
            PR_TTL,
        );
        Ok(pr)
    }

    async fn last_commit_time(&self, owner: &str, repo: &str, sha: &str) -> Option<DateTime<Utc>> {
        let token = CancellationToken::new();
        let path = format!("/repos/{owner}/{repo}/commits/{sha}");
        let response = self
            .transport
            .request(Method::GET, &path, Some(owner), None, &token)
            .await
            .ok()?;
        let raw: RawCommit = response.json().await.ok()?;
        Some(parse_rfc3339_or_now(&raw.commit.author.date))
    }

    async fn last_review_time(&self, owner: &str, repo: &str, number: u64) -> Option<DateTime<Utc>> {
        let token = CancellationToken::new();
        let path = format!("/repos/{owner}/{repo}/pulls/{number}/reviews");
        let response = self
            .transport
            .request(Method::GET, &path, Some(owner), None, &token)
            .await
            .ok()?;
        let raw: Vec<RawReview> = response.json().await.ok()?;
        raw.into_iter()
            .filter(|r| matches!(r.state.as_str(), "APPROVED" | "CHANGES_REQUESTED" | "COMMENTED"))
            .filter_map(|r| r.submitted_at.as_deref().map(parse_rfc3339_or_now))
            .max()
    }
}

#[async_trait]
impl ForgeClient for GithubForgeClient {
    async fn pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<PullRequest, ForgeError> {
        if let Some(fetcher) = &self.enhanced_fetcher {
            if let Some(pr) = fetcher.fetch(owner, repo, number, Utc::now()).await {
                return Ok(pr);
            }
        }

        if let Some(cached) = self.cache.get(&Self::pr_cache_key(owner, repo, number)) {
            if let Ok(pr) = serde_json::from_value::<PullRequest>(cached) {
                match expected_updated_at {
                    None => return Ok(pr),
                    Some(expected) if pr.updated_at == expected => return Ok(pr),
                    Some(_) => {} // stale per caller's expectation; refetch below
                }
            }
        }

        self.fetch_pull_request_native(owner, repo, number).await
    }

    async fn open_pull_requests(&self, owner: &str, repo: &str) -> Result<Vec<PullRequest>, ForgeError> {
        let token = CancellationToken::new();
        let mut results = Vec::new();
        let mut page = 1u32;
        loop {
            let path = format!("/repos/{owner}/{repo}/pulls?state=open&per_page=100&page={page}");
            let response = self
                .transport
                .request(Method::GET, &path, Some(owner), None, &token)
                .await?;
            let raw: Vec<RawPullRequest> = response.json().await.map_err(ForgeError::Http)?;
            let count = raw.len();
            if count == 0 {
                break;
            }
            for item in raw {
                results.push(self.pull_request(owner, repo, item.number, None).await?);
            }
            if count < 100 {
                break;
            }
            page += 1;
        }
        Ok(results)
    }

    async fn open_pull_requests_for_org(&self, org: &str) -> Result<Vec<PullRequest>, ForgeError> {
        let token = CancellationToken::new();
        let mut results = Vec::new();
        let mut page = 1u32;
        loop {
            let query = format!("is:pr is:open org:{org} review:none");
            let path = format!(
                "/search/issues?q={}&per_page=100&page={page}",
                urlencode(&query)
            );
            let response = self
                .transport
                .request(Method::GET, &path, None, None, &token)
                .await?;
            let raw: RawSearchResult = response.json().await.map_err(ForgeError::Http)?;
            let count = raw.items.len();
            if count == 0 {
                break;
            }
            for item in raw.items {
                if let Some((owner, repo)) = split_repository_url(&item.repository_url) {
                    results.push(self.pull_request(&owner, &repo, item.number, None).await?);
                }
            }
            if count < 100 {
                break;
            }
            page += 1;
        }
        Ok(results)
    }

    async fn changed_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<ChangedFile>, ForgeError> {
        let key = Self::changed_files_cache_key(owner, repo, number);
        if let Some(cached) = self.cache.get(&key) {
            if let Ok(files) = serde_json::from_value::<Vec<ChangedFile>>(cached) {
                return Ok(files);
            }
        }

        let token = CancellationToken::new();
        let path = format!("/repos/{owner}/{repo}/pulls/{number}/files?per_page=100");
        let response = self
            .transport
            .request(Method::GET, &path, Some(owner), None, &token)
            .await?;
        let files: Vec<ChangedFile> = response.json().await.map_err(ForgeError::Http)?;

        self.cache.set_with_ttl(
            &key,
            serde_json::to_value(&files).map_err(ForgeError::Json)?,
            CHANGED_FILES_TTL,
        );
        Ok(files)
    }

    async fn file_patch(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        filename: &str,
    ) -> Result<String, ForgeError> {
        let files = self.changed_files(owner, repo, number).await?;
        files
            .into_iter()
            .find(|f| f.filename == filename)
            .map(|f| f.patch)
            .ok_or_else(|| ForgeError::NotFound(format!("{filename} not found in PR #{number}")))
    }

    async fn collaborators(&self, owner: &str, repo: &str) -> Result<Vec<String>, ForgeError> {
        let key = Self::collaborators_cache_key(owner, repo);
        if let Some(cached) = self.cache.get(&key) {
            if let Ok(logins) = serde_json::from_value::<Vec<String>>(cached) {
                return Ok(logins);
            }
        }

        let token = CancellationToken::new();
        let path = format!("/repos/{owner}/{repo}/collaborators?affiliation=all&permission=push");
        let response = self
            .transport
            .request(Method::GET, &path, Some(owner), None, &token)
            .await;

        let response = match response {
            Ok(r) => r,
            Err(ForgeError::Authoritative { status: 403, .. }) => {
                self.cache.set_with_ttl(
                    &Self::collaborators_permission_key(owner, repo),
                    Value::Bool(true),
                    COLLABORATORS_TTL,
                );
                tracing::warn!(owner, repo, "collaborators listing forbidden, failing open");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let raw: Vec<RawCollaborator> = response.json().await.map_err(ForgeError::Http)?;
        for collaborator in &raw {
            let account_type = if collaborator.account_type == "Bot" || is_likely_bot(&collaborator.login) {
                crate::models::AccountType::Bot
            } else {
                crate::models::AccountType::User
            };
            self.user_cache.set_if_not_exists(crate::models::UserInfo {
                login: collaborator.login.clone(),
                is_bot: account_type == crate::models::AccountType::Bot,
                has_write_access: true,
                account_type,
                last_update: Utc::now(),
            });
        }

        let logins: Vec<String> = raw
            .into_iter()
            .filter(|c| c.account_type != "Bot" && !is_likely_bot(&c.login))
            .map(|c| c.login)
            .collect();

        self.cache.set_with_ttl(
            &key,
            serde_json::to_value(&logins).map_err(ForgeError::Json)?,
            COLLABORATORS_TTL,
        );
        Ok(logins)
    }

    async fn has_write_access(&self, owner: &str, repo: &str, user: &str) -> Result<bool, ForgeError> {
        if self
            .cache
            .get(&Self::collaborators_permission_key(owner, repo))
            .is_some()
        {
            return Ok(true);
        }

        if let Some(cached) = self.cache.get(&Self::collaborators_cache_key(owner, repo)) {
            if let Ok(logins) = serde_json::from_value::<Vec<String>>(cached) {
                return Ok(logins.iter().any(|l| l == user));
            }
        }

        tracing::warn!(owner, repo, user, "no cached collaborator list, failing open");
        Ok(true)
    }

    async fn add_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> Result<(), ForgeError> {
        let token = CancellationToken::new();
        let path = format!("/repos/{owner}/{repo}/pulls/{number}/requested_reviewers");
        let body = serde_json::json!({ "reviewers": reviewers });
        let response = self
            .transport
            .request(Method::POST, &path, Some(owner), Some(body), &token)
            .await?;

        if response.status().as_u16() != 201 {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ForgeError::Authoritative { status, body });
        }
        Ok(())
    }

    async fn open_pr_count(
        &self,
        org: &str,
        user: &str,
        ttl: Duration,
    ) -> Result<u64, ForgeError> {
        crate::forge_client::pr_counts::open_pr_count(self, org, user, ttl).await
    }

    async fn batch_open_pr_count(
        &self,
        org: &str,
        users: &[String],
        ttl: Duration,
    ) -> Result<std::collections::HashMap<String, u64>, ForgeError> {
        crate::forge_client::pr_counts::batch_open_pr_count(self, org, users, ttl).await
    }

    async fn historical_prs_for_file(
        &self,
        owner: &str,
        repo: &str,
        filename: &str,
        limit: usize,
    ) -> Result<Vec<crate::models::PrInfo>, ForgeError> {
        crate::forge_client::history::historical_prs_for_file(self, owner, repo, filename, limit).await
    }

    async fn recent_prs_for_directory(
        &self,
        owner: &str,
        repo: &str,
        directory: &str,
        limit: usize,
    ) -> Result<Vec<crate::models::PrInfo>, ForgeError> {
        crate::forge_client::history::recent_prs_for_directory(self, owner, repo, directory, limit).await
    }

    async fn domain_expertise(
        &self,
        owner: &str,
        repo: &str,
        user: &str,
        directory: &str,
    ) -> Result<f64, ForgeError> {
        crate::forge_client::history::domain_expertise(self, owner, repo, user, directory).await
    }
}

impl GithubForgeClient {
    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    pub(crate) fn cache(&self) -> &DiskTier {
        self.cache.as_ref()
    }
}

fn parse_rfc3339_or_now(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn split_repository_url(url: &str) -> Option<(String, String)> {
    let mut parts = url.rsplitn(3, '/');
    let repo = parts.next()?.to_string();
    let owner = parts.next()?.to_string();
    Some((owner, repo))
}

#[derive(Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Deserialize)]
struct RawPullRequest {
    number: u64,
    title: String,
    state: String,
    #[serde(default)]
    draft: bool,
    user: RawUser,
    created_at: String,
    updated_at: String,
    #[serde(default)]
    assignees: Vec<RawUser>,
    #[serde(default)]
    requested_reviewers: Vec<RawUser>,
    #[serde(default)]
    head: RawHead,
}

#[derive(Deserialize, Default)]
struct RawHead {
    #[serde(default)]
    sha: String,
}

#[derive(Deserialize)]
struct RawCommitAuthor {
    date: String,
}

#[derive(Deserialize)]
struct RawCommitDetail {
    author: RawCommitAuthor,
}

#[derive(Deserialize)]
struct RawCommit {
    commit: RawCommitDetail,
}

#[derive(Deserialize)]
struct RawReview {
    state: String,
    submitted_at: Option<String>,
}

#[derive(Deserialize)]
struct RawCollaborator {
    login: String,
    #[serde(rename = "type", default = "default_account_type")]
    account_type: String,
}

fn default_account_type() -> String {
    "User".to_string()
}

#[derive(Deserialize)]
struct RawSearchIssue {
    number: u64,
    repository_url: String,
}

#[derive(Deserialize)]
struct RawSearchResult {
    items: Vec<RawSearchIssue>,
}
