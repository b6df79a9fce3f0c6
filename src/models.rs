//! Data model entities shared across the cache, forge client, and candidate
//! engine (SPEC_FULL §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangedFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub patch: String,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub draft: bool,
    pub author: String,
    pub owner: String,
    pub repository: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_commit: Option<DateTime<Utc>>,
    pub last_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub changed_files: Vec<ChangedFile>,
}

/// Historical record used by overlap analysis and the directory finders.
/// Immutable once the PR is merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrInfo {
    pub number: u64,
    pub author: String,
    pub merged_by: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AccountType {
    #[default]
    User,
    Bot,
    Organization,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub login: String,
    pub is_bot: bool,
    pub has_write_access: bool,
    pub account_type: AccountType,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppInstallation {
    pub login: String,
    pub installation_id: u64,
    pub account_type: AccountType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ScoreFactors {
    pub file_overlap: f64,
    pub recency: f64,
    pub expertise: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateScore {
    pub login: String,
    pub total: f64,
    pub factors: ScoreFactors,
}

/// Line-overlap result for one historical PR against the current PR's
/// patches, per SPEC_FULL §4.8.2.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlapResult {
    pub pr_number: u64,
    pub author: String,
    pub merged_by: Option<String>,
    pub reviewers: Vec<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub overlap_count: u64,
    pub overlap_score: f64,
}
