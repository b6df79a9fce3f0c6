//! Cache, forge API client, and reviewer-candidate scoring engine backing a
//! hosted code-review assistant's reviewer-selection flow.

pub mod auth;
pub mod cache;
pub mod candidate_engine;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod errors;
pub mod forge_client;
pub mod logging;
pub mod models;
pub mod transport;
pub mod user_cache;

pub use auth::AuthManager;
pub use cache::{DiskTier, TtlMap};
pub use candidate_engine::CandidateEngine;
pub use config::ReviewerConfig;
pub use errors::{AuthError, CacheError, ForgeError};
pub use forge_client::{ForgeClient, GithubForgeClient};
pub use transport::Transport;
pub use user_cache::UserInfoCache;
