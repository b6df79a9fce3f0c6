//! Environment-driven configuration, following the teacher's
//! `Config::from_env` convention (`.env`-aware, fail fast on missing
//! required fields rather than failing deep inside a request path).

use crate::errors::CacheError;
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "https://api.github.com";

#[derive(Clone, Debug)]
pub enum Credentials {
    App {
        app_id: String,
        private_key: PrivateKeySource,
    },
    PersonalAccessToken(String),
}

#[derive(Clone, Debug)]
pub enum PrivateKeySource {
    Inline(Vec<u8>),
    Path(PathBuf),
}

#[derive(Clone, Debug)]
pub struct ReviewerConfig {
    pub credentials: Credentials,
    pub cache_dir: Option<PathBuf>,
    pub base_url: String,
}

impl ReviewerConfig {
    /// Loads configuration from the process environment, matching the
    /// `FORGE_*` variables described in SPEC_FULL §10.1. Calls
    /// `dotenv::dotenv().ok()` first so a `.env` file in the working
    /// directory is picked up, exactly as the teacher's `Config::from_env`
    /// does before reading `std::env::var`.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let base_url =
            std::env::var("FORGE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let cache_dir = match std::env::var("FORGE_CACHE_DIR") {
            Ok(dir) => Some(validate_cache_dir(PathBuf::from(dir))?),
            Err(_) => None,
        };

        let credentials = if let Ok(token) = std::env::var("FORGE_TOKEN") {
            Credentials::PersonalAccessToken(token)
        } else {
            let app_id = std::env::var("FORGE_APP_ID")
                .map_err(|_| anyhow::anyhow!("one of FORGE_TOKEN or FORGE_APP_ID is required"))?;
            let private_key = if let Ok(inline) = std::env::var("FORGE_PRIVATE_KEY") {
                PrivateKeySource::Inline(inline.into_bytes())
            } else {
                let path = std::env::var("FORGE_PRIVATE_KEY_PATH").map_err(|_| {
                    anyhow::anyhow!(
                        "FORGE_APP_ID requires FORGE_PRIVATE_KEY or FORGE_PRIVATE_KEY_PATH"
                    )
                })?;
                PrivateKeySource::Path(PathBuf::from(path))
            };
            Credentials::App {
                app_id,
                private_key,
            }
        };

        Ok(Self {
            credentials,
            cache_dir,
            base_url,
        })
    }
}

/// Cache directory path must be absolute; relative paths fail construction,
/// never cache operation (§3 invariant).
fn validate_cache_dir(dir: PathBuf) -> Result<PathBuf, CacheError> {
    if dir.is_relative() {
        return Err(CacheError::RelativeDirectory(dir));
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_relative_path_when_validating_cache_dir_then_rejected() {
        let result = validate_cache_dir(PathBuf::from("relative/dir"));
        assert!(matches!(result, Err(CacheError::RelativeDirectory(_))));
    }

    #[test]
    fn given_absolute_path_when_validating_cache_dir_then_accepted() {
        let result = validate_cache_dir(PathBuf::from("/tmp/reviewer-cache"));
        assert!(result.is_ok());
    }
}
