//! HTTP transport: auth header selection, retry with backoff, and the
//! GraphQL sub-operation. SPEC_FULL §4.6.

use crate::auth::AuthManager;
use crate::errors::ForgeError;
use rand::Rng;
use reqwest::{Method, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;

const MAX_ATTEMPTS: u32 = 25;
const INITIAL_DELAY: StdDuration = StdDuration::from_secs(1);
const MAX_DELAY: StdDuration = StdDuration::from_secs(120);
const JITTER_MAX_MS: u64 = 250;

const GRAPHQL_QUERY_MAX_LEN: usize = 100_000;
const GRAPHQL_STRING_MAX_LEN: usize = 10_000;
const GRAPHQL_IDENT_MAX_LEN: usize = 100;

pub struct Transport {
    http: reqwest::Client,
    auth: Arc<AuthManager>,
    base_url: String,
}

impl Transport {
    pub fn new(http: reqwest::Client, auth: Arc<AuthManager>, base_url: String) -> Self {
        Self { http, auth, base_url }
    }

    /// Builds the auth header for a request, optionally scoped to an
    /// organization. App auth with a non-empty org prefers an installation
    /// token, falling back to the JWT with a warning on failure (graceful
    /// degradation); app auth with no org always uses the JWT; PAT auth uses
    /// the `token` scheme instead of `Bearer`.
    async fn auth_header(&self, org: Option<&str>) -> Result<(&'static str, String), ForgeError> {
        if !self.auth.is_app_auth() {
            let token = self.auth.base_token()?;
            return Ok(("token", token));
        }

        if let Some(org) = org.filter(|o| !o.is_empty()) {
            match self.auth.installation_token(org).await {
                Ok(record) => return Ok(("Bearer", record.token)),
                Err(e) => {
                    tracing::warn!(org, error = %e, "installation token unavailable, falling back to JWT");
                }
            }
        }

        let jwt = self.auth.base_token()?;
        Ok(("Bearer", jwt))
    }

    /// Executes `method path` with retry. `org` scopes the auth header
    /// (`None` for non-installation-scoped calls). `body`, if present, is
    /// sent as a JSON request body on mutating methods.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        org: Option<&str>,
        body: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Response, ForgeError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;
        let mut last_err: Option<ForgeError> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(ForgeError::Cancelled);
            }
            attempt += 1;

            let (scheme, token) = self.auth_header(org).await?;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("Authorization", format!("{scheme} {token}"))
                .header("Accept", "application/vnd.github.v3+json");

            if matches!(method, Method::POST | Method::PATCH | Method::PUT) {
                request = request.header("Content-Type", "application/json");
                if let Some(b) = &body {
                    request = request.json(b);
                }
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(ForgeError::Cancelled),
                result = request.send() => result,
            };

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retriable = status.as_u16() == 429 || status.as_u16() >= 500;
                    let body_text = response.text().await.unwrap_or_default();

                    if !retriable {
                        return Err(ForgeError::Authoritative {
                            status: status.as_u16(),
                            body: body_text,
                        });
                    }

                    last_err = Some(ForgeError::Authoritative {
                        status: status.as_u16(),
                        body: body_text,
                    });
                }
                Err(e) => {
                    let forge_err = ForgeError::Http(e);
                    if !forge_err.is_retriable() {
                        return Err(forge_err);
                    }
                    last_err = Some(forge_err);
                }
            }

            if attempt >= MAX_ATTEMPTS {
                return Err(ForgeError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(last_err.expect("retry loop always records an error before exhausting")),
                });
            }

            let delay = backoff_delay(attempt);
            tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying forge request");
            tokio::select! {
                _ = cancel.cancelled() => return Err(ForgeError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// POST a GraphQL query after validating `variables` per §4.6's
    /// allowlist. Returns the decoded `data` object; a response-level
    /// `errors` array is surfaced as a `ForgeError::GraphQl`.
    pub async fn graphql(
        &self,
        query: &str,
        variables: Value,
        cancel: &CancellationToken,
    ) -> Result<Value, ForgeError> {
        if query.len() > GRAPHQL_QUERY_MAX_LEN {
            return Err(ForgeError::GraphQl(format!(
                "query exceeds {GRAPHQL_QUERY_MAX_LEN} chars"
            )));
        }
        validate_graphql_variables(&variables)?;

        let body = serde_json::json!({ "query": query, "variables": variables });
        let response = self
            .request(Method::POST, "/graphql", None, Some(body), cancel)
            .await?;

        let decoded: Value = response.json().await.map_err(ForgeError::Http)?;
        if let Some(errors) = decoded.get("errors") {
            if errors.is_array() && !errors.as_array().unwrap().is_empty() {
                return Err(ForgeError::GraphQl(errors.to_string()));
            }
        }
        Ok(decoded.get("data").cloned().unwrap_or(Value::Null))
    }
}

fn backoff_delay(attempt: u32) -> StdDuration {
    let exp = INITIAL_DELAY.saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX));
    let base = exp.min(MAX_DELAY);
    let jitter_ms = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);
    (base + StdDuration::from_millis(jitter_ms)).min(MAX_DELAY + StdDuration::from_millis(JITTER_MAX_MS))
}

const SCOPED_IDENT_KEYS: [&str; 4] = ["owner", "repo", "org", "login"];

fn validate_graphql_variables(variables: &Value) -> Result<(), ForgeError> {
    let Value::Object(map) = variables else {
        return Ok(());
    };

    for (key, value) in map {
        if key.chars().any(|c| "{}[]\"'\n\r\t".contains(c)) {
            return Err(ForgeError::GraphQl(format!("invalid variable key: {key}")));
        }

        match value {
            Value::String(s) => {
                if s.contains("__schema") || s.contains("__type") {
                    return Err(ForgeError::GraphQl(format!(
                        "variable {key} attempts introspection"
                    )));
                }
                if s.len() > GRAPHQL_STRING_MAX_LEN {
                    return Err(ForgeError::GraphQl(format!("variable {key} too long")));
                }
                if SCOPED_IDENT_KEYS.contains(&key.as_str()) {
                    if s.is_empty() || s.len() > GRAPHQL_IDENT_MAX_LEN {
                        return Err(ForgeError::GraphQl(format!(
                            "variable {key} must be 1-{GRAPHQL_IDENT_MAX_LEN} chars"
                        )));
                    }
                    if s.contains("../") || s.contains('\\') || s.contains('\n') || s.contains('\0') {
                        return Err(ForgeError::GraphQl(format!(
                            "variable {key} contains disallowed characters"
                        )));
                    }
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if !(0..=1_000_000).contains(&i) {
                        return Err(ForgeError::GraphQl(format!(
                            "variable {key} out of range [0, 1000000]"
                        )));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}
