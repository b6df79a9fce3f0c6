//! `OpenPRCount` / `BatchOpenPRCount`. SPEC_FULL §4.7.

use crate::errors::ForgeError;
use crate::forge_client::client::GithubForgeClient;
use crate::forge_client::urlencode;
use chrono::Duration;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;

const FAILURE_TTL: Duration = Duration::minutes(10);
const PER_CALL_TIMEOUT: StdDuration = StdDuration::from_secs(30);
const LOOKBACK_DAYS: i64 = 90;

fn count_key(org: &str, user: &str) -> String {
    format!("pr-count:{org}:{user}")
}

fn failure_key(org: &str, user: &str) -> String {
    format!("pr-count-failure:{org}:{user}")
}

#[derive(Deserialize)]
struct SearchCount {
    total_count: u64,
}

pub async fn open_pr_count(
    client: &GithubForgeClient,
    org: &str,
    user: &str,
    ttl: Duration,
) -> Result<u64, ForgeError> {
    if let Some(cached) = client.cache().get(&count_key(org, user)) {
        if let Ok(n) = serde_json::from_value::<u64>(cached) {
            return Ok(n);
        }
    }
    if client.cache().get(&failure_key(org, user)).is_some() {
        return Err(ForgeError::CachedFailure(format!(
            "pr-count lookup failed recently for {org}:{user}"
        )));
    }

    match fetch_open_pr_count(client, org, user).await {
        Ok(count) => {
            client
                .cache()
                .set_with_ttl(&count_key(org, user), json!(count), ttl);
            Ok(count)
        }
        Err(e) => {
            client
                .cache()
                .set_with_ttl(&failure_key(org, user), Value::Bool(true), FAILURE_TTL);
            Err(e)
        }
    }
}

async fn fetch_open_pr_count(client: &GithubForgeClient, org: &str, user: &str) -> Result<u64, ForgeError> {
    let since = (chrono::Utc::now() - Duration::days(LOOKBACK_DAYS)).date_naive();
    let cancel = CancellationToken::new();

    let assignee_query = format!("is:pr is:open assignee:{user} org:{org} updated:>={since}");
    let reviewer_query = format!("is:pr is:open review-requested:{user} org:{org} updated:>={since}");
    let assignee_fut = search_count(client, &assignee_query, &cancel);
    let reviewer_fut = search_count(client, &reviewer_query, &cancel);

    let combined = async { tokio::try_join!(assignee_fut, reviewer_fut) };
    match tokio::time::timeout(PER_CALL_TIMEOUT, combined).await {
        Ok(Ok((a, b))) => Ok(a + b),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ForgeError::Transient(format!(
            "pr-count lookup for {org}:{user} exceeded {PER_CALL_TIMEOUT:?} deadline"
        ))),
    }
}

async fn search_count(
    client: &GithubForgeClient,
    query: &str,
    cancel: &CancellationToken,
) -> Result<u64, ForgeError> {
    let path = format!("/search/issues?q={}&per_page=1", urlencode(query));
    let response = client
        .transport()
        .request(Method::GET, &path, None, None, cancel)
        .await?;
    let parsed: SearchCount = response.json().await.map_err(ForgeError::Http)?;
    Ok(parsed.total_count)
}

/// Looks up each user's cached count first; batches the remainder into one
/// GraphQL request with an aliased `search` per user per sub-query (assigned
/// / review-requested), parses `issueCount`, and caches each result
/// individually.
pub async fn batch_open_pr_count(
    client: &GithubForgeClient,
    org: &str,
    users: &[String],
    ttl: Duration,
) -> Result<HashMap<String, u64>, ForgeError> {
    let mut results = HashMap::with_capacity(users.len());
    let mut remaining = Vec::new();

    for user in users {
        if let Some(cached) = client.cache().get(&count_key(org, user)) {
            if let Ok(n) = serde_json::from_value::<u64>(cached) {
                results.insert(user.clone(), n);
                continue;
            }
        }
        remaining.push(user.clone());
    }

    if remaining.is_empty() {
        return Ok(results);
    }

    let since = (chrono::Utc::now() - Duration::days(LOOKBACK_DAYS)).date_naive();
    let mut query = String::from("query(");
    let mut variables = serde_json::Map::new();
    let mut body = String::new();

    for (i, user) in remaining.iter().enumerate() {
        query.push_str(&format!("$q_assigned_{i}: String!, $q_review_{i}: String!, "));
        variables.insert(
            format!("q_assigned_{i}"),
            json!(format!("is:pr is:open assignee:{user} org:{org} updated:>={since}")),
        );
        variables.insert(
            format!("q_review_{i}"),
            json!(format!(
                "is:pr is:open review-requested:{user} org:{org} updated:>={since}"
            )),
        );
        body.push_str(&format!(
            "assigned_{i}: search(query: $q_assigned_{i}, type: ISSUE) {{ issueCount }} \
             review_{i}: search(query: $q_review_{i}, type: ISSUE) {{ issueCount }} "
        ));
    }
    query.truncate(query.len() - 2);
    query.push_str(&format!(") {{ {body} }}"));

    let cancel = CancellationToken::new();
    let data = client
        .transport()
        .graphql(&query, Value::Object(variables), &cancel)
        .await?;

    for (i, user) in remaining.iter().enumerate() {
        let assigned = data
            .get(format!("assigned_{i}"))
            .and_then(|v| v.get("issueCount"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let review = data
            .get(format!("review_{i}"))
            .and_then(|v| v.get("issueCount"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let count = assigned + review;
        client
            .cache()
            .set_with_ttl(&count_key(org, user), json!(count), ttl);
        results.insert(user.clone(), count);
    }

    Ok(results)
}
