// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP remote store speaking the PostgREST query dialect.
//
// Each `QueryRequest` becomes one GET against `{base_url}/{collection}` with
// filters rendered as `column=op.value` query pairs. Row windows travel in
// the `Range` header. Authentication sends the project key both as `apikey`
// and as a bearer token, which is what hosted PostgREST gateways expect.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::backend::RemoteStore;
use crate::error::{RemoteError, Result};
use crate::predicate::{Predicate, QueryRequest, Row};

/// Connection settings for [`RestStore`].
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the REST gateway, e.g. `https://db.example.com/rest/v1/`.
    pub base_url: String,
    /// Project key sent as `apikey` and `Authorization: Bearer`.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestConfig {
    /// Settings for `base_url` with no key and a 30 second timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Attach a project key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Load from `BAZAAR_REST_URL`, `BAZAAR_REST_KEY` and
    /// `BAZAAR_REST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BAZAAR_REST_URL").map_err(|_| {
            RemoteError::InvalidRequest("BAZAAR_REST_URL is not set".to_string())
        })?;
        let mut config = Self::new(base_url);
        config.api_key = std::env::var("BAZAAR_REST_KEY").ok().filter(|k| !k.is_empty());
        if let Ok(secs) = std::env::var("BAZAAR_REST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %secs, "Ignoring unparsable BAZAAR_REST_TIMEOUT_SECS"),
            }
        }
        Ok(config)
    }
}

/// Body shape of a PostgREST error response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    details: Option<String>,
}

/// A [`RemoteStore`] backed by a PostgREST-compatible HTTP gateway.
///
/// # Examples
///
/// ```rust,no_run
/// use bazaar_remote::rest::{RestConfig, RestStore};
///
/// # fn main() -> bazaar_remote::error::Result<()> {
/// let store = RestStore::new(
///     RestConfig::new("https://db.example.com/rest/v1/").with_api_key("anon-key"),
/// )?;
/// # let _ = store;
/// # Ok(())
/// # }
/// ```
pub struct RestStore {
    /// Base URL, always ending in `/` so collection names join as children.
    base_url: Url,
    /// Connection-pooled HTTP client with auth headers preinstalled.
    http: reqwest::Client,
}

impl RestStore {
    /// Build a store from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidRequest`] if the URL or key is malformed.
    pub fn new(config: RestConfig) -> Result<Self> {
        let mut raw = config.base_url;
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)
            .map_err(|e| RemoteError::InvalidRequest(format!("invalid base URL: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let apikey = HeaderValue::from_str(key)
                .map_err(|e| RemoteError::InvalidRequest(format!("invalid api key: {e}")))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| RemoteError::InvalidRequest(format!("invalid api key: {e}")))?;
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { base_url, http })
    }

    /// Full URL for `request`, query pairs included.
    fn url_for(&self, request: &QueryRequest) -> Result<Url> {
        let mut url = self.base_url.join(&request.collection).map_err(|e| {
            RemoteError::InvalidRequest(format!(
                "invalid collection '{}': {e}",
                request.collection
            ))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query_pairs(request) {
                pairs.append_pair(&key, &value);
            }
        }
        Ok(url)
    }

    /// Turn a non-2xx response into [`RemoteError::Server`].
    async fn extract_error(response: reqwest::Response) -> RemoteError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorBody>().await {
            Ok(ErrorBody {
                message: Some(message),
                details,
            }) => match details {
                Some(details) => format!("{message} ({details})"),
                None => message,
            },
            _ => format!("HTTP {status}"),
        };
        RemoteError::Server { status, message }
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>> {
        let url = self.url_for(request)?;
        debug!(collection = %request.collection, %url, "Issuing remote query");

        let mut builder = self.http.get(url);
        if let Some(range) = request.range {
            builder = builder
                .header("Range-Unit", "items")
                .header("Range", format!("{}-{}", range.from, range.to));
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(Self::extract_error(response).await);
        }

        let body = response.text().await?;
        let rows: Vec<Row> = serde_json::from_str(&body)?;
        Ok(rows)
    }

    fn name(&self) -> &str {
        "rest"
    }
}

/// Render a request as PostgREST query pairs (before URL encoding).
pub fn query_pairs(request: &QueryRequest) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(request.filters.len() + 2);
    if !request.columns.is_empty() {
        pairs.push(("select".to_string(), request.columns.join(",")));
    }
    for predicate in &request.filters {
        let rendered = match predicate {
            Predicate::Eq { value, .. } => format!("eq.{}", scalar(value)),
            Predicate::In { values, .. } => {
                let items: Vec<String> = values.iter().map(list_item).collect();
                format!("in.({})", items.join(","))
            }
            Predicate::ILike { pattern, .. } => format!("ilike.{pattern}"),
            Predicate::Contains { value, .. } => format!("cs.{{{}}}", list_item(value)),
        };
        pairs.push((predicate.column().to_string(), rendered));
    }
    if let Some(limit) = request.limit {
        pairs.push(("limit".to_string(), limit.to_string()));
    }
    pairs
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Values inside `in.(...)` and `cs.{...}` are double-quoted when they carry
/// reserved characters.
fn list_item(value: &Value) -> String {
    let raw = scalar(value);
    let reserved = raw
        .chars()
        .any(|c| matches!(c, ',' | '(' | ')' | '{' | '}' | '"' | '\\' | ' '));
    if reserved {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn test_renders_select_in_and_limit() {
        let req = QueryRequest::new("items")
            .with_columns(["id", "name"])
            .filter(Predicate::in_list("id", [3, 1, 2]))
            .with_limit(50);
        assert_eq!(
            query_pairs(&req),
            vec![
                pair("select", "id,name"),
                pair("id", "in.(3,1,2)"),
                pair("limit", "50"),
            ]
        );
    }

    #[test]
    fn test_renders_eq_ilike_and_contains() {
        let req = QueryRequest::new("items")
            .filter(Predicate::eq("category_id", 7))
            .filter(Predicate::ilike("name", "%iron%"))
            .filter(Predicate::contains("jobs", "PLD"));
        assert_eq!(
            query_pairs(&req),
            vec![
                pair("category_id", "eq.7"),
                pair("name", "ilike.%iron%"),
                pair("jobs", "cs.{PLD}"),
            ]
        );
    }

    #[test]
    fn test_quotes_reserved_list_items() {
        let req = QueryRequest::new("items").filter(Predicate::in_list("name", ["a,b", "plain"]));
        assert_eq!(query_pairs(&req), vec![pair("name", "in.(\"a,b\",plain)")]);
    }

    #[test]
    fn test_url_joins_collection_under_base() {
        let store = RestStore::new(RestConfig::new("https://db.example.com/rest/v1")).unwrap();
        let url = store
            .url_for(&QueryRequest::new("items").filter(Predicate::eq("id", 1)))
            .unwrap();
        assert_eq!(url.path(), "/rest/v1/items");
        assert_eq!(url.query(), Some("id=eq.1"));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = RestStore::new(RestConfig::new("not a url"));
        assert!(matches!(result, Err(RemoteError::InvalidRequest(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = RestConfig::new("https://db.example.com").with_api_key("k");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
