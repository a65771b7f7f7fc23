//! Per-request render context.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::OriginalUri;
use axum::http::request::Parts;
use axum::http::Uri;
use serde::Serialize;

/// A query parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// The last value given for the key.
    pub fn last(&self) -> Option<&str> {
        match self {
            QueryValue::One(value) => Some(value),
            QueryValue::Many(values) => values.last().map(String::as_str),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::One(value.to_string())
    }
}

/// Query parameters keyed by name.
pub type Query = BTreeMap<String, QueryValue>;

/// Query parsed by an upstream layer.
///
/// When a request carries this extension its contents are used as-is and
/// the raw URL is not re-parsed.
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery(pub Query);

/// Parse the query-string portion of a request URL.
///
/// Everything after the first `?` is decoded as
/// `application/x-www-form-urlencoded`, after dropping one further leading
/// `?`. Keys without `=` map to an empty string and a repeated key keeps
/// its last value.
pub fn parse_query(url: &str) -> Query {
    let Some((_, raw)) = url.split_once('?') else {
        return Query::new();
    };
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    url::form_urlencoded::parse(raw.as_bytes())
        .map(|(key, value)| (key.into_owned(), QueryValue::One(value.into_owned())))
        .collect()
}

/// Context handed to the server entry along with the URL.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    /// Path and query of the request as routed.
    #[serde(rename = "requestUrl")]
    pub request_url: String,

    pub query: Query,

    #[serde(rename = "isSSR")]
    pub is_ssr: bool,

    /// URL before any nesting stripped a prefix.
    #[serde(rename = "url")]
    pub original_url: String,

    /// Head of the incoming request. Not serialized.
    #[serde(skip)]
    pub request: Arc<Parts>,
}

impl RenderContext {
    pub fn from_parts(parts: Parts) -> Self {
        let request_url = path_and_query(&parts.uri);
        let original_url = parts
            .extensions
            .get::<OriginalUri>()
            .map(|OriginalUri(uri)| path_and_query(uri))
            .unwrap_or_else(|| request_url.clone());
        let query = match parts.extensions.get::<ParsedQuery>() {
            Some(ParsedQuery(query)) => query.clone(),
            None => parse_query(&request_url),
        };

        Self {
            request_url,
            query,
            is_ssr: true,
            original_url,
            request: Arc::new(parts),
        }
    }

    /// Convenience lookup of a single query value.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).and_then(QueryValue::last)
    }
}

/// Origin-form of a URI (`/path?query`).
pub fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}
