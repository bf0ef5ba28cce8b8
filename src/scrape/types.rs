// src/scrape/types.rs
use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// One successful scrape of one platform for one identifier.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    pub source: String,     // e.g., "github", "reddit"
    pub identifier: String, // identifier as submitted (trimmed)
    pub fetched_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub payload: Value, // platform-specific shape, opaque to the core
    pub confidence: u8, // 0..=100
    pub item_count: u64,
}

impl SourceResult {
    pub fn new(
        source: impl Into<String>,
        identifier: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            source: source.into(),
            identifier: identifier.into(),
            fetched_at: Utc::now(),
            url: None,
            payload,
            confidence: 0,
            item_count: 1,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = confidence.min(100);
        self
    }

    pub fn with_item_count(mut self, item_count: u64) -> Self {
        self.item_count = item_count;
        self
    }
}

/// Normalized fetch error: which source failed and a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterError {
    pub source: String,
    pub cause: String,
}

impl AdapterError {
    pub fn new(source: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.cause)
    }
}

impl std::error::Error for AdapterError {}

/// Settled outcome of one source task. Failures are values here, not
/// propagated errors: one bad platform must never sink the whole run.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(SourceResult),
    Failure(AdapterError),
}

impl FetchOutcome {
    pub fn failure(source: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::Failure(AdapterError::new(source, cause))
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Success(r) => &r.source,
            Self::Failure(e) => &e.source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Per-source slot in the aggregate envelope. Untagged: a success serializes
/// as the result object itself, a failure as `{"error": "..."}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SourceOutcome {
    Success(SourceResult),
    Error { error: String },
}

/// Run-level metadata computed after every source has settled.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetadata {
    pub sources_requested: Vec<String>,
    pub sources_succeeded: Vec<String>,
    pub sources_failed: Vec<String>,
    pub success_rate_percent: f64,
    pub total_data_points: u64,
    pub elapsed_ms: u64,
}

/// The aggregate envelope returned by a comprehensive run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
    pub results: BTreeMap<String, SourceOutcome>,
    pub metadata: AggregateMetadata,
}

/// One platform adapter. Implementations own their endpoints, parsing and
/// confidence scoring; the engine only sees this contract.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry key, cache-key prefix and envelope key, e.g. "github".
    fn name(&self) -> &'static str;

    /// Fetch and shape everything this platform holds for `identifier`.
    async fn fetch(&self, identifier: &str) -> Result<SourceResult>;
}
