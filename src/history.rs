//! history.rs — in-memory log of recent comprehensive runs for diagnostics.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::scrape::types::AggregateResult;

#[derive(Debug, Clone, serde::Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub ts_unix: u64,
    pub identifier: String,
    pub sources_succeeded: Vec<String>,
    pub sources_failed: Vec<String>,
    pub success_rate_percent: f64,
    pub total_data_points: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug)]
pub struct RunHistory {
    inner: Mutex<Vec<RunSummary>>,
    cap: usize,
}

impl RunHistory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap: cap.min(10_000),
        }
    }

    pub fn push(&self, run: &AggregateResult) {
        let entry = RunSummary {
            ts_unix: now_unix(),
            identifier: run.identifier.clone(),
            sources_succeeded: run.metadata.sources_succeeded.clone(),
            sources_failed: run.metadata.sources_failed.clone(),
            success_rate_percent: run.metadata.success_rate_percent,
            total_data_points: run.metadata.total_data_points,
            elapsed_ms: run.metadata.elapsed_ms,
        };

        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<RunSummary> {
        let v = self.inner.lock().expect("history mutex poisoned");
        let len = v.len();
        let start = len.saturating_sub(n);
        v[start..].to_vec()
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::meta::build_metadata;
    use crate::scrape::types::{FetchOutcome, SourceResult};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn mk_run(identifier: &str) -> AggregateResult {
        let requested = vec!["github".to_string()];
        let outcomes = vec![FetchOutcome::Success(
            SourceResult::new("github", identifier, serde_json::json!({})).with_item_count(2),
        )];
        AggregateResult {
            identifier: identifier.to_string(),
            timestamp: Utc::now(),
            results: BTreeMap::new(),
            metadata: build_metadata(&requested, &outcomes, 7),
        }
    }

    #[test]
    fn keeps_only_cap_newest_entries() {
        let h = RunHistory::with_capacity(3);
        for i in 0..5 {
            h.push(&mk_run(&format!("user{i}")));
        }
        let snap = h.snapshot_last_n(10);
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].identifier, "user2");
        assert_eq!(snap[2].identifier, "user4");
    }

    #[test]
    fn snapshot_returns_newest_slice() {
        let h = RunHistory::with_capacity(100);
        for i in 0..4 {
            h.push(&mk_run(&format!("user{i}")));
        }
        let snap = h.snapshot_last_n(2);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].identifier, "user2");
        assert_eq!(snap[0].total_data_points, 2);
        assert_eq!(snap[0].elapsed_ms, 7);
    }
}
