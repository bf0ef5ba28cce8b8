// src/scrape/meta.rs
//! Run-level metadata, computed after every source task has settled.

use crate::scrape::types::{AggregateMetadata, FetchOutcome};

/// Fold settled outcomes into the envelope metadata.
///
/// `requested` is the resolved source list, so succeeded and failed always
/// partition it. The rate is over requested sources (unknown names count
/// against it) and an empty run is 0%, not NaN.
pub fn build_metadata(
    requested: &[String],
    outcomes: &[FetchOutcome],
    elapsed_ms: u64,
) -> AggregateMetadata {
    let mut sources_succeeded = Vec::new();
    let mut sources_failed = Vec::new();
    let mut total_data_points: u64 = 0;

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Success(res) => {
                sources_succeeded.push(res.source.clone());
                total_data_points += res.item_count;
            }
            FetchOutcome::Failure(err) => sources_failed.push(err.source.clone()),
        }
    }

    let success_rate_percent = if requested.is_empty() {
        0.0
    } else {
        100.0 * sources_succeeded.len() as f64 / requested.len() as f64
    };

    AggregateMetadata {
        sources_requested: requested.to_vec(),
        sources_succeeded,
        sources_failed,
        success_rate_percent,
        total_data_points,
        elapsed_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::types::SourceResult;
    use serde_json::json;

    fn ok(source: &str, items: u64) -> FetchOutcome {
        FetchOutcome::Success(
            SourceResult::new(source, "octocat", json!({}))
                .with_confidence(90)
                .with_item_count(items),
        )
    }

    fn fail(source: &str) -> FetchOutcome {
        FetchOutcome::failure(source, "boom")
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn three_of_four_is_seventy_five_percent() {
        let requested = names(&["github", "reddit", "medium", "twitter"]);
        let outcomes = vec![ok("github", 2), ok("reddit", 3), fail("medium"), ok("twitter", 1)];
        let meta = build_metadata(&requested, &outcomes, 42);
        assert!((meta.success_rate_percent - 75.0).abs() < f64::EPSILON);
        assert_eq!(meta.total_data_points, 6);
        assert_eq!(meta.elapsed_ms, 42);
    }

    #[test]
    fn succeeded_and_failed_partition_requested() {
        let requested = names(&["github", "reddit", "medium"]);
        let outcomes = vec![ok("github", 1), fail("reddit"), fail("medium")];
        let meta = build_metadata(&requested, &outcomes, 0);

        let mut union = meta.sources_succeeded.clone();
        union.extend(meta.sources_failed.clone());
        union.sort();
        let mut req = requested.clone();
        req.sort();
        assert_eq!(union, req);
    }

    #[test]
    fn failures_contribute_no_data_points() {
        let meta = build_metadata(&names(&["github"]), &[fail("github")], 1);
        assert_eq!(meta.total_data_points, 0);
        assert_eq!(meta.success_rate_percent, 0.0);
    }

    #[test]
    fn empty_run_is_zero_percent_not_nan() {
        let meta = build_metadata(&[], &[], 0);
        assert_eq!(meta.success_rate_percent, 0.0);
        assert!(meta.sources_requested.is_empty());
    }

    #[test]
    fn all_successes_hit_one_hundred() {
        let requested = names(&["github", "reddit"]);
        let meta = build_metadata(&requested, &[ok("github", 5), ok("reddit", 0)], 9);
        assert!((meta.success_rate_percent - 100.0).abs() < f64::EPSILON);
        assert_eq!(meta.total_data_points, 5);
    }
}
