// src/sources/abn_lookup.rs
//! Australian Business Register lookup. An eleven-digit identifier is treated
//! as an ABN and resolved directly; anything else runs a name search. The API
//! needs a registered GUID (`ABN_LOOKUP_GUID`); without one the source
//! degrades to a zero-confidence success instead of failing the run.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;

const API_BASE: &str = "https://abr.business.gov.au/json";

pub struct AbnLookupAdapter {
    session: Arc<HttpSession>,
}

impl AbnLookupAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

/// ABNs are exactly eleven digits once spaces are stripped.
fn as_abn(identifier: &str) -> Option<String> {
    let digits: String = identifier.chars().filter(|c| !c.is_whitespace()).collect();
    (digits.len() == 11 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

/// The ABR JSON endpoints wrap their payload JSONP-style: `callback({...})`.
fn strip_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(open), Some(close)) if open < close && !trimmed.starts_with(['{', '[']) => {
            &trimmed[open + 1..close]
        }
        _ => trimmed,
    }
}

fn non_empty(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Shape the details response for a direct ABN lookup.
fn abn_payload(query: &str, v: &Value) -> (Value, bool) {
    let found = non_empty(v, "Abn").is_some();
    let business = found.then(|| {
        json!({
            "abn": non_empty(v, "Abn"),
            "name": non_empty(v, "EntityName"),
            "status": non_empty(v, "AbnStatus"),
            "entityType": non_empty(v, "EntityTypeName"),
            "gst": non_empty(v, "Gst"),
            "state": non_empty(v, "AddressState"),
            "postcode": non_empty(v, "AddressPostcode"),
        })
    });
    (
        json!({
            "query": query,
            "queryType": "ABN",
            "found": found,
            "business": business,
        }),
        found,
    )
}

/// Shape the match list for a name search.
fn name_payload(query: &str, v: &Value) -> (Value, usize) {
    let matches: Vec<Value> = v
        .get("Names")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .map(|n| {
                    json!({
                        "abn": non_empty(n, "Abn"),
                        "name": non_empty(n, "Name"),
                        "state": non_empty(n, "State"),
                        "postcode": non_empty(n, "Postcode"),
                        "score": n.get("Score").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let count = matches.len();
    (
        json!({
            "query": query,
            "queryType": "Name",
            "found": count > 0,
            "matches": matches,
        }),
        count,
    )
}

#[async_trait]
impl SourceAdapter for AbnLookupAdapter {
    fn name(&self) -> &'static str {
        "abn-lookup"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let query = identifier.trim();

        let guid = std::env::var("ABN_LOOKUP_GUID")
            .ok()
            .filter(|g| !g.is_empty());
        let Some(guid) = guid else {
            // Degraded success: the run records "not configured" instead of
            // a failure that looks like an upstream outage.
            let payload = json!({
                "query": query,
                "note": "ABN lookup skipped: ABN_LOOKUP_GUID is not set",
            });
            return Ok(SourceResult::new(self.name(), query, payload)
                .with_confidence(0)
                .with_item_count(0));
        };

        let (url, is_abn) = match as_abn(query) {
            Some(abn) => (
                reqwest::Url::parse_with_params(
                    &format!("{API_BASE}/AbnDetails.aspx"),
                    &[("abn", abn.as_str()), ("guid", guid.as_str())],
                )
                .context("building abn url")?,
                true,
            ),
            None => (
                reqwest::Url::parse_with_params(
                    &format!("{API_BASE}/MatchingNames.aspx"),
                    &[("name", query), ("guid", guid.as_str())],
                )
                .context("building name search url")?,
                false,
            ),
        };

        let body = self
            .session
            .client()?
            .get(url)
            .send()
            .await
            .context("ABN Lookup request")?
            .error_for_status()
            .context("ABN Lookup request")?
            .text()
            .await
            .context("reading ABN Lookup body")?;
        let value: Value =
            serde_json::from_str(strip_jsonp(&body)).context("decoding ABN Lookup response")?;

        if let Some(message) = non_empty(&value, "Message") {
            anyhow::bail!("ABN Lookup error: {message}");
        }

        let (payload, confidence, item_count, view_url) = if is_abn {
            let (payload, found) = abn_payload(query, &value);
            let abn = as_abn(query).unwrap_or_default();
            (
                payload,
                if found { 95 } else { 40 },
                u64::from(found),
                format!("https://abr.business.gov.au/ABN/View?id={abn}"),
            )
        } else {
            let (payload, count) = name_payload(query, &value);
            let search_url = reqwest::Url::parse_with_params(
                "https://abr.business.gov.au/Search/Run",
                &[("SearchText", query)],
            )
            .context("building search url")?;
            (
                payload,
                if count > 0 { 95 } else { 40 },
                count as u64,
                search_url.to_string(),
            )
        };

        Ok(SourceResult::new(self.name(), query, payload)
            .with_url(view_url)
            .with_confidence(confidence)
            .with_item_count(item_count))
    }
}
