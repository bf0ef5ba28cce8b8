// src/sources/youtube.rs
//! YouTube video search via the Data API v3. Needs `YOUTUBE_API_KEY`; the
//! API has no anonymous tier, so a missing key fails the source outright.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const SEARCH_MAX: usize = 20;
const STATS_MAX: usize = 10;

pub struct YouTubeAdapter {
    session: Arc<HttpSession>,
}

impl YouTubeAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: VideoId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    channel_title: Option<String>,
    channel_id: Option<String>,
    published_at: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(default)]
    items: Vec<StatsItem>,
}

#[derive(Debug, Deserialize)]
struct StatsItem {
    id: String,
    statistics: Statistics,
}

/// The API serializes every count as a string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn build_payload(items: &[SearchItem], stats: &HashMap<String, &Statistics>) -> serde_json::Value {
    let videos: Vec<_> = items
        .iter()
        .map(|item| {
            let id = item.id.video_id.as_deref().unwrap_or_default();
            let stat = stats.get(id);
            json!({
                "videoId": id,
                "title": item.snippet.title,
                "description": item.snippet.description,
                "channel": item.snippet.channel_title,
                "channelId": item.snippet.channel_id,
                "publishedAt": item.snippet.published_at,
                "thumbnail": item.snippet.thumbnails.as_ref()
                    .and_then(|t| t.high.as_ref())
                    .and_then(|h| h.url.as_deref()),
                "url": format!("https://www.youtube.com/watch?v={id}"),
                "views": stat.map(|s| parse_count(s.view_count.as_deref())),
                "likes": stat.map(|s| parse_count(s.like_count.as_deref())),
                "comments": stat.map(|s| parse_count(s.comment_count.as_deref())),
            })
        })
        .collect();

    let channels: BTreeSet<&str> = items
        .iter()
        .filter_map(|i| i.snippet.channel_title.as_deref())
        .collect();

    json!({
        "videos": videos,
        "totalResults": videos.len(),
        "channels": channels.into_iter().collect::<Vec<_>>(),
    })
}

#[async_trait]
impl SourceAdapter for YouTubeAdapter {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let query = identifier.trim();
        let key = std::env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .context("YOUTUBE_API_KEY is not configured")?;

        let max_results = SEARCH_MAX.to_string();
        let search_url = reqwest::Url::parse_with_params(
            &format!("{API_BASE}/search"),
            &[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("key", key.as_str()),
            ],
        )
        .context("building search url")?;
        let resp = self
            .session
            .client()?
            .get(search_url)
            .send()
            .await
            .context("YouTube search request")?;
        if resp.status() == StatusCode::FORBIDDEN {
            anyhow::bail!("YouTube API quota exceeded or invalid API key");
        }
        let search: SearchResponse = resp
            .error_for_status()
            .context("YouTube search")?
            .json()
            .await
            .context("decoding YouTube search")?;

        // Statistics only for the top slice; one extra call covers them all.
        let ids: Vec<&str> = search
            .items
            .iter()
            .filter_map(|i| i.id.video_id.as_deref())
            .take(STATS_MAX)
            .collect();
        let mut stats_items: Vec<StatsItem> = Vec::new();
        if !ids.is_empty() {
            let id_csv = ids.join(",");
            let stats_url = reqwest::Url::parse_with_params(
                &format!("{API_BASE}/videos"),
                &[
                    ("part", "statistics"),
                    ("id", id_csv.as_str()),
                    ("key", key.as_str()),
                ],
            )
            .context("building stats url")?;
            let stats: StatsResponse = self
                .session
                .client()?
                .get(stats_url)
                .send()
                .await
                .context("YouTube stats request")?
                .error_for_status()
                .context("YouTube stats")?
                .json()
                .await
                .context("decoding YouTube stats")?;
            stats_items = stats.items;
        }
        let by_id: HashMap<String, &Statistics> = stats_items
            .iter()
            .map(|s| (s.id.clone(), &s.statistics))
            .collect();

        let item_count = search.items.len() as u64;
        let confidence = if search.items.is_empty() { 30 } else { 90 };
        let payload = build_payload(&search.items, &by_id);
        let page_url = reqwest::Url::parse_with_params(
            "https://www.youtube.com/results",
            &[("search_query", query)],
        )
        .context("building results url")?;
        Ok(SourceResult::new(self.name(), query, payload)
            .with_url(page_url.to_string())
            .with_confidence(confidence)
            .with_item_count(item_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_item(id: &str, title: &str, channel: &str) -> SearchItem {
        SearchItem {
            id: VideoId {
                video_id: Some(id.into()),
            },
            snippet: Snippet {
                title: Some(title.into()),
                description: None,
                channel_title: Some(channel.into()),
                channel_id: Some("c1".into()),
                published_at: Some("2025-06-02T15:04:05Z".into()),
                thumbnails: None,
            },
        }
    }

    #[test]
    fn stats_merge_by_video_id() {
        let items = vec![mk_item("v1", "Talk", "ConfChannel"), mk_item("v2", "Demo", "Jane")];
        let stats = Statistics {
            view_count: Some("1200".into()),
            like_count: Some("34".into()),
            comment_count: None,
        };
        let mut by_id = HashMap::new();
        by_id.insert("v1".to_string(), &stats);

        let v = build_payload(&items, &by_id);
        assert_eq!(v["videos"][0]["views"], 1200);
        assert_eq!(v["videos"][0]["likes"], 34);
        assert_eq!(v["videos"][0]["comments"], 0);
        // No stats entry: null, not zero.
        assert!(v["videos"][1]["views"].is_null());
        assert_eq!(v["videos"][0]["url"], "https://www.youtube.com/watch?v=v1");
    }

    #[test]
    fn channels_deduplicate() {
        let items = vec![
            mk_item("v1", "a", "Jane"),
            mk_item("v2", "b", "Jane"),
            mk_item("v3", "c", "Other"),
        ];
        let v = build_payload(&items, &HashMap::new());
        assert_eq!(v["channels"].as_array().unwrap().len(), 2);
        assert_eq!(v["totalResults"], 3);
    }

    #[test]
    fn counts_parse_from_strings() {
        assert_eq!(parse_count(Some("42")), 42);
        assert_eq!(parse_count(Some("not-a-number")), 0);
        assert_eq!(parse_count(None), 0);
    }
}
