// src/sources/google_news.rs
//! News coverage via the Google News RSS search feed.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::json;

use crate::normalize::clean_text;
use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;
use crate::sources::{rfc2822_to_unix, scrub_html_entities_for_xml, unix_to_iso};

const FEED_BASE: &str = "https://news.google.com/rss/search";
const ARTICLE_CAP: usize = 50;

pub struct GoogleNewsAdapter {
    session: Arc<HttpSession>,
}

impl GoogleNewsAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<NewsSource>,
}

/// `<source url="https://example.com">Example</source>`
#[derive(Debug, Deserialize)]
struct NewsSource {
    #[serde(rename = "@url", default)]
    _url: Option<String>,
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

#[derive(Debug, PartialEq)]
struct Article {
    title: String,
    url: Option<String>,
    source: Option<String>,
    published_at: String,
    description: Option<String>,
}

fn parse_articles_from_str(xml: &str) -> Result<Vec<Article>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing news feed xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len().min(ARTICLE_CAP));
    for it in rss.channel.item.into_iter().take(ARTICLE_CAP) {
        let title = clean_text(it.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            continue;
        }
        let description = it
            .description
            .as_deref()
            .map(clean_text)
            .filter(|d| !d.is_empty());
        out.push(Article {
            title,
            url: it.link,
            source: it.source.and_then(|s| s.name),
            published_at: unix_to_iso(it.pub_date.as_deref().map(rfc2822_to_unix).unwrap_or(0)),
            description,
        });
    }
    Ok(out)
}

#[async_trait]
impl SourceAdapter for GoogleNewsAdapter {
    fn name(&self) -> &'static str {
        "google-news"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let query = identifier.trim();
        let feed_url = reqwest::Url::parse_with_params(
            FEED_BASE,
            &[("q", query), ("hl", "en-US"), ("gl", "US"), ("ceid", "US:en")],
        )
        .context("building news feed url")?;
        let body = self
            .session
            .fetch_text(feed_url.as_str())
            .await
            .context("Google News feed fetch")?;
        let articles = parse_articles_from_str(&body)?;

        let outlets: BTreeSet<&str> = articles
            .iter()
            .filter_map(|a| a.source.as_deref())
            .collect();
        let articles_json: Vec<_> = articles
            .iter()
            .map(|a| {
                json!({
                    "title": a.title,
                    "url": a.url,
                    "source": a.source,
                    "publishedAt": a.published_at,
                    "description": a.description,
                })
            })
            .collect();

        let confidence = if articles.is_empty() { 30 } else { 85 };
        let payload = json!({
            "articles": articles_json,
            "totalResults": articles.len(),
            "sources": outlets.into_iter().collect::<Vec<_>>(),
        });
        let page_url = reqwest::Url::parse_with_params(
            "https://news.google.com/search",
            &[("q", query)],
        )
        .context("building news page url")?;
        Ok(SourceResult::new(self.name(), query, payload)
            .with_url(page_url.to_string())
            .with_confidence(confidence)
            .with_item_count(articles.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>"jane doe" - Google News</title>
    <item>
      <title>Jane Doe ships a database &ndash; TechDaily</title>
      <link>https://news.example.com/a1</link>
      <pubDate>Mon, 02 Jun 2025 15:04:05 GMT</pubDate>
      <description>&lt;a href="https://news.example.com/a1"&gt;Jane Doe ships&lt;/a&gt;</description>
      <source url="https://techdaily.example.com">TechDaily</source>
    </item>
    <item>
      <title>Interview with Jane Doe</title>
      <link>https://news.example.com/a2</link>
      <pubDate>Sun, 01 Jun 2025 08:00:00 GMT</pubDate>
      <source url="https://weekly.example.com">Weekly</source>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_articles_with_outlets() {
        let articles = parse_articles_from_str(FEED).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Jane Doe ships a database - TechDaily");
        assert_eq!(articles[0].source.as_deref(), Some("TechDaily"));
        assert_eq!(articles[0].published_at, "2025-06-02T15:04:05Z");
        // Description is entity-decoded and tag-stripped.
        assert_eq!(articles[0].description.as_deref(), Some("Jane Doe ships"));
        assert!(articles[1].description.is_none());
    }

    #[test]
    fn garbage_xml_is_an_error() {
        assert!(parse_articles_from_str("<html>not a feed</html>").is_err());
    }
}
