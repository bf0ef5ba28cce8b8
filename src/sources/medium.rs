// src/sources/medium.rs
//! Medium article history via the public author RSS feed.

use std::collections::HashMap;
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

pub struct MediumAdapter {
    session: Arc<HttpSession>,
}

impl MediumAdapter {
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
    #[serde(rename = "category", default)]
    categories: Vec<String>,
}

#[derive(Debug, PartialEq)]
struct Article {
    title: String,
    url: Option<String>,
    published_at: String,
    categories: Vec<String>,
}

fn parse_articles_from_str(xml: &str) -> Result<Vec<Article>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing medium feed xml")?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = clean_text(it.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            continue;
        }
        out.push(Article {
            title,
            url: it.link,
            published_at: unix_to_iso(
                it.pub_date.as_deref().map(rfc2822_to_unix).unwrap_or(0),
            ),
            categories: it.categories,
        });
    }
    Ok(out)
}

/// Most used tags across the fetched articles, most frequent first.
fn top_topics(articles: &[Article]) -> Vec<String> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for cat in articles.iter().flat_map(|a| a.categories.iter()) {
        *counts.entry(cat.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.into_iter().take(10).map(|(t, _)| t.to_string()).collect()
}

#[async_trait]
impl SourceAdapter for MediumAdapter {
    fn name(&self) -> &'static str {
        "medium"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let username = identifier.trim().trim_start_matches('@');
        let feed_url = format!("https://medium.com/feed/@{username}");
        let body = self
            .session
            .fetch_text(&feed_url)
            .await
            .context("Medium feed fetch")?;
        let articles = parse_articles_from_str(&body)?;

        let articles_json: Vec<_> = articles
            .iter()
            .map(|a| {
                json!({
                    "title": a.title,
                    "url": a.url,
                    "publishedAt": a.published_at,
                    "categories": a.categories,
                })
            })
            .collect();

        let confidence = if articles.is_empty() { 30 } else { 80 };
        let payload = json!({
            "username": username,
            "articles": articles_json,
            "totalArticles": articles.len(),
            "topics": top_topics(&articles),
        });
        Ok(SourceResult::new(self.name(), username, payload)
            .with_url(format!("https://medium.com/@{username}"))
            .with_confidence(confidence)
            .with_item_count(articles.len() as u64))
    }
}
