// src/sources/twitter.rs
//! Tweet scrape through a Nitter RSS mirror; X's own API is closed off.

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

const MIRROR: &str = "https://nitter.net";
const TWEET_CAP: usize = 50;

pub struct TwitterAdapter {
    session: Arc<HttpSession>,
}

impl TwitterAdapter {
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
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, PartialEq)]
struct Tweet {
    text: String,
    url: Option<String>,
    posted_at: String,
}

/// Channel title comes as "Display Name / @handle".
fn display_name(channel_title: Option<&str>) -> Option<String> {
    let title = clean_text(channel_title.unwrap_or_default());
    let name = title.split(" / ").next().unwrap_or_default().trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn parse_tweets_from_str(xml: &str) -> Result<(Option<String>, Vec<Tweet>)> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing nitter feed xml")?;
    let name = display_name(rss.channel.title.as_deref());

    let mut tweets = Vec::with_capacity(rss.channel.item.len().min(TWEET_CAP));
    for it in rss.channel.item.into_iter().take(TWEET_CAP) {
        let text = clean_text(it.title.as_deref().unwrap_or_default());
        if text.is_empty() {
            continue;
        }
        tweets.push(Tweet {
            text,
            url: it.link,
            posted_at: unix_to_iso(it.pub_date.as_deref().map(rfc2822_to_unix).unwrap_or(0)),
        });
    }
    Ok((name, tweets))
}

#[async_trait]
impl SourceAdapter for TwitterAdapter {
    fn name(&self) -> &'static str {
        "twitter"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let username = identifier.trim().trim_start_matches('@');
        let feed_url = format!("{MIRROR}/{username}/rss");
        let body = self
            .session
            .fetch_text(&feed_url)
            .await
            .context("Nitter feed fetch")?;
        let (display, tweets) = parse_tweets_from_str(&body)?;

        let tweets_json: Vec<_> = tweets
            .iter()
            .map(|t| json!({"text": t.text, "url": t.url, "postedAt": t.posted_at}))
            .collect();

        // Mirrors rate-limit hard; an empty feed is a low-trust signal, not
        // proof the account is silent.
        let confidence = if tweets.is_empty() { 40 } else { 85 };
        let payload = json!({
            "username": username,
            "displayName": display,
            "tweets": tweets_json,
            "totalTweets": tweets.len(),
        });
        Ok(SourceResult::new(self.name(), username, payload)
            .with_url(format!("https://twitter.com/{username}"))
            .with_confidence(confidence)
            .with_item_count(tweets.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Jane Doe / @janedoe</title>
    <item>
      <title>shipping the thing &ndash; finally</title>
      <link>https://nitter.net/janedoe/status/1</link>
      <pubDate>Mon, 02 Jun 2025 15:04:05 GMT</pubDate>
    </item>
    <item>
      <title>RT by @janedoe: borrowed wisdom</title>
      <link>https://nitter.net/janedoe/status/2</link>
      <pubDate>Sun, 01 Jun 2025 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_display_name_and_tweets() {
        let (name, tweets) = parse_tweets_from_str(FEED).unwrap();
        assert_eq!(name.as_deref(), Some("Jane Doe"));
        assert_eq!(tweets.len(), 2);
        assert_eq!(tweets[0].text, "shipping the thing - finally");
        assert_eq!(tweets[0].posted_at, "2025-06-02T15:04:05Z");
    }

    #[test]
    fn missing_channel_title_is_none() {
        let xml = r#"<rss><channel><item><title>hi</title></item></channel></rss>"#;
        let (name, tweets) = parse_tweets_from_str(xml).unwrap();
        assert!(name.is_none());
        assert_eq!(tweets.len(), 1);
    }
}
