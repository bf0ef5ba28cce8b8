// src/sources/linkedin.rs
//! Public LinkedIn profile card, read from OpenGraph meta tags. Full profile
//! sections sit behind the auth wall; the OG tags are what an anonymous
//! visitor actually gets.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::json;

use crate::normalize::clean_text;
use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;

pub struct LinkedInAdapter {
    session: Arc<HttpSession>,
}

impl LinkedInAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

/// `<meta property="og:x" content="...">` in either attribute order.
fn og_content<'a>(html: &'a str, property: &str) -> Option<&'a str> {
    static RE_PROP_FIRST: OnceCell<Regex> = OnceCell::new();
    let re_prop = RE_PROP_FIRST.get_or_init(|| {
        Regex::new(r#"(?is)<meta[^>]+property="og:([a-z:]+)"[^>]+content="([^"]*)""#)
            .expect("og regex")
    });
    static RE_CONTENT_FIRST: OnceCell<Regex> = OnceCell::new();
    let re_content = RE_CONTENT_FIRST.get_or_init(|| {
        Regex::new(r#"(?is)<meta[^>]+content="([^"]*)"[^>]+property="og:([a-z:]+)""#)
            .expect("og regex")
    });

    for caps in re_prop.captures_iter(html) {
        if &caps[1] == property {
            return caps.get(2).map(|m| m.as_str());
        }
    }
    for caps in re_content.captures_iter(html) {
        if &caps[2] == property {
            return caps.get(1).map(|m| m.as_str());
        }
    }
    None
}

/// OG titles come as "Name - Headline | LinkedIn".
fn split_title(og_title: &str) -> (String, Option<String>) {
    let trimmed = og_title.trim_end_matches("| LinkedIn").trim();
    match trimmed.split_once(" - ") {
        Some((name, headline)) => (
            clean_text(name),
            Some(clean_text(headline)).filter(|h| !h.is_empty()),
        ),
        None => (clean_text(trimmed), None),
    }
}

fn profile_url_for(identifier: &str) -> String {
    let id = identifier.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        id.to_string()
    } else {
        format!("https://www.linkedin.com/in/{id}")
    }
}

#[async_trait]
impl SourceAdapter for LinkedInAdapter {
    fn name(&self) -> &'static str {
        "linkedin"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let profile_url = profile_url_for(identifier);
        let body = self
            .session
            .fetch_text(&profile_url)
            .await
            .context("LinkedIn profile fetch")?;

        let Some(og_title) = og_content(&body, "title") else {
            // The auth wall serves a page without OG profile tags.
            anyhow::bail!("LinkedIn profile not accessible for '{}'", identifier.trim());
        };
        let (name, headline) = split_title(og_title);
        if name.is_empty() {
            anyhow::bail!("LinkedIn profile not accessible for '{}'", identifier.trim());
        }

        let about = og_content(&body, "description")
            .map(clean_text)
            .filter(|d| !d.is_empty());
        let image = og_content(&body, "image").map(str::to_string);
        let canonical = og_content(&body, "url")
            .map(str::to_string)
            .unwrap_or_else(|| profile_url.clone());

        let payload = json!({
            "name": name,
            "headline": headline,
            "about": about,
            "profileImage": image,
            "profileUrl": canonical,
        });
        Ok(SourceResult::new(self.name(), identifier.trim(), payload)
            .with_url(profile_url)
            .with_confidence(75)
            .with_item_count(1))
    }
}
