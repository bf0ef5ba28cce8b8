// src/sources/google_images.rs
//! Image presence check against Google Images result markup.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::json;

use crate::normalize::clean_text;
use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;

const SEARCH_BASE: &str = "https://www.google.com/search";
const IMAGE_CAP: usize = 30;

pub struct GoogleImagesAdapter {
    session: Arc<HttpSession>,
}

impl GoogleImagesAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

#[derive(Debug, PartialEq)]
struct ImageRef {
    url: String,
    alt: Option<String>,
}

/// Pull `<img>` tags with an http(s) src, skipping obvious chrome like logos.
fn parse_images_from_str(html: &str) -> Vec<ImageRef> {
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re_img = RE_IMG.get_or_init(|| Regex::new(r"(?is)<img[^>]+>").expect("img regex"));
    static RE_SRC: OnceCell<Regex> = OnceCell::new();
    let re_src = RE_SRC.get_or_init(|| {
        Regex::new(r#"(?i)(?:data-src|src)\s*=\s*"(https?://[^"]+)""#).expect("src regex")
    });
    static RE_ALT: OnceCell<Regex> = OnceCell::new();
    let re_alt =
        RE_ALT.get_or_init(|| Regex::new(r#"(?i)alt\s*=\s*"([^"]*)""#).expect("alt regex"));

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for tag in re_img.find_iter(html).map(|m| m.as_str()) {
        if out.len() >= IMAGE_CAP {
            break;
        }
        let Some(src) = re_src.captures(tag).and_then(|c| c.get(1)) else {
            continue;
        };
        let url = src.as_str().to_string();
        if url.contains("logo") || !seen.insert(url.clone()) {
            continue;
        }
        let alt = re_alt
            .captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| clean_text(m.as_str()))
            .filter(|a| !a.is_empty());
        out.push(ImageRef { url, alt });
    }
    out
}

#[async_trait]
impl SourceAdapter for GoogleImagesAdapter {
    fn name(&self) -> &'static str {
        "google-images"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let query = identifier.trim();
        let url = reqwest::Url::parse_with_params(SEARCH_BASE, &[("q", query), ("tbm", "isch")])
            .context("building image search url")?;
        let body = self
            .session
            .fetch_text(url.as_str())
            .await
            .context("Google Images page fetch")?;
        let images = parse_images_from_str(&body);

        let images_json: Vec<_> = images
            .iter()
            .map(|i| json!({"url": i.url, "alt": i.alt}))
            .collect();

        let confidence = if images.is_empty() { 30 } else { 80 };
        let payload = json!({
            "images": images_json,
            "totalResults": images.len(),
        });
        Ok(SourceResult::new(self.name(), query, payload)
            .with_url(url.to_string())
            .with_confidence(confidence)
            .with_item_count(images.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<img src="https://www.google.com/images/branding/googlelogo.png" alt="Google">
<img class="t" data-src="https://encrypted-tbn0.gstatic.com/images?q=a1" alt="Jane at RustConf">
<img src="https://encrypted-tbn0.gstatic.com/images?q=a2" alt="">
<img src="https://encrypted-tbn0.gstatic.com/images?q=a2" alt="dup">
<img src="/relative/sprite.png" alt="sprite">
</body></html>"#;

    #[test]
    fn keeps_http_images_skips_logos_and_dups() {
        let images = parse_images_from_str(PAGE);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://encrypted-tbn0.gstatic.com/images?q=a1");
        assert_eq!(images[0].alt.as_deref(), Some("Jane at RustConf"));
        // Empty alt collapses to None, relative srcs are dropped.
        assert!(images[1].alt.is_none());
    }

    #[test]
    fn cap_applies() {
        let many: String = (0..40)
            .map(|i| format!(r#"<img src="https://img.example.com/{i}.jpg">"#))
            .collect();
        assert_eq!(parse_images_from_str(&many).len(), IMAGE_CAP);
    }
}
