// src/sources/google_scholar.rs
//! Scholarly publications scraped from Google Scholar result pages. Pure
//! text extraction over the result markup; brittle by nature, so the parse
//! degrades to fewer papers rather than failing the source.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::json;

use crate::normalize::clean_text;
use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;

const RESULTS_BASE: &str = "https://scholar.google.com/scholar";
const PAPER_CAP: usize = 20;

pub struct GoogleScholarAdapter {
    session: Arc<HttpSession>,
}

impl GoogleScholarAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

#[derive(Debug, PartialEq)]
struct Paper {
    title: String,
    url: Option<String>,
    authors: Option<String>,
    snippet: Option<String>,
    cited_by: u64,
}

fn cap1<'a>(re: &Regex, hay: &'a str) -> Option<&'a str> {
    re.captures(hay).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Each result sits in a `<div class="gs_r ...">` block with a `gs_rt` title,
/// a `gs_a` author line and a `gs_rs` snippet.
fn parse_papers_from_str(html: &str) -> Vec<Paper> {
    static RE_TITLE: OnceCell<Regex> = OnceCell::new();
    let re_title = RE_TITLE
        .get_or_init(|| Regex::new(r#"(?is)<h3 class="gs_rt[^>]*>(.*?)</h3>"#).expect("title regex"));
    static RE_HREF: OnceCell<Regex> = OnceCell::new();
    let re_href = RE_HREF.get_or_init(|| {
        Regex::new(r#"(?is)<h3 class="gs_rt[^>]*>.*?<a[^>]+href="([^"]+)""#).expect("href regex")
    });
    static RE_AUTHORS: OnceCell<Regex> = OnceCell::new();
    let re_authors = RE_AUTHORS
        .get_or_init(|| Regex::new(r#"(?is)<div class="gs_a[^>]*>(.*?)</div>"#).expect("authors regex"));
    static RE_SNIPPET: OnceCell<Regex> = OnceCell::new();
    let re_snippet = RE_SNIPPET
        .get_or_init(|| Regex::new(r#"(?is)<div class="gs_rs[^>]*>(.*?)</div>"#).expect("snippet regex"));
    static RE_CITED: OnceCell<Regex> = OnceCell::new();
    let re_cited =
        RE_CITED.get_or_init(|| Regex::new(r"Cited by (\d+)").expect("cited regex"));

    let mut out = Vec::new();
    for chunk in html.split(r#"<div class="gs_r"#).skip(1) {
        if out.len() >= PAPER_CAP {
            break;
        }
        let Some(title_html) = cap1(re_title, chunk) else {
            continue;
        };
        let title = clean_text(title_html);
        if title.is_empty() {
            continue;
        }
        out.push(Paper {
            title,
            url: cap1(re_href, chunk).map(str::to_string),
            authors: cap1(re_authors, chunk)
                .map(clean_text)
                .filter(|a| !a.is_empty()),
            snippet: cap1(re_snippet, chunk)
                .map(clean_text)
                .filter(|s| !s.is_empty()),
            cited_by: cap1(re_cited, chunk)
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
        });
    }
    out
}

#[async_trait]
impl SourceAdapter for GoogleScholarAdapter {
    fn name(&self) -> &'static str {
        "google-scholar"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let query = identifier.trim();
        let url = reqwest::Url::parse_with_params(RESULTS_BASE, &[("q", query)])
            .context("building scholar url")?;
        let body = self
            .session
            .fetch_text(url.as_str())
            .await
            .context("Google Scholar page fetch")?;
        let papers = parse_papers_from_str(&body);

        let total_citations: u64 = papers.iter().map(|p| p.cited_by).sum();
        let papers_json: Vec<_> = papers
            .iter()
            .map(|p| {
                json!({
                    "title": p.title,
                    "url": p.url,
                    "authors": p.authors,
                    "snippet": p.snippet,
                    "citedBy": p.cited_by,
                })
            })
            .collect();

        let confidence = if papers.is_empty() { 30 } else { 80 };
        let payload = json!({
            "papers": papers_json,
            "totalResults": papers.len(),
            "totalCitations": total_citations,
        });
        Ok(SourceResult::new(self.name(), query, payload)
            .with_url(url.to_string())
            .with_confidence(confidence)
            .with_item_count(papers.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><body>
<div class="gs_r gs_or gs_scl">
  <h3 class="gs_rt"><a href="https://arxiv.example.org/p1">Fearless <b>concurrency</b> in practice</a></h3>
  <div class="gs_a">J Doe, R Smith - Systems Journal, 2024</div>
  <div class="gs_rs">We study ownership&nbsp;and aliasing…</div>
  <a href="#">Cited by 42</a>
</div>
<div class="gs_r gs_or gs_scl">
  <h3 class="gs_rt">[CITATION] Untitled memo</h3>
  <div class="gs_a">J Doe - 2020</div>
</div>
</body></html>"##;

    #[test]
    fn extracts_title_authors_and_citations() {
        let papers = parse_papers_from_str(PAGE);
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Fearless concurrency in practice");
        assert_eq!(papers[0].url.as_deref(), Some("https://arxiv.example.org/p1"));
        assert_eq!(
            papers[0].authors.as_deref(),
            Some("J Doe, R Smith - Systems Journal, 2024")
        );
        assert_eq!(papers[0].cited_by, 42);
        // Linkless citation entries still count, without a URL.
        assert_eq!(papers[1].title, "[CITATION] Untitled memo");
        assert!(papers[1].url.is_none());
        assert_eq!(papers[1].cited_by, 0);
    }

    #[test]
    fn empty_page_yields_no_papers() {
        assert!(parse_papers_from_str("<html><body>No results</body></html>").is_empty());
    }
}
