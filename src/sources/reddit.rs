// src/sources/reddit.rs
//! Reddit account scrape: profile, submitted posts and recent comments.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::normalize::truncate_chars;
use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;
use crate::sources::{round1, unix_to_iso};

const BASE: &str = "https://www.reddit.com";
const LISTING_LIMIT: u32 = 50;
const BODY_CAP: usize = 500;

pub struct RedditAdapter {
    session: Arc<HttpSession>,
}

impl RedditAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

#[derive(Debug, Deserialize)]
struct About {
    data: AboutData,
}

#[derive(Debug, Deserialize)]
struct AboutData {
    name: String,
    #[serde(default)]
    link_karma: i64,
    #[serde(default)]
    comment_karma: i64,
    total_karma: Option<i64>,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    is_gold: bool,
    #[serde(default)]
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    #[serde(default = "Vec::new")]
    children: Vec<Child<T>>,
}

#[derive(Debug, Deserialize)]
struct Child<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    title: Option<String>,
    subreddit: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    permalink: Option<String>,
    #[serde(default)]
    created_utc: f64,
    selftext: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    body: Option<String>,
    subreddit: Option<String>,
    #[serde(default)]
    score: i64,
    permalink: Option<String>,
    #[serde(default)]
    created_utc: f64,
}

fn permalink_url(permalink: Option<&str>) -> Option<String> {
    permalink.map(|p| format!("{BASE}{p}"))
}

/// Subreddits this account is most active in, posts and comments combined.
fn favorite_subreddits(posts: &[RawPost], comments: &[RawComment]) -> Vec<serde_json::Value> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for sub in posts
        .iter()
        .filter_map(|p| p.subreddit.as_deref())
        .chain(comments.iter().filter_map(|c| c.subreddit.as_deref()))
    {
        *counts.entry(sub).or_default() += 1;
    }
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(10)
        .map(|(subreddit, count)| json!({"subreddit": subreddit, "count": count}))
        .collect()
}

fn avg_score(total: i64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        round1(total as f64 / n as f64)
    }
}

fn build_payload(about: &AboutData, posts: &[RawPost], comments: &[RawComment]) -> serde_json::Value {
    let posts_json: Vec<_> = posts
        .iter()
        .map(|p| {
            json!({
                "title": p.title,
                "subreddit": p.subreddit,
                "score": p.score,
                "numComments": p.num_comments,
                "url": permalink_url(p.permalink.as_deref()),
                "createdAt": unix_to_iso(p.created_utc as u64),
                "text": p.selftext.as_deref().map(|t| truncate_chars(t, BODY_CAP)),
            })
        })
        .collect();

    let comments_json: Vec<_> = comments
        .iter()
        .map(|c| {
            json!({
                "text": c.body.as_deref().map(|t| truncate_chars(t, BODY_CAP)),
                "subreddit": c.subreddit,
                "score": c.score,
                "url": permalink_url(c.permalink.as_deref()),
                "createdAt": unix_to_iso(c.created_utc as u64),
            })
        })
        .collect();

    json!({
        "username": about.name,
        "karma": {
            "post": about.link_karma,
            "comment": about.comment_karma,
            "total": about.total_karma.unwrap_or(about.link_karma + about.comment_karma),
        },
        "accountCreated": unix_to_iso(about.created_utc as u64),
        "isGold": about.is_gold,
        "verified": about.verified,
        "posts": posts_json,
        "comments": comments_json,
        "favoriteSubreddits": favorite_subreddits(posts, comments),
        "stats": {
            "totalPosts": posts.len(),
            "totalComments": comments.len(),
            "averagePostScore": avg_score(posts.iter().map(|p| p.score).sum(), posts.len()),
            "averageCommentScore": avg_score(comments.iter().map(|c| c.score).sum(), comments.len()),
        },
    })
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let username = identifier.trim().trim_start_matches("u/");

        let about_url = format!("{BASE}/user/{username}/about.json");
        let resp = self
            .session
            .client()?
            .get(&about_url)
            .send()
            .await
            .with_context(|| format!("GET {about_url}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("Reddit user '{username}' not found");
        }
        let about: About = resp
            .error_for_status()
            .context("Reddit profile lookup")?
            .json()
            .await
            .context("decoding Reddit profile")?;

        let posts: Listing<RawPost> = self
            .session
            .get_json(&format!(
                "{BASE}/user/{username}/submitted.json?limit={LISTING_LIMIT}"
            ))
            .await
            .context("Reddit submitted listing")?;
        let comments: Listing<RawComment> = self
            .session
            .get_json(&format!(
                "{BASE}/user/{username}/comments.json?limit={LISTING_LIMIT}"
            ))
            .await
            .context("Reddit comment listing")?;

        let posts: Vec<RawPost> = posts.data.children.into_iter().map(|c| c.data).collect();
        let comments: Vec<RawComment> =
            comments.data.children.into_iter().map(|c| c.data).collect();

        let item_count = (posts.len() + comments.len()) as u64;
        let payload = build_payload(&about.data, &posts, &comments);
        Ok(SourceResult::new(self.name(), username, payload)
            .with_url(format!("{BASE}/user/{username}"))
            .with_confidence(90)
            .with_item_count(item_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_post(sub: &str, score: i64) -> RawPost {
        RawPost {
            title: Some("t".into()),
            subreddit: Some(sub.into()),
            score,
            num_comments: 1,
            permalink: Some("/r/x/comments/1".into()),
            created_utc: 1_700_000_000.0,
            selftext: Some("body".into()),
        }
    }

    fn mk_comment(sub: &str, score: i64) -> RawComment {
        RawComment {
            body: Some("c".into()),
            subreddit: Some(sub.into()),
            score,
            permalink: None,
            created_utc: 1_700_000_000.0,
        }
    }

    fn mk_about() -> AboutData {
        AboutData {
            name: "spez".into(),
            link_karma: 100,
            comment_karma: 50,
            total_karma: None,
            created_utc: 1_119_398_400.0,
            is_gold: false,
            verified: true,
        }
    }

    #[test]
    fn karma_total_falls_back_to_sum() {
        let v = build_payload(&mk_about(), &[], &[]);
        assert_eq!(v["karma"]["total"], 150);
        assert_eq!(v["stats"]["totalPosts"], 0);
        assert_eq!(v["stats"]["averagePostScore"], 0.0);
    }

    #[test]
    fn favorite_subreddits_merge_posts_and_comments() {
        let posts = vec![mk_post("rust", 10), mk_post("rust", 4), mk_post("golang", 2)];
        let comments = vec![mk_comment("rust", 1), mk_comment("python", 3)];
        let v = build_payload(&mk_about(), &posts, &comments);

        assert_eq!(v["favoriteSubreddits"][0]["subreddit"], "rust");
        assert_eq!(v["favoriteSubreddits"][0]["count"], 3);
        assert_eq!(v["stats"]["averagePostScore"], 5.3);
    }

    #[test]
    fn permalinks_become_absolute_urls() {
        let v = build_payload(&mk_about(), &[mk_post("rust", 1)], &[]);
        assert_eq!(
            v["posts"][0]["url"],
            "https://www.reddit.com/r/x/comments/1"
        );
    }
}
