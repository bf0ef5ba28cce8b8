// src/sources/stackoverflow.rs
//! Stack Overflow reputation and answer history via the Stack Exchange API.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;
use crate::sources::{round1, unix_to_iso};

const API_BASE: &str = "https://api.stackexchange.com/2.3";
const ANSWER_PAGE: u32 = 20;

pub struct StackOverflowAdapter {
    session: Arc<HttpSession>,
}

impl StackOverflowAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }
}

#[derive(Debug, Deserialize)]
struct Wrapper<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SoUser {
    user_id: i64,
    display_name: String,
    #[serde(default)]
    reputation: i64,
    badge_counts: Option<Badges>,
    #[serde(default)]
    creation_date: i64,
    link: Option<String>,
    location: Option<String>,
    website_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Badges {
    #[serde(default)]
    gold: i64,
    #[serde(default)]
    silver: i64,
    #[serde(default)]
    bronze: i64,
}

#[derive(Debug, Deserialize)]
struct SoAnswer {
    answer_id: i64,
    question_id: i64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    is_accepted: bool,
    #[serde(default)]
    creation_date: i64,
}

#[derive(Debug, Deserialize)]
struct SoTag {
    tag_name: String,
    #[serde(default)]
    answer_score: i64,
    #[serde(default)]
    answer_count: i64,
}

fn build_payload(user: &SoUser, answers: &[SoAnswer], tags: &[SoTag]) -> serde_json::Value {
    let badges = user.badge_counts.as_ref();
    let accepted = answers.iter().filter(|a| a.is_accepted).count();
    let score_sum: i64 = answers.iter().map(|a| a.score).sum();
    let average = if answers.is_empty() {
        0.0
    } else {
        round1(score_sum as f64 / answers.len() as f64)
    };

    let top_answers: Vec<_> = answers
        .iter()
        .map(|a| {
            json!({
                "answerId": a.answer_id,
                "questionId": a.question_id,
                "score": a.score,
                "accepted": a.is_accepted,
                "createdAt": unix_to_iso(a.creation_date.max(0) as u64),
                "url": format!("https://stackoverflow.com/a/{}", a.answer_id),
            })
        })
        .collect();

    let top_tags: Vec<_> = tags
        .iter()
        .map(|t| {
            json!({
                "tag": t.tag_name,
                "score": t.answer_score,
                "answers": t.answer_count,
            })
        })
        .collect();

    json!({
        "userId": user.user_id,
        "displayName": user.display_name,
        "reputation": user.reputation,
        "badges": {
            "gold": badges.map(|b| b.gold).unwrap_or(0),
            "silver": badges.map(|b| b.silver).unwrap_or(0),
            "bronze": badges.map(|b| b.bronze).unwrap_or(0),
        },
        "memberSince": unix_to_iso(user.creation_date.max(0) as u64),
        "location": user.location,
        "website": user.website_url,
        "profileUrl": user.link,
        "topAnswers": top_answers,
        "topTags": top_tags,
        "stats": {
            "totalAnswers": answers.len(),
            "acceptedAnswers": accepted,
            "averageAnswerScore": average,
        },
    })
}

#[async_trait]
impl SourceAdapter for StackOverflowAdapter {
    fn name(&self) -> &'static str {
        "stackoverflow"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let user_id: u64 = identifier
            .trim()
            .parse()
            .context("Stack Overflow identifier must be a numeric user id")?;

        let users: Wrapper<SoUser> = self
            .session
            .get_json(&format!("{API_BASE}/users/{user_id}?site=stackoverflow"))
            .await
            .context("Stack Overflow user lookup")?;
        let user = users
            .items
            .into_iter()
            .next()
            .with_context(|| format!("Stack Overflow user '{user_id}' not found"))?;

        let answers: Wrapper<SoAnswer> = self
            .session
            .get_json(&format!(
                "{API_BASE}/users/{user_id}/answers?site=stackoverflow&order=desc&sort=votes&pagesize={ANSWER_PAGE}"
            ))
            .await
            .context("Stack Overflow answer listing")?;

        let tags: Wrapper<SoTag> = self
            .session
            .get_json(&format!(
                "{API_BASE}/users/{user_id}/top-tags?site=stackoverflow&pagesize=10"
            ))
            .await
            .context("Stack Overflow tag listing")?;

        let item_count = answers.items.len() as u64;
        let url = user
            .link
            .clone()
            .unwrap_or_else(|| format!("https://stackoverflow.com/users/{user_id}"));
        let payload = build_payload(&user, &answers.items, &tags.items);
        Ok(SourceResult::new(self.name(), identifier.trim(), payload)
            .with_url(url)
            .with_confidence(85)
            .with_item_count(item_count))
    }
}
