// src/sources/github.rs
//! GitHub profile and repository scrape via the public REST API.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::scrape::types::{SourceAdapter, SourceResult};
use crate::session::HttpSession;
use crate::sources::round1;

const API_BASE: &str = "https://api.github.com";

pub struct GitHubAdapter {
    session: Arc<HttpSession>,
}

impl GitHubAdapter {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self { session }
    }

    /// GITHUB_TOKEN lifts the unauthenticated rate limit when present.
    fn request(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        let mut req = self
            .session
            .client()?
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()) {
            req = req.header(AUTHORIZATION, format!("token {token}"));
        }
        Ok(req)
    }
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
    name: Option<String>,
    bio: Option<String>,
    company: Option<String>,
    location: Option<String>,
    email: Option<String>,
    blog: Option<String>,
    twitter_username: Option<String>,
    #[serde(default)]
    public_repos: u64,
    #[serde(default)]
    public_gists: u64,
    #[serde(default)]
    followers: u64,
    #[serde(default)]
    following: u64,
    created_at: Option<String>,
    updated_at: Option<String>,
    html_url: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhRepo {
    name: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    language: Option<String>,
    html_url: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

fn build_payload(user: &GhUser, repos: &[GhRepo]) -> serde_json::Value {
    let total_stars: u64 = repos.iter().map(|r| r.stargazers_count).sum();
    let total_forks: u64 = repos.iter().map(|r| r.forks_count).sum();
    let average_stars = if repos.is_empty() {
        0.0
    } else {
        round1(total_stars as f64 / repos.len() as f64)
    };

    let mut by_language: HashMap<&str, u64> = HashMap::new();
    for repo in repos {
        if let Some(lang) = repo.language.as_deref() {
            *by_language.entry(lang).or_default() += 1;
        }
    }
    let mut languages: Vec<_> = by_language.into_iter().collect();
    languages.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let languages: Vec<_> = languages
        .into_iter()
        .map(|(language, repos)| json!({"language": language, "repos": repos}))
        .collect();

    let mut by_stars: Vec<&GhRepo> = repos.iter().collect();
    by_stars.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
    let top_repositories: Vec<_> = by_stars
        .iter()
        .take(10)
        .map(|r| {
            json!({
                "name": r.name,
                "description": r.description,
                "stars": r.stargazers_count,
                "forks": r.forks_count,
                "language": r.language,
                "url": r.html_url,
                "topics": r.topics,
            })
        })
        .collect();

    json!({
        "username": user.login,
        "name": user.name,
        "bio": user.bio,
        "company": user.company,
        "location": user.location,
        "email": user.email,
        "blog": user.blog,
        "twitter": user.twitter_username,
        "publicRepos": user.public_repos,
        "publicGists": user.public_gists,
        "followers": user.followers,
        "following": user.following,
        "createdAt": user.created_at,
        "updatedAt": user.updated_at,
        "profileUrl": user.html_url,
        "avatarUrl": user.avatar_url,
        "languages": languages,
        "topRepositories": top_repositories,
        "stats": {
            "totalStars": total_stars,
            "totalForks": total_forks,
            "averageStarsPerRepo": average_stars,
        },
    })
}

#[async_trait]
impl SourceAdapter for GitHubAdapter {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn fetch(&self, identifier: &str) -> Result<SourceResult> {
        let username = identifier.trim();

        let user_url = format!("{API_BASE}/users/{username}");
        let resp = self
            .request(&user_url)?
            .send()
            .await
            .with_context(|| format!("GET {user_url}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            anyhow::bail!("GitHub user '{username}' not found");
        }
        let user: GhUser = resp
            .error_for_status()
            .context("GitHub user lookup")?
            .json()
            .await
            .context("decoding GitHub user")?;

        let repos_url = format!("{API_BASE}/users/{username}/repos?sort=updated&per_page=100");
        let repos: Vec<GhRepo> = self
            .request(&repos_url)?
            .send()
            .await
            .with_context(|| format!("GET {repos_url}"))?
            .error_for_status()
            .context("GitHub repo listing")?
            .json()
            .await
            .context("decoding GitHub repos")?;

        let item_count = repos.len() as u64;
        let payload = build_payload(&user, &repos);
        Ok(SourceResult::new(self.name(), username, payload)
            .with_url(format!("https://github.com/{username}"))
            .with_confidence(95)
            .with_item_count(item_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_user() -> GhUser {
        GhUser {
            login: "octocat".into(),
            name: Some("The Octocat".into()),
            bio: None,
            company: Some("GitHub".into()),
            location: Some("San Francisco".into()),
            email: None,
            blog: None,
            twitter_username: None,
            public_repos: 8,
            public_gists: 2,
            followers: 100,
            following: 5,
            created_at: Some("2011-01-25T18:44:36Z".into()),
            updated_at: None,
            html_url: Some("https://github.com/octocat".into()),
            avatar_url: None,
        }
    }

    fn mk_repo(name: &str, stars: u64, lang: Option<&str>) -> GhRepo {
        GhRepo {
            name: name.into(),
            description: None,
            stargazers_count: stars,
            forks_count: stars / 2,
            language: lang.map(String::from),
            html_url: Some(format!("https://github.com/octocat/{name}")),
            topics: vec![],
        }
    }

    #[test]
    fn payload_aggregates_stars_and_languages() {
        let repos = vec![
            mk_repo("a", 10, Some("Rust")),
            mk_repo("b", 30, Some("Rust")),
            mk_repo("c", 20, Some("Go")),
            mk_repo("d", 0, None),
        ];
        let v = build_payload(&mk_user(), &repos);

        assert_eq!(v["stats"]["totalStars"], 60);
        assert_eq!(v["stats"]["totalForks"], 30);
        assert_eq!(v["stats"]["averageStarsPerRepo"], 15.0);

        // Most common language first, untyped repos excluded.
        assert_eq!(v["languages"][0]["language"], "Rust");
        assert_eq!(v["languages"][0]["repos"], 2);
        assert_eq!(v["languages"].as_array().unwrap().len(), 2);

        // Top repositories sorted by stars.
        assert_eq!(v["topRepositories"][0]["name"], "b");
        assert_eq!(v["topRepositories"][1]["name"], "c");
    }

    #[test]
    fn payload_handles_zero_repos() {
        let v = build_payload(&mk_user(), &[]);
        assert_eq!(v["stats"]["averageStarsPerRepo"], 0.0);
        assert_eq!(v["topRepositories"].as_array().unwrap().len(), 0);
        assert_eq!(v["username"], "octocat");
    }

    #[test]
    fn top_repositories_cap_at_ten() {
        let repos: Vec<_> = (0..15).map(|i| mk_repo(&format!("r{i}"), i, None)).collect();
        let v = build_payload(&mk_user(), &repos);
        assert_eq!(v["topRepositories"].as_array().unwrap().len(), 10);
    }
}
