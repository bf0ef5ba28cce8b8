// src/registry.rs
//! String-keyed adapter registry.
//!
//! Sources register once at startup and are dispatched by name at request
//! time, so adding a platform means writing the adapter and one `register`
//! line here. The literal "all" expands to every registered source in
//! registration order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::scrape::types::SourceAdapter;
use crate::session::HttpSession;
use crate::sources;

/// Sentinel that expands to every registered source.
pub const ALL_SOURCES: &str = "all";

#[derive(Default)]
pub struct SourceRegistry {
    adapters: HashMap<&'static str, Arc<dyn SourceAdapter>>,
    order: Vec<&'static str>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in platform adapter, all sharing one HTTP session.
    pub fn builtin(session: &Arc<HttpSession>) -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(sources::github::GitHubAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(sources::twitter::TwitterAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(sources::reddit::RedditAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(sources::youtube::YouTubeAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(sources::google_news::GoogleNewsAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(sources::stackoverflow::StackOverflowAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(sources::medium::MediumAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(
            sources::google_scholar::GoogleScholarAdapter::new(session.clone()),
        ));
        reg.register(Arc::new(sources::google_images::GoogleImagesAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(sources::linkedin::LinkedInAdapter::new(
            session.clone(),
        )));
        reg.register(Arc::new(sources::abn_lookup::AbnLookupAdapter::new(
            session.clone(),
        )));
        reg
    }

    /// Register an adapter under its own name. Re-registering a name replaces
    /// the adapter but keeps its original dispatch position.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let name = adapter.name();
        if self.adapters.insert(name, adapter).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Expand a request into the concrete source list: trim and lowercase
    /// each name, expand "all", drop duplicates keeping first-seen order.
    /// Unknown names stay in the output; dispatch turns them into per-source
    /// failures instead of dropping them silently.
    pub fn resolve(&self, requested: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for raw in requested {
            let name = raw.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            if name == ALL_SOURCES {
                for &n in &self.order {
                    if seen.insert(n.to_string()) {
                        out.push(n.to_string());
                    }
                }
            } else if seen.insert(name.clone()) {
                out.push(name);
            }
        }
        out
    }
}
