// src/session.rs
//! Shared HTTP session handed to every adapter.
//!
//! The underlying `reqwest::Client` is built lazily on first use and rebuilt
//! after `invalidate()`, which the fetch helpers call when a connection goes
//! bad. `Client` is an `Arc`-backed handle, so hand-outs are cheap clones of
//! one pooled session rather than fresh connections.

use std::sync::RwLock;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::config::HttpConfig;

pub struct HttpSession {
    client: RwLock<Option<Client>>,
    cfg: HttpConfig,
}

impl HttpSession {
    pub fn new(cfg: HttpConfig) -> Self {
        Self {
            client: RwLock::new(None),
            cfg,
        }
    }

    /// Get the shared client, building it on first use.
    pub fn client(&self) -> Result<Client> {
        {
            let guard = match self.client.read() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(c) = guard.as_ref() {
                return Ok(c.clone());
            }
        }

        let mut guard = match self.client.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Another task may have built it while we waited for the write lock.
        if let Some(c) = guard.as_ref() {
            return Ok(c.clone());
        }
        let built = self.build_client()?;
        *guard = Some(built.clone());
        tracing::info!(target: "session", "HTTP session initialized");
        Ok(built)
    }

    fn build_client(&self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        Client::builder()
            .user_agent(&self.cfg.user_agent)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(self.cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(self.cfg.timeout_secs))
            .build()
            .context("building HTTP client")
    }

    /// Drop the current client so the next call rebuilds it.
    pub fn invalidate(&self) {
        let mut guard = match self.client.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            tracing::warn!(target: "session", "HTTP session invalidated, rebuilding on next use");
        }
    }

    /// Teardown on shutdown; closes pooled connections.
    pub fn shutdown(&self) {
        let mut guard = match self.client.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }

    /// Fetch a page or feed body with bounded retries. Connection-level
    /// failures invalidate the session before the next attempt.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let max_attempts = self.cfg.retries.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.try_fetch_text(url).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    if attempt >= max_attempts {
                        return Err(err)
                            .with_context(|| format!("GET {url} failed after {attempt} attempts"));
                    }
                    tracing::warn!(
                        target: "session",
                        url,
                        attempt,
                        error = %format!("{err:#}"),
                        "fetch failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(2_000 * attempt as u64)).await;
                }
            }
        }
    }

    async fn try_fetch_text(&self, url: &str) -> Result<String> {
        let client = self.client()?;
        let resp = match client.get(url).send().await {
            Ok(r) => r,
            Err(err) => {
                if err.is_connect() || err.is_timeout() {
                    self.invalidate();
                }
                return Err(err).context("request failed");
            }
        };
        let resp = resp.error_for_status().context("non-success status")?;
        resp.text().await.context("reading body")
    }

    /// One-shot JSON GET used by the API-backed adapters. No retry loop: API
    /// errors are usually deterministic (auth, quota, unknown user).
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let client = self.client()?;
        let resp = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        resp.json::<T>().await.context("decoding JSON body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_lazily_and_survives_invalidate() {
        let session = HttpSession::new(HttpConfig::default());
        assert!(session.client().is_ok());
        session.invalidate();
        assert!(session.client().is_ok());
        session.shutdown();
        assert!(session.client().is_ok());
    }
}
