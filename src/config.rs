// src/config.rs
//! Service configuration: cache TTLs, HTTP client knobs and the run deadline.
//!
//! - Loads TOML from `config/atlas.toml` (`ATLAS_CONFIG` overrides the path).
//! - Every knob has a built-in seed, so the service boots with no file at all.
//! - A handful of env vars override single knobs after file load
//!   (`CACHE_ENABLED`, `CACHE_TTL`, `SCRAPE_DEADLINE_SECS`).

use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path, time::Duration};

pub const DEFAULT_CONFIG_PATH: &str = "config/atlas.toml";
pub const CONFIG_PATH_ENV: &str = "ATLAS_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub scrape: ScrapeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Fallback TTL in seconds for sources without a per-source entry.
    pub default_ttl_secs: u64,
    /// Per-source TTL overrides in seconds, keyed by adapter name.
    pub ttl_secs: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_secs: 86_400,
            ttl_secs: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// TTL for one source: file override → built-in seed → default.
    pub fn ttl_for(&self, source: &str) -> Duration {
        if let Some(&secs) = self.ttl_secs.get(source) {
            return Duration::from_secs(secs);
        }
        if let Some(secs) = seed_ttl_secs(source) {
            return Duration::from_secs(secs);
        }
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Built-in per-source TTL seed in seconds, scaled to how volatile each
/// platform's data is. Entries in `ttl_secs` override these.
fn seed_ttl_secs(source: &str) -> Option<u64> {
    Some(match source {
        "github" | "reddit" | "stackoverflow" | "twitter" => 43_200, // 12 h
        "youtube" | "medium" | "google-scholar" | "google-images" | "linkedin" => 86_400, // 24 h
        "google-news" => 21_600,  // 6 h
        "abn-lookup" => 604_800,  // 7 d, registry data barely moves
        _ => return None,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Attempts for page/feed fetches. API calls do a single attempt.
    pub retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Identity-Atlas-Scraper/1.0".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Whole-run deadline in seconds. 0 disables the deadline.
    pub deadline_secs: u64,
    /// Capacity of the in-memory run history ring.
    pub history_capacity: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            history_capacity: 200,
        }
    }
}

impl ScrapeConfig {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

impl AtlasConfig {
    /// Resolution order: `ATLAS_CONFIG` path → `config/atlas.toml` → seed.
    pub fn load() -> Self {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::load_from_file(&path);
        cfg.apply_env_overrides();
        cfg
    }

    /// Load from a TOML file. A missing file is normal (seed applies); a file
    /// that fails to parse logs a warning and falls back to the seed too.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(s) => match toml::from_str(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!(
                        target: "config",
                        path = %path.as_ref().display(),
                        error = %err,
                        "config parse failed, using built-in defaults"
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    fn apply_env_overrides(&mut self) {
        // CACHE_ENABLED: anything but "false" keeps the cache on.
        if let Ok(v) = std::env::var("CACHE_ENABLED") {
            self.cache.enabled = !v.eq_ignore_ascii_case("false");
        }
        if let Ok(v) = std::env::var("CACHE_TTL") {
            if let Ok(secs) = v.parse() {
                self.cache.default_ttl_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("SCRAPE_DEADLINE_SECS") {
            if let Ok(secs) = v.parse() {
                self.scrape.deadline_secs = secs;
            }
        }
    }
}
