// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod cache;
pub mod config;
pub mod history;
pub mod metrics;
pub mod normalize;
pub mod registry;
pub mod scrape;
pub mod session;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::cache::ScrapeCache;
pub use crate::config::AtlasConfig;
pub use crate::history::RunHistory;
pub use crate::registry::{SourceRegistry, ALL_SOURCES};
pub use crate::scrape::types::{
    AdapterError, AggregateResult, FetchOutcome, SourceAdapter, SourceOutcome, SourceResult,
};
pub use crate::scrape::ScrapeEngine;
pub use crate::session::HttpSession;
