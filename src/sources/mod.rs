// src/sources/mod.rs
//! Platform adapters. Each submodule owns one upstream end to end: its
//! endpoints, response parsing, payload shape and confidence score.

pub mod abn_lookup;
pub mod github;
pub mod google_images;
pub mod google_news;
pub mod google_scholar;
pub mod linkedin;
pub mod medium;
pub mod reddit;
pub mod stackoverflow;
pub mod twitter;
pub mod youtube;

use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

/// RSS feeds carry RFC 2822 dates ("Tue, 19 Aug 2025 14:00:00 GMT").
pub(crate) fn rfc2822_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

/// ISO-8601 "Z" timestamp for payload fields; 0 becomes the epoch.
pub(crate) fn unix_to_iso(ts: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(ts as i64, 0)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Round to one decimal for the small "stats" blocks in payloads.
pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Feeds ship bare HTML entities that break strict XML parsing.
pub(crate) fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc2822_round_trips_to_unix() {
        assert_eq!(rfc2822_to_unix("Mon, 02 Jun 2025 15:04:05 GMT"), 1_748_876_645);
        assert_eq!(rfc2822_to_unix("not a date"), 0);
    }

    #[test]
    fn unix_to_iso_uses_z_suffix() {
        assert_eq!(unix_to_iso(1_748_876_645), "2025-06-02T15:04:05Z");
    }

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(12.96), 13.0);
    }

    #[test]
    fn entity_scrub_preserves_xml() {
        assert_eq!(
            scrub_html_entities_for_xml("a&nbsp;b &ndash; c"),
            "a b - c"
        );
    }
}
