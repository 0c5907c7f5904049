//! HTTP header profiles presented by worker slots.

use std::path::Path;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::utils::fs::read_csv_records;

/// One browser-like set of request headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderProfile {
    pub user_agent: String,
    pub from: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub connection: String,
    pub referer: String,
}

impl HeaderProfile {
    /// Copy of this profile with every value reduced to printable ASCII.
    pub fn sanitized(self) -> Self {
        Self {
            user_agent: sanitize_value(&self.user_agent),
            from: sanitize_value(&self.from),
            accept: sanitize_value(&self.accept),
            accept_language: sanitize_value(&self.accept_language),
            accept_encoding: sanitize_value(&self.accept_encoding),
            connection: sanitize_value(&self.connection),
            referer: sanitize_value(&self.referer),
        }
    }

    /// Build request headers. Empty or unencodable values are left out.
    pub fn to_header_map(&self) -> HeaderMap {
        let pairs: [(HeaderName, &str); 7] = [
            (header::USER_AGENT, &self.user_agent),
            (header::FROM, &self.from),
            (header::ACCEPT, &self.accept),
            (header::ACCEPT_LANGUAGE, &self.accept_language),
            (header::ACCEPT_ENCODING, &self.accept_encoding),
            (header::CONNECTION, &self.connection),
            (header::REFERER, &self.referer),
        ];

        let mut map = HeaderMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            if value.is_empty() {
                continue;
            }
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    map.insert(name, v);
                }
                Err(_) => log::debug!("Dropping unencodable {} header", name),
            }
        }
        map
    }
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
            from: "research@example.com".into(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into(),
            accept_language: "en-US,en;q=0.5".into(),
            accept_encoding: "gzip, deflate".into(),
            connection: "keep-alive".into(),
            referer: "https://www.runescape.com/".into(),
        }
    }
}

/// Replace anything outside printable ASCII with `-`.
pub fn sanitize_value(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '-' })
        .collect()
}

/// Load header profiles from CSV.
///
/// Never fails: a missing, unreadable or empty file yields the single
/// built-in default profile.
pub fn load_header_profiles(path: impl AsRef<Path>) -> Vec<HeaderProfile> {
    let path = path.as_ref();
    let profiles: Vec<HeaderProfile> = match read_csv_records::<HeaderProfile>(path) {
        Ok(records) => records.into_iter().map(HeaderProfile::sanitized).collect(),
        Err(e) => {
            log::warn!("Failed to load header profiles from {:?}: {}", path, e);
            Vec::new()
        }
    };

    if profiles.is_empty() {
        log::warn!("No header profiles loaded, using built-in default");
        return vec![HeaderProfile::default()];
    }
    log::info!("Loaded {} header profiles", profiles.len());
    profiles
}
