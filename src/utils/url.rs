// src/utils/url.rs

//! Page URL construction.

use url::Url;

use crate::error::Result;

/// Query parameter carrying the page number.
pub const PAGE_PARAM: &str = "page";

/// Query parameter carrying the cache-busting nonce.
pub const NONCE_PARAM: &str = "_";

/// Build the URL of `page` for a target, without a nonce.
///
/// An existing page parameter is replaced in place; otherwise one is
/// appended. Any stale nonce is dropped so the result only depends on
/// `(base_url, page)`.
///
/// # Examples
/// ```
/// use scoreboard::utils::url::page_url;
///
/// let url = page_url("https://example.com/hs?table=1&page=1", 3).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/hs?table=1&page=3");
/// ```
pub fn page_url(base_url: &str, page: u32) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    let page_value = page.to_string();

    let mut replaced = false;
    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == NONCE_PARAM {
            continue;
        }
        if key == PAGE_PARAM {
            if !replaced {
                pairs.push((key.into_owned(), page_value.clone()));
                replaced = true;
            }
            continue;
        }
        pairs.push((key.into_owned(), value.into_owned()));
    }
    if !replaced {
        pairs.push((PAGE_PARAM.to_string(), page_value));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(url)
}

/// Append the cache-busting nonce to a page URL.
pub fn with_nonce(mut url: Url, nonce: i64) -> Url {
    url.query_pairs_mut()
        .append_pair(NONCE_PARAM, &nonce.to_string());
    url
}

/// Full request URL for `page`, stamped with the current time in milliseconds.
pub fn request_url(base_url: &str, page: u32) -> Result<Url> {
    let nonce = chrono::Utc::now().timestamp_millis();
    Ok(with_nonce(page_url(base_url, page)?, nonce))
}
