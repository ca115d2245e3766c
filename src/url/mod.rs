//! URL handling module for Listing-Harvester
//!
//! This module provides listing pagination and product id derivation.

mod pagination;

use regex::Regex;
use std::sync::OnceLock;

// Re-export main functions
pub use pagination::{build_page_requests, with_page_param, PageRequest};

fn product_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/item/(\d+)\.html").expect("product id pattern is valid"))
}

/// Derives the product id from a product URL
///
/// Product pages live at `/item/<digits>.html`; any other shape has no id.
///
/// # Examples
///
/// ```
/// use listing_harvester::url::product_id_from_url;
///
/// assert_eq!(
///     product_id_from_url("https://www.aliexpress.com/item/1005006.html?spm=a2g0o"),
///     Some("1005006".to_string())
/// );
/// assert_eq!(product_id_from_url("https://www.aliexpress.com/store/42"), None);
/// ```
pub fn product_id_from_url(url: &str) -> Option<String> {
    product_id_pattern()
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Upgrades a protocol-relative link (`//host/path`) to https
pub fn absolutize_protocol_relative(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}
