//! Record extraction
//!
//! This module turns fetched HTML into `Record`s in two steps:
//! - A `CandidateExtractor` pulls raw field strings out of each product card
//! - The `ExtractionAdapter` normalizes those strings into fixed-shape records

use crate::storage::Record;
use crate::url::{absolutize_protocol_relative, product_id_from_url};
use crate::HarvestError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, OnceLock};

/// Title stored when a card has a url but no readable title
const MISSING_TITLE: &str = "N/A";

/// Raw strings found on one product card; anything may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields {
    pub url: Option<String>,
    pub title: Option<String>,
    pub price: Option<String>,
    pub sold: Option<String>,
    pub rating: Option<String>,
    pub thumbnail: Option<String>,
}

/// Pulls raw product card fields out of a page
///
/// Must be pure: no state carried between calls.
pub trait CandidateExtractor: Send + Sync {
    fn extract_candidates(&self, content: &str) -> Vec<RawFields>;
}

/// Extracts product cards from a listing page
///
/// # Card Rules
///
/// | Field | Source |
/// |-------|--------|
/// | card | `a` whose href contains `/item/` and `.html` |
/// | url | the card's `href` |
/// | title | first `h3` or element with a class containing `title` |
/// | price | class containing `price`, `Price` or `currency` |
/// | sold | class containing `sold`, `Sale` or `orders` |
/// | rating | class containing `rating` or `star` |
/// | thumbnail | first `img`: `src`, falling back to `data-src` |
pub struct ListingCardExtractor {
    card: Selector,
    title: Selector,
    price: Selector,
    sold: Selector,
    rating: Selector,
    image: Selector,
}

impl ListingCardExtractor {
    pub fn new() -> Result<Self, HarvestError> {
        Ok(Self {
            card: parse_selector(r#"a[href*=".html"][href*="/item/"]"#)?,
            title: parse_selector(r#"h3, [class*="title"]"#)?,
            price: parse_selector(r#"[class*="price"], [class*="Price"], [class*="currency"]"#)?,
            sold: parse_selector(r#"[class*="sold"], [class*="Sale"], [class*="orders"]"#)?,
            rating: parse_selector(r#"[class*="rating"], [class*="star"]"#)?,
            image: parse_selector("img")?,
        })
    }

    fn card_fields(&self, card: ElementRef<'_>) -> RawFields {
        let thumbnail = card.select(&self.image).next().and_then(|img| {
            non_empty(img.value().attr("src")).or_else(|| non_empty(img.value().attr("data-src")))
        });

        RawFields {
            url: non_empty(card.value().attr("href")),
            title: first_text(card, &self.title),
            price: first_text(card, &self.price),
            sold: first_text(card, &self.sold),
            rating: first_text(card, &self.rating),
            thumbnail,
        }
    }
}

impl CandidateExtractor for ListingCardExtractor {
    fn extract_candidates(&self, content: &str) -> Vec<RawFields> {
        let document = Html::parse_document(content);
        document
            .select(&self.card)
            .map(|card| self.card_fields(card))
            .collect()
    }
}

fn parse_selector(selector: &str) -> Result<Selector, HarvestError> {
    Selector::parse(selector).map_err(|e| HarvestError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Whitespace-collapsed text of the first match, if it has any
fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = element
        .select(selector)
        .next()?
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Normalizes extractor output into records
pub struct ExtractionAdapter {
    extractor: Arc<dyn CandidateExtractor>,
}

impl ExtractionAdapter {
    pub fn new(extractor: Arc<dyn CandidateExtractor>) -> Self {
        Self { extractor }
    }

    /// Extracts and normalizes every card on the page
    ///
    /// Cards with neither url nor title are dropped here.
    pub fn extract(&self, content: &str) -> Vec<Record> {
        let candidates = self.extractor.extract_candidates(content);
        let found = candidates.len();

        let records: Vec<Record> = candidates.into_iter().filter_map(normalize).collect();

        if records.len() < found {
            tracing::debug!(
                "Dropped {} of {} cards without url or title",
                found - records.len(),
                found
            );
        }

        records
    }
}

/// Builds a record from raw fields, or `None` for an unusable card
pub fn normalize(raw: RawFields) -> Option<Record> {
    let url = non_empty(raw.url.as_deref()).map(|u| absolutize_protocol_relative(&u));
    let title = non_empty(raw.title.as_deref());

    if url.is_none() && title.is_none() {
        return None;
    }

    let url = url.unwrap_or_default();
    Some(Record {
        id: product_id_from_url(&url),
        url,
        title: title.unwrap_or_else(|| MISSING_TITLE.to_string()),
        price: clean_price(raw.price.as_deref()),
        sold_count: sold_count(raw.sold.as_deref()),
        rating: non_empty(raw.rating.as_deref()),
        thumbnail_url: non_empty(raw.thumbnail.as_deref()),
    })
}

/// Keeps digits, commas and dots, then turns commas into dots
///
/// # Examples
///
/// ```
/// use listing_harvester::harvester::clean_price;
///
/// assert_eq!(clean_price(Some("US $12,99")), Some("12.99".to_string()));
/// assert_eq!(clean_price(Some("Free")), None);
/// ```
pub fn clean_price(text: Option<&str>) -> Option<String> {
    let cleaned: String = text?
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn sold_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d[\d,]*").expect("sold count pattern is valid"))
}

/// First run of digits (commas allowed inside) as a number; 0 when absent
///
/// # Examples
///
/// ```
/// use listing_harvester::harvester::sold_count;
///
/// assert_eq!(sold_count(Some("1,234 sold")), 1234);
/// assert_eq!(sold_count(None), 0);
/// ```
pub fn sold_count(text: Option<&str>) -> u64 {
    let Some(found) = text.and_then(|t| sold_pattern().find(t)) else {
        return 0;
    };

    let digits: String = found.as_str().chars().filter(|c| *c != ',').collect();
    digits.parse().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
  <div class="grid">
    <a href="//www.aliexpress.com/item/1005001.html?algo=x">
      <img src="https://ae01.example.com/a.jpg">
      <h3> Smart   Watch
        Pro </h3>
      <div class="multi--price-sale"><span>US $</span><span>12,99</span></div>
      <span class="multi--sold">1,234 sold</span>
      <span class="multi--evaluation star-rating">4.8</span>
    </a>
    <a href="https://www.aliexpress.com/item/1005002.html">
      <img data-src="https://ae01.example.com/b.jpg">
      <div class="card-title">Fitness Band</div>
      <span class="soldCount">no sales yet</span>
    </a>
    <a href="https://www.aliexpress.com/store/42">Store link</a>
    <a href="https://www.aliexpress.com/item/1005003.html"></a>
  </div>
</body></html>
"#;

    fn adapter() -> ExtractionAdapter {
        ExtractionAdapter::new(Arc::new(ListingCardExtractor::new().unwrap()))
    }

    #[test]
    fn test_clean_price() {
        assert_eq!(clean_price(Some("US $12.99")), Some("12.99".to_string()));
        assert_eq!(clean_price(Some("€ 1,50")), Some("1.50".to_string()));
        assert_eq!(clean_price(Some("US $1,234.56")), Some("1.234.56".to_string()));
        assert_eq!(clean_price(Some("")), None);
        assert_eq!(clean_price(Some("call us")), None);
        assert_eq!(clean_price(None), None);
    }

    #[test]
    fn test_sold_count() {
        assert_eq!(sold_count(Some("10,000+ sold")), 10000);
        assert_eq!(sold_count(Some("Sold 57")), 57);
        assert_eq!(sold_count(Some("3 sold, 12 reviews")), 3);
        assert_eq!(sold_count(Some("0 sold")), 0);
        assert_eq!(sold_count(Some("no sales")), 0);
        assert_eq!(sold_count(None), 0);
        assert_eq!(sold_count(Some("99999999999999999999999 sold")), u64::MAX);
    }

    #[test]
    fn test_normalize_drops_cards_without_url_and_title() {
        assert_eq!(normalize(RawFields::default()), None);
        assert_eq!(
            normalize(RawFields {
                url: Some("   ".to_string()),
                price: Some("US $3".to_string()),
                ..RawFields::default()
            }),
            None
        );
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let record = normalize(RawFields {
            url: Some("https://www.aliexpress.com/item/55.html".to_string()),
            ..RawFields::default()
        })
        .unwrap();

        assert_eq!(record.title, "N/A");
        assert_eq!(record.id, Some("55".to_string()));
        assert_eq!(record.price, None);
        assert_eq!(record.sold_count, 0);
    }

    #[test]
    fn test_normalize_keeps_title_only_card() {
        let record = normalize(RawFields {
            title: Some("Orphan".to_string()),
            ..RawFields::default()
        })
        .unwrap();

        assert_eq!(record.url, "");
        assert_eq!(record.id, None);
    }

    #[test]
    fn test_listing_card_extraction() {
        let records = adapter().extract(LISTING);

        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.url, "https://www.aliexpress.com/item/1005001.html?algo=x");
        assert_eq!(first.id, Some("1005001".to_string()));
        assert_eq!(first.title, "Smart Watch Pro");
        assert_eq!(first.price, Some("12.99".to_string()));
        assert_eq!(first.sold_count, 1234);
        assert_eq!(first.rating, Some("4.8".to_string()));
        assert_eq!(
            first.thumbnail_url,
            Some("https://ae01.example.com/a.jpg".to_string())
        );

        let second = &records[1];
        assert_eq!(second.title, "Fitness Band");
        assert_eq!(second.price, None);
        assert_eq!(second.sold_count, 0);
        assert_eq!(
            second.thumbnail_url,
            Some("https://ae01.example.com/b.jpg".to_string())
        );

        let third = &records[2];
        assert_eq!(third.title, "N/A");
        assert_eq!(third.id, Some("1005003".to_string()));
    }

    #[test]
    fn test_page_without_cards_yields_nothing() {
        let records = adapter().extract("<html><body><p>No results</p></body></html>");
        assert!(records.is_empty());
    }
}
