use crate::UrlError;
use url::Url;

/// Query parameter carrying the listing page number
const PAGE_PARAM: &str = "page";

/// One page of the listing to harvest
///
/// Built once per page number before any work is scheduled and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    index: u32,
    url: Url,
}

impl PageRequest {
    /// Creates the request for page `index` of the listing at `template`
    pub fn new(template: &Url, index: u32) -> Self {
        Self {
            index,
            url: set_page_param(template.clone(), index),
        }
    }

    /// The 1-based page number
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Sets the `page` query parameter of a listing URL
///
/// An existing `page` parameter is overwritten in place; otherwise it is
/// appended. Other parameters keep their order, and repeated `page`
/// parameters collapse into one.
///
/// # Arguments
///
/// * `url_str` - The listing URL to paginate
/// * `page` - The page number to inject
///
/// # Returns
///
/// * `Ok(Url)` - The paginated URL
/// * `Err(UrlError)` - The input was not an http(s) URL
///
/// # Examples
///
/// ```
/// use listing_harvester::url::with_page_param;
///
/// let url = with_page_param("https://example.com/w/list.html?q=watch&page=1", 3).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/w/list.html?q=watch&page=3");
/// ```
pub fn with_page_param(url_str: &str, page: u32) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    Ok(set_page_param(url, page))
}

/// Builds the requests for pages `1..=count`
pub fn build_page_requests(start_url: &str, count: u32) -> Result<Vec<PageRequest>, UrlError> {
    let template = with_page_param(start_url, 1)?;
    Ok((1..=count)
        .map(|index| PageRequest::new(&template, index))
        .collect())
}

fn set_page_param(mut url: Url, page: u32) -> Url {
    let page_value = page.to_string();
    let mut replaced = false;
    let mut pairs: Vec<(String, String)> = Vec::new();

    for (key, value) in url.query_pairs().into_owned() {
        if key == PAGE_PARAM {
            if !replaced {
                pairs.push((key, page_value.clone()));
                replaced = true;
            }
        } else {
            pairs.push((key, value));
        }
    }

    if !replaced {
        pairs.push((PAGE_PARAM.to_string(), page_value));
    }

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url
}
