use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use tracing::warn;

static PRODUCT_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"https?://(?:www\.)?amazon\.[a-z.]{2,6}/(?:[^/\s]+/)?(?:dp|gp/product)/([A-Z0-9]{10})",
    )
    .expect("product link pattern")
});

static ASIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:dp|gp/product)/([A-Z0-9]{10})").expect("asin pattern"));

/// A product link found in chat text, reduced to its canonical `/dp/<ASIN>` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReference {
    pub original_url: String,
    pub asin: String,
    pub canonical_url: String,
}

/// First Amazon product link in `text`, if any. Later links are ignored.
pub fn find_product_link(text: &str) -> Option<&str> {
    PRODUCT_LINK_RE.find(text).map(|m| m.as_str())
}

pub fn canonicalize(url: &str) -> Option<ProductReference> {
    let asin = ASIN_RE.captures(url)?.get(1)?.as_str().to_string();
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(ProductReference {
        original_url: url.to_string(),
        canonical_url: format!("https://{host}/dp/{asin}"),
        asin,
    })
}

/// Sets `tag` on `url`, replacing any existing `tag` values and keeping every
/// other part of the URL intact.
pub fn build_affiliate_link(url: &str, tag: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            let kept: Vec<(String, String)> = parsed
                .query_pairs()
                .filter(|(key, _)| key != "tag")
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            parsed
                .query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair("tag", tag);
            parsed.to_string()
        }
        Err(err) => {
            warn!(target = "affilink.scraper", error = %err, "affiliate link fell back to concatenation");
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}tag={}", urlencoding::encode(tag))
        }
    }
}
