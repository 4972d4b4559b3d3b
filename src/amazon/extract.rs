//! Product page parsing.
//!
//! Amazon markup differs between locales, categories and live experiments, so
//! every field is looked up through an ordered selector list and the first
//! usable match wins. A missing field is an ordinary outcome.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

pub const DEFAULT_TITLE: &str = "Amazon Product";
const MAX_TITLE_CHARS: usize = 200;

const TITLE_SELECTORS: &[&str] = &[
    "#productTitle",
    ".product-title",
    "h1.a-size-large",
    "h1 span",
    "[data-automation-id=\"product-title\"]",
];

const PRICE_SELECTORS: &[&str] = &[
    ".a-price .a-offscreen",
    ".a-price-whole",
    "#price_inside_buybox",
    ".a-price.a-text-price.a-size-medium.apexPriceToPay",
    "[data-automation-id=\"product-price\"]",
    ".a-price-range",
];

const IMAGE_SELECTORS: &[&str] = &[
    "#landingImage",
    "#imgBlkFront",
    "#main-image",
    ".a-dynamic-image",
    "[data-automation-id=\"product-image\"]",
];

static TITLE: Lazy<Vec<Selector>> = Lazy::new(|| compile(TITLE_SELECTORS));
static PRICE: Lazy<Vec<Selector>> = Lazy::new(|| compile(PRICE_SELECTORS));
static IMAGE: Lazy<Vec<Selector>> = Lazy::new(|| compile(IMAGE_SELECTORS));

// `._AC_SX300_.` style resize segments in media URLs.
static RESIZE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\._[A-Z0-9_,]+_\.").expect("resize suffix pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub title: String,
    pub price: Option<String>,
    pub image_url: Option<String>,
}

fn compile(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .collect()
}

pub fn extract_from_html(html: &str) -> ProductInfo {
    let document = Html::parse_document(html);
    ProductInfo {
        title: extract_title(&document),
        price: extract_price(&document),
        image_url: extract_image_url(&document),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_title(document: &Html) -> String {
    TITLE
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .map(element_text)
        .find(|title| !title.is_empty())
        .map(|title| title.chars().take(MAX_TITLE_CHARS).collect())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

fn extract_price(document: &Html) -> Option<String> {
    PRICE
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .map(element_text)
        .find(|price| price.chars().any(|c| c.is_ascii_digit()))
}

fn extract_image_url(document: &Html) -> Option<String> {
    IMAGE
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .filter_map(|element| {
            let attrs = element.value();
            attrs
                .attr("src")
                .filter(|src| !src.trim().is_empty())
                .or_else(|| attrs.attr("data-src"))
        })
        .find_map(normalize_image_url)
}

/// Full-resolution absolute image URL, or `None` when the value can't be
/// used outside the page.
pub fn normalize_image_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let stripped = RESIZE_SUFFIX_RE.replace_all(raw, ".");
    let absolute = if let Some(rest) = stripped.strip_prefix("//") {
        format!("https://{rest}")
    } else if stripped.starts_with('/') {
        return None;
    } else {
        stripped.into_owned()
    };
    absolute.starts_with("http").then_some(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_relative_image_is_upgraded_and_unresized() {
        assert_eq!(
            normalize_image_url("//m.media-amazon.com/x._AC_SX300_.jpg").as_deref(),
            Some("https://m.media-amazon.com/x.jpg")
        );
    }

    #[test]
    fn document_relative_and_data_urls_are_rejected() {
        assert!(normalize_image_url("/images/x.jpg").is_none());
        assert!(normalize_image_url("data:image/gif;base64,R0lGOD").is_none());
        assert!(normalize_image_url("   ").is_none());
    }

    #[test]
    fn empty_page_yields_default_title_only() {
        let info = extract_from_html("<html><body><p>nothing here</p></body></html>");
        assert_eq!(info.title, DEFAULT_TITLE);
        assert!(info.price.is_none());
        assert!(info.image_url.is_none());
    }

    #[test]
    fn full_product_page() {
        let html = r#"
            <html><body>
              <span id="productTitle">
                  Echo Dot (4th Gen)   Smart speaker
              </span>
              <div class="a-price"><span class="a-offscreen">₹4,499.00</span></div>
              <img id="landingImage"
                   src="https://m.media-amazon.com/images/I/61abc._SX300_SY300_QL70_ML2_.jpg" />
            </body></html>
        "#;
        let info = extract_from_html(html);
        assert_eq!(info.title, "Echo Dot (4th Gen) Smart speaker");
        assert_eq!(info.price.as_deref(), Some("₹4,499.00"));
        assert_eq!(
            info.image_url.as_deref(),
            Some("https://m.media-amazon.com/images/I/61abc.jpg")
        );
    }

    #[test]
    fn later_selectors_are_used_when_earlier_ones_are_empty() {
        let html = r#"
            <span id="productTitle">   </span>
            <h1 class="a-size-large">Fallback Title</h1>
            <span class="a-price-whole">Price unavailable</span>
            <span id="price_inside_buybox">$12.99</span>
            <img id="landingImage" src="/relative.jpg" />
            <img id="imgBlkFront" data-src="//images-na.ssl-images-amazon.com/b._AC_UL600_.png" />
        "#;
        let info = extract_from_html(html);
        assert_eq!(info.title, "Fallback Title");
        assert_eq!(info.price.as_deref(), Some("$12.99"));
        assert_eq!(
            info.image_url.as_deref(),
            Some("https://images-na.ssl-images-amazon.com/b.png")
        );
    }

    #[test]
    fn empty_src_falls_through_to_lazy_load_attribute() {
        let info = extract_from_html(
            r#"<img id="landingImage" src="" data-src="//m.media-amazon.com/images/I/z._AC_SX300_.jpg">"#,
        );
        assert_eq!(
            info.image_url.as_deref(),
            Some("https://m.media-amazon.com/images/I/z.jpg")
        );
    }

    #[test]
    fn title_is_capped_at_two_hundred_chars() {
        let long = "é".repeat(450);
        let html = format!(r#"<span id="productTitle">{long}</span>"#);
        let info = extract_from_html(&html);
        assert_eq!(info.title.chars().count(), 200);
    }
}
