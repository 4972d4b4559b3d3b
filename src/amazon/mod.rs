pub mod extract;
pub mod fetch;
pub mod link;

pub use extract::ProductInfo;
pub use fetch::{ProductScraper, ScrapedProduct};
pub use link::{build_affiliate_link, find_product_link};
