//! URL handling module for Forager
//!
//! Provides URL normalization (the dedup key for crawl history), domain
//! extraction, and same-site checks.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_same_site};
pub use normalize::normalize_url;
