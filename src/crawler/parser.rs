//! Listing page extractor
//!
//! Search listing pages render each result as an `<li>` whose `id` mentions
//! `recipe`. This module turns those items into [`Recipe`] records:
//! - title from the item's primary link text
//! - slug and numeric id from the link path
//! - photo from the first `<picture>` image that is not an author avatar

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Substring that identifies author thumbnails
const AVATAR_MARKER: &str = "avatar";

/// A recipe record as extracted from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    /// Site-assigned numeric id, parsed from the slug
    pub external_id: i64,

    /// Title as rendered in the listing
    pub title: String,

    /// Final path segment of the recipe link, e.g. `123-ayam-goreng`
    pub slug: String,

    /// Recipe photo; empty when the item has none
    pub image_url: String,

    /// Search keyword the record was found under
    pub category: String,
}

/// Reasons a single listing item could not become a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("recipe item is missing its {0}")]
    MissingField(&'static str),

    #[error("recipe link '{href}' has no path segment to use as slug")]
    MalformedLink { href: String },

    #[error("recipe slug '{slug}' does not start with a numeric id")]
    InvalidId { slug: String },

    #[error("invalid selector '{0}'")]
    Selector(&'static str),
}

/// Everything pulled out of one listing page
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    /// Successfully extracted records, in document order
    pub records: Vec<Recipe>,

    /// Items that matched the recipe marker but could not be parsed
    pub errors: Vec<ExtractionError>,
}

/// Compiled selectors for listing pages
///
/// Build once and share across pages.
#[derive(Debug, Clone)]
pub struct RecipeExtractor {
    /// `li` items whose id contains `recipe`
    items: Selector,
    link: Selector,
    picture: Selector,
    image: Selector,
}

impl RecipeExtractor {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            items: parse_selector(r#"ul li[id*="recipe"]"#)?,
            link: parse_selector("a[href]")?,
            picture: parse_selector("picture")?,
            image: parse_selector("img[src]")?,
        })
    }

    /// Extracts recipe records from a listing page
    ///
    /// Items whose `id` contains the recipe marker are considered; anything else
    /// is ignored. A malformed item is logged and reported in
    /// [`PageExtraction::errors`] without affecting the rest of the page.
    ///
    /// # Arguments
    ///
    /// * `html` - The listing page body
    /// * `page_url` - The URL the page was fetched from (for relative links)
    /// * `category` - The category keyword being crawled
    pub fn extract(&self, html: &str, page_url: &Url, category: &str) -> PageExtraction {
        let document = Html::parse_document(html);
        let mut extraction = PageExtraction::default();

        for item in document.select(&self.items) {
            let item_id = item.value().attr("id").unwrap_or_default();

            match self.extract_item(item, page_url, category) {
                Ok(recipe) => extraction.records.push(recipe),
                Err(e) => {
                    tracing::warn!("Skipping listing item '{}' on {}: {}", item_id, page_url, e);
                    extraction.errors.push(e);
                }
            }
        }

        extraction
    }

    fn extract_item(
        &self,
        item: ElementRef<'_>,
        page_url: &Url,
        category: &str,
    ) -> Result<Recipe, ExtractionError> {
        let link = item
            .select(&self.link)
            .next()
            .ok_or(ExtractionError::MissingField("link"))?;

        let title = collapse_whitespace(link.text());
        if title.is_empty() {
            return Err(ExtractionError::MissingField("title"));
        }

        let href = link
            .value()
            .attr("href")
            .ok_or(ExtractionError::MissingField("href"))?;
        let slug = slug_from_href(href, page_url)?;
        let external_id = parse_external_id(&slug)?;

        Ok(Recipe {
            external_id,
            title,
            slug,
            image_url: self.extract_image(item).unwrap_or_default(),
            category: category.to_string(),
        })
    }

    /// Returns the first picture source that is not an author avatar
    fn extract_image(&self, item: ElementRef<'_>) -> Option<String> {
        item.select(&self.picture)
            .filter_map(|picture| picture.select(&self.image).next())
            .filter_map(|img| img.value().attr("src"))
            .map(str::trim)
            .find(|src| !src.is_empty() && !src.contains(AVATAR_MARKER))
            .map(str::to_string)
    }
}

/// Convenience function that extracts records with a freshly built extractor
pub fn extract_recipes(html: &str, page_url: &Url, category: &str) -> PageExtraction {
    match RecipeExtractor::new() {
        Ok(extractor) => extractor.extract(html, page_url, category),
        Err(e) => PageExtraction {
            records: Vec::new(),
            errors: vec![e],
        },
    }
}

/// Parses the leading digits of a slug as the recipe id
///
/// `123-ayam-goreng` yields `123`; a slug without a dash is parsed whole.
pub fn parse_external_id(slug: &str) -> Result<i64, ExtractionError> {
    let prefix = slug.split('-').next().unwrap_or_default();

    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExtractionError::InvalidId {
            slug: slug.to_string(),
        });
    }

    prefix.parse::<i64>().map_err(|_| ExtractionError::InvalidId {
        slug: slug.to_string(),
    })
}

/// Resolves a link and returns its last non-empty path segment
fn slug_from_href(href: &str, page_url: &Url) -> Result<String, ExtractionError> {
    let malformed = || ExtractionError::MalformedLink {
        href: href.to_string(),
    };

    let resolved = page_url.join(href.trim()).map_err(|_| malformed())?;

    resolved
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(malformed)
}

fn collapse_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_selector(css: &'static str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::Selector(css))
}
