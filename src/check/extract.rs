use std::str::FromStr;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{NormalizedMetadata, SourceCounts, TwitterCard};

static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").expect("meta selector"));
static HEAD_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("head title").expect("head title selector"));
static ANY_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("title selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("link[rel][href]").expect("link selector"));

/// One `<meta>` element, untyped. Keys are lowercased, content is trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTag {
    pub name: Option<String>,
    pub property: Option<String>,
    pub content: Option<String>,
}

/// Where a candidate value for a logical field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    OpenGraph(&'static str),
    Twitter(&'static str),
    TitleElement,
    MetaDescription,
    CanonicalLink,
}

use Source::*;

const TITLE: &[Source] = &[OpenGraph("og:title"), Twitter("twitter:title"), TitleElement];
const DESCRIPTION: &[Source] = &[
    OpenGraph("og:description"),
    Twitter("twitter:description"),
    MetaDescription,
];
const IMAGE: &[Source] = &[
    OpenGraph("og:image"),
    OpenGraph("og:image:url"),
    Twitter("twitter:image"),
    Twitter("twitter:image:src"),
];
const IMAGE_WIDTH: &[Source] = &[OpenGraph("og:image:width")];
const IMAGE_HEIGHT: &[Source] = &[OpenGraph("og:image:height")];
const SITE_NAME: &[Source] = &[OpenGraph("og:site_name")];
const CANONICAL: &[Source] = &[OpenGraph("og:url"), CanonicalLink];
const TWITTER_CARD: &[Source] = &[Twitter("twitter:card")];
const TWITTER_SITE: &[Source] = &[Twitter("twitter:site")];
const TWITTER_CREATOR: &[Source] = &[Twitter("twitter:creator")];

/// Every tag of the document that can feed a field, in document order.
#[derive(Debug, Default)]
struct TagIndex {
    meta: Vec<MetaTag>,
    titles: Vec<String>,
    canonical_links: Vec<String>,
}

impl TagIndex {
    fn from_document(document: &Html) -> Self {
        let meta = parse_meta_tags(document);

        let mut titles: Vec<String> = document.select(&HEAD_TITLE).map(element_text).collect();
        if titles.is_empty() {
            // Nonstandard placement, e.g. a <title> that the parser moved into <body>.
            titles = document
                .select(&ANY_TITLE)
                .filter(|el| !inside_svg(el))
                .map(element_text)
                .collect();
        }

        let canonical_links = document
            .select(&LINK)
            .filter(|el| {
                el.value().attr("rel").is_some_and(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("canonical"))
                })
            })
            .filter_map(|el| el.value().attr("href"))
            .map(|href| href.trim().to_string())
            .collect();

        TagIndex {
            meta,
            titles,
            canonical_links,
        }
    }

    /// Non-empty values for one source, in document order.
    fn values(&self, source: Source) -> Vec<&str> {
        let non_empty = |s: &&str| !s.is_empty();
        match source {
            OpenGraph(key) => self
                .meta
                .iter()
                .filter(|tag| tag.property.as_deref() == Some(key))
                .filter_map(|tag| tag.content.as_deref())
                .filter(non_empty)
                .collect(),
            Twitter(key) => self
                .meta
                .iter()
                .filter(|tag| tag.name.as_deref() == Some(key))
                .filter_map(|tag| tag.content.as_deref())
                .filter(non_empty)
                .collect(),
            MetaDescription => self
                .meta
                .iter()
                .filter(|tag| tag.name.as_deref() == Some("description"))
                .filter_map(|tag| tag.content.as_deref())
                .filter(non_empty)
                .collect(),
            TitleElement => self.titles.iter().map(String::as_str).filter(non_empty).collect(),
            CanonicalLink => self
                .canonical_links
                .iter()
                .map(String::as_str)
                .filter(non_empty)
                .collect(),
        }
    }

    /// First non-empty value along the fallback chain.
    fn first(&self, chain: &[Source]) -> Option<String> {
        chain
            .iter()
            .find_map(|source| self.values(*source).first().map(|v| v.to_string()))
    }

    fn count(&self, chain: &[Source]) -> u32 {
        let total: usize = chain.iter().map(|source| self.values(*source).len()).sum();
        u32::try_from(total).unwrap_or(u32::MAX)
    }

    fn count_prefixed(&self, open_graph: bool) -> u32 {
        let total = self
            .meta
            .iter()
            .filter(|tag| tag.content.as_deref().is_some_and(|c| !c.is_empty()))
            .filter(|tag| {
                if open_graph {
                    tag.property.as_deref().is_some_and(|p| p.starts_with("og:"))
                } else {
                    tag.name.as_deref().is_some_and(|n| n.starts_with("twitter:"))
                }
            })
            .count();
        u32::try_from(total).unwrap_or(u32::MAX)
    }
}

fn meta_tag(el: ElementRef<'_>) -> MetaTag {
    let attr = |key: &str| el.value().attr(key).map(|v| v.trim().to_string());
    MetaTag {
        name: attr("name").map(|v| v.to_ascii_lowercase()),
        property: attr("property").map(|v| v.to_ascii_lowercase()),
        content: attr("content"),
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn inside_svg(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "svg")
}

/// Resolve `raw` against `base`, keeping only absolute http(s) results.
fn resolve_http_url(raw: &str, base: &Url) -> Option<String> {
    let resolved = base.join(raw).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn positive_dimension(raw: Option<String>) -> Option<u32> {
    raw?.parse::<u32>().ok().filter(|v| *v > 0)
}

/// Every `<meta>` element of `document` as a flat record, in document order.
pub fn parse_meta_tags(document: &Html) -> Vec<MetaTag> {
    document.select(&META).map(meta_tag).collect()
}

/// Merge Open Graph, Twitter Card and plain HTML tags into one record.
///
/// `base_url` is the final fetched URL: relative image and canonical values
/// are resolved against it and it is the canonical URL of last resort.
/// Never fails; a page without metadata yields a record of absent fields.
pub fn extract_metadata(html: &str, base_url: &Url) -> NormalizedMetadata {
    let document = Html::parse_document(html);
    let index = TagIndex::from_document(&document);

    let image_raw = index.first(IMAGE);
    let image = image_raw
        .as_deref()
        .and_then(|raw| resolve_http_url(raw, base_url));
    if image_raw.is_some() && image.is_none() {
        tracing::debug!(image = ?image_raw, base = %base_url, "Image URL did not resolve");
    }

    let url = CANONICAL
        .iter()
        .flat_map(|source| index.values(*source))
        .find_map(|raw| resolve_http_url(raw, base_url))
        .unwrap_or_else(|| base_url.to_string());

    let twitter_card = index
        .first(TWITTER_CARD)
        .and_then(|raw| TwitterCard::from_str(&raw).ok());

    let sources = SourceCounts {
        title: index.count(TITLE),
        description: index.count(DESCRIPTION),
        image: index.count(IMAGE),
        image_resolved: u32::from(image.is_some()),
        image_dimensions: index.count(IMAGE_WIDTH).min(index.count(IMAGE_HEIGHT)),
        site_name: index.count(SITE_NAME),
        canonical: index.count(CANONICAL),
        twitter_card: index.count(TWITTER_CARD),
        twitter_site: index.count(TWITTER_SITE),
        twitter_creator: index.count(TWITTER_CREATOR),
        open_graph: index.count_prefixed(true),
        twitter: index.count_prefixed(false),
    };

    NormalizedMetadata {
        title: index.first(TITLE),
        description: index.first(DESCRIPTION),
        image,
        image_width: positive_dimension(index.first(IMAGE_WIDTH)),
        image_height: positive_dimension(index.first(IMAGE_HEIGHT)),
        site_name: index.first(SITE_NAME),
        url: Some(url),
        twitter_card,
        twitter_site: index.first(TWITTER_SITE),
        twitter_creator: index.first(TWITTER_CREATOR),
        sources,
    }
}
