use crate::models::{Issue, NormalizedMetadata, Severity};

use super::preview::truncate_display;

pub const TITLE_MAX_CHARS: usize = 70;
/// Characters kept before the ellipsis in the suggested shorter title.
pub const TITLE_SUGGESTION_CHARS: usize = 67;
pub const DESCRIPTION_MAX_CHARS: usize = 200;
pub const RECOMMENDED_RATIO: f64 = 1.91;
/// Relative deviation from 1.91:1 still treated as a proper card image.
pub const RATIO_TOLERANCE: f64 = 0.10;
pub const MIN_IMAGE_WIDTH: u32 = 600;
pub const MIN_IMAGE_HEIGHT: u32 = 315;

type Rule = fn(&NormalizedMetadata) -> Option<Issue>;

/// Evaluation order is the order issues are reported in.
const RULES: &[Rule] = &[
    missing_title,
    missing_description,
    missing_image,
    title_too_long,
    description_too_long,
    image_aspect_ratio,
    image_dimensions_unknown,
    missing_twitter_card,
    missing_canonical,
    unrecognized_twitter_card,
    image_too_small,
];

/// Run every rule against `meta`. Deterministic: the same record always
/// produces the same issues in the same order.
pub fn validate(meta: &NormalizedMetadata) -> Vec<Issue> {
    RULES.iter().filter_map(|rule| rule(meta)).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn missing_title(meta: &NormalizedMetadata) -> Option<Issue> {
    meta.title.is_none().then(|| {
        Issue::new(
            "title",
            Severity::Error,
            "No title found; platforms will show the bare URL",
            "Add an og:title tag",
        )
    })
}

fn missing_description(meta: &NormalizedMetadata) -> Option<Issue> {
    meta.description.is_none().then(|| {
        Issue::new(
            "description",
            Severity::Error,
            "No description found",
            "Add an og:description tag",
        )
    })
}

fn missing_image(meta: &NormalizedMetadata) -> Option<Issue> {
    if meta.image.is_some() {
        return None;
    }
    let message = if meta.sources.image > 0 && meta.sources.image_resolved == 0 {
        "An image tag is present but its URL could not be resolved to an absolute http(s) URL"
    } else {
        "No preview image found; links will unfurl without a picture"
    };
    Some(Issue::new(
        "image",
        Severity::Error,
        message,
        "Add an og:image tag with an absolute URL",
    ))
}

fn title_too_long(meta: &NormalizedMetadata) -> Option<Issue> {
    let title = meta.title.as_deref()?;
    let len = char_len(title);
    (len > TITLE_MAX_CHARS).then(|| {
        Issue::new(
            "title",
            Severity::Warning,
            format!("Title is {len} characters; most platforms cut it off after {TITLE_MAX_CHARS}"),
            format!(
                "Shorten the title, e.g. \"{}\"",
                truncate_display(title, TITLE_SUGGESTION_CHARS + 1)
            ),
        )
    })
}

fn description_too_long(meta: &NormalizedMetadata) -> Option<Issue> {
    let description = meta.description.as_deref()?;
    let len = char_len(description);
    (len > DESCRIPTION_MAX_CHARS).then(|| {
        Issue::new(
            "description",
            Severity::Warning,
            format!(
                "Description is {len} characters; platforms truncate after about {DESCRIPTION_MAX_CHARS}"
            ),
            format!("Keep the description under {DESCRIPTION_MAX_CHARS} characters"),
        )
    })
}

fn image_aspect_ratio(meta: &NormalizedMetadata) -> Option<Issue> {
    meta.image.as_ref()?;
    let (width, height) = (meta.image_width?, meta.image_height?);
    let ratio = f64::from(width) / f64::from(height);
    let deviation = (ratio - RECOMMENDED_RATIO).abs() / RECOMMENDED_RATIO;
    (deviation > RATIO_TOLERANCE).then(|| {
        Issue::new(
            "image",
            Severity::Warning,
            format!(
                "Image is {width}×{height} ({ratio:.2}:1); large cards expect about {RECOMMENDED_RATIO}:1 and will crop it"
            ),
            "Use a 1200×630 image",
        )
    })
}

fn image_dimensions_unknown(meta: &NormalizedMetadata) -> Option<Issue> {
    meta.image.as_ref()?;
    (meta.image_width.is_none() || meta.image_height.is_none()).then(|| {
        Issue::new(
            "image",
            Severity::Info,
            "Could not verify image dimensions; add og:image:width/height",
            "Add og:image:width and og:image:height tags",
        )
    })
}

fn missing_twitter_card(meta: &NormalizedMetadata) -> Option<Issue> {
    (meta.twitter_card.is_none() && meta.sources.open_graph > 0).then(|| {
        Issue::new(
            "twitterCard",
            Severity::Info,
            "No usable twitter:card; Twitter/X falls back to Open Graph as a small summary card",
            "Add twitter:card for better Twitter/X rendering",
        )
    })
}

fn missing_canonical(meta: &NormalizedMetadata) -> Option<Issue> {
    meta.url.is_none().then(|| {
        Issue::new(
            "url",
            Severity::Info,
            "No canonical URL; shares of different URL variants will not be merged",
            "Add an og:url tag or <link rel=\"canonical\">",
        )
    })
}

fn unrecognized_twitter_card(meta: &NormalizedMetadata) -> Option<Issue> {
    (meta.twitter_card.is_none() && meta.sources.twitter_card > 0).then(|| {
        Issue::new(
            "twitterCard",
            Severity::Warning,
            "twitter:card has a value Twitter/X does not recognize",
            "Use one of summary, summary_large_image, player, app",
        )
    })
}

fn image_too_small(meta: &NormalizedMetadata) -> Option<Issue> {
    meta.image.as_ref()?;
    let (width, height) = (meta.image_width?, meta.image_height?);
    (width < MIN_IMAGE_WIDTH || height < MIN_IMAGE_HEIGHT).then(|| {
        Issue::new(
            "image",
            Severity::Warning,
            format!(
                "Image is {width}×{height}; below {MIN_IMAGE_WIDTH}×{MIN_IMAGE_HEIGHT} platforms show a small thumbnail"
            ),
            "Use a 1200×630 image",
        )
    })
}
