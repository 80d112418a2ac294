use crate::models::{NormalizedMetadata, Platform, PlatformPreview, PreviewLayout, TwitterCard};

pub const SLACK_TITLE_CHARS: usize = 150;
pub const SLACK_DESCRIPTION_CHARS: usize = 300;
pub const TWITTER_TITLE_CHARS: usize = 70;
pub const TWITTER_DESCRIPTION_CHARS: usize = 200;
pub const LINKEDIN_TITLE_CHARS: usize = 119;

const ELLIPSIS: char = '…';

/// Shorten `text` to at most `limit` characters, preferring a word boundary
/// in the second half and ending with an ellipsis.
pub(crate) fn truncate_display(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(1);
    let prefix: String = text.chars().take(keep).collect();

    let cut = prefix
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(idx, _)| idx)
        .filter(|idx| prefix[..*idx].chars().count() >= keep / 2)
        .unwrap_or(prefix.len());

    let mut shortened = prefix[..cut].trim_end().to_string();
    shortened.push(ELLIPSIS);
    shortened
}

fn shorten(text: Option<&str>, limit: usize) -> Option<String> {
    text.map(|t| truncate_display(t, limit))
}

/// Describe how Slack, Twitter/X and LinkedIn will unfurl the page, in that order.
pub fn render_previews(meta: &NormalizedMetadata) -> Vec<PlatformPreview> {
    vec![slack(meta), twitter(meta), linkedin(meta)]
}

fn slack(meta: &NormalizedMetadata) -> PlatformPreview {
    let mut notes = Vec::new();
    match meta.site_name.as_deref() {
        Some(site) => notes.push(format!("Shown under the site name \"{site}\"")),
        None => notes.push("No og:site_name; Slack shows the domain instead".to_string()),
    }
    if meta.image.is_none() {
        notes.push("Without og:image Slack renders a text-only attachment".to_string());
    }

    PlatformPreview {
        platform: Platform::Slack,
        title: shorten(meta.title.as_deref(), SLACK_TITLE_CHARS),
        description: shorten(meta.description.as_deref(), SLACK_DESCRIPTION_CHARS),
        image: meta.image.clone(),
        layout: if meta.image.is_some() {
            PreviewLayout::LargeImage
        } else {
            PreviewLayout::TextOnly
        },
        notes,
    }
}

fn twitter(meta: &NormalizedMetadata) -> PlatformPreview {
    let mut notes = Vec::new();
    let layout = match (meta.twitter_card, meta.image.is_some()) {
        (Some(TwitterCard::Player), _) => PreviewLayout::Player,
        (Some(TwitterCard::App), _) => PreviewLayout::App,
        (_, false) => PreviewLayout::TextOnly,
        (Some(TwitterCard::SummaryLargeImage), true) => PreviewLayout::LargeImage,
        (Some(TwitterCard::Summary), true) => PreviewLayout::Thumbnail,
        (None, true) => {
            notes.push(
                "No twitter:card; Twitter/X falls back to Open Graph as a summary card".to_string(),
            );
            PreviewLayout::Thumbnail
        }
    };
    if meta.twitter_card == Some(TwitterCard::Summary) && meta.image.is_some() {
        notes.push("Use summary_large_image for a full-width image".to_string());
    }
    if let Some(site) = meta.twitter_site.as_deref() {
        notes.push(format!("Attributed to {site}"));
    }

    PlatformPreview {
        platform: Platform::Twitter,
        title: shorten(meta.title.as_deref(), TWITTER_TITLE_CHARS),
        description: shorten(meta.description.as_deref(), TWITTER_DESCRIPTION_CHARS),
        image: meta.image.clone(),
        layout,
        notes,
    }
}

fn linkedin(meta: &NormalizedMetadata) -> PlatformPreview {
    let mut notes = vec!["LinkedIn does not display descriptions in feed previews".to_string()];
    if meta.image.is_none() {
        notes.push("Without og:image LinkedIn shows a plain link".to_string());
    }

    PlatformPreview {
        platform: Platform::LinkedIn,
        title: shorten(meta.title.as_deref(), LINKEDIN_TITLE_CHARS),
        description: None,
        image: meta.image.clone(),
        layout: if meta.image.is_some() {
            PreviewLayout::LargeImage
        } else {
            PreviewLayout::TextOnly
        },
        notes,
    }
}
