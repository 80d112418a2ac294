use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Platform {
    Slack,
    Twitter,
    #[serde(rename = "linkedin")]
    #[strum(serialize = "linkedin")]
    LinkedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreviewLayout {
    LargeImage,
    Thumbnail,
    Player,
    App,
    TextOnly,
}

/// How one platform is expected to unfurl the page.
///
/// Title and description are already truncated to what the platform shows;
/// `description` is absent when the platform does not display one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPreview {
    pub platform: Platform,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub layout: PreviewLayout,
    pub notes: Vec<String>,
}
