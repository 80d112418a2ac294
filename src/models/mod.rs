mod preview;

use serde::{Deserialize, Serialize};

pub use preview::{Platform, PlatformPreview, PreviewLayout};

// ============================================================================
// Metadata Models
// ============================================================================

/// `twitter:card` values Twitter/X recognizes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TwitterCard {
    Summary,
    SummaryLargeImage,
    Player,
    App,
}

/// How many tags in the document were candidates for each logical field.
///
/// `image_resolved` is 1 when the selected image value resolved to an
/// absolute http(s) URL and 0 otherwise, which lets the validator tell
/// "no image tag" apart from "image tag we could not use".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceCounts {
    pub title: u32,
    pub description: u32,
    pub image: u32,
    pub image_resolved: u32,
    pub image_dimensions: u32,
    pub site_name: u32,
    pub canonical: u32,
    pub twitter_card: u32,
    pub twitter_site: u32,
    pub twitter_creator: u32,
    pub open_graph: u32,
    pub twitter: u32,
}

/// The merged sharing metadata of one page.
///
/// Every string is either absent or non-empty and trimmed; dimensions are
/// absent or positive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_card: Option<TwitterCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_creator: Option<String>,
    #[serde(default)]
    pub sources: SourceCounts,
}

// ============================================================================
// Issue Models
// ============================================================================

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One validation finding with a remediation hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub field: String,
    pub severity: Severity,
    pub message: String,
    pub fix: String,
}

impl Issue {
    pub fn new(
        field: &str,
        severity: Severity,
        message: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        Issue {
            field: field.to_string(),
            severity,
            message: message.into(),
            fix: fix.into(),
        }
    }
}

// ============================================================================
// Check Result Models
// ============================================================================

/// Why a check could not produce a report.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ErrorKind {
    Timeout,
    Dns,
    Ssl,
    NotHtml,
    Blocked,
    NotFound,
    ServerError,
    Network,
    Unknown,
}

/// Outcome of one `check` call. Built fresh per call and never persisted by
/// the pipeline itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NormalizedMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<Issue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previews: Option<Vec<PlatformPreview>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
}

impl CheckResult {
    pub fn failure(error: impl Into<String>, kind: ErrorKind, fetch_time_ms: Option<u64>) -> Self {
        CheckResult {
            success: false,
            data: None,
            issues: None,
            previews: None,
            error: Some(error.into()),
            error_type: Some(kind),
            fetch_time_ms,
            original_url: None,
            final_url: None,
        }
    }

    /// Number of error-severity issues, zero for failed checks.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .flatten()
            .filter(|issue| issue.severity == Severity::Error)
            .count()
    }
}
