//! The metadata check pipeline: normalize → fetch → extract → validate.
//!
//! Every stage after a failure is skipped, and every failure is turned into
//! a [`CheckResult`] rather than an error, so callers always get a report.

pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod preview;
pub mod validate;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{CheckResult, ErrorKind};

pub use extract::{extract_metadata, parse_meta_tags, MetaTag};
pub use fetch::{FetchConfig, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use normalize::{is_private_ip, normalize_url, InvalidUrl};
pub use preview::render_previews;
pub use validate::validate;

/// Runs checks. Holds no per-request state, so one instance serves every
/// request concurrently.
#[derive(Clone)]
pub struct Checker {
    fetcher: Arc<dyn PageFetcher>,
}

impl Checker {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Checker { fetcher }
    }

    /// Checker backed by the real HTTP fetcher.
    pub fn with_config(config: FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Checker::new(Arc::new(HttpFetcher::new(config)?)))
    }

    pub async fn check(&self, raw_url: &str) -> CheckResult {
        let url = match normalize_url(raw_url) {
            Ok(url) => url,
            Err(e) => {
                debug!(input = %raw_url, error = %e, "Rejected check input");
                return CheckResult::failure(e.to_string(), ErrorKind::Unknown, None);
            }
        };

        let page = match self.fetcher.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %url, kind = %e.kind, elapsed_ms = e.elapsed_ms, "Fetch failed");
                return CheckResult::failure(e.message, e.kind, Some(e.elapsed_ms));
            }
        };

        let data = extract_metadata(&page.html, &page.final_url);
        let issues = validate(&data);
        let previews = render_previews(&data);

        info!(
            url = %url,
            final_url = %page.final_url,
            elapsed_ms = page.elapsed_ms,
            truncated = page.truncated,
            issues = issues.len(),
            "Check completed"
        );

        CheckResult {
            success: true,
            data: Some(data),
            issues: Some(issues),
            previews: Some(previews),
            error: None,
            error_type: None,
            fetch_time_ms: Some(page.elapsed_ms),
            original_url: Some(url.to_string()),
            final_url: Some(page.final_url.to_string()),
        }
    }
}
