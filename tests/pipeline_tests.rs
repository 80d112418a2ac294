mod common;

use common::{StubFetcher, EXAMPLE_HTML};
use sharecard_server::check::Checker;
use sharecard_server::models::{ErrorKind, Severity};

fn issue_summary(result: &sharecard_server::models::CheckResult) -> Vec<(String, Severity)> {
    result
        .issues
        .as_ref()
        .unwrap()
        .iter()
        .map(|i| (i.field.clone(), i.severity))
        .collect()
}

#[tokio::test]
async fn bare_domain_end_to_end() {
    let fetcher = StubFetcher::html(EXAMPLE_HTML);
    let checker = Checker::new(fetcher.clone());

    let result = checker.check("example.com").await;

    assert!(result.success, "{result:?}");
    assert_eq!(fetcher.seen(), vec!["https://example.com/".to_string()]);
    assert_eq!(result.original_url.as_deref(), Some("https://example.com/"));
    assert_eq!(result.final_url.as_deref(), Some("https://example.com/"));
    assert_eq!(result.fetch_time_ms, Some(7));

    let data = result.data.as_ref().unwrap();
    assert_eq!(data.title.as_deref(), Some("Example Domain"));
    assert_eq!(data.image.as_deref(), Some("https://example.com/og.png"));
    assert!(data.description.is_none());

    assert_eq!(
        issue_summary(&result),
        vec![
            ("description".to_string(), Severity::Error),
            ("twitterCard".to_string(), Severity::Info),
        ]
    );
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.previews.as_ref().unwrap().len(), 3);
}

#[tokio::test]
async fn invalid_inputs_never_reach_the_fetcher() {
    let fetcher = StubFetcher::html(EXAMPLE_HTML);
    let checker = Checker::new(fetcher.clone());

    for input in ["", "   ", "not a url", "ftp://x", "http://127.0.0.1", "http://localhost/"] {
        let result = checker.check(input).await;
        assert!(!result.success, "{input:?} should fail");
        assert_eq!(result.error_type, Some(ErrorKind::Unknown));
        assert!(result.error.is_some());
        assert!(result.data.is_none());
    }
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn fetch_failures_are_reported_with_their_kind() {
    for kind in [
        ErrorKind::Timeout,
        ErrorKind::Dns,
        ErrorKind::NotHtml,
        ErrorKind::NotFound,
        ErrorKind::Blocked,
    ] {
        let checker = Checker::new(StubFetcher::failing(kind));
        let result = checker.check("https://example.com/page").await;

        assert!(!result.success);
        assert_eq!(result.error_type, Some(kind));
        assert_eq!(result.fetch_time_ms, Some(3));
        assert!(result.issues.is_none());
        assert!(result.previews.is_none());
    }
}

#[tokio::test]
async fn checks_are_deterministic() {
    let checker = Checker::new(StubFetcher::html(EXAMPLE_HTML));
    let first = checker.check("https://example.com").await;
    let second = checker.check("https://example.com").await;
    assert_eq!(first.data, second.data);
    assert_eq!(first.issues, second.issues);
    assert_eq!(first.previews, second.previews);
}

#[tokio::test]
async fn page_without_tags_reports_core_errors() {
    let checker = Checker::new(StubFetcher::html("<html><body>hi</body></html>"));
    let result = checker.check("https://example.com/").await;

    assert!(result.success);
    let summary = issue_summary(&result);
    assert_eq!(
        summary,
        vec![
            ("title".to_string(), Severity::Error),
            ("description".to_string(), Severity::Error),
            ("image".to_string(), Severity::Error),
        ]
    );
}
