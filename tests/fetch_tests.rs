use std::time::{Duration, Instant};

use sharecard_server::check::{FetchConfig, HttpFetcher, PageFetcher};
use sharecard_server::models::ErrorKind;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html><head><meta property="og:title" content="Hi"></head></html>"#;

/// Fetcher allowed to reach the loopback mock server.
fn local_fetcher() -> HttpFetcher {
    HttpFetcher::new(FetchConfig {
        block_private_addresses: false,
        ..FetchConfig::default()
    })
    .unwrap()
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{route}", server.uri())).unwrap()
}

async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetches_html_with_declared_charset() {
    let server = MockServer::start().await;
    let latin1: Vec<u8> = b"<html><head><title>Caf\xe9</title></head></html>".to_vec();
    serve(
        &server,
        "/page",
        ResponseTemplate::new(200).set_body_raw(latin1, "text/html; charset=ISO-8859-1"),
    )
    .await;

    let page = local_fetcher().fetch(&url(&server, "/page")).await.unwrap();
    assert_eq!(page.status, 200);
    assert!(page.html.contains("Café"));
    assert_eq!(page.charset, "windows-1252");
    assert!(!page.truncated);
}

#[tokio::test]
async fn non_html_content_type_is_not_html() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/doc.pdf",
        ResponseTemplate::new(200).set_body_raw(b"%PDF-1.7".to_vec(), "application/pdf"),
    )
    .await;

    let err = local_fetcher()
        .fetch(&url(&server, "/doc.pdf"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotHtml);
    assert!(err.message.contains("application/pdf"));
}

#[tokio::test]
async fn missing_content_type_is_sniffed() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/blob",
        ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7\n%binary".to_vec()),
    )
    .await;

    let err = local_fetcher()
        .fetch(&url(&server, "/blob"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotHtml);
}

#[tokio::test]
async fn status_codes_map_to_kinds() {
    let server = MockServer::start().await;
    serve(&server, "/missing", ResponseTemplate::new(404)).await;
    serve(&server, "/broken", ResponseTemplate::new(503)).await;
    serve(&server, "/forbidden", ResponseTemplate::new(403)).await;

    let fetcher = local_fetcher();
    for (route, kind) in [
        ("/missing", ErrorKind::NotFound),
        ("/broken", ErrorKind::ServerError),
        ("/forbidden", ErrorKind::Blocked),
    ] {
        let err = fetcher.fetch(&url(&server, route)).await.unwrap_err();
        assert_eq!(err.kind, kind, "{route}");
    }
}

#[tokio::test]
async fn slow_site_times_out_promptly() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/slow",
        ResponseTemplate::new(200)
            .set_body_raw(PAGE, "text/html")
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let fetcher = HttpFetcher::new(FetchConfig {
        timeout: Duration::from_millis(500),
        block_private_addresses: false,
        ..FetchConfig::default()
    })
    .unwrap();

    let started = Instant::now();
    let err = fetcher.fetch(&url(&server, "/slow")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn follows_redirects_and_reports_final_url() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", "/new"),
    )
    .await;
    serve(
        &server,
        "/new",
        ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"),
    )
    .await;

    let page = local_fetcher().fetch(&url(&server, "/old")).await.unwrap();
    assert_eq!(page.final_url.path(), "/new");
}

#[tokio::test]
async fn redirect_loop_is_a_network_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/loop",
        ResponseTemplate::new(302).insert_header("location", "/loop"),
    )
    .await;

    let err = local_fetcher()
        .fetch(&url(&server, "/loop"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
}

#[tokio::test]
async fn redirect_to_metadata_address_is_blocked() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/hop",
        ResponseTemplate::new(302)
            .insert_header("location", "http://169.254.169.254/latest/meta-data/"),
    )
    .await;

    // The mock server is an IP literal, so only the redirect goes through
    // the address guard.
    let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
    let err = fetcher.fetch(&url(&server, "/hop")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Blocked);
}

#[tokio::test]
async fn large_bodies_are_truncated() {
    let server = MockServer::start().await;
    let body = format!("{PAGE}{}", "x".repeat(10_000));
    serve(
        &server,
        "/big",
        ResponseTemplate::new(200).set_body_raw(body, "text/html"),
    )
    .await;

    let fetcher = HttpFetcher::new(FetchConfig {
        max_body_bytes: 1024,
        block_private_addresses: false,
        ..FetchConfig::default()
    })
    .unwrap();

    let page = fetcher.fetch(&url(&server, "/big")).await.unwrap();
    assert!(page.truncated);
    assert_eq!(page.html.len(), 1024);
    assert!(page.html.starts_with(PAGE));
}

#[tokio::test]
async fn unresolvable_host_is_dns_error() {
    let fetcher = HttpFetcher::new(FetchConfig {
        timeout: Duration::from_secs(5),
        ..FetchConfig::default()
    })
    .unwrap();
    let err = fetcher
        .fetch(&Url::parse("https://no-such-host.invalid/").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Dns);
}

#[tokio::test]
async fn tls_to_plain_http_server_is_ssl_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/page",
        ResponseTemplate::new(200).set_body_raw(PAGE, "text/html"),
    )
    .await;

    let mut target = url(&server, "/page");
    target.set_scheme("https").unwrap();

    let err = local_fetcher().fetch(&target).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Ssl);
}
