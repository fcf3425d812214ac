//! Proof-of-success fetching against a mock HTTP endpoint

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use itsm_flow::workflows::proof::{collect_proof, parse_proof_lines, ProofFetcher};
use itsm_flow::workflows::HttpProofFetcher;

fn fetcher() -> HttpProofFetcher {
    HttpProofFetcher::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetch_sends_default_and_custom_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status/health.json"))
        .and(header("Cache-Control", "no-cache"))
        .and(header("Authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"ok\":true}", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let line = format!("-H \"Authorization: Bearer abc\" {}/status/health.json", server.uri());
    let specs = parse_proof_lines(&[line]).unwrap();
    let fetched = fetcher().fetch(&specs[0]).await.unwrap();

    assert_eq!(fetched.content, b"{\"ok\":true}".to_vec());
    assert_eq!(fetched.content_type, "application/json");
    assert_eq!(fetched.filename, "health.json");
}

#[tokio::test]
async fn test_error_status_is_a_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let specs = parse_proof_lines(&[format!("{}/down", server.uri())]).unwrap();
    let err = fetcher().fetch(&specs[0]).await.unwrap_err();
    assert_eq!(err.url, format!("{}/down", server.uri()));
    assert!(err.to_string().starts_with("Failed to fetch proof from"));
}

#[tokio::test]
async fn test_collect_keeps_first_success_and_lists_every_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("from b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("from c"))
        .expect(1)
        .mount(&server)
        .await;

    let urls: Vec<String> = ["/a", "/b.txt", "/c.txt"]
        .iter()
        .map(|p| format!("{}{p}", server.uri()))
        .collect();
    let specs = parse_proof_lines(&urls).unwrap();
    let bundle = collect_proof(&fetcher(), &specs).await;

    let attachment = bundle.attachment.as_ref().unwrap();
    assert_eq!(attachment.content, b"from b".to_vec());
    assert_eq!(attachment.filename, "b.txt");
    assert_eq!(bundle.lines.len(), 3);
    assert_eq!(bundle.lines[0], format!("[{0}|{0}]", urls[0]));
}
