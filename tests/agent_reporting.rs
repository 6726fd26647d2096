//! Integration tests for the agent's report path
//!
//! Uses a mock HTTP server to verify that batches arrive at
//! `/updates` as gzipped JSON and that server faults surface as
//! errors (to be retried on the next report tick).

use std::io::Read;

use flate2::read::GzDecoder;
use metrics_collector::agent::send_batch;
use metrics_collector::{MetricKind, MetricPayload};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn server_address(mock: &MockServer) -> String {
    mock.uri().trim_start_matches("http://").to_string()
}

#[tokio::test]
async fn batch_is_posted_as_gzipped_json() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/updates"))
        .and(header("content-encoding", "gzip"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock)
        .await;

    let client = reqwest::Client::new();
    let batch = vec![
        MetricPayload::gauge("MemoryUsed", 1024.0),
        MetricPayload::counter("PollCount", 3),
    ];

    send_batch(&client, &server_address(&mock), &batch)
        .await
        .unwrap();

    // The body must decode back to the same batch.
    let requests = mock.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let mut decoder = GzDecoder::new(requests[0].body.as_slice());
    let mut body = String::new();
    decoder.read_to_string(&mut body).unwrap();

    let decoded: Vec<MetricPayload> = serde_json::from_str(&body).unwrap();
    assert_eq!(decoded, batch);
    assert!(
        decoded
            .iter()
            .any(|m| m.id == "PollCount" && m.kind == MetricKind::Counter && m.delta == Some(3))
    );
}

#[tokio::test]
async fn empty_batch_sends_no_request() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/updates"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock)
        .await;

    let client = reqwest::Client::new();
    send_batch(&client, &server_address(&mock), &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn server_fault_surfaces_as_error() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/updates"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock)
        .await;

    let client = reqwest::Client::new();
    let batch = vec![MetricPayload::counter("PollCount", 1)];

    let err = send_batch(&client, &server_address(&mock), &batch)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
}
