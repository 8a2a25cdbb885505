//! Console loop driven from an in-memory line source.

use std::time::{Duration, Instant};

use case_portal::api::ApiClient;
use case_portal::loaders::RagParams;
use case_portal::portal::{self, Portal};
use case_portal::session::SessionStore;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn portal_for(server: &MockServer) -> Portal {
    Portal::new(ApiClient::new(&server.uri()).unwrap(), SessionStore::new(), RagParams::default())
}

#[tokio::test]
async fn cancel_interrupts_in_flight_command() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/case/C-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "caseId": "C-1", "data": { "palliative": 1 } }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let portal = portal_for(&server);
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            shutdown.cancel();
        });
    }

    let started = Instant::now();
    let input: &[u8] = b"C-1\nAna\ncase\n";
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        portal::run_lines(&portal, input, shutdown),
    )
    .await;

    assert!(result.is_ok(), "console kept waiting on the request after cancel");
    assert!(result.unwrap().is_ok());
    assert!(started.elapsed() < Duration::from_secs(2));
    // The login steps ran before the command was abandoned.
    assert!(portal.store().is_authenticated());
}

#[tokio::test]
async fn stops_on_quit_and_on_end_of_input() {
    let server = MockServer::start().await;
    let portal = portal_for(&server);

    let input: &[u8] = b"C-1\nAna\nquit\nlogout\n";
    portal::run_lines(&portal, input, CancellationToken::new()).await.unwrap();
    // `logout` after `quit` is never read.
    assert!(portal.store().is_authenticated());

    let other = portal_for(&server);
    let input: &[u8] = b"C-2\n";
    portal::run_lines(&other, input, CancellationToken::new()).await.unwrap();
    assert_eq!(other.store().case_id(), "C-2");
    assert!(!other.store().is_authenticated());
}
