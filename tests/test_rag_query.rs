//! RAG query loader against a mock `/queryRAG` endpoint.

use std::time::Duration;

use case_portal::api::ApiClient;
use case_portal::loaders::{RagParams, RagQueryLoader};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn loader_for(server: &MockServer) -> RagQueryLoader {
    RagQueryLoader::new(ApiClient::new(&server.uri()).unwrap(), RagParams::default())
}

#[tokio::test]
async fn empty_question_never_hits_the_network() {
    let server = MockServer::start().await;
    let loader = loader_for(&server);

    let state = loader.query("").await;

    assert_eq!(state.error.as_deref(), Some("Please enter a question"));
    assert!(!state.loading);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn answer_and_chunks_from_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .and(body_json(json!({
            "question": "When is palliative care indicated?",
            "model": "gpt-4o-mini",
            "temperature": 0.3,
            "topK": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Early, alongside tumour-specific therapy.",
            "relevantChunks": [
                { "rank": 1, "similarityPercentage": 88.4, "text": "Patients with incurable cancer..." },
                { "rank": 2, "similarityPercentage": 71.0, "text": "Integration of palliative care..." }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let loader = loader_for(&server);

    let state = loader.query("When is palliative care indicated?").await;

    assert!(state.error.is_none(), "unexpected error: {:?}", state.error);
    assert!(!state.loading);
    assert_eq!(state.answer, "Early, alongside tumour-specific therapy.");
    assert_eq!(state.relevant_chunks.len(), 2);
    assert_eq!(state.relevant_chunks[0].rank, 1);
    assert_eq!(state.relevant_chunks[1].text, "Integration of palliative care...");
}

#[tokio::test]
async fn missing_chunks_default_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "No sources." })))
        .mount(&server)
        .await;

    let state = loader_for(&server).query("anything").await;

    assert_eq!(state.answer, "No sources.");
    assert!(state.relevant_chunks.is_empty());
}

#[tokio::test]
async fn server_detail_becomes_the_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "detail": "invalid model" })))
        .mount(&server)
        .await;

    let state = loader_for(&server).query("Which model?").await;

    assert_eq!(state.error.as_deref(), Some("invalid model"));
    assert_eq!(state.answer, "");
    assert!(state.relevant_chunks.is_empty());
    assert!(!state.loading);
}

#[tokio::test]
async fn error_without_detail_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let state = loader_for(&server).query("q").await;

    assert_eq!(state.error.as_deref(), Some("Error: 503 Service Unavailable"));
}

#[tokio::test]
async fn updated_params_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .and(body_json(json!({
            "question": "q",
            "model": "gpt-4o-mini",
            "temperature": 0.5,
            "topK": 5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "ok", "relevantChunks": [] })))
        .expect(1)
        .mount(&server)
        .await;
    let loader = loader_for(&server);
    loader.set_top_k(5).unwrap();
    loader.set_temperature(0.5).unwrap();

    let state = loader.query("q").await;
    assert_eq!(state.answer, "ok");
}

#[tokio::test]
async fn new_query_clears_previous_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "first",
            "relevantChunks": [{ "rank": 1, "similarityPercentage": 50.0, "text": "t" }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "answer": "second" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    let loader = loader_for(&server);

    loader.query("one").await;
    let task = {
        let loader = loader.clone();
        tokio::spawn(async move { loader.query("two").await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let during = loader.state();
    assert!(during.loading);
    assert_eq!(during.answer, "");
    assert!(during.relevant_chunks.is_empty());
    assert!(during.error.is_none());

    let settled = task.await.unwrap();
    assert_eq!(settled.answer, "second");
    assert!(settled.relevant_chunks.is_empty());
}

#[tokio::test]
async fn last_dispatched_query_wins_when_overlapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .and(body_partial_json(json!({ "question": "slow" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "answer": "slow" }))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .and(body_partial_json(json!({ "question": "fast" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "fast" })))
        .mount(&server)
        .await;
    let loader = loader_for(&server);

    let (slow_state, fast_state) = tokio::join!(loader.query("slow"), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        loader.query("fast").await
    });

    assert_eq!(fast_state.answer, "fast");
    // The slow reply lands last but was superseded.
    assert_eq!(slow_state.answer, "fast");
    let current = loader.state();
    assert_eq!(current.answer, "fast");
    assert!(!current.loading);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn blank_question_clears_previous_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/queryRAG"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "A",
            "relevantChunks": [{ "rank": 1, "similarityPercentage": 80.0, "text": "t" }]
        })))
        .mount(&server)
        .await;
    let loader = loader_for(&server);

    assert_eq!(loader.query("first").await.answer, "A");
    let state = loader.query("  ").await;

    assert_eq!(state.error.as_deref(), Some("Please enter a question"));
    assert_eq!(state.answer, "");
    assert!(state.relevant_chunks.is_empty());
    assert!(!state.loading);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
