//! LLM extraction against mock OpenAI-compatible providers

use lab_scout::extract::{
    EntityKind, ExtractionError, Extractor, LlmExtractor, LlmProvider, PageDocument, SchemaHint,
};
use reqwest::Client;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(name: &str, server: &MockServer, api_key: &str) -> LlmProvider {
    LlmProvider {
        name: name.to_string(),
        base_url: format!("{}/v1", server.uri()),
        model: "test-model".to_string(),
        api_key: api_key.to_string(),
    }
}

fn page() -> PageDocument {
    PageDocument {
        url: Url::parse("https://univ.example/labs/robotics").unwrap(),
        html: "<html><body><p>Robotics group</p></body></html>".to_string(),
        title: Some("Robotics Group".to_string()),
        text: "Robotics group".to_string(),
    }
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

async fn mount(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_next_provider_is_tried_after_failure() {
    let failing = MockServer::start().await;
    mount(&failing, ResponseTemplate::new(500).set_body_string("overloaded")).await;

    let working = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer key-b"))
        .respond_with(completion(
            "```json\n{\"scopes\": [\"Robotics\"], \"research_abstract\": \"Legged locomotion.\"}\n```",
        ))
        .expect(1)
        .mount(&working)
        .await;

    let extractor = LlmExtractor::new(
        Client::new(),
        vec![
            provider("first", &failing, "key-a"),
            provider("second", &working, "key-b"),
        ],
    );

    let record = extractor
        .extract(&page(), &SchemaHint::default())
        .await
        .expect("second provider should answer");

    assert_eq!(record.kind, EntityKind::Lab);
    assert_eq!(record.quality, 2);
    assert_eq!(record.entity.scopes, vec!["Robotics"]);
    assert_eq!(extractor.name(), "llm");
}

#[tokio::test]
async fn test_all_providers_down_is_unavailable() {
    let first = MockServer::start().await;
    mount(&first, ResponseTemplate::new(503)).await;
    let second = MockServer::start().await;
    mount(&second, ResponseTemplate::new(429)).await;

    let extractor = LlmExtractor::new(
        Client::new(),
        vec![provider("a", &first, "k"), provider("b", &second, "k")],
    );

    let result = extractor.extract(&page(), &SchemaHint::default()).await;
    match result {
        Err(ExtractionError::UpstreamUnavailable(message)) => {
            assert!(message.contains("a: HTTP 503"));
            assert!(message.contains("b: HTTP 429"));
        }
        other => panic!("expected UpstreamUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_prose_answer_is_malformed() {
    let server = MockServer::start().await;
    mount(&server, completion("Sorry, I cannot find a lab on this page.")).await;

    let extractor = LlmExtractor::new(Client::new(), vec![provider("only", &server, "k")]);
    let result = extractor.extract(&page(), &SchemaHint::default()).await;

    assert!(matches!(result, Err(ExtractionError::Malformed(_))));
}

#[tokio::test]
async fn test_empty_object_is_no_data() {
    let server = MockServer::start().await;
    mount(&server, completion("{}")).await;

    let extractor = LlmExtractor::new(Client::new(), vec![provider("only", &server, "k")]);
    let result = extractor.extract(&page(), &SchemaHint::default()).await;

    assert!(matches!(result, Err(ExtractionError::NoData)));
}

#[tokio::test]
async fn test_expected_kind_overrides_derived_kind() {
    let server = MockServer::start().await;
    mount(
        &server,
        completion("{\"lab_equipment\": {\"overview\": \"Cleanroom\", \"list\": [\"Etcher\"]}, \"scopes\": [\"Physics\"]}"),
    )
    .await;

    let extractor = LlmExtractor::new(Client::new(), vec![provider("only", &server, "k")]);
    let hint = SchemaHint {
        expected_kind: Some(EntityKind::Equipment),
        ..SchemaHint::default()
    };
    let record = extractor.extract(&page(), &hint).await.unwrap();

    assert_eq!(record.kind, EntityKind::Equipment);
    assert_eq!(record.quality, 2);
}
