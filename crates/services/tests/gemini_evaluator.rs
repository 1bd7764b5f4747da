use mockito::{Matcher, Server};
use serde_json::json;

use assess_core::model::{ApiKey, ItemId};
use services::config::{ENV_BASE_URL, ENV_MODEL};
use services::evaluator::{
    MALFORMED_RESPONSE_JUSTIFICATION, MISSING_CREDENTIAL_JUSTIFICATION,
    TRANSPORT_FAILURE_JUSTIFICATION,
};
use services::{
    EvaluationOutcome, EvaluationRequest, Evaluator, EvaluatorConfig, GeminiEvaluator, ItemKind,
};

const MODEL: &str = "gemini-test";
const ENDPOINT: &str = "/models/gemini-test:generateContent";

fn evaluator_for(server: &Server) -> GeminiEvaluator {
    let base_url = server.url();
    let config = EvaluatorConfig::from_lookup(|key| match key {
        k if k == ENV_BASE_URL => Some(base_url.clone()),
        k if k == ENV_MODEL => Some(MODEL.to_string()),
        _ => None,
    })
    .unwrap();
    GeminiEvaluator::new(config)
}

fn request(credential: Option<&str>) -> EvaluationRequest {
    EvaluationRequest {
        credential: credential.and_then(ApiKey::parse),
        kind: ItemKind::Question,
        item_id: ItemId::new(1),
        prompt: "What does $A$1 mean?".into(),
        expected: "An absolute reference.".into(),
        response: "It never shifts when copied.".into(),
    }
}

fn model_reply(text: &str) -> String {
    json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ], "role": "model" } }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn scores_successful_response() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ENDPOINT)
        .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
        .match_body(Matcher::PartialJson(json!({
            "generationConfig": { "topK": 40, "maxOutputTokens": 1024 }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(model_reply(
            r#"{"score": 9, "justification": "Correct and clear."}"#,
        ))
        .create_async()
        .await;

    let evaluation = evaluator_for(&server)
        .evaluate(&request(Some("test-key")))
        .await;

    mock.assert_async().await;
    assert_eq!(evaluation.score.value(), 9);
    assert_eq!(evaluation.justification, "Correct and clear.");
    assert_eq!(evaluation.outcome, EvaluationOutcome::Scored);
}

#[tokio::test]
async fn accepts_fenced_json() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", ENDPOINT)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(model_reply(
            "```json\n{\"score\": 6, \"justification\": \"Partly right.\"}\n```",
        ))
        .create_async()
        .await;

    let evaluation = evaluator_for(&server)
        .evaluate(&request(Some("test-key")))
        .await;
    assert_eq!(evaluation.score.value(), 6);
    assert_eq!(evaluation.justification, "Partly right.");
}

#[tokio::test]
async fn server_error_scores_zero() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", ENDPOINT)
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let evaluation = evaluator_for(&server)
        .evaluate(&request(Some("test-key")))
        .await;
    assert_eq!(evaluation.score.value(), 0);
    assert_eq!(evaluation.justification, TRANSPORT_FAILURE_JUSTIFICATION);
    assert_eq!(evaluation.outcome, EvaluationOutcome::TransportFailed);
}

#[tokio::test]
async fn unparseable_verdict_scores_five() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", ENDPOINT)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(model_reply("I would give this answer an 8 out of 10."))
        .create_async()
        .await;

    let evaluation = evaluator_for(&server)
        .evaluate(&request(Some("test-key")))
        .await;
    assert_eq!(evaluation.score.value(), 5);
    assert_eq!(evaluation.justification, MALFORMED_RESPONSE_JUSTIFICATION);
    assert_eq!(evaluation.outcome, EvaluationOutcome::Malformed);
}

#[tokio::test]
async fn missing_key_never_calls_the_api() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let evaluation = evaluator_for(&server).evaluate(&request(None)).await;

    mock.assert_async().await;
    assert_eq!(evaluation.score.value(), 0);
    assert_eq!(evaluation.justification, MISSING_CREDENTIAL_JUSTIFICATION);
    assert_eq!(evaluation.outcome, EvaluationOutcome::MissingCredential);
}
