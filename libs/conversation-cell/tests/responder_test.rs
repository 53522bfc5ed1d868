use conversation_cell::{OpenAiResponder, Responder};
use shared_utils::test_utils::test_config;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn respond_returns_trimmed_completion_text() {
    let server = MockServer::start().await;
    let mut config = test_config();
    config.responder_base_url = server.uri();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-responder-key"))
        .and(body_partial_json(serde_json::json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  Hello there!  " } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let responder = OpenAiResponder::new(&config);
    let reply = responder
        .respond("Patient: hello", "5551234567")
        .await
        .unwrap();

    assert_eq!(reply, "Hello there!");
}

#[tokio::test]
async fn api_error_surfaces_as_err() {
    let server = MockServer::start().await;
    let mut config = test_config();
    config.responder_base_url = server.uri();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let responder = OpenAiResponder::new(&config);
    let result = responder.respond("Patient: hello", "5551234567").await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("429"));
}

#[tokio::test]
async fn empty_completion_is_rejected() {
    let server = MockServer::start().await;
    let mut config = test_config();
    config.responder_base_url = server.uri();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "   " } }
            ]
        })))
        .mount(&server)
        .await;

    let responder = OpenAiResponder::new(&config);
    let result = responder.respond("Patient: hello", "5551234567").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn missing_api_key_fails_without_network() {
    let mut config = test_config();
    config.responder_api_key = String::new();

    let responder = OpenAiResponder::new(&config);
    let result = responder.respond("Patient: hello", "5551234567").await;

    assert!(result.is_err());
}
