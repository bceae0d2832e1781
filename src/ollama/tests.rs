use super::*;

#[test]
fn transport_uses_configured_url() {
    let config = OllamaConfig {
        host: "test-host".to_string(),
        port: 1234,
        ..OllamaConfig::default()
    };
    let transport = OllamaTransport::new(&config).expect("should create transport");

    assert_eq!(transport.base_url().host_str(), Some("test-host"));
    assert_eq!(transport.base_url().port(), Some(1234));
    assert_eq!(transport.retry_attempts(), DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn builder_methods() {
    let transport = OllamaTransport::new(&OllamaConfig::default())
        .expect("should create transport")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5)
        .with_retry_delay(Duration::from_millis(10));

    assert_eq!(transport.retry_attempts(), 5);
    assert_eq!(transport.retry_delay, Duration::from_millis(10));
}

#[test]
fn zero_retry_attempts_still_tries_once() {
    let transport = OllamaTransport::new(&OllamaConfig::default())
        .expect("should create transport")
        .with_retry_attempts(0);

    assert_eq!(transport.retry_attempts(), 1);
}

#[test]
fn models_response_parses_tags_payload() {
    let json = r#"{"models":[{"name":"mxbai-embed-large:latest","size":669615493,"digest":"abc","details":{"format":"gguf","family":"bert","parameter_size":"334M","quantization_level":"F16"}}]}"#;
    let parsed: ModelsResponse = serde_json::from_str(json).expect("can parse json");

    assert_eq!(parsed.models.len(), 1);
    assert_eq!(parsed.models[0].name, "mxbai-embed-large:latest");
    let details = parsed.models[0].details.as_ref().expect("has details");
    assert_eq!(details.family.as_deref(), Some("bert"));
}
