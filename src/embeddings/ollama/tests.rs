use super::*;

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        batch_size: 128,
        embedding_dimension: 384,
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.dimension(), 384);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let config = OllamaConfig::default();
    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[test]
fn dimension_check_rejects_wrong_length() {
    let config = OllamaConfig {
        embedding_dimension: 64,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert!(client.check_dimension(&[0.0; 64]).is_ok());
    assert!(client.check_dimension(&[0.0; 768]).is_err());
}

#[test]
fn empty_batch_is_a_no_op() {
    let config = OllamaConfig::default();
    let client = OllamaClient::new(&config).expect("Failed to create client");

    // No texts means no HTTP traffic and an empty result.
    let embeddings = client.embed_batch(&[]).expect("empty batch should succeed");
    assert!(embeddings.is_empty());
}
