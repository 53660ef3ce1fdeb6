//! Integration coverage binding a real in-process server to an ephemeral
//! port and exercising it with the client engine, end to end.

use dedupe_store::client::{ApiClient, ClientEngine};
use dedupe_store::config::Config;
use dedupe_store::server::AppState;
use std::sync::Arc;
use std::time::Duration;

async fn spawn_server() -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        storage_root: dir.path().to_path_buf(),
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: "integration-test-secret".to_string(),
        access_ttl_min: 15,
        refresh_ttl_hour: 24,
    };

    let state = Arc::new(AppState::from_config(&config).unwrap());
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let bind_addr = addr.ip().to_string();
    let port = addr.port();
    let mut server_config = config;
    server_config.bind_addr = bind_addr;
    server_config.port = port;

    tokio::spawn(async move {
        let _ = state; // state is rebuilt inside server::run from server_config
        dedupe_store::server::run(server_config).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    (format!("http://{}:{}", addr.ip(), port), dir)
}

#[tokio::test]
async fn signup_login_upload_download_round_trip() {
    let (base_url, _dir) = spawn_server().await;

    let client = ApiClient::new(base_url.clone());
    client.signup("alice", "correct horse battery staple").await.unwrap();

    let authed = ApiClient::with_tokens(base_url.clone(), client.access_token().unwrap(), client.refresh_token());
    let engine = ClientEngine::new(authed);

    let src = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(src.path(), b"Hello World!").unwrap();

    let outcome = engine.upload_file(src.path()).await.unwrap();
    assert!(!outcome.already_present);
    assert!(outcome.mismatched_chunks.is_empty());

    let out_dir = tempfile::tempdir().unwrap();
    let downloaded = engine
        .download_file(&outcome.file_digest, out_dir.path(), "out.bin")
        .await
        .unwrap();
    let content = std::fs::read(downloaded).unwrap();
    assert_eq!(content, b"Hello World!");
}

#[tokio::test]
async fn second_upload_of_identical_content_is_a_noop() {
    let (base_url, _dir) = spawn_server().await;

    let client = ApiClient::new(base_url.clone());
    client.signup("bob", "hunter2-hunter2").await.unwrap();
    let authed = ApiClient::with_tokens(base_url.clone(), client.access_token().unwrap(), client.refresh_token());
    let engine = ClientEngine::new(authed);

    let src = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(src.path(), b"repeat me").unwrap();

    let first = engine.upload_file(src.path()).await.unwrap();
    assert!(!first.already_present);
    let second = engine.upload_file(src.path()).await.unwrap();
    assert!(second.already_present);
    assert_eq!(first.file_digest, second.file_digest);
}

#[tokio::test]
async fn unauthenticated_upload_is_rejected() {
    let (base_url, _dir) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/upload", base_url))
        .json(&serde_json::json!({
            "file_hash": "a".repeat(64),
            "chunk_hash": "a".repeat(64),
            "chunk_order": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn healthz_requires_no_auth() {
    let (base_url, _dir) = spawn_server().await;
    let client = reqwest::Client::new();
    let resp = client.get(format!("{}/healthz", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}
