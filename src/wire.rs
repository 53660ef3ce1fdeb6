//! Typed JSON request/response bodies for the HTTP wire protocol. Shared
//! between the server handlers and the client engine so the two never drift.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file_hash: String,
    pub chunk_hash: String,
    pub chunk_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_hash: String,
    pub hash_mismatch: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub exists: bool,
    pub hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckManyRequest {
    pub hashes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckManyResponse {
    pub missing: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub file_hash: String,
    pub chunk_hashes: Vec<String>,
    pub chunks_count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
