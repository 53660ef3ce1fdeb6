//! Thin route handlers: parse/validate the body, call one store operation,
//! map the result to a status code.

use super::auth_middleware::authenticate;
use super::AppState;
use crate::error::ApiError;
use crate::hasher::digest_bytes;
use crate::wire::*;
use hyper::{Body, Method, Request, Response, StatusCode};
use std::sync::Arc;

pub async fn route(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (&method, segments.as_slice()) {
        (&Method::GET, ["healthz"]) => Ok(json_response(StatusCode::OK, &HealthResponse { status: "ok" })),
        (&Method::POST, ["auth", "signup"]) => signup(req, state).await,
        (&Method::POST, ["auth", "login"]) => login(req, state).await,
        (&Method::POST, ["auth", "refresh"]) => refresh(req, state).await,
        (&Method::POST, ["upload"]) => {
            let claims = authenticate(&req, &state.token_service)?;
            let _ = claims;
            upload(req, state).await
        }
        (&Method::GET, ["check", hash]) => {
            let claims = authenticate(&req, &state.token_service)?;
            let _ = claims;
            check_one(hash, state).await
        }
        (&Method::POST, ["check"]) => {
            let claims = authenticate(&req, &state.token_service)?;
            let _ = claims;
            check_many(req, state).await
        }
        (&Method::GET, ["download", hash]) => {
            let claims = authenticate(&req, &state.token_service)?;
            let _ = claims;
            download(hash, state).await
        }
        (&Method::GET, ["chunk", hash]) => {
            let claims = authenticate(&req, &state.token_service)?;
            let _ = claims;
            get_chunk(hash, state).await
        }
        _ => Err(ApiError::NotFound(format!("no route for {} {}", method, path))),
    }
}

pub fn error_response(err: &ApiError) -> Response<Body> {
    json_response(err.status(), &err.body())
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let bytes = serde_json::to_vec(body).expect("response bodies are always serializable");
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("response builder cannot fail with a well-formed body")
}

async fn read_json_body<T: serde::de::DeserializeOwned>(req: Request<Body>) -> Result<T, ApiError> {
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| ApiError::BadRequest(format!("reading request body: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}

async fn signup(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let body: SignupRequest = read_json_body(req).await?;
    if body.username.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("username and password are required".into()));
    }
    let user = state.user_store.create_user(&body.username, &body.password).await?;
    let pair = state.token_service.issue_pair(user.id, &user.username)?;
    Ok(json_response(
        StatusCode::OK,
        &TokenPairResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        },
    ))
}

async fn login(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let body: LoginRequest = read_json_body(req).await?;
    if body.username.is_empty() || body.password.is_empty() {
        return Err(ApiError::BadRequest("username and password are required".into()));
    }
    let user = state
        .user_store
        .verify_credentials(&body.username, &body.password)
        .await
        .map_err(|_| ApiError::Unauthorized("invalid username or password".into()))?;
    let pair = state.token_service.issue_pair(user.id, &user.username)?;
    Ok(json_response(
        StatusCode::OK,
        &TokenPairResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        },
    ))
}

async fn refresh(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let body: RefreshRequest = read_json_body(req).await?;
    let access_token = state
        .token_service
        .refresh(&body.refresh_token)
        .map_err(|_| ApiError::Unauthorized("invalid or expired refresh token".into()))?;
    Ok(json_response(StatusCode::OK, &RefreshResponse { access_token }))
}

async fn upload(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let body: UploadRequest = read_json_body(req).await?;
    if body.file_hash.is_empty() || body.chunk_hash.is_empty() {
        return Err(ApiError::BadRequest("file_hash and chunk_hash are required".into()));
    }

    let content = body
        .content
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(|c| base64::decode(c))
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 content: {}", e)))?;

    let mut hash_mismatch = false;

    if let Some(bytes) = &content {
        let computed = state.chunk_store.save_chunk(&body.chunk_hash, bytes).await?;
        if computed != body.chunk_hash {
            hash_mismatch = true;
        }
    } else if !state.chunk_store.chunk_exists(&body.chunk_hash).await {
        return Err(ApiError::NotFound(format!(
            "chunk {} was not supplied and does not already exist",
            body.chunk_hash
        )));
    }

    if body.file_hash != body.chunk_hash {
        state
            .manifest_store
            .append_entry(&body.file_hash, &body.chunk_hash, body.chunk_order)
            .await?;
    }

    Ok(json_response(
        StatusCode::OK,
        &UploadResponse {
            message: "chunk accepted".to_string(),
            file_hash: body.file_hash,
            hash_mismatch,
        },
    ))
}

async fn check_one(hash: &str, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    if hash.len() < 4 {
        return Err(ApiError::BadRequest("digest must be at least 4 characters".into()));
    }
    let exists = state.chunk_store.chunk_exists(hash).await || state.manifest_store.file_exists(hash).await;
    Ok(json_response(
        StatusCode::OK,
        &CheckResponse {
            exists,
            hash: hash.to_string(),
        },
    ))
}

async fn check_many(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let body: CheckManyRequest = read_json_body(req).await?;
    let (_existing, missing) = state.chunk_store.check_many(&body.hashes).await?;
    Ok(json_response(StatusCode::OK, &CheckManyResponse { missing }))
}

async fn download(hash: &str, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    if let Ok(manifest) = state.manifest_store.get_manifest(hash).await {
        let mut entries = manifest.chunks;
        entries.sort_by_key(|e| e.chunk_order);
        let chunk_hashes: Vec<String> = entries.into_iter().map(|e| e.chunk_hash).collect();
        let chunks_count = chunk_hashes.len();
        return Ok(json_response(
            StatusCode::OK,
            &DownloadResponse {
                file_hash: hash.to_string(),
                chunk_hashes,
                chunks_count,
            },
        ));
    }

    if state.chunk_store.chunk_exists(hash).await {
        return Ok(json_response(
            StatusCode::OK,
            &DownloadResponse {
                file_hash: hash.to_string(),
                chunk_hashes: vec![hash.to_string()],
                chunks_count: 1,
            },
        ));
    }

    Err(ApiError::NotFound(format!("no file found for digest {}", hash)))
}

async fn get_chunk(hash: &str, state: Arc<AppState>) -> Result<Response<Body>, ApiError> {
    let bytes = state.chunk_store.get_chunk(hash).await.map_err(|_| {
        ApiError::NotFound(format!("chunk {} not found", hash))
    })?;
    let _ = digest_bytes(&bytes);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(bytes))
        .expect("response builder cannot fail with a well-formed body"))
}
