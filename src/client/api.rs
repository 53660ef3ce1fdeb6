//! Thin reqwest wrapper over the server's wire protocol, with a single
//! automatic refresh-and-retry on a 401 response.

use crate::wire::*;
use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use std::sync::RwLock;
use std::time::Duration;

const CHUNK_TRANSFER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub struct ApiClient {
    http: Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
    refresh_token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiClient {
            http: Client::builder()
                .timeout(CHUNK_TRANSFER_TIMEOUT)
                .build()
                .expect("reqwest client builder cannot fail with this configuration"),
            base_url: base_url.into(),
            access_token: RwLock::new(None),
            refresh_token: RwLock::new(None),
        }
    }

    pub fn with_tokens(base_url: impl Into<String>, access_token: String, refresh_token: Option<String>) -> Self {
        let client = Self::new(base_url);
        *client.access_token.write().unwrap() = Some(access_token);
        *client.refresh_token.write().unwrap() = refresh_token;
        client
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token.read().unwrap().clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_token.read().unwrap().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn bearer(&self) -> Option<String> {
        self.access_token.read().unwrap().clone()
    }

    pub async fn signup(&self, username: &str, password: &str) -> Result<TokenPairResponse> {
        let resp = self
            .http
            .post(self.url("/auth/signup"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .context("sending signup request")?;
        let pair: TokenPairResponse = check_status(resp).await?.json().await.context("parsing signup response")?;
        self.store_tokens(&pair);
        Ok(pair)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPairResponse> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .context("sending login request")?;
        let pair: TokenPairResponse = check_status(resp).await?.json().await.context("parsing login response")?;
        self.store_tokens(&pair);
        Ok(pair)
    }

    fn store_tokens(&self, pair: &TokenPairResponse) {
        *self.access_token.write().unwrap() = Some(pair.access_token.clone());
        *self.refresh_token.write().unwrap() = Some(pair.refresh_token.clone());
    }

    /// Retries the refresh token exactly once against a 401.
    async fn refresh_once(&self) -> Result<()> {
        let access_token = self.refresh().await?;
        *self.access_token.write().unwrap() = Some(access_token);
        Ok(())
    }

    /// Exchanges the held refresh token for a fresh access token. Exposed
    /// directly for the CLI's standalone `refresh` subcommand; the
    /// request-wrapping methods above call this implicitly on a 401.
    pub async fn refresh(&self) -> Result<String> {
        let refresh_token = self
            .refresh_token()
            .ok_or_else(|| anyhow::anyhow!("no refresh token available"))?;
        log::warn!("access token rejected as unauthorized, attempting a single refresh");
        let resp = self
            .http
            .post(self.url("/auth/refresh"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .context("sending refresh request")?;
        let refreshed: RefreshResponse = check_status(resp).await?.json().await.context("parsing refresh response")?;
        Ok(refreshed.access_token)
    }

    pub async fn check_one(&self, hash: &str) -> Result<CheckResponse> {
        self.with_auth_retry(|token| {
            let url = self.url(&format!("/check/{}", hash));
            let req = self.http.get(url);
            apply_auth(req, token)
        })
        .await
    }

    pub async fn check_many(&self, hashes: &[String]) -> Result<CheckManyResponse> {
        self.with_auth_retry(|token| {
            let req = self
                .http
                .post(self.url("/check"))
                .json(&CheckManyRequest { hashes: hashes.to_vec() });
            apply_auth(req, token)
        })
        .await
    }

    pub async fn upload_chunk(&self, body: &UploadRequest) -> Result<UploadResponse> {
        self.with_auth_retry(|token| {
            let req = self.http.post(self.url("/upload")).json(body);
            apply_auth(req, token)
        })
        .await
    }

    pub async fn download_manifest(&self, hash: &str) -> Result<DownloadResponse> {
        self.with_auth_retry(|token| {
            let req = self.http.get(self.url(&format!("/download/{}", hash)));
            apply_auth(req, token)
        })
        .await
    }

    pub async fn get_chunk_bytes(&self, hash: &str) -> Result<Vec<u8>> {
        let token = self.bearer();
        let req = apply_auth(self.http.get(self.url(&format!("/chunk/{}", hash))), token);
        let resp = req.send().await.context("sending chunk download request")?;
        let resp = match check_status(resp).await {
            Ok(resp) => resp,
            Err(e) if is_unauthorized(&e) => {
                self.refresh_once().await?;
                let token = self.bearer();
                let req = apply_auth(self.http.get(self.url(&format!("/chunk/{}", hash))), token);
                check_status(req.send().await.context("retrying chunk download request")?).await?
            }
            Err(e) => return Err(e),
        };
        let bytes = resp.bytes().await.context("reading chunk bytes")?;
        Ok(bytes.to_vec())
    }

    /// Sends one request built by `build`, retrying exactly once after a
    /// fresh access token if the server responds 401.
    async fn with_auth_retry<T, F>(&self, build: F) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(Option<String>) -> reqwest::RequestBuilder,
    {
        let resp = build(self.bearer()).send().await.context("sending request")?;
        match check_status(resp).await {
            Ok(resp) => Ok(resp.json().await.context("parsing response body")?),
            Err(e) if is_unauthorized(&e) => {
                self.refresh_once().await?;
                let resp = build(self.bearer()).send().await.context("retrying request")?;
                Ok(check_status(resp).await?.json().await.context("parsing retried response body")?)
            }
            Err(e) => Err(e),
        }
    }
}

fn apply_auth(req: reqwest::RequestBuilder, token: Option<String>) -> reqwest::RequestBuilder {
    match token {
        Some(t) => req.bearer_auth(t),
        None => req,
    }
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.to_string().contains("unauthorized")
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status() == StatusCode::UNAUTHORIZED {
        bail!("unauthorized");
    }
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("server returned {}: {}", status, body);
    }
    Ok(resp)
}
