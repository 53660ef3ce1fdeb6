//! Bearer-token extraction for the "authorized" route group. `/auth/*` and
//! `/healthz` never call this.

use crate::error::ApiError;
use crate::token::{Claims, TokenService};
use hyper::{Body, Request};

pub fn authenticate(req: &Request<Body>, token_service: &TokenService) -> Result<Claims, ApiError> {
    let header = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Authorization header must be a Bearer token".into()))?;

    token_service
        .verify(token)
        .map_err(|_| ApiError::Unauthorized("invalid or expired access token".into()))
}
