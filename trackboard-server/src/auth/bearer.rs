//! Static bearer-token check for the chart routes

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::server::ApiError;

/// Shared secret every protected request must present
#[derive(Clone)]
pub struct BearerAuth {
    secret: Arc<str>,
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

impl BearerAuth {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Check an `Authorization` header value; the token must match exactly
    pub fn verify(&self, authorization: Option<&str>) -> Result<(), ApiError> {
        let value = authorization.ok_or(ApiError::Unauthorized("missing bearer token"))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("expected bearer token"))?;

        if token != &*self.secret {
            return Err(ApiError::Unauthorized("invalid bearer token"));
        }
        Ok(())
    }
}

/// Middleware function for Axum
pub async fn layer(
    State(auth): State<BearerAuth>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = auth.verify(authorization) {
        debug!("Rejected {} {}: {}", req.method(), req.uri().path(), e);
        return Err(e);
    }

    Ok(next.run(req).await)
}
