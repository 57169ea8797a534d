use axum::{
    extract::Request,
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use std::sync::Arc;

use crate::errors::ApiError;

/// Static set of bearer tokens accepted by the API.
#[derive(Debug, Clone)]
pub struct TokenAllowList {
    tokens: Arc<[String]>,
}

impl TokenAllowList {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let bearer = match headers.typed_try_get::<Authorization<Bearer>>() {
            Ok(Some(Authorization(bearer))) => bearer,
            Ok(None) => return Err(ApiError::AuthMissing),
            Err(_) if !carries_credentials(headers) => return Err(ApiError::AuthMissing),
            Err(_) => return Err(ApiError::AuthInvalid),
        };

        if bearer.token().trim().is_empty() {
            return Err(ApiError::AuthMissing);
        }
        if self.tokens.iter().any(|t| t == bearer.token()) {
            Ok(())
        } else {
            Err(ApiError::AuthInvalid)
        }
    }
}

// A scheme with nothing after it counts as no token at all.
fn carries_credentials(headers: &HeaderMap) -> bool {
    match headers.get(AUTHORIZATION).map(|v| v.to_str()) {
        Some(Ok(value)) => value.split_whitespace().nth(1).is_some(),
        Some(Err(_)) => true,
        None => false,
    }
}

pub async fn require_token(allow_list: TokenAllowList, req: Request, next: Next) -> Response {
    match allow_list.authorize(req.headers()) {
        Ok(()) => next.run(req).await,
        Err(err) => {
            match err {
                ApiError::AuthMissing => tracing::debug!(path = %req.uri().path(), "No token provided"),
                _ => tracing::warn!(path = %req.uri().path(), "Rejected unknown token"),
            }
            err.into_response()
        }
    }
}
