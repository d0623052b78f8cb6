//! Bearer-token extractor.
//!
//! Resolves `Authorization: Bearer <token>` to a user id through the
//! store's session table. Handlers that take a [`CurrentUser`] argument
//! are authenticated by construction; a missing or stale token rejects
//! with a structured 401 before the handler body runs.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use pathway_core::store::ProgressStore;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// The authenticated caller.
pub struct CurrentUser(pub Uuid);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<AppState<S>> for CurrentUser
where
  S: ProgressStore + Clone + Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
    let user = state
      .store
      .resolve_session(token)
      .await
      .map_err(|e| ApiError::store("session_lookup_failed", e))?
      .ok_or(ApiError::Unauthorized)?;
    Ok(CurrentUser(user))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn bearer_token_parsing() {
    assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
    assert_eq!(bearer_token(&headers("Bearer   abc ")), Some("abc"));
    assert_eq!(bearer_token(&headers("Basic abc")), None);
    assert_eq!(bearer_token(&headers("Bearer ")), None);
    assert_eq!(bearer_token(&HeaderMap::new()), None);
  }
}
