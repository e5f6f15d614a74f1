//! Operator credential check.
//!
//! Cache administration and the realtime test triggers require the shared
//! admin key in the `x-admin-key` header. A successful check yields an
//! [`OperatorToken`], which the guarded operations take by reference.
//!
//! ```ignore
//! async fn clear_all(token: OperatorToken, State(state): State<AppState>) {
//!     state.listings.clear_all(&token);
//! }
//! ```

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use crate::error::ApiError;

/// Header carrying the admin key.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Proof that the caller presented the operator credential.
///
/// Only [`AdminSecret::verify`] constructs one.
#[derive(Debug)]
pub struct OperatorToken {
    _private: (),
}

#[cfg(test)]
impl OperatorToken {
    pub(crate) fn for_tests() -> Self {
        Self { _private: () }
    }
}

/// The configured admin key. With no key configured every check fails.
#[derive(Clone, Default)]
pub struct AdminSecret {
    key: Option<String>,
}

impl std::fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSecret")
            .field("configured", &self.key.is_some())
            .finish()
    }
}

impl AdminSecret {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: key.filter(|k| !k.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    /// Compare the presented credential with the configured key.
    pub fn verify(&self, presented: Option<&str>) -> Result<OperatorToken, ApiError> {
        match (self.key.as_deref(), presented) {
            (Some(expected), Some(given)) if expected == given => Ok(OperatorToken { _private: () }),
            (None, _) => {
                tracing::debug!("Admin access denied: no admin key configured");
                Err(ApiError::unauthorized("Unauthorized"))
            }
            _ => {
                tracing::debug!("Admin access denied: bad or missing admin key");
                Err(ApiError::unauthorized("Unauthorized"))
            }
        }
    }
}

impl<S> FromRequestParts<S> for OperatorToken
where
    S: Send + Sync,
    Arc<AdminSecret>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secret = Arc::<AdminSecret>::from_ref(state);
        let presented = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        secret.verify(presented)
    }
}
