//! Bearer-token authentication extractor for upload handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use mediaproxy_core::error::CoreError;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated caller.
///
/// A request without an `Authorization` header is rejected with 403; one
/// with a header that does not carry a configured token is rejected with
/// 401.
///
/// ```ignore
/// async fn upload(caller: Caller) -> AppResult<Json<()>> {
///     tracing::info!(privileged = caller.privileged, "handling upload");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Authenticated with the special token.
    pub privileged: bool,
}

impl Caller {
    /// Resolve a raw `Authorization` header value against `auth`.
    pub fn from_header(header: Option<&str>, auth: &AuthConfig) -> Result<Self, AppError> {
        let header = header.ok_or_else(|| {
            AppError::Core(CoreError::Forbidden(
                "Missing Authorization header".into(),
            ))
        })?;

        let wrong_token =
            || AppError::Core(CoreError::Unauthorized("Invalid token".into()));

        let token = header.strip_prefix("Bearer ").ok_or_else(wrong_token)?;

        // Both comparisons always run so timing does not reveal which
        // token, if any, matched.
        let special = auth
            .special_token
            .as_deref()
            .is_some_and(|special| tokens_match(special, token));
        let normal = tokens_match(&auth.token, token);

        if special {
            Ok(Self { privileged: true })
        } else if normal {
            Ok(Self { privileged: false })
        } else {
            Err(wrong_token())
        }
    }
}

/// Constant-time token comparison. Only the length is allowed to leak.
fn tokens_match(expected: &str, presented: &str) -> bool {
    bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| {
                AppError::Core(CoreError::Unauthorized(
                    "Authorization header is not valid text".into(),
                ))
            })?),
            None => None,
        };
        Caller::from_header(header, &state.config.auth)
    }
}
