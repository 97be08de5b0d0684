//! Caller identity extractors.
//!
//! Authentication happens upstream. The identity layer forwards the caller's
//! id in `x-user-id` and marks administrators with `x-user-role: admin`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use domain::Principal;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Any authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Principal);

/// An authenticated administrator.
#[derive(Debug, Clone, Copy)]
pub struct AdminCaller(pub Principal);

fn principal_from(parts: &Parts) -> Result<Principal, ApiError> {
    let user_id: UserId = parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?
        .trim()
        .parse()
        .map_err(|_| ApiError::Unauthorized("Invalid user id".to_string()))?;

    let is_admin = parts
        .headers
        .get(USER_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|role| role.trim().eq_ignore_ascii_case("admin"));

    Ok(Principal { user_id, is_admin })
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        principal_from(parts).map(Caller)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AdminCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = principal_from(parts)?;
        if !principal.is_admin {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminCaller(principal))
    }
}
