//! Bearer token extractor.
//!
//! Handlers behind `require_user_auth` read the caller from the request
//! extensions; anywhere else the `Authorization` header is validated here.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use domain::models::user::UserRole;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth;

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<UserAuth>() {
            return Ok(auth.clone());
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        UserAuth::validate(&state.jwt, bearer.token())
    }
}

/// Caller that must hold the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserAuth);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = UserAuth::from_request_parts(parts, state).await?;
        if auth.is_admin() {
            Ok(AdminUser(auth))
        } else {
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
    }
}

/// Caller that must hold the asm role.
#[derive(Debug, Clone)]
pub struct AsmUser(pub UserAuth);

#[async_trait]
impl FromRequestParts<AppState> for AsmUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = UserAuth::from_request_parts(parts, state).await?;
        if auth.role == UserRole::Asm {
            Ok(AsmUser(auth))
        } else {
            Err(ApiError::Forbidden("ASM access required".to_string()))
        }
    }
}
