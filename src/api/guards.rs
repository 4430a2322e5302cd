use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;

const BAD_CREDENTIALS: &str = "Invalid authentication credentials";

pub(crate) struct CurrentUser(pub(crate) User);

/// Review endpoints only; candidates are rejected.
pub(crate) struct CurrentReviewer(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = security::verify_token(bearer_token(parts)?, state.settings())
            .map_err(|_| ApiError::Unauthorized(BAD_CREDENTIALS))?;

        // The token only names the user; the row stays authoritative for
        // role and active status.
        let user = repositories::users::find_by_id(state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?
            .ok_or(ApiError::Unauthorized("User not found"))?;

        if !user.is_active {
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentReviewer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        match user.role {
            UserRole::Reviewer | UserRole::Admin => Ok(CurrentReviewer(user)),
            UserRole::Candidate => Err(ApiError::Forbidden("Reviewer access required")),
        }
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))
}
