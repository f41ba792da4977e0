use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::PgPool;

use super::{extract_token, verify_token, UserData};
use crate::error::AppError;
use crate::state::AppState;

/// Who is making the request. Resolved once per request before the handler runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous,
    Authenticated(UserData),
}

impl Identity {
    pub fn user(&self) -> Option<&UserData> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

/// Verifies the session token and loads the profile. A failed profile
/// fetch leaves the user signed in without a profile.
pub async fn resolve_identity(pool: &PgPool, secret: &str, token: Option<&str>) -> Identity {
    let Some(token) = token else {
        return Identity::Anonymous;
    };

    let claims = match verify_token(secret, token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Ignoring invalid session token: {}", e);
            return Identity::Anonymous;
        }
    };

    let Some(user_id) = claims.user_id() else {
        tracing::warn!("Session subject is not a user id: {}", claims.sub);
        return Identity::Anonymous;
    };

    let profile = match crate::db::get_profile(pool, user_id).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!("Profile fetch failed for {}: {}", user_id, e);
            None
        }
    };

    Identity::Authenticated(UserData::from_profile(user_id, &claims.email, profile))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        let token = extract_token(&parts.headers);
        let identity =
            resolve_identity(state.pool.as_ref(), &state.config.jwt_secret, token.as_deref()).await;
        parts.extensions.insert(identity.clone());
        Ok(identity)
    }
}

/// API guard: rejects anonymous callers with 401.
pub struct RequireUser(pub UserData);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let identity = match Identity::from_request_parts(parts, state).await {
            Ok(identity) => identity,
            Err(never) => match never {},
        };
        match identity {
            Identity::Authenticated(user) => Ok(RequireUser(user)),
            Identity::Anonymous => Err(AppError::Unauthorized("Please sign in".to_string())),
        }
    }
}
