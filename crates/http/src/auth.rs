//! Request authentication extractors.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use folio_authz::{Credentials, Principal};
use folio_kernel::AppState;

use crate::error::AppError;

const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";

/// The caller, when the request carries valid credentials.
///
/// Absent or foreign-scheme headers yield `None`; malformed or unknown
/// credentials are rejected with 401 even on read-only endpoints.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Principal>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(Self(Some(principal.clone())));
        }

        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self(None));
        };
        let header = header.to_str().map_err(|_| {
            AppError::unauthorized(
                "Invalid token header. Token string should not contain invalid characters.",
            )
        })?;

        let auth = &state.settings.auth;
        let credentials = match Credentials::parse(header, &auth.token_keyword, auth.allow_basic) {
            Ok(Some(credentials)) => credentials,
            Ok(None) => return Ok(Self(None)),
            Err(err) => return Err(AppError::unauthorized(err.to_string())),
        };

        let principal = state
            .authenticator
            .authenticate(&credentials)
            .await?
            .ok_or_else(|| match &credentials {
                Credentials::Token(_) => AppError::unauthorized("Invalid token."),
                Credentials::Basic { .. } => AppError::unauthorized("Invalid username/password."),
            })?;

        tracing::debug!(user_id = principal.id, username = %principal.username, "request authenticated");
        parts.extensions.insert(principal.clone());
        Ok(Self(Some(principal)))
    }
}

/// The caller; anonymous requests are rejected with 401
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(principal)) => Ok(Self(principal)),
            MaybeUser(None) => Err(AppError::unauthorized(NOT_AUTHENTICATED)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use folio_authz::{Authenticator, Role};
    use folio_db::Database;
    use folio_kernel::settings::Settings;
    use tower::ServiceExt;

    struct FixedTokens;

    #[async_trait]
    impl Authenticator for FixedTokens {
        async fn authenticate_token(&self, key: &str) -> anyhow::Result<Option<Principal>> {
            Ok((key == "good").then(|| Principal {
                id: 7,
                username: "alice".into(),
                role: Role::Member,
            }))
        }

        async fn authenticate_password(
            &self,
            _username: &str,
            _password: &str,
        ) -> anyhow::Result<Option<Principal>> {
            Ok(None)
        }
    }

    async fn whoami(MaybeUser(user): MaybeUser) -> String {
        user.map(|p| p.username).unwrap_or_else(|| "anonymous".into())
    }

    async fn me(CurrentUser(user): CurrentUser) -> String {
        user.username
    }

    async fn app() -> Router {
        let state = AppState::new(
            Settings::default(),
            Database::in_memory().await.unwrap(),
            Arc::new(FixedTokens),
        );
        Router::new()
            .route("/whoami", get(whoami))
            .route("/me", get(me))
            .with_state(state)
    }

    async fn call(uri: &str, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = app()
            .await
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn anonymous_requests_pass_through() {
        assert_eq!(
            call("/whoami", None).await,
            (StatusCode::OK, "anonymous".to_string())
        );
        assert_eq!(
            call("/whoami", Some("Bearer whatever")).await,
            (StatusCode::OK, "anonymous".to_string())
        );
    }

    #[tokio::test]
    async fn valid_token_resolves_principal() {
        assert_eq!(
            call("/whoami", Some("Token good")).await,
            (StatusCode::OK, "alice".to_string())
        );
        assert_eq!(call("/me", Some("Token good")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_everywhere() {
        assert_eq!(
            call("/whoami", Some("Token bad")).await.0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(call("/me", None).await.0, StatusCode::UNAUTHORIZED);
    }
}
