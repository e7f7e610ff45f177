//! Extractors whose rejections render in the standard error envelope.

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON request body; malformed input is a 400
#[derive(Debug, Clone, Copy, Default)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::bad_request(rejection.body_text()).with_code("parse_error")),
        }
    }
}

/// Query string; malformed input is a 400
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::bad_request(rejection.body_text()).with_code("parse_error")),
        }
    }
}

/// Path parameters; values that do not parse name no resource, so they are a 404
#[derive(Debug, Clone, Copy)]
pub struct PathParams<T>(pub T);

impl<S, T> FromRequestParts<S> for PathParams<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "unmatched path parameters");
                Err(AppError::not_found("Not found."))
            }
        }
    }
}

/// Parse an optional integer query value; blank means "not given"
pub fn parse_optional_id(value: Option<&str>) -> Result<Option<i64>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| "Enter a number.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Echo {
        name: String,
    }

    async fn echo(Payload(body): Payload<Echo>) -> String {
        body.name
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = Router::new().route("/", post(echo));
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\": 4"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_json_reaches_handler() {
        let app = Router::new().route("/", post(echo));
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\": \"folio\"}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap().into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn non_numeric_ids_are_not_found() {
        async fn show(PathParams(id): PathParams<i64>) -> String {
            id.to_string()
        }

        let app = Router::new().route("/books/{id}", axum::routing::get(show));
        let call = |uri: &'static str| {
            let app = app.clone();
            async move {
                app.oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
                    .await
                    .unwrap()
                    .status()
            }
        };

        assert_eq!(call("/books/12").await, StatusCode::OK);
        assert_eq!(call("/books/twelve").await, StatusCode::NOT_FOUND);
    }

    #[test]
    fn blank_ids_are_absent() {
        assert_eq!(parse_optional_id(None), Ok(None));
        assert_eq!(parse_optional_id(Some("  ")), Ok(None));
        assert_eq!(parse_optional_id(Some("7")), Ok(Some(7)));
        assert!(parse_optional_id(Some("seven")).is_err());
    }
}
