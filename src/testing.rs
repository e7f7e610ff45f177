//! In-process harness for route tests.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use folio_authz::Role;
use folio_db::Database;
use folio_kernel::settings::Settings;
use serde_json::Value;
use tower::ServiceExt;

use crate::app::App;
use crate::modules::accounts::{create_account, models::NewAccount};

#[derive(Clone)]
pub struct TestApp {
    router: Router,
    pub db: Database,
}

impl TestApp {
    pub const PASSWORD: &'static str = "password123";

    /// Fully migrated app over a private in-memory database
    pub async fn new() -> Self {
        Self::with_database(Database::in_memory().await.unwrap()).await
    }

    /// Fully migrated app over `db`
    pub async fn with_database(db: Database) -> Self {
        let app = App::bootstrap(Settings::default(), db.clone()).await.unwrap();
        Self {
            router: app.router(),
            db,
        }
    }

    /// Create a member; returns its id and token
    pub async fn user(&self, username: &str) -> (i64, String) {
        self.user_with_role(username, Role::Member).await
    }

    pub async fn user_with_role(&self, username: &str, role: Role) -> (i64, String) {
        let email = format!("{username}@example.com");
        let (user, token) = create_account(
            &self.db,
            NewAccount {
                username,
                email: &email,
                bio: "",
                password: Self::PASSWORD,
                role,
            },
        )
        .await
        .unwrap();
        (user.id, token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// JSON request; an empty response body comes back as `Value::Null`
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.send(builder.body(body).unwrap()).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }
}
