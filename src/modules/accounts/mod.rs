//! Users, profiles, API tokens and the follow graph.

pub mod authenticator;
pub mod models;
pub mod password;
pub mod repo;
mod routes;

use async_trait::async_trait;
use axum::Router;
use folio_db::Database;
use folio_http::{
    openapi::{error_response, json_response, schema_of, schema_ref},
    AppError,
};
use folio_kernel::{AppState, InitCtx, Migration, Module};
use serde_json::json;

pub use authenticator::TokenAuthenticator;
use models::{
    AuthResponse, LoginPayload, MessageResponse, NewAccount, NewUser, ProfilePayload,
    PublicUserResponse, RegisterPayload, RolePayload, User, UserResponse,
};

/// Failure modes of account creation
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("a user named '{0}' already exists")]
    UsernameTaken(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::UsernameTaken(_) => {
                AppError::field("username", "A user with that username already exists.")
            }
            AccountError::Database(err) => err.into(),
            AccountError::Other(err) => AppError::Internal(err),
        }
    }
}

/// Create a user, its profile and its token in one transaction
pub async fn create_account(
    db: &Database,
    account: NewAccount<'_>,
) -> Result<(User, String), AccountError> {
    let password_hash = password::hash_password_blocking(account.password.to_string()).await?;

    let mut tx = db.pool().begin().await?;
    let user_id = repo::create_user(
        &mut tx,
        NewUser {
            username: account.username,
            email: account.email,
            bio: account.bio,
            password_hash: &password_hash,
            role: account.role,
        },
    )
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AccountError::UsernameTaken(account.username.to_string())
        }
        other => AccountError::Database(other),
    })?;
    let token = repo::get_or_create_token(&mut tx, user_id).await?;
    let user = repo::get_user(&mut *tx, user_id).await?;
    tx.commit().await?;

    Ok((user, token))
}

pub struct AccountsModule;

#[async_trait]
impl Module for AccountsModule {
    fn name(&self) -> &'static str {
        "accounts"
    }

    fn base_path(&self) -> &'static str {
        "/accounts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(ctx.db.pool())
            .await?;
        tracing::info!(module = self.name(), users, "accounts module initialized");
        Ok(())
    }

    fn routes(&self, state: AppState) -> Router {
        routes::router(state)
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS users (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    username      TEXT NOT NULL UNIQUE,
                    email         TEXT NOT NULL DEFAULT '',
                    bio           TEXT NOT NULL DEFAULT '',
                    password_hash TEXT NOT NULL,
                    date_joined   TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS user_profiles (
                    user_id INTEGER PRIMARY KEY REFERENCES users (id) ON DELETE CASCADE,
                    role    TEXT NOT NULL DEFAULT 'Member'
                            CHECK (role IN ('Admin', 'Librarian', 'Member'))
                );
                CREATE TABLE IF NOT EXISTS auth_tokens (
                    key     TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL UNIQUE REFERENCES users (id) ON DELETE CASCADE,
                    created TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS follows (
                    follower_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    followee_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    created_at  TEXT NOT NULL,
                    PRIMARY KEY (follower_id, followee_id),
                    CHECK (follower_id <> followee_id)
                );
                CREATE INDEX IF NOT EXISTS follows_followee_idx ON follows (followee_id);
            "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let auth_ok = json_response("Token and user", schema_ref("AuthResponse"));
        let message_ok = json_response("Done", schema_ref("MessageResponse"));
        let user_ok = json_response("User", schema_ref("UserResponse"));
        let body = |name: &str| {
            json!({ "required": true, "content": { "application/json": { "schema": schema_ref(name) } } })
        };

        Some(json!({
            "paths": {
                "/register": {
                    "post": {
                        "summary": "Register a user",
                        "tags": ["Accounts"],
                        "requestBody": body("RegisterPayload"),
                        "responses": {
                            "201": auth_ok,
                            "400": error_response("Validation error")
                        }
                    }
                },
                "/login": {
                    "post": {
                        "summary": "Obtain the caller's token",
                        "tags": ["Accounts"],
                        "requestBody": body("LoginPayload"),
                        "responses": {
                            "200": auth_ok,
                            "400": error_response("Invalid credentials")
                        }
                    }
                },
                "/profile": {
                    "get": {
                        "summary": "Own profile",
                        "tags": ["Accounts"],
                        "security": [{ "token": [] }],
                        "responses": { "200": user_ok, "401": error_response("Not authenticated") }
                    },
                    "put": {
                        "summary": "Update own profile",
                        "tags": ["Accounts"],
                        "security": [{ "token": [] }],
                        "requestBody": body("ProfilePayload"),
                        "responses": { "200": user_ok, "400": error_response("Validation error") }
                    },
                    "patch": {
                        "summary": "Partially update own profile",
                        "tags": ["Accounts"],
                        "security": [{ "token": [] }],
                        "requestBody": body("ProfilePayload"),
                        "responses": { "200": user_ok, "400": error_response("Validation error") }
                    }
                },
                "/users/{id}": {
                    "get": {
                        "summary": "Public profile",
                        "tags": ["Accounts"],
                        "responses": {
                            "200": json_response("Public profile", schema_ref("PublicUserResponse")),
                            "404": error_response("Unknown user")
                        }
                    }
                },
                "/users/{id}/role": {
                    "put": {
                        "summary": "Change a user's role (Admin only)",
                        "tags": ["Accounts"],
                        "security": [{ "token": [] }],
                        "requestBody": body("RolePayload"),
                        "responses": {
                            "200": user_ok,
                            "403": error_response("Caller is not an admin")
                        }
                    }
                },
                "/follow/{user_id}": {
                    "post": {
                        "summary": "Follow a user",
                        "tags": ["Accounts"],
                        "security": [{ "token": [] }],
                        "responses": {
                            "200": message_ok,
                            "400": error_response("Self-follow or already following"),
                            "404": error_response("Unknown user")
                        }
                    }
                },
                "/unfollow/{user_id}": {
                    "post": {
                        "summary": "Unfollow a user",
                        "tags": ["Accounts"],
                        "security": [{ "token": [] }],
                        "responses": {
                            "200": message_ok,
                            "400": error_response("Not following"),
                            "404": error_response("Unknown user")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "RegisterPayload": schema_of::<RegisterPayload>(),
                    "LoginPayload": schema_of::<LoginPayload>(),
                    "ProfilePayload": schema_of::<ProfilePayload>(),
                    "RolePayload": schema_of::<RolePayload>(),
                    "UserResponse": schema_of::<UserResponse>(),
                    "PublicUserResponse": schema_of::<PublicUserResponse>(),
                    "AuthResponse": schema_of::<AuthResponse>(),
                    "MessageResponse": schema_of::<MessageResponse>()
                }
            }
        }))
    }
}

pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AccountsModule)
}
