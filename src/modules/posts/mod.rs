//! Posts, comments, likes and the follow feed.

pub mod models;
pub mod repo;
mod routes;

use async_trait::async_trait;
use axum::Router;
use folio_http::openapi::{error_response, json_response, schema_of, schema_ref};
use folio_kernel::{AppState, InitCtx, Migration, Module};
use serde_json::json;

use models::{Comment, CommentPayload, Post, PostPayload};

pub struct PostsModule;

#[async_trait]
impl Module for PostsModule {
    fn name(&self) -> &'static str {
        "posts"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(ctx.db.pool())
            .await?;
        tracing::info!(module = self.name(), posts, "posts module initialized");
        Ok(())
    }

    fn routes(&self, state: AppState) -> Router {
        routes::router(state)
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS posts (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    author_id  INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    title      TEXT NOT NULL CHECK (length(title) <= 200),
                    content    TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS posts_author_idx ON posts (author_id);
                CREATE TABLE IF NOT EXISTS comments (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    post_id    INTEGER NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
                    author_id  INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    content    TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS comments_post_idx ON comments (post_id);
                CREATE TABLE IF NOT EXISTS likes (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id    INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    post_id    INTEGER NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    UNIQUE (user_id, post_id)
                );
            "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let body = |name: &str| {
            json!({ "required": true, "content": { "application/json": { "schema": schema_ref(name) } } })
        };
        let post_ok = json_response("Post", schema_ref("Post"));
        let comment_ok = json_response("Comment", schema_ref("Comment"));
        let posts_ok = json_response("Posts", json!({ "type": "array", "items": schema_ref("Post") }));
        let message_ok = json_response("Done", schema_ref("MessageResponse"));
        let like_action = |summary: &str| {
            json!({
                "summary": summary,
                "tags": ["Posts"],
                "security": [{ "token": [] }],
                "responses": {
                    "200": message_ok.clone(),
                    "400": error_response("Already liked, or not liked"),
                    "401": error_response("Not authenticated"),
                    "404": error_response("Unknown post")
                }
            })
        };
        let author_write = |summary: &str, tag: &str, request: Option<&str>, ok: serde_json::Value| {
            let mut operation = json!({
                "summary": summary,
                "tags": [tag],
                "security": [{ "token": [] }],
                "responses": {
                    "200": ok,
                    "400": error_response("Validation error"),
                    "401": error_response("Not authenticated"),
                    "403": error_response("Caller is not the author"),
                    "404": error_response("Not found")
                }
            });
            if let Some(request) = request {
                operation["requestBody"] = body(request);
            }
            operation
        };
        let deleted = json!({
            "summary": "Delete (author only)",
            "security": [{ "token": [] }],
            "responses": {
                "204": { "description": "Deleted" },
                "403": error_response("Caller is not the author"),
                "404": error_response("Not found")
            }
        });
        let query = |name: &str, description: &str, kind: &str| {
            json!({
                "name": name,
                "in": "query",
                "required": false,
                "description": description,
                "schema": { "type": kind }
            })
        };

        Some(json!({
            "paths": {
                "/posts": {
                    "get": {
                        "summary": "List posts, newest first",
                        "tags": ["Posts"],
                        "parameters": [
                            query("search", "Case-insensitive search over title and content", "string"),
                            query("ordering", "created_at, title; prefix with - to reverse", "string")
                        ],
                        "responses": { "200": posts_ok.clone() }
                    },
                    "post": {
                        "summary": "Create a post as the caller",
                        "tags": ["Posts"],
                        "security": [{ "token": [] }],
                        "requestBody": body("PostPayload"),
                        "responses": {
                            "201": post_ok.clone(),
                            "400": error_response("Validation error"),
                            "401": error_response("Not authenticated")
                        }
                    }
                },
                "/posts/{id}": {
                    "get": {
                        "summary": "Retrieve a post",
                        "tags": ["Posts"],
                        "responses": { "200": post_ok.clone(), "404": error_response("Unknown post") }
                    },
                    "put": author_write("Replace a post", "Posts", Some("PostPayload"), post_ok.clone()),
                    "patch": author_write("Update a post", "Posts", Some("PostPayload"), post_ok),
                    "delete": deleted.clone()
                },
                "/posts/{id}/like": { "post": like_action("Like a post; notifies the author") },
                "/posts/{id}/unlike": { "post": like_action("Remove the caller's like") },
                "/feed": {
                    "get": {
                        "summary": "Posts by followed users, newest first",
                        "tags": ["Posts"],
                        "security": [{ "token": [] }],
                        "responses": {
                            "200": posts_ok,
                            "401": error_response("Not authenticated")
                        }
                    }
                },
                "/comments": {
                    "get": {
                        "summary": "List comments",
                        "tags": ["Comments"],
                        "parameters": [query("post", "Only comments on this post", "integer")],
                        "responses": {
                            "200": json_response(
                                "Comments",
                                json!({ "type": "array", "items": schema_ref("Comment") })
                            ),
                            "400": error_response("Unknown post")
                        }
                    },
                    "post": {
                        "summary": "Comment on a post as the caller",
                        "tags": ["Comments"],
                        "security": [{ "token": [] }],
                        "requestBody": body("CommentPayload"),
                        "responses": {
                            "201": comment_ok.clone(),
                            "400": error_response("Validation error"),
                            "401": error_response("Not authenticated")
                        }
                    }
                },
                "/comments/{id}": {
                    "get": {
                        "summary": "Retrieve a comment",
                        "tags": ["Comments"],
                        "responses": { "200": comment_ok.clone(), "404": error_response("Unknown comment") }
                    },
                    "put": author_write("Replace a comment", "Comments", Some("CommentPayload"), comment_ok.clone()),
                    "patch": author_write("Update a comment", "Comments", Some("CommentPayload"), comment_ok),
                    "delete": deleted
                }
            },
            "components": {
                "schemas": {
                    "Post": schema_of::<Post>(),
                    "PostPayload": schema_of::<PostPayload>(),
                    "Comment": schema_of::<Comment>(),
                    "CommentPayload": schema_of::<CommentPayload>()
                }
            }
        }))
    }
}

pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(PostsModule)
}
