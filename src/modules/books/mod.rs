pub mod models;
pub mod repo;
mod routes;

use async_trait::async_trait;
use axum::Router;
use folio_http::openapi::{error_response, json_response, schema_of, schema_ref};
use folio_kernel::{AppState, InitCtx, Migration, Module};
use serde_json::json;

use models::{AuthorPayload, AuthorResponse, Book, BookPayload};

/// Authors and their books
pub struct BooksModule;

impl BooksModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self, state: AppState) -> Router {
        routes::router(state)
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let book_list = json_response(
            "Books",
            json!({ "type": "array", "items": schema_ref("Book") }),
        );
        let book_ok = json_response("Book", schema_ref("Book"));
        let author_ok = json_response("Author with nested books", schema_ref("AuthorResponse"));
        let book_body = json!({
            "required": true,
            "content": { "application/json": { "schema": schema_ref("BookPayload") } }
        });
        let author_body = json!({
            "required": true,
            "content": { "application/json": { "schema": schema_ref("AuthorPayload") } }
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
        let book_update = json!({
            "summary": "Update a book (PUT requires every field)",
            "tags": ["Books"],
            "security": [{ "token": [] }],
            "requestBody": book_body,
            "responses": {
                "200": book_ok,
                "400": error_response("Validation error"),
                "401": error_response("Not authenticated"),
                "404": error_response("Unknown book")
            }
        });
        let book_delete = json!({
            "summary": "Delete a book",
            "tags": ["Books"],
            "security": [{ "token": [] }],
            "responses": {
                "204": { "description": "Deleted" },
                "401": error_response("Not authenticated"),
                "404": error_response("Unknown book")
            }
        });
        let book_create = json!({
            "summary": "Create a book",
            "tags": ["Books"],
            "security": [{ "token": [] }],
            "requestBody": book_body,
            "responses": {
                "201": book_ok,
                "400": error_response("Validation error"),
                "401": error_response("Not authenticated")
            }
        });

        Some(json!({
            "paths": {
                "/books": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [
                            query("author", "Author id", "integer"),
                            query("publication_year", "Exact publication year", "integer"),
                            query("search", "Case-insensitive title search; terms are ANDed", "string"),
                            query("ordering", "title, publication_year; prefix with - to reverse", "string")
                        ],
                        "responses": {
                            "200": book_list,
                            "400": error_response("Invalid filter")
                        }
                    },
                    "post": book_create
                },
                "/books/create": { "post": book_create },
                "/books/{id}": {
                    "get": {
                        "summary": "Retrieve a book",
                        "tags": ["Books"],
                        "responses": { "200": book_ok, "404": error_response("Unknown book") }
                    },
                    "put": book_update,
                    "patch": book_update,
                    "delete": book_delete
                },
                "/books/{id}/update": { "put": book_update, "patch": book_update },
                "/books/{id}/delete": { "delete": book_delete },
                "/authors": {
                    "get": {
                        "summary": "List authors ordered by name",
                        "tags": ["Authors"],
                        "responses": {
                            "200": json_response(
                                "Authors",
                                json!({ "type": "array", "items": schema_ref("AuthorResponse") })
                            )
                        }
                    },
                    "post": {
                        "summary": "Create an author",
                        "tags": ["Authors"],
                        "security": [{ "token": [] }],
                        "requestBody": author_body,
                        "responses": { "201": author_ok, "400": error_response("Validation error") }
                    }
                },
                "/authors/{id}": {
                    "get": {
                        "summary": "Retrieve an author",
                        "tags": ["Authors"],
                        "responses": { "200": author_ok, "404": error_response("Unknown author") }
                    },
                    "put": {
                        "summary": "Rename an author",
                        "tags": ["Authors"],
                        "security": [{ "token": [] }],
                        "requestBody": author_body,
                        "responses": { "200": author_ok, "400": error_response("Validation error") }
                    },
                    "patch": {
                        "summary": "Rename an author",
                        "tags": ["Authors"],
                        "security": [{ "token": [] }],
                        "requestBody": author_body,
                        "responses": { "200": author_ok, "400": error_response("Validation error") }
                    },
                    "delete": {
                        "summary": "Delete an author and their books",
                        "tags": ["Authors"],
                        "security": [{ "token": [] }],
                        "responses": {
                            "204": { "description": "Deleted" },
                            "404": error_response("Unknown author")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": schema_of::<Book>(),
                    "BookPayload": schema_of::<BookPayload>(),
                    "AuthorResponse": schema_of::<AuthorResponse>(),
                    "AuthorPayload": schema_of::<AuthorPayload>()
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS authors (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL CHECK (length(name) <= 100)
                );
                CREATE TABLE IF NOT EXISTS books (
                    id               INTEGER PRIMARY KEY AUTOINCREMENT,
                    title            TEXT NOT NULL CHECK (length(title) <= 200),
                    publication_year INTEGER NOT NULL,
                    author_id        INTEGER NOT NULL REFERENCES authors (id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS books_author_idx ON books (author_id);
            "#,
        }]
    }
}

/// Create a new instance of the books module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}
