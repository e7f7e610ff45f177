//! Libraries, their librarian and the books they hold.

pub mod models;
pub mod repo;
mod routes;

use async_trait::async_trait;
use axum::Router;
use folio_http::openapi::{error_response, json_response, schema_of, schema_ref};
use folio_kernel::{AppState, InitCtx, Migration, Module};
use serde_json::json;

use models::{Librarian, LibrarianPayload, LibraryPayload, LibraryResponse};

pub struct LibraryModule;

#[async_trait]
impl Module for LibraryModule {
    fn name(&self) -> &'static str {
        "library"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let libraries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM libraries")
            .fetch_one(ctx.db.pool())
            .await?;
        tracing::info!(module = self.name(), libraries, "library module initialized");
        Ok(())
    }

    fn routes(&self, state: AppState) -> Router {
        routes::router(state)
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS libraries (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL CHECK (length(name) <= 100)
                );
                CREATE TABLE IF NOT EXISTS library_books (
                    library_id INTEGER NOT NULL REFERENCES libraries (id) ON DELETE CASCADE,
                    book_id    INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    PRIMARY KEY (library_id, book_id)
                );
                CREATE INDEX IF NOT EXISTS library_books_book_idx ON library_books (book_id);
                CREATE TABLE IF NOT EXISTS librarians (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    name       TEXT NOT NULL CHECK (length(name) <= 100),
                    library_id INTEGER NOT NULL UNIQUE REFERENCES libraries (id) ON DELETE CASCADE
                );
            "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let library_ok = json_response("Library with books and librarian", schema_ref("LibraryResponse"));
        let librarian_ok = json_response("Librarian", schema_ref("Librarian"));
        let body = |name: &str| {
            json!({ "required": true, "content": { "application/json": { "schema": schema_ref(name) } } })
        };
        let staff_write = |summary: &str, request: Option<&str>, ok: (&str, serde_json::Value)| {
            let (status, response) = ok;
            let mut operation = json!({
                "summary": summary,
                "tags": ["Libraries"],
                "security": [{ "token": [] }],
                "responses": {
                    "400": error_response("Validation error"),
                    "401": error_response("Not authenticated"),
                    "403": error_response("Caller is not Admin or Librarian"),
                    "404": error_response("Not found")
                }
            });
            operation["responses"][status] = response;
            if let Some(request) = request {
                operation["requestBody"] = body(request);
            }
            operation
        };
        let deleted = || ("204", json!({ "description": "Deleted" }));

        Some(json!({
            "paths": {
                "/libraries": {
                    "get": {
                        "summary": "List libraries",
                        "tags": ["Libraries"],
                        "responses": {
                            "200": json_response(
                                "Libraries",
                                json!({ "type": "array", "items": schema_ref("LibraryResponse") })
                            )
                        }
                    },
                    "post": staff_write("Create a library", Some("LibraryPayload"), ("201", library_ok.clone()))
                },
                "/libraries/{id}": {
                    "get": {
                        "summary": "Retrieve a library",
                        "tags": ["Libraries"],
                        "responses": { "200": library_ok, "404": error_response("Unknown library") }
                    },
                    "put": staff_write("Replace a library and its shelf", Some("LibraryPayload"), ("200", library_ok.clone())),
                    "patch": staff_write("Update a library", Some("LibraryPayload"), ("200", library_ok.clone())),
                    "delete": staff_write("Delete a library and its librarian", None, deleted())
                },
                "/libraries/{id}/books/{book_id}": {
                    "post": staff_write("Add a book to the library", None, ("200", library_ok.clone())),
                    "delete": staff_write("Remove a book from the library", None, deleted())
                },
                "/librarians": {
                    "get": {
                        "summary": "List librarians",
                        "tags": ["Libraries"],
                        "responses": {
                            "200": json_response(
                                "Librarians",
                                json!({ "type": "array", "items": schema_ref("Librarian") })
                            )
                        }
                    },
                    "post": staff_write("Assign a librarian", Some("LibrarianPayload"), ("201", librarian_ok.clone()))
                },
                "/librarians/{id}": {
                    "get": {
                        "summary": "Retrieve a librarian",
                        "tags": ["Libraries"],
                        "responses": { "200": librarian_ok, "404": error_response("Unknown librarian") }
                    },
                    "put": staff_write("Update a librarian", Some("LibrarianPayload"), ("200", librarian_ok.clone())),
                    "patch": staff_write("Update a librarian", Some("LibrarianPayload"), ("200", librarian_ok.clone())),
                    "delete": staff_write("Remove a librarian", None, deleted())
                }
            },
            "components": {
                "schemas": {
                    "LibraryResponse": schema_of::<LibraryResponse>(),
                    "LibraryPayload": schema_of::<LibraryPayload>(),
                    "Librarian": schema_of::<Librarian>(),
                    "LibrarianPayload": schema_of::<LibrarianPayload>()
                }
            }
        }))
    }
}

pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(LibraryModule)
}
