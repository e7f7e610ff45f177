//! Per-user notifications written as side effects of other actions.

pub mod models;
pub mod repo;
mod routes;

use async_trait::async_trait;
use axum::Router;
use folio_http::openapi::{error_response, json_response, schema_of, schema_ref};
use folio_kernel::{AppState, Migration, Module};
use serde_json::json;

use models::{NotificationResponse, ReadAllResponse};
pub use repo::notify;

pub struct NotificationsModule;

#[async_trait]
impl Module for NotificationsModule {
    fn name(&self) -> &'static str {
        "notifications"
    }

    fn routes(&self, state: AppState) -> Router {
        routes::router(state)
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "0001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS notifications (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipient_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    actor_id     INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    verb         TEXT NOT NULL,
                    target_type  TEXT NOT NULL,
                    target_id    INTEGER NOT NULL,
                    target_label TEXT NOT NULL DEFAULT '',
                    created_at   TEXT NOT NULL,
                    read         INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS notifications_recipient_idx
                    ON notifications (recipient_id, read);
            "#,
        }]
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let notification_ok = json_response("Notification", schema_ref("NotificationResponse"));
        Some(json!({
            "paths": {
                "/notifications": {
                    "get": {
                        "summary": "Caller's notifications, newest first",
                        "tags": ["Notifications"],
                        "security": [{ "token": [] }],
                        "parameters": [{
                            "name": "unread",
                            "in": "query",
                            "required": false,
                            "description": "Only unread notifications when true",
                            "schema": { "type": "boolean" }
                        }],
                        "responses": {
                            "200": json_response(
                                "Notifications",
                                json!({ "type": "array", "items": schema_ref("NotificationResponse") })
                            ),
                            "401": error_response("Not authenticated")
                        }
                    }
                },
                "/notifications/{id}/read": {
                    "post": {
                        "summary": "Mark one notification read",
                        "tags": ["Notifications"],
                        "security": [{ "token": [] }],
                        "responses": {
                            "200": notification_ok,
                            "404": error_response("Unknown notification or not the recipient")
                        }
                    }
                },
                "/notifications/read-all": {
                    "post": {
                        "summary": "Mark every notification read",
                        "tags": ["Notifications"],
                        "security": [{ "token": [] }],
                        "responses": {
                            "200": json_response("Number marked", schema_ref("ReadAllResponse"))
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "NotificationResponse": schema_of::<NotificationResponse>(),
                    "ReadAllResponse": schema_of::<ReadAllResponse>()
                }
            }
        }))
    }
}

pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(NotificationsModule)
}
