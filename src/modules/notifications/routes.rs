use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use folio_http::{ApiResult, AppError, CurrentUser, FieldErrors, PathParams, QueryParams};
use folio_kernel::AppState;

use super::models::{parse_flag, NotificationQuery, NotificationResponse, ReadAllResponse};
use super::repo;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(read_all))
        .route("/notifications/{id}/read", post(read_one))
        .with_state(state)
}

async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    QueryParams(query): QueryParams<NotificationQuery>,
) -> ApiResult<Json<Vec<NotificationResponse>>> {
    let unread_only = match query.unread.as_deref() {
        None | Some("") => false,
        Some(raw) => match parse_flag(raw) {
            Some(flag) => flag,
            None => {
                let mut errors = FieldErrors::new();
                errors.add("unread", "Must be a valid boolean.");
                return Err(AppError::validation(errors));
            }
        },
    };
    Ok(Json(repo::list_for(state.db.pool(), caller.id, unread_only).await?))
}

async fn read_one(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<NotificationResponse>> {
    let pool = state.db.pool();
    repo::mark_read(pool, caller.id, id).await?;
    Ok(Json(repo::get_for(pool, caller.id, id).await?))
}

async fn read_all(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<ReadAllResponse>> {
    let marked_read = repo::mark_all_read(state.db.pool(), caller.id).await?;
    tracing::debug!(user_id = caller.id, marked_read, "notifications marked read");
    Ok(Json(ReadAllResponse { marked_read }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::modules::notifications::{models::Notice, repo};
    use crate::testing::TestApp;

    async fn seed_notice(app: &TestApp, recipient: i64, actor: i64, label: &str) -> i64 {
        let mut conn = app.db.pool().acquire().await.unwrap();
        repo::notify(
            &mut conn,
            Notice {
                recipient,
                actor,
                verb: "liked your post",
                target_type: "post",
                target_id: 1,
                target_label: label,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn only_the_recipient_sees_notifications() {
        let app = TestApp::new().await;
        let (alice, alice_token) = app.user("alice").await;
        let (bob, bob_token) = app.user("bob").await;
        let first = seed_notice(&app, alice, bob, "Hello world").await;
        seed_notice(&app, alice, bob, "Second post").await;

        let (status, _) = app.get("/api/notifications", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.get("/api/notifications", Some(&alice_token)).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["target"], "Second post");
        assert_eq!(items[1]["actor"], "bob");
        assert_eq!(items[1]["verb"], "liked your post");
        assert_eq!(items[1]["read"], false);

        let (_, body) = app.get("/api/notifications", Some(&bob_token)).await;
        assert_eq!(body, json!([]));

        let uri = format!("/api/notifications/{first}/read");
        let (status, _) = app.post(&uri, Some(&bob_token), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn marking_read_one_and_all() {
        let app = TestApp::new().await;
        let (alice, token) = app.user("alice").await;
        let (bob, _) = app.user("bob").await;
        let first = seed_notice(&app, alice, bob, "One").await;
        seed_notice(&app, alice, bob, "Two").await;
        seed_notice(&app, alice, bob, "Three").await;

        let (status, body) = app
            .post(&format!("/api/notifications/{first}/read"), Some(&token), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["read"], true);

        let (_, body) = app.get("/api/notifications?unread=true", Some(&token)).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = app
            .post("/api/notifications/read-all", Some(&token), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["marked_read"], 2);

        let (_, body) = app.get("/api/notifications?unread=1", Some(&token)).await;
        assert_eq!(body, json!([]));
        let (_, body) = app.get("/api/notifications?unread=false", Some(&token)).await;
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = app.get("/api/notifications?unread=sometimes", Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["unread"].is_array());
    }
}
