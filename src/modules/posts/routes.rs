use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use folio_authz::{IsAuthenticatedOrReadOnly, IsAuthorOrReadOnly};
use folio_http::{
    extract::parse_optional_id,
    guard::{self, Policies},
    ApiResult, AppError, CurrentUser, FieldErrors, PathParams, Payload, QueryParams,
};
use folio_kernel::AppState;
use sqlx::SqlitePool;

use super::models::{
    Comment, CommentListQuery, CommentPayload, Post, PostFilter, PostListQuery, PostPayload,
};
use super::repo;
use crate::modules::accounts::models::MessageResponse;
use crate::modules::notifications::{self, models::Notice};
use crate::utils::{delete_row, order_by, require_text, row_exists, search_terms, validation_errors};

const AUTHOR_WRITES: Policies = &[&IsAuthenticatedOrReadOnly, &IsAuthorOrReadOnly];

const POST_ORDERING: &[(&str, &str)] = &[
    ("created_at", "julianday(p.created_at)"),
    ("title", "p.title"),
];

const LIKED_VERB: &str = "liked your post";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post)
                .put(update_post)
                .patch(update_post)
                .delete(delete_post),
        )
        .route("/posts/{id}/like", post(like_post))
        .route("/posts/{id}/unlike", post(unlike_post))
        .route("/feed", get(feed))
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/{id}",
            get(get_comment)
                .put(update_comment)
                .patch(update_comment)
                .delete(delete_comment),
        )
        .with_state(state)
}

fn validate_post(payload: &PostPayload, partial: bool) -> ApiResult<()> {
    let mut errors = validation_errors(payload);
    require_text(&mut errors, "title", payload.title.as_deref(), !partial);
    require_text(&mut errors, "content", payload.content.as_deref(), !partial);
    errors.into_result()
}

async fn list_posts(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<PostListQuery>,
) -> ApiResult<Json<Vec<Post>>> {
    let filter = PostFilter {
        search: search_terms(query.search.as_deref()),
        order_by: order_by(
            query.ordering.as_deref(),
            POST_ORDERING,
            "-created_at",
            "p.id DESC",
        ),
    };
    Ok(Json(repo::list_posts(state.db.pool(), filter).await?))
}

async fn get_post(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<Post>> {
    Ok(Json(repo::get_post(state.db.pool(), id).await?))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(payload): Payload<PostPayload>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    validate_post(&payload, false)?;
    let (Some(title), Some(content)) = (payload.title.as_deref(), payload.content.as_deref()) else {
        return Err(AppError::bad_request("Invalid input."));
    };

    let pool = state.db.pool();
    let id = repo::insert_post(pool, caller.id, title.trim(), content).await?;
    tracing::info!(post_id = id, author_id = caller.id, "post created");
    Ok((StatusCode::CREATED, Json(repo::get_post(pool, id).await?)))
}

async fn update_post(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
    Payload(payload): Payload<PostPayload>,
) -> ApiResult<Json<Post>> {
    let pool = state.db.pool();
    let post = repo::get_post(pool, id).await?;
    guard::check_object_permissions(AUTHOR_WRITES, &method, Some(&caller), post.author_id)?;
    validate_post(&payload, method == Method::PATCH)?;

    repo::update_post(
        pool,
        id,
        payload.title.as_deref().map(str::trim),
        payload.content.as_deref(),
    )
    .await?;
    Ok(Json(repo::get_post(pool, id).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    let pool = state.db.pool();
    let post = repo::get_post(pool, id).await?;
    guard::check_object_permissions(AUTHOR_WRITES, &method, Some(&caller), post.author_id)?;

    delete_row(pool, "posts", id).await?;
    tracing::info!(post_id = id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Like once; the author hears about it unless they liked their own post
async fn like_post(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let pool = state.db.pool();
    let post = repo::get_post(pool, id).await?;

    // The insert must open the transaction: SQLite cannot upgrade a read
    // lock under contention.
    let mut tx = pool.begin().await?;
    if !repo::like(&mut *tx, caller.id, id).await.map_err(vanished_post)? {
        return Err(
            AppError::bad_request("You have already liked this post").with_code("already_liked"),
        );
    }
    if post.author_id != caller.id {
        notifications::notify(
            &mut tx,
            Notice {
                recipient: post.author_id,
                actor: caller.id,
                verb: LIKED_VERB,
                target_type: "post",
                target_id: post.id,
                target_label: &post.title,
            },
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!(post_id = id, user_id = caller.id, "post liked");
    Ok(Json(MessageResponse::new("Post liked")))
}

/// The post was deleted between the lookup and the insert
fn vanished_post(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            AppError::not_found("Not found.")
        }
        other => other.into(),
    }
}

async fn unlike_post(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let pool = state.db.pool();
    repo::get_post(pool, id).await?;

    if !repo::unlike(pool, caller.id, id).await? {
        return Err(AppError::bad_request("You have not liked this post").with_code("not_liked"));
    }
    Ok(Json(MessageResponse::new("Post unliked")))
}

async fn feed(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<Vec<Post>>> {
    Ok(Json(repo::feed(state.db.pool(), caller.id).await?))
}

fn unknown_post_choice() -> AppError {
    let mut errors = FieldErrors::new();
    errors.add(
        "post",
        "Select a valid choice. That choice is not one of the available choices.",
    );
    AppError::validation(errors)
}

async fn list_comments(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<CommentListQuery>,
) -> ApiResult<Json<Vec<Comment>>> {
    let pool = state.db.pool();
    let post = parse_optional_id(query.post.as_deref()).map_err(|_| unknown_post_choice())?;
    if let Some(post) = post {
        if !row_exists(pool, "posts", post).await? {
            return Err(unknown_post_choice());
        }
    }
    Ok(Json(repo::list_comments(pool, post).await?))
}

async fn get_comment(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(repo::get_comment(state.db.pool(), id).await?))
}

async fn validate_comment(
    pool: &SqlitePool,
    payload: &CommentPayload,
    partial: bool,
) -> ApiResult<()> {
    let mut errors = validation_errors(payload);
    require_text(&mut errors, "content", payload.content.as_deref(), !partial);
    errors.require("post", partial || payload.post.is_some());

    if let Some(post) = payload.post {
        if !row_exists(pool, "posts", post).await? {
            errors.add("post", format!("Invalid pk \"{post}\" - object does not exist."));
        }
    }

    errors.into_result()
}

async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(payload): Payload<CommentPayload>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let pool = state.db.pool();
    validate_comment(pool, &payload, false).await?;
    let (Some(post), Some(content)) = (payload.post, payload.content.as_deref()) else {
        return Err(AppError::bad_request("Invalid input."));
    };

    let id = repo::insert_comment(pool, post, caller.id, content).await?;
    tracing::info!(comment_id = id, post_id = post, author_id = caller.id, "comment created");
    Ok((StatusCode::CREATED, Json(repo::get_comment(pool, id).await?)))
}

async fn update_comment(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
    Payload(payload): Payload<CommentPayload>,
) -> ApiResult<Json<Comment>> {
    let pool = state.db.pool();
    let comment = repo::get_comment(pool, id).await?;
    guard::check_object_permissions(AUTHOR_WRITES, &method, Some(&caller), comment.author_id)?;
    validate_comment(pool, &payload, method == Method::PATCH).await?;

    repo::update_comment(pool, id, payload.post, payload.content.as_deref()).await?;
    Ok(Json(repo::get_comment(pool, id).await?))
}

async fn delete_comment(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    let pool = state.db.pool();
    let comment = repo::get_comment(pool, id).await?;
    guard::check_object_permissions(AUTHOR_WRITES, &method, Some(&caller), comment.author_id)?;

    delete_row(pool, "comments", id).await?;
    Ok(StatusCode::NO_CONTENT)
}
