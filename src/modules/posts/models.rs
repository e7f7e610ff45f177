use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::Validate;

/// A post joined with its author's username
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Post {
    pub id: i64,
    #[serde(skip)]
    pub author_id: i64,
    /// Author's username
    pub author: String,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Comment {
    pub id: i64,
    #[sqlx(rename = "post_id")]
    pub post: i64,
    #[serde(skip)]
    pub author_id: i64,
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PostPayload {
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentPayload {
    pub post: Option<i64>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    pub post: Option<String>,
}

/// Parsed post list parameters
#[derive(Debug, Default)]
pub struct PostFilter {
    pub search: Vec<String>,
    pub order_by: String,
}
