use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use time::OffsetDateTime;

use super::models::{Comment, Post, PostFilter};
use crate::utils::push_search;

const POST_COLUMNS: &str = "SELECT p.id, p.author_id, u.username AS author, p.title, p.content, \
     p.created_at, p.updated_at FROM posts p JOIN users u ON u.id = p.author_id";

const COMMENT_COLUMNS: &str = "SELECT c.id, c.post_id, c.author_id, u.username AS author, \
     c.content, c.created_at, c.updated_at FROM comments c JOIN users u ON u.id = c.author_id";

const NEWEST_FIRST: &str = "julianday(p.created_at) DESC, p.id DESC";

pub async fn list_posts(pool: &SqlitePool, filter: PostFilter) -> sqlx::Result<Vec<Post>> {
    let mut qb = QueryBuilder::<Sqlite>::new(POST_COLUMNS);
    qb.push(" WHERE 1 = 1");
    push_search(&mut qb, &["p.title", "p.content"], filter.search);
    qb.push(" ORDER BY ");
    qb.push(filter.order_by);
    qb.build_query_as().fetch_all(pool).await
}

/// Posts by everyone `follower` follows, newest first
pub async fn feed(pool: &SqlitePool, follower: i64) -> sqlx::Result<Vec<Post>> {
    let sql = format!(
        "{POST_COLUMNS} WHERE p.author_id IN \
         (SELECT followee_id FROM follows WHERE follower_id = ?) ORDER BY {NEWEST_FIRST}"
    );
    sqlx::query_as(&sql).bind(follower).fetch_all(pool).await
}

pub async fn get_post<'e, E>(executor: E, id: i64) -> sqlx::Result<Post>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{POST_COLUMNS} WHERE p.id = ?");
    sqlx::query_as(&sql).bind(id).fetch_one(executor).await
}

pub async fn insert_post(
    pool: &SqlitePool,
    author: i64,
    title: &str,
    content: &str,
) -> sqlx::Result<i64> {
    let now = OffsetDateTime::now_utc();
    let result = sqlx::query(
        "INSERT INTO posts (author_id, title, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(author)
    .bind(title)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_post(
    pool: &SqlitePool,
    id: i64,
    title: Option<&str>,
    content: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE posts SET title = COALESCE(?, title), content = COALESCE(?, content), \
         updated_at = ? WHERE id = ?",
    )
    .bind(title)
    .bind(content)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Get-or-create; true when the like is new
pub async fn like<'e, E>(executor: E, user: i64, post: i64) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO likes (user_id, post_id, created_at) VALUES (?, ?, ?) \
         ON CONFLICT (user_id, post_id) DO NOTHING",
    )
    .bind(user)
    .bind(post)
    .bind(OffsetDateTime::now_utc())
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// True when a like was removed
pub async fn unlike<'e, E>(executor: E, user: i64, post: i64) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
        .bind(user)
        .bind(post)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_comments(pool: &SqlitePool, post: Option<i64>) -> sqlx::Result<Vec<Comment>> {
    let mut qb = QueryBuilder::<Sqlite>::new(COMMENT_COLUMNS);
    if let Some(post) = post {
        qb.push(" WHERE c.post_id = ").push_bind(post);
    }
    qb.push(" ORDER BY julianday(c.created_at) ASC, c.id ASC");
    qb.build_query_as().fetch_all(pool).await
}

pub async fn get_comment(pool: &SqlitePool, id: i64) -> sqlx::Result<Comment> {
    let sql = format!("{COMMENT_COLUMNS} WHERE c.id = ?");
    sqlx::query_as(&sql).bind(id).fetch_one(pool).await
}

pub async fn insert_comment(
    pool: &SqlitePool,
    post: i64,
    author: i64,
    content: &str,
) -> sqlx::Result<i64> {
    let now = OffsetDateTime::now_utc();
    let result = sqlx::query(
        "INSERT INTO comments (post_id, author_id, content, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(post)
    .bind(author)
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_comment(
    pool: &SqlitePool,
    id: i64,
    post: Option<i64>,
    content: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE comments SET post_id = COALESCE(?, post_id), content = COALESCE(?, content), \
         updated_at = ? WHERE id = ?",
    )
    .bind(post)
    .bind(content)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
