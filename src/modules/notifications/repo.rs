use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use time::OffsetDateTime;

use super::models::{Notice, NotificationResponse};

const NOTIFICATION_COLUMNS: &str = "SELECT n.id, u.username AS actor, n.verb, \
     n.target_label AS target, n.created_at AS timestamp, n.read \
     FROM notifications n JOIN users u ON u.id = n.actor_id";

/// Write a notification inside the caller's transaction
pub async fn notify(conn: &mut SqliteConnection, notice: Notice<'_>) -> sqlx::Result<i64> {
    let result = sqlx::query(
        "INSERT INTO notifications \
         (recipient_id, actor_id, verb, target_type, target_id, target_label, created_at, read) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
    )
    .bind(notice.recipient)
    .bind(notice.actor)
    .bind(notice.verb)
    .bind(notice.target_type)
    .bind(notice.target_id)
    .bind(notice.target_label)
    .bind(OffsetDateTime::now_utc())
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Recipient's notifications, newest first
pub async fn list_for(
    pool: &SqlitePool,
    recipient: i64,
    unread_only: bool,
) -> sqlx::Result<Vec<NotificationResponse>> {
    let filter = if unread_only { " AND n.read = 0" } else { "" };
    let sql = format!(
        "{NOTIFICATION_COLUMNS} WHERE n.recipient_id = ?{filter} \
         ORDER BY julianday(n.created_at) DESC, n.id DESC"
    );
    sqlx::query_as(&sql).bind(recipient).fetch_all(pool).await
}

/// Scoped to the recipient so foreign notifications read as missing
pub async fn get_for<'e, E>(
    executor: E,
    recipient: i64,
    id: i64,
) -> sqlx::Result<NotificationResponse>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{NOTIFICATION_COLUMNS} WHERE n.id = ? AND n.recipient_id = ?");
    sqlx::query_as(&sql)
        .bind(id)
        .bind(recipient)
        .fetch_one(executor)
        .await
}

pub async fn mark_read(pool: &SqlitePool, recipient: i64, id: i64) -> sqlx::Result<()> {
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND recipient_id = ?")
        .bind(id)
        .bind(recipient)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Returns how many were unread
pub async fn mark_all_read(pool: &SqlitePool, recipient: i64) -> sqlx::Result<u64> {
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE recipient_id = ? AND read = 0")
        .bind(recipient)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
