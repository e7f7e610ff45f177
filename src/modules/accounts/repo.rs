use folio_authz::{Principal, Role};
use sqlx::{Executor, Sqlite, SqliteConnection};
use time::OffsetDateTime;

use super::models::{NewUser, User};
use super::password;

const USER_COLUMNS: &str = "SELECT u.id, u.username, u.email, u.bio, p.role, u.date_joined \
     FROM users u JOIN user_profiles p ON p.user_id = u.id";

pub async fn get_user<'e, E>(executor: E, id: i64) -> sqlx::Result<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{USER_COLUMNS} WHERE u.id = ?");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_one(executor)
        .await
}

pub async fn find_by_username<'e, E>(executor: E, username: &str) -> sqlx::Result<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{USER_COLUMNS} WHERE u.username = ?");
    sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_optional(executor)
        .await
}

/// Stored password hash for `username`, with the owning user id
pub async fn password_hash<'e, E>(executor: E, username: &str) -> sqlx::Result<Option<(i64, String)>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT id, password_hash FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(executor)
        .await
}

/// Insert a user together with its profile row
pub async fn create_user(conn: &mut SqliteConnection, new: NewUser<'_>) -> sqlx::Result<i64> {
    let user_id = sqlx::query(
        "INSERT INTO users (username, email, bio, password_hash, date_joined) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(new.username)
    .bind(new.email)
    .bind(new.bio)
    .bind(new.password_hash)
    .bind(OffsetDateTime::now_utc())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    sqlx::query("INSERT INTO user_profiles (user_id, role) VALUES (?, ?)")
        .bind(user_id)
        .bind(new.role.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(user_id)
}

/// The user's token key, creating one on first use
pub async fn get_or_create_token(conn: &mut SqliteConnection, user_id: i64) -> sqlx::Result<String> {
    sqlx::query(
        "INSERT INTO auth_tokens (key, user_id, created) VALUES (?, ?, ?) \
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(password::generate_token())
    .bind(user_id)
    .bind(OffsetDateTime::now_utc())
    .execute(&mut *conn)
    .await?;

    sqlx::query_scalar("SELECT key FROM auth_tokens WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn principal_for_token<'e, E>(executor: E, key: &str) -> sqlx::Result<Option<Principal>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{USER_COLUMNS} JOIN auth_tokens t ON t.user_id = u.id WHERE t.key = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(key)
        .fetch_optional(executor)
        .await?;
    Ok(user.map(|user| user.principal()))
}

pub async fn update_profile<'e, E>(
    executor: E,
    id: i64,
    email: Option<&str>,
    bio: Option<&str>,
) -> sqlx::Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE users SET email = COALESCE(?, email), bio = COALESCE(?, bio) WHERE id = ?",
    )
    .bind(email)
    .bind(bio)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Returns false when the user does not exist
pub async fn set_role<'e, E>(executor: E, id: i64, role: Role) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE user_profiles SET role = ? WHERE user_id = ?")
        .bind(role.as_str())
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns true when a new follow was recorded
pub async fn follow<'e, E>(executor: E, follower: i64, followee: i64) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?) \
         ON CONFLICT (follower_id, followee_id) DO NOTHING",
    )
    .bind(follower)
    .bind(followee)
    .bind(OffsetDateTime::now_utc())
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns true when an existing follow was removed
pub async fn unfollow<'e, E>(executor: E, follower: i64, followee: i64) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
        .bind(follower)
        .bind(followee)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// `(followers, following)` for a user
pub async fn follow_counts<'e, E>(executor: E, id: i64) -> sqlx::Result<(i64, i64)>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "SELECT \
            (SELECT COUNT(*) FROM follows WHERE followee_id = ?1), \
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
    )
    .bind(id)
    .fetch_one(executor)
    .await
}
