use std::collections::HashMap;

use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};

use super::models::{Librarian, Library, LibraryResponse};
use crate::modules::books::models::Book;

const SHELF_COLUMNS: &str = "SELECT lb.library_id, b.id, b.title, b.publication_year, b.author_id \
     FROM library_books lb JOIN books b ON b.id = lb.book_id";

#[derive(sqlx::FromRow)]
struct ShelvedBook {
    library_id: i64,
    #[sqlx(flatten)]
    book: Book,
}

async fn assemble(
    pool: &SqlitePool,
    libraries: Vec<Library>,
    shelf_filter: Option<i64>,
) -> sqlx::Result<Vec<LibraryResponse>> {
    let (shelf_sql, librarian_sql) = match shelf_filter {
        Some(_) => (
            format!("{SHELF_COLUMNS} WHERE lb.library_id = ? ORDER BY b.title, b.id"),
            "SELECT id, name, library_id FROM librarians WHERE library_id = ?",
        ),
        None => (
            format!("{SHELF_COLUMNS} ORDER BY b.title, b.id"),
            "SELECT id, name, library_id FROM librarians",
        ),
    };

    let mut shelf_query = sqlx::query_as::<_, ShelvedBook>(&shelf_sql);
    let mut librarian_query = sqlx::query_as::<_, Librarian>(librarian_sql);
    if let Some(library_id) = shelf_filter {
        shelf_query = shelf_query.bind(library_id);
        librarian_query = librarian_query.bind(library_id);
    }

    let mut shelves: HashMap<i64, Vec<Book>> = HashMap::new();
    for shelved in shelf_query.fetch_all(pool).await? {
        shelves.entry(shelved.library_id).or_default().push(shelved.book);
    }
    let mut librarians: HashMap<i64, Librarian> = librarian_query
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|librarian| (librarian.library, librarian))
        .collect();

    Ok(libraries
        .into_iter()
        .map(|library| LibraryResponse {
            books: shelves.remove(&library.id).unwrap_or_default(),
            librarian: librarians.remove(&library.id),
            id: library.id,
            name: library.name,
        })
        .collect())
}

pub async fn list_libraries(pool: &SqlitePool) -> sqlx::Result<Vec<LibraryResponse>> {
    let libraries = sqlx::query_as::<_, Library>("SELECT id, name FROM libraries ORDER BY name, id")
        .fetch_all(pool)
        .await?;
    assemble(pool, libraries, None).await
}

pub async fn get_library(pool: &SqlitePool, id: i64) -> sqlx::Result<LibraryResponse> {
    let library = sqlx::query_as::<_, Library>("SELECT id, name FROM libraries WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    let mut assembled = assemble(pool, vec![library], Some(id)).await?;
    assembled.pop().ok_or(sqlx::Error::RowNotFound)
}

pub async fn insert_library(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO libraries (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn rename_library(conn: &mut SqliteConnection, id: i64, name: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE libraries SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Replace the shelf of `library` with exactly `books`
pub async fn set_books(conn: &mut SqliteConnection, library: i64, books: &[i64]) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM library_books WHERE library_id = ?")
        .bind(library)
        .execute(&mut *conn)
        .await?;
    for book in books {
        shelve(&mut *conn, library, *book).await?;
    }
    Ok(())
}

/// Idempotent; returns true when the book was not shelved before
pub async fn shelve<'e, E>(executor: E, library: i64, book: i64) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO library_books (library_id, book_id) VALUES (?, ?) \
         ON CONFLICT (library_id, book_id) DO NOTHING",
    )
    .bind(library)
    .bind(book)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns false when the book was not on the shelf
pub async fn unshelve<'e, E>(executor: E, library: i64, book: i64) -> sqlx::Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM library_books WHERE library_id = ? AND book_id = ?")
        .bind(library)
        .bind(book)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_librarians(pool: &SqlitePool) -> sqlx::Result<Vec<Librarian>> {
    sqlx::query_as("SELECT id, name, library_id FROM librarians ORDER BY name, id")
        .fetch_all(pool)
        .await
}

pub async fn get_librarian(pool: &SqlitePool, id: i64) -> sqlx::Result<Librarian> {
    sqlx::query_as("SELECT id, name, library_id FROM librarians WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
}

/// Id of the librarian already assigned to `library`
pub async fn librarian_of(pool: &SqlitePool, library: i64) -> sqlx::Result<Option<i64>> {
    sqlx::query_scalar("SELECT id FROM librarians WHERE library_id = ?")
        .bind(library)
        .fetch_optional(pool)
        .await
}

pub async fn insert_librarian(pool: &SqlitePool, name: &str, library: i64) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO librarians (name, library_id) VALUES (?, ?)")
        .bind(name)
        .bind(library)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_librarian(
    pool: &SqlitePool,
    id: i64,
    name: Option<&str>,
    library: Option<i64>,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE librarians SET name = COALESCE(?, name), library_id = COALESCE(?, library_id) \
         WHERE id = ?",
    )
    .bind(name)
    .bind(library)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
