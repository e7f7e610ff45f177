use std::collections::HashMap;

use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};

use super::models::{Author, AuthorResponse, Book, BookFilter};
use crate::utils::push_search;

const BOOK_COLUMNS: &str = "SELECT id, title, publication_year, author_id FROM books";

pub async fn list_books(pool: &SqlitePool, filter: BookFilter) -> sqlx::Result<Vec<Book>> {
    let mut qb = QueryBuilder::<Sqlite>::new(BOOK_COLUMNS);
    qb.push(" WHERE 1 = 1");
    if let Some(author) = filter.author {
        qb.push(" AND author_id = ").push_bind(author);
    }
    if let Some(year) = filter.publication_year {
        qb.push(" AND publication_year = ").push_bind(year);
    }
    push_search(&mut qb, &["title"], filter.search);
    qb.push(" ORDER BY ").push(filter.order_by);

    qb.build_query_as::<Book>().fetch_all(pool).await
}

pub async fn get_book<'e, E>(executor: E, id: i64) -> sqlx::Result<Book>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{BOOK_COLUMNS} WHERE id = ?");
    sqlx::query_as::<_, Book>(&sql)
        .bind(id)
        .fetch_one(executor)
        .await
}

pub async fn insert_book(
    pool: &SqlitePool,
    title: &str,
    publication_year: i32,
    author: i64,
) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO books (title, publication_year, author_id) VALUES (?, ?, ?)")
        .bind(title)
        .bind(publication_year)
        .bind(author)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Overwrite the given fields; `None` keeps the stored value
pub async fn update_book(
    pool: &SqlitePool,
    id: i64,
    title: Option<&str>,
    publication_year: Option<i32>,
    author: Option<i64>,
) -> sqlx::Result<()> {
    let result = sqlx::query(
        "UPDATE books SET \
            title = COALESCE(?, title), \
            publication_year = COALESCE(?, publication_year), \
            author_id = COALESCE(?, author_id) \
         WHERE id = ?",
    )
    .bind(title)
    .bind(publication_year)
    .bind(author)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

pub async fn list_authors(pool: &SqlitePool) -> sqlx::Result<Vec<AuthorResponse>> {
    let authors = sqlx::query_as::<_, Author>("SELECT id, name FROM authors ORDER BY name, id")
        .fetch_all(pool)
        .await?;
    let books = sqlx::query_as::<_, Book>(&format!(
        "{BOOK_COLUMNS} ORDER BY publication_year DESC, title, id"
    ))
    .fetch_all(pool)
    .await?;

    let mut by_author: HashMap<i64, Vec<Book>> = HashMap::new();
    for book in books {
        by_author.entry(book.author).or_default().push(book);
    }

    Ok(authors
        .into_iter()
        .map(|author| AuthorResponse {
            books: by_author.remove(&author.id).unwrap_or_default(),
            id: author.id,
            name: author.name,
        })
        .collect())
}

pub async fn get_author(pool: &SqlitePool, id: i64) -> sqlx::Result<AuthorResponse> {
    let author = sqlx::query_as::<_, Author>("SELECT id, name FROM authors WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    let books = sqlx::query_as::<_, Book>(&format!(
        "{BOOK_COLUMNS} WHERE author_id = ? ORDER BY publication_year DESC, title, id"
    ))
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(AuthorResponse {
        id: author.id,
        name: author.name,
        books,
    })
}

pub async fn insert_author(pool: &SqlitePool, name: &str) -> sqlx::Result<i64> {
    let result = sqlx::query("INSERT INTO authors (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

pub async fn rename_author(pool: &SqlitePool, id: i64, name: &str) -> sqlx::Result<()> {
    let result = sqlx::query("UPDATE authors SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}
