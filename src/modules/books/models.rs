use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// A published book; `author` is the author's id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub publication_year: i32,
    #[sqlx(rename = "author_id")]
    pub author: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

/// Author with every book they wrote
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorResponse {
    pub id: i64,
    pub name: String,
    pub books: Vec<Book>,
}

/// Create/update body for books. Fields are optional so PATCH can omit them;
/// PUT and POST enforce presence separately.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BookPayload {
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub title: Option<String>,
    pub publication_year: Option<i32>,
    pub author: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AuthorPayload {
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub name: Option<String>,
}

/// Raw `?author=&publication_year=&search=&ordering=` values
#[derive(Debug, Default, Deserialize)]
pub struct BookListQuery {
    pub author: Option<String>,
    pub publication_year: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// Validated list filters
#[derive(Debug, Default)]
pub struct BookFilter {
    pub author: Option<i64>,
    pub publication_year: Option<i32>,
    pub search: Vec<String>,
    pub order_by: String,
}

/// Publication year may not be later than `current_year`
pub fn validate_publication_year(year: i32, current_year: i32) -> Result<(), String> {
    if year > current_year {
        return Err(format!(
            "Publication year cannot be in the future. Current year is {current_year}, but got {year}."
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_years_are_rejected() {
        assert!(validate_publication_year(2024, 2025).is_ok());
        assert!(validate_publication_year(2025, 2025).is_ok());
        assert_eq!(
            validate_publication_year(2026, 2025).unwrap_err(),
            "Publication year cannot be in the future. Current year is 2025, but got 2026."
        );
    }

    #[test]
    fn book_serializes_author_as_id() {
        let book = Book {
            id: 1,
            title: "Dune".into(),
            publication_year: 1965,
            author: 3,
        };
        assert_eq!(
            serde_json::to_value(book).unwrap(),
            serde_json::json!({"id": 1, "title": "Dune", "publication_year": 1965, "author": 3})
        );
    }
}
