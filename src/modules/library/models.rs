use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::modules::books::models::Book;

#[derive(Debug, Clone, FromRow)]
pub struct Library {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow, ToSchema)]
pub struct Librarian {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "library_id")]
    pub library: i64,
}

/// Library with its shelved books and librarian, if any
#[derive(Debug, Serialize, ToSchema)]
pub struct LibraryResponse {
    pub id: i64,
    pub name: String,
    pub books: Vec<Book>,
    pub librarian: Option<Librarian>,
}

/// `books`, when given, replaces the whole shelf
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LibraryPayload {
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub name: Option<String>,
    pub books: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LibrarianPayload {
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub name: Option<String>,
    pub library: Option<i64>,
}
