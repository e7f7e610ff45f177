use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use folio_authz::AllowAny;
use folio_http::{
    extract::parse_optional_id,
    guard::{self, Policies},
    ApiResult, AppError, CurrentUser, FieldErrors, MaybeUser, PathParams, Payload, QueryParams,
};
use folio_kernel::AppState;
use sqlx::SqlitePool;

use super::models::{
    validate_publication_year, AuthorPayload, AuthorResponse, Book, BookFilter, BookListQuery,
    BookPayload,
};
use super::repo;
use crate::utils::{
    current_year, delete_row, order_by, require_text, row_exists, search_terms, validation_errors,
};

const CATALOGUE_READS: Policies = &[&AllowAny];

const BOOK_ORDERING: &[(&str, &str)] = &[
    ("title", "title"),
    ("publication_year", "publication_year"),
];

const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/create", post(create_book))
        .route(
            "/books/{id}",
            get(get_book)
                .put(update_book)
                .patch(update_book)
                .delete(delete_book),
        )
        .route("/books/{id}/update", put(update_book).patch(update_book))
        .route("/books/{id}/delete", delete(delete_book))
        .route("/authors", get(list_authors).post(create_author))
        .route(
            "/authors/{id}",
            get(get_author)
                .put(update_author)
                .patch(update_author)
                .delete(delete_author),
        )
        .with_state(state)
}

/// Turn raw query values into filters, rejecting unknown authors
async fn book_filter(pool: &SqlitePool, query: BookListQuery) -> ApiResult<BookFilter> {
    let mut errors = FieldErrors::new();

    let author = match parse_optional_id(query.author.as_deref()) {
        Ok(author) => author,
        Err(_) => {
            errors.add("author", INVALID_CHOICE);
            None
        }
    };
    if let Some(author) = author {
        if !row_exists(pool, "authors", author).await? {
            errors.add("author", INVALID_CHOICE);
        }
    }

    let publication_year = match parse_optional_id(query.publication_year.as_deref()) {
        Ok(None) => None,
        Ok(Some(year)) => match i32::try_from(year) {
            Ok(year) => Some(year),
            Err(_) => {
                errors.add("publication_year", "Enter a number.");
                None
            }
        },
        Err(message) => {
            errors.add("publication_year", message);
            None
        }
    };

    errors.into_result()?;
    Ok(BookFilter {
        author,
        publication_year,
        search: search_terms(query.search.as_deref()),
        order_by: order_by(
            query.ordering.as_deref(),
            BOOK_ORDERING,
            "-publication_year",
            "id ASC",
        ),
    })
}

/// Field rules shared by create, PUT and PATCH
async fn validate_book(pool: &SqlitePool, payload: &BookPayload, partial: bool) -> ApiResult<()> {
    let mut errors = validation_errors(payload);
    require_text(&mut errors, "title", payload.title.as_deref(), !partial);
    errors.require("publication_year", partial || payload.publication_year.is_some());
    errors.require("author", partial || payload.author.is_some());

    if let Some(year) = payload.publication_year {
        if let Err(message) = validate_publication_year(year, current_year()) {
            errors.add("publication_year", message);
        }
    }
    if let Some(author) = payload.author {
        if !row_exists(pool, "authors", author).await? {
            errors.add(
                "author",
                format!("Invalid pk \"{author}\" - object does not exist."),
            );
        }
    }

    errors.into_result()
}

async fn list_books(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    QueryParams(query): QueryParams<BookListQuery>,
) -> ApiResult<Json<Vec<Book>>> {
    guard::check_permissions(CATALOGUE_READS, &method, caller.0.as_ref())?;
    let filter = book_filter(state.db.pool(), query).await?;
    Ok(Json(repo::list_books(state.db.pool(), filter).await?))
}

async fn get_book(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<Book>> {
    guard::check_permissions(CATALOGUE_READS, &method, caller.0.as_ref())?;
    Ok(Json(repo::get_book(state.db.pool(), id).await?))
}

async fn create_book(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(payload): Payload<BookPayload>,
) -> ApiResult<(StatusCode, Json<Book>)> {
    let pool = state.db.pool();
    validate_book(pool, &payload, false).await?;

    let (Some(title), Some(publication_year), Some(author)) =
        (payload.title.as_deref(), payload.publication_year, payload.author)
    else {
        return Err(AppError::bad_request("Invalid input."));
    };
    let id = repo::insert_book(pool, title.trim(), publication_year, author).await?;

    tracing::info!(book_id = id, created_by = caller.id, "book created");
    Ok((StatusCode::CREATED, Json(repo::get_book(pool, id).await?)))
}

async fn update_book(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
    Payload(payload): Payload<BookPayload>,
) -> ApiResult<Json<Book>> {
    let pool = state.db.pool();
    repo::get_book(pool, id).await?;
    validate_book(pool, &payload, method == Method::PATCH).await?;

    repo::update_book(
        pool,
        id,
        payload.title.as_deref().map(str::trim),
        payload.publication_year,
        payload.author,
    )
    .await?;

    tracing::info!(book_id = id, updated_by = caller.id, %method, "book updated");
    Ok(Json(repo::get_book(pool, id).await?))
}

async fn delete_book(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    delete_row(state.db.pool(), "books", id).await?;
    tracing::info!(book_id = id, deleted_by = caller.id, "book deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_authors(State(state): State<AppState>) -> ApiResult<Json<Vec<AuthorResponse>>> {
    Ok(Json(repo::list_authors(state.db.pool()).await?))
}

async fn get_author(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<AuthorResponse>> {
    Ok(Json(repo::get_author(state.db.pool(), id).await?))
}

fn validate_author(payload: &AuthorPayload, partial: bool) -> ApiResult<()> {
    let mut errors = validation_errors(payload);
    require_text(&mut errors, "name", payload.name.as_deref(), !partial);
    errors.into_result()
}

async fn create_author(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(payload): Payload<AuthorPayload>,
) -> ApiResult<(StatusCode, Json<AuthorResponse>)> {
    validate_author(&payload, false)?;
    let name = payload.name.as_deref().unwrap_or_default().trim();

    let pool = state.db.pool();
    let id = repo::insert_author(pool, name).await?;
    tracing::info!(author_id = id, created_by = caller.id, "author created");
    Ok((StatusCode::CREATED, Json(repo::get_author(pool, id).await?)))
}

async fn update_author(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(_caller): CurrentUser,
    PathParams(id): PathParams<i64>,
    Payload(payload): Payload<AuthorPayload>,
) -> ApiResult<Json<AuthorResponse>> {
    let pool = state.db.pool();
    repo::get_author(pool, id).await?;
    validate_author(&payload, method == Method::PATCH)?;

    if let Some(name) = payload.name.as_deref() {
        repo::rename_author(pool, id, name.trim()).await?;
    }
    Ok(Json(repo::get_author(pool, id).await?))
}

async fn delete_author(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    delete_row(state.db.pool(), "authors", id).await?;
    tracing::info!(author_id = id, deleted_by = caller.id, "author and their books deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::modules::books::repo;
    use crate::testing::TestApp;
    use crate::utils::current_year;

    struct Catalogue {
        rowling: i64,
        martin: i64,
        tolkien: i64,
    }

    /// Three authors, four books
    async fn seed(app: &TestApp) -> Catalogue {
        let pool = app.db.pool();
        let rowling = repo::insert_author(pool, "J.K. Rowling").await.unwrap();
        let martin = repo::insert_author(pool, "George R.R. Martin").await.unwrap();
        let tolkien = repo::insert_author(pool, "J.R.R. Tolkien").await.unwrap();

        for (title, year, author) in [
            ("Harry Potter and the Philosopher's Stone", 1997, rowling),
            ("Harry Potter and the Chamber of Secrets", 1998, rowling),
            ("A Game of Thrones", 1996, martin),
            ("The Hobbit", 1937, tolkien),
        ] {
            repo::insert_book(pool, title, year, author).await.unwrap();
        }

        Catalogue {
            rowling,
            martin,
            tolkien,
        }
    }

    fn titles(body: &Value) -> Vec<&str> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|book| book["title"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn list_is_open_and_newest_first() {
        let app = TestApp::new().await;
        seed(&app).await;

        let (status, body) = app.get("/api/books", None).await;
        assert_eq!(status, StatusCode::OK);
        let years: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|book| book["publication_year"].as_i64().unwrap())
            .collect();
        assert_eq!(years, vec![1998, 1997, 1996, 1937]);
    }

    #[tokio::test]
    async fn reads_are_open_but_check_presented_tokens() {
        let app = TestApp::new().await;
        seed(&app).await;
        let (_, token) = app.user("reader").await;

        let (status, _) = app.get("/api/books/1", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.get("/api/books", Some("not-a-real-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid token.");
    }

    #[tokio::test]
    async fn ordering_by_title_and_unknown_fields() {
        let app = TestApp::new().await;
        seed(&app).await;

        let (_, body) = app.get("/api/books?ordering=title", None).await;
        assert_eq!(
            titles(&body),
            vec![
                "A Game of Thrones",
                "Harry Potter and the Chamber of Secrets",
                "Harry Potter and the Philosopher's Stone",
                "The Hobbit",
            ]
        );

        let (_, body) = app.get("/api/books?ordering=publication_year", None).await;
        assert_eq!(titles(&body)[0], "The Hobbit");

        let (status, body) = app.get("/api/books?ordering=isbn", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(titles(&body)[0], "Harry Potter and the Chamber of Secrets");
    }

    #[tokio::test]
    async fn filters_by_author_and_year() {
        let app = TestApp::new().await;
        let catalogue = seed(&app).await;

        let (status, body) = app
            .get(&format!("/api/books?author={}", catalogue.rowling), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let books = body.as_array().unwrap();
        assert_eq!(books.len(), 2);
        assert!(books.iter().all(|book| book["author"] == catalogue.rowling));

        let (_, body) = app.get("/api/books?publication_year=1937", None).await;
        assert_eq!(titles(&body), vec!["The Hobbit"]);

        let (_, body) = app
            .get(
                &format!("/api/books?author={}&publication_year=1937", catalogue.martin),
                None,
            )
            .await;
        assert!(body.as_array().unwrap().is_empty());

        let (status, body) = app.get("/api/books?author=9999", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["author"].is_array());

        let (status, body) = app.get("/api/books?publication_year=recent", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["publication_year"][0], "Enter a number.");
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let app = TestApp::new().await;
        seed(&app).await;

        let (_, body) = app.get("/api/books?search=harry", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (_, body) = app.get("/api/books?search=HOBBIT", None).await;
        assert_eq!(titles(&body), vec!["The Hobbit"]);

        let (_, body) = app.get("/api/books?search=potter%20secrets", None).await;
        assert_eq!(titles(&body), vec!["Harry Potter and the Chamber of Secrets"]);

        let (_, body) = app.get("/api/books?search=", None).await;
        assert_eq!(body.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn search_keeps_non_ascii_titles_findable() {
        let app = TestApp::new().await;
        let catalogue = seed(&app).await;
        let pool = app.db.pool();
        repo::insert_book(pool, "École des femmes", 1662, catalogue.martin)
            .await
            .unwrap();
        repo::insert_book(pool, "ÜBER ALLES", 1841, catalogue.martin)
            .await
            .unwrap();

        // É
        let (_, body) = app.get("/api/books?search=%C3%89cole", None).await;
        assert_eq!(titles(&body), vec!["École des femmes"]);
        let (_, body) = app.get("/api/books?search=%C3%89cOLE", None).await;
        assert_eq!(titles(&body), vec!["École des femmes"]);
        // Ü
        let (_, body) = app.get("/api/books?search=%C3%9CBER", None).await;
        assert_eq!(titles(&body), vec!["ÜBER ALLES"]);
        let (_, body) = app.get("/api/books?search=%C3%9Cber%20alles", None).await;
        assert_eq!(titles(&body), vec!["ÜBER ALLES"]);
    }

    #[tokio::test]
    async fn create_requires_authentication() {
        let app = TestApp::new().await;
        let catalogue = seed(&app).await;
        let payload = json!({"title": "Silmarillion", "publication_year": 1977, "author": catalogue.tolkien});

        let (status, _) = app.post("/api/books", None, payload.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, body) = app.get("/api/books", None).await;
        assert_eq!(body.as_array().unwrap().len(), 4);

        let (_, token) = app.user("reader").await;
        let (status, body) = app.post("/api/books/create", Some(&token), payload).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "Silmarillion");
        assert_eq!(body["author"], catalogue.tolkien);
    }

    #[tokio::test]
    async fn future_publication_year_is_rejected() {
        let app = TestApp::new().await;
        let catalogue = seed(&app).await;
        let (_, token) = app.user("reader").await;
        let next_year = current_year() + 1;

        let (status, body) = app
            .post(
                "/api/books",
                Some(&token),
                json!({"title": "Tomorrow", "publication_year": next_year, "author": catalogue.martin}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["error"]["details"]["publication_year"][0].as_str().unwrap();
        assert!(message.starts_with("Publication year cannot be in the future."));

        let (status, _) = app
            .request(
                Method::PATCH,
                "/api/books/1",
                Some(&token),
                Some(json!({"publication_year": next_year})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .post(
                "/api/books",
                Some(&token),
                json!({"title": "This year", "publication_year": current_year(), "author": catalogue.martin}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_reports_missing_and_unknown_fields() {
        let app = TestApp::new().await;
        let (_, token) = app.user("reader").await;

        let (status, body) = app
            .post("/api/books", Some(&token), json!({"title": "", "author": 42}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let details = &body["error"]["details"];
        assert_eq!(details["title"][0], "This field may not be blank.");
        assert_eq!(details["publication_year"][0], "This field is required.");
        assert_eq!(details["author"][0], "Invalid pk \"42\" - object does not exist.");
    }

    #[tokio::test]
    async fn put_is_full_and_patch_is_partial() {
        let app = TestApp::new().await;
        let catalogue = seed(&app).await;
        let (_, token) = app.user("editor").await;

        let (status, body) = app
            .request(
                Method::PUT,
                "/api/books/4",
                Some(&token),
                Some(json!({"title": "The Hobbit, or There and Back Again"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["details"]["author"].is_array());

        let (status, body) = app
            .request(
                Method::PATCH,
                "/api/books/4/update",
                Some(&token),
                Some(json!({"title": "The Hobbit, or There and Back Again"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "The Hobbit, or There and Back Again");
        assert_eq!(body["publication_year"], 1937);
        assert_eq!(body["author"], catalogue.tolkien);

        let (status, _) = app
            .request(
                Method::PUT,
                "/api/books/4",
                Some(&token),
                Some(json!({"title": "The Hobbit", "publication_year": 1938, "author": catalogue.tolkien})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .request(Method::PATCH, "/api/books/404", Some(&token), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn anonymous_updates_are_rejected() {
        let app = TestApp::new().await;
        let catalogue = seed(&app).await;
        let full = json!({"title": "Defaced", "publication_year": 2001, "author": catalogue.martin});
        let partial = json!({"title": "Defaced"});

        for (method, uri, payload) in [
            (Method::PUT, "/api/books/4", &full),
            (Method::PATCH, "/api/books/4", &partial),
            (Method::PUT, "/api/books/4/update", &full),
            (Method::PATCH, "/api/books/4/update", &partial),
        ] {
            let (status, _) = app.request(method, uri, None, Some(payload.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }

        let (status, body) = app.get("/api/books/4", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "The Hobbit");
        assert_eq!(body["publication_year"], 1937);
        assert_eq!(body["author"], catalogue.tolkien);
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let app = TestApp::new().await;
        seed(&app).await;
        let (_, token) = app.user("editor").await;

        let (status, _) = app.delete("/api/books/1", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.delete("/api/books/1", Some(&token)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (status, _) = app.delete("/api/books/1/delete", Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app.get("/api/books/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn authors_nest_their_books() {
        let app = TestApp::new().await;
        let catalogue = seed(&app).await;

        let (status, body) = app.get("/api/authors", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|author| author["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["George R.R. Martin", "J.K. Rowling", "J.R.R. Tolkien"]);

        let (_, rowling) = app
            .get(&format!("/api/authors/{}", catalogue.rowling), None)
            .await;
        assert_eq!(rowling["books"].as_array().unwrap().len(), 2);
        assert_eq!(rowling["books"][0]["publication_year"], 1998);
    }

    #[tokio::test]
    async fn deleting_an_author_removes_their_books() {
        let app = TestApp::new().await;
        let catalogue = seed(&app).await;
        let (_, token) = app.user("editor").await;

        let (status, _) = app
            .delete(&format!("/api/authors/{}", catalogue.rowling), Some(&token))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = app.get("/api/books", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn author_writes_are_validated() {
        let app = TestApp::new().await;
        let (_, token) = app.user("editor").await;

        let (status, _) = app.post("/api/authors", None, json!({"name": "Ursula"})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .post("/api/authors", Some(&token), json!({"name": "x".repeat(101)}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"]["details"]["name"][0],
            "Ensure this field has no more than 100 characters."
        );

        let (status, body) = app
            .post("/api/authors", Some(&token), json!({"name": "Ursula K. Le Guin"}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["books"], json!([]));

        let uri = format!("/api/authors/{}", body["id"]);
        let (status, body) = app
            .request(Method::PATCH, &uri, Some(&token), Some(json!({"name": "Ursula Le Guin"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ursula Le Guin");
    }
}
