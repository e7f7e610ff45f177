use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use folio_authz::{HasRoleOrReadOnly, IsAuthenticatedOrReadOnly, Role};
use folio_http::{
    guard::{self, Policies},
    ApiResult, AppError, FieldErrors, MaybeUser, PathParams, Payload,
};
use folio_kernel::AppState;
use sqlx::SqlitePool;

use super::models::{Librarian, LibrarianPayload, LibraryPayload, LibraryResponse};
use super::repo;
use crate::utils::{delete_row, require_text, row_exists, validation_errors};

/// Catalogue staff only; reads stay open
const STAFF_WRITES: Policies = &[
    &IsAuthenticatedOrReadOnly,
    &HasRoleOrReadOnly(&[Role::Admin, Role::Librarian]),
];

const LIBRARIAN_TAKEN: &str = "librarian with this library already exists.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/libraries", get(list_libraries).post(create_library))
        .route(
            "/libraries/{id}",
            get(get_library)
                .put(update_library)
                .patch(update_library)
                .delete(delete_library),
        )
        .route(
            "/libraries/{id}/books/{book_id}",
            post(shelve_book).delete(unshelve_book),
        )
        .route("/librarians", get(list_librarians).post(create_librarian))
        .route(
            "/librarians/{id}",
            get(get_librarian)
                .put(update_librarian)
                .patch(update_librarian)
                .delete(delete_librarian),
        )
        .with_state(state)
}

/// Resolve the caller and apply the staff policy for this method
fn authorize(method: &Method, caller: &MaybeUser) -> ApiResult<i64> {
    guard::check_permissions(STAFF_WRITES, method, caller.0.as_ref())?;
    caller
        .0
        .as_ref()
        .map(|principal| principal.id)
        .ok_or_else(|| AppError::unauthorized("Authentication credentials were not provided."))
}

async fn validate_library(
    pool: &SqlitePool,
    payload: &LibraryPayload,
    partial: bool,
) -> ApiResult<()> {
    let mut errors = validation_errors(payload);
    require_text(&mut errors, "name", payload.name.as_deref(), !partial);

    for book in payload.books.iter().flatten() {
        if !row_exists(pool, "books", *book).await? {
            errors.add("books", format!("Invalid pk \"{book}\" - object does not exist."));
        }
    }

    errors.into_result()
}

async fn list_libraries(State(state): State<AppState>) -> ApiResult<Json<Vec<LibraryResponse>>> {
    Ok(Json(repo::list_libraries(state.db.pool()).await?))
}

async fn get_library(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<LibraryResponse>> {
    Ok(Json(repo::get_library(state.db.pool(), id).await?))
}

async fn create_library(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    Payload(payload): Payload<LibraryPayload>,
) -> ApiResult<(StatusCode, Json<LibraryResponse>)> {
    let caller = authorize(&method, &caller)?;
    let pool = state.db.pool();
    validate_library(pool, &payload, false).await?;

    let name = payload.name.as_deref().unwrap_or_default().trim();
    let mut tx = pool.begin().await?;
    let id = repo::insert_library(&mut tx, name).await?;
    if let Some(books) = payload.books.as_deref() {
        repo::set_books(&mut tx, id, books).await?;
    }
    tx.commit().await?;

    tracing::info!(library_id = id, created_by = caller, "library created");
    Ok((StatusCode::CREATED, Json(repo::get_library(pool, id).await?)))
}

async fn update_library(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    PathParams(id): PathParams<i64>,
    Payload(payload): Payload<LibraryPayload>,
) -> ApiResult<Json<LibraryResponse>> {
    let caller = authorize(&method, &caller)?;
    let pool = state.db.pool();
    repo::get_library(pool, id).await?;
    validate_library(pool, &payload, method == Method::PATCH).await?;

    let mut tx = pool.begin().await?;
    if let Some(name) = payload.name.as_deref() {
        repo::rename_library(&mut tx, id, name.trim()).await?;
    }
    match payload.books.as_deref() {
        Some(books) => repo::set_books(&mut tx, id, books).await?,
        // PUT without `books` empties the shelf
        None if method == Method::PUT => repo::set_books(&mut tx, id, &[]).await?,
        None => {}
    }
    tx.commit().await?;

    tracing::info!(library_id = id, updated_by = caller, %method, "library updated");
    Ok(Json(repo::get_library(pool, id).await?))
}

async fn delete_library(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    let caller = authorize(&method, &caller)?;
    delete_row(state.db.pool(), "libraries", id).await?;
    tracing::info!(library_id = id, deleted_by = caller, "library deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn shelve_book(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    PathParams((id, book)): PathParams<(i64, i64)>,
) -> ApiResult<Json<LibraryResponse>> {
    let caller = authorize(&method, &caller)?;
    let pool = state.db.pool();
    if !row_exists(pool, "libraries", id).await? || !row_exists(pool, "books", book).await? {
        return Err(AppError::not_found("Not found."));
    }

    if repo::shelve(pool, id, book).await? {
        tracing::info!(library_id = id, book_id = book, by = caller, "book shelved");
    }
    Ok(Json(repo::get_library(pool, id).await?))
}

async fn unshelve_book(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    PathParams((id, book)): PathParams<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let caller = authorize(&method, &caller)?;
    if !repo::unshelve(state.db.pool(), id, book).await? {
        return Err(AppError::not_found("This book is not in the library."));
    }
    tracing::info!(library_id = id, book_id = book, by = caller, "book removed from library");
    Ok(StatusCode::NO_CONTENT)
}

/// Field rules for librarians; `id` is the librarian being updated, if any
async fn validate_librarian(
    pool: &SqlitePool,
    payload: &LibrarianPayload,
    partial: bool,
    id: Option<i64>,
) -> ApiResult<()> {
    let mut errors = validation_errors(payload);
    require_text(&mut errors, "name", payload.name.as_deref(), !partial);
    errors.require("library", partial || payload.library.is_some());

    if let Some(library) = payload.library {
        if !row_exists(pool, "libraries", library).await? {
            errors.add(
                "library",
                format!("Invalid pk \"{library}\" - object does not exist."),
            );
        } else if let Some(existing) = repo::librarian_of(pool, library).await? {
            if Some(existing) != id {
                errors.add("library", LIBRARIAN_TAKEN);
            }
        }
    }

    errors.into_result()
}

/// A concurrent assignment can still trip the unique index
fn librarian_conflict(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            let mut errors = FieldErrors::new();
            errors.add("library", LIBRARIAN_TAKEN);
            AppError::validation(errors)
        }
        other => other.into(),
    }
}

async fn list_librarians(State(state): State<AppState>) -> ApiResult<Json<Vec<Librarian>>> {
    Ok(Json(repo::list_librarians(state.db.pool()).await?))
}

async fn get_librarian(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<Librarian>> {
    Ok(Json(repo::get_librarian(state.db.pool(), id).await?))
}

async fn create_librarian(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    Payload(payload): Payload<LibrarianPayload>,
) -> ApiResult<(StatusCode, Json<Librarian>)> {
    let caller = authorize(&method, &caller)?;
    let pool = state.db.pool();
    validate_librarian(pool, &payload, false, None).await?;

    let (Some(name), Some(library)) = (payload.name.as_deref(), payload.library) else {
        return Err(AppError::bad_request("Invalid input."));
    };
    let id = repo::insert_librarian(pool, name.trim(), library)
        .await
        .map_err(librarian_conflict)?;

    tracing::info!(librarian_id = id, library_id = library, created_by = caller, "librarian assigned");
    Ok((StatusCode::CREATED, Json(repo::get_librarian(pool, id).await?)))
}

async fn update_librarian(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    PathParams(id): PathParams<i64>,
    Payload(payload): Payload<LibrarianPayload>,
) -> ApiResult<Json<Librarian>> {
    let caller = authorize(&method, &caller)?;
    let pool = state.db.pool();
    repo::get_librarian(pool, id).await?;
    validate_librarian(pool, &payload, method == Method::PATCH, Some(id)).await?;

    repo::update_librarian(
        pool,
        id,
        payload.name.as_deref().map(str::trim),
        payload.library,
    )
    .await
    .map_err(librarian_conflict)?;

    tracing::info!(librarian_id = id, updated_by = caller, %method, "librarian updated");
    Ok(Json(repo::get_librarian(pool, id).await?))
}

async fn delete_librarian(
    State(state): State<AppState>,
    method: Method,
    caller: MaybeUser,
    PathParams(id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    let caller = authorize(&method, &caller)?;
    delete_row(state.db.pool(), "librarians", id).await?;
    tracing::info!(librarian_id = id, deleted_by = caller, "librarian removed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use folio_authz::Role;
    use serde_json::{json, Value};

    use crate::modules::books::repo as books;
    use crate::testing::TestApp;

    struct Shelf {
        hobbit: i64,
        thrones: i64,
    }

    async fn seed_books(app: &TestApp) -> Shelf {
        let pool = app.db.pool();
        let tolkien = books::insert_author(pool, "J.R.R. Tolkien").await.unwrap();
        let martin = books::insert_author(pool, "George R.R. Martin").await.unwrap();
        Shelf {
            hobbit: books::insert_book(pool, "The Hobbit", 1937, tolkien).await.unwrap(),
            thrones: books::insert_book(pool, "A Game of Thrones", 1996, martin)
                .await
                .unwrap(),
        }
    }

    fn book_titles(library: &Value) -> Vec<&str> {
        library["books"]
            .as_array()
            .unwrap()
            .iter()
            .map(|book| book["title"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn writes_need_a_staff_role() {
        let app = TestApp::new().await;
        let (_, member) = app.user("member").await;
        let (_, librarian) = app.user_with_role("shelver", Role::Librarian).await;
        let payload = json!({"name": "Central"});

        let (status, _) = app.post("/api/libraries", None, payload.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.post("/api/libraries", Some(&member), payload.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "permission_denied");

        let (status, body) = app.post("/api/libraries", Some(&librarian), payload).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "Central");
        assert_eq!(body["books"], json!([]));
        assert!(body["librarian"].is_null());

        let (status, body) = app.get("/api/libraries", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn library_nests_books_and_librarian() {
        let app = TestApp::new().await;
        let shelf = seed_books(&app).await;
        let (_, admin) = app.user_with_role("root", Role::Admin).await;

        let (status, library) = app
            .post(
                "/api/libraries",
                Some(&admin),
                json!({"name": "Central", "books": [shelf.hobbit, shelf.thrones]}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(book_titles(&library), vec!["A Game of Thrones", "The Hobbit"]);

        let (status, librarian) = app
            .post(
                "/api/librarians",
                Some(&admin),
                json!({"name": "Rupert", "library": library["id"]}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(librarian["library"], library["id"]);

        let (_, detail) = app
            .get(&format!("/api/libraries/{}", library["id"]), None)
            .await;
        assert_eq!(detail["librarian"]["name"], "Rupert");
        assert_eq!(detail["books"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn a_library_has_at_most_one_librarian() {
        let app = TestApp::new().await;
        let (_, admin) = app.user_with_role("root", Role::Admin).await;
        let (_, library) = app
            .post("/api/libraries", Some(&admin), json!({"name": "Central"}))
            .await;
        let (_, other) = app
            .post("/api/libraries", Some(&admin), json!({"name": "Branch"}))
            .await;

        let (status, first) = app
            .post("/api/librarians", Some(&admin), json!({"name": "Rupert", "library": library["id"]}))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app
            .post("/api/librarians", Some(&admin), json!({"name": "Evelyn", "library": library["id"]}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"]["details"]["library"][0],
            "librarian with this library already exists."
        );

        // Re-saving the same assignment is not a conflict
        let uri = format!("/api/librarians/{}", first["id"]);
        let (status, _) = app
            .request(Method::PATCH, &uri, Some(&admin), Some(json!({"library": library["id"]})))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, moved) = app
            .request(Method::PATCH, &uri, Some(&admin), Some(json!({"library": other["id"]})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["library"], other["id"]);
    }

    #[tokio::test]
    async fn shelving_books_one_at_a_time() {
        let app = TestApp::new().await;
        let shelf = seed_books(&app).await;
        let (_, librarian) = app.user_with_role("shelver", Role::Librarian).await;
        let (_, library) = app
            .post("/api/libraries", Some(&librarian), json!({"name": "Central"}))
            .await;
        let uri = format!("/api/libraries/{}/books/{}", library["id"], shelf.hobbit);

        let (status, body) = app.post(&uri, Some(&librarian), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(book_titles(&body), vec!["The Hobbit"]);

        let (status, body) = app.post(&uri, Some(&librarian), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["books"].as_array().unwrap().len(), 1);

        let (status, _) = app.delete(&uri, Some(&librarian)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.delete(&uri, Some(&librarian)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let missing = format!("/api/libraries/{}/books/999", library["id"]);
        let (status, _) = app.post(&missing, Some(&librarian), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_a_book_removes_it_from_libraries() {
        let app = TestApp::new().await;
        let shelf = seed_books(&app).await;
        let (_, admin) = app.user_with_role("root", Role::Admin).await;
        let (_, library) = app
            .post(
                "/api/libraries",
                Some(&admin),
                json!({"name": "Central", "books": [shelf.hobbit, shelf.thrones]}),
            )
            .await;

        let (status, _) = app
            .delete(&format!("/api/books/{}", shelf.thrones), Some(&admin))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, detail) = app
            .get(&format!("/api/libraries/{}", library["id"]), None)
            .await;
        assert_eq!(book_titles(&detail), vec!["The Hobbit"]);
    }

    #[tokio::test]
    async fn deleting_a_library_removes_its_librarian() {
        let app = TestApp::new().await;
        let (_, admin) = app.user_with_role("root", Role::Admin).await;
        let (_, library) = app
            .post("/api/libraries", Some(&admin), json!({"name": "Central"}))
            .await;
        let (_, librarian) = app
            .post("/api/librarians", Some(&admin), json!({"name": "Rupert", "library": library["id"]}))
            .await;

        let (status, _) = app
            .delete(&format!("/api/libraries/{}", library["id"]), Some(&admin))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app
            .get(&format!("/api/librarians/{}", librarian["id"]), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_replaces_and_validates_the_shelf() {
        let app = TestApp::new().await;
        let shelf = seed_books(&app).await;
        let (_, admin) = app.user_with_role("root", Role::Admin).await;
        let (_, library) = app
            .post(
                "/api/libraries",
                Some(&admin),
                json!({"name": "Central", "books": [shelf.hobbit]}),
            )
            .await;
        let uri = format!("/api/libraries/{}", library["id"]);

        let (status, body) = app
            .request(Method::PUT, &uri, Some(&admin), Some(json!({"name": "Central", "books": [77]})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["books"][0], "Invalid pk \"77\" - object does not exist.");

        let (status, body) = app
            .request(
                Method::PUT,
                &uri,
                Some(&admin),
                Some(json!({"name": "Main", "books": [shelf.thrones]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Main");
        assert_eq!(book_titles(&body), vec!["A Game of Thrones"]);

        let (status, body) = app
            .request(Method::PATCH, &uri, Some(&admin), Some(json!({"name": "Main Branch"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(book_titles(&body), vec!["A Game of Thrones"]);
    }
}
