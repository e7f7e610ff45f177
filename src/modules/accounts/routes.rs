use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use folio_authz::{HasRoleOrReadOnly, IsAuthenticated, Role};
use folio_http::{
    guard::{self, Policies},
    ApiResult, AppError, CurrentUser, FieldErrors, PathParams, Payload,
};
use folio_kernel::AppState;

use super::models::{
    AuthResponse, LoginPayload, MessageResponse, NewAccount, ProfilePayload, PublicUserResponse,
    RegisterPayload, RolePayload, UserResponse,
};
use super::{create_account, repo};
use crate::utils::{require_text, validation_errors};

const ADMIN_ONLY: Policies = &[&IsAuthenticated, &HasRoleOrReadOnly(&[Role::Admin])];

const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route(
            "/profile",
            get(get_profile).put(update_profile).patch(update_profile),
        )
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/role", put(set_role))
        .route("/follow/{user_id}", post(follow))
        .route("/unfollow/{user_id}", post(unfollow))
        .with_state(state)
}

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterPayload>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let mut errors = validation_errors(&payload);
    require_text(&mut errors, "username", payload.username.as_deref(), true);
    require_text(&mut errors, "password", payload.password.as_deref(), true);
    if let Some(username) = payload.username.as_deref() {
        if !username.trim().is_empty() && !is_valid_username(username) {
            errors.add("username", INVALID_USERNAME);
        }
    }
    errors.into_result()?;

    let account = NewAccount {
        username: payload.username.as_deref().unwrap_or_default(),
        email: payload.email.as_deref().unwrap_or_default(),
        bio: payload.bio.as_deref().unwrap_or_default(),
        password: payload.password.as_deref().unwrap_or_default(),
        role: Role::Member,
    };
    let (user, token) = create_account(&state.db, account).await?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Payload(payload): Payload<LoginPayload>,
) -> ApiResult<Json<AuthResponse>> {
    let mut errors = FieldErrors::new();
    require_text(&mut errors, "username", payload.username.as_deref(), true);
    require_text(&mut errors, "password", payload.password.as_deref(), true);
    errors.into_result()?;

    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let principal = state
        .authenticator
        .authenticate_password(&username, &password)
        .await?
        .ok_or_else(|| {
            AppError::field("non_field_errors", "Unable to log in with provided credentials.")
        })?;

    let mut conn = state.db.pool().acquire().await?;
    let token = repo::get_or_create_token(&mut conn, principal.id).await?;
    let user = repo::get_user(&mut *conn, principal.id).await?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<UserResponse>> {
    let user = repo::get_user(state.db.pool(), caller.id).await?;
    Ok(Json(user.into()))
}

async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Payload(payload): Payload<ProfilePayload>,
) -> ApiResult<Json<UserResponse>> {
    validation_errors(&payload).into_result()?;

    repo::update_profile(
        state.db.pool(),
        caller.id,
        payload.email.as_deref(),
        payload.bio.as_deref(),
    )
    .await?;

    let user = repo::get_user(state.db.pool(), caller.id).await?;
    Ok(Json(user.into()))
}

async fn get_user(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Json<PublicUserResponse>> {
    let user = repo::get_user(state.db.pool(), id).await?;
    let (followers_count, following_count) = repo::follow_counts(state.db.pool(), id).await?;

    Ok(Json(PublicUserResponse {
        id: user.id,
        username: user.username,
        bio: user.bio,
        role: user.role,
        followers_count,
        following_count,
        date_joined: user.date_joined,
    }))
}

async fn set_role(
    State(state): State<AppState>,
    method: Method,
    CurrentUser(caller): CurrentUser,
    PathParams(id): PathParams<i64>,
    Payload(payload): Payload<RolePayload>,
) -> ApiResult<Json<UserResponse>> {
    guard::check_permissions(ADMIN_ONLY, &method, Some(&caller))?;

    let role = match payload.role.as_deref() {
        None => return Err(AppError::field("role", "This field is required.")),
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|_| AppError::field("role", format!("\"{raw}\" is not a valid choice.")))?,
    };

    if !repo::set_role(state.db.pool(), id, role).await? {
        return Err(AppError::not_found("No User matches the given query."));
    }

    tracing::info!(user_id = id, %role, changed_by = caller.id, "role changed");
    let user = repo::get_user(state.db.pool(), id).await?;
    Ok(Json(user.into()))
}

async fn follow(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    PathParams(user_id): PathParams<i64>,
) -> ApiResult<Json<MessageResponse>> {
    if user_id == caller.id {
        return Err(AppError::bad_request("You cannot follow yourself.").with_code("self_follow"));
    }
    let target = repo::get_user(state.db.pool(), user_id).await?;

    if !repo::follow(state.db.pool(), caller.id, target.id).await? {
        return Err(
            AppError::bad_request(format!("You are already following {}.", target.username))
                .with_code("already_following"),
        );
    }

    tracing::debug!(follower = caller.id, followee = target.id, "follow recorded");
    Ok(Json(MessageResponse::new(format!(
        "You are now following {}.",
        target.username
    ))))
}

async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    PathParams(user_id): PathParams<i64>,
) -> ApiResult<Json<MessageResponse>> {
    if user_id == caller.id {
        return Err(AppError::bad_request("You cannot unfollow yourself.").with_code("self_follow"));
    }
    let target = repo::get_user(state.db.pool(), user_id).await?;

    if !repo::unfollow(state.db.pool(), caller.id, target.id).await? {
        return Err(
            AppError::bad_request(format!("You are not following {}.", target.username))
                .with_code("not_following"),
        );
    }

    tracing::debug!(follower = caller.id, followee = target.id, "follow removed");
    Ok(Json(MessageResponse::new(format!(
        "You have unfollowed {}.",
        target.username
    ))))
}
