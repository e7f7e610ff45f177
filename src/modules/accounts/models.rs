use folio_authz::{Principal, Role};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::{Validate, ValidateEmail, ValidationError};

/// Stored user joined with its profile
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub date_joined: OffsetDateTime,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Account creation request, before hashing
#[derive(Debug, Clone, Copy)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub bio: &'a str,
    pub password: &'a str,
    pub role: Role,
}

/// Values written when a user is created
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub bio: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterPayload {
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub username: Option<String>,
    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: Option<String>,
    #[validate(custom(function = "blank_or_email", message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginPayload {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Editable fields of the caller's own profile
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProfilePayload {
    #[validate(custom(function = "blank_or_email", message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(max = 500, message = "Ensure this field has no more than 500 characters."))]
    pub bio: Option<String>,
}

/// Email is optional; an empty string clears it
fn blank_or_email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.to_string().validate_email() {
        Ok(())
    } else {
        Err(ValidationError::new("email"))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RolePayload {
    pub role: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
    #[schema(value_type = String, example = "Member")]
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio,
            role: user.role,
            date_joined: user.date_joined,
        }
    }
}

/// Public view of a user, without contact details
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicUserResponse {
    pub id: i64,
    pub username: String,
    pub bio: String,
    #[schema(value_type = String, example = "Member")]
    pub role: Role,
    pub followers_count: i64,
    pub following_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
