//! Authentication seams and declarative permission policies for Folio.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod authenticator;
pub mod credentials;
pub mod permissions;

pub use authenticator::Authenticator;
pub use credentials::{Credentials, CredentialsError};
pub use permissions::{
    AllowAny, HasRoleOrReadOnly, IsAuthenticated, IsAuthenticatedOrReadOnly, IsAuthorOrReadOnly,
    Permission, PermissionContext,
};

pub type UserId = i64;

/// Role carried by every user profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Librarian,
    #[default]
    Member,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Librarian => "Librarian",
            Role::Member => "Member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role '{0}'; expected Admin, Librarian or Member")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" | "admin" => Ok(Role::Admin),
            "Librarian" | "librarian" => Ok(Role::Librarian),
            "Member" | "member" => Ok(Role::Member),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}
