//! Permission policies evaluated before a handler touches the database.
//!
//! A policy answers two questions: may this caller use this method on the
//! resource at all (`has_permission`), and may they act on one particular
//! object owned by `owner` (`has_object_permission`). Views list the policies
//! that apply; all of them must agree.

use http::Method;

use crate::{Principal, Role, UserId};

/// Inputs available to a permission check
#[derive(Debug, Clone, Copy)]
pub struct PermissionContext<'a> {
    pub method: &'a Method,
    pub principal: Option<&'a Principal>,
}

impl<'a> PermissionContext<'a> {
    pub fn new(method: &'a Method, principal: Option<&'a Principal>) -> Self {
        Self { method, principal }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// GET, HEAD and OPTIONS never mutate state
    pub fn is_safe_method(&self) -> bool {
        *self.method == Method::GET || *self.method == Method::HEAD || *self.method == Method::OPTIONS
    }
}

pub trait Permission: Send + Sync {
    fn has_permission(&self, ctx: &PermissionContext<'_>) -> bool;

    fn has_object_permission(&self, _ctx: &PermissionContext<'_>, _owner: UserId) -> bool {
        true
    }
}

/// Allow every request
pub struct AllowAny;

impl Permission for AllowAny {
    fn has_permission(&self, _ctx: &PermissionContext<'_>) -> bool {
        true
    }
}

/// Require an authenticated caller for every method
pub struct IsAuthenticated;

impl Permission for IsAuthenticated {
    fn has_permission(&self, ctx: &PermissionContext<'_>) -> bool {
        ctx.is_authenticated()
    }
}

/// Reads are open, writes need an authenticated caller
pub struct IsAuthenticatedOrReadOnly;

impl Permission for IsAuthenticatedOrReadOnly {
    fn has_permission(&self, ctx: &PermissionContext<'_>) -> bool {
        ctx.is_safe_method() || ctx.is_authenticated()
    }
}

/// Object-level check: only the author of an object may mutate it
pub struct IsAuthorOrReadOnly;

impl Permission for IsAuthorOrReadOnly {
    fn has_permission(&self, _ctx: &PermissionContext<'_>) -> bool {
        true
    }

    fn has_object_permission(&self, ctx: &PermissionContext<'_>, owner: UserId) -> bool {
        if ctx.is_safe_method() {
            return true;
        }
        ctx.principal.is_some_and(|p| p.id == owner)
    }
}

/// Reads are open, writes need one of the listed roles
pub struct HasRoleOrReadOnly(pub &'static [Role]);

impl Permission for HasRoleOrReadOnly {
    fn has_permission(&self, ctx: &PermissionContext<'_>) -> bool {
        if ctx.is_safe_method() {
            return true;
        }
        ctx.principal.is_some_and(|p| self.0.contains(&p.role))
    }
}
