//! Evaluation of permission policies inside handlers.

use axum::http::Method;
use folio_authz::{Permission, PermissionContext, Principal, UserId};

use crate::error::AppError;

/// Policy list evaluated with AND semantics
pub type Policies = &'static [&'static dyn Permission];

const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

/// View-level check: 401 for anonymous callers, 403 otherwise
pub fn check_permissions(
    policies: Policies,
    method: &Method,
    principal: Option<&Principal>,
) -> Result<(), AppError> {
    let ctx = PermissionContext::new(method, principal);
    if policies.iter().all(|p| p.has_permission(&ctx)) {
        return Ok(());
    }

    tracing::debug!(%method, authenticated = principal.is_some(), "permission denied");
    Err(match principal {
        None => AppError::unauthorized(NOT_AUTHENTICATED),
        Some(_) => AppError::forbidden(PERMISSION_DENIED),
    })
}

/// Object-level check against the object's owner; always 403 on denial
pub fn check_object_permissions(
    policies: Policies,
    method: &Method,
    principal: Option<&Principal>,
    owner: UserId,
) -> Result<(), AppError> {
    let ctx = PermissionContext::new(method, principal);
    if policies.iter().all(|p| p.has_object_permission(&ctx, owner)) {
        return Ok(());
    }

    tracing::debug!(%method, owner, "object permission denied");
    Err(AppError::forbidden(PERMISSION_DENIED))
}
