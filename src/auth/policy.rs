//! Resource-level authorization
//! Checks that depend on who owns a record, not only on the caller's role

use crate::auth::{middleware::AuthError, models::AuthContext, models::Role};
use tracing::debug;

/// Records with an owning user.
pub trait Owned {
    fn owner_id(&self) -> &str;
}

/// Allow the owner of a resource or any caller holding one of `privileged` roles.
pub fn ensure_owner_or_role(
    ctx: &AuthContext,
    owner_id: &str,
    privileged: &[Role],
) -> Result<(), AuthError> {
    if ctx.subject == owner_id || privileged.contains(&ctx.role) {
        return Ok(());
    }

    debug!(
        subject = %ctx.subject,
        role = %ctx.role,
        owner = owner_id,
        "Caller is neither owner nor privileged"
    );
    Err(AuthError::Forbidden)
}

/// `ensure_owner_or_role` for anything implementing [`Owned`].
pub fn ensure_can_manage<T: Owned>(
    ctx: &AuthContext,
    resource: &T,
    privileged: &[Role],
) -> Result<(), AuthError> {
    ensure_owner_or_role(ctx, resource.owner_id(), privileged)
}
