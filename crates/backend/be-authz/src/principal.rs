use auth_core::Role;
use uuid::Uuid;

use crate::AuthzError;

/// An authenticated caller with the role stored for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The single authorization check. An empty `allowed` list admits any role.
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.is_empty() || allowed.contains(&principal.role) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %principal.user_id,
            role = %principal.role,
            "Authorization denied"
        );
        Err(AuthzError::Forbidden)
    }
}
