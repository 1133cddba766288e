use async_trait::async_trait;
use auth_core::Role;
use be_remote_db::DatabaseManager;
use uuid::Uuid;

use crate::AuthzError;

/// Resolves the stored role of a user. `Ok(None)` means the user row is missing.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn role_of(&self, user_id: Uuid) -> Result<Option<Role>, AuthzError>;
}

#[async_trait]
impl RoleDirectory for DatabaseManager {
    async fn role_of(&self, user_id: Uuid) -> Result<Option<Role>, AuthzError> {
        self.get_user_role(user_id)
            .await
            .map(|role| role.map(Role::from))
            .map_err(|e| AuthzError::Directory(e.to_string()))
    }
}
