use std::sync::Arc;

use anyhow::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use shared::{
    access::{can_assign_role, can_edit_or_delete, creatable_roles},
    domain::{Role, User, UserId},
    protocol::{NewUserRequest, UserEnvelope, UserUpdateRequest},
    views::{search_users, visible_users, RoleCounts},
};
use tokio::sync::Mutex;
use tracing::info;

use crate::{api::ApiClient, error::ValidationError, events::Notifier, inflight::InflightRegistry};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl NewUser {
    pub fn into_request(self) -> Result<NewUserRequest, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::Missing { field: "name" });
        }
        let email = self.email.trim().to_string();
        if email.is_empty() {
            return Err(ValidationError::Missing { field: "email" });
        }
        if !looks_like_email(&email) {
            return Err(ValidationError::InvalidEmail(email));
        }
        if self.password.is_empty() {
            return Err(ValidationError::Missing { field: "password" });
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        if !creatable_roles().contains(&self.role) {
            return Err(ValidationError::RoleNotCreatable(self.role));
        }
        Ok(NewUserRequest {
            name,
            email,
            password: self.password,
            role: self.role,
        })
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub struct UserStore {
    api: Arc<ApiClient>,
    notifier: Notifier,
    inflight: InflightRegistry,
    users: Mutex<Vec<User>>,
}

impl UserStore {
    pub fn new(api: Arc<ApiClient>, notifier: Notifier) -> Self {
        Self {
            api,
            notifier,
            inflight: InflightRegistry::default(),
            users: Mutex::new(Vec::new()),
        }
    }

    pub async fn all(&self) -> Vec<User> {
        self.users.lock().await.clone()
    }

    pub async fn get(&self, user_id: &UserId) -> Option<User> {
        self.users
            .lock()
            .await
            .iter()
            .find(|user| &user.id == user_id)
            .cloned()
    }

    pub async fn staff(&self) -> Vec<User> {
        self.users
            .lock()
            .await
            .iter()
            .filter(|user| user.role == Role::Staff)
            .cloned()
            .collect()
    }

    pub async fn visible(&self) -> Vec<User> {
        visible_users(&self.users.lock().await)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn search(&self, term: &str) -> Vec<User> {
        search_users(&self.users.lock().await, term)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn role_counts(&self) -> RoleCounts {
        RoleCounts::compute(&self.users.lock().await)
    }

    pub async fn clear(&self) {
        self.users.lock().await.clear();
    }

    pub async fn refresh(&self) -> Result<Vec<User>> {
        let result: Result<Vec<User>> = async {
            let users: Vec<User> = self.api.get(&["user", "all"]).await?;
            *self.users.lock().await = users.clone();
            info!(count = users.len(), "user: list refreshed");
            Ok(users)
        }
        .await;
        self.notifier.report(result, "", "Failed to fetch users")
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let result: Result<User> = async {
            let request = new_user.into_request()?;
            let _guard = self.inflight.begin("user:create")?;
            let envelope: UserEnvelope = self
                .api
                .send(Method::POST, &["user", "create"], &request)
                .await?;
            self.users.lock().await.push(envelope.user.clone());
            info!(user_id = %envelope.user.id, role = %envelope.user.role, "user: created");
            Ok(envelope.user)
        }
        .await;
        self.notifier
            .report(result, "User created successfully", "Failed to create user")
    }

    pub async fn update_user(&self, user_id: &UserId, changes: UserUpdateRequest) -> Result<User> {
        let result = self.send_update(user_id, changes).await;
        self.notifier
            .report(result, "User updated successfully", "Failed to update user")
    }

    pub async fn change_role(&self, actor: Role, user_id: &UserId, role: Role) -> Result<User> {
        let result: Result<User> = async {
            let target = self
                .get(user_id)
                .await
                .ok_or_else(|| ValidationError::UnknownUser(user_id.clone()))?;
            if !can_assign_role(actor, target.role, role) {
                return Err(ValidationError::RoleChangeNotPermitted {
                    actor,
                    target: target.role,
                    requested: role,
                }
                .into());
            }
            let changes = UserUpdateRequest {
                role: Some(role),
                ..UserUpdateRequest::default()
            };
            self.send_update(user_id, changes).await
        }
        .await;
        self.notifier
            .report(result, "Role updated successfully", "Failed to update role")
    }

    /// Deletes an account. Removing one's own account is always offered;
    /// anyone else is subject to the role gating.
    pub async fn remove(&self, actor: &User, user_id: &UserId) -> Result<()> {
        let result: Result<()> = async {
            if &actor.id != user_id {
                let target = self
                    .get(user_id)
                    .await
                    .ok_or_else(|| ValidationError::UnknownUser(user_id.clone()))?;
                if !can_edit_or_delete(actor.role, target.role) {
                    return Err(ValidationError::RemovalNotPermitted {
                        actor: actor.role,
                        target: target.role,
                    }
                    .into());
                }
            }
            let _guard = self.inflight.begin(format!("user:delete:{user_id}"))?;
            self.api.delete(&["user", user_id.as_str()]).await?;
            self.users.lock().await.retain(|user| &user.id != user_id);
            info!(%user_id, "user: deleted");
            Ok(())
        }
        .await;
        self.notifier
            .report(result, "User deleted successfully", "Failed to delete user")
    }

    async fn send_update(&self, user_id: &UserId, changes: UserUpdateRequest) -> Result<User> {
        let _guard = self.inflight.begin(format!("user:update:{user_id}"))?;
        let envelope: UserEnvelope = self
            .api
            .send(Method::PUT, &["user", user_id.as_str()], &changes)
            .await?;
        let mut users = self.users.lock().await;
        if let Some(existing) = users.iter_mut().find(|user| &user.id == user_id) {
            *existing = envelope.user.clone();
        }
        info!(%user_id, "user: updated");
        Ok(envelope.user)
    }
}

#[cfg(test)]
#[path = "tests/user_store_tests.rs"]
mod tests;
