use std::sync::Arc;

use anyhow::Result;
use reqwest::Method;
use shared::{
    domain::{NotificationPrefs, User, UserId, WorkId},
    error::ApiFailure,
    protocol::{LoginRequest, LoginResponse, NotificationsEnvelope, UserEnvelope, UserUpdateRequest},
    views::DashboardSummary,
};
use storage::{PersistedSession, SessionVault};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::{
    api::ApiClient,
    error::NotSignedIn,
    events::{ClientEvent, Notifier},
    menu_store::MenuStore,
    user_store::UserStore,
    work_detail::WorkDetail,
    work_store::WorkStore,
};

/// Profile form. A blank password leaves the current one unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub profile_pic: Option<String>,
}

impl ProfileUpdate {
    fn into_request(self) -> UserUpdateRequest {
        UserUpdateRequest {
            name: self.name,
            email: self.email,
            password: self.password.filter(|p| !p.trim().is_empty()),
            profile_pic: self.profile_pic,
            role: None,
        }
    }
}

pub struct Dashboard {
    api: Arc<ApiClient>,
    vault: Arc<dyn SessionVault>,
    notifier: Notifier,
    session: RwLock<Option<PersistedSession>>,
    works: Arc<WorkStore>,
    users: UserStore,
    menu: MenuStore,
}

impl Dashboard {
    fn assemble(
        api: Arc<ApiClient>,
        vault: Arc<dyn SessionVault>,
        notifier: Notifier,
        session: PersistedSession,
    ) -> Self {
        Self {
            works: Arc::new(WorkStore::new(Arc::clone(&api), notifier.clone())),
            users: UserStore::new(Arc::clone(&api), notifier.clone()),
            menu: MenuStore::new(Arc::clone(&api), notifier.clone()),
            api,
            vault,
            notifier,
            session: RwLock::new(Some(session)),
        }
    }

    pub async fn login(
        api: Arc<ApiClient>,
        vault: Arc<dyn SessionVault>,
        notifier: Notifier,
        email: &str,
        password: &str,
    ) -> Result<Self> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let result: Result<LoginResponse> = api
            .send(Method::POST, &["user", "login"], &request)
            .await;
        let response = notifier.report(result, "", "Login failed")?;

        api.set_token(Some(response.token.clone())).await;
        let session = PersistedSession::new(response.token, response.user);
        vault.save_session(&session).await?;
        info!(user_id = %session.user.id, role = %session.user.role, "session: signed in");

        let dashboard = Self::assemble(api, vault, notifier, session);
        dashboard.load_all().await;
        Ok(dashboard)
    }

    /// Resumes a persisted session without contacting the login endpoint.
    /// Returns `None` when nothing is stored.
    pub async fn restore(
        api: Arc<ApiClient>,
        vault: Arc<dyn SessionVault>,
        notifier: Notifier,
    ) -> Result<Option<Self>> {
        let Some(session) = vault.load_session().await? else {
            return Ok(None);
        };
        api.set_token(Some(session.token.clone())).await;
        info!(user_id = %session.user.id, "session: restored");

        let dashboard = Self::assemble(api, vault, notifier, session);
        if dashboard.load_all().await {
            warn!("session: stored token rejected, signing out");
            dashboard.teardown().await?;
            return Ok(None);
        }
        Ok(Some(dashboard))
    }

    /// Initial fetch of every store. Failures are already reported through
    /// the notifier and leave the affected store empty. Returns `true` when
    /// the server rejected the token.
    pub async fn load_all(&self) -> bool {
        let (users, works, menu, categories) = tokio::join!(
            self.users.refresh(),
            self.works.refresh(),
            self.menu.fetch_page(1),
            self.menu.fetch_categories(),
        );
        let mut token_rejected = false;
        for (store, result) in [
            ("users", users.map(|_| ())),
            ("works", works.map(|_| ())),
            ("menu", menu.map(|_| ())),
            ("categories", categories.map(|_| ())),
        ] {
            if let Err(err) = result {
                warn!(store, error = %format!("{err:#}"), "session: initial load failed");
                token_rejected |= err
                    .downcast_ref::<ApiFailure>()
                    .is_some_and(ApiFailure::is_unauthorized);
            }
        }
        token_rejected
    }

    pub fn works(&self) -> &Arc<WorkStore> {
        &self.works
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn menu(&self) -> &MenuStore {
        &self.menu
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.notifier.subscribe()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub async fn current_user(&self) -> Result<User> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.user.clone())
            .ok_or_else(|| NotSignedIn.into())
    }

    pub async fn summary(&self) -> DashboardSummary {
        let users = self.users.all().await;
        let works = self.works.list().await;
        DashboardSummary::compute(&users, &works)
    }

    pub async fn open_work(&self, work_id: &WorkId) -> Result<WorkDetail> {
        let work = match self.works.get(work_id).await {
            Some(work) => work,
            None => self.works.fetch(work_id).await?,
        };
        Ok(WorkDetail::open(Arc::clone(&self.works), work))
    }

    pub async fn update_profile(&self, changes: ProfileUpdate) -> Result<User> {
        let result: Result<User> = async {
            let user_id = self.current_user().await?.id;
            let envelope: UserEnvelope = self
                .api
                .send(Method::PUT, &["user", user_id.as_str()], &changes.into_request())
                .await?;
            self.replace_session_user(envelope.user.clone()).await?;
            info!(%user_id, "session: profile updated");
            Ok(envelope.user)
        }
        .await;
        let user = self
            .notifier
            .report(result, "Profile updated successfully", "Failed to update profile")?;
        if let Err(err) = self.users.refresh().await {
            warn!(error = %format!("{err:#}"), "session: user list refresh failed");
        }
        Ok(user)
    }

    pub async fn update_notifications(&self, prefs: NotificationPrefs) -> Result<NotificationPrefs> {
        let result: Result<NotificationPrefs> = async {
            let mut user = self.current_user().await?;
            let envelope: NotificationsEnvelope = self
                .api
                .send(
                    Method::PATCH,
                    &["user", user.id.as_str(), "notifications"],
                    &prefs,
                )
                .await?;
            user.notifications = envelope.notifications;
            self.replace_session_user(user).await?;
            Ok(envelope.notifications)
        }
        .await;
        self.notifier.report(
            result,
            "Notification preferences updated",
            "Failed to update notification preferences",
        )
    }

    /// Deletes a user account. Returns `true` when it was the signed-in account,
    /// in which case the session has been torn down.
    pub async fn delete_user(&self, user_id: &UserId) -> Result<bool> {
        let actor = self.current_user().await?;
        self.users.remove(&actor, user_id).await?;
        if &actor.id == user_id {
            self.teardown().await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn logout(self) -> Result<()> {
        self.teardown().await
    }

    async fn teardown(&self) -> Result<()> {
        let previous = self.session.write().await.take();
        self.api.set_token(None).await;
        self.works.clear().await;
        self.users.clear().await;
        self.menu.clear().await;
        self.vault.clear_session().await?;
        if let Some(session) = previous {
            info!(user_id = %session.user.id, "session: signed out");
        }
        self.notifier.send(ClientEvent::SessionEnded);
        Ok(())
    }

    async fn replace_session_user(&self, user: User) -> Result<()> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(NotSignedIn)?;
        session.user = user;
        self.vault.save_session(session).await
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
