use super::*;
use crate::mock_api::{
    banquet, menu_item, spawn_mock_api, staff_roster, MockApi, MockState, TEST_PASSWORD,
};
use rust_decimal_macros::dec;
use shared::domain::WorkStatus;
use storage::{MemoryVault, Storage};

fn seeded() -> MockState {
    let mut done = banquet();
    done.id = WorkId::new("w2");
    done.status = WorkStatus::Completed;
    MockState::new()
        .with_users(staff_roster())
        .with_works(vec![banquet(), done])
        .with_menu(vec![menu_item("m1", "Kulfi", "Desserts", dec!(90))], 10)
        .with_categories(&["Desserts"])
}

async fn unauthenticated(mock: &MockApi) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(&mock.url, std::time::Duration::from_secs(5)).expect("api client"))
}

async fn sign_in(mock: &MockApi, vault: Arc<dyn SessionVault>) -> Dashboard {
    Dashboard::login(
        unauthenticated(mock).await,
        vault,
        Notifier::default(),
        "admin-1@example.com",
        TEST_PASSWORD,
    )
    .await
    .expect("login")
}

#[tokio::test]
async fn login_persists_token_and_loads_every_store() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let vault = Arc::new(MemoryVault::default());
    let dashboard = sign_in(&mock, vault.clone()).await;

    let user = dashboard.current_user().await.expect("user");
    assert_eq!(user.id, UserId::new("admin-1"));
    let stored = vault.load_session().await.expect("load").expect("session");
    assert_eq!(stored.token, crate::mock_api::TEST_TOKEN);

    assert_eq!(dashboard.works().list().await.len(), 2);
    assert_eq!(dashboard.users().all().await.len(), 4);
    assert_eq!(dashboard.menu().items().await.len(), 1);
    assert_eq!(dashboard.menu().categories().await, vec!["Desserts"]);

    let summary = dashboard.summary().await;
    assert_eq!(summary.staff_count, 3);
    assert_eq!(summary.total_works, 2);
    assert_eq!(summary.completed_works, 1);
    assert_eq!(summary.pending_works, 1);
}

#[tokio::test]
async fn bad_credentials_leave_nothing_behind() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let vault = Arc::new(MemoryVault::default());
    let err = Dashboard::login(
        unauthenticated(&mock).await,
        vault.clone(),
        Notifier::default(),
        "admin-1@example.com",
        "wrong",
    )
    .await
    .err()
    .expect("login refused");

    let failure = err
        .downcast_ref::<shared::error::ApiFailure>()
        .expect("api failure");
    assert!(failure.is_unauthorized());
    assert!(vault.load_session().await.expect("load").is_none());
}

#[tokio::test]
async fn restore_resumes_from_sqlite_without_logging_in() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let storage = Arc::new(Storage::new("sqlite::memory:").await.expect("db"));
    drop(sign_in(&mock, storage.clone()).await);
    let logins = mock.count("POST", "/user/login").await;

    let restored = Dashboard::restore(unauthenticated(&mock).await, storage, Notifier::default())
        .await
        .expect("restore")
        .expect("session present");

    assert_eq!(mock.count("POST", "/user/login").await, logins);
    assert_eq!(
        restored.current_user().await.expect("user").id,
        UserId::new("admin-1")
    );
    assert_eq!(restored.works().list().await.len(), 2);
}

#[tokio::test]
async fn restore_without_session_returns_none() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let restored = Dashboard::restore(
        unauthenticated(&mock).await,
        Arc::new(MemoryVault::default()),
        Notifier::default(),
    )
    .await
    .expect("restore");
    assert!(restored.is_none());
}

#[tokio::test]
async fn logout_clears_vault_token_and_stores() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let vault = Arc::new(MemoryVault::default());
    let api = unauthenticated(&mock).await;
    let dashboard = Dashboard::login(
        api.clone(),
        vault.clone(),
        Notifier::default(),
        "admin-1@example.com",
        TEST_PASSWORD,
    )
    .await
    .expect("login");
    let mut events = dashboard.subscribe();
    let works = Arc::clone(dashboard.works());

    dashboard.logout().await.expect("logout");

    assert!(vault.load_session().await.expect("load").is_none());
    assert!(!api.has_token().await);
    assert!(works.list().await.is_empty());
    let mut ended = false;
    while let Ok(event) = events.try_recv() {
        ended |= event == ClientEvent::SessionEnded;
    }
    assert!(ended);
}

#[tokio::test]
async fn profile_update_skips_blank_password_and_persists_user() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let vault = Arc::new(MemoryVault::default());
    let dashboard = sign_in(&mock, vault.clone()).await;

    let user = dashboard
        .update_profile(ProfileUpdate {
            name: Some("Ada Lovelace".into()),
            password: Some("   ".into()),
            ..ProfileUpdate::default()
        })
        .await
        .expect("update profile");

    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(
        mock.state.lock().await.bodies.last(),
        Some(&serde_json::json!({ "name": "Ada Lovelace" }))
    );
    let stored = vault.load_session().await.expect("load").expect("session");
    assert_eq!(stored.user.name, "Ada Lovelace");
    assert_eq!(
        dashboard
            .users()
            .get(&UserId::new("admin-1"))
            .await
            .map(|u| u.name),
        Some("Ada Lovelace".to_string())
    );
}

#[tokio::test]
async fn notification_preferences_round_trip() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let vault = Arc::new(MemoryVault::default());
    let dashboard = sign_in(&mock, vault.clone()).await;

    let prefs = dashboard
        .update_notifications(NotificationPrefs {
            email: true,
            whatsapp: false,
        })
        .await
        .expect("update notifications");

    assert!(!prefs.whatsapp);
    assert!(
        !dashboard
            .current_user()
            .await
            .expect("user")
            .notifications
            .whatsapp
    );
    let stored = vault.load_session().await.expect("load").expect("session");
    assert!(!stored.user.notifications.whatsapp);
}

#[tokio::test]
async fn deleting_own_account_ends_the_session() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let vault = Arc::new(MemoryVault::default());
    let dashboard = sign_in(&mock, vault.clone()).await;

    assert!(!dashboard
        .delete_user(&UserId::new("s1"))
        .await
        .expect("delete staff"));
    assert!(dashboard.is_signed_in().await);

    assert!(dashboard
        .delete_user(&UserId::new("admin-1"))
        .await
        .expect("delete self"));
    assert!(!dashboard.is_signed_in().await);
    assert!(vault.load_session().await.expect("load").is_none());
    dashboard
        .current_user()
        .await
        .expect_err("no user after teardown");
}

#[tokio::test]
async fn open_work_builds_detail_view() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let dashboard = sign_in(&mock, Arc::new(MemoryVault::default())).await;

    let detail = dashboard
        .open_work(&WorkId::new("w1"))
        .await
        .expect("open work");
    assert_eq!(detail.allocated_budget(), dec!(10000));
    assert_eq!(detail.staff().len(), 2);
}

#[tokio::test]
async fn restore_with_rejected_token_signs_out() {
    let mock = spawn_mock_api(seeded()).await.expect("spawn mock api");
    let vault = Arc::new(MemoryVault::default());
    vault
        .save_session(&PersistedSession::new(
            "token-expired",
            crate::mock_api::user("admin-1", "Ada Admin", shared::domain::Role::Admin),
        ))
        .await
        .expect("seed session");
    let api = unauthenticated(&mock).await;

    let restored = Dashboard::restore(api.clone(), vault.clone(), Notifier::default())
        .await
        .expect("restore");

    assert!(restored.is_none());
    assert!(vault.load_session().await.expect("load").is_none());
    assert!(!api.has_token().await);
}
