use super::*;
use crate::{
    error::CascadeError,
    mock_api::{menu_item, spawn_mock_api, MockApi, MockState},
};
use rust_decimal_macros::dec;

async fn store_for(state: MockState) -> (MockApi, MenuStore) {
    let mock = spawn_mock_api(state).await.expect("spawn mock api");
    let store = MenuStore::new(mock.client().await, Notifier::default());
    (mock, store)
}

/// Five items over three pages of two; "Desserts" appears on pages 1 and 3.
fn paged_menu() -> MockState {
    MockState::new()
        .with_menu(
            vec![
                menu_item("m1", "Gulab Jamun", "Desserts", dec!(120)),
                menu_item("m2", "Paneer Tikka", "Starters", dec!(250)),
                menu_item("m3", "Dal Makhani", "Mains", dec!(300)),
                menu_item("m4", "Samosa", "Starters", dec!(60)),
                menu_item("m5", "Kulfi", "Desserts", dec!(90)),
            ],
            2,
        )
        .with_categories(&["Desserts", "Starters", "Mains"])
}

fn draft(name: &str, category: &str) -> MenuItemDraft {
    MenuItemDraft {
        name: name.into(),
        description: "House special".into(),
        price: Some(NumericInput::from("180")),
        category: Some(category.into()),
        image: "https://img.example.com/new.png".into(),
    }
}

fn ids(items: &[MenuItem]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

#[tokio::test]
async fn fetch_page_tracks_page_and_total() {
    let (_mock, store) = store_for(paged_menu()).await;

    let items = store.fetch_page(2).await.expect("page 2");
    assert_eq!(ids(&items), vec!["m3", "m4"]);
    assert_eq!(store.page().await, 2);
    assert_eq!(store.total_pages().await, 3);
    assert!(store.last_error().await.is_none());
}

#[tokio::test]
async fn page_zero_is_rejected_without_a_request() {
    let (mock, store) = store_for(paged_menu()).await;
    let err = store.fetch_page(0).await.expect_err("page 0");
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::InvalidPage)
    );
    assert_eq!(mock.count("GET", "/menu").await, 0);
}

#[tokio::test]
async fn failed_page_load_records_error_and_keeps_items() {
    let (_mock, store) = store_for(paged_menu().failing_nth("GET", "/menu", 1, 500, "Menu offline")).await;
    store.fetch_page(1).await.expect("page 1");

    store.fetch_page(2).await.expect_err("page 2 fails");
    assert_eq!(ids(&store.items().await), vec!["m1", "m2"]);
    assert_eq!(store.page().await, 1);
    assert!(store
        .last_error()
        .await
        .is_some_and(|message| message.contains("Menu offline")));
}

#[tokio::test]
async fn category_tabs_lead_with_all_and_filter_loaded_items() {
    let (_mock, store) = store_for(paged_menu()).await;
    store.fetch_categories().await.expect("categories");
    store.fetch_page(1).await.expect("page 1");

    assert_eq!(
        store.category_tabs().await,
        vec!["All", "Desserts", "Starters", "Mains"]
    );
    assert_eq!(ids(&store.items_in_category("All").await), vec!["m1", "m2"]);
    assert_eq!(ids(&store.items_in_category("Desserts").await), vec!["m1"]);
    assert!(store.items_in_category("Mains").await.is_empty());
}

#[tokio::test]
async fn adding_an_item_refetches_the_current_page() {
    let (mock, store) = store_for(paged_menu()).await;
    store.fetch_page(3).await.expect("page 3");

    store
        .add_item(draft("Rasmalai", "Desserts"))
        .await
        .expect("add item");

    assert_eq!(ids(&store.items().await), vec!["m5", "m101"]);
    assert_eq!(mock.count("GET", "/menu").await, 2);
}

#[tokio::test]
async fn item_without_image_is_rejected_locally() {
    let (mock, store) = store_for(paged_menu()).await;
    let mut imageless = draft("Rasmalai", "Desserts");
    imageless.image = String::new();

    let err = store.add_item(imageless).await.expect_err("image required");
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::MissingImage)
    );
    assert_eq!(mock.count("POST", "/menu").await, 0);
}

#[tokio::test]
async fn item_price_must_be_a_non_negative_number() {
    let (mock, store) = store_for(paged_menu()).await;

    let mut negative = draft("Rasmalai", "Desserts");
    negative.price = Some(NumericInput::from("-1"));
    let err = store.add_item(negative).await.expect_err("negative");
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::Negative { field: "price" })
    );

    let mut missing = draft("Rasmalai", "Desserts");
    missing.price = None;
    let err = store.add_item(missing).await.expect_err("missing");
    assert_eq!(
        err.downcast_ref::<ValidationError>(),
        Some(&ValidationError::Missing { field: "price" })
    );
    assert_eq!(mock.count("POST", "/menu").await, 0);
}

#[test]
fn draft_without_category_files_under_all() {
    let mut draft = draft("Water", "");
    draft.category = None;
    let request = draft.into_request().expect("request");
    assert_eq!(request.category, "All");
    assert_eq!(request.price, dec!(180));
}

#[tokio::test]
async fn update_and_delete_item_refresh_the_page() {
    let (mock, store) = store_for(paged_menu()).await;
    store.fetch_page(1).await.expect("page 1");

    store
        .update_item(&MenuItemId::new("m2"), draft("Paneer Tikka Platter", "Starters"))
        .await
        .expect("update");
    assert_eq!(store.items().await[1].name, "Paneer Tikka Platter");

    store
        .delete_item(&MenuItemId::new("m1"))
        .await
        .expect("delete");
    assert_eq!(ids(&store.items().await), vec!["m2", "m3"]);
    assert_eq!(mock.state.lock().await.menu.len(), 4);
}

#[tokio::test]
async fn category_names_are_validated_before_posting() {
    let (mock, store) = store_for(paged_menu()).await;
    store.fetch_categories().await.expect("categories");

    for (name, expected) in [
        (
            "  ",
            ValidationError::Missing {
                field: "category name",
            },
        ),
        ("All", ValidationError::ReservedCategory("All".into())),
        ("Starters", ValidationError::DuplicateCategory("Starters".into())),
    ] {
        let err = store.create_category(name).await.expect_err(name);
        assert_eq!(err.downcast_ref::<ValidationError>(), Some(&expected));
    }
    assert_eq!(mock.count("POST", "/menu/categories").await, 0);

    let created = store.create_category(" Beverages ").await.expect("create");
    assert_eq!(created, "Beverages");
    assert_eq!(
        store.categories().await,
        vec!["Desserts", "Starters", "Mains", "Beverages"]
    );
}

#[tokio::test]
async fn loaded_page_cascade_leaves_items_on_other_pages() {
    let (mock, store) = store_for(paged_menu()).await;
    store.fetch_categories().await.expect("categories");
    store.fetch_page(1).await.expect("page 1");

    let report = store
        .delete_category("Desserts", CascadeScope::LoadedPage)
        .await
        .expect("cascade");

    assert_eq!(report.deleted, vec![MenuItemId::new("m1")]);
    assert_eq!(store.categories().await, vec!["Starters", "Mains"]);
    let state = mock.state.lock().await;
    let survivors: Vec<&str> = state
        .menu
        .iter()
        .filter(|item| item.category == "Desserts")
        .map(|item| item.id.as_str())
        .collect();
    assert_eq!(survivors, vec!["m5"]);
    assert!(!state.categories.contains(&"Desserts".to_string()));
}

#[tokio::test]
async fn all_pages_cascade_removes_every_item_of_the_category() {
    let (mock, store) = store_for(paged_menu()).await;
    store.fetch_categories().await.expect("categories");
    store.fetch_page(1).await.expect("page 1");

    let report = store
        .delete_category("Desserts", CascadeScope::AllPages)
        .await
        .expect("cascade");

    assert_eq!(
        report.deleted,
        vec![MenuItemId::new("m1"), MenuItemId::new("m5")]
    );
    let state = mock.state.lock().await;
    assert!(state.menu.iter().all(|item| item.category != "Desserts"));
    assert_eq!(state.menu.len(), 3);
}

#[tokio::test]
async fn cascade_failure_reports_what_was_left_behind() {
    let (mock, store) = store_for(paged_menu().failing("DELETE", "/menu/m5", 500, "Item locked")).await;
    store.fetch_categories().await.expect("categories");

    let err = store
        .delete_category("Desserts", CascadeScope::AllPages)
        .await
        .expect_err("cascade stops");
    let cascade = err.downcast_ref::<CascadeError>().expect("cascade error");
    assert_eq!(cascade.deleted, vec![MenuItemId::new("m1")]);
    assert_eq!(cascade.remaining, vec![MenuItemId::new("m5")]);

    assert!(!store.categories().await.contains(&"Desserts".to_string()));
    let state = mock.state.lock().await;
    assert!(!state.categories.contains(&"Desserts".to_string()));
    assert!(state.menu.iter().any(|item| item.id.as_str() == "m5"));
}

#[tokio::test]
async fn category_names_are_percent_encoded_in_the_path() {
    let (mock, store) = store_for(
        MockState::new()
            .with_menu(vec![menu_item("m1", "Masala Chai", "Hot Drinks", dec!(40))], 10)
            .with_categories(&["Hot Drinks"]),
    )
    .await;
    store.fetch_categories().await.expect("categories");
    store.fetch_page(1).await.expect("page 1");

    store
        .delete_category("Hot Drinks", CascadeScope::LoadedPage)
        .await
        .expect("cascade");

    assert_eq!(mock.count("DELETE", "/menu/categories/Hot%20Drinks").await, 1);
    assert!(mock.state.lock().await.menu.is_empty());
}

#[tokio::test]
async fn reserved_and_blank_category_names_never_reach_the_server() {
    let (mock, store) = store_for(
        MockState::new()
            .with_menu(
                vec![
                    menu_item("m1", "Water", "All", dec!(20)),
                    menu_item("m2", "Soda", "All", dec!(40)),
                    menu_item("m3", "Kulfi", "Desserts", dec!(90)),
                ],
                10,
            )
            .with_categories(&["All", "Desserts"]),
    )
    .await;
    store.fetch_categories().await.expect("categories");
    store.fetch_page(1).await.expect("page 1");

    for (name, expected) in [
        ("All", ValidationError::ReservedCategory("All".into())),
        (" all ", ValidationError::ReservedCategory("all".into())),
        (
            "   ",
            ValidationError::Missing {
                field: "category name",
            },
        ),
    ] {
        let err = store
            .delete_category(name, CascadeScope::AllPages)
            .await
            .expect_err(name);
        assert_eq!(err.downcast_ref::<ValidationError>(), Some(&expected));
    }

    assert_eq!(mock.count("DELETE", "").await, 0);
    assert_eq!(mock.state.lock().await.menu.len(), 3);
    assert_eq!(ids(&store.items().await), vec!["m1", "m2", "m3"]);
}
