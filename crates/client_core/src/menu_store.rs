use std::sync::Arc;

use anyhow::Result;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{default_category, Category, MenuItem, MenuItemId, ALL_CATEGORY},
    input::NumericInput,
    protocol::{CategoryRequest, MenuItemRequest, MenuPage},
    views::{category_tabs, items_in_category},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    api::ApiClient,
    error::{CascadeError, ValidationError},
    events::Notifier,
    inflight::InflightRegistry,
};

/// Which items a category delete takes with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadeScope {
    /// Only items on the page currently loaded. Items of the category on other
    /// pages are left behind.
    #[default]
    LoadedPage,
    /// Every page is read first so no item of the category survives.
    AllPages,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuItemDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Option<NumericInput>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: String,
}

impl MenuItemDraft {
    pub fn into_request(self) -> Result<MenuItemRequest, ValidationError> {
        if self.image.trim().is_empty() {
            return Err(ValidationError::MissingImage);
        }
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::Missing { field: "name" });
        }
        let price: Decimal = match &self.price {
            Some(input) if !matches!(input, NumericInput::Text(raw) if raw.trim().is_empty()) => {
                input
                    .to_decimal()
                    .ok_or(ValidationError::NotANumber { field: "price" })?
            }
            _ => return Err(ValidationError::Missing { field: "price" }),
        };
        if price.is_sign_negative() && !price.is_zero() {
            return Err(ValidationError::Negative { field: "price" });
        }
        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_category);
        Ok(MenuItemRequest {
            name,
            description: self.description,
            price,
            category,
            image: self.image,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeReport {
    pub category: String,
    pub deleted: Vec<MenuItemId>,
}

struct MenuState {
    items: Vec<MenuItem>,
    categories: Vec<String>,
    page: u32,
    total_pages: u32,
    loading: bool,
    error: Option<String>,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            categories: Vec::new(),
            page: 1,
            total_pages: 1,
            loading: false,
            error: None,
        }
    }
}

pub struct MenuStore {
    api: Arc<ApiClient>,
    notifier: Notifier,
    inflight: InflightRegistry,
    state: Mutex<MenuState>,
}

impl MenuStore {
    pub fn new(api: Arc<ApiClient>, notifier: Notifier) -> Self {
        Self {
            api,
            notifier,
            inflight: InflightRegistry::default(),
            state: Mutex::new(MenuState::default()),
        }
    }

    pub async fn items(&self) -> Vec<MenuItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn categories(&self) -> Vec<String> {
        self.state.lock().await.categories.clone()
    }

    pub async fn page(&self) -> u32 {
        self.state.lock().await.page
    }

    pub async fn total_pages(&self) -> u32 {
        self.state.lock().await.total_pages
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.error.clone()
    }

    pub async fn category_tabs(&self) -> Vec<String> {
        category_tabs(&self.state.lock().await.categories)
    }

    pub async fn items_in_category(&self, category: &str) -> Vec<MenuItem> {
        let state = self.state.lock().await;
        items_in_category(&state.items, category)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        *self.state.lock().await = MenuState::default();
    }

    pub async fn fetch_page(&self, page: u32) -> Result<Vec<MenuItem>> {
        if page == 0 {
            return self
                .notifier
                .report(Err(ValidationError::InvalidPage.into()), "", "");
        }
        self.state.lock().await.loading = true;
        let result = self.load_page(page).await;

        let mut state = self.state.lock().await;
        state.loading = false;
        let result = match result {
            Ok(menu_page) => {
                state.items = menu_page.items;
                state.total_pages = menu_page.total_pages.max(1);
                state.page = page;
                state.error = None;
                info!(page, total_pages = state.total_pages, count = state.items.len(), "menu: page loaded");
                Ok(state.items.clone())
            }
            Err(err) => {
                state.error = Some(format!("{err:#}"));
                Err(err)
            }
        };
        drop(state);
        self.notifier
            .report(result, "", "Failed to fetch menu items")
    }

    pub async fn fetch_categories(&self) -> Result<Vec<String>> {
        let result: Result<Vec<String>> = async {
            let categories: Vec<Category> = self.api.get(&["menu", "categories"]).await?;
            let names: Vec<String> = categories.into_iter().map(|c| c.name).collect();
            self.state.lock().await.categories = names.clone();
            info!(count = names.len(), "menu: categories loaded");
            Ok(names)
        }
        .await;
        self.notifier
            .report(result, "", "Failed to fetch categories")
    }

    pub async fn add_item(&self, draft: MenuItemDraft) -> Result<()> {
        let result: Result<()> = async {
            let request = draft.into_request()?;
            let _guard = self.inflight.begin("menu:add")?;
            self.api
                .send_discarding(Method::POST, &["menu"], &request)
                .await?;
            info!(name = %request.name, category = %request.category, "menu: item added");
            Ok(())
        }
        .await;
        let result = self.notifier.report(
            result,
            "Menu item added successfully!",
            "Failed to add menu item",
        );
        self.refresh_after_write(result).await
    }

    pub async fn update_item(&self, item_id: &MenuItemId, draft: MenuItemDraft) -> Result<()> {
        let result: Result<()> = async {
            let request = draft.into_request()?;
            let _guard = self.inflight.begin(format!("menu:update:{item_id}"))?;
            self.api
                .send_discarding(Method::PUT, &["menu", item_id.as_str()], &request)
                .await?;
            info!(%item_id, "menu: item updated");
            Ok(())
        }
        .await;
        let result = self.notifier.report(
            result,
            "Menu item updated successfully!",
            "Failed to update menu item",
        );
        self.refresh_after_write(result).await
    }

    pub async fn delete_item(&self, item_id: &MenuItemId) -> Result<()> {
        let result: Result<()> = async {
            let _guard = self.inflight.begin(format!("menu:delete:{item_id}"))?;
            self.api.delete(&["menu", item_id.as_str()]).await?;
            info!(%item_id, "menu: item deleted");
            Ok(())
        }
        .await;
        let result = self.notifier.report(
            result,
            "Menu item deleted successfully!",
            "Failed to delete menu item",
        );
        self.refresh_after_write(result).await
    }

    pub async fn create_category(&self, name: &str) -> Result<String> {
        let result: Result<String> = async {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ValidationError::Missing {
                    field: "category name",
                }
                .into());
            }
            if name.eq_ignore_ascii_case(ALL_CATEGORY) {
                return Err(ValidationError::ReservedCategory(name).into());
            }
            if self.state.lock().await.categories.contains(&name) {
                return Err(ValidationError::DuplicateCategory(name).into());
            }
            let _guard = self.inflight.begin(format!("menu:category:create:{name}"))?;
            self.api
                .send_discarding(
                    Method::POST,
                    &["menu", "categories"],
                    &CategoryRequest { name: name.clone() },
                )
                .await?;
            let mut state = self.state.lock().await;
            if !state.categories.contains(&name) {
                state.categories.push(name.clone());
            }
            info!(category = %name, "menu: category created");
            Ok(name)
        }
        .await;
        self.notifier
            .report(result, "Category added", "Failed to add category")
    }

    /// Deletes a category and then, one by one, the items filed under it.
    ///
    /// The category goes first and is not restored if an item delete fails;
    /// the [`CascadeError`] lists what was and was not removed.
    pub async fn delete_category(&self, name: &str, scope: CascadeScope) -> Result<CascadeReport> {
        let result = self.cascade_category(name, scope).await;
        let result = self.notifier.report(
            result,
            "Category and its items deleted",
            "Failed to delete category",
        );
        if let Err(err) = self.refresh_quietly().await {
            warn!(error = %format!("{err:#}"), "menu: refresh after category delete failed");
        }
        result
    }

    async fn cascade_category(&self, name: &str, scope: CascadeScope) -> Result<CascadeReport> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Missing {
                field: "category name",
            }
            .into());
        }
        if name.eq_ignore_ascii_case(ALL_CATEGORY) {
            return Err(ValidationError::ReservedCategory(name.to_string()).into());
        }
        let _guard = self.inflight.begin(format!("menu:category:delete:{name}"))?;
        let targets = match scope {
            CascadeScope::LoadedPage => {
                let state = self.state.lock().await;
                ids_in_category(&state.items, name)
            }
            CascadeScope::AllPages => self.collect_all_pages(name).await?,
        };

        self.api.delete(&["menu", "categories", name]).await?;
        self.state
            .lock()
            .await
            .categories
            .retain(|category| category != name);
        info!(category = name, items = targets.len(), ?scope, "menu: category deleted");

        let mut deleted = Vec::with_capacity(targets.len());
        for (position, item_id) in targets.iter().enumerate() {
            if let Err(source) = self.api.delete(&["menu", item_id.as_str()]).await {
                warn!(category = name, %item_id, deleted = deleted.len(), "menu: cascade stopped");
                return Err(CascadeError {
                    category: name.to_string(),
                    deleted,
                    remaining: targets[position..].to_vec(),
                    source,
                }
                .into());
            }
            deleted.push(item_id.clone());
        }

        Ok(CascadeReport {
            category: name.to_string(),
            deleted,
        })
    }

    async fn collect_all_pages(&self, category: &str) -> Result<Vec<MenuItemId>> {
        let mut ids = Vec::new();
        let mut page = 1;
        loop {
            let menu_page = self.load_page(page).await?;
            ids.extend(ids_in_category(&menu_page.items, category));
            if page >= menu_page.total_pages {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }

    async fn load_page(&self, page: u32) -> Result<MenuPage> {
        self.api
            .get_with_query(&["menu"], &[("page", page)])
            .await
    }

    async fn refresh_after_write(&self, result: Result<()>) -> Result<()> {
        if result.is_ok() {
            if let Err(err) = self.refresh_quietly().await {
                warn!(error = %format!("{err:#}"), "menu: refresh after write failed");
            }
        }
        result
    }

    async fn refresh_quietly(&self) -> Result<()> {
        let page = self.page().await;
        let mut menu_page = self.load_page(page).await?;
        let mut loaded = page;
        if menu_page.items.is_empty() && page > 1 && page > menu_page.total_pages {
            loaded = menu_page.total_pages.max(1);
            menu_page = self.load_page(loaded).await?;
        }
        let mut state = self.state.lock().await;
        state.items = menu_page.items;
        state.total_pages = menu_page.total_pages.max(1);
        state.page = loaded;
        state.error = None;
        Ok(())
    }
}

fn ids_in_category(items: &[MenuItem], category: &str) -> Vec<MenuItemId> {
    items
        .iter()
        .filter(|item| item.category == category)
        .map(|item| item.id.clone())
        .collect()
}

#[cfg(test)]
#[path = "tests/menu_store_tests.rs"]
mod tests;
