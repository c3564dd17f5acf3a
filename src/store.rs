use crate::categories::{
    ensure_categories, group_by_home_category, group_by_shop_category, move_category_down,
    move_category_up, unique_home_categories, unique_shop_categories,
};
use crate::models::{
    CategoryGroup, Item, ItemUpdate, NewItem, NewShop, SaveStatus, Shop, ShopAvailability,
    ShopUpdate, ShoppingListData,
};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use uuid::Uuid;

/// Canonical owner of the shopping list state.
///
/// Mutations are synchronous and atomic; consumers subscribe to the revision
/// watch channel and re-read whatever views they need after each change.
/// Every mutation marks the state unsaved; the save status is driven back to
/// `Saved` (or `Error`) by the persistence collaborator.
pub struct ShoppingStore {
    state: RwLock<ShoppingListData>,
    revision: watch::Sender<u64>,
    save_status: watch::Sender<SaveStatus>,
}

impl Default for ShoppingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ShoppingStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        let (save_status, _) = watch::channel(SaveStatus::Saved);
        Self {
            state: RwLock::new(ShoppingListData::default()),
            revision,
            save_status,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ShoppingListData> {
        self.state.read().expect("store state lock")
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShoppingListData> {
        self.state.write().expect("store state lock")
    }

    /// Bump the revision and flag unsaved work. Callers hold the write guard
    /// so revision and status always move together.
    fn touch(&self) {
        self.revision.send_modify(|revision| *revision += 1);
        self.save_status.send_replace(SaveStatus::Unsaved);
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Change notification; receivers re-read state after each tick.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn save_status(&self) -> SaveStatus {
        *self.save_status.borrow()
    }

    pub fn status_watch(&self) -> watch::Receiver<SaveStatus> {
        self.save_status.subscribe()
    }

    /// Driven by the persistence collaborator (`saving`, `error`). Mutations
    /// themselves force `unsaved` and `load_data` forces `saved`.
    pub fn set_save_status(&self, status: SaveStatus) {
        self.save_status.send_replace(status);
    }

    /// Finish a save attempt that snapshotted `saved_revision`. Edits that
    /// arrived while the write was in flight keep the state unsaved.
    pub fn mark_saved(&self, saved_revision: u64) {
        let _state = self.read();
        let status = if *self.revision.borrow() == saved_revision {
            SaveStatus::Saved
        } else {
            SaveStatus::Unsaved
        };
        self.save_status.send_replace(status);
    }

    // ─── Item CRUD ──────────────────────────────────────────────────────────

    /// Add an item and auto-select it. Blank name or home category after
    /// trimming is a no-op; the caller is expected to pre-validate.
    pub fn add_item(&self, payload: NewItem) -> Option<Item> {
        let name = payload.name.trim();
        let home_category = payload.home_category.trim();
        if name.is_empty() || home_category.is_empty() {
            return None;
        }

        let item = Item {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            home_category: home_category.to_string(),
            notes: payload.notes,
            shop_availability: payload.shop_availability,
        };

        let mut state = self.write();
        state.items.push(item.clone());
        state.selection.push(item.id.clone());
        let observed = unique_home_categories(&state.items);
        state.home_categories = ensure_categories(&observed, &state.home_categories);
        self.touch();
        drop(state);

        tracing::debug!(item_id = %item.id, "item added");
        Some(item)
    }

    /// Merge a partial update into an item. The id is immutable; an unknown
    /// id is a silent no-op.
    pub fn update_item(&self, item_id: &str, update: ItemUpdate) -> bool {
        let mut state = self.write();
        let Some(item) = state.items.iter_mut().find(|item| item.id == item_id) else {
            return false;
        };

        let mut category_changed = false;
        if let Some(name) = update.name {
            item.name = name;
        }
        if let Some(home_category) = update.home_category {
            category_changed = home_category != item.home_category;
            item.home_category = home_category;
        }
        if let Some(notes) = update.notes {
            item.notes = Some(notes);
        }
        let mut touched_shops = Vec::new();
        if let Some(shop_availability) = update.shop_availability {
            item.shop_availability = shop_availability;
            touched_shops = item
                .shop_availability
                .iter()
                .map(|availability| availability.shop_id.clone())
                .collect();
        }

        if category_changed {
            let observed = unique_home_categories(&state.items);
            state.home_categories = ensure_categories(&observed, &state.home_categories);
        }
        for shop_id in touched_shops {
            let observed = unique_shop_categories(&state.items, &shop_id);
            if let Some(shop) = state.shops.iter_mut().find(|shop| shop.id == shop_id) {
                shop.categories = ensure_categories(&observed, &shop.categories);
            }
        }

        self.touch();
        true
    }

    /// Remove an item and its selection entry. Unknown id is a silent no-op.
    pub fn delete_item(&self, item_id: &str) -> bool {
        let mut state = self.write();
        let before = state.items.len();
        state.items.retain(|item| item.id != item_id);
        if state.items.len() == before {
            return false;
        }
        state.selection.retain(|id| id != item_id);
        self.touch();
        drop(state);

        tracing::debug!(item_id, "item deleted");
        true
    }

    // ─── Shop CRUD ──────────────────────────────────────────────────────────

    pub fn add_shop(&self, payload: NewShop) -> Shop {
        let shop = Shop {
            id: Uuid::new_v4().to_string(),
            name: payload.name,
            categories: payload.categories,
        };

        let mut state = self.write();
        state.shops.push(shop.clone());
        self.touch();
        shop
    }

    pub fn update_shop(&self, shop_id: &str, update: ShopUpdate) -> bool {
        let mut state = self.write();
        let Some(shop) = state.shops.iter_mut().find(|shop| shop.id == shop_id) else {
            return false;
        };
        if let Some(name) = update.name {
            shop.name = name;
        }
        if let Some(categories) = update.categories {
            shop.categories = categories;
        }
        self.touch();
        true
    }

    /// Remove a shop and strip every availability entry referencing it from
    /// every item.
    pub fn delete_shop(&self, shop_id: &str) -> bool {
        let mut state = self.write();
        let before = state.shops.len();
        state.shops.retain(|shop| shop.id != shop_id);
        if state.shops.len() == before {
            return false;
        }
        for item in &mut state.items {
            item.shop_availability
                .retain(|availability| availability.shop_id != shop_id);
        }
        self.touch();
        drop(state);

        tracing::debug!(shop_id, "shop deleted");
        true
    }

    // ─── Shop availability ──────────────────────────────────────────────────

    /// Assign an item to a shop with an optional aisle, replacing any
    /// existing assignment for that pair. `None` or an empty string means
    /// the Uncategorized bucket. Reconciles the shop's aisle order.
    pub fn set_item_shop_availability(
        &self,
        item_id: &str,
        shop_id: &str,
        category: Option<String>,
    ) -> bool {
        let shop_category = category.filter(|category| !category.is_empty());

        let mut state = self.write();
        let Some(item) = state.items.iter_mut().find(|item| item.id == item_id) else {
            return false;
        };
        item.shop_availability
            .retain(|availability| availability.shop_id != shop_id);
        item.shop_availability.push(ShopAvailability {
            shop_id: shop_id.to_string(),
            shop_category,
        });

        let observed = unique_shop_categories(&state.items, shop_id);
        if let Some(shop) = state.shops.iter_mut().find(|shop| shop.id == shop_id) {
            shop.categories = ensure_categories(&observed, &shop.categories);
        }
        self.touch();
        true
    }

    /// Drop the (item, shop) availability entry if present.
    pub fn remove_item_from_shop(&self, item_id: &str, shop_id: &str) -> bool {
        let mut state = self.write();
        let Some(item) = state.items.iter_mut().find(|item| item.id == item_id) else {
            return false;
        };
        let before = item.shop_availability.len();
        item.shop_availability
            .retain(|availability| availability.shop_id != shop_id);
        if item.shop_availability.len() == before {
            return false;
        }
        self.touch();
        true
    }

    // ─── Selection ──────────────────────────────────────────────────────────

    pub fn toggle_item_selection(&self, item_id: &str) {
        let mut state = self.write();
        if state.selection.iter().any(|id| id == item_id) {
            state.selection.retain(|id| id != item_id);
        } else {
            state.selection.push(item_id.to_string());
        }
        self.touch();
    }

    pub fn select_item(&self, item_id: &str) {
        let mut state = self.write();
        if state.selection.iter().any(|id| id == item_id) {
            return;
        }
        state.selection.push(item_id.to_string());
        self.touch();
    }

    pub fn deselect_item(&self, item_id: &str) {
        let mut state = self.write();
        let before = state.selection.len();
        state.selection.retain(|id| id != item_id);
        if state.selection.len() != before {
            self.touch();
        }
    }

    pub fn is_selected(&self, item_id: &str) -> bool {
        self.read().selection.iter().any(|id| id == item_id)
    }

    // ─── Category ordering ──────────────────────────────────────────────────

    pub fn move_home_category_up(&self, name: &str) -> bool {
        let mut state = self.write();
        let moved = move_category_up(&mut state.home_categories, name);
        if moved {
            self.touch();
        }
        moved
    }

    pub fn move_home_category_down(&self, name: &str) -> bool {
        let mut state = self.write();
        let moved = move_category_down(&mut state.home_categories, name);
        if moved {
            self.touch();
        }
        moved
    }

    pub fn move_shop_category_up(&self, shop_id: &str, name: &str) -> bool {
        let mut state = self.write();
        let Some(shop) = state.shops.iter_mut().find(|shop| shop.id == shop_id) else {
            return false;
        };
        let moved = move_category_up(&mut shop.categories, name);
        if moved {
            self.touch();
        }
        moved
    }

    pub fn move_shop_category_down(&self, shop_id: &str, name: &str) -> bool {
        let mut state = self.write();
        let Some(shop) = state.shops.iter_mut().find(|shop| shop.id == shop_id) else {
            return false;
        };
        let moved = move_category_down(&mut shop.categories, name);
        if moved {
            self.touch();
        }
        moved
    }

    // ─── Persistence entry points ───────────────────────────────────────────

    /// Replace the whole state with a loaded aggregate. Category orders are
    /// re-derived against the loaded items in case the stored lists are
    /// stale or absent. The only mutation that lands in `saved` state.
    pub fn load_data(&self, mut data: ShoppingListData) {
        let observed = unique_home_categories(&data.items);
        data.home_categories = ensure_categories(&observed, &data.home_categories);
        for shop in &mut data.shops {
            let observed = unique_shop_categories(&data.items, &shop.id);
            shop.categories = ensure_categories(&observed, &shop.categories);
        }

        let item_count = data.items.len();
        let shop_count = data.shops.len();
        let mut state = self.write();
        *state = data;
        self.revision.send_modify(|revision| *revision += 1);
        self.save_status.send_replace(SaveStatus::Saved);
        drop(state);

        tracing::info!(item_count, shop_count, "aggregate loaded");
    }

    pub fn reset(&self) {
        let mut state = self.write();
        *state = ShoppingListData::default();
        self.revision.send_modify(|revision| *revision += 1);
        self.save_status.send_replace(SaveStatus::Saved);
    }

    // ─── Read accessors ─────────────────────────────────────────────────────

    pub fn snapshot(&self) -> ShoppingListData {
        self.read().clone()
    }

    pub fn items(&self) -> Vec<Item> {
        self.read().items.clone()
    }

    pub fn shops(&self) -> Vec<Shop> {
        self.read().shops.clone()
    }

    pub fn selection(&self) -> Vec<String> {
        self.read().selection.clone()
    }

    pub fn home_categories(&self) -> Vec<String> {
        self.read().home_categories.clone()
    }

    pub fn item_by_id(&self, item_id: &str) -> Option<Item> {
        self.read()
            .items
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
    }

    pub fn shop_by_id(&self, shop_id: &str) -> Option<Shop> {
        self.read()
            .shops
            .iter()
            .find(|shop| shop.id == shop_id)
            .cloned()
    }

    /// Items available at the shop, optionally narrowed to the selection.
    pub fn items_for_shop(&self, shop_id: &str, selected_only: bool) -> Vec<Item> {
        let state = self.read();
        state
            .items
            .iter()
            .filter(|item| {
                item.shop_availability
                    .iter()
                    .any(|availability| availability.shop_id == shop_id)
            })
            .filter(|item| !selected_only || state.selection.iter().any(|id| id == &item.id))
            .cloned()
            .collect()
    }

    /// Home view: every item grouped by storage location in display order.
    pub fn home_view(&self) -> Vec<CategoryGroup> {
        let state = self.read();
        group_by_home_category(&state.items, &state.home_categories)
    }

    /// Shop view: items available at the shop grouped by aisle in display
    /// order. `None` when the shop does not exist.
    pub fn shop_view(&self, shop_id: &str) -> Option<Vec<CategoryGroup>> {
        let state = self.read();
        let shop = state.shops.iter().find(|shop| shop.id == shop_id)?;
        Some(group_by_shop_category(&state.items, shop))
    }
}
