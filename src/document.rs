use crate::errors::{AppError, AppResult};
use crate::models::{Item, Shop, ShopAvailability, ShoppingListData};
use serde::Deserialize;

/// Render the aggregate as a YAML document.
pub fn serialize(data: &ShoppingListData) -> AppResult<String> {
    serde_yaml::to_string(data)
        .map_err(|error| AppError::Internal(format!("failed to serialize document: {error}")))
}

/// Parse a YAML document, migrating recognized legacy shapes into the
/// canonical aggregate before validating it. Fails before any state is
/// touched; the caller decides what to do with the error.
pub fn deserialize(text: &str) -> AppResult<ShoppingListData> {
    let raw: RawDocument = serde_yaml::from_str(text)
        .map_err(|error| AppError::Validation(format!("failed to parse document: {error}")))?;
    raw.normalize()
}

pub fn default_data() -> ShoppingListData {
    ShoppingListData::default()
}

/// Lenient mirror of the persisted document. Fields whose representation
/// changed over the format's history are untagged variant enums here and
/// collapse to the canonical shape in [`RawDocument::normalize`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    items: Vec<RawItem>,
    shops: Vec<RawShop>,
    #[serde(default)]
    selection: Option<SelectionRepr>,
    #[serde(default)]
    home_categories: Option<CategoryListRepr>,
    /// Predecessor key of `homeCategories`.
    #[serde(default)]
    home_category_order: Option<CategoryListRepr>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    home_category: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    shop_availability: Vec<RawAvailability>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAvailability {
    #[serde(default)]
    shop_id: String,
    #[serde(default)]
    shop_category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShop {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    categories: Option<CategoryListRepr>,
    /// Predecessor key of `categories`.
    #[serde(default)]
    category_order: Option<CategoryListRepr>,
}

/// `selection` was a plain id array in some file versions and a wrapper
/// object in others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    Ids(Vec<String>),
    Wrapped {
        #[serde(rename = "selectedItemIds")]
        selected_item_ids: Vec<String>,
    },
}

impl SelectionRepr {
    fn into_ids(self) -> Vec<String> {
        match self {
            Self::Ids(ids) => ids,
            Self::Wrapped { selected_item_ids } => selected_item_ids,
        }
    }
}

/// Category orders were plain name arrays in some file versions and
/// `{name, order}` pair lists in others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryListRepr {
    Names(Vec<String>),
    Ordered(Vec<OrderedName>),
}

#[derive(Debug, Deserialize)]
struct OrderedName {
    name: String,
    order: i64,
}

impl CategoryListRepr {
    fn into_names(self) -> Vec<String> {
        match self {
            Self::Names(names) => dedup_names(names),
            Self::Ordered(mut entries) => {
                entries.sort_by_key(|entry| entry.order);
                dedup_names(entries.into_iter().map(|entry| entry.name).collect())
            }
        }
    }
}

fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

impl RawDocument {
    fn normalize(self) -> AppResult<ShoppingListData> {
        let mut items = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.into_iter().enumerate() {
            if item.id.is_empty() {
                return Err(AppError::Validation(format!(
                    "invalid item at index {index}: id is required"
                )));
            }
            if item.name.is_empty() {
                return Err(AppError::Validation(format!(
                    "invalid item at index {index}: name is required"
                )));
            }
            if item.home_category.is_empty() {
                return Err(AppError::Validation(format!(
                    "invalid item at index {index}: homeCategory is required"
                )));
            }

            // Replacement semantics on duplicate shop entries: the last one wins,
            // matching what re-assigning the shop in the app would produce.
            let mut availability: Vec<ShopAvailability> = Vec::new();
            for (entry_index, entry) in item.shop_availability.into_iter().enumerate() {
                if entry.shop_id.is_empty() {
                    return Err(AppError::Validation(format!(
                        "invalid item at index {index}, shopAvailability at index {entry_index}: shopId is required"
                    )));
                }
                let normalized = ShopAvailability {
                    shop_id: entry.shop_id,
                    shop_category: entry.shop_category.filter(|category| !category.is_empty()),
                };
                availability.retain(|existing| existing.shop_id != normalized.shop_id);
                availability.push(normalized);
            }

            items.push(Item {
                id: item.id,
                name: item.name,
                home_category: item.home_category,
                notes: item.notes,
                shop_availability: availability,
            });
        }

        let mut shops = Vec::with_capacity(self.shops.len());
        for (index, shop) in self.shops.into_iter().enumerate() {
            if shop.id.is_empty() {
                return Err(AppError::Validation(format!(
                    "invalid shop at index {index}: id is required"
                )));
            }
            if shop.name.is_empty() {
                return Err(AppError::Validation(format!(
                    "invalid shop at index {index}: name is required"
                )));
            }
            let categories = shop
                .categories
                .or(shop.category_order)
                .map(CategoryListRepr::into_names)
                .unwrap_or_default();
            shops.push(Shop {
                id: shop.id,
                name: shop.name,
                categories,
            });
        }

        let selection = self
            .selection
            .map(SelectionRepr::into_ids)
            .unwrap_or_default();
        let home_categories = self
            .home_categories
            .or(self.home_category_order)
            .map(CategoryListRepr::into_names)
            .unwrap_or_default();

        Ok(ShoppingListData {
            items,
            shops,
            selection,
            home_categories,
        })
    }
}
