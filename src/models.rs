use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveStatus {
    Saved,
    Unsaved,
    Saving,
    Error,
}

impl SaveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::Unsaved => "unsaved",
            Self::Saving => "saving",
            Self::Error => "error",
        }
    }
}

/// A shop the item can be bought at, with the aisle it is found in there.
/// `shop_category: None` puts the item in the synthetic "Uncategorized"
/// bucket for that shop. At most one entry exists per (item, shop) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopAvailability {
    pub shop_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub home_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub shop_availability: Vec<ShopAvailability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: String,
    pub name: String,
    /// User-customizable aisle order. Empty means no custom order yet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

/// The whole persisted aggregate. Loaded and saved atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingListData {
    pub items: Vec<Item>,
    pub shops: Vec<Shop>,
    /// Ids of items currently marked as needed.
    #[serde(default)]
    pub selection: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub home_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    pub home_category: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub shop_availability: Vec<ShopAvailability>,
}

/// Partial update; `None` fields keep their current value. Id is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub home_category: Option<String>,
    pub notes: Option<String>,
    pub shop_availability: Option<Vec<ShopAvailability>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShop {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopUpdate {
    pub name: Option<String>,
    pub categories: Option<Vec<String>>,
}

/// One ordered category bucket of a grouped view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup {
    pub name: String,
    pub items: Vec<Item>,
}
