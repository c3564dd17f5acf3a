use crate::models::{CategoryGroup, Item, Shop};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Synthetic bucket for items assigned to a shop without an aisle.
/// A user category with this exact name merges into the synthetic bucket.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Group items by their home storage location.
///
/// Buckets named in `order` come first, in that order; the rest follow
/// lexicographically. Only categories with at least one item appear.
pub fn group_by_home_category(items: &[Item], order: &[String]) -> Vec<CategoryGroup> {
    let mut buckets: BTreeMap<&str, Vec<Item>> = BTreeMap::new();
    for item in items {
        buckets
            .entry(item.home_category.as_str())
            .or_default()
            .push(item.clone());
    }

    let mut groups: Vec<CategoryGroup> = buckets
        .into_iter()
        .map(|(name, items)| CategoryGroup {
            name: name.to_string(),
            items,
        })
        .collect();
    groups.sort_by(|a, b| compare_categories(&a.name, &b.name, order));
    groups
}

/// Group items by their aisle at the given shop. Items with no availability
/// entry for the shop do not participate. The "Uncategorized" bucket always
/// sorts last; a deliberately ordered aisle is never displaced by it.
pub fn group_by_shop_category(items: &[Item], shop: &Shop) -> Vec<CategoryGroup> {
    let mut buckets: BTreeMap<String, Vec<Item>> = BTreeMap::new();
    for item in items {
        let Some(availability) = item
            .shop_availability
            .iter()
            .find(|availability| availability.shop_id == shop.id)
        else {
            continue;
        };
        let name = match availability.shop_category.as_deref() {
            Some(category) if !category.is_empty() => category.to_string(),
            _ => UNCATEGORIZED.to_string(),
        };
        buckets.entry(name).or_default().push(item.clone());
    }

    let mut groups: Vec<CategoryGroup> = buckets
        .into_iter()
        .map(|(name, items)| CategoryGroup { name, items })
        .collect();
    groups.sort_by(|a, b| match (a.name == UNCATEGORIZED, b.name == UNCATEGORIZED) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_categories(&a.name, &b.name, &shop.categories),
    });
    groups
}

fn compare_categories(a: &str, b: &str, order: &[String]) -> Ordering {
    let position = |name: &str| order.iter().position(|entry| entry == name);
    match (position(a), position(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Distinct home categories currently in use, sorted.
pub fn unique_home_categories(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.home_category.clone())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Distinct aisles currently in use at the given shop, sorted. Entries with
/// no aisle are skipped; the synthetic bucket never enters an order list.
pub fn unique_shop_categories(items: &[Item], shop_id: &str) -> Vec<String> {
    let mut names = BTreeSet::new();
    for item in items {
        let Some(availability) = item
            .shop_availability
            .iter()
            .find(|availability| availability.shop_id == shop_id)
        else {
            continue;
        };
        if let Some(category) = availability.shop_category.as_deref() {
            if !category.is_empty() {
                names.insert(category.to_string());
            }
        }
    }
    names.into_iter().collect()
}

/// Merge newly observed category names into an existing order list.
///
/// Existing entries keep their positions exactly, including names no longer
/// in use. Missing observed names are appended at the end in lexicographic
/// order. Never reorders, removes, or duplicates.
pub fn ensure_categories(observed: &[String], existing: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    let mut missing: Vec<&String> = observed
        .iter()
        .filter(|name| !existing.contains(name))
        .collect();
    missing.sort();
    missing.dedup();
    merged.extend(missing.into_iter().cloned());
    merged
}

/// Swap the named category with its predecessor. Unknown names and the
/// first position are no-ops. Returns whether the order changed.
pub fn move_category_up(order: &mut [String], name: &str) -> bool {
    let Some(index) = order.iter().position(|entry| entry == name) else {
        return false;
    };
    if index == 0 {
        return false;
    }
    order.swap(index - 1, index);
    true
}

/// Swap the named category with its successor. Unknown names and the last
/// position are no-ops. Returns whether the order changed.
pub fn move_category_down(order: &mut [String], name: &str) -> bool {
    let Some(index) = order.iter().position(|entry| entry == name) else {
        return false;
    };
    if index + 1 >= order.len() {
        return false;
    }
    order.swap(index, index + 1);
    true
}

#[cfg(test)]
mod tests {
    use super::{
        ensure_categories, group_by_home_category, group_by_shop_category, move_category_down,
        move_category_up, unique_home_categories, unique_shop_categories, UNCATEGORIZED,
    };
    use crate::models::{Item, Shop, ShopAvailability};

    fn item(id: &str, name: &str, home_category: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            home_category: home_category.to_string(),
            notes: None,
            shop_availability: Vec::new(),
        }
    }

    fn item_at_shop(id: &str, name: &str, shop_id: &str, category: Option<&str>) -> Item {
        let mut built = item(id, name, "Pantry");
        built.shop_availability.push(ShopAvailability {
            shop_id: shop_id.to_string(),
            shop_category: category.map(str::to_string),
        });
        built
    }

    fn shop(id: &str, categories: &[&str]) -> Shop {
        Shop {
            id: id.to_string(),
            name: "Test Shop".to_string(),
            categories: categories.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn order(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn home_grouping_partitions_without_loss_or_duplication() {
        let items = vec![
            item("i1", "Milk", "Fridge"),
            item("i2", "Flour", "Pantry"),
            item("i3", "Butter", "Fridge"),
        ];
        let groups = group_by_home_category(&items, &[]);

        assert_eq!(groups.len(), 2);
        let total: usize = groups.iter().map(|group| group.items.len()).sum();
        assert_eq!(total, items.len());
        let fridge = groups
            .iter()
            .find(|group| group.name == "Fridge")
            .expect("fridge bucket");
        assert_eq!(fridge.items.len(), 2);
    }

    #[test]
    fn home_grouping_follows_custom_order() {
        let items = vec![item("i1", "Milk", "A"), item("i2", "Rice", "B")];
        let groups = group_by_home_category(&items, &order(&["B", "A"]));
        let names: Vec<&str> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn unordered_categories_sort_after_ordered_ones_lexicographically() {
        let items = vec![
            item("i1", "a", "Zebra"),
            item("i2", "b", "Apple"),
            item("i3", "c", "Listed"),
        ];
        let groups = group_by_home_category(&items, &order(&["Listed"]));
        let names: Vec<&str> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, vec!["Listed", "Apple", "Zebra"]);
    }

    #[test]
    fn home_grouping_without_order_sorts_lexicographically() {
        let items = vec![
            item("i1", "a", "Spices"),
            item("i2", "b", "Fridge"),
            item("i3", "c", "Pantry"),
        ];
        let groups = group_by_home_category(&items, &[]);
        let names: Vec<&str> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, vec!["Fridge", "Pantry", "Spices"]);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_by_home_category(&[], &order(&["A"])).is_empty());
        assert!(group_by_shop_category(&[], &shop("s1", &["A"])).is_empty());
    }

    #[test]
    fn shop_grouping_skips_items_not_at_the_shop() {
        let items = vec![
            item_at_shop("i1", "Milk", "s1", Some("Dairy")),
            item_at_shop("i2", "Rice", "s2", Some("Grains")),
        ];
        let groups = group_by_shop_category(&items, &shop("s1", &[]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Dairy");
        assert_eq!(groups[0].items[0].id, "i1");
    }

    #[test]
    fn missing_or_empty_aisle_lands_in_uncategorized() {
        let items = vec![
            item_at_shop("i1", "Milk", "s1", None),
            item_at_shop("i2", "Rice", "s1", Some("")),
        ];
        let groups = group_by_shop_category(&items, &shop("s1", &[]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, UNCATEGORIZED);
        assert_eq!(groups[0].items.len(), 2);
    }

    #[test]
    fn uncategorized_always_sorts_last() {
        let items = vec![
            item_at_shop("i1", "Milk", "s1", None),
            item_at_shop("i2", "Rice", "s1", Some("Aisle 9")),
            item_at_shop("i3", "Jam", "s1", Some("Aisle 1")),
        ];
        let groups = group_by_shop_category(&items, &shop("s1", &["Aisle 9"]));
        let names: Vec<&str> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, vec!["Aisle 9", "Aisle 1", UNCATEGORIZED]);
    }

    #[test]
    fn uncategorized_sorts_last_even_when_present_in_the_order_list() {
        let items = vec![
            item_at_shop("i1", "Milk", "s1", None),
            item_at_shop("i2", "Rice", "s1", Some("Grains")),
        ];
        let groups =
            group_by_shop_category(&items, &shop("s1", &[UNCATEGORIZED, "Grains"]));
        let names: Vec<&str> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, vec!["Grains", UNCATEGORIZED]);
    }

    #[test]
    fn user_category_named_uncategorized_merges_into_the_synthetic_bucket() {
        let items = vec![
            item_at_shop("i1", "Milk", "s1", Some(UNCATEGORIZED)),
            item_at_shop("i2", "Rice", "s1", None),
        ];
        let groups = group_by_shop_category(&items, &shop("s1", &[]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, UNCATEGORIZED);
        assert_eq!(groups[0].items.len(), 2);
    }

    #[test]
    fn unique_home_categories_are_sorted_and_deduplicated() {
        let items = vec![
            item("i1", "a", "Pantry"),
            item("i2", "b", "Fridge"),
            item("i3", "c", "Pantry"),
        ];
        assert_eq!(unique_home_categories(&items), order(&["Fridge", "Pantry"]));
    }

    #[test]
    fn unique_shop_categories_skip_the_synthetic_bucket() {
        let items = vec![
            item_at_shop("i1", "Milk", "s1", Some("Dairy")),
            item_at_shop("i2", "Rice", "s1", None),
            item_at_shop("i3", "Jam", "s2", Some("Preserves")),
        ];
        assert_eq!(unique_shop_categories(&items, "s1"), order(&["Dairy"]));
    }

    #[test]
    fn ensure_categories_appends_new_names_in_sorted_order() {
        let merged = ensure_categories(
            &order(&["Zebra", "Apple"]),
            &order(&["Pantry", "Fridge"]),
        );
        assert_eq!(merged, order(&["Pantry", "Fridge", "Apple", "Zebra"]));
    }

    #[test]
    fn ensure_categories_preserves_existing_positions() {
        let existing = order(&["C", "A", "B"]);
        let merged = ensure_categories(&order(&["A", "D"]), &existing);
        assert_eq!(&merged[..3], &existing[..]);
        assert_eq!(merged[3], "D");
    }

    #[test]
    fn ensure_categories_keeps_tombstones() {
        // "Cellar" has no items anymore but stays where the user put it.
        let merged = ensure_categories(&order(&["Fridge"]), &order(&["Cellar", "Fridge"]));
        assert_eq!(merged, order(&["Cellar", "Fridge"]));
    }

    #[test]
    fn ensure_categories_is_idempotent() {
        let observed = order(&["B", "A", "C"]);
        let once = ensure_categories(&observed, &order(&["C"]));
        let twice = ensure_categories(&observed, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn ensure_categories_never_duplicates() {
        let merged = ensure_categories(&order(&["A", "A", "B"]), &order(&["B"]));
        assert_eq!(merged, order(&["B", "A"]));
    }

    #[test]
    fn move_up_and_down_are_inverse_at_interior_positions() {
        let original = order(&["A", "B", "C"]);

        let mut moved = original.clone();
        assert!(move_category_up(&mut moved, "B"));
        assert!(move_category_down(&mut moved, "B"));
        assert_eq!(moved, original);

        let mut moved = original.clone();
        assert!(move_category_down(&mut moved, "B"));
        assert!(move_category_up(&mut moved, "B"));
        assert_eq!(moved, original);
    }

    #[test]
    fn moves_at_boundaries_are_no_ops() {
        let mut categories = order(&["A", "B"]);
        assert!(!move_category_up(&mut categories, "A"));
        assert!(!move_category_down(&mut categories, "B"));
        assert_eq!(categories, order(&["A", "B"]));
    }

    #[test]
    fn moving_an_unknown_name_is_a_no_op() {
        let mut categories = order(&["A", "B"]);
        assert!(!move_category_up(&mut categories, "missing"));
        assert!(!move_category_down(&mut categories, "missing"));
        assert_eq!(categories, order(&["A", "B"]));
    }

    #[test]
    fn move_up_swaps_adjacent_entries() {
        let mut categories = order(&["A", "B", "C"]);
        assert!(move_category_up(&mut categories, "C"));
        assert_eq!(categories, order(&["A", "C", "B"]));
    }
}
