use std::collections::HashSet;
use crate::data::types::ForecastItem;

pub const DEFAULT_MAX_ITEMS: usize = 20;

/// Drop repeated `(source, title)` pairs (case-insensitive, first wins) and
/// keep at most `max_items`, preserving merge order.
pub fn dedupe_and_cap(items: Vec<ForecastItem>, max_items: usize) -> Vec<ForecastItem> {
    let mut seen = HashSet::new();

    items
        .into_iter()
        .filter(|item| seen.insert(item.dedup_key()))
        .take(max_items)
        .collect()
}
