//! Categorical breakdowns of view events

use serde::Serialize;
use std::collections::HashMap;

use super::referrer::classify_referrer;
use crate::models::ViewEvent;

pub const UNKNOWN: &str = "unknown";

/// Number of records sharing one categorical key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub key: String,
    pub count: u64,
}

/// Group records by key in a single pass.
///
/// Entries come out in order of first occurrence. Records for which `key_of`
/// returns `None` are left out entirely.
pub fn breakdown<T, F>(records: &[T], key_of: F) -> Vec<CategoryCount>
where
    F: Fn(&T) -> Option<String>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<CategoryCount> = Vec::new();

    for record in records {
        let Some(key) = key_of(record) else {
            continue;
        };
        match index.get(&key) {
            Some(&i) => entries[i].count += 1,
            None => {
                index.insert(key.clone(), entries.len());
                entries.push(CategoryCount { key, count: 1 });
            }
        }
    }

    entries
}

pub fn source_key(event: &ViewEvent) -> Option<String> {
    Some(classify_referrer(event.referrer.as_deref()))
}

pub fn device_key(event: &ViewEvent) -> Option<String> {
    Some(
        event
            .device
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string(),
    )
}

/// Country key. Events without a country are dropped rather than counted as
/// unknown.
pub fn country_key(event: &ViewEvent) -> Option<String> {
    event.country.clone()
}
