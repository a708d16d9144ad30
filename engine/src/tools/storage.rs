//! Request-scoped element store
//!
//! Lookup tools put the element ids they return here under a normalized
//! category key, so a later `select_stored_elements` call can refer to them
//! by name instead of repeating every id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Mutex;
use tracing::info;

/// Element ids remembered under one storage key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredElements {
    pub category: String,
    pub element_ids: Vec<String>,
    pub count: usize,
    pub stored_at: DateTime<Utc>,
}

/// Normalize a category name into a storage key
///
/// `"OST_Doors"` and `"Doors"` both become `"doors"`; spaces become underscores.
pub fn storage_key(category_name: &str) -> String {
    let key = category_name.trim().to_lowercase().replace(' ', "_");
    match key.strip_prefix("ost_") {
        Some(stripped) => stripped.to_string(),
        None => key,
    }
}

/// Storage key for `filter_elements` results
pub fn filter_storage_key(category_name: &str, level_name: Option<&str>, has_parameters: bool) -> String {
    let mut key = storage_key(category_name);
    if let Some(level) = level_name.filter(|l| !l.is_empty()) {
        key.push_str("_level_");
        key.push_str(&level.to_lowercase().replace(' ', "_"));
    }
    if has_parameters {
        key.push_str("_filtered");
    }
    key
}

/// Insertion-ordered store; re-storing a key moves it to the end.
#[derive(Debug, Default)]
pub struct ElementStore {
    entries: Mutex<Vec<(String, StoredElements)>>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut Vec<(String, StoredElements)>) -> R) -> R {
        let mut guard = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Store element ids under `key`, replacing any earlier entry
    pub fn store(&self, key: &str, category: &str, element_ids: Vec<String>, count: usize) -> String {
        let key = storage_key(key);
        let entry = StoredElements {
            category: category.to_string(),
            element_ids,
            count,
            stored_at: Utc::now(),
        };
        info!("Stored {} element ids for '{}' under '{}'", count, category, key);

        self.with_entries(|entries| {
            entries.retain(|(k, _)| k != &key);
            entries.push((key.clone(), entry));
        });
        key
    }

    /// Find stored elements by name.
    ///
    /// Tries an exact key match, then the most recent key starting with the
    /// name, then the most recent key containing it.
    pub fn lookup(&self, name: &str) -> Option<(String, StoredElements)> {
        let wanted = storage_key(name);
        if wanted.is_empty() {
            return None;
        }

        self.with_entries(|entries| {
            let exact = entries.iter().find(|(k, _)| *k == wanted);
            let prefix = || entries.iter().rev().find(|(k, _)| k.starts_with(&wanted));
            let contains = || entries.iter().rev().find(|(k, _)| k.contains(&wanted));

            exact.or_else(prefix).or_else(contains).cloned()
        })
    }

    pub fn keys(&self) -> Vec<String> {
        self.with_entries(|entries| entries.iter().map(|(k, _)| k.clone()).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.with_entries(|entries| entries.is_empty())
    }

    /// Summary of every stored key, as returned by `list_stored_elements`
    pub fn summary(&self) -> Value {
        self.with_entries(|entries| {
            let mut categories = Map::new();
            for (key, stored) in entries.iter() {
                categories.insert(
                    key.clone(),
                    json!({
                        "category": stored.category,
                        "count": stored.count,
                        "stored_at": stored.stored_at.to_rfc3339(),
                    }),
                );
            }
            json!({
                "status": "success",
                "message": format!("Found {} stored categories", entries.len()),
                "stored_categories": categories,
                "total_categories": entries.len(),
            })
        })
    }
}
