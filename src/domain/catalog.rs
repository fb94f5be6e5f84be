//! Price/name catalog and model class labels
//!
//! Both are built once at startup and shared read-only (`Arc`) afterwards.

use crate::error::CatalogError;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

/// One sellable item class
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    pub class_key: String,
    pub unit_price: u64,
    pub display_name: String,
}

impl CatalogEntry {
    pub fn new(class_key: &str, unit_price: u64, display_name: &str) -> Self {
        Self {
            class_key: class_key.to_string(),
            unit_price,
            display_name: display_name.to_string(),
        }
    }
}

/// Immutable class -> (unit price, display name) lookup, in declaration order
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: FxHashMap<String, usize>,
}

impl Catalog {
    /// Class keys and display names must both be unique; the price list is
    /// keyed by display name.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut index = FxHashMap::default();
        let mut display_names = FxHashSet::default();
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.class_key.clone(), i).is_some() {
                return Err(CatalogError::DuplicateClass(entry.class_key.clone()));
            }
            if !display_names.insert(entry.display_name.as_str()) {
                return Err(CatalogError::DuplicateDisplayName(entry.display_name.clone()));
            }
        }
        Ok(Self { entries, index })
    }

    /// The bakery's standard menu
    pub fn bakery_default() -> Self {
        let entries = vec![
            CatalogEntry::new("croissant", 3200, "오리지널크라상"),
            CatalogEntry::new("salt_bread", 2800, "소금버터롤"),
            CatalogEntry::new("cookie", 4200, "다크초코피넛버터쿠키"),
            CatalogEntry::new("eggmayo", 4500, "에그마요소금버터롤"),
            CatalogEntry::new("muffin", 4500, "초코청크머핀"),
            CatalogEntry::new("pie", 4700, "호두파이(조각)"),
            CatalogEntry::new("twisted_bread", 3500, "츄러스꽈배기"),
        ];
        Self::new(entries).expect("default catalog keys are unique")
    }

    pub fn get(&self, class_key: &str) -> Option<&CatalogEntry> {
        self.index.get(class_key).map(|&i| &self.entries[i])
    }

    /// Unit price, or 0 for a class the catalog does not know
    pub fn unit_price(&self, class_key: &str) -> u64 {
        self.get(class_key).map_or(0, |e| e.unit_price)
    }

    /// Display name, falling back to the class key itself
    pub fn display_name<'a>(&'a self, class_key: &'a str) -> &'a str {
        self.get(class_key).map_or(class_key, |e| e.display_name.as_str())
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// (display name, price) pairs in catalog order
    pub fn price_list(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|e| (e.display_name.as_str(), e.unit_price))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Class id -> class key table, in the order the model was trained with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Labels in catalog order, used when the model config does not list them
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::new(catalog.entries().iter().map(|e| e.class_key.clone()).collect())
    }

    /// Resolve a class id; ids the table does not cover become `class_<id>`
    pub fn key_for(&self, class_id: u32) -> String {
        self.names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = Catalog::bakery_default();
        assert_eq!(catalog.len(), 7);
        assert_eq!(catalog.unit_price("croissant"), 3200);
        assert_eq!(catalog.unit_price("twisted_bread"), 3500);
        assert_eq!(catalog.display_name("muffin"), "초코청크머핀");
    }

    #[test]
    fn test_unknown_class_defaults() {
        let catalog = Catalog::bakery_default();
        assert_eq!(catalog.unit_price("unknown_item"), 0);
        assert_eq!(catalog.display_name("unknown_item"), "unknown_item");
        assert!(catalog.get("unknown_item").is_none());
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let result = Catalog::new(vec![
            CatalogEntry::new("pie", 4700, "pie"),
            CatalogEntry::new("pie", 100, "cheap pie"),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateClass(key)) if key == "pie"));
    }

    #[test]
    fn test_duplicate_display_name_rejected() {
        let result = Catalog::new(vec![
            CatalogEntry::new("pie", 4700, "파이"),
            CatalogEntry::new("walnut_pie", 5200, "파이"),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateDisplayName(name)) if name == "파이"));
    }

    #[test]
    fn test_price_list_keeps_order() {
        let catalog = Catalog::bakery_default();
        let list: Vec<(&str, u64)> = catalog.price_list().collect();
        assert_eq!(list[0], ("오리지널크라상", 3200));
        assert_eq!(list[6], ("츄러스꽈배기", 3500));
    }

    #[test]
    fn test_labels_from_catalog() {
        let labels = ClassLabels::from_catalog(&Catalog::bakery_default());
        assert_eq!(labels.key_for(0), "croissant");
        assert_eq!(labels.key_for(4), "muffin");
        assert_eq!(labels.key_for(42), "class_42");
    }
}
