use std::collections::HashMap;

use dashmap::DashMap;
use log::debug;

use crate::locks::is_same_or_descendant;

/// Dead properties set by PROPPATCH, keyed by resource href.
///
/// Entries are created lazily the first time a resource is touched.
#[derive(Debug, Default)]
pub struct PropertyStore {
    properties: DashMap<String, HashMap<String, String>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `href` has a property map, creating an empty one if needed.
    pub fn touch(&self, href: &str) {
        self.properties.entry(href.to_string()).or_default();
    }

    /// Snapshot of the properties of `href`, if it was ever touched.
    #[cfg(test)]
    pub fn get(&self, href: &str) -> Option<HashMap<String, String>> {
        self.properties.get(href).map(|props| props.clone())
    }

    /// Drop the properties of `href` and everything below it.
    pub fn purge(&self, href: &str) {
        let before = self.properties.len();
        self.properties
            .retain(|key, _| !is_same_or_descendant(key, href));
        let purged = before.saturating_sub(self.properties.len());
        if purged > 0 {
            debug!(target: "dav", "Purged properties of {purged} resource(s) under {href}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn touch_creates_empty_map_once() {
        let store = PropertyStore::new();
        assert_eq!(store.get("/a"), None);

        store.touch("/a");
        store.touch("/a");
        assert_eq!(store.get("/a"), Some(HashMap::new()));
    }

    #[test]
    fn purge_drops_subtree() {
        let store = PropertyStore::new();
        store.touch("/a");
        store.touch("/a/b");
        store.touch("/c");

        store.purge("/a");

        assert_eq!(store.get("/a"), None);
        assert_eq!(store.get("/a/b"), None);
        assert!(store.get("/c").is_some());
    }
}
