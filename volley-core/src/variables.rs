//! Per-thread variable store

use std::collections::HashMap;

/// Name of the variable holding the outcome of the previous sample in this thread
pub const LAST_SAMPLE_OK: &str = "__last_sample_ok";

/// String-keyed variables owned by exactly one virtual-user thread.
///
/// The store is never shared: every thread gets its own instance when it
/// starts and drops it when it finishes, so no locking is involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn put_all<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries ordered by key, for dumps and debugging output
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Reads the last-sample flag; a missing flag counts as success
    pub fn last_sample_ok(&self) -> bool {
        self.get(LAST_SAMPLE_OK)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true)
    }

    pub fn set_last_sample_ok(&mut self, ok: bool) {
        self.put(LAST_SAMPLE_OK, if ok { "true" } else { "false" });
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        vars.put_all(iter);
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let mut vars = Variables::new();
        assert!(vars.get("a").is_none());

        vars.put("a", "1");
        vars.put("a", "2");
        assert_eq!(vars.get("a"), Some("2"));
        assert_eq!(vars.len(), 1);

        assert_eq!(vars.remove("a"), Some("2".to_string()));
        assert!(vars.is_empty());
    }

    #[test]
    fn test_sorted_and_last_sample_flag() {
        let mut vars: Variables = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(vars.sorted(), vec![("a", "1"), ("b", "2")]);

        assert!(vars.last_sample_ok());
        vars.set_last_sample_ok(false);
        assert!(!vars.last_sample_ok());
        assert_eq!(vars.get(LAST_SAMPLE_OK), Some("false"));
    }
}
