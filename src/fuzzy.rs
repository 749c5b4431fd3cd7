//! Fuzzy, suffix-stripping keyed lookup.
//!
//! Lets a family of source-type strings (`"syslog:rfc5424:v2"`,
//! `"syslog:rfc5424"`, `"syslog"`) share one registration by stripping a
//! configurable separator-delimited suffix repeatedly until a key matches.

use std::collections::HashMap;

/// A registry keyed by string, looked up with progressive suffix stripping:
/// `"syslog:rfc5424:v2"` falls back to `"syslog:rfc5424"`, then `"syslog"`,
/// splitting on the last occurrence of `separator` each time, until a key
/// matches or no separator remains.
pub struct FuzzyMap<V> {
    entries: HashMap<String, V>,
    separator: char,
}

impl<V> FuzzyMap<V> {
    pub fn new(separator: char) -> Self {
        FuzzyMap { entries: HashMap::new(), separator }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up `key` exactly first, then progressively strips the
    /// last-separator-delimited suffix until a match is found or the key is
    /// exhausted. Returns the value found and the exact key it matched on.
    pub fn get(&self, key: &str) -> Option<(&str, &V)> {
        let mut candidate = key;
        loop {
            if let Some(value) = self.entries.get(candidate) {
                return Some((candidate, value));
            }
            match candidate.rfind(self.separator) {
                Some(idx) => candidate = &candidate[..idx],
                None => return None,
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        let mut m: FuzzyMap<i32> = FuzzyMap::new(':');
        m.insert("syslog:rfc5424", 1);
        m.insert("syslog", 2);
        assert_eq!(m.get("syslog:rfc5424"), Some(("syslog:rfc5424", &1)));
    }

    #[test]
    fn strips_trailing_suffixes_until_match() {
        let mut m: FuzzyMap<i32> = FuzzyMap::new(':');
        m.insert("syslog", 2);
        assert_eq!(m.get("syslog:rfc5424:v2"), Some(("syslog", &2)));
    }

    #[test]
    fn no_match_returns_none() {
        let m: FuzzyMap<i32> = FuzzyMap::new(':');
        assert_eq!(m.get("unknown:thing"), None);
    }
}
