//! Query parameters as an explicit ordered multi-map.
//!
//! Call sites can hand over pairs, maps, a raw query string, or nothing at
//! all. An absent collection normalizes to an empty map rather than an
//! omitted one, so the dispatcher always sees an explicit (possibly empty)
//! parameter set.

use std::collections::{BTreeMap, HashMap};

/// Ordered multi-map of query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> QueryParams {
        QueryParams::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Replace every value under `key` with a single entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.pairs.retain(|(k, _)| *k != key);
        self.pairs.push((key, value.into()));
    }

    /// Add an entry without touching existing values under the same key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Drop every entry under `key`.
    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    /// First value under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<()> for QueryParams {
    fn from(_: ()) -> QueryParams {
        QueryParams::new()
    }
}

// Absent parameter collections normalize to empty, not omitted.
impl<T: Into<QueryParams>> From<Option<T>> for QueryParams {
    fn from(value: Option<T>) -> QueryParams {
        value.map(Into::into).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for QueryParams {
    fn from(pairs: Vec<(K, V)>) -> QueryParams {
        QueryParams {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String> + Clone, V: Into<String> + Clone> From<&[(K, V)]> for QueryParams {
    fn from(pairs: &[(K, V)]) -> QueryParams {
        QueryParams {
            pairs: pairs
                .iter()
                .map(|(k, v)| (k.clone().into(), v.clone().into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for QueryParams {
    fn from(pairs: [(K, V); N]) -> QueryParams {
        QueryParams {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<HashMap<K, V>> for QueryParams {
    fn from(map: HashMap<K, V>) -> QueryParams {
        QueryParams {
            pairs: map.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for QueryParams {
    fn from(map: BTreeMap<K, V>) -> QueryParams {
        QueryParams {
            pairs: map.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// A raw query string, with or without the leading `?`.
impl From<&str> for QueryParams {
    fn from(raw: &str) -> QueryParams {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        QueryParams {
            pairs: url::form_urlencoded::parse(raw.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }
}
