//! Upstream session cookies.
//!
//! A [`CookieSet`] is the whole identity of an upstream session: a flat
//! mapping of cookie name to value. It is only ever grown by merging the
//! cookies a response hands back, or replaced wholesale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Length of the value prefix kept by [`CookieSet::redacted`].
const PREVIEW_LEN: usize = 10;

// ============================================================================
// Cookie Set
// ============================================================================

/// Mapping of cookie name to value representing an upstream session.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieSet {
    cookies: BTreeMap<String, String>,
}

impl CookieSet {
    /// Creates an empty cookie set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns true if the cookie is present.
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Sets a single cookie, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Merges `other` into this set. Values from `other` win.
    pub fn merge(&mut self, other: &CookieSet) {
        for (name, value) in &other.cookies {
            self.cookies.insert(name.clone(), value.clone());
        }
    }

    /// Returns a new set holding `self` merged with `other`.
    #[must_use]
    pub fn merged(&self, other: &CookieSet) -> CookieSet {
        let mut next = self.clone();
        next.merge(other);
        next
    }

    /// Number of cookies.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns true if there are no cookies.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Iterates over cookie names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }

    /// Iterates over `(name, value)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the set as a `Cookie` request header value.
    pub fn to_header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Returns a copy with every value cut down to a short prefix, for logs.
    pub fn redacted(&self) -> BTreeMap<String, String> {
        self.cookies
            .iter()
            .map(|(name, value)| {
                let preview = if value.chars().count() > PREVIEW_LEN {
                    let head: String = value.chars().take(PREVIEW_LEN).collect();
                    format!("{head}...")
                } else {
                    value.clone()
                };
                (name.clone(), preview)
            })
            .collect()
    }
}

impl fmt::Debug for CookieSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.redacted()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CookieSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cookies: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for CookieSet {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
