use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SECLISTS_WEB: &str = "/usr/share/seclists/Discovery/Web-Content";

/// Named wordlists available to the fuzzing adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WordlistCatalog {
    entries: BTreeMap<String, String>,
}

impl Default for WordlistCatalog {
    fn default() -> Self {
        let entries = [
            ("common", "common.txt"),
            ("big", "big.txt"),
            ("directory-list-medium", "directory-list-2.3-medium.txt"),
        ]
        .into_iter()
        .map(|(name, file)| (name.to_string(), format!("{}/{}", SECLISTS_WEB, file)))
        .collect();

        Self { entries }
    }
}

impl WordlistCatalog {
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Adds or replaces entries, keeping the defaults that are not overridden.
    pub fn extend(&mut self, other: WordlistCatalog) {
        self.entries.extend(other.entries);
    }

    /// Resolve a wordlist name to its path. Anything that is not a known
    /// name is taken to be a path already.
    pub fn resolve(&self, name_or_path: &str) -> String {
        self.entries
            .get(name_or_path)
            .cloned()
            .unwrap_or_else(|| name_or_path.to_string())
    }

    /// Known wordlist names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn paths(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
