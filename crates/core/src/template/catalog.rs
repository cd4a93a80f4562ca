//! Cost catalog: the chart-of-accounts mapping used to match template
//! records against budget records.

use std::collections::{HashMap, HashSet};

/// Resolves free-form codes to canonical catalog codes.
pub trait CostCatalog: Send + Sync {
    /// Returns the canonical code if `code` is recognised.
    fn resolve(&self, code: &str) -> Option<String>;
}

/// Normalises a code for lookup: trimmed and uppercased.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// A fixed in-memory catalog with optional aliases.
#[derive(Debug, Clone, Default)]
pub struct StaticCostCatalog {
    codes: HashSet<String>,
    aliases: HashMap<String, String>,
}

impl StaticCostCatalog {
    /// Creates a catalog recognising the given codes.
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            codes: codes
                .into_iter()
                .map(|c| normalize_code(c.as_ref()))
                .filter(|c| !c.is_empty())
                .collect(),
            aliases: HashMap::new(),
        }
    }

    /// Maps `alias` onto a recognised `canonical` code.
    ///
    /// Aliases to unknown codes are ignored.
    #[must_use]
    pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
        let canonical = normalize_code(canonical);
        if self.codes.contains(&canonical) {
            self.aliases.insert(normalize_code(alias), canonical);
        }
        self
    }

    /// Number of recognised codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if the catalog recognises nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl CostCatalog for StaticCostCatalog {
    fn resolve(&self, code: &str) -> Option<String> {
        let code = normalize_code(code);
        if self.codes.contains(&code) {
            return Some(code);
        }
        self.aliases.get(&code).cloned()
    }
}
