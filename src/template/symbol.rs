use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A named free variable. Two symbols compare and hash equal iff their
/// names match - identity is purely nominal, never positional.
///
/// *Internal* symbols are engine-generated (the `root` table, parent-id
/// columns, freshly-minted list identities) and are excluded from
/// user-visible query results by [`Symbol::is_internal`].
#[derive(Clone, Debug)]
pub struct Symbol {
    name: Arc<str>,
    internal: bool,
}

static NEXT_INTERNAL_ID: AtomicU64 = AtomicU64::new(0);

impl Symbol {
    /// A user-facing symbol named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Symbol {
            name: Arc::from(name.into()),
            internal: false,
        }
    }

    /// An internal symbol bound to a chosen name (e.g. `_parent_id`).
    pub fn internal_named(name: impl Into<String>) -> Self {
        Symbol {
            name: Arc::from(name.into()),
            internal: true,
        }
    }

    /// A freshly minted internal symbol with a unique name.
    pub fn internal_fresh(prefix: &str) -> Self {
        let id = NEXT_INTERNAL_ID.fetch_add(1, Ordering::Relaxed);
        Symbol {
            name: Arc::from(format!("__{prefix}_{id}")),
            internal: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The synthetic root symbol naming the singleton `root` table.
pub fn root_symbol() -> Symbol {
    Symbol::internal_named("root")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_by_name() {
        assert_eq!(Symbol::new("x"), Symbol::new("x"));
        assert_ne!(Symbol::new("x"), Symbol::new("y"));
    }

    #[test]
    fn internal_symbols_are_marked() {
        assert!(!Symbol::new("x").is_internal());
        assert!(Symbol::internal_fresh("list").is_internal());
    }

    #[test]
    fn fresh_internal_symbols_are_unique() {
        let a = Symbol::internal_fresh("id");
        let b = Symbol::internal_fresh("id");
        assert_ne!(a, b);
    }
}
