//! The template AST and symbol identity (Component A).

mod handler;
mod node;
mod symbol;
mod transform;

pub use handler::HandlerKind;
pub use node::{Node, NodePath, PathSegment};
pub use symbol::{root_symbol, Symbol};
pub use transform::{Mapper, Transform};

/// Canonical textual key for a host value, used anywhere a `serde_json::Value`
/// needs to act as a `HashMap`/`BTreeMap` key (JSON values themselves aren't
/// `Hash`): `Mapper::Map` lookups and the store's surrogate encoder both
/// resolve a value to this same key.
pub(crate) fn canonical_key(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
