use std::collections::BTreeMap;

use serde_json::Value;

use super::{HandlerKind, Mapper, Symbol, Transform};

/// One segment of a path from the template root to a node. Paths are the
/// stable identity repetitions use to name their tables: two occurrences of
/// a structurally identical sub-template still land at distinct paths, and
/// therefore distinct tables, the way the schema extractor requires.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    Key(String),
    Elem(usize),
    Inner,
}

pub type NodePath = Vec<PathSegment>;

/// A template tree node. See the crate documentation for the semantics of
/// each variant.
#[derive(Clone, Debug)]
pub enum Node {
    /// Matches by host equality.
    Literal(Value),
    /// Binds the matched value to a name.
    Symbol(Symbol),
    /// Matches a keyed map; every template key must be present in the data
    /// (a missing key yields `null` unless an error handler intercepts).
    Container(BTreeMap<String, Node>),
    /// An ordered set of sub-templates, each tried against every element of
    /// the matched data list. Each sub-template owns its own table.
    Repetition(Vec<Node>),
    /// Pre-processes the rhs via the inverse mapper before matching `inner`,
    /// and post-processes assigned values via the forward mapper.
    Transform(Box<Node>, Transform),
    /// Attempts to match `inner`; on failure, invokes the named policy.
    ErrorHandler(Box<Node>, HandlerKind),
}

impl Node {
    pub fn literal(value: impl Into<Value>) -> Self {
        Node::Literal(value.into())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Node::Symbol(Symbol::new(name))
    }

    pub fn container(fields: impl IntoIterator<Item = (String, Node)>) -> Self {
        Node::Container(fields.into_iter().collect())
    }

    pub fn repetition(elements: impl IntoIterator<Item = Node>) -> Self {
        Node::Repetition(elements.into_iter().collect())
    }

    pub fn transform(inner: Node, forward: Mapper, inverse: Mapper) -> Self {
        Node::Transform(Box::new(inner), Transform::new(forward, inverse))
    }

    /// `ErrorHandler`-subtype factory: on failure to match `inner`, binds
    /// every outer symbol of `inner` to `null` instead of propagating.
    pub fn nullable(inner: Node) -> Self {
        Node::ErrorHandler(Box::new(inner), HandlerKind::Nullable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factories_build_expected_shapes() {
        let tpl = Node::container([("name".into(), Node::symbol("name"))]);
        match tpl {
            Node::Container(map) => assert!(matches!(map.get("name"), Some(Node::Symbol(_)))),
            _ => panic!("expected container"),
        }
    }
}
