//! Schema extraction (Component C): derive the table tree and per-table
//! symbol directory implied by a template, without touching any data.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;

use crate::template::{root_symbol, Node, NodePath, PathSegment, Symbol};
use crate::walker::Walker;

/// Identifies one table in the intermediate store. `Root` is the synthetic
/// singleton; every other table is keyed by the stable path to the
/// repetition element that owns it, so two distinct occurrences of a
/// structurally identical sub-template still get distinct tables.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    Root,
    Path(NodePath),
}

impl TableId {
    /// A stable, SQL-safe identifier for this table.
    pub fn sql_name(&self) -> String {
        match self {
            TableId::Root => root_symbol().name().to_string(),
            TableId::Path(path) => {
                let mut name = String::from("t");
                for seg in path {
                    name.push('_');
                    match seg {
                        PathSegment::Key(k) => {
                            name.push('k');
                            for c in k.chars() {
                                name.push(if c.is_ascii_alphanumeric() { c } else { '_' });
                            }
                        }
                        PathSegment::Elem(i) => name.push_str(&format!("e{i}")),
                        PathSegment::Inner => name.push('i'),
                    }
                }
                name
            }
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    /// All tables, parent-first (root always first).
    pub tables: Vec<TableId>,
    pub parent_of: HashMap<TableId, TableId>,
    /// The symbols declared syntactically inside a table's own repetition
    /// scope, excluding anything inside a nested repetition.
    pub columns: HashMap<TableId, BTreeSet<Symbol>>,
    /// First table in which a symbol appears.
    pub canonical: HashMap<Symbol, TableId>,
    /// Every table a symbol appears in, for symbols appearing in >=2 tables.
    pub repeated: HashMap<Symbol, Vec<TableId>>,
    /// For each `ErrorHandler` node (keyed by its path), every table opened
    /// within its inner template, in parent-first order.
    pub handler_tables: HashMap<NodePath, Vec<TableId>>,
    /// For each `ErrorHandler` node, the outer symbols of its inner template.
    pub handler_outer_symbols: HashMap<NodePath, Vec<Symbol>>,
}

impl Schema {
    pub fn build(template: &Node) -> Self {
        let mut builder = Builder::default();
        builder.tables.push(TableId::Root);
        builder.columns.insert(TableId::Root, BTreeSet::new());
        builder.walk(template, &[], &TableId::Root);
        builder.finish()
    }

    pub fn table_of(&self, path: &[PathSegment]) -> TableId {
        TableId::Path(path.to_vec())
    }
}

#[derive(Default)]
struct Builder {
    tables: Vec<TableId>,
    parent_of: HashMap<TableId, TableId>,
    columns: HashMap<TableId, BTreeSet<Symbol>>,
    occurrences: HashMap<Symbol, Vec<TableId>>,
    handler_tables: HashMap<NodePath, Vec<TableId>>,
    handler_outer_symbols: HashMap<NodePath, Vec<Symbol>>,
}

impl Builder {
    /// Walk `node` at `path`, recording its symbols under `table` (the
    /// nearest enclosing repetition table, or root).
    fn walk(&mut self, node: &Node, path: &NodePath, table: &TableId) {
        match node {
            Node::Literal(_) => {}
            Node::Symbol(sym) => {
                self.columns.entry(table.clone()).or_default().insert(sym.clone());
                self.occurrences.entry(sym.clone()).or_default().push(table.clone());
            }
            Node::Container(fields) => {
                for (key, sub) in fields {
                    let mut child_path = path.clone();
                    child_path.push(PathSegment::Key(key.clone()));
                    self.walk(sub, &child_path, table);
                }
            }
            Node::Transform(inner, _) => {
                let mut child_path = path.clone();
                child_path.push(PathSegment::Inner);
                self.walk(inner, &child_path, table);
            }
            Node::ErrorHandler(inner, _) => {
                let mut child_path = path.clone();
                child_path.push(PathSegment::Inner);

                let tables_before = self.tables.len();
                self.walk(inner, &child_path, table);

                let opened: Vec<TableId> = self.tables[tables_before..].to_vec();
                self.handler_tables.insert(path.clone(), opened);
                self.handler_outer_symbols
                    .insert(path.clone(), outer_symbols(inner));
            }
            Node::Repetition(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    let mut elem_path = path.clone();
                    elem_path.push(PathSegment::Elem(i));

                    let elem_table = TableId::Path(elem_path.clone());
                    self.tables.push(elem_table.clone());
                    self.parent_of.insert(elem_table.clone(), table.clone());
                    self.columns.insert(elem_table.clone(), BTreeSet::new());

                    self.walk(element, &elem_path, &elem_table);
                }
            }
        }
    }

    fn finish(self) -> Schema {
        let mut canonical = HashMap::new();
        let mut repeated = HashMap::new();

        for (sym, tables) in &self.occurrences {
            let tables: Vec<TableId> = tables.iter().cloned().unique().collect();
            if let Some(first) = tables.first() {
                canonical.insert(sym.clone(), first.clone());
            }
            if tables.len() > 1 {
                repeated.insert(sym.clone(), tables);
            }
        }

        Schema {
            tables: self.tables,
            parent_of: self.parent_of,
            columns: self.columns,
            canonical,
            repeated,
            handler_tables: self.handler_tables,
            handler_outer_symbols: self.handler_outer_symbols,
        }
    }
}

/// Every symbol in `node` reachable without crossing a repetition boundary.
pub fn outer_symbols(node: &Node) -> Vec<Symbol> {
    let cases: Vec<(
        crate::walker::Predicate,
        crate::walker::Handler<Vec<Symbol>>,
    )> = vec![
        (
            |n| matches!(n, Node::Symbol(_)),
            Box::new(|n, _, _| match n {
                Node::Symbol(sym) => vec![sym.clone()],
                _ => unreachable!(),
            }),
        ),
        (
            |n| matches!(n, Node::Container(_)),
            Box::new(|n, path, walker| {
                let Node::Container(fields) = n else { unreachable!() };
                let mut out = Vec::new();
                for (key, sub) in fields {
                    let mut child = path.clone();
                    child.push(PathSegment::Key(key.clone()));
                    out.extend(walker.walk(sub, &child));
                }
                out
            }),
        ),
        (
            |n| matches!(n, Node::Transform(..)),
            Box::new(|n, path, walker| {
                let Node::Transform(inner, _) = n else { unreachable!() };
                let mut child = path.clone();
                child.push(PathSegment::Inner);
                walker.walk(inner, &child)
            }),
        ),
        (
            |n| matches!(n, Node::ErrorHandler(..)),
            Box::new(|n, path, walker| {
                let Node::ErrorHandler(inner, _) = n else { unreachable!() };
                let mut child = path.clone();
                child.push(PathSegment::Inner);
                walker.walk(inner, &child)
            }),
        ),
        (|_| true, Box::new(|_, _, _| Vec::new())),
    ];

    let walker = Walker::new(cases);
    walker.walk(node, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Node;

    #[test]
    fn root_only_template_has_no_repetitions() {
        let tpl = Node::container([("name".into(), Node::symbol("name"))]);
        let schema = Schema::build(&tpl);
        assert_eq!(schema.tables, vec![TableId::Root]);
        assert!(schema.columns[&TableId::Root].contains(&Symbol::new("name")));
    }

    #[test]
    fn repetition_opens_a_table_per_element() {
        let tpl = Node::repetition([Node::container([("name".into(), Node::symbol("name"))])]);
        let schema = Schema::build(&tpl);
        assert_eq!(schema.tables.len(), 2);
        let table = TableId::Path(vec![PathSegment::Elem(0)]);
        assert_eq!(schema.parent_of[&table], TableId::Root);
        assert!(schema.columns[&table].contains(&Symbol::new("name")));
    }

    #[test]
    fn repeated_symbol_is_detected_across_tables() {
        let tpl = Node::container([
            (
                "names".into(),
                Node::repetition([Node::container([
                    ("ssn".into(), Node::symbol("ssn")),
                    ("name".into(), Node::symbol("name")),
                ])]),
            ),
            (
                "hats".into(),
                Node::repetition([Node::container([
                    ("ssn".into(), Node::symbol("ssn")),
                    ("color".into(), Node::symbol("color")),
                ])]),
            ),
        ]);
        let schema = Schema::build(&tpl);
        let ssn = Symbol::new("ssn");
        assert_eq!(schema.repeated[&ssn].len(), 2);
        assert!(!schema.repeated.contains_key(&Symbol::new("name")));
    }

    #[test]
    fn outer_symbols_stop_at_repetition_boundary() {
        let tpl = Node::container([
            ("name".into(), Node::symbol("name")),
            (
                "addresses".into(),
                Node::repetition([Node::container([("state".into(), Node::symbol("state"))])]),
            ),
        ]);
        let mut syms = outer_symbols(&tpl);
        syms.sort();
        assert_eq!(syms, vec![Symbol::new("name")]);
    }
}
