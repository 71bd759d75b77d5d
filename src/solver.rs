//! The solver (Component E): an equation-rewriting walk over `(template,
//! data)` that fills the intermediate store.

use std::collections::HashMap;

use serde_json::Value;

use crate::prelude::*;
use crate::schema::TableId;
use crate::store::Store;
use crate::template::{HandlerKind, Node, NodePath, PathSegment, Symbol};

pub type Bindings = HashMap<Symbol, Value>;

/// Walks `template` against `data`, emitting one row per successful
/// sub-match into `store`. Expects `store` to already have been built from
/// the same (possibly repetition-wrapped) template.
pub fn solve(template: &Node, data: &Value, store: &Store) -> Result<Bindings, SolveError> {
    let path: NodePath = Vec::new();
    solve_node(template, data, store, &TableId::Root, &path)
}

fn solve_node(
    node: &Node,
    rhs: &Value,
    store: &Store,
    current_table: &TableId,
    path: &NodePath,
) -> Result<Bindings, SolveError> {
    match node {
        Node::Literal(expected) => {
            if rhs == expected {
                Ok(Bindings::new())
            } else {
                Err(NoMatch::new(path_string(path)).into())
            }
        }

        Node::Symbol(sym) => {
            let mut bindings = Bindings::new();
            bindings.insert(sym.clone(), rhs.clone());
            Ok(bindings)
        }

        Node::Transform(inner, transform) => {
            let preimage = transform
                .inverse
                .apply(rhs)
                .map_err(|e| SolveError::User(e))?;
            let mut child_path = path.clone();
            child_path.push(PathSegment::Inner);
            solve_node(inner, &preimage, store, current_table, &child_path)
        }

        Node::ErrorHandler(inner, kind) => {
            let mut child_path = path.clone();
            child_path.push(PathSegment::Inner);

            match solve_node(inner, rhs, store, current_table, &child_path) {
                Ok(bindings) => Ok(bindings),
                Err(SolveError::NoMatch(_)) => handle_failure(*kind, inner, store, current_table, path),
                Err(other) => Err(other),
            }
        }

        Node::Container(fields) => {
            let mut bindings = Bindings::new();
            let as_object = rhs.as_object();

            for (key, sub) in fields {
                let value = as_object
                    .and_then(|m| m.get(key))
                    .cloned()
                    .unwrap_or(Value::Null);

                let mut child_path = path.clone();
                child_path.push(PathSegment::Key(key.clone()));

                let sub_bindings = solve_node(sub, &value, store, current_table, &child_path)?;
                bindings.extend(sub_bindings);
            }

            Ok(bindings)
        }

        Node::Repetition(elements) => {
            let parent_table = current_table.clone();
            let parent_row = store.size(&parent_table);

            let rhs_list = rhs
                .as_array()
                .ok_or_else(|| NoMatch::new(path_string(path)))?;

            let mut successes = vec![0usize; elements.len()];

            for element in rhs_list {
                for (i, lhs_i) in elements.iter().enumerate() {
                    let mut elem_path = path.clone();
                    elem_path.push(PathSegment::Elem(i));
                    let elem_table = store.schema().table_of(&elem_path);

                    match solve_node(lhs_i, element, store, &elem_table, &elem_path) {
                        Ok(row) => {
                            store.append(&elem_table, row, parent_row)?;
                            successes[i] += 1;
                        }
                        Err(SolveError::NoMatch(_)) => continue,
                        Err(other) => return Err(other),
                    }
                }
            }

            if successes.iter().any(|&n| n == 0) {
                return Err(NoMatch::new(path_string(path)).into());
            }

            Ok(Bindings::new())
        }
    }
}

fn handle_failure(
    kind: HandlerKind,
    inner: &Node,
    store: &Store,
    current_table: &TableId,
    path: &NodePath,
) -> Result<Bindings, SolveError> {
    match kind {
        HandlerKind::Nullable => {
            let opened = store
                .schema()
                .handler_tables
                .get(path)
                .cloned()
                .unwrap_or_default();

            let parent_row = store.size(current_table);
            let mut assigned: HashMap<TableId, i64> = HashMap::new();

            for table in &opened {
                let parent = store.schema().parent_of.get(table).cloned();
                let parent_id = match &parent {
                    Some(p) if assigned.contains_key(p) => assigned[p],
                    _ => parent_row,
                };
                let id = store.append_null_row(table, parent_id)?;
                assigned.insert(table.clone(), id);
            }

            let outer = store
                .schema()
                .handler_outer_symbols
                .get(path)
                .cloned()
                .unwrap_or_else(|| crate::schema::outer_symbols(inner));

            Ok(outer.into_iter().map(|s| (s, Value::Null)).collect())
        }
    }
}

fn path_string(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "root".to_string();
    }
    let mut out = String::from("root");
    for seg in path {
        match seg {
            PathSegment::Key(k) => {
                out.push('.');
                out.push_str(k);
            }
            PathSegment::Elem(i) => out.push_str(&format!("[{i}]")),
            PathSegment::Inner => out.push_str(".~"),
        }
    }
    out
}
