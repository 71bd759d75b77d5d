//! A relational template-matching engine.
//!
//! A *template* combines symbols, containers, repetitions, transforms and
//! literals into a pattern. [`solve`] walks a template against concrete
//! data, binding symbols into a relational [`Store`]; [`substitute`]
//! consumes a store (or a plain binding map) to reassemble an output
//! template into concrete data. The same symbol appearing in two positions
//! forces an equality join; a symbol inside a repeated position produces a
//! cross-product of rows.

pub mod error;
pub mod prelude;
mod schema;
mod solver;
mod store;
mod substitute;
mod template;
pub mod tracing_init;
mod walker;

use serde_json::Value;

pub use error::{AssignError, Error, NoMatch, Result, SolveError, StoreError};
pub use schema::{Schema, TableId};
pub use solver::Bindings;
pub use store::{ColumnType, QuerySymbols, Store, StoreConfig};
pub use substitute::{Source, Substituted};
pub use template::{root_symbol, HandlerKind, Mapper, Node, NodePath, PathSegment, Symbol, Transform};

/// Matches `template` against `data`, returning the filled intermediate.
///
/// When `template` is not itself a repetition, both `template` and `data`
/// are wrapped in a one-element repetition first, guaranteeing there is
/// always a top-level table to query against. Raises [`SolveError::NoMatch`]
/// if any repetition finds zero matching elements.
pub fn solve(template: Node, data: &Value) -> std::result::Result<Store, SolveError> {
    solve_with_config(template, data, StoreConfig::default())
}

/// As [`solve`], with explicit store configuration (declared symbol types,
/// pool size).
pub fn solve_with_config(
    template: Node,
    data: &Value,
    config: StoreConfig,
) -> std::result::Result<Store, SolveError> {
    let (template, data) = wrap_if_needed(template, data);

    let mut store = Store::build(&template, config)?;
    solver::solve(&template, &data, &store)?;
    store.finish()?;

    Ok(store)
}

fn wrap_if_needed(template: Node, data: &Value) -> (Node, Value) {
    match template {
        Node::Repetition(_) => (template, data.clone()),
        other => (
            Node::Repetition(vec![other]),
            Value::Array(vec![data.clone()]),
        ),
    }
}

/// Substitutes bindings into `template`. `source` may be a single binding
/// map, a slice of them, or a filled [`Store`]; see [`Source`].
pub fn substitute(
    template: &Node,
    source: Source<'_>,
    known_values: &Bindings,
) -> std::result::Result<Substituted, AssignError> {
    substitute::substitute(template, source, known_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    #[test]
    fn single_match() {
        let template = Node::container([("name".into(), Node::symbol("name"))]);
        let data = serde_json::json!({"name": "john"});

        let store = solve(template.clone(), &data).unwrap();
        let solution = store.get_single().unwrap();

        let mut known_values = HashMap::new();
        known_values.extend(solution);

        let result = substitute(&template, Source::One(&known_values), &HashMap::new()).unwrap();
        match result {
            Substituted::Single(v) => assert_eq!(v, serde_json::json!({"name": "john"})),
            _ => panic!("expected a single value"),
        }
    }

    #[test]
    fn two_matches() {
        let template = Node::repetition([Node::container([("name".into(), Node::symbol("name"))])]);
        let data = serde_json::json!([{"name": "john"}, {"name": "abe"}]);

        let store = solve(template, &data).unwrap();

        let inner = Node::container([("name".into(), Node::symbol("name"))]);
        let results = substitute(&inner, Source::Store(&store), &HashMap::new()).unwrap();

        let mut names: Vec<Value> = results
            .into_vec()
            .into_iter()
            .map(|v| v["name"].clone())
            .collect();
        names.sort_by_key(|v| v.to_string());

        assert_eq!(names, vec![Value::from("abe"), Value::from("john")]);
    }

    #[test]
    fn filter_idiom() {
        let template = Node::repetition([Node::container([
            ("state".into(), Node::literal("CT")),
            ("name".into(), Node::symbol("name")),
        ])]);
        let data = serde_json::json!([
            {"state": "CT", "name": "a"},
            {"state": "WA", "name": "b"},
        ]);

        let store = solve(template, &data).unwrap();
        let rows = store.iterate().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][&Symbol::new("name")], Value::from("a"));
    }

    #[test]
    fn nullable_with_no_match() {
        let template = Node::container([(
            "person".into(),
            Node::nullable(Node::repetition([Node::container([(
                "name".into(),
                Node::symbol("name"),
            )])])),
        )]);
        let data = serde_json::json!({});

        let store = solve(template, &data).unwrap();
        let solution = store.get_single().unwrap();
        assert_eq!(solution.get(&Symbol::new("name")), Some(&Value::Null));
    }

    #[test]
    fn join_on_repeated_symbol() {
        let template = Node::container([
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

        let data = serde_json::json!({
            "names": [{"ssn": "1", "name": "john"}, {"ssn": "2", "name": "abe"}],
            "hats": [{"ssn": "1", "color": "red"}, {"ssn": "2", "color": "blue"}],
        });

        let store = solve(template, &data).unwrap();
        let rows = store.iterate().unwrap();
        assert_eq!(rows.len(), 2);
        for row in rows {
            let ssn = row[&Symbol::new("ssn")].clone();
            let name = row[&Symbol::new("name")].clone();
            let color = row[&Symbol::new("color")].clone();
            if ssn == Value::from("1") {
                assert_eq!(name, Value::from("john"));
                assert_eq!(color, Value::from("red"));
            } else {
                assert_eq!(name, Value::from("abe"));
                assert_eq!(color, Value::from("blue"));
            }
        }
    }
}
