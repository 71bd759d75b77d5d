//! The substituter (Component F): template-driven reassembly from either a
//! single binding map, a sequence of them, or queries against the
//! intermediate.

use std::collections::HashMap;

use serde_json::Value;

use crate::prelude::*;
use crate::schema::outer_symbols;
use crate::solver::Bindings;
use crate::store::{QuerySymbols, Store};
use crate::template::Node;

/// Where `substitute` draws its bindings from. Rust can't dispatch on the
/// runtime shape of an argument the way the original engine's duck-typed
/// `source` does, so the three cases described in the storage contract are
/// spelled out explicitly.
#[derive(Clone, Copy)]
pub enum Source<'a> {
    One(&'a Bindings),
    Many(&'a [Bindings]),
    Store(&'a Store),
}

/// The result of a `substitute` call: one value for a single-binding
/// source, or a materialized sequence for a many-binding or store source.
pub enum Substituted {
    Single(Value),
    Sequence(Vec<Value>),
}

impl Substituted {
    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Substituted::Single(v) => vec![v],
            Substituted::Sequence(v) => v,
        }
    }
}

/// `substitute(template, source, known_values)` per the storage contract.
pub fn substitute(
    template: &Node,
    source: Source<'_>,
    known_values: &Bindings,
) -> Result<Substituted, AssignError> {
    match source {
        Source::One(bindings) => {
            let merged = merge(known_values, bindings);
            let value = assign(template, source, &merged)?;
            Ok(Substituted::Single(value))
        }

        Source::Many(list) => {
            let mut out = Vec::with_capacity(list.len());
            for m in list {
                let merged = merge(known_values, m);
                out.push(assign(template, Source::One(m), &merged)?);
            }
            Ok(Substituted::Sequence(out))
        }

        Source::Store(store) => {
            let outer = outer_symbols(template);
            let tuples = store
                .query(&QuerySymbols::Some(outer), known_values)
                .map_err(AssignError::Store)?;

            let mut out = Vec::with_capacity(tuples.len());
            for tuple in &tuples {
                let merged = merge(known_values, tuple);
                out.push(assign(template, source, &merged)?);
            }
            Ok(Substituted::Sequence(out))
        }
    }
}

/// `assign(template, source, known_values)`: the tree walk that builds one
/// output document from already-resolved bindings.
pub fn assign(template: &Node, source: Source<'_>, known_values: &Bindings) -> Result<Value, AssignError> {
    match template {
        Node::Literal(value) => Ok(value.clone()),

        Node::Symbol(sym) => known_values
            .get(sym)
            .cloned()
            .ok_or_else(|| AssignError::Unbound(sym.clone())),

        Node::Transform(inner, transform) => {
            let value = assign(inner, source, known_values)?;
            transform.forward.apply(&value).map_err(AssignError::User)
        }

        Node::ErrorHandler(inner, _) => assign(inner, source, known_values),

        Node::Container(fields) => {
            let mut map = serde_json::Map::new();
            for (key, sub) in fields {
                map.insert(key.clone(), assign(sub, source, known_values)?);
            }
            Ok(Value::Object(map))
        }

        Node::Repetition(elements) => {
            let mut out = Vec::new();
            for sub in elements {
                let sequence = substitute(sub, source, known_values)?;
                out.extend(sequence.into_vec());
            }
            Ok(Value::Array(out))
        }
    }
}

fn merge(known_values: &Bindings, extra: &Bindings) -> Bindings {
    let mut merged: HashMap<_, _> = known_values.clone();
    merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
