use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::prelude::*;
use crate::template::canonical_key;

/// A forward or inverse conversion function attached to a
/// [`Node::Transform`][crate::template::Node::Transform].
///
/// Either direction defaults to the identity, or may be a closure, or a
/// finite mapping keyed by the canonical JSON text of the input value (JSON
/// values are not `Hash`, so a textual key stands in for structural
/// equality - adequate for the scalar domains transforms are applied to in
/// practice).
#[derive(Clone)]
pub enum Mapper {
    Identity,
    Fn(Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>),
    Map(Arc<BTreeMap<String, Value>>),
}

impl Mapper {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Mapper::Fn(Arc::new(f))
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        Mapper::Map(Arc::new(map))
    }

    pub fn apply(&self, value: &Value) -> Result<Value> {
        match self {
            Mapper::Identity => Ok(value.clone()),
            Mapper::Fn(f) => f(value),
            Mapper::Map(map) => {
                let key = canonical_key(value);
                map.get(&key)
                    .cloned()
                    .ok_or_else(|| eyre!("no mapping entry for value {value}"))
            }
        }
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mapper::Identity => write!(f, "Mapper::Identity"),
            Mapper::Fn(ptr) => write!(f, "Mapper::Fn({:p})", Arc::as_ptr(ptr)),
            Mapper::Map(map) => write!(f, "Mapper::Map({map:?})"),
        }
    }
}

/// A pair of (mostly) mutually inverse conversions applied around a
/// sub-template: `forward` runs during substitute, `inverse` runs during
/// match. Two transforms are equal only when their inner template and both
/// directions are componentwise equal; function-backed directions compare
/// by closure identity since arbitrary functions aren't comparable.
#[derive(Clone, Debug)]
pub struct Transform {
    pub forward: Mapper,
    pub inverse: Mapper,
}

impl Transform {
    pub fn new(forward: Mapper, inverse: Mapper) -> Self {
        Transform { forward, inverse }
    }

    pub fn identity() -> Self {
        Transform {
            forward: Mapper::Identity,
            inverse: Mapper::Identity,
        }
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        mapper_eq(&self.forward, &other.forward) && mapper_eq(&self.inverse, &other.inverse)
    }
}

fn mapper_eq(a: &Mapper, b: &Mapper) -> bool {
    match (a, b) {
        (Mapper::Identity, Mapper::Identity) => true,
        (Mapper::Fn(a), Mapper::Fn(b)) => Arc::ptr_eq(a, b),
        (Mapper::Map(a), Mapper::Map(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let t = Transform::identity();
        let v = Value::from(42);
        assert_eq!(t.forward.apply(&v).unwrap(), v);
        assert_eq!(t.inverse.apply(&v).unwrap(), v);
    }

    #[test]
    fn map_lookup() {
        let mut map = BTreeMap::new();
        map.insert(canonical_key(&Value::from("CT")), Value::from("Connecticut"));
        let m = Mapper::from_map(map);
        assert_eq!(m.apply(&Value::from("CT")).unwrap(), Value::from("Connecticut"));
        assert!(m.apply(&Value::from("WA")).is_err());
    }

    #[test]
    fn fn_transforms_compare_by_identity() {
        let f = Arc::new(|v: &Value| Ok(v.clone()));
        let a = Mapper::Fn(f.clone());
        let b = Mapper::Fn(f);
        let c = Mapper::from_fn(|v: &Value| Ok(v.clone()));
        assert!(mapper_eq(&a, &b));
        assert!(!mapper_eq(&a, &c));
    }
}
