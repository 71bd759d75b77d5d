use std::collections::HashMap;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use vartree::{solve, substitute, Mapper, Node, Source, Symbol};

#[test]
fn transposition() {
    let template = Node::repetition([Node::container([
        ("name".into(), Node::symbol("name")),
        (
            "addresses".into(),
            Node::repetition([Node::container([("state".into(), Node::symbol("state"))])]),
        ),
    ])]);

    let data = json!([
        {"name": "john", "addresses": [{"state": "CA"}, {"state": "CT"}]},
        {"name": "allan", "addresses": [{"state": "CA"}, {"state": "WA"}]},
    ]);

    let store = solve(template, &data).unwrap();

    let output = Node::container([
        (
            "address".into(),
            Node::container([("state".into(), Node::symbol("state"))]),
        ),
        ("names".into(), Node::repetition([Node::symbol("name")])),
    ]);

    let results = substitute(&output, Source::Store(&store), &HashMap::new())
        .unwrap()
        .into_vec();

    assert_eq!(results.len(), 3);

    let find_state = |state: &str| -> Value {
        results
            .iter()
            .find(|r| r["address"]["state"] == Value::from(state))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let mut ca_names: Vec<String> = find_state("CA")["names"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    ca_names.sort();
    assert_eq!(ca_names, vec!["allan".to_string(), "john".to_string()]);

    assert_eq!(find_state("CT")["names"], json!(["john"]));
    assert_eq!(find_state("WA")["names"], json!(["allan"]));
}

#[test]
fn cross_product_independence() {
    const N: usize = 50;

    let a: Vec<Value> = (0..N).map(|i| json!({"a": i})).collect();
    let b: Vec<Value> = (0..N).map(|i| json!({"b": i})).collect();

    let template = Node::container([
        (
            "as".into(),
            Node::repetition([Node::container([("a".into(), Node::symbol("a"))])]),
        ),
        (
            "bs".into(),
            Node::repetition([Node::container([("b".into(), Node::symbol("b"))])]),
        ),
    ]);

    let data = json!({"as": a, "bs": b});

    let store = solve(template, &data).unwrap();

    let a_only = substitute(
        &Node::symbol("a"),
        Source::Store(&store),
        &HashMap::new(),
    )
    .unwrap()
    .into_vec();
    let b_only = substitute(
        &Node::symbol("b"),
        Source::Store(&store),
        &HashMap::new(),
    )
    .unwrap()
    .into_vec();

    assert_eq!(a_only.len(), N);
    assert_eq!(b_only.len(), N);
}

#[test]
fn transform_invertibility() {
    let suffix = |v: &Value| -> vartree::Result<Value> {
        Ok(Value::from(format!("{}!", v.as_str().unwrap())))
    };

    let template = Node::container([(
        "x".into(),
        Node::transform(Node::symbol("x"), Mapper::Identity, Mapper::from_fn(suffix)),
    )]);

    let data = json!({"x": "hi"});
    let store = solve(template, &data).unwrap();
    let solution = store.get_single().unwrap();

    assert_eq!(solution.get(&Symbol::new("x")), Some(&Value::from("hi!")));

    let sibling = Node::symbol("x");
    let mut known_values = HashMap::new();
    known_values.extend(solution);
    let result = substitute(&sibling, Source::One(&known_values), &HashMap::new()).unwrap();
    match result {
        vartree::Substituted::Single(v) => assert_eq!(v, Value::from("hi!")),
        _ => panic!("expected a single value"),
    }
}
