//! Type-dispatched recursion over [`Node`] trees, with cached dispatch
//! (Component B).
//!
//! A walker is built from an ordered list of `(predicate, handler)` cases.
//! For each node visited, the first handler whose predicate matches is
//! invoked with the node, its path, and a reference to the walker itself so
//! the handler can recurse. Dispatch is cached per walker instance, keyed by
//! the node's variant tag - scoped to the instance rather than
//! process-wide, so concurrent walks never share mutable cache state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::mem::Discriminant;

use crate::template::{Node, NodePath};

pub type Predicate = fn(&Node) -> bool;
pub type Handler<'a, R> = Box<dyn Fn(&Node, &NodePath, &Walker<'a, R>) -> R + 'a>;

pub struct Walker<'a, R> {
    cases: Vec<(Predicate, Handler<'a, R>)>,
    cache: RefCell<HashMap<Discriminant<Node>, usize>>,
}

impl<'a, R> Walker<'a, R> {
    pub fn new(cases: Vec<(Predicate, Handler<'a, R>)>) -> Self {
        Walker {
            cases,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Recurse into `node` at `path`, dispatching to the first matching case.
    pub fn walk(&self, node: &Node, path: &NodePath) -> R {
        let disc = std::mem::discriminant(node);

        let idx = {
            let cache = self.cache.borrow();
            cache.get(&disc).copied()
        };

        let idx = match idx {
            Some(idx) => idx,
            None => {
                let idx = self
                    .cases
                    .iter()
                    .position(|(pred, _)| pred(node))
                    .expect("no walker case matched this node variant");
                self.cache.borrow_mut().insert(disc, idx);
                idx
            }
        };

        (self.cases[idx].1)(node, path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::PathSegment;

    #[test]
    fn dispatches_to_first_matching_case() {
        let cases: Vec<(Predicate, Handler<i32>)> = vec![
            (
                |n| matches!(n, Node::Literal(_)),
                Box::new(|_, _, _| 1),
            ),
            (|_| true, Box::new(|_, _, _| 0)),
        ];
        let walker = Walker::new(cases);
        let root: NodePath = vec![];
        assert_eq!(walker.walk(&Node::literal(1), &root), 1);
        assert_eq!(walker.walk(&Node::symbol("x"), &root), 0);
    }

    #[test]
    fn continuation_can_recurse() {
        let cases: Vec<(Predicate, Handler<i32>)> = vec![
            (
                |n| matches!(n, Node::Transform(..)),
                Box::new(|n, path, walker| {
                    let Node::Transform(inner, _) = n else { unreachable!() };
                    let mut path = path.clone();
                    path.push(PathSegment::Inner);
                    1 + walker.walk(inner, &path)
                }),
            ),
            (|_| true, Box::new(|_, _, _| 0)),
        ];
        let walker = Walker::new(cases);
        let root: NodePath = vec![];
        let tpl = Node::transform(
            Node::symbol("x"),
            crate::template::Mapper::Identity,
            crate::template::Mapper::Identity,
        );
        assert_eq!(walker.walk(&tpl, &root), 1);
    }
}
