//! Structural relationships between two nodes of the same tree.
//!
//! For nodes `a` and `b` with nearest common ancestor `x`, `relationship(a, b)` is the number of steps up from `a` to `x`,
//! followed by the tag names passed on the way down from `x` to `b` (including `b`'s own).
//! `[3, "DIV", "SPAN"]` means: Go up three times, then down into a `DIV`, then into a `SPAN`.

use crate::dom::tag_name;
use web_sys::Node;

/// Walks up from `a` to the first node that is or contains `b`.
///
/// Returns `None` if `a` and `b` aren't part of the same tree.
#[must_use]
pub fn common_ancestor(a: &Node, b: &Node) -> Option<Node> {
	core::iter::successors(Some(a.clone()), Node::parent_node).find(|x| x == b || x.contains(Some(b)))
}

/// Whether `relationship(from_1, to_1)` equals `relationship(from_2, to_2)`.
///
/// Pairs without a common ancestor never compare equal.
#[must_use]
pub fn compare_relationships(from_1: &Node, to_1: &Node, from_2: &Node, to_2: &Node) -> bool {
	let (ancestor_1, ancestor_2) = match (common_ancestor(from_1, to_1), common_ancestor(from_2, to_2)) {
		(Some(ancestor_1), Some(ancestor_2)) => (ancestor_1, ancestor_2),
		_ => return false,
	};

	// Walk both upward chains in lockstep; they must reach their ancestor at the same time.
	let mut x = from_1.clone();
	let mut y = from_2.clone();
	while x != ancestor_1 || y != ancestor_2 {
		if x == ancestor_1 || y == ancestor_2 {
			return false;
		}
		match (x.parent_node(), y.parent_node()) {
			(Some(parent_x), Some(parent_y)) => {
				x = parent_x;
				y = parent_y;
			}
			_ => return false,
		}
	}

	let mut x = to_1.clone();
	let mut y = to_2.clone();
	while x != ancestor_1 || y != ancestor_2 {
		if x == ancestor_1 || y == ancestor_2 || tag_name(&x) != tag_name(&y) {
			return false;
		}
		match (x.parent_node(), y.parent_node()) {
			(Some(parent_x), Some(parent_y)) => {
				x = parent_x;
				y = parent_y;
			}
			_ => return false,
		}
	}

	true
}

/// Element path from `container` (exclusive) down to `node` (inclusive), outermost first.
///
/// `None` if `node` isn't inside `container`.
pub(crate) fn path_below(container: &Node, node: &Node) -> Option<Vec<Node>> {
	let mut path = Vec::new();
	let mut current = node.clone();
	while &current != container {
		path.push(current.clone());
		current = current.parent_node()?;
	}
	path.reverse();
	Some(path)
}
