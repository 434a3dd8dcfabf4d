//! Reconciles a built branch's live node range against freshly parsed markup.
//!
//! Children are classified by label:
//!
//! - **dead**: only in the old set. Their nodes are removed.
//! - **novel**: only in the new set. Their standalone nodes are spliced in at their placeholder.
//! - **unmoved**: in both, and the path from the branch's container down to them is structurally unchanged.
//!   Their nodes stay exactly where they are, and so do the ancestor elements on that path.
//! - **moved**: in both, but not admissible as unmoved. Their (already up to date) nodes are relocated to their placeholder.
//!
//! Everything else in the old range is replaced by the new markup's nodes.

use crate::{
	dom::{self, sibling_run},
	relationship::{compare_relationships, path_below},
	BranchId, Error,
};
use indexmap::IndexMap;
use tracing::{debug, instrument, trace, trace_span};
use wasm_bindgen::JsCast;
use web_sys::{Comment, Document, DocumentFragment, Element, Node};

/// A child branch's label, handle and (if built) inclusive bounds.
#[derive(Debug, Clone)]
pub(crate) struct ChildRange {
	pub label: String,
	pub id: BranchId,
	pub bounds: Option<(Node, Node)>,
}

/// Labels per classification, each in the order they were encountered.
///
/// A branch's first build reports all of its children as `novel`, including ones that were attached to it beforehand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
	pub dead: Vec<String>,
	pub novel: Vec<String>,
	pub moved: Vec<String>,
	pub unmoved: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct Outcome {
	pub first_node: Node,
	pub last_node: Node,
	pub classification: Classification,
}

pub(crate) struct Patch<'a> {
	pub document: &'a Document,
	pub branch: BranchId,
	pub old_first: &'a Node,
	pub old_last: &'a Node,
	pub fragment: &'a DocumentFragment,
	/// In old order.
	pub old_children: &'a [ChildRange],
	/// In fragment order. All of them are built.
	pub new_children: &'a [ChildRange],
	pub placeholders: &'a IndexMap<String, Comment>,
	pub focus_hint: Option<&'a str>,
}

/// An unmoved child, with the element paths leading to it on both sides.
#[derive(Debug)]
struct Kept {
	first: Node,
	last: Node,
	placeholder: Node,
	old_path: Vec<Node>,
	new_path: Vec<Node>,
}

/// A matched child that passed the relationship test against the branch's container.
struct Candidate<'a> {
	child: &'a ChildRange,
	first: Node,
	last: Node,
	old_parent: Node,
	placeholder: Node,
	new_parent: Node,
}

impl<'a> Patch<'a> {
	#[instrument(skip_all, fields(branch = %self.branch))]
	pub fn run(self) -> Result<Outcome, Error> {
		let container = self.old_first.parent_node().ok_or(Error::BrokenRange(self.branch))?;
		sibling_run(self.old_first, self.old_last).ok_or(Error::BrokenRange(self.branch))?;
		let before = self.old_first.previous_sibling();
		let after = self.old_last.next_sibling();

		let mut classification = Classification::default();

		let candidates = self.candidates(&container)?;
		let unmoved = self.select_unmoved(candidates);

		// Validate every range that will be touched before mutating anything.
		let mut dead_runs = Vec::new();
		for old in self.old_children {
			if !self.new_children.iter().any(|new| new.label == old.label) {
				classification.dead.push(old.label.clone());
				if let Some((first, last)) = &old.bounds {
					dead_runs.push(sibling_run(first, last).ok_or(Error::BrokenRange(old.id))?);
				}
			}
		}
		let mut spliced = Vec::new();
		for new in self.new_children {
			if unmoved.iter().any(|candidate| candidate.child.label == new.label) {
				classification.unmoved.push(new.label.clone());
				continue;
			}
			if self.old_children.iter().any(|old| old.label == new.label) {
				classification.moved.push(new.label.clone());
			} else {
				classification.novel.push(new.label.clone());
			}
			let (first, last) = new.bounds.as_ref().ok_or(Error::BrokenRange(new.id))?;
			sibling_run(first, last).ok_or(Error::BrokenRange(new.id))?;
			spliced.push((new, first, last, self.placeholder(&new.label)?));
		}

		for run in dead_runs {
			for node in run {
				if let Some(parent) = node.parent_node() {
					parent.remove_child(&node).map_err(Error::dom("removeChild"))?;
				}
			}
		}

		for (child, first, last, placeholder) in spliced {
			let span = trace_span!("Splicing child", child = %child.id);
			let _enter = span.enter();
			let nodes = dom::extract_range(self.document, first, last, child.id)?;
			let parent = placeholder.parent_node().ok_or(Error::BrokenRange(self.branch))?;
			parent.replace_child(&nodes, &placeholder).map_err(Error::dom("replaceChild"))?;
		}

		let kept = unmoved
			.into_iter()
			.map(|candidate| {
				Ok(Kept {
					old_path: path_below(&container, &candidate.old_parent).ok_or(Error::BrokenRange(candidate.child.id))?,
					new_path: path_below(self.fragment, &candidate.new_parent).ok_or(Error::BrokenRange(self.branch))?,
					first: candidate.first,
					last: candidate.last,
					placeholder: candidate.placeholder,
				})
			})
			.collect::<Result<Vec<_>, Error>>()?;

		let start = match &before {
			Some(before) => before.next_sibling(),
			None => container.first_child(),
		};
		self.sync_level(&container, start, after.as_ref(), self.fragment, &kept, 0)?;

		let first_node = match &before {
			Some(before) => before.next_sibling(),
			None => container.first_child(),
		};
		let last_node = match &after {
			Some(after) => after.previous_sibling(),
			None => container.last_child(),
		};
		let (first_node, last_node) = first_node.zip(last_node).ok_or(Error::BrokenRange(self.branch))?;

		debug!(
			dead = classification.dead.len(),
			novel = classification.novel.len(),
			moved = classification.moved.len(),
			unmoved = classification.unmoved.len(),
			"Patched branch."
		);
		if cfg!(feature = "dangerous-logging") {
			trace!(?classification);
		}

		Ok(Outcome {
			first_node,
			last_node,
			classification,
		})
	}

	fn placeholder(&self, label: &str) -> Result<Node, Error> {
		self.placeholders
			.get(label)
			.map(|comment| Node::from(comment.clone()))
			.ok_or_else(|| Error::MissingPlaceholder(label.to_owned()))
	}

	/// Matched children whose relationship to the container is unchanged, in fragment order.
	fn candidates(&self, container: &Node) -> Result<Vec<Candidate<'a>>, Error> {
		let mut candidates = Vec::new();
		for child in self.new_children {
			if !self.old_children.iter().any(|old| old.label == child.label) {
				continue;
			}
			let (first, last) = child.bounds.clone().ok_or(Error::BrokenRange(child.id))?;
			let placeholder = self.placeholder(&child.label)?;
			let (old_parent, new_parent) = match (first.parent_node(), placeholder.parent_node()) {
				(Some(old_parent), Some(new_parent)) => (old_parent, new_parent),
				_ => continue,
			};
			if compare_relationships(container, &old_parent, self.fragment, &new_parent) {
				candidates.push(Candidate {
					child,
					first,
					last,
					old_parent,
					placeholder,
					new_parent,
				});
			} else {
				trace!(child = %child.id, "Relationship changed.");
			}
		}
		Ok(candidates)
	}

	/// Admits candidates greedily in fragment order, starting with the focus hint's child if it's a candidate.
	fn select_unmoved(&self, candidates: Vec<Candidate<'a>>) -> Vec<Candidate<'a>> {
		let pinned = self
			.focus_hint
			.and_then(|focus| candidates.iter().position(|candidate| candidate.child.label == focus));

		let mut accepted: Vec<usize> = Vec::with_capacity(candidates.len());
		for (i, candidate) in candidates.iter().enumerate() {
			let admissible = Some(i) == pinned
				|| (accepted.last().map_or(true, |&previous| consistent(&candidates[previous], candidate))
					&& pinned.map_or(true, |pinned| pinned < i || consistent(candidate, &candidates[pinned])));
			if admissible {
				accepted.push(i);
			}
		}
		candidates
			.into_iter()
			.enumerate()
			.filter(|(i, _)| accepted.contains(i))
			.map(|(_, candidate)| candidate)
			.collect()
	}

	/// Makes `target`'s children from `start` up to `end` look like `source`'s children,
	/// keeping the `kept` ranges and the elements leading to them in place.
	fn sync_level(&self, target: &Node, start: Option<Node>, end: Option<&Node>, source: &Node, kept: &[Kept], depth: usize) -> Result<(), Error> {
		let mut incoming = dom::child_nodes(source).into_iter();
		let mut cursor = start;
		let mut rest = kept;

		while let Some(head) = rest.first() {
			let direct = head.old_path.len() == depth;
			let (old_anchor, new_anchor, group_len) = if direct {
				(head.first.clone(), head.placeholder.clone(), 1)
			} else {
				let old_element = &head.old_path[depth];
				let group_len = rest
					.iter()
					.take_while(|kept| kept.old_path.len() > depth && &kept.old_path[depth] == old_element)
					.count();
				(old_element.clone(), head.new_path[depth].clone(), group_len)
			};
			let (group, tail) = rest.split_at(group_len);

			dom::remove_until(target, cursor.take(), Some(&old_anchor))?;
			loop {
				let node = incoming.next().ok_or(Error::BrokenRange(self.branch))?;
				if node == new_anchor {
					break;
				}
				target.insert_before(&node, Some(&old_anchor)).map_err(Error::dom("insertBefore"))?;
			}

			if direct {
				source.remove_child(&new_anchor).map_err(Error::dom("removeChild"))?;
				cursor = head.last.next_sibling();
			} else {
				if let (Some(old_element), Some(new_element)) = (old_anchor.dyn_ref::<Element>(), new_anchor.dyn_ref::<Element>()) {
					dom::sync_attributes(old_element, new_element)?;
				}
				self.sync_level(&old_anchor, old_anchor.first_child(), None, &new_anchor, group, depth + 1)?;
				cursor = old_anchor.next_sibling();
			}
			rest = tail;
		}

		dom::remove_until(target, cursor, end)?;
		for node in incoming {
			target.insert_before(&node, end).map_err(Error::dom("insertBefore"))?;
		}
		Ok(())
	}
}

/// Whether `next` can stay in place after `previous` did:
/// Their relationship must be unchanged and `next` must still come after `previous`.
fn consistent(previous: &Candidate<'_>, next: &Candidate<'_>) -> bool {
	compare_relationships(&previous.old_parent, &next.old_parent, &previous.new_parent, &next.new_parent)
		&& previous.last.compare_document_position(&next.first) & Node::DOCUMENT_POSITION_FOLLOWING != 0
}
