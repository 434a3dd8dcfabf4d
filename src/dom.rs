//! Thin helpers over `web_sys` for fragment parsing and sibling runs.

use crate::{BranchId, Error};
use js_sys::{Object, WeakMap};
use tracing::{instrument, trace};
use wasm_bindgen::JsCast;
use web_sys::{Document, DocumentFragment, Element, HtmlTemplateElement, Node};

/// Parses `html` as a fragment, the way a `<template>` would.
#[instrument(skip(document, html), fields(html.len = html.len()))]
pub(crate) fn parse_fragment(document: &Document, html: &str) -> Result<DocumentFragment, Error> {
	let template: HtmlTemplateElement = document
		.create_element("template")
		.map_err(Error::dom("createElement"))?
		.dyn_into()
		.map_err(|element| Error::Dom {
			operation: "createElement",
			error: element.into(),
		})?;
	template.set_inner_html(html);
	Ok(template.content())
}

/// Snapshot of `node`'s children.
pub(crate) fn child_nodes(node: &Node) -> Vec<Node> {
	let list = node.child_nodes();
	(0..list.length()).filter_map(|i| list.item(i)).collect()
}

/// Collects the inclusive sibling run `first..=last`, or `None` if `last` isn't reachable from `first`.
pub(crate) fn sibling_run(first: &Node, last: &Node) -> Option<Vec<Node>> {
	let mut run = vec![first.clone()];
	let mut current = first.clone();
	while &current != last {
		current = current.next_sibling()?;
		run.push(current.clone());
	}
	Some(run)
}

/// Moves `first..=last` into a new fragment of `document`.
pub(crate) fn extract_range(document: &Document, first: &Node, last: &Node, owner: BranchId) -> Result<DocumentFragment, Error> {
	let run = sibling_run(first, last).ok_or(Error::BrokenRange(owner))?;
	let fragment = document.create_document_fragment();
	for node in run {
		fragment.append_child(&node).map_err(Error::dom("appendChild"))?;
	}
	trace!("Extracted node range.");
	Ok(fragment)
}

/// Removes `start` and its following siblings up to but excluding `end`.
pub(crate) fn remove_until(container: &Node, start: Option<Node>, end: Option<&Node>) -> Result<(), Error> {
	let mut next = start;
	while let Some(node) = next {
		if Some(&node) == end {
			break;
		}
		next = node.next_sibling();
		container.remove_child(&node).map_err(Error::dom("removeChild"))?;
	}
	Ok(())
}

/// Gives `target` exactly the attributes of `source`.
pub(crate) fn sync_attributes(target: &Element, source: &Element) -> Result<(), Error> {
	let stale = target.attributes();
	let mut i = stale.length();
	while i > 0 {
		i -= 1;
		if let Some(attribute) = stale.item(i) {
			if !source.has_attribute(&attribute.name()) {
				target.remove_attribute(&attribute.name()).map_err(Error::dom("removeAttribute"))?;
			}
		}
	}

	let fresh = source.attributes();
	for i in 0..fresh.length() {
		if let Some(attribute) = fresh.item(i) {
			let (name, value) = (attribute.name(), attribute.value());
			if target.get_attribute(&name).as_deref() != Some(value.as_str()) {
				target.set_attribute(&name, &value).map_err(Error::dom("setAttribute"))?;
			}
		}
	}
	Ok(())
}

/// The tag name of `node` if it's an element.
pub(crate) fn tag_name(node: &Node) -> Option<String> {
	node.dyn_ref::<Element>().map(Element::tag_name)
}

/// Marks document nodes with their innermost owning branch.
///
/// Backed by a JavaScript `WeakMap`, so the marks never keep nodes alive.
#[derive(Debug)]
pub(crate) struct OwnerTags(WeakMap);

impl OwnerTags {
	pub fn new() -> Self {
		Self(WeakMap::new())
	}

	pub fn get(&self, node: &Node) -> Option<BranchId> {
		BranchId::from_js(&self.0.get(node.unchecked_ref::<Object>()))
	}

	/// Tags `node` with `owner` unless it already carries a (more specific) tag for which `alive` holds.
	pub fn tag_if_untagged(&self, node: &Node, owner: BranchId, alive: impl Fn(BranchId) -> bool) {
		if !self.get(node).map_or(false, alive) {
			self.0.set(node.unchecked_ref::<Object>(), &owner.to_js());
		}
	}

	/// Finds the innermost live branch containing `node` by walking up the document.
	pub fn find(&self, node: &Node, alive: impl Fn(BranchId) -> bool) -> Option<BranchId> {
		core::iter::successors(Some(node.clone()), Node::parent_node).find_map(|node| self.get(&node).filter(|&owner| alive(owner)))
	}
}
