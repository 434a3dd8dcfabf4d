//! The persistent reconciliation tree.
//!
//! Branches are stored in an [`Arena`] owned by the [`Reconciler`](`crate::Reconciler`) and addressed through [`BranchId`] handles.
//! Ownership flows strictly from parent to children; the way back up is a separate lookup table.

use crate::{labels::LabelMap, Error, Markup, Reconciler};
use core::fmt::{self, Debug, Display, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::trace;
use wasm_bindgen::JsValue;

/// Handle of a branch living in a [`Reconciler`].
///
/// Handles are never reused within one [`Reconciler`], so a stale handle reliably produces [`Error::NotABranch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(u32);

impl BranchId {
	#[cfg(test)]
	pub(crate) const fn from_raw(raw: u32) -> Self {
		Self(raw)
	}

	pub(crate) fn to_js(self) -> JsValue {
		JsValue::from_f64(f64::from(self.0))
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	pub(crate) fn from_js(value: &JsValue) -> Option<Self> {
		value.as_f64().map(|raw| Self(raw as u32))
	}
}

impl Display for BranchId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "branch #{}", self.0)
	}
}

/// Produces a branch's markup on demand.
///
/// The controller is chosen when a branch is created and stays fixed for the branch's lifetime,
/// even if later build passes name a different one for the same label.
pub trait Controller {
	/// # Errors
	///
	/// Whatever the markup source fails with, or [`Error::AbstractBranch`] if there is no markup source.
	fn render(&self, reconciler: &Reconciler, this: BranchId) -> Markup;
}

/// The default controller. Its markup always comes from the function passed to the build call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Basic;

impl Controller for Basic {
	fn render(&self, _: &Reconciler, this: BranchId) -> Markup {
		Err(Error::AbstractBranch(this))
	}
}

/// Renders each of the branch's children in order, without separators.
///
/// See [`Reconciler::list_branch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ListBranch;

impl Controller for ListBranch {
	fn render(&self, reconciler: &Reconciler, this: BranchId) -> Markup {
		let mut html = String::new();
		let children = reconciler.children(this)?;
		for (label, child) in children.iter() {
			if reconciler.is_building() {
				html.push_str(&reconciler.branch(label, move |reconciler| reconciler.render(child))?);
			} else {
				html.push_str(&reconciler.render(child)?);
			}
		}
		Ok(html)
	}
}

/// Renders by calling a stored markup function.
#[derive(Clone)]
pub struct SmartBranch(Rc<dyn Fn(&Reconciler) -> Markup>);

impl SmartBranch {
	pub fn new(markup: impl 'static + Fn(&Reconciler) -> Markup) -> Self {
		Self(Rc::new(markup))
	}
}

impl Debug for SmartBranch {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SmartBranch").field(&Rc::as_ptr(&self.0)).finish()
	}
}

impl Controller for SmartBranch {
	fn render(&self, reconciler: &Reconciler, _: BranchId) -> Markup {
		(self.0)(reconciler)
	}
}

pub(crate) struct Branch {
	/// Inclusive bounds of the owned sibling run. Both are `None` until the first build.
	pub first_node: Option<web_sys::Node>,
	pub last_node: Option<web_sys::Node>,
	pub children: LabelMap,
	pub controller: Rc<dyn Controller>,
}

impl Debug for Branch {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Branch")
			.field("first_node", &self.first_node)
			.field("last_node", &self.last_node)
			.field("children", &self.children)
			.finish_non_exhaustive()
	}
}

impl Branch {
	pub fn bounds(&self) -> Option<(web_sys::Node, web_sys::Node)> {
		self.first_node.clone().zip(self.last_node.clone())
	}
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
	branches: HashMap<BranchId, Branch>,
	parents: HashMap<BranchId, BranchId>,
	next_id: u32,
}

impl Arena {
	pub fn allocate(&mut self, controller: Rc<dyn Controller>) -> BranchId {
		self.next_id += 1;
		let id = BranchId(self.next_id);
		self.branches.insert(
			id,
			Branch {
				first_node: None,
				last_node: None,
				children: LabelMap::new(),
				controller,
			},
		);
		trace!(%id, "Allocated branch.");
		id
	}

	pub fn contains(&self, id: BranchId) -> bool {
		self.branches.contains_key(&id)
	}

	pub fn get(&self, id: BranchId) -> Result<&Branch, Error> {
		self.branches.get(&id).ok_or(Error::NotABranch(id))
	}

	pub fn get_mut(&mut self, id: BranchId) -> Result<&mut Branch, Error> {
		self.branches.get_mut(&id).ok_or(Error::NotABranch(id))
	}

	pub fn parent(&self, id: BranchId) -> Option<BranchId> {
		self.parents.get(&id).copied()
	}

	/// Appends `child` under `label` and records the back-reference.
	pub fn attach(&mut self, parent: BranchId, label: &str, child: BranchId) -> Result<(), Error> {
		if !self.contains(child) {
			return Err(Error::NotABranch(child));
		}
		if self.parents.contains_key(&child) {
			return Err(Error::AlreadyAttached(child));
		}
		self.get_mut(parent)?.children.append(label, child)?;
		self.parents.insert(child, parent);
		Ok(())
	}

	/// Replaces `parent`'s children wholesale. Children that don't survive are discarded along with their subtrees.
	pub fn replace_children(&mut self, parent: BranchId, children: LabelMap) -> Result<(), Error> {
		let previous = std::mem::replace(&mut self.get_mut(parent)?.children, children);
		for child in previous.branches() {
			if self.parents.get(&child) == Some(&parent) && self.get(parent)?.children.label_of(child).is_none() {
				self.discard(child);
			}
		}
		let surviving: Vec<_> = self.get(parent)?.children.branches().collect();
		for child in surviving {
			self.parents.insert(child, parent);
		}
		Ok(())
	}

	/// Removes `id` and everything below it. Detaching from a parent's child map is the caller's responsibility.
	pub fn discard(&mut self, id: BranchId) {
		let mut pending = vec![id];
		while let Some(id) = pending.pop() {
			self.parents.remove(&id);
			if let Some(branch) = self.branches.remove(&id) {
				trace!(%id, "Discarded branch.");
				pending.extend(branch.children.branches().filter(|child| self.parents.get(child) == Some(&id)));
			}
		}
	}

	/// Iterates `id`'s strict ancestors, innermost first.
	pub fn ancestors(&self, id: BranchId) -> impl '_ + Iterator<Item = BranchId> {
		core::iter::successors(self.parent(id), move |&id| self.parent(id))
	}
}
