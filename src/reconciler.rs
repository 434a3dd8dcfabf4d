use crate::{
	branch::{Arena, Basic, BranchId, Controller, ListBranch, SmartBranch},
	build_state::BuildState,
	dom::{self, sibling_run, OwnerTags},
	labels::LabelMap,
	patch::{ChildRange, Classification, Patch},
	placeholder::{comment_markup, RandomTokens, TokenSource},
	special::Special,
	Error, Markup, Options,
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{debug, error, instrument, trace, trace_span};
use wasm_bindgen::JsCast;
use web_sys::{Comment, Document, DocumentFragment, Node};

/// Owns a forest of branches and (re)builds them from markup.
///
/// Markup functions receive the [`Reconciler`] they run under, so nested calls to [`Reconciler::branch`] know
/// which build pass and which branch they belong to without any global state.
///
/// # Example
///
/// ```rust,no_run
/// use shark_dom::Reconciler;
///
/// let reconciler = Reconciler::for_window()?;
/// let root = reconciler.build_branch(shark_dom::Basic, |rc| {
/// 	Ok(format!("<span>{}</span>", rc.branch("x", |_| Ok("Hi".to_owned()))?))
/// })?;
///
/// // The `<span>` is kept, only the text inside changes.
/// reconciler.rebuild(root, |rc| {
/// 	Ok(format!("<span>{}</span>", rc.branch("x", |_| Ok("Bye".to_owned()))?))
/// })?;
/// # Ok::<(), shark_dom::Error>(())
/// ```
pub struct Reconciler {
	document: Document,
	options: Options,
	tokens: RefCell<Box<dyn TokenSource>>,
	arena: RefCell<Arena>,
	owners: OwnerTags,
	current_build: Special<Rc<RefCell<BuildState>>>,
	current_branch: Special<BranchId>,
}

impl Debug for Reconciler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Reconciler")
			.field("document", &self.document)
			.field("options", &self.options)
			.field("arena", &self.arena)
			.field("current_build", &self.current_build)
			.field("current_branch", &self.current_branch)
			.finish_non_exhaustive()
	}
}

impl Reconciler {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self::with_options(document, &Options::new())
	}

	#[must_use]
	#[instrument(skip(document))]
	pub fn with_options(document: Document, options: &Options) -> Self {
		Self {
			document,
			options: options.clone(),
			tokens: RefCell::new(Box::new(RandomTokens)),
			arena: RefCell::default(),
			owners: OwnerTags::new(),
			current_build: Special::new(),
			current_branch: Special::new(),
		}
	}

	/// Uses the global `window.document`.
	///
	/// # Errors
	///
	/// [`Error::NoDocument`] outside of a browser window context.
	pub fn for_window() -> Result<Self, Error> {
		let document = web_sys::window().and_then(|window| window.document()).ok_or(Error::NoDocument)?;
		Ok(Self::new(document))
	}

	/// Replaces the source of placeholder tokens.
	#[must_use]
	pub fn with_token_source(mut self, tokens: impl 'static + TokenSource) -> Self {
		self.tokens = RefCell::new(Box::new(tokens));
		self
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	#[must_use]
	pub fn options(&self) -> &Options {
		&self.options
	}

	/// The branch whose markup is currently being produced, if any.
	#[must_use]
	pub fn current_branch(&self) -> Option<BranchId> {
		self.current_branch.get()
	}

	/// Whether a build pass is in progress, i.e. whether [`Reconciler::branch`] returns placeholders.
	#[must_use]
	pub fn is_building(&self) -> bool {
		self.current_build.get().is_some()
	}

	/// Builds a throwaway branch tree from `markup` and returns its nodes.
	///
	/// The tree is released right away, so the nodes can't be reconciled later. Use [`Reconciler::build_branch`] for that.
	///
	/// # Errors
	///
	/// Whatever `markup` fails with, and any usage or structural error encountered while building.
	pub fn build(&self, markup: impl FnOnce(&Self) -> Markup) -> Result<DocumentFragment, Error> {
		let root = self.build_branch(Basic, markup)?;
		let fragment = self
			.first_node(root)?
			.and_then(|first| first.parent_node())
			.and_then(|parent| parent.dyn_into::<DocumentFragment>().ok())
			.ok_or(Error::BrokenRange(root));
		self.arena.borrow_mut().discard(root);
		fragment
	}

	/// Builds a fresh branch with the given controller from `markup`.
	///
	/// # Errors
	///
	/// Whatever `markup` fails with, and any usage or structural error encountered while building.
	/// Nothing is allocated in that case.
	pub fn build_branch(&self, controller: impl 'static + Controller, markup: impl FnOnce(&Self) -> Markup) -> Result<BranchId, Error> {
		let branch = self.arena.borrow_mut().allocate(Rc::new(controller));
		match self.rebuild(branch, markup) {
			Ok(_) => Ok(branch),
			Err(error) => {
				self.arena.borrow_mut().discard(branch);
				Err(error)
			}
		}
	}

	/// Builds a branch that renders (and [refreshes](`Reconciler::refresh`)) by calling `markup`.
	///
	/// # Errors
	///
	/// As [`Reconciler::build_branch`].
	pub fn smart_branch(&self, markup: impl 'static + Fn(&Self) -> Markup) -> Result<BranchId, Error> {
		let branch = self.arena.borrow_mut().allocate(Rc::new(SmartBranch::new(markup)));
		match self.refresh(branch) {
			Ok(_) => Ok(branch),
			Err(error) => {
				self.arena.borrow_mut().discard(branch);
				Err(error)
			}
		}
	}

	/// Creates an unbuilt [`ListBranch`] that adopts `children`, labelled by position.
	///
	/// Build it with [`Reconciler::refresh`]; the children must be able to [render](`Reconciler::render`) themselves.
	///
	/// # Errors
	///
	/// - [`Error::NotABranch`] if a child doesn't exist.
	/// - [`Error::AlreadyAttached`] if a child has a parent already or is listed twice.
	pub fn list_branch(&self, children: impl IntoIterator<Item = BranchId>) -> Result<BranchId, Error> {
		let children: Vec<_> = children.into_iter().collect();
		let mut arena = self.arena.borrow_mut();
		for (i, &child) in children.iter().enumerate() {
			if !arena.contains(child) {
				return Err(Error::NotABranch(child));
			}
			if arena.parent(child).is_some() || children[..i].contains(&child) {
				return Err(Error::AlreadyAttached(child));
			}
		}

		let list = arena.allocate(Rc::new(ListBranch));
		for (i, child) in children.into_iter().enumerate() {
			arena.attach(list, &i.to_string(), child)?;
		}
		Ok(list)
	}

	/// Reconciles `branch` against the markup produced by `markup`.
	///
	/// On the first call, this builds the branch's nodes (as a fresh fragment).
	/// Later calls update the existing nodes, leaving child branches with unchanged labels and surroundings where they are.
	///
	/// If anything fails, `branch` itself is left as it was, and branches created during the pass are dropped again.
	/// Matched children may already have been reconciled in place by then.
	///
	/// # Errors
	///
	/// Whatever `markup` fails with, and any usage or structural error encountered while reconciling.
	#[instrument(skip(self, markup))]
	pub fn rebuild(&self, branch: BranchId, markup: impl FnOnce(&Self) -> Markup) -> Result<Classification, Error> {
		let old_children = self.arena.borrow().get(branch)?.children.clone();
		let focus_hint = self.focus_hint(branch, &old_children);

		let state = Rc::new(RefCell::new(BuildState::new(branch)));
		let html = self
			.current_build
			.with_value(Rc::clone(&state), || self.current_branch.with_value(branch, || markup(self)));
		let state = state.replace(BuildState::new(branch));

		let result = html.and_then(|html| self.commit(branch, &html, &state, &old_children, focus_hint.as_deref()));
		if result.is_err() {
			let mut arena = self.arena.borrow_mut();
			for (label, child) in state.new_children.iter() {
				if old_children.get(label) != Some(child) {
					arena.discard(child);
				}
			}
		}
		result
	}

	/// Rebuilds `branch` from its own controller.
	///
	/// # Errors
	///
	/// As [`Reconciler::rebuild`], and [`Error::AbstractBranch`] for [`Basic`] branches.
	pub fn refresh(&self, branch: BranchId) -> Result<Classification, Error> {
		self.rebuild(branch, |reconciler| reconciler.render(branch))
	}

	/// Produces `branch`'s markup from its controller, with `branch` as current branch.
	///
	/// # Errors
	///
	/// [`Error::NotABranch`], or whatever the controller fails with.
	pub fn render(&self, branch: BranchId) -> Markup {
		let controller = Rc::clone(&self.arena.borrow().get(branch)?.controller);
		self.current_branch.with_value(branch, || controller.render(self, branch))
	}

	/// Declares a [`Basic`] child branch labelled `label` and returns the markup to put in its place.
	///
	/// See [`Reconciler::branch_with`].
	///
	/// # Errors
	///
	/// As [`Reconciler::branch_with`].
	pub fn branch(&self, label: &str, markup: impl FnOnce(&Self) -> Markup) -> Markup {
		self.branch_with(label, Basic, markup)
	}

	/// Declares a child branch labelled `label` and returns the markup to put in its place.
	///
	/// During a build pass, an existing child of the same label is reconciled in place (keeping its original controller),
	/// otherwise a new branch with `controller` is built. The return value is then a placeholder comment,
	/// which the enclosing pass swaps for the child's nodes.
	///
	/// Outside of build passes, an existing child of the [current branch](`Reconciler::current_branch`) with the same label is reused.
	/// Otherwise a new branch is attached to the current branch if that hasn't been built yet, or used as scratch branch and dropped again,
	/// and `markup`'s output is returned as-is.
	///
	/// # Errors
	///
	/// - [`Error::InvalidLabel`] if `label` is empty.
	/// - [`Error::DuplicateLabel`] if a sibling with the same label was already declared during this pass.
	/// - Whatever building the child fails with.
	#[instrument(skip_all)]
	pub fn branch_with(&self, label: &str, controller: impl 'static + Controller, markup: impl FnOnce(&Self) -> Markup) -> Markup {
		if label.is_empty() {
			error!("Empty branch label.");
			return Err(Error::InvalidLabel);
		}
		if cfg!(feature = "dangerous-logging") {
			trace!(label);
		}

		let state = match self.current_build.get() {
			Some(state) => state,
			None => return self.branch_directly(label, controller, markup),
		};

		let (parent, duplicate) = {
			let state = state.borrow();
			(state.branch, state.new_children.contains(label))
		};
		if duplicate {
			error!("Duplicate branch label.");
			return Err(Error::DuplicateLabel(label.to_owned()));
		}

		let existing = self.arena.borrow().get(parent)?.children.get(label);
		let child = match existing {
			Some(child) => {
				trace!(%child, "Reconciling existing child in place.");
				self.rebuild(child, markup)?;
				child
			}
			None => self.build_branch(controller, markup)?,
		};

		let registered = {
			let mut tokens = self.tokens.borrow_mut();
			state.borrow_mut().register(label, child, &mut **tokens, self.options.get_owner_tag())
		};
		match registered {
			Ok(placeholder) => Ok(comment_markup(&placeholder)),
			Err(error) => {
				if existing.is_none() {
					self.arena.borrow_mut().discard(child);
				}
				Err(error)
			}
		}
	}

	/// Outside of build passes, an existing child of the same label is reused as current branch.
	/// New children are only recorded below branches that haven't been built yet; otherwise they are scratch branches, dropped afterwards.
	fn branch_directly(&self, label: &str, controller: impl 'static + Controller, markup: impl FnOnce(&Self) -> Markup) -> Markup {
		let parent = self.current_branch.get();
		let (existing, attach) = match parent {
			Some(parent) => {
				let arena = self.arena.borrow();
				let record = arena.get(parent)?;
				(record.children.get(label), record.first_node.is_none())
			}
			None => (None, false),
		};
		if let Some(existing) = existing {
			return self.current_branch.with_value(existing, || markup(self));
		}

		let child = self.arena.borrow_mut().allocate(Rc::new(controller));
		if let (Some(parent), true) = (parent, attach) {
			let mut arena = self.arena.borrow_mut();
			if let Err(error) = arena.attach(parent, label, child) {
				arena.discard(child);
				return Err(error);
			}
		}

		let html = self.current_branch.with_value(child, || markup(self));
		if html.is_err() || !attach {
			let mut arena = self.arena.borrow_mut();
			if let (Some(parent), true) = (parent, attach) {
				if let Ok(record) = arena.get_mut(parent) {
					record.children.remove(label);
				}
			}
			arena.discard(child);
		}
		html
	}

	/// Applies a finished markup pass to `branch`. Nothing about `branch` is changed unless this succeeds.
	fn commit(&self, branch: BranchId, html: &str, state: &BuildState, old_children: &LabelMap, focus_hint: Option<&str>) -> Result<Classification, Error> {
		if cfg!(feature = "dangerous-logging") {
			trace!(html, "Generated markup.");
		} else {
			trace!(html.len = html.len(), "Generated markup.");
		}

		let fragment = dom::parse_fragment(&self.document, html)?;
		if fragment.first_child().is_none() {
			fragment
				.append_child(&self.document.create_comment(""))
				.map_err(Error::dom("appendChild"))?;
		}

		let placeholders = state.find_placeholders(&fragment, self.options.get_owner_tag())?;
		let mut children = LabelMap::new();
		for label in placeholders.keys() {
			let child = state.new_children.get(label).ok_or_else(|| Error::MissingPlaceholder(label.clone()))?;
			children.append(label, child)?;
		}

		let old_bounds = self.arena.borrow().get(branch)?.bounds();
		let (first_node, last_node, classification) = match &old_bounds {
			None => self.first_build(&fragment, &placeholders, &children, old_children)?,
			Some((old_first, old_last)) => {
				let old_ranges = self.child_ranges(old_children)?;
				let new_ranges = self.child_ranges(&children)?;
				let outcome = Patch {
					document: &self.document,
					branch,
					old_first,
					old_last,
					fragment: &fragment,
					old_children: &old_ranges,
					new_children: &new_ranges,
					placeholders: &placeholders,
					focus_hint,
				}
				.run()?;
				(outcome.first_node, outcome.last_node, outcome.classification)
			}
		};

		{
			let mut arena = self.arena.borrow_mut();
			arena.replace_children(branch, children)?;
			let record = arena.get_mut(branch)?;
			record.first_node = Some(first_node.clone());
			record.last_node = Some(last_node.clone());
		}
		if let Some(old_bounds) = old_bounds {
			self.propagate_bounds(branch, &old_bounds, &(first_node, last_node))?;
		}
		self.tag_range(branch)?;
		Ok(classification)
	}

	#[instrument(skip_all)]
	fn first_build(
		&self,
		fragment: &DocumentFragment,
		placeholders: &IndexMap<String, Comment>,
		children: &LabelMap,
		old_children: &LabelMap,
	) -> Result<(Node, Node, Classification), Error> {
		let mut classification = Classification::default();
		let ranges = self.child_ranges(children)?;
		for (range, comment) in ranges.iter().zip(placeholders.values()) {
			let span = trace_span!("Splicing child", child = %range.id);
			let _enter = span.enter();
			let (first, last) = range.bounds.as_ref().ok_or(Error::BrokenRange(range.id))?;
			let nodes = dom::extract_range(&self.document, first, last, range.id)?;
			let parent = comment.parent_node().ok_or(Error::BrokenRange(range.id))?;
			parent.replace_child(&nodes, comment).map_err(Error::dom("replaceChild"))?;

			classification.novel.push(range.label.clone());
		}
		classification.dead = old_children.labels().filter(|label| !children.contains(label)).map(str::to_owned).collect();
		debug!(children = children.len(), "Built branch for the first time.");

		let first = fragment.first_child();
		let last = fragment.last_child();
		first.zip(last).map(|(first, last)| (first, last, classification)).ok_or(Error::Dom {
			operation: "firstChild",
			error: "empty fragment".into(),
		})
	}

	fn child_ranges(&self, children: &LabelMap) -> Result<Vec<ChildRange>, Error> {
		let arena = self.arena.borrow();
		children
			.iter()
			.map(|(label, id)| {
				Ok(ChildRange {
					label: label.to_owned(),
					id,
					bounds: arena.get(id)?.bounds(),
				})
			})
			.collect()
	}

	/// Moves ancestors' boundaries along where they coincided with `branch`'s old ones.
	fn propagate_bounds(&self, branch: BranchId, (old_first, old_last): &(Node, Node), (new_first, new_last): &(Node, Node)) -> Result<(), Error> {
		if old_first == new_first && old_last == new_last {
			return Ok(());
		}
		let mut arena = self.arena.borrow_mut();
		let ancestors: Vec<_> = arena.ancestors(branch).collect();
		for ancestor in ancestors {
			let record = arena.get_mut(ancestor)?;
			let mut changed = false;
			if record.first_node.as_ref() == Some(old_first) {
				record.first_node = Some(new_first.clone());
				changed = true;
			}
			if record.last_node.as_ref() == Some(old_last) {
				record.last_node = Some(new_last.clone());
				changed = true;
			}
			if !changed {
				break;
			}
			trace!(%ancestor, "Moved ancestor boundary.");
		}
		Ok(())
	}

	/// Marks the top-level nodes of `branch`'s range as owned by it, except where a live descendant already claimed them.
	fn tag_range(&self, branch: BranchId) -> Result<(), Error> {
		let arena = self.arena.borrow();
		let (first, last) = arena.get(branch)?.bounds().ok_or(Error::BrokenRange(branch))?;
		for node in sibling_run(&first, &last).ok_or(Error::BrokenRange(branch))? {
			self.owners
				.tag_if_untagged(&node, branch, |owner| arena.contains(owner) && arena.ancestors(owner).any(|ancestor| ancestor == branch));
		}
		Ok(())
	}

	/// The label of `branch`'s child that contains the focused element, if any.
	fn focus_hint(&self, branch: BranchId, old_children: &LabelMap) -> Option<String> {
		if !self.options.get_focus_hint() || old_children.is_empty() {
			return None;
		}
		let focused: Node = self.document.active_element()?.into();
		let arena = self.arena.borrow();
		let owner = self.owners.find(&focused, |owner| arena.contains(owner))?;
		let child = core::iter::once(owner)
			.chain(arena.ancestors(owner))
			.find(|&candidate| arena.parent(candidate) == Some(branch))?;
		let label = old_children.label_of(child).map(str::to_owned);
		trace!(found = label.is_some(), "Focus hint.");
		label
	}

	/// Whether `branch` still exists.
	#[must_use]
	pub fn is_alive(&self, branch: BranchId) -> bool {
		self.arena.borrow().contains(branch)
	}

	/// # Errors
	///
	/// [`Error::NotABranch`].
	pub fn first_node(&self, branch: BranchId) -> Result<Option<Node>, Error> {
		Ok(self.arena.borrow().get(branch)?.first_node.clone())
	}

	/// # Errors
	///
	/// [`Error::NotABranch`].
	pub fn last_node(&self, branch: BranchId) -> Result<Option<Node>, Error> {
		Ok(self.arena.borrow().get(branch)?.last_node.clone())
	}

	/// The top-level nodes `branch` owns, in order. Empty before the first build.
	///
	/// # Errors
	///
	/// [`Error::NotABranch`], or [`Error::BrokenRange`] if the range isn't contiguous anymore.
	pub fn nodes(&self, branch: BranchId) -> Result<Vec<Node>, Error> {
		match self.arena.borrow().get(branch)?.bounds() {
			None => Ok(Vec::new()),
			Some((first, last)) => sibling_run(&first, &last).ok_or(Error::BrokenRange(branch)),
		}
	}

	/// # Errors
	///
	/// [`Error::NotABranch`].
	pub fn children(&self, branch: BranchId) -> Result<LabelMap, Error> {
		Ok(self.arena.borrow().get(branch)?.children.clone())
	}

	#[must_use]
	pub fn parent(&self, branch: BranchId) -> Option<BranchId> {
		self.arena.borrow().parent(branch)
	}

	/// The label under which `parent` holds `child`.
	///
	/// # Errors
	///
	/// [`Error::NotABranch`] if `parent` doesn't exist.
	pub fn find_child(&self, parent: BranchId, child: BranchId) -> Result<Option<String>, Error> {
		Ok(self.arena.borrow().get(parent)?.children.label_of(child).map(str::to_owned))
	}

	/// The innermost live branch whose range contains `node`.
	#[must_use]
	pub fn find_branch(&self, node: &Node) -> Option<BranchId> {
		let arena = self.arena.borrow();
		self.owners.find(node, |owner| arena.contains(owner))
	}

	/// Whether `node` is (inside) one of `branch`'s nodes.
	///
	/// # Errors
	///
	/// As [`Reconciler::nodes`].
	pub fn contains_node(&self, branch: BranchId, node: &Node) -> Result<bool, Error> {
		Ok(self.nodes(branch)?.iter().any(|owned| owned == node || owned.contains(Some(node))))
	}

	/// Frees a root branch and everything below it. Its nodes are left alone.
	///
	/// # Errors
	///
	/// - [`Error::NotABranch`] if `root` doesn't exist.
	/// - [`Error::AlreadyAttached`] if `root` isn't a root.
	pub fn release(&self, root: BranchId) -> Result<(), Error> {
		let mut arena = self.arena.borrow_mut();
		arena.get(root)?;
		if arena.parent(root).is_some() {
			return Err(Error::AlreadyAttached(root));
		}
		arena.discard(root);
		Ok(())
	}
}
