use crate::{
	labels::LabelMap,
	placeholder::{placeholder_text, walk_comments, TokenSource},
	BranchId, Error,
};
use hashbrown::HashMap;
use indexmap::IndexMap;
use tracing::{error, trace, warn};
use web_sys::{Comment, Node};

/// Accumulator for one build pass over a single branch.
///
/// A fresh instance is created per pass and per nesting level; it's never shared.
#[derive(Debug)]
pub(crate) struct BuildState {
	pub branch: BranchId,
	/// Children produced during this pass, in call order.
	pub new_children: LabelMap,
	/// Placeholder comment text → label.
	placeholders: HashMap<String, String>,
}

impl BuildState {
	pub fn new(branch: BranchId) -> Self {
		Self {
			branch,
			new_children: LabelMap::new(),
			placeholders: HashMap::new(),
		}
	}

	/// Records `child` under `label` and returns the text of a fresh placeholder comment for it.
	pub fn register(&mut self, label: &str, child: BranchId, tokens: &mut dyn TokenSource, owner_tag: &str) -> Result<String, Error> {
		self.new_children.append(label, child)?;
		// Labels are unique per pass and part of the text, so texts can't collide.
		let text = placeholder_text(owner_tag, label, &tokens.new_token());
		self.placeholders.insert(text.clone(), label.to_owned());
		Ok(text)
	}

	/// Collects the placeholders of this pass found at or below `root`, as `label → comment` in document order.
	///
	/// Comments that aren't placeholders of this pass are ignored.
	///
	/// # Errors
	///
	/// - [`Error::DuplicatePlaceholder`] if a placeholder occurs more than once.
	/// - [`Error::MissingPlaceholder`] if a child registered during this pass has no placeholder at all.
	pub fn find_placeholders(&self, root: &Node, owner_tag: &str) -> Result<IndexMap<String, Comment>, Error> {
		let stale_prefix = format!("{}_Branch:", owner_tag);
		let mut found = IndexMap::with_capacity(self.new_children.len());
		walk_comments(root, |comment| {
			let data = comment.data();
			let label = match self.placeholders.get(&data) {
				Some(label) if self.new_children.contains(label) => label,
				_ => {
					if data.starts_with(&stale_prefix) {
						warn!("Ignoring a placeholder that wasn't issued during this pass. Was markup cached across build passes?");
					}
					return Ok(());
				}
			};
			trace!(found = found.len(), "Found placeholder.");
			match found.entry(label.clone()) {
				indexmap::map::Entry::Occupied(_) => Err(Error::DuplicatePlaceholder(label.clone())),
				indexmap::map::Entry::Vacant(vacant) => {
					vacant.insert(comment);
					Ok(())
				}
			}
		})?;

		if let Some(missing) = self.new_children.labels().find(|label| !found.contains_key(*label)) {
			error!("A child branch's placeholder didn't survive parsing. Was it placed inside an attribute or a raw text element?");
			return Err(Error::MissingPlaceholder(missing.to_owned()));
		}
		Ok(found)
	}
}
