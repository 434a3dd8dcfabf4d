use crate::{BranchId, Error};
use indexmap::{map::Entry, IndexMap};

/// Insertion-ordered `label → branch` mapping.
///
/// Used both for a branch's persisted children and for the children collected during a single build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap(IndexMap<String, BranchId>);

impl LabelMap {
	#[must_use]
	pub fn new() -> Self {
		Self(IndexMap::new())
	}

	#[must_use]
	pub fn get(&self, label: &str) -> Option<BranchId> {
		self.0.get(label).copied()
	}

	#[must_use]
	pub fn contains(&self, label: &str) -> bool {
		self.0.contains_key(label)
	}

	/// Appends `label` at the end.
	///
	/// # Errors
	///
	/// Iff `label` is already present, in which case the map is unchanged.
	pub fn append(&mut self, label: &str, branch: BranchId) -> Result<(), Error> {
		match self.0.entry(label.to_owned()) {
			Entry::Occupied(_) => Err(Error::DuplicateLabel(label.to_owned())),
			Entry::Vacant(vacant) => {
				vacant.insert(branch);
				Ok(())
			}
		}
	}

	/// Removes `label` while keeping the order of the remaining entries.
	pub fn remove(&mut self, label: &str) -> Option<BranchId> {
		self.0.shift_remove(label)
	}

	/// Finds the label under which `branch` is stored.
	#[must_use]
	pub fn label_of(&self, branch: BranchId) -> Option<&str> {
		self.iter().find(|&(_, candidate)| candidate == branch).map(|(label, _)| label)
	}

	pub fn iter(&self) -> impl '_ + DoubleEndedIterator<Item = (&str, BranchId)> + ExactSizeIterator {
		self.0.iter().map(|(label, &branch)| (label.as_str(), branch))
	}

	pub fn labels(&self) -> impl '_ + DoubleEndedIterator<Item = &str> + ExactSizeIterator {
		self.0.keys().map(String::as_str)
	}

	pub fn branches(&self) -> impl '_ + DoubleEndedIterator<Item = BranchId> + ExactSizeIterator {
		self.0.values().copied()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
