use crate::BranchId;
use core::fmt::{self, Display, Formatter};
use wasm_bindgen::JsValue;

/// Errors surfaced by the reconciliation API.
///
/// Apart from [`Error::Markup`], which carries a failure of a caller-supplied markup function unchanged,
/// every variant is fatal: Either the API was misused or an internal invariant broke.
/// Nothing in this crate retries.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
	/// A branch label was empty.
	InvalidLabel,
	/// Two sibling branches used the same label during one build pass.
	DuplicateLabel(String),
	/// The handle doesn't (or no longer) refer to a live branch.
	NotABranch(BranchId),
	/// A branch that already has a parent was used where a detached branch was required.
	AlreadyAttached(BranchId),
	/// The branch's controller can't produce markup on its own.
	AbstractBranch(BranchId),
	/// A child registered during the pass has no placeholder comment in the parsed markup.
	MissingPlaceholder(String),
	/// A placeholder comment occurred more than once in the parsed markup.
	DuplicatePlaceholder(String),
	/// The branch's node range isn't a contiguous, non-empty run of siblings.
	BrokenRange(BranchId),
	/// A DOM operation threw.
	Dom { operation: &'static str, error: JsValue },
	/// There is no global `window.document`.
	NoDocument,
	/// The markup function failed.
	Markup(Box<dyn std::error::Error>),
}

impl Error {
	/// Wraps a failure of a markup-producing function so it can travel through the reconciler unchanged.
	pub fn markup(error: impl Into<Box<dyn std::error::Error>>) -> Self {
		Self::Markup(error.into())
	}

	pub(crate) fn dom(operation: &'static str) -> impl FnOnce(JsValue) -> Self {
		move |error| Self::Dom { operation, error }
	}
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Error::InvalidLabel => write!(f, "branch labels must be non-empty strings"),
			Error::DuplicateLabel(label) => write!(f, "duplicate branch label: {:?}", label),
			Error::NotABranch(id) => write!(f, "{} is not a live branch", id),
			Error::AlreadyAttached(id) => write!(f, "{} is already attached to a parent branch", id),
			Error::AbstractBranch(id) => write!(f, "{} has no markup of its own", id),
			Error::MissingPlaceholder(label) => write!(f, "placeholder for branch {:?} is missing from the generated markup", label),
			Error::DuplicatePlaceholder(label) => write!(f, "placeholder for branch {:?} occurs more than once in the generated markup", label),
			Error::BrokenRange(id) => write!(f, "node range of {} is broken", id),
			Error::Dom { operation, error } => write!(f, "DOM operation `{}` failed: {:?}", operation, error),
			Error::NoDocument => write!(f, "no global document found"),
			Error::Markup(error) => write!(f, "markup function failed: {}", error),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Markup(error) => Some(error.as_ref()),
			_ => None,
		}
	}
}
