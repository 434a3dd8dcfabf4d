use std::borrow::Cow;

/// Construction options for a [`Reconciler`](`crate::Reconciler`).
///
/// Setters chain like `web_sys`' option dictionaries:
///
/// ```rust
/// let mut options = shark_dom::Options::new();
/// options.owner_tag("MyApp").focus_hint(false);
/// assert_eq!(options.get_owner_tag(), "MyApp");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
	owner_tag: Cow<'static, str>,
	focus_hint: bool,
}

impl Default for Options {
	fn default() -> Self {
		Self::new()
	}
}

impl Options {
	#[must_use]
	pub fn new() -> Self {
		Self {
			owner_tag: Cow::Borrowed("Shark"),
			focus_hint: true,
		}
	}

	/// Prefix of placeholder comments, to make them attributable when inspecting markup. Defaults to `"Shark"`.
	pub fn owner_tag(&mut self, owner_tag: impl Into<Cow<'static, str>>) -> &mut Self {
		self.owner_tag = owner_tag.into();
		self
	}

	/// Whether to look up the focused element before each rebuild, so that the branch containing it is preferably left in place.
	/// Defaults to `true`.
	pub fn focus_hint(&mut self, focus_hint: bool) -> &mut Self {
		self.focus_hint = focus_hint;
		self
	}

	#[must_use]
	pub fn get_owner_tag(&self) -> &str {
		&self.owner_tag
	}

	#[must_use]
	pub fn get_focus_hint(&self) -> bool {
		self.focus_hint
	}
}
