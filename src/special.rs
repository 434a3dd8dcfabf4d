//! Stack-scoped dynamic cells.
//!
//! A [`Special`] holds the value that is "current" for the duration of a call.
//! [`Special::with_value`] installs a value, runs a closure and restores the previous value afterwards,
//! on every exit path including unwinding, so nested (re-entrant) calls always observe exactly what their own frame installed.

use core::{cell::RefCell, mem};

#[derive(Debug)]
pub struct Special<T>(RefCell<Option<T>>);

impl<T> Default for Special<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Special<T> {
	#[must_use]
	pub fn new() -> Self {
		Self(RefCell::new(None))
	}

	/// Runs `f` with `value` installed, then reinstates whatever was current before.
	pub fn with_value<R>(&self, value: T, f: impl FnOnce() -> R) -> R {
		let previous = self.0.replace(Some(value));
		let _restore = Restore { cell: &self.0, previous: Some(previous) };
		f()
	}
}

impl<T: Clone> Special<T> {
	#[must_use]
	pub fn get(&self) -> Option<T> {
		self.0.borrow().clone()
	}
}

struct Restore<'a, T> {
	cell: &'a RefCell<Option<T>>,
	previous: Option<Option<T>>,
}

impl<'a, T> Drop for Restore<'a, T> {
	fn drop(&mut self) {
		if let Some(previous) = self.previous.take() {
			// The installed value is dropped only after the borrow ends, in case its destructor looks at the cell.
			let installed = mem::replace(&mut *self.cell.borrow_mut(), previous);
			drop(installed);
		}
	}
}
