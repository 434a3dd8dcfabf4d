#![doc(html_root_url = "https://docs.rs/shark-dom/0.0.1")]
#![warn(clippy::pedantic)]
//! Incremental reconciliation of live DOM regions, driven by labelled branches.
//!
//! A branch is a contiguous run of sibling nodes produced from an HTML string.
//! Markup functions declare nested branches with [`Reconciler::branch`], and when a branch is rebuilt,
//! children with the same label are reconciled in place instead of being recreated.
//!
//! See [`Reconciler`] for an example.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod branch;
mod build_state;
mod dom;
mod error;
mod labels;
mod options;
mod patch;
mod placeholder;
mod reconciler;
pub mod relationship;
mod special;

pub use branch::{Basic, BranchId, Controller, ListBranch, SmartBranch};
pub use error::Error;
pub use labels::LabelMap;
pub use options::Options;
pub use patch::Classification;
pub use placeholder::{RandomTokens, TokenSource};
pub use reconciler::Reconciler;

/// What markup functions return: an HTML string, or why none could be produced.
///
/// Wrap foreign errors with [`Error::markup`].
pub type Markup = Result<String, Error>;
