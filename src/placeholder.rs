//! Comment placeholders that stand in for child branches inside generated markup.
//!
//! The text of a placeholder is readable (it names the label) but carries a random token,
//! so comments that merely look similar can't be mistaken for it. It is only ever compared for exact equality.

use crate::Error;
use std::borrow::Cow;
use wasm_bindgen::JsCast;
use web_sys::{Comment, Node};

/// Source of opaque, effectively unique placeholder tokens.
pub trait TokenSource {
	fn new_token(&mut self) -> String;
}

/// 128 bits from [`js_sys::Math::random`] as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn new_token(&mut self) -> String {
		(0..4)
			.map(|_| format!("{:08x}", (js_sys::Math::random() * 4_294_967_296.0) as u32))
			.collect()
	}
}

/// `"<owner_tag>_Branch:<label>:<token>"`
pub(crate) fn placeholder_text(owner_tag: &str, label: &str, token: &str) -> String {
	format!("{}_Branch:{}:{}", owner_tag, escape_label(label), token)
}

pub(crate) fn comment_markup(text: &str) -> String {
	format!("<!--{}-->", text)
}

/// Keeps a label from closing the comment early.
fn escape_label(label: &str) -> Cow<'_, str> {
	if !label.contains(|c: char| matches!(c, '%' | '-' | '<' | '>')) {
		return Cow::Borrowed(label);
	}
	let mut escaped = String::with_capacity(label.len() + 8);
	for c in label.chars() {
		match c {
			'%' => escaped.push_str("%25"),
			'-' => escaped.push_str("%2D"),
			'<' => escaped.push_str("%3C"),
			'>' => escaped.push_str("%3E"),
			c => escaped.push(c),
		}
	}
	Cow::Owned(escaped)
}

/// Visits every comment at or below `root`, in document order.
pub(crate) fn walk_comments(root: &Node, mut visit: impl FnMut(Comment) -> Result<(), Error>) -> Result<(), Error> {
	if let Some(comment) = root.dyn_ref::<Comment>() {
		visit(comment.clone())?;
	}

	let mut next = root.first_child();
	while let Some(node) = next {
		if let Some(comment) = node.dyn_ref::<Comment>() {
			visit(comment.clone())?;
		}
		next = node.first_child().or_else(|| following_outside(&node, root));
	}
	Ok(())
}

/// The next node in document order that isn't a descendant of `node`, without leaving `root`.
fn following_outside(node: &Node, root: &Node) -> Option<Node> {
	let mut current = node.clone();
	loop {
		if &current == root {
			return None;
		}
		if let Some(sibling) = current.next_sibling() {
			return Some(sibling);
		}
		current = current.parent_node()?;
	}
}
