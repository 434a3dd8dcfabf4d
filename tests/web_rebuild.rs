#![cfg(target_arch = "wasm32")]

use shark_dom::{Basic, Error, Options, Reconciler};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{Element, HtmlElement, Node};

use web_support_::{child_nodes, document, html, mount, reconciler, reconciler_with, unmount};

wasm_bindgen_test_configure!(run_in_browser);

fn greeting(text: &'static str) -> impl FnOnce(&Reconciler) -> shark_dom::Markup {
	move |rc| Ok(format!("<span>{}</span>", rc.branch("x", html(text))?))
}

#[wasm_bindgen_test]
fn unchanged_surroundings_keep_their_nodes() {
	let reconciler = reconciler();
	let root = reconciler.build_branch(Basic, greeting("Hi")).unwrap();
	let host = mount(&reconciler, root);
	let span = host.first_child().unwrap();

	let classification = reconciler.rebuild(root, greeting("Bye")).unwrap();
	assert_eq!(classification.unmoved, ["x"]);
	assert!(classification.moved.is_empty() && classification.novel.is_empty() && classification.dead.is_empty());
	assert_eq!(host.inner_html(), "<span>Bye</span>");
	assert_eq!(host.first_child(), Some(span.clone()));
	assert_eq!(reconciler.first_node(root).unwrap(), Some(span));
	unmount(&host);
}

#[wasm_bindgen_test]
fn identical_rebuilds_are_no_ops() {
	let reconciler = reconciler();
	let markup = |rc: &Reconciler| -> shark_dom::Markup {
		Ok(format!(
			"<div class=\"a\"><p>{}</p></div><ul>{}</ul>",
			rc.branch("p", html("<b>bold</b> text"))?,
			rc.branch("list", |rc| Ok(format!("<li>{}</li>", rc.branch("item", html("<input>"))?)))?,
		))
	};
	let root = reconciler.build_branch(Basic, markup).unwrap();
	let host = mount(&reconciler, root);
	let before = host.inner_html();
	let div = host.first_child().unwrap();
	let li = host.query_selector("li").unwrap().unwrap();

	for _ in 0..2 {
		let classification = reconciler.rebuild(root, markup).unwrap();
		assert_eq!(classification.unmoved, ["p", "list"]);
		assert_eq!(host.inner_html(), before);
		assert_eq!(host.first_child(), Some(div.clone()));
		assert_eq!(host.query_selector("li").unwrap(), Some(li.clone()));
	}
	unmount(&host);
}

#[wasm_bindgen_test]
fn kept_elements_take_on_new_attributes() {
	let reconciler = reconciler();
	let root = reconciler
		.build_branch(Basic, |rc| Ok(format!("<div class=\"old\" title=\"t\">{}</div>", rc.branch("x", html("x"))?)))
		.unwrap();
	let host = mount(&reconciler, root);
	let div: Element = host.first_element_child().unwrap();

	reconciler
		.rebuild(root, |rc| Ok(format!("<div class=\"new\">{}</div>", rc.branch("x", html("x"))?)))
		.unwrap();
	assert_eq!(host.first_element_child(), Some(div.clone()));
	assert_eq!(div.get_attribute("class").as_deref(), Some("new"));
	assert!(!div.has_attribute("title"));
	unmount(&host);
}

#[wasm_bindgen_test]
fn changed_parents_move_children() {
	let reconciler = reconciler();
	let root = reconciler
		.build_branch(Basic, |rc| Ok(format!("<div>{}</div>", rc.branch("x", html("<b>X</b>"))?)))
		.unwrap();
	let host = mount(&reconciler, root);
	let x = reconciler.children(root).unwrap().get("x").unwrap();

	let classification = reconciler
		.rebuild(root, |rc| Ok(format!("<span>{}</span>", rc.branch("x", html("<b>X</b>"))?)))
		.unwrap();
	assert_eq!(classification.moved, ["x"]);
	assert!(classification.unmoved.is_empty());
	assert_eq!(host.inner_html(), "<span><b>X</b></span>");
	assert_eq!(host.first_child().unwrap().first_child(), reconciler.first_node(x).unwrap());
	unmount(&host);
}

#[wasm_bindgen_test]
fn dead_and_novel_children() {
	let reconciler = reconciler();
	let root = reconciler
		.build_branch(Basic, |rc| Ok(format!("{}{}", rc.branch("a", html("A"))?, rc.branch("b", html("B"))?)))
		.unwrap();
	let host = mount(&reconciler, root);
	let children = reconciler.children(root).unwrap();
	let (a, b) = (children.get("a").unwrap(), children.get("b").unwrap());

	let classification = reconciler
		.rebuild(root, |rc| Ok(format!("{}{}", rc.branch("b", html("B"))?, rc.branch("c", html("C"))?)))
		.unwrap();
	assert_eq!(classification.dead, ["a"]);
	assert_eq!(classification.novel, ["c"]);
	assert_eq!(classification.unmoved, ["b"]);
	assert_eq!(host.inner_html(), "BC");
	assert_eq!(host.first_child(), reconciler.first_node(b).unwrap());

	assert!(!reconciler.is_alive(a));
	assert!(reconciler.is_alive(b));
	let children = reconciler.children(root).unwrap();
	assert_eq!(children.labels().collect::<Vec<_>>(), ["b", "c"]);
	assert_eq!(children.get("b"), Some(b));
	assert_eq!(reconciler.nodes(root).unwrap(), child_nodes(&host));
	unmount(&host);
}

#[wasm_bindgen_test]
fn reordered_siblings() {
	let reconciler = reconciler_with(Options::new().focus_hint(false));
	let root = reconciler
		.build_branch(Basic, |rc| Ok(format!("{}{}", rc.branch("a", html("<i>a</i>"))?, rc.branch("b", html("<i>b</i>"))?)))
		.unwrap();
	let host = mount(&reconciler, root);

	let classification = reconciler
		.rebuild(root, |rc| Ok(format!("{}{}", rc.branch("b", html("<i>b</i>"))?, rc.branch("a", html("<i>a</i>"))?)))
		.unwrap();
	assert_eq!(classification.unmoved, ["b"]);
	assert_eq!(classification.moved, ["a"]);
	assert_eq!(host.inner_html(), "<i>b</i><i>a</i>");
	unmount(&host);
}

#[wasm_bindgen_test]
fn focused_child_stays_in_place() {
	let button = |rc: &Reconciler, label: &str| rc.branch(label, |rc| Ok(format!("<button>{}</button>", rc.branch("caption", html("Press"))?)));
	let reconciler = reconciler();
	let root = reconciler
		.build_branch(Basic, |rc| Ok(format!("{}{}", button(rc, "a")?, button(rc, "b")?)))
		.unwrap();
	let host = mount(&reconciler, root);
	let a: HtmlElement = reconciler.first_node(reconciler.children(root).unwrap().get("a").unwrap()).unwrap().unwrap().dyn_into().unwrap();
	a.focus().unwrap();
	assert_eq!(document().active_element(), Some(a.clone().into()));

	let classification = reconciler
		.rebuild(root, |rc| Ok(format!("{}{}", button(rc, "b")?, button(rc, "a")?)))
		.unwrap();
	assert_eq!(classification.unmoved, ["a"]);
	assert_eq!(classification.moved, ["b"]);
	assert_eq!(host.last_child(), Some(a.clone().into()));
	assert_eq!(document().active_element(), Some(a.into()));
	unmount(&host);
}

#[wasm_bindgen_test]
fn child_rebuilds_move_ancestor_bounds() {
	let reconciler = reconciler();
	let root = reconciler
		.build_branch(Basic, |rc| rc.branch("x", html("<b>1</b>")))
		.unwrap();
	let host = mount(&reconciler, root);
	let x = reconciler.children(root).unwrap().get("x").unwrap();

	reconciler.rebuild(x, html("<i>2</i><i>3</i>")).unwrap();
	assert_eq!(host.inner_html(), "<i>2</i><i>3</i>");
	assert_eq!(reconciler.first_node(root).unwrap(), reconciler.first_node(x).unwrap());
	assert_eq!(reconciler.last_node(root).unwrap(), reconciler.last_node(x).unwrap());
	assert_eq!(reconciler.nodes(root).unwrap(), child_nodes(&host));

	let classification = reconciler
		.rebuild(root, |rc| Ok(format!("<hr>{}", rc.branch("x", html("<i>2</i><i>3</i>"))?)))
		.unwrap();
	assert_eq!(classification.unmoved, ["x"]);
	assert_eq!(host.inner_html(), "<hr><i>2</i><i>3</i>");
	unmount(&host);
}

#[wasm_bindgen_test]
fn surrounding_nodes_are_left_alone() {
	let reconciler = reconciler();
	let root = reconciler.build_branch(Basic, html("<p>old</p>")).unwrap();
	let host = mount(&reconciler, root);
	let before: Node = document().create_text_node("before").into();
	let after: Node = document().create_text_node("after").into();
	host.insert_before(&before, host.first_child().as_ref()).unwrap();
	host.append_child(&after).unwrap();

	reconciler.rebuild(root, html("<p>new</p><p>newer</p>")).unwrap();
	assert_eq!(host.inner_html(), "before<p>new</p><p>newer</p>after");
	assert_eq!(host.first_child(), Some(before.clone()));
	assert_eq!(host.last_child(), Some(after.clone()));
	assert_eq!(reconciler.first_node(root).unwrap(), before.next_sibling());
	assert_eq!(reconciler.last_node(root).unwrap(), after.previous_sibling());
	unmount(&host);
}

#[wasm_bindgen_test]
fn failed_rebuilds_change_nothing() {
	let reconciler = reconciler();
	let root = reconciler
		.build_branch(Basic, |rc| Ok(format!("<p>{}</p>", rc.branch("x", html("x"))?)))
		.unwrap();
	let host = mount(&reconciler, root);
	let before = host.inner_html();
	let children = reconciler.children(root).unwrap();

	let result = reconciler.rebuild(root, |rc| {
		rc.branch("novel", html("n"))?;
		Err(Error::markup("backend unavailable"))
	});
	assert!(matches!(result, Err(Error::Markup(_))));
	assert_eq!(host.inner_html(), before);
	assert_eq!(reconciler.children(root).unwrap(), children);

	let result = reconciler.rebuild(root, |rc| Ok(format!("{}{}", rc.branch("y", html("1"))?, rc.branch("y", html("2"))?)));
	assert!(matches!(result, Err(Error::DuplicateLabel(label)) if label == "y"));
	assert_eq!(host.inner_html(), before);
	assert_eq!(reconciler.children(root).unwrap(), children);

	// Still fully functional.
	reconciler
		.rebuild(root, |rc| Ok(format!("<p>{}</p>", rc.branch("x", html("y"))?)))
		.unwrap();
	assert_eq!(host.inner_html(), "<p>y</p>");
	unmount(&host);
}

#[wasm_bindgen_test]
fn stale_handles() {
	let reconciler = reconciler();
	let root = reconciler.build_branch(Basic, |rc| rc.branch("x", html("x"))).unwrap();
	let x = reconciler.children(root).unwrap().get("x").unwrap();
	reconciler.rebuild(root, html("gone")).unwrap();

	assert!(matches!(reconciler.rebuild(x, html("x")), Err(Error::NotABranch(id)) if id == x));
	assert!(matches!(reconciler.release(x), Err(Error::NotABranch(id)) if id == x));
}
