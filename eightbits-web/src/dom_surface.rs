//! [`PostSurface`] backed by a scrollable DOM element.
//!
//! Rows are created imperatively instead of through Yew's virtual DOM so the
//! container's `scrollHeight` already includes a new row when the merge
//! engine samples it right after `append`/`prepend`.

use std::collections::HashMap;

use shared::models::{Post, PostId};
use shared::sync::{PostSurface, ScrollGeometry};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, console};

fn report(action: &str, err: &wasm_bindgen::JsValue) {
    console::error_1(&format!("post surface: {action} failed: {err:?}").into());
}

pub struct DomSurface {
    container: Element,
    document: Document,
    rows: HashMap<PostId, Element>,
}

impl DomSurface {
    /// Wraps `container`, which must be the scrolling element. Returns `None`
    /// for detached elements.
    ///
    /// Turns off the browser's scroll anchoring on the container; prepends
    /// restore the position themselves.
    pub fn new(container: Element) -> Option<Self> {
        let document = container.owner_document()?;
        if let Some(html) = container.dyn_ref::<HtmlElement>()
            && let Err(err) = html.style().set_property("overflow-anchor", "none")
        {
            report("disable scroll anchoring", &err);
        }
        Some(Self {
            container,
            document,
            rows: HashMap::new(),
        })
    }

    /// Flags the row of a local post the server refused.
    pub fn mark_failed(&mut self, post_id: &PostId) {
        if let Some(row) = self.rows.get(post_id) {
            row.set_class_name(&format!("{} failed", row.class_name()));
        }
    }

    fn render_row(&mut self, post: &Post) -> Option<Element> {
        let row = match self.document.create_element("div") {
            Ok(row) => row,
            Err(err) => {
                report("create row", &err);
                return None;
            }
        };
        row.set_class_name(&row_class(post));

        let author = self.document.create_element("span").ok()?;
        author.set_class_name("post-author");
        author.set_text_content(post.nickname());
        let body = self.document.create_element("span").ok()?;
        body.set_class_name("post-body");
        body.set_text_content(Some(post.body()));

        for child in [&author, &body] {
            if let Err(err) = row.append_child(child) {
                report("build row", &err);
            }
        }
        self.rows.insert(post.post_id().clone(), row.clone());
        Some(row)
    }
}

/// CSS classes of a post row; pending posts are styled until sequenced.
pub fn row_class(post: &Post) -> String {
    let mut class = format!("post post-{}", post.archive_type());
    if post.is_pending() {
        class.push_str(" pending");
    }
    class
}

impl PostSurface for DomSurface {
    fn geometry(&self) -> ScrollGeometry {
        ScrollGeometry::new(
            self.container.scroll_top(),
            self.container.scroll_height(),
            self.container.client_height(),
        )
    }

    fn set_offset(&mut self, offset: i32) {
        self.container.set_scroll_top(offset);
    }

    fn append(&mut self, post: &Post) {
        if let Some(row) = self.render_row(post)
            && let Err(err) = self.container.append_child(&row)
        {
            report("append", &err);
        }
    }

    fn prepend(&mut self, post: &Post) {
        let first = self.container.first_child();
        if let Some(row) = self.render_row(post)
            && let Err(err) = self.container.insert_before(&row, first.as_ref())
        {
            report("prepend", &err);
        }
    }

    fn refresh(&mut self, post: &Post) {
        if let Some(row) = self.rows.get(post.post_id()) {
            row.set_class_name(&row_class(post));
        }
    }

    fn clear(&mut self) {
        self.container.set_inner_html("");
        self.rows.clear();
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use shared::models::{ArchiveType, SequenceId, ShardId};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn post(id: &str, sequence: Option<u64>) -> Post {
        let post = Post::new(
            ShardId::from("lobby"),
            PostId::new(id).unwrap(),
            ArchiveType::Chat,
        )
        .with_nickname("ada")
        .with_body(format!("body {id}"));
        match sequence.and_then(SequenceId::new) {
            Some(sequence) => post.with_sequence(sequence),
            None => post,
        }
    }

    fn container() -> Element {
        let document = web_sys::window().unwrap().document().unwrap();
        let element = document.create_element("div").unwrap();
        let html: &HtmlElement = element.unchecked_ref();
        html.style().set_property("height", "100px").unwrap();
        html.style().set_property("overflow-y", "scroll").unwrap();
        document.body().unwrap().append_child(&element).unwrap();
        element
    }

    #[wasm_bindgen_test]
    fn rows_land_on_the_right_side() {
        let element = container();
        let mut surface = DomSurface::new(element.clone()).unwrap();

        surface.append(&post("b", Some(2)));
        surface.prepend(&post("a", Some(1)));
        surface.append(&post("c", None));

        let children = element.children();
        assert_eq!(children.length(), 3);
        assert!(children.item(0).unwrap().text_content().unwrap().contains("body a"));
        assert!(children.item(2).unwrap().class_name().contains("pending"));
    }

    #[wasm_bindgen_test]
    fn container_opts_out_of_scroll_anchoring() {
        let element = container();
        let _surface = DomSurface::new(element.clone()).unwrap();

        let html: &HtmlElement = element.unchecked_ref();
        assert_eq!(
            html.style().get_property_value("overflow-anchor").unwrap(),
            "none"
        );
    }

    #[wasm_bindgen_test]
    fn refresh_clears_pending_marker() {
        let element = container();
        let mut surface = DomSurface::new(element.clone()).unwrap();

        surface.append(&post("mine", None));
        surface.refresh(&post("mine", Some(5)));

        let row = element.first_element_child().unwrap();
        assert!(!row.class_name().contains("pending"));

        surface.clear();
        assert_eq!(element.child_element_count(), 0);
    }

    #[wasm_bindgen_test]
    fn rejected_post_row_is_flagged() {
        let element = container();
        let mut surface = DomSurface::new(element.clone()).unwrap();

        surface.append(&post("mine", None));
        surface.mark_failed(&PostId::new("mine").unwrap());

        let row = element.first_element_child().unwrap();
        assert_eq!(row.class_name(), "post post-chat pending failed");
    }
}
