use std::collections::VecDeque;
use std::fmt;

use super::scroll::{PostSurface, ScrollGeometry};
use crate::models::Post;

type RowHeight = Box<dyn Fn(&Post) -> i32>;

struct Row {
    post_id: String,
    height: i32,
}

/// In-memory [`PostSurface`] that lays rows out top to bottom and tracks a
/// scroll offset clamped the way a browser clamps `scrollTop`.
///
/// Used by the command line replay and by tests.
pub struct SimulatedSurface {
    rows: VecDeque<Row>,
    row_height: RowHeight,
    viewport_extent: i32,
    offset: i32,
    refreshed: usize,
    anchored: bool,
}

impl SimulatedSurface {
    /// Surface whose rows are all `row_height` pixels tall.
    #[must_use]
    pub fn new(viewport_extent: i32, row_height: i32) -> Self {
        Self::with_heights(viewport_extent, move |_| row_height)
    }

    /// Surface that asks `row_height` how tall each post renders.
    #[must_use]
    pub fn with_heights(viewport_extent: i32, row_height: impl Fn(&Post) -> i32 + 'static) -> Self {
        Self {
            rows: VecDeque::new(),
            row_height: Box::new(row_height),
            viewport_extent: viewport_extent.max(0),
            offset: 0,
            refreshed: 0,
            anchored: false,
        }
    }

    /// Shifts the offset by each prepended row's height while scrolled away
    /// from the top, like a browser with CSS scroll anchoring enabled.
    #[must_use]
    pub fn with_scroll_anchoring(mut self) -> Self {
        self.anchored = true;
        self
    }

    fn content_extent(&self) -> i32 {
        self.rows.iter().map(|row| row.height).sum()
    }

    fn height_of(&self, post: &Post) -> i32 {
        (self.row_height)(post).max(0)
    }

    /// Rendered post ids, top to bottom.
    #[must_use]
    pub fn rendered_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.post_id.as_str()).collect()
    }

    /// Id of the row under the top edge of the viewport.
    #[must_use]
    pub fn first_visible(&self) -> Option<&str> {
        let mut top = 0;
        for row in &self.rows {
            if top + row.height > self.offset {
                return Some(&row.post_id);
            }
            top += row.height;
        }
        None
    }

    /// How many in-place refreshes were requested.
    #[must_use]
    pub fn refreshed(&self) -> usize {
        self.refreshed
    }
}

impl fmt::Debug for SimulatedSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedSurface")
            .field("rows", &self.rows.len())
            .field("geometry", &self.geometry())
            .finish_non_exhaustive()
    }
}

impl PostSurface for SimulatedSurface {
    fn geometry(&self) -> ScrollGeometry {
        ScrollGeometry::new(self.offset, self.content_extent(), self.viewport_extent)
    }

    fn set_offset(&mut self, offset: i32) {
        self.offset = offset.clamp(0, self.geometry().max_offset());
    }

    fn append(&mut self, post: &Post) {
        let height = self.height_of(post);
        self.rows.push_back(Row {
            post_id: post.post_id().to_string(),
            height,
        });
    }

    fn prepend(&mut self, post: &Post) {
        let height = self.height_of(post);
        self.rows.push_front(Row {
            post_id: post.post_id().to_string(),
            height,
        });
        if self.anchored && self.offset > 0 {
            self.set_offset(self.offset + height);
        }
    }

    fn refresh(&mut self, _post: &Post) {
        self.refreshed += 1;
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchiveType, PostId, ShardId};

    fn post(id: &str) -> Post {
        Post::new(
            ShardId::from("lobby"),
            PostId::new(id).unwrap(),
            ArchiveType::Chat,
        )
    }

    #[test]
    fn offset_is_clamped_to_content() {
        let mut surface = SimulatedSurface::new(100, 30);
        surface.set_offset(50);
        assert_eq!(surface.geometry().offset, 0);

        for i in 0..10 {
            surface.append(&post(&format!("p{i}")));
        }
        surface.set_offset(1_000);
        assert_eq!(surface.geometry(), ScrollGeometry::new(200, 300, 100));
        surface.set_offset(-5);
        assert_eq!(surface.geometry().offset, 0);
    }

    #[test]
    fn rows_keep_insertion_sides() {
        let mut surface = SimulatedSurface::new(100, 30);
        surface.append(&post("b"));
        surface.prepend(&post("a"));
        surface.append(&post("c"));
        assert_eq!(surface.rendered_ids(), ["a", "b", "c"]);
        assert_eq!(surface.first_visible(), Some("a"));

        surface.clear();
        assert!(surface.rendered_ids().is_empty());
        assert_eq!(surface.first_visible(), None);
    }

    #[test]
    fn anchoring_shifts_offset_on_prepend() {
        let mut surface = SimulatedSurface::new(100, 30).with_scroll_anchoring();
        surface.prepend(&post("c"));
        assert_eq!(surface.geometry().offset, 0);

        for i in 0..10 {
            surface.append(&post(&format!("p{i}")));
        }
        surface.set_offset(60);
        surface.prepend(&post("b"));
        assert_eq!(surface.geometry().offset, 90);
        assert_eq!(surface.first_visible(), Some("p1"));
    }
}
