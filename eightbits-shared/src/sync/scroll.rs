//! # Scroll coordination
//!
//! Pure functions over a scroll container's geometry. Nothing here keeps
//! state: callers sample [`ScrollGeometry`] before and after a mutation and
//! ask what the new offset should be.

use crate::models::Post;

/// Scroll offset, total content extent and visible extent of a scroll
/// container, in pixels (`scrollTop`, `scrollHeight`, `clientHeight`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollGeometry {
    pub offset: i32,
    pub content_extent: i32,
    pub viewport_extent: i32,
}

impl ScrollGeometry {
    #[must_use]
    pub const fn new(offset: i32, content_extent: i32, viewport_extent: i32) -> Self {
        Self {
            offset,
            content_extent,
            viewport_extent,
        }
    }

    /// Largest offset the container can scroll to.
    #[must_use]
    pub fn max_offset(&self) -> i32 {
        (self.content_extent - self.viewport_extent).max(0)
    }

    /// Whether the viewport shows the last pixel of content, give or take
    /// `tolerance`.
    #[must_use]
    pub fn is_at_bottom(&self, tolerance: i32) -> bool {
        self.offset >= self.max_offset() - tolerance.max(0)
    }

    #[must_use]
    pub fn is_at_top(&self) -> bool {
        self.offset <= 0
    }

    /// Whether there is more content than fits in the viewport.
    #[must_use]
    pub fn overflows(&self) -> bool {
        self.content_extent > self.viewport_extent
    }
}

/// Offset to apply after an append. `Some` only when the viewport was pinned
/// to the bottom before the append; a reader scrolled up is left alone.
#[must_use]
pub fn follow_bottom(before: ScrollGeometry, after: ScrollGeometry, tolerance: i32) -> Option<i32> {
    before.is_at_bottom(tolerance).then(|| after.max_offset())
}

/// Offset that keeps the same content in view after something was inserted
/// above it. Measured from the offset before the insertion, so a container
/// that already shifted on its own is not moved twice.
#[must_use]
pub fn preserve_position(before: ScrollGeometry, after: ScrollGeometry) -> i32 {
    before.offset + (after.content_extent - before.content_extent)
}

/// Whether the reader reached the top of a scrollable history and older
/// posts should be fetched.
#[must_use]
pub fn should_backfill(geometry: ScrollGeometry) -> bool {
    geometry.is_at_top() && geometry.overflows()
}

/// Where a shard's posts are rendered.
///
/// The merge engine mutates the surface and samples its geometry around each
/// mutation. Implementations render synchronously so the geometry read right
/// after `append`/`prepend` already includes the new row.
pub trait PostSurface {
    fn geometry(&self) -> ScrollGeometry;

    fn set_offset(&mut self, offset: i32);

    /// Renders `post` below every post already shown.
    fn append(&mut self, post: &Post);

    /// Renders `post` above every post already shown.
    fn prepend(&mut self, post: &Post);

    /// `post` changed in place (it received its sequence id).
    fn refresh(&mut self, _post: &Post) {}

    /// Removes every rendered post.
    fn clear(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_detection() {
        assert!(ScrollGeometry::new(400, 500, 100).is_at_bottom(0));
        assert!(!ScrollGeometry::new(398, 500, 100).is_at_bottom(0));
        assert!(ScrollGeometry::new(398, 500, 100).is_at_bottom(2));
        // Nothing to scroll: always at the bottom.
        assert!(ScrollGeometry::new(0, 80, 100).is_at_bottom(0));
    }

    #[test]
    fn follows_when_pinned_to_bottom() {
        let before = ScrollGeometry::new(400, 500, 100);
        let after = ScrollGeometry::new(400, 520, 100);
        assert_eq!(follow_bottom(before, after, 0), Some(420));
    }

    #[test]
    fn stays_put_when_reading_history() {
        let before = ScrollGeometry::new(200, 500, 100);
        let after = ScrollGeometry::new(200, 520, 100);
        assert_eq!(follow_bottom(before, after, 0), None);
    }

    #[test]
    fn prepend_advances_by_growth() {
        let before = ScrollGeometry::new(0, 500, 100);
        let after = ScrollGeometry::new(0, 560, 100);
        assert_eq!(preserve_position(before, after), 60);

        let before = ScrollGeometry::new(120, 500, 100);
        let after = ScrollGeometry::new(120, 530, 100);
        assert_eq!(preserve_position(before, after), 150);
    }

    #[test]
    fn prepend_ignores_offset_moved_by_the_container() {
        // The container anchored its content and already scrolled by 30.
        let before = ScrollGeometry::new(120, 500, 100);
        let after = ScrollGeometry::new(150, 530, 100);
        assert_eq!(preserve_position(before, after), 150);
    }

    #[test]
    fn backfill_needs_top_and_overflow() {
        assert!(should_backfill(ScrollGeometry::new(0, 500, 100)));
        assert!(!should_backfill(ScrollGeometry::new(10, 500, 100)));
        assert!(!should_backfill(ScrollGeometry::new(0, 100, 100)));
    }
}
