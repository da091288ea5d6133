#![forbid(unsafe_code)]

//! Resize handling and viewport geometry.
//!
//! [`LayoutCoordinator::resize`] turns raw window dimensions into a uniform
//! scale and the bounds handed to the navigation bar, screens and overlays.
//!
//! # Layout pass order
//!
//! 1. Scale and navigation bar height are finalized.
//! 2. [`LayoutSink::layout_navigation_bar`]
//! 3. [`LayoutSink::layout_screens`]
//! 4. [`LayoutSink::layout_overlays`]
//! 5. The [`geometry`](LayoutCoordinator::geometry) property is published.
//!
//! Listeners on the geometry property therefore always observe a fully
//! laid-out scene. A pass holds `&mut` on the coordinator from step 1 to
//! step 5, so a second pass cannot start inside the first.

use tableau_core::geometry::{Bounds, Size};
use tableau_core::observable::{Property, ReadOnlyProperty};

/// Bounds handed to screen views and layout-aware overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBounds {
    /// Uniform scale relative to the reference size.
    pub scale: f64,
    /// The whole window.
    pub full: Bounds,
    /// The window minus the navigation bar and toolbar.
    pub content: Bounds,
}

/// Placement of the navigation bar along the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationBarLayout {
    pub scale: f64,
    pub bounds: Bounds,
}

/// Result of the last applied resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    pub window: Size,
    pub scale: f64,
    pub nav_bar_height: f64,
    pub full: Bounds,
    pub content: Bounds,
}

impl ViewportGeometry {
    /// Compute geometry for a window. `window` must be positive.
    pub fn compute(window: Size, reference: Size, nav_bar_base: f64, toolbar_width: f64) -> Self {
        let scale = (window.width / reference.width).min(window.height / reference.height);
        let nav_bar_height = scale * nav_bar_base;
        let full = Bounds::from_size(window);
        let content = Bounds::new(
            toolbar_width,
            0.0,
            window.width,
            window.height - nav_bar_height,
        );
        Self {
            window,
            scale,
            nav_bar_height,
            full,
            content,
        }
    }

    pub fn layout_bounds(&self) -> LayoutBounds {
        LayoutBounds {
            scale: self.scale,
            full: self.full,
            content: self.content,
        }
    }

    pub fn navigation_bar(&self) -> NavigationBarLayout {
        NavigationBarLayout {
            scale: self.scale,
            bounds: Bounds::new(
                0.0,
                self.window.height - self.nav_bar_height,
                self.window.width,
                self.window.height,
            ),
        }
    }
}

/// What a call to [`LayoutCoordinator::resize`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeOutcome {
    /// Zero, negative or non-finite dimensions.
    Ignored,
    /// Same dimensions as last time and nothing marked dirty.
    Unchanged,
    /// A full layout pass ran.
    Applied(ViewportGeometry),
}

impl ResizeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Receives the layout pass.
pub trait LayoutSink {
    fn layout_navigation_bar(&mut self, layout: &NavigationBarLayout);
    fn layout_screens(&mut self, bounds: &LayoutBounds);
    fn layout_overlays(&mut self, bounds: &LayoutBounds);
}

/// Converts window resizes into layout passes.
#[derive(Debug)]
pub struct LayoutCoordinator {
    reference: Size,
    nav_bar_base: f64,
    toolbar_width: Property<f64>,
    geometry: Property<Option<ViewportGeometry>>,
    last_size: Option<Size>,
    dirty: bool,
}

impl LayoutCoordinator {
    pub fn new(reference: Size, nav_bar_base: f64) -> Self {
        Self {
            reference,
            nav_bar_base,
            toolbar_width: Property::new(0.0),
            geometry: Property::new(None),
            last_size: None,
            dirty: false,
        }
    }

    /// Published after every applied resize. `None` until the first one.
    pub fn geometry(&self) -> ReadOnlyProperty<Option<ViewportGeometry>> {
        self.geometry.read_only()
    }

    pub fn current(&self) -> Option<ViewportGeometry> {
        self.geometry.get()
    }

    pub fn current_bounds(&self) -> Option<LayoutBounds> {
        self.geometry.with(|g| g.as_ref().map(ViewportGeometry::layout_bounds))
    }

    /// Window size of the last applied resize.
    pub fn last_size(&self) -> Option<Size> {
        self.last_size
    }

    pub fn toolbar_width(&self) -> ReadOnlyProperty<f64> {
        self.toolbar_width.read_only()
    }

    /// Change the left inset of the content bounds. The next resize runs a
    /// full pass even at unchanged dimensions.
    pub fn set_toolbar_width(&mut self, width: f64) {
        if self.toolbar_width.set(width) {
            self.dirty = true;
        }
    }

    /// Force the next resize to run a full pass.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn resize(&mut self, size: Size, sink: &mut dyn LayoutSink) -> ResizeOutcome {
        let _span = tracing::debug_span!("resize", width = size.width, height = size.height).entered();
        if !size.is_positive() {
            tracing::debug!("ignoring resize to non-positive window size");
            return ResizeOutcome::Ignored;
        }
        if self.last_size == Some(size) && !self.dirty {
            tracing::trace!("window size unchanged");
            return ResizeOutcome::Unchanged;
        }

        let geometry = ViewportGeometry::compute(
            size,
            self.reference,
            self.nav_bar_base,
            self.toolbar_width.get(),
        );
        self.last_size = Some(size);
        self.dirty = false;

        let bounds = geometry.layout_bounds();
        sink.layout_navigation_bar(&geometry.navigation_bar());
        sink.layout_screens(&bounds);
        sink.layout_overlays(&bounds);
        self.geometry.set(Some(geometry));

        tracing::debug!(scale = geometry.scale, "layout applied");
        ResizeOutcome::Applied(geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
    }

    impl LayoutSink for Log {
        fn layout_navigation_bar(&mut self, layout: &NavigationBarLayout) {
            self.calls.push(format!("nav {}", layout.bounds.min_y));
        }
        fn layout_screens(&mut self, bounds: &LayoutBounds) {
            self.calls.push(format!("screens {}", bounds.scale));
        }
        fn layout_overlays(&mut self, _bounds: &LayoutBounds) {
            self.calls.push("overlays".into());
        }
    }

    fn coordinator() -> LayoutCoordinator {
        LayoutCoordinator::new(Size::new(1024.0, 618.0), 40.0)
    }

    #[test]
    fn scale_is_limited_by_the_tighter_axis() {
        let g = ViewportGeometry::compute(Size::new(2048.0, 618.0), Size::new(1024.0, 618.0), 40.0, 0.0);
        assert_eq!(g.scale, 1.0);
        let g = ViewportGeometry::compute(Size::new(512.0, 618.0), Size::new(1024.0, 618.0), 40.0, 0.0);
        assert_eq!(g.scale, 0.5);
        assert_eq!(g.nav_bar_height, 20.0);
        assert_eq!(g.content, Bounds::new(0.0, 0.0, 512.0, 598.0));
    }

    #[test]
    fn toolbar_insets_content() {
        let g = ViewportGeometry::compute(Size::new(1024.0, 618.0), Size::new(1024.0, 618.0), 40.0, 50.0);
        assert_eq!(g.content, Bounds::new(50.0, 0.0, 1024.0, 578.0));
        assert_eq!(g.navigation_bar().bounds, Bounds::new(0.0, 578.0, 1024.0, 618.0));
    }

    #[test]
    fn pass_runs_in_order_and_publishes_last() {
        let mut layout = coordinator();
        let seen = Rc::new(RefCell::new(None));
        let seen_in = Rc::clone(&seen);
        let _sub = layout.geometry().subscribe(move |g, _| *seen_in.borrow_mut() = *g);

        let mut log = Log::default();
        let outcome = layout.resize(Size::new(1024.0, 618.0), &mut log);
        assert!(outcome.is_applied());
        assert_eq!(log.calls, vec!["nav 578", "screens 1", "overlays"]);
        assert_eq!(seen.borrow().map(|g| g.scale), Some(1.0));
    }

    #[test]
    fn repeated_size_is_unchanged() {
        let mut layout = coordinator();
        let mut log = Log::default();
        layout.resize(Size::new(800.0, 600.0), &mut log);
        log.calls.clear();
        assert_eq!(layout.resize(Size::new(800.0, 600.0), &mut log), ResizeOutcome::Unchanged);
        assert!(log.calls.is_empty());
    }

    #[test]
    fn dirty_forces_a_pass_at_same_size() {
        let mut layout = coordinator();
        let mut log = Log::default();
        layout.resize(Size::new(800.0, 600.0), &mut log);
        layout.mark_dirty();
        assert!(layout.resize(Size::new(800.0, 600.0), &mut log).is_applied());
        assert!(!layout.is_dirty());
    }

    #[test]
    fn toolbar_change_marks_dirty_only_when_changed() {
        let mut layout = coordinator();
        layout.set_toolbar_width(0.0);
        assert!(!layout.is_dirty());
        layout.set_toolbar_width(64.0);
        assert!(layout.is_dirty());
    }

    #[test]
    fn degenerate_sizes_are_ignored() {
        let mut layout = coordinator();
        let mut log = Log::default();
        for size in [
            Size::new(0.0, 600.0),
            Size::new(800.0, 0.0),
            Size::new(-1.0, 600.0),
            Size::new(f64::NAN, 600.0),
        ] {
            assert_eq!(layout.resize(size, &mut log), ResizeOutcome::Ignored);
        }
        assert!(log.calls.is_empty());
        assert_eq!(layout.current(), None);
        assert_eq!(layout.last_size(), None);
    }
}
