#![forbid(unsafe_code)]

//! A centered help card shown as a modal overlay.

use tableau::{Bounds, LayoutBounds, Layoutable, Overlay, OverlayId};

const CARD_WIDTH: f64 = 420.0;
const CARD_HEIGHT: f64 = 260.0;

#[derive(Debug)]
pub struct HelpOverlay {
    id: OverlayId,
    /// Card rectangle in window pixels, set on layout.
    pub card: Option<Bounds>,
}

impl HelpOverlay {
    pub fn new(id: OverlayId) -> Self {
        Self { id, card: None }
    }
}

impl Layoutable for HelpOverlay {
    fn layout(&mut self, bounds: &LayoutBounds) {
        let (cx, cy) = bounds.full.center();
        let w = (CARD_WIDTH * bounds.scale).min(bounds.full.width());
        let h = (CARD_HEIGHT * bounds.scale).min(bounds.full.height());
        self.card = Some(Bounds::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0));
    }
}

impl Overlay for HelpOverlay {
    fn id(&self) -> OverlayId {
        self.id
    }
}
