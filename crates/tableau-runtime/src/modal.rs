#![forbid(unsafe_code)]

//! Overlay stack with modal input suspension.
//!
//! Overlays (dialogs, popups, menus) are shown on top of the current
//! screen. A *modal* overlay interrupts all in-flight input when shown and
//! raises the barrier, which makes every screen non-interactive until the
//! last modal is hidden.
//!
//! The barrier is a derived [`ReadOnlyProperty`]: it is `true` exactly when
//! at least one modal overlay is shown, and nothing outside this module can
//! set it.

use std::fmt;

use tableau_core::observable::{Property, ReadOnlyProperty};

use crate::error::ModalError;
use crate::host::{InputTarget, OverlayId, SharedScene};
use crate::layout::LayoutBounds;
use crate::screen::{Layoutable, ScreenKey};

/// Something that can be shown on the overlay layer.
pub trait Overlay: Layoutable {
    fn id(&self) -> OverlayId;

    /// Whether [`Layoutable::layout`] should be called on resize and when
    /// shown.
    fn supports_layout(&self) -> bool {
        true
    }
}

struct Shown {
    overlay: Box<dyn Overlay>,
    is_modal: bool,
}

/// Tracks shown overlays in the order they were shown.
pub struct ModalStack {
    shown: Vec<Shown>,
    barrier: Property<bool>,
}

impl fmt::Debug for ModalStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalStack")
            .field("shown", &self.shown_ids())
            .field("barrier", &self.barrier.get())
            .finish()
    }
}

impl Default for ModalStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ModalStack {
    pub fn new() -> Self {
        Self {
            shown: Vec::new(),
            barrier: Property::new(false),
        }
    }

    /// `true` while any modal overlay is shown.
    pub fn barrier(&self) -> ReadOnlyProperty<bool> {
        self.barrier.read_only()
    }

    pub fn is_shown(&self, id: OverlayId) -> bool {
        self.shown.iter().any(|s| s.overlay.id() == id)
    }

    /// Ids of every shown overlay, bottom to top.
    pub fn shown_ids(&self) -> Vec<OverlayId> {
        self.shown.iter().map(|s| s.overlay.id()).collect()
    }

    /// Ids of shown modal overlays, bottom to top.
    pub fn modal_ids(&self) -> Vec<OverlayId> {
        self.shown
            .iter()
            .filter(|s| s.is_modal)
            .map(|s| s.overlay.id())
            .collect()
    }

    /// Topmost modal overlay.
    pub fn top_modal(&self) -> Option<OverlayId> {
        self.shown
            .iter()
            .rev()
            .find(|s| s.is_modal)
            .map(|s| s.overlay.id())
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }

    /// Show an overlay.
    ///
    /// Modal overlays first interrupt all input under the scene root, then
    /// raise the barrier. The overlay is then laid out against `bounds`
    /// (when it supports layout and a layout has happened) and finally added
    /// to the scene.
    pub fn show(
        &mut self,
        overlay: Box<dyn Overlay>,
        is_modal: bool,
        scene: &SharedScene,
        bounds: Option<&LayoutBounds>,
    ) -> Result<(), ModalError> {
        let id = overlay.id();
        if self.is_shown(id) {
            tracing::error!(overlay = %id, "overlay shown twice");
            return Err(ModalError::AlreadyShown(id));
        }
        if is_modal {
            scene.borrow_mut().interrupt_input(InputTarget::Root);
        }
        let layout_aware = overlay.supports_layout();
        self.shown.push(Shown { overlay, is_modal });
        if is_modal {
            self.barrier.set(true);
        }
        if let (Some(bounds), true, Some(top)) = (bounds, layout_aware, self.shown.last_mut()) {
            top.overlay.layout(bounds);
        }
        scene.borrow_mut().add_overlay(id);
        tracing::debug!(overlay = %id, is_modal, depth = self.shown.len(), "overlay shown");
        Ok(())
    }

    /// Hide a shown overlay and hand it back.
    ///
    /// `is_modal` must match the value the overlay was shown with. The
    /// barrier drops only when no modal overlay remains.
    pub fn hide(
        &mut self,
        id: OverlayId,
        is_modal: bool,
        scene: &SharedScene,
    ) -> Result<Box<dyn Overlay>, ModalError> {
        let Some(position) = self.shown.iter().position(|s| s.overlay.id() == id) else {
            tracing::error!(overlay = %id, "hiding an overlay that is not shown");
            return Err(ModalError::NotShown(id));
        };
        let shown_modal = self.shown[position].is_modal;
        if shown_modal != is_modal {
            tracing::error!(overlay = %id, shown_modal, is_modal, "overlay modality mismatch");
            return Err(ModalError::ModalityMismatch {
                id,
                shown_modal,
                hidden_modal: is_modal,
            });
        }
        let removed = self.shown.remove(position);
        if is_modal {
            let any_modal = self.shown.iter().any(|s| s.is_modal);
            self.barrier.set(any_modal);
        }
        scene.borrow_mut().remove_overlay(id);
        tracing::debug!(overlay = %id, depth = self.shown.len(), "overlay hidden");
        Ok(removed.overlay)
    }

    /// Where input goes next: the topmost modal, else the current screen.
    pub fn input_target(&self, current: ScreenKey) -> InputTarget {
        match self.top_modal() {
            Some(id) => InputTarget::Overlay(id),
            None => InputTarget::Screen(current),
        }
    }

    pub(crate) fn layout_overlays(&mut self, bounds: &LayoutBounds) {
        for shown in &mut self.shown {
            if shown.overlay.supports_layout() {
                shown.overlay.layout(bounds);
            }
        }
    }
}
