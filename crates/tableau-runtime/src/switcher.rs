#![forbid(unsafe_code)]

//! Which single screen is visible and active.
//!
//! # Switch sequence
//!
//! Switching from `A` to `B` (`A != B`) performs, in order:
//!
//! 1. interrupt input under `A`
//! 2. hide `A`
//! 3. deactivate `A` (content screens only)
//! 4. instantiate `B` if it has not been built yet
//! 5. activate `B` (content screens only, still invisible)
//! 6. set the background to `B`'s color
//! 7. show `B`
//! 8. reset the camera
//! 9. publish `B` as the current key
//!
//! The caller then requests a relayout. Switching to the current screen does
//! nothing at all.

use tableau_core::observable::{Property, ReadOnlyProperty};

use crate::camera::Camera;
use crate::error::{SimError, SimResult};
use crate::host::{InputTarget, SharedScene};
use crate::screen::{ScreenKey, ScreenSet};
use crate::selection::ScreenSelection;

#[derive(Debug)]
pub struct ScreenSwitchController {
    current: Property<ScreenKey>,
    keys: Vec<ScreenKey>,
}

impl ScreenSwitchController {
    pub fn new(selection: &ScreenSelection) -> Self {
        Self {
            current: Property::new(selection.initial()),
            keys: selection.keys().to_vec(),
        }
    }

    pub fn current(&self) -> ScreenKey {
        self.current.get()
    }

    pub fn current_property(&self) -> ReadOnlyProperty<ScreenKey> {
        self.current.read_only()
    }

    fn check(&self, key: ScreenKey) -> SimResult<()> {
        if self.keys.contains(&key) {
            Ok(())
        } else {
            tracing::error!(screen = %key, "switch to a screen outside the selection");
            Err(SimError::UnknownScreen(key))
        }
    }

    /// Put the scene in the state for the initial screen: every other screen
    /// hidden, the initial one built, active and shown.
    pub fn initialize(&self, screens: &mut ScreenSet, scene: &SharedScene) -> SimResult<()> {
        let initial = self.current();
        self.check(initial)?;
        for &key in &self.keys {
            if key != initial {
                scene.borrow_mut().set_screen_visible(key, false);
            }
        }
        screens.instantiate(initial)?;
        screens.set_active(initial, true)?;
        if let Some(color) = screens.background(initial) {
            scene.borrow_mut().set_background(color);
        }
        scene.borrow_mut().set_screen_visible(initial, true);
        tracing::info!(screen = %initial, "initial screen shown");
        Ok(())
    }

    /// Run the switch sequence. Returns `false` for a self-switch.
    pub fn switch_to(
        &mut self,
        key: ScreenKey,
        screens: &mut ScreenSet,
        scene: &SharedScene,
        camera: &mut Camera,
    ) -> SimResult<bool> {
        self.check(key)?;
        let outgoing = self.current();
        if outgoing == key {
            tracing::trace!(screen = %key, "already current");
            return Ok(false);
        }

        scene
            .borrow_mut()
            .interrupt_input(InputTarget::Screen(outgoing));
        scene.borrow_mut().set_screen_visible(outgoing, false);
        screens.set_active(outgoing, false)?;

        screens.instantiate(key)?;
        screens.set_active(key, true)?;
        if let Some(color) = screens.background(key) {
            scene.borrow_mut().set_background(color);
        }
        scene.borrow_mut().set_screen_visible(key, true);

        camera.reset();
        self.current.set(key);
        tracing::info!(from = %outgoing, to = %key, "screen switched");
        Ok(true)
    }
}
