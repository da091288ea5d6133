#![forbid(unsafe_code)]

//! Screens and their capability traits.
//!
//! A [`Screen`] bundles a name, a background color and the two factories
//! that build its model and view. Factories are invoked at most once, the
//! first time the screen is instantiated; the resulting
//! [`ScreenInstance`] lives as long as the [`Sim`](crate::sim::Sim).
//!
//! Models and views opt into per-frame work through [`Steppable`] and into
//! layout through [`Layoutable`]; both default to no-ops.
//!
//! # Example
//!
//! ```
//! use tableau_runtime::screen::{Layoutable, Screen, ScreenModel, Steppable};
//! use tableau_runtime::error::BoxError;
//! use tableau_core::geometry::Color;
//!
//! #[derive(Default)]
//! struct Counter { ticks: u64 }
//!
//! impl Steppable for Counter {
//!     fn step(&mut self, _dt: f64) -> Result<(), BoxError> {
//!         self.ticks += 1;
//!         Ok(())
//!     }
//! }
//! impl ScreenModel for Counter {}
//!
//! struct CounterView;
//! impl Steppable for CounterView {}
//! impl Layoutable for CounterView {}
//!
//! let screen = Screen::new("Counter", Counter::default, |_model| CounterView)
//!     .with_background(Color::rgb(20, 20, 40))
//!     .with_max_dt(0.1);
//! assert_eq!(screen.name(), "Counter");
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tableau_core::geometry::Color;
use tableau_core::observable::{Property, ReadOnlyProperty};

use crate::error::{BoxError, SimError, SimResult, StepPhase};
use crate::layout::LayoutBounds;

/// Per-frame work, called with the clamped, speed-adjusted `dt` in seconds.
pub trait Steppable {
    fn step(&mut self, dt: f64) -> Result<(), BoxError> {
        let _ = dt;
        Ok(())
    }
}

/// Reaction to a new viewport.
pub trait Layoutable {
    fn layout(&mut self, bounds: &LayoutBounds) {
        let _ = bounds;
    }
}

/// State half of a screen.
pub trait ScreenModel: Steppable {
    /// Value folded into [`Sim::state_digest`](crate::sim::Sim::state_digest).
    ///
    /// Models whose state should be checked by replay return a hash of it.
    fn fingerprint(&self) -> u64 {
        0
    }
}

/// Presentation half of a screen.
pub trait ScreenView: Steppable + Layoutable {}

impl<T: Steppable + Layoutable> ScreenView for T {}

/// Identifies a runtime-visible screen.
///
/// `Content(i)` is the zero-based position in the *filtered* screen list,
/// not the declared number used by launch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenKey {
    Home,
    Content(usize),
}

impl ScreenKey {
    #[inline]
    pub fn is_home(self) -> bool {
        matches!(self, Self::Home)
    }
}

impl fmt::Display for ScreenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("home"),
            Self::Content(index) => write!(f, "content[{index}]"),
        }
    }
}

/// A model and view pair built from a [`Screen`]'s factories.
pub struct ScreenInstance {
    pub model: Rc<RefCell<dyn ScreenModel>>,
    pub view: Box<dyn ScreenView>,
}

type InstanceFactory = Box<dyn FnOnce() -> ScreenInstance>;

/// Public description of a declared screen, handed to the home screen
/// factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenInfo {
    pub name: String,
    pub background: Color,
    /// 1-based declared number.
    pub number: usize,
}

/// A declared screen.
pub struct Screen {
    name: String,
    background: Color,
    max_dt: Option<f64>,
    factory: Option<InstanceFactory>,
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("name", &self.name)
            .field("background", &self.background)
            .field("max_dt", &self.max_dt)
            .field("instantiated", &self.factory.is_none())
            .finish()
    }
}

impl Screen {
    /// Declare a screen. `create_view` receives the freshly built model.
    pub fn new<M, V>(
        name: impl Into<String>,
        create_model: impl FnOnce() -> M + 'static,
        create_view: impl FnOnce(&Rc<RefCell<M>>) -> V + 'static,
    ) -> Self
    where
        M: ScreenModel + 'static,
        V: ScreenView + 'static,
    {
        let factory: InstanceFactory = Box::new(move || {
            let model = Rc::new(RefCell::new(create_model()));
            let view = create_view(&model);
            ScreenInstance {
                model,
                view: Box::new(view),
            }
        });
        Self {
            name: name.into(),
            background: Color::WHITE,
            max_dt: None,
            factory: Some(factory),
        }
    }

    #[must_use]
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    /// Cap the `dt` passed to this screen's model and view.
    #[must_use]
    pub fn with_max_dt(mut self, max_dt: f64) -> Self {
        self.max_dt = Some(max_dt);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn max_dt(&self) -> Option<f64> {
        self.max_dt
    }

    /// Description with the given declared number.
    pub fn info(&self, number: usize) -> ScreenInfo {
        ScreenInfo {
            name: self.name.clone(),
            background: self.background,
            number,
        }
    }
}

struct ScreenSlot {
    screen: Screen,
    instance: Option<ScreenInstance>,
    active: Property<bool>,
}

impl ScreenSlot {
    fn new(screen: Screen) -> Self {
        Self {
            screen,
            instance: None,
            active: Property::new(false),
        }
    }
}

/// The runtime-visible screens, addressed by [`ScreenKey`].
pub struct ScreenSet {
    home: Option<ScreenSlot>,
    content: Vec<ScreenSlot>,
}

impl fmt::Debug for ScreenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenSet")
            .field("home", &self.home.as_ref().map(|s| s.screen.name()))
            .field(
                "content",
                &self.content.iter().map(|s| s.screen.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ScreenSet {
    pub(crate) fn new(home: Option<Screen>, content: Vec<Screen>) -> Self {
        Self {
            home: home.map(ScreenSlot::new),
            content: content.into_iter().map(ScreenSlot::new).collect(),
        }
    }

    fn slot(&self, key: ScreenKey) -> Option<&ScreenSlot> {
        match key {
            ScreenKey::Home => self.home.as_ref(),
            ScreenKey::Content(index) => self.content.get(index),
        }
    }

    fn slot_mut(&mut self, key: ScreenKey) -> Option<&mut ScreenSlot> {
        match key {
            ScreenKey::Home => self.home.as_mut(),
            ScreenKey::Content(index) => self.content.get_mut(index),
        }
    }

    fn existing_mut(&mut self, key: ScreenKey) -> SimResult<&mut ScreenSlot> {
        self.slot_mut(key).ok_or(SimError::UnknownScreen(key))
    }

    /// Keys in display order, home first.
    pub fn keys(&self) -> Vec<ScreenKey> {
        self.home
            .iter()
            .map(|_| ScreenKey::Home)
            .chain((0..self.content.len()).map(ScreenKey::Content))
            .collect()
    }

    pub fn contains(&self, key: ScreenKey) -> bool {
        self.slot(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.content.len() + usize::from(self.home.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self, key: ScreenKey) -> Option<&str> {
        self.slot(key).map(|slot| slot.screen.name())
    }

    pub fn background(&self, key: ScreenKey) -> Option<Color> {
        self.slot(key).map(|slot| slot.screen.background())
    }

    pub fn max_dt(&self, key: ScreenKey) -> Option<f64> {
        self.slot(key).and_then(|slot| slot.screen.max_dt())
    }

    pub fn is_instantiated(&self, key: ScreenKey) -> bool {
        self.slot(key).is_some_and(|slot| slot.instance.is_some())
    }

    /// Observe whether a content screen is active. The home screen has no
    /// active flag.
    pub fn active(&self, key: ScreenKey) -> Option<ReadOnlyProperty<bool>> {
        match key {
            ScreenKey::Home => None,
            ScreenKey::Content(_) => self.slot(key).map(|slot| slot.active.read_only()),
        }
    }

    pub fn is_active(&self, key: ScreenKey) -> bool {
        self.slot(key).is_some_and(|slot| slot.active.get())
    }

    /// Shared handle to an instantiated model.
    pub fn model(&self, key: ScreenKey) -> Option<Rc<RefCell<dyn ScreenModel>>> {
        self.slot(key)
            .and_then(|slot| slot.instance.as_ref())
            .map(|instance| Rc::clone(&instance.model))
    }

    /// Build the model and view if this has not happened yet.
    ///
    /// Returns `true` when the factories ran on this call.
    pub fn instantiate(&mut self, key: ScreenKey) -> SimResult<bool> {
        let slot = self.existing_mut(key)?;
        let Some(factory) = slot.screen.factory.take() else {
            return Ok(false);
        };
        tracing::debug!(screen = %key, name = slot.screen.name(), "instantiating screen");
        slot.instance = Some(factory());
        Ok(true)
    }

    pub fn instantiate_all(&mut self) -> SimResult<()> {
        for key in self.keys() {
            self.instantiate(key)?;
        }
        Ok(())
    }

    /// Set the active flag of a content screen. Home is ignored.
    pub(crate) fn set_active(&mut self, key: ScreenKey, active: bool) -> SimResult<()> {
        if key.is_home() {
            return Ok(());
        }
        let slot = self.existing_mut(key)?;
        slot.active.set(active);
        Ok(())
    }

    pub(crate) fn step_model(&mut self, key: ScreenKey, dt: f64) -> SimResult<()> {
        let slot = self.existing_mut(key)?;
        let Some(instance) = &slot.instance else {
            return Ok(());
        };
        instance
            .model
            .borrow_mut()
            .step(dt)
            .map_err(|source| SimError::ScreenStep {
                screen: slot.screen.name().to_string(),
                phase: StepPhase::Model,
                source,
            })
    }

    pub(crate) fn step_view(&mut self, key: ScreenKey, dt: f64) -> SimResult<()> {
        let slot = self.existing_mut(key)?;
        let name = &slot.screen.name;
        let Some(instance) = &mut slot.instance else {
            return Ok(());
        };
        instance.view.step(dt).map_err(|source| SimError::ScreenStep {
            screen: name.clone(),
            phase: StepPhase::View,
            source,
        })
    }

    /// Lay out every instantiated view, in key order.
    pub(crate) fn layout_all(&mut self, bounds: &LayoutBounds) {
        let slots = self.home.iter_mut().chain(self.content.iter_mut());
        for slot in slots {
            if let Some(instance) = &mut slot.instance {
                instance.view.layout(bounds);
            }
        }
    }

    /// `(key, fingerprint)` of every instantiated model.
    pub fn fingerprints(&self) -> Vec<(ScreenKey, u64)> {
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let model = self.model(key)?;
                let fingerprint = model.borrow().fingerprint();
                Some((key, fingerprint))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Model {
        steps: Rc<Cell<u32>>,
        fail: bool,
    }

    impl Steppable for Model {
        fn step(&mut self, _dt: f64) -> Result<(), BoxError> {
            if self.fail {
                return Err("model exploded".into());
            }
            self.steps.set(self.steps.get() + 1);
            Ok(())
        }
    }

    impl ScreenModel for Model {
        fn fingerprint(&self) -> u64 {
            u64::from(self.steps.get())
        }
    }

    struct View {
        layouts: Rc<Cell<u32>>,
    }

    impl Steppable for View {}

    impl Layoutable for View {
        fn layout(&mut self, _bounds: &LayoutBounds) {
            self.layouts.set(self.layouts.get() + 1);
        }
    }

    fn counting_screen(name: &str, factory_calls: Rc<Cell<u32>>, fail: bool) -> Screen {
        let steps = Rc::new(Cell::new(0));
        Screen::new(
            name,
            move || {
                factory_calls.set(factory_calls.get() + 1);
                Model { steps, fail }
            },
            |_| View {
                layouts: Rc::new(Cell::new(0)),
            },
        )
    }

    #[test]
    fn screen_key_display() {
        assert_eq!(ScreenKey::Home.to_string(), "home");
        assert_eq!(ScreenKey::Content(2).to_string(), "content[2]");
    }

    #[test]
    fn factories_run_at_most_once() {
        let calls = Rc::new(Cell::new(0));
        let mut set = ScreenSet::new(None, vec![counting_screen("A", Rc::clone(&calls), false)]);
        assert!(!set.is_instantiated(ScreenKey::Content(0)));
        assert!(set.instantiate(ScreenKey::Content(0)).unwrap());
        assert!(!set.instantiate(ScreenKey::Content(0)).unwrap());
        assert_eq!(calls.get(), 1);
        assert!(set.is_instantiated(ScreenKey::Content(0)));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut set = ScreenSet::new(None, vec![]);
        assert!(matches!(
            set.instantiate(ScreenKey::Home),
            Err(SimError::UnknownScreen(ScreenKey::Home))
        ));
    }

    #[test]
    fn keys_put_home_first() {
        let calls = Rc::new(Cell::new(0));
        let set = ScreenSet::new(
            Some(counting_screen("Home", Rc::clone(&calls), false)),
            vec![
                counting_screen("A", Rc::clone(&calls), false),
                counting_screen("B", calls, false),
            ],
        );
        assert_eq!(
            set.keys(),
            vec![ScreenKey::Home, ScreenKey::Content(0), ScreenKey::Content(1)]
        );
        assert_eq!(set.len(), 3);
        assert!(set.active(ScreenKey::Home).is_none());
        assert!(set.active(ScreenKey::Content(1)).is_some());
    }

    #[test]
    fn step_errors_name_the_screen() {
        let calls = Rc::new(Cell::new(0));
        let mut set = ScreenSet::new(None, vec![counting_screen("Lab", calls, true)]);
        set.instantiate(ScreenKey::Content(0)).unwrap();
        let err = set.step_model(ScreenKey::Content(0), 0.016).unwrap_err();
        assert_eq!(err.to_string(), "model step of screen `Lab` failed: model exploded");
    }

    #[test]
    fn uninstantiated_screens_are_not_stepped() {
        let calls = Rc::new(Cell::new(0));
        let mut set = ScreenSet::new(None, vec![counting_screen("A", Rc::clone(&calls), true)]);
        assert!(set.step_model(ScreenKey::Content(0), 0.016).is_ok());
        assert_eq!(calls.get(), 0);
        assert!(set.fingerprints().is_empty());
    }

    #[test]
    fn fingerprints_cover_instantiated_models() {
        let calls = Rc::new(Cell::new(0));
        let mut set = ScreenSet::new(
            None,
            vec![
                counting_screen("A", Rc::clone(&calls), false),
                counting_screen("B", calls, false),
            ],
        );
        set.instantiate(ScreenKey::Content(1)).unwrap();
        set.step_model(ScreenKey::Content(1), 0.016).unwrap();
        assert_eq!(set.fingerprints(), vec![(ScreenKey::Content(1), 1)]);
    }

    #[test]
    fn active_flag_ignores_home() {
        let calls = Rc::new(Cell::new(0));
        let mut set = ScreenSet::new(
            Some(counting_screen("Home", Rc::clone(&calls), false)),
            vec![counting_screen("A", calls, false)],
        );
        set.set_active(ScreenKey::Home, true).unwrap();
        assert!(!set.is_active(ScreenKey::Home));
        set.set_active(ScreenKey::Content(0), true).unwrap();
        assert!(set.is_active(ScreenKey::Content(0)));
    }
}
