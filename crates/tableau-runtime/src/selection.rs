#![forbid(unsafe_code)]

//! Startup screen selection.
//!
//! [`select_screens`] validates the declared screens against
//! [`LaunchOptions`] and decides which screens exist at runtime, whether a
//! home screen is synthesized, and which screen is shown first. It runs once
//! and never instantiates a model or view.
//!
//! # Numbering
//!
//! Launch options address screens by their 1-based *declared* number, with
//! `initial_screen = 0` meaning the home screen. The result addresses them
//! by [`ScreenKey`], whose `Content(i)` is the position in the *filtered*
//! list. This module is the only place the two schemes meet.

use std::collections::HashSet;

use crate::config::LaunchOptions;
use crate::error::SelectionError;
use crate::screen::{Screen, ScreenInfo, ScreenKey, ScreenSet};

/// Immutable outcome of screen selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenSelection {
    keys: Vec<ScreenKey>,
    has_home: bool,
    initial: ScreenKey,
    all_screens_created: bool,
    declared_numbers: Vec<usize>,
}

impl ScreenSelection {
    /// Runtime-visible screens, home first when present.
    pub fn keys(&self) -> &[ScreenKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn has_home(&self) -> bool {
        self.has_home
    }

    pub fn initial(&self) -> ScreenKey {
        self.initial
    }

    /// Every declared screen made it through the filter.
    pub fn all_screens_created(&self) -> bool {
        self.all_screens_created
    }

    /// Declared 1-based number of each content screen, in filtered order.
    pub fn declared_numbers(&self) -> &[usize] {
        &self.declared_numbers
    }

    pub fn contains(&self, key: ScreenKey) -> bool {
        self.keys.contains(&key)
    }

    /// Key of the screen declared as `number`, if it was selected.
    pub fn key_for_number(&self, number: usize) -> Option<ScreenKey> {
        self.declared_numbers
            .iter()
            .position(|n| *n == number)
            .map(ScreenKey::Content)
    }
}

/// Selection plus the screens it selected.
#[derive(Debug)]
pub struct Selected {
    pub selection: ScreenSelection,
    pub screens: ScreenSet,
}

/// Filter `all` by `launch` and synthesize a home screen when warranted.
///
/// `home_factory` is called at most once, with the filtered screens'
/// descriptions.
pub fn select_screens(
    all: Vec<Screen>,
    launch: &LaunchOptions,
    home_factory: impl FnOnce(&[ScreenInfo]) -> Screen,
) -> Result<Selected, SelectionError> {
    let result = select(all, launch, home_factory);
    match &result {
        Ok(selected) => tracing::info!(
            screens = selected.selection.len(),
            home = selected.selection.has_home(),
            initial = %selected.selection.initial(),
            all_screens_created = selected.selection.all_screens_created(),
            "screens selected"
        ),
        Err(err) => tracing::error!(error = %err, "invalid screen selection"),
    }
    result
}

fn select(
    all: Vec<Screen>,
    launch: &LaunchOptions,
    home_factory: impl FnOnce(&[ScreenInfo]) -> Screen,
) -> Result<Selected, SelectionError> {
    let declared = all.len();
    if declared == 0 {
        return Err(SelectionError::NoScreens);
    }

    let numbers = match &launch.screens {
        Some(subset) => validate_subset(subset, declared)?,
        None => (1..=declared).collect(),
    };

    let filtered: Vec<(usize, Screen)> = all
        .into_iter()
        .enumerate()
        .map(|(i, screen)| (i + 1, screen))
        .filter(|(number, _)| numbers.contains(number))
        .collect();

    let has_home = filtered.len() > 1 && launch.home_screen != Some(false);
    if launch.home_screen == Some(true) && filtered.len() == 1 {
        tracing::warn!("home screen requested with a single screen; not creating one");
    }

    let initial = match launch.initial_screen {
        Some(0) if has_home => ScreenKey::Home,
        Some(0) => return Err(SelectionError::InitialHomeUnavailable),
        Some(number) if number > declared => {
            return Err(SelectionError::InitialScreenOutOfRange {
                index: number,
                declared,
            });
        }
        Some(number) => filtered
            .iter()
            .position(|(n, _)| *n == number)
            .map(ScreenKey::Content)
            .ok_or(SelectionError::InitialScreenNotSelected { number })?,
        None if has_home => ScreenKey::Home,
        None => ScreenKey::Content(0),
    };

    let declared_numbers: Vec<usize> = filtered.iter().map(|(n, _)| *n).collect();
    let home = has_home.then(|| {
        let infos: Vec<ScreenInfo> = filtered.iter().map(|(n, s)| s.info(*n)).collect();
        home_factory(&infos)
    });
    let content: Vec<Screen> = filtered.into_iter().map(|(_, s)| s).collect();

    let keys: Vec<ScreenKey> = home
        .iter()
        .map(|_| ScreenKey::Home)
        .chain((0..content.len()).map(ScreenKey::Content))
        .collect();

    Ok(Selected {
        selection: ScreenSelection {
            keys,
            has_home,
            initial,
            all_screens_created: content.len() == declared,
            declared_numbers,
        },
        screens: ScreenSet::new(home, content),
    })
}

/// Sorted, deduplicated check of a 1-based subset.
fn validate_subset(subset: &[usize], declared: usize) -> Result<Vec<usize>, SelectionError> {
    if subset.is_empty() {
        return Err(SelectionError::EmptySubset);
    }
    let mut seen = HashSet::with_capacity(subset.len());
    for &number in subset {
        if number == 0 || number > declared {
            return Err(SelectionError::UnknownScreen { number, declared });
        }
        if !seen.insert(number) {
            return Err(SelectionError::DuplicateScreen { number });
        }
    }
    Ok(subset.to_vec())
}
