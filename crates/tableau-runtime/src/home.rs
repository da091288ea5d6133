#![forbid(unsafe_code)]

//! Built-in home screen: one icon per content screen, in a centered row.

use std::cell::RefCell;
use std::rc::Rc;

use tableau_core::geometry::{Bounds, Color};

use crate::layout::LayoutBounds;
use crate::screen::{Layoutable, Screen, ScreenInfo, ScreenModel, Steppable};

/// Icon width at scale 1.0.
pub const ICON_WIDTH: f64 = 148.0;
/// Icon height at scale 1.0.
pub const ICON_HEIGHT: f64 = 100.0;
/// Horizontal gap between icons at scale 1.0.
pub const ICON_SPACING: f64 = 40.0;

pub const HOME_BACKGROUND: Color = Color::BLACK;

/// Lay out `count` icons in a row centered in `content`.
///
/// The row is shrunk uniformly if it would not fit the content width.
pub fn icon_bounds(content: Bounds, scale: f64, count: usize) -> Vec<Bounds> {
    if count == 0 || content.is_empty() {
        return Vec::new();
    }
    let n = count as f64;
    let natural = n * ICON_WIDTH + (n - 1.0) * ICON_SPACING;
    let fit = (content.width() / (natural * scale)).min(1.0);
    let s = scale * fit;

    let (width, height, spacing) = (ICON_WIDTH * s, ICON_HEIGHT * s, ICON_SPACING * s);
    let row = n * width + (n - 1.0) * spacing;
    let (cx, cy) = content.center();
    let left = cx - row / 2.0;
    let top = cy - height / 2.0;
    (0..count)
        .map(|i| {
            let x = left + i as f64 * (width + spacing);
            Bounds::new(x, top, x + width, top + height)
        })
        .collect()
}

/// Home screen model: the list of reachable screens.
#[derive(Debug, Clone)]
pub struct HomeModel {
    entries: Vec<ScreenInfo>,
}

impl HomeModel {
    pub fn entries(&self) -> &[ScreenInfo] {
        &self.entries
    }
}

impl Steppable for HomeModel {}
impl ScreenModel for HomeModel {}

/// Home screen view. Icon placement is shared so the host can hit-test it.
#[derive(Debug)]
pub struct HomeView {
    count: usize,
    icons: Rc<RefCell<Vec<Bounds>>>,
}

impl HomeView {
    pub fn icons(&self) -> Rc<RefCell<Vec<Bounds>>> {
        Rc::clone(&self.icons)
    }
}

impl Steppable for HomeView {}

impl Layoutable for HomeView {
    fn layout(&mut self, bounds: &LayoutBounds) {
        *self.icons.borrow_mut() = icon_bounds(bounds.content, bounds.scale, self.count);
    }
}

/// Default home screen factory.
pub fn home_screen(screens: &[ScreenInfo]) -> Screen {
    let entries = screens.to_vec();
    Screen::new(
        "Home",
        move || HomeModel { entries },
        |model: &Rc<RefCell<HomeModel>>| HomeView {
            count: model.borrow().entries.len(),
            icons: Rc::new(RefCell::new(Vec::new())),
        },
    )
    .with_background(HOME_BACKGROUND)
}
