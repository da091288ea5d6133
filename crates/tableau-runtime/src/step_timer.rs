#![forbid(unsafe_code)]

//! Simulated-time tick notification and timeouts.
//!
//! The scheduler calls [`StepTimer::emit`] once per stepped frame, before
//! the current screen's model. Tick listeners run first, then any timeouts
//! that have come due, in due-time order (ties in scheduling order).
//!
//! Timeouts are measured in simulated seconds, so they honor the speed
//! multiplier and never fire while the clock is paused or in playback
//! between steps.

use std::cell::{Cell, RefCell};
use std::fmt;

use tableau_core::observable::{Emitter, Subscription};

/// Handle for cancelling a pending timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeoutId(u64);

struct Timeout {
    id: TimeoutId,
    due: f64,
    callback: Box<dyn FnOnce()>,
}

pub struct StepTimer {
    tick: Emitter<f64>,
    now: Cell<f64>,
    next_id: Cell<u64>,
    timeouts: RefCell<Vec<Timeout>>,
}

impl fmt::Debug for StepTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepTimer")
            .field("now", &self.now.get())
            .field("pending", &self.timeouts.borrow().len())
            .finish()
    }
}

impl Default for StepTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepTimer {
    pub fn new() -> Self {
        Self {
            tick: Emitter::new(),
            now: Cell::new(0.0),
            next_id: Cell::new(0),
            timeouts: RefCell::new(Vec::new()),
        }
    }

    /// Simulated seconds elapsed so far.
    pub fn now(&self) -> f64 {
        self.now.get()
    }

    /// Called with `dt` on every stepped frame.
    pub fn on_tick(&self, listener: impl FnMut(&f64) + 'static) -> Subscription {
        self.tick.subscribe(listener)
    }

    /// Run `callback` once, `delay` simulated seconds from now.
    pub fn set_timeout(&self, delay: f64, callback: impl FnOnce() + 'static) -> TimeoutId {
        let id = TimeoutId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.timeouts.borrow_mut().push(Timeout {
            id,
            due: self.now.get() + delay.max(0.0),
            callback: Box::new(callback),
        });
        id
    }

    /// Cancel a pending timeout. Returns `false` if it already fired or was
    /// cleared.
    pub fn clear_timeout(&self, id: TimeoutId) -> bool {
        let mut timeouts = self.timeouts.borrow_mut();
        let before = timeouts.len();
        timeouts.retain(|t| t.id != id);
        timeouts.len() != before
    }

    pub fn pending(&self) -> usize {
        self.timeouts.borrow().len()
    }

    /// Advance simulated time by `dt` and notify.
    pub fn emit(&self, dt: f64) {
        let now = self.now.get() + dt;
        self.now.set(now);
        self.tick.emit(&dt);

        let mut due: Vec<Timeout> = {
            let mut timeouts = self.timeouts.borrow_mut();
            let (ready, waiting): (Vec<_>, Vec<_>) =
                timeouts.drain(..).partition(|t| t.due <= now);
            *timeouts = waiting;
            ready
        };
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)));
        for timeout in due {
            (timeout.callback)();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn tick_then_timeouts_in_due_order() {
        let timer = Rc::new(StepTimer::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let l = Rc::clone(&log);
        let _tick = timer.on_tick(move |dt| l.borrow_mut().push(format!("tick {dt}")));
        let l = Rc::clone(&log);
        timer.set_timeout(0.2, move || l.borrow_mut().push("late".into()));
        let l = Rc::clone(&log);
        timer.set_timeout(0.1, move || l.borrow_mut().push("early".into()));

        timer.emit(0.05);
        assert_eq!(*log.borrow(), vec!["tick 0.05"]);
        timer.emit(0.5);
        assert_eq!(*log.borrow(), vec!["tick 0.05", "tick 0.5", "early", "late"]);
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn cleared_timeout_never_fires() {
        let timer = StepTimer::new();
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        let id = timer.set_timeout(0.0, move || f.set(true));
        assert!(timer.clear_timeout(id));
        assert!(!timer.clear_timeout(id));
        timer.emit(1.0);
        assert!(!fired.get());
    }

    #[test]
    fn callback_may_schedule_another_timeout() {
        let timer = Rc::new(StepTimer::new());
        let fired = Rc::new(Cell::new(0));
        let (t, f) = (Rc::clone(&timer), Rc::clone(&fired));
        timer.set_timeout(0.1, move || {
            f.set(f.get() + 1);
            let f = Rc::clone(&f);
            t.set_timeout(0.1, move || f.set(f.get() + 1));
        });
        timer.emit(0.1);
        assert_eq!(fired.get(), 1);
        timer.emit(0.1);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn now_accumulates() {
        let timer = StepTimer::new();
        timer.emit(0.25);
        timer.emit(0.5);
        assert_eq!(timer.now(), 0.75);
    }
}
