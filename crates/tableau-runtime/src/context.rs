#![forbid(unsafe_code)]

//! Per-simulation shared services.
//!
//! A [`RuntimeContext`] is created by [`SimBuilder::build`](crate::sim::SimBuilder::build)
//! and handed to nothing global: screens that need the step timer or frame
//! events receive clones of the handles they need.
//!
//! Only one context may be alive in a process at a time. The guard is
//! released when the context (and hence its `Sim`) is dropped.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tableau_core::observable::{Emitter, Property, ReadOnlyProperty};

use crate::config::RuntimeConfig;
use crate::error::{SimError, SimResult};
use crate::step_timer::StepTimer;

static CONTEXT_ACTIVE: AtomicBool = AtomicBool::new(false);

static SERIAL: Mutex<()> = Mutex::new(());

/// Serializes tests that build a [`Sim`](crate::sim::Sim).
///
/// Test harnesses run tests on parallel threads, while only one context may
/// be alive per process. Hold the returned guard for the duration of the
/// test. A panicking test does not poison later ones.
#[doc(hidden)]
pub fn serial_guard() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct ContextGuard;

impl ContextGuard {
    fn acquire() -> SimResult<Self> {
        CONTEXT_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| SimError::ContextActive)
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT_ACTIVE.store(false, Ordering::Release);
    }
}

/// Whether a context is currently alive in this process.
pub fn is_context_active() -> bool {
    CONTEXT_ACTIVE.load(Ordering::Acquire)
}

#[derive(Debug)]
pub struct RuntimeContext {
    config: RuntimeConfig,
    step_timer: Rc<StepTimer>,
    frame_started: Emitter<u64>,
    frame_ended: Emitter<u64>,
    restoring: Property<bool>,
    _guard: ContextGuard,
}

impl RuntimeContext {
    /// Validate `config` and claim the process-wide slot.
    pub fn new(config: RuntimeConfig) -> SimResult<Self> {
        config.validate()?;
        let guard = ContextGuard::acquire().inspect_err(|_| {
            tracing::error!("a runtime context is already active");
        })?;
        Ok(Self {
            config,
            step_timer: Rc::new(StepTimer::new()),
            frame_started: Emitter::new(),
            frame_ended: Emitter::new(),
            restoring: Property::new(false),
            _guard: guard,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn step_timer(&self) -> &Rc<StepTimer> {
        &self.step_timer
    }

    /// Emitted with the 1-based frame index before anything else in a step.
    pub fn frame_started(&self) -> &Emitter<u64> {
        &self.frame_started
    }

    /// Emitted with the 1-based frame index after a step completes.
    pub fn frame_ended(&self) -> &Emitter<u64> {
        &self.frame_ended
    }

    /// `true` while a bulk state restore is in progress.
    pub fn restoring(&self) -> ReadOnlyProperty<bool> {
        self.restoring.read_only()
    }

    pub(crate) fn set_restoring(&self, restoring: bool) {
        self.restoring.set(restoring);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn second_context_is_rejected_until_first_drops() {
        let _serial = serial_guard();
        let first = RuntimeContext::new(RuntimeConfig::default()).unwrap();
        assert!(is_context_active());
        assert!(matches!(
            RuntimeContext::new(RuntimeConfig::default()),
            Err(SimError::ContextActive)
        ));
        drop(first);
        assert!(!is_context_active());
        let again = RuntimeContext::new(RuntimeConfig::default()).unwrap();
        drop(again);
    }

    #[test]
    fn invalid_config_does_not_claim_the_slot() {
        let _serial = serial_guard();
        let err = RuntimeContext::new(RuntimeConfig::default().with_speed(-1.0)).unwrap_err();
        assert!(matches!(err, SimError::Config(ConfigError::NotPositive { .. })));
        assert!(!is_context_active());
    }

    #[test]
    fn restoring_is_observable() {
        let _serial = serial_guard();
        let ctx = RuntimeContext::new(RuntimeConfig::default()).unwrap();
        let view = ctx.restoring();
        ctx.set_restoring(true);
        assert!(view.get());
    }
}
