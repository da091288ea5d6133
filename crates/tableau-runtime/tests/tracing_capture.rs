#![forbid(unsafe_code)]

//! Structured logging emitted by the runtime.

use std::sync::{Arc, Mutex};

use tableau_core::geometry::Size;
use tableau_runtime::config::LaunchOptions;
use tableau_runtime::context::serial_guard;
use tableau_runtime::error::BoxError;
use tableau_runtime::screen::{Layoutable, Screen, ScreenKey, ScreenModel, Steppable};
use tableau_runtime::selection::select_screens;
use tableau_runtime::home::home_screen;
use tableau_runtime::sim::SimBuilder;
use tableau_runtime::simulator::{HeadlessScene, ManualEnvironment};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: Level,
    message: String,
    span: Option<String>,
}

#[derive(Clone, Default)]
struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    spans: Arc<Mutex<Vec<String>>>,
}

struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S> tracing_subscriber::Layer<S> for EventCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        self.spans
            .lock()
            .unwrap()
            .push(attrs.metadata().name().to_string());
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        let span = ctx.lookup_current().map(|s| s.name().to_string());
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.0,
            span,
        });
    }
}

fn capture(f: impl FnOnce()) -> EventCapture {
    let layer = EventCapture::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    tracing::subscriber::with_default(subscriber, f);
    layer
}

struct Quiet;
impl Steppable for Quiet {}
impl Layoutable for Quiet {}
impl ScreenModel for Quiet {}

struct Broken;
impl Steppable for Broken {
    fn step(&mut self, _dt: f64) -> Result<(), BoxError> {
        Err("broken".into())
    }
}
impl ScreenModel for Broken {}

fn quiet(name: &str) -> Screen {
    Screen::new(name, || Quiet, |_| Quiet)
}

#[test]
fn selection_errors_are_logged_at_error() {
    let capture = capture(|| {
        let opts = LaunchOptions {
            screens: Some(vec![9]),
            ..LaunchOptions::default()
        };
        assert!(select_screens(vec![quiet("A")], &opts, home_screen).is_err());
    });
    let events = capture.events.lock().unwrap();
    assert!(
        events
            .iter()
            .any(|e| e.level == Level::ERROR && e.message == "invalid screen selection")
    );
}

#[test]
fn single_screen_home_request_warns() {
    let capture = capture(|| {
        let opts = LaunchOptions {
            home_screen: Some(true),
            ..LaunchOptions::default()
        };
        assert!(select_screens(vec![quiet("A")], &opts, home_screen).is_ok());
    });
    let events = capture.events.lock().unwrap();
    assert!(events.iter().any(|e| e.level == Level::WARN));
}

#[test]
fn step_and_resize_run_inside_spans() {
    let _serial = serial_guard();
    let capture = capture(|| {
        let (_scene, shared) = HeadlessScene::shared();
        let env = ManualEnvironment::new(Size::new(1024.0, 618.0));
        let mut sim = SimBuilder::new(vec![quiet("A"), quiet("B")])
            .build(shared, Box::new(env))
            .unwrap();
        sim.resize(0.0, 0.0).unwrap();
        sim.switch_screen(ScreenKey::Content(1)).unwrap();
        sim.step_simulation(0.016).unwrap();
    });

    let spans = capture.spans.lock().unwrap();
    assert!(spans.iter().any(|s| s == "step_simulation"));
    assert!(spans.iter().any(|s| s == "resize"));

    let events = capture.events.lock().unwrap();
    let ignored = events
        .iter()
        .find(|e| e.message == "ignoring resize to non-positive window size")
        .expect("zero-size resize is logged");
    assert_eq!(ignored.level, Level::DEBUG);
    assert_eq!(ignored.span.as_deref(), Some("resize"));
    assert!(
        events
            .iter()
            .any(|e| e.level == Level::INFO && e.message == "screen switched")
    );
}

#[test]
fn step_failure_is_logged_before_halting() {
    let _serial = serial_guard();
    let capture = capture(|| {
        let (_scene, shared) = HeadlessScene::shared();
        let env = ManualEnvironment::new(Size::new(1024.0, 618.0));
        let screen = Screen::new("Broken", || Broken, |_| Quiet);
        let mut sim = SimBuilder::new(vec![screen])
            .build(shared, Box::new(env))
            .unwrap();
        assert!(sim.step_simulation(0.016).is_err());
    });
    let events = capture.events.lock().unwrap();
    let failure = events
        .iter()
        .find(|e| e.level == Level::ERROR)
        .expect("failure is logged");
    assert_eq!(failure.message, "step failed, halting scheduler");
    assert_eq!(failure.span.as_deref(), Some("step_simulation"));
}
