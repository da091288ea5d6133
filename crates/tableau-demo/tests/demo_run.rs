//! End-to-end runs of the demo driver.

use proptest::prelude::*;
use tableau::{LaunchOptions, ScreenKey};
use tableau_demo::cli::Opts;
use tableau_demo::runner::{self, HELP_FRAMES};
use tableau_runtime::context::serial_guard;
use tempfile::TempDir;

#[test]
fn default_run_cycles_through_every_screen() {
    let _serial = serial_guard();
    let opts = Opts {
        frames: 480,
        ..Opts::default()
    };
    let summary = runner::run(&opts).unwrap();
    // The first frame uses the fallback dt; every frame after it steps.
    assert_eq!(summary.stepped, 480);
    assert_eq!(summary.skipped, 0);
    // Home, then screens 1..=3, switching every 120 frames.
    assert_eq!(summary.current, ScreenKey::Home);
    assert!((summary.elapsed - 480.0 / 60.0).abs() < 0.05);
    assert_eq!(summary.recorded_frames, None);
}

#[test]
fn recorded_run_replays_cleanly() {
    let _serial = serial_guard();
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("session.jsonl");
    let opts = Opts {
        frames: HELP_FRAMES + 90,
        switch_every: 25,
        record: Some(path.clone()),
        ..Opts::default()
    };
    let summary = runner::run(&opts).unwrap();
    assert_eq!(summary.recorded_frames, Some(summary.stepped));

    let replay_opts = Opts {
        replay: Some(path.clone()),
        ..Opts::default()
    };
    let result = runner::replay_file(&replay_opts).unwrap();
    assert!(result.ok(), "mismatch: {:?}", result.first_mismatch);
    assert_eq!(result.total_frames, summary.stepped);
}

#[test]
fn replaying_with_other_screens_fails() {
    let _serial = serial_guard();
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("session.jsonl");
    let opts = Opts {
        frames: 10,
        record: Some(path.clone()),
        ..Opts::default()
    };
    runner::run(&opts).unwrap();

    let replay_opts = Opts {
        replay: Some(path.clone()),
        launch: LaunchOptions {
            screens: Some(vec![1, 3]),
            ..LaunchOptions::default()
        },
        ..Opts::default()
    };
    let err = runner::replay_file(&replay_opts).unwrap_err();
    assert!(matches!(err, tableau::Error::Replay(_)));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let opts = Opts {
        config: Some(tmp.path().join("no-such-config.toml")),
        ..Opts::default()
    };
    assert!(matches!(runner::run(&opts), Err(tableau::Error::Io(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_screen_subset_runs(
        subset in proptest::sample::subsequence(vec![1usize, 2, 3], 1..=3),
        home in any::<bool>(),
        switch_every in 0u64..8,
    ) {
        let _serial = serial_guard();
        let opts = Opts {
            frames: 20,
            switch_every,
            launch: LaunchOptions {
                screens: Some(subset.clone()),
                home_screen: Some(home),
                ..LaunchOptions::default()
            },
            ..Opts::default()
        };
        let summary = runner::run(&opts).unwrap();
        prop_assert_eq!(summary.stepped, 20);
        if switch_every == 0 {
            let expected = if home && subset.len() > 1 {
                ScreenKey::Home
            } else {
                ScreenKey::Content(0)
            };
            prop_assert_eq!(summary.current, expected);
        }
    }
}
