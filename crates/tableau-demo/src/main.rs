#![forbid(unsafe_code)]

//! Tableau demo binary entry point.

use tableau_demo::cli;
use tableau_demo::runner;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let opts = cli::Opts::parse();
    init_tracing();

    if opts.replay.is_some() {
        match runner::replay_file(&opts) {
            Ok(result) if result.ok() => {
                println!(
                    "replay ok: {} frames, chain {:016x}",
                    result.total_frames, result.final_checksum_chain
                );
            }
            Ok(result) => {
                if let Some(m) = result.first_mismatch {
                    eprintln!(
                        "replay diverged at frame {}: expected {:016x}, got {:016x}",
                        m.frame_idx, m.expected, m.actual
                    );
                }
                std::process::exit(2);
            }
            Err(e) => {
                eprintln!("Replay error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    match runner::run(&opts) {
        Ok(summary) => {
            println!(
                "{} frames stepped, {} skipped, {:.3}s simulated, on {}, digest {:016x}",
                summary.stepped, summary.skipped, summary.elapsed, summary.current, summary.digest
            );
        }
        Err(e) => {
            eprintln!("Runtime error: {e}");
            std::process::exit(1);
        }
    }
}
