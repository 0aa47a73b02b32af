//! lather: run the countdown app in the terminal.
//!
//! Mounts the app into an in-memory document, presses Start and drives the
//! virtual clock from tokio's real-time clock. Every time the rendered
//! document changes it is printed; when the countdown ends the terminal
//! bell rings and the process exits.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

use lather_core::{App, AppProps, AudioSink, Config, Host, TerminalBell};

// ── CLI ─────────────────────────────────────────────────────────────

/// Handwashing countdown rendered to the terminal.
#[derive(Parser, Debug)]
#[command(name = "lather", version, about)]
struct Cli {
    /// Path to a JSON config file.
    #[arg(long, env = "LATHER_CONFIG")]
    config: Option<PathBuf>,

    /// Clock speed multiplier; 10 runs a 20 second countdown in 2 seconds.
    #[arg(long, env = "LATHER_SPEED", default_value_t = 1.0)]
    speed: f64,

    /// Render without pressing Start.
    #[arg(long)]
    no_autostart: bool,
}

// ── Sink ────────────────────────────────────────────────────────────

/// Rings the bell and records that the countdown ended.
struct FinishSink {
    bell: TerminalBell,
    finished: Rc<Cell<bool>>,
}

impl AudioSink for FinishSink {
    fn play(&self, source: &str) {
        self.bell.play(source);
        self.finished.set(true);
    }
}

// ── main ────────────────────────────────────────────────────────────

const FRAME: Duration = Duration::from_millis(50);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(
        cli.speed.is_finite() && cli.speed > 0.0,
        "--speed must be a positive number"
    );

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            info!(path = %path.display(), "loaded config");
            config
        }
        None => Config::default(),
    };

    let host = Host::new(config);
    let finished = Rc::new(Cell::new(false));
    let app = host.mount::<App>(AppProps {
        sink: Some(Rc::new(FinishSink {
            bell: TerminalBell,
            finished: finished.clone(),
        })),
        timer: None,
    })?;

    let document = host.document().clone();
    let body = document.body();
    let mut rendered = document.inner_html(body);
    println!("{rendered}");

    if cli.no_autostart {
        info!("autostart disabled, press ctrl-c to exit");
    } else {
        match document.find(body, "button") {
            Some(button) => {
                document.click(button);
                host.run_microtasks()?;
            }
            None => warn!("no start button rendered"),
        }
    }

    let mut frames = interval(FRAME);
    frames.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    while !finished.get() {
        tokio::select! {
            _ = frames.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
        let now = Instant::now();
        let elapsed = now.duration_since(last).mul_f64(cli.speed);
        last = now;
        host.advance(elapsed)?;

        let current = document.inner_html(body);
        if current != rendered {
            println!("{current}");
            rendered = current;
        }
    }

    app.destroy();
    host.run_microtasks()?;
    info!(elapsed = ?host.timers().now(), "lather exited cleanly");
    Ok(())
}
