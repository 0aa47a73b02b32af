//! Lather Core
//!
//! This crate provides a batched component runtime and the countdown app
//! built on it. It implements:
//!
//! - Components with typed state and per-slot dirty tracking
//! - A render scheduler that coalesces state writes into one patch per
//!   component per microtask turn
//! - Lifecycle hooks, component events, context and intro/outro transitions
//! - An in-memory document and a virtual event loop to render into
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `runtime`: components, the scheduler, lifecycle and transitions
//! - `dom`: the document tree fragments render into
//! - `host`: microtask turns and the interval clock
//! - `views`: progress bar, timer, instructions panel and root app
//! - `audio`: where the completion sound goes
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use lather_core::{App, AppProps, Config, Host};
//!
//! let host = Host::new(Config::default());
//! let app = host.mount::<App>(AppProps::default())?;
//!
//! // Press start, then let the countdown run
//! let button = host.document().find(host.document().body(), "button").unwrap();
//! host.document().click(button);
//! host.advance(Duration::from_secs(20))?;
//!
//! println!("{}", host.document().inner_html(host.document().body()));
//! app.destroy();
//! ```

pub mod audio;
pub mod config;
pub mod dom;
pub mod error;
pub mod host;
pub mod runtime;
pub mod views;

pub use audio::{AudioSink, NullSink, RecordingSink, TerminalBell};
pub use config::{Config, SchedulerConfig, TimerConfig};
pub use error::{Error, Result};
pub use host::Host;
pub use views::{App, AppProps, HowTo, ProgressBar, Timer};
