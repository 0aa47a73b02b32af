//! The countdown app's components.
//!
//! - [`ProgressBar`]: a bar whose width follows a percentage prop.
//! - [`Timer`]: the countdown with its start/reset button.
//! - [`HowTo`]: static instructions.
//! - [`App`]: the root, wiring the timer's end to an [`AudioSink`](crate::audio::AudioSink).

mod app;
mod how_to;
mod progress_bar;
mod timer;

pub use app::{App, AppProps, AppSlot, COMPLETION_SOUND};
pub use how_to::{HowTo, HOW_TO_IMAGE};
pub use progress_bar::{ProgressBar, ProgressBarProps, ProgressBarSlot};
pub use timer::{Timer, TimerProps, TimerSlot, TIMER_CONFIG_KEY, TIMER_END};
