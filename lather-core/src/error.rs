//! Error types for the Lather runtime.
//!
//! The runtime itself has very few failure modes: everything is synchronous
//! and single-threaded. The errors below cover programmer misuse (calling a
//! component-scoped accessor outside of component construction), a runaway
//! flush loop, and configuration loading.
//!
//! Panics raised by user hooks are not caught. They unwind to
//! whoever triggered the flush.

use thiserror::Error;

/// Errors produced by the runtime and its host.
#[derive(Debug, Error)]
pub enum Error {
    /// A component-scoped accessor was called while no component was being
    /// initialised or updated.
    #[error("`{operation}` called outside component initialization")]
    OutsideComponentInit {
        /// Name of the accessor that was called.
        operation: &'static str,
    },

    /// Components kept re-dirtying each other and the flush loop gave up.
    #[error("flush did not settle after {passes} passes")]
    FlushLimitExceeded {
        /// Number of update passes that ran inside the one flush.
        passes: usize,
    },

    /// Every flush left work behind for the next microtask turn and the host
    /// stopped running them.
    #[error("microtasks did not settle after {rounds} flushes")]
    MicrotaskLimitExceeded {
        /// Number of flushes that ran before the host stopped.
        rounds: usize,
    },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Configuration could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation() {
        let err = Error::OutsideComponentInit { operation: "on_mount" };
        assert_eq!(
            err.to_string(),
            "`on_mount` called outside component initialization"
        );

        let err = Error::FlushLimitExceeded { passes: 3 };
        assert_eq!(err.to_string(), "flush did not settle after 3 passes");

        let err = Error::MicrotaskLimitExceeded { rounds: 4 };
        assert_eq!(err.to_string(), "microtasks did not settle after 4 flushes");
    }
}
