//! Request replay engine.
//!
//! Each [`Request`](harpy_core::har::Request) is driven by its own
//! [`Machine`] through resolve, connect, send and wait, talking to the network
//! only through a [`Scheduler`]. The [`Driver`] polls many machines on the
//! calling task and reports each one's [`Outcome`] as it finishes.

pub mod config;
pub mod driver;
pub mod error;
pub mod machine;
pub mod scheduler;

pub use config::EngineConfig;
pub use driver::{Driver, Outcome};
pub use error::{Error, Result};
pub use machine::{Machine, Phase};
pub use scheduler::{DEFAULT_MAX_RESPONSE_BYTES, Scheduler, TokioScheduler};
