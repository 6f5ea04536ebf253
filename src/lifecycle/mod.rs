//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight requests drain → exit
//! ```
//!
//! In-flight pipeline jobs are detached tasks; a drained request whose job
//! is still running leaves the job to finish on its own.

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
