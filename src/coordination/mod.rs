//! Coordination infrastructure for service lifecycle.

pub mod shutdown;

pub use shutdown::{listen_for_signals, GracefulShutdown, ShutdownPhase};
