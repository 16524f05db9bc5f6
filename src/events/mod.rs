//! Process-wide status event fan-out.

pub mod bus;

pub use bus::EventBus;
