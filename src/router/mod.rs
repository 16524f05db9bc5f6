//! Quote routing across swap venues.
//!
//! Providers are registered on a [`QuoteRouter`], which fans a quote request
//! out to all of them concurrently and picks the venue returning the highest
//! output amount. Execution is then dispatched back to the winning venue.

pub mod provider;
pub mod selection;
pub mod simulated;

pub use provider::{ExecutionRequest, Provider};
pub use selection::{QuoteRouter, RouteSelection};
pub use simulated::{Band, SimulatedProvider, VenueProfile};
