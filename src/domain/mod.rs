pub mod events;
pub mod order;
pub mod quote;

pub use events::*;
pub use order::*;
pub use quote::*;
