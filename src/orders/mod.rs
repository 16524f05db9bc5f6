//! Order lifecycle ownership: storage/cache ports and the manager that
//! drives every state transition through them.

pub mod manager;
pub mod traits;

pub use manager::OrderManager;
pub use traits::{OrderStore, SnapshotCache};
