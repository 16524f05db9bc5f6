pub mod memory;
pub mod postgres;

pub use memory::{MemoryCache, MemoryOrderStore};
pub use postgres::PostgresOrderStore;
