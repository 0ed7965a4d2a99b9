pub mod backoff;
pub mod maintenance;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use maintenance::run_maintenance_sweep;
pub use memory::InMemoryEventQueue;
pub use postgres::PostgresEventQueue;
pub use repository::{CleanupStats, EventQueueRepository, NewEvent};
