// Application Layer - Use Cases and Business Logic

pub mod job_registry;
pub mod maintenance;
pub mod pool;
pub mod retry;
pub mod worker;

// Re-exports
pub use job_registry::JobTypeRegistry;
pub use maintenance::ControllerMaintenanceScheduler;
pub use pool::{PoolError, WorkerPool};
pub use retry::Backoff;
pub use worker::{shutdown_channel, KillContext, ShutdownSender, ShutdownToken, Worker, WorkerTunables};
