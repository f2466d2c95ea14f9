// Port Layer - interfaces for external dependencies

pub mod controller;
pub mod job_executor;
pub mod kv_store;

// Re-exports
pub use controller::{Controller, ControllerError, QueuePushOutcome};
pub use job_executor::{ChildJobRecord, ProcessContext, Sandbox, SandboxError, SandboxHandle};
pub use kv_store::{KvError, KvStore};
