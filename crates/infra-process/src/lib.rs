// Child-process execution sandbox adapter
//
// `parent` owns the worker-side half: spawn an OS process per job,
// exchange newline-delimited JSON `ProcessContext` snapshots over its
// stdio, and tear it down gracefully-then-forcibly on abort. `child`
// owns the sandboxed-process-side half: read the initial context off
// stdin, install termination handlers, run the registered job body, and
// push snapshots back. `job_body` is the child-side job-type registry
// the worker-side `JobTypeRegistry` (in foreman-core) has no visibility
// into, by design.

mod child;
mod job_body;
mod parent;

pub use child::run_child;
pub use job_body::{JobBody, JobBodyError, JobBodyRegistry, JobHandle};
pub use parent::SubprocessSandbox;
