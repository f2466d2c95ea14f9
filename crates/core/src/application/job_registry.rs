// Job type registry - names a worker is willing to run
//
// Job bodies are declared ahead of time and registered by name rather
// than shipped as captured closures, since a closure can't cross the
// process boundary to the sandboxed child. This registry is the
// *worker-side* half of that mechanism: it tells
// `Worker::run_job_host` whether a `JobConfig.type` is known and
// how to build a fresh `Report` for it before the sandbox starts. The
// matching *child-side* registry, which owns the actual executable job
// bodies, lives in `infra-process` (a worker process never runs a job
// body directly; it only spawns a sandbox that does).

use crate::domain::Report;
use std::collections::HashMap;
use std::sync::Arc;

pub type ReportFactory = Arc<dyn Fn(&str, &str) -> Report + Send + Sync>;

#[derive(Clone, Default)]
pub struct JobTypeRegistry {
    factories: HashMap<String, ReportFactory>,
}

impl JobTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job_type`, with a custom report factory if the service
    /// needs report fields beyond the default `{host, token, progress,
    /// log}` shape.
    pub fn register(&mut self, job_type: impl Into<String>, factory: ReportFactory) {
        self.factories.insert(job_type.into(), factory);
    }

    /// Register `job_type` with the default `Report::new` shape.
    pub fn register_default(&mut self, job_type: impl Into<String>) {
        self.register(job_type, Arc::new(|host, token| Report::new(host, token)));
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.factories.contains_key(job_type)
    }

    pub fn fresh_report(&self, job_type: &str, host: &str, token: &str) -> Option<Report> {
        self.factories.get(job_type).map(|f| f(host, token))
    }

    pub fn job_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|s| s.as_str())
    }
}
