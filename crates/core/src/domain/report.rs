// Report - the visible result surface of a job

use crate::domain::logger::Logger;
use crate::domain::progress::Progress;
use serde::{Deserialize, Serialize};

/// `{host, token, args, progress, log, [service-specific data]}`.
///
/// Service-specific fields ride along in `extra` rather than requiring a
/// per-service generated type, so a service can attach whatever result
/// data it needs without a new `Report` subtype per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub host: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
    pub progress: Progress,
    #[serde(default)]
    pub log: Logger,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Report {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            args: None,
            progress: Progress::queued(),
            log: Logger::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Carry forward any pre-existing report fields (e.g. `extra`, `args`)
    /// while resetting progress/log for a fresh run; used when a job is
    /// requeued and the worker instantiates a new report of the same
    /// service-specific type.
    pub fn reset_for_fresh_run(&mut self) {
        self.progress = Progress::queued();
        self.log = Logger::new();
    }
}
