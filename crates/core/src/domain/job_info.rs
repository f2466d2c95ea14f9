// Job Info - aggregate registry record

use crate::domain::job_config::JobConfig;
use crate::domain::metadata::JobMetadata;
use crate::domain::report::Report;
use crate::domain::token::Token;
use serde::{Deserialize, Serialize};

/// The aggregate record persisted in the registry for a single token:
/// `{config, token, metadata, report}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub config: JobConfig,
    pub token: Token,
    #[serde(default)]
    pub metadata: JobMetadata,
    pub report: Report,
}

impl JobInfo {
    pub fn new(token: Token, config: JobConfig, host: impl Into<String>) -> Self {
        let report = Report::new(host, token.value.clone());
        Self {
            config,
            token,
            metadata: JobMetadata::new(),
            report,
        }
    }
}
