// Job Metadata - write-once audit trail

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// A single write-once audit record: who did it, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub by: String,
    pub datetime: chrono::DateTime<chrono::Utc>,
}

impl MetadataRecord {
    pub fn new(by: impl Into<String>, datetime: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            by: by.into(),
            datetime,
        }
    }
}

/// Audit trail for a job's lifecycle. Each field is set at most once per
/// run; `requeue` resets `consumed`/`completed`/`aborted` back to `None`
/// while leaving `produced` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produced: Option<MetadataRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed: Option<MetadataRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<MetadataRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<MetadataRecord>,
}

impl JobMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `produced` if unset; a second call is a no-op rather than an
    /// error, since the produced field is set exactly once by the
    /// controller at submission time.
    pub fn set_produced(&mut self, by: impl Into<String>, at: chrono::DateTime<chrono::Utc>) {
        if self.produced.is_none() {
            self.produced = Some(MetadataRecord::new(by, at));
        }
    }

    pub fn set_consumed(&mut self, by: impl Into<String>, at: chrono::DateTime<chrono::Utc>) {
        if self.consumed.is_none() {
            self.consumed = Some(MetadataRecord::new(by, at));
        }
    }

    pub fn set_aborted(&mut self, by: impl Into<String>, at: chrono::DateTime<chrono::Utc>) {
        if self.aborted.is_none() {
            self.aborted = Some(MetadataRecord::new(by, at));
        }
    }

    pub fn set_completed(&mut self, by: impl Into<String>, at: chrono::DateTime<chrono::Utc>) {
        if self.completed.is_none() {
            self.completed = Some(MetadataRecord::new(by, at));
        }
    }

    /// Fails loudly (unlike the setters above) when a caller expects a
    /// field to genuinely be unset, e.g. when the worker finalizes a job
    /// and a double-finalization would indicate a logic bug upstream.
    pub fn set_completed_strict(
        &mut self,
        by: impl Into<String>,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        if self.completed.is_some() {
            return Err(DomainError::MetadataAlreadySet("completed"));
        }
        self.completed = Some(MetadataRecord::new(by, at));
        Ok(())
    }

    /// Reset for a requeue: `produced` survives, the rest are cleared.
    pub fn reset_for_requeue(&mut self) {
        self.consumed = None;
        self.aborted = None;
        self.completed = None;
    }
}
