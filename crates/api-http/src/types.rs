// Wire types for the Controller and Key-Value Store REST APIs
//. Field names are lowerCamelCase on the wire; this just
// rides on the domain types' own `#[serde(rename_all = "camelCase")]`
// wherever a domain type can be used directly.

use foreman_core::domain::{Instruction, JobInfo};
use serde::{Deserialize, Serialize};

/// The wire contract lists `{token, info}`; `JobInfo`
/// already carries its own `token` field, so this accepts just `info`
/// and uses `info.token` as the identity (see DESIGN.md).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePushRequest {
    pub info: JobInfo,
}

#[derive(Debug, Deserialize)]
pub struct QueuePopRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LockIdRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPushRequest {
    pub lock_id: String,
    pub status: Option<foreman_core::domain::Status>,
    pub info: Option<JobInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePushRequest {
    pub token: String,
    pub instruction: Instruction,
    pub origin: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub since: i64,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

// --- Key-Value Store wire shapes ---

#[derive(Debug, Deserialize)]
pub struct KvPopQuery {
    #[serde(default)]
    pub pop: bool,
}

#[derive(Debug, Serialize)]
pub struct KvPushResponse {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct KvEntryResponse {
    pub key: String,
    pub value: serde_json::Value,
}
