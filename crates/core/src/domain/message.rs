// Message - out-of-band per-token instruction

use serde::{Deserialize, Serialize};

/// The closed set of out-of-band instructions a controller can route to
/// a token. Only `Abort` exists today; the enum is closed deliberately
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instruction {
    Abort,
}

/// `{token, instruction, origin, content, receivedAt, expiresAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub token: String,
    pub instruction: Instruction,
    pub origin: String,
    pub content: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Message {
    pub fn new_abort(
        token: impl Into<String>,
        origin: impl Into<String>,
        content: impl Into<String>,
        received_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            instruction: Instruction::Abort,
            origin: origin.into(),
            content: content.into(),
            received_at,
            expires_at: None,
        }
    }
}
