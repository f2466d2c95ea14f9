// Lock - exclusive, time-bounded claim on a token

use serde::{Deserialize, Serialize};

/// `{id, name, token, expiresAt}`. Invariant: at most one live lock per
/// token; holding a valid (non-expired) lock authorizes writes to that
/// token's registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    pub id: String,
    /// The worker name that holds the lock.
    pub name: String,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl Lock {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        token: impl Into<String>,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            token: token.into(),
            expires_at,
        }
    }

    pub fn is_live(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at > now
    }
}
