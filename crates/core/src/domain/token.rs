// Token - opaque job identifier

use serde::{Deserialize, Serialize};

/// Unique job identifier, opaque to everything but the controller that
/// minted it. Created on submission, never mutated, destroyed together
/// with its registry record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub value: String,
    pub expires: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Token {
    /// A token that never expires.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires: false,
            expires_at: None,
        }
    }

    /// A token that expires at the given instant.
    pub fn with_expiry(value: impl Into<String>, expires_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            value: value.into(),
            expires: true,
            expires_at: Some(expires_at),
        }
    }

    /// Generate a fresh UUID-v4 token.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_expiring_token_has_no_expires_at() {
        let t = Token::new("abc");
        assert!(!t.expires);
        assert_eq!(t.expires_at, None);
        let json = serde_json::to_value(&t).unwrap();
        assert!(json.get("expiresAt").is_none());
    }

    #[test]
    fn expiring_token_round_trips() {
        let at = chrono::Utc::now();
        let t = Token::with_expiry("abc", at);
        let json = serde_json::to_string(&t).unwrap();
        let back: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, t.value);
        assert_eq!(back.expires, true);
    }
}
