//! Transient user-facing notifications.
//!
//! A [`FlashMessage`] is shown for [`DEFAULT_FLASH_TTL`] and then dismissed
//! on its own. Publishing and display are the client's concern.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::types::Timestamp;

/// How long a message stays visible.
pub const DEFAULT_FLASH_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl FlashLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

impl fmt::Display for FlashLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
    pub created_at: Timestamp,
}

impl FlashMessage {
    pub fn new(level: FlashLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(FlashLevel::Info, text)
    }

    pub fn danger(text: impl Into<String>) -> Self {
        Self::new(FlashLevel::Danger, text)
    }

    /// Whether the message should already have been dismissed at `now`.
    pub fn is_expired_at(&self, now: Timestamp, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.created_at >= ttl,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_ttl() {
        let msg = FlashMessage::info("Please wait for costs recalculation.");
        let created = msg.created_at;
        assert!(!msg.is_expired_at(created, DEFAULT_FLASH_TTL));
        assert!(!msg.is_expired_at(created + chrono::Duration::seconds(4), DEFAULT_FLASH_TTL));
        assert!(msg.is_expired_at(created + chrono::Duration::seconds(5), DEFAULT_FLASH_TTL));
    }

    #[test]
    fn level_serializes_lowercase() {
        let msg = FlashMessage::danger("Recalculate failed.");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["level"], "danger");
        assert_eq!(json["text"], "Recalculate failed.");
        assert_eq!(FlashLevel::Success.to_string(), "success");
    }
}
