// Events sent to an operation's subscriber, one JSON object per SSE `data:` line

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Log {
        log: String,
        timestamp: String,
    },
    Error {
        error: String,
        timestamp: String,
    },
    Complete {
        complete: bool,
        success: bool,
        message: String,
        timestamp: String,
    },
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl StreamEvent {
    pub fn log(text: impl Into<String>) -> Self {
        StreamEvent::Log {
            log: text.into(),
            timestamp: now(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: text.into(),
            timestamp: now(),
        }
    }

    pub fn complete(success: bool, message: impl Into<String>) -> Self {
        StreamEvent::Complete {
            complete: true,
            success,
            message: message.into(),
            timestamp: now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
