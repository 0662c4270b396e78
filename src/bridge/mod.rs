//! Bridge to the external messaging channel.
//!
//! The relay only sees the `Bridge` trait. Today the one implementation
//! spawns a helper program per call (`HelperBridge`); a networked
//! implementation can slot in without touching the relay loop.

pub mod helper;

pub use helper::HelperBridge;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Result of asking the bridge for new correspondent messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PollResult {
    pub has_new: bool,
    pub message: String,
}

impl PollResult {
    /// The trimmed inbound message, or `None` if this poll carries nothing to act on.
    pub fn actionable_message(&self) -> Option<&str> {
        if !self.has_new {
            return None;
        }
        let trimmed = self.message.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// One request to the bridge helper, serialized as its single argument.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BridgeRequest<'a> {
    Chat {
        target_remark: &'a str,
        persona: &'a str,
        user_message: &'a str,
        reply: &'a str,
        addr: &'a str,
    },
    Poll {
        target_remark: &'a str,
        addr: &'a str,
    },
}

impl BridgeRequest<'_> {
    pub fn action(&self) -> &'static str {
        match self {
            BridgeRequest::Chat { .. } => "chat",
            BridgeRequest::Poll { .. } => "poll",
        }
    }
}

/// Delivers turns to, and polls for messages from, the external channel.
///
/// Callers never have two operations in flight at once; implementations may
/// rely on that.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Deliver one conversation turn to `target`.
    async fn send(
        &self,
        target: &str,
        persona: &str,
        user_message: &str,
        reply: &str,
    ) -> Result<(), BridgeError>;

    /// Check whether `target` has written something since the last poll.
    async fn poll(&self, target: &str) -> Result<PollResult, BridgeError>;
}

/// Poll under a deadline. On expiry the poll is abandoned and
/// `BridgeError::Timeout` is returned.
pub async fn poll_with_deadline(
    bridge: &dyn Bridge,
    deadline: Duration,
    target: &str,
) -> Result<PollResult, BridgeError> {
    match tokio::time::timeout(deadline, bridge.poll(target)).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Timeout {
            action: "poll",
            timeout: deadline,
        }),
    }
}

/// How to reach the bridge helper.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Program to execute.
    pub program: String,
    /// Script passed to `program` before the request, if any.
    pub script: Option<String>,
    /// Address of the bridge service, forwarded on every request.
    pub addr: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            script: Some("python/grpc_client.py".to_string()),
            addr: "127.0.0.1:50051".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn chat_request_shape() {
        let req = BridgeRequest::Chat {
            target_remark: "Zachary",
            persona: "kind",
            user_message: "hi",
            reply: "hello",
            addr: "127.0.0.1:50051",
        };
        assert_eq!(req.action(), "chat");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "action": "chat",
                "target_remark": "Zachary",
                "persona": "kind",
                "user_message": "hi",
                "reply": "hello",
                "addr": "127.0.0.1:50051",
            })
        );
    }

    #[test]
    fn poll_request_shape() {
        let req = BridgeRequest::Poll {
            target_remark: "Zachary",
            addr: "10.0.0.2:50051",
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"action": "poll", "target_remark": "Zachary", "addr": "10.0.0.2:50051"})
        );
    }

    #[test]
    fn actionable_message_rules() {
        let none = PollResult {
            has_new: false,
            message: "stale".into(),
        };
        assert_eq!(none.actionable_message(), None);

        let blank = PollResult {
            has_new: true,
            message: "  \n\t".into(),
        };
        assert_eq!(blank.actionable_message(), None);

        let real = PollResult {
            has_new: true,
            message: "  are you there? ".into(),
        };
        assert_eq!(real.actionable_message(), Some("are you there?"));
    }

    #[test]
    fn poll_result_requires_both_fields() {
        assert!(serde_json::from_str::<PollResult>(r#"{"has_new": true}"#).is_err());
        assert!(serde_json::from_str::<PollResult>(r#"{"ok": true}"#).is_err());
    }
}
