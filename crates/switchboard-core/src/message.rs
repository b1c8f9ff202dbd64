// ABOUTME: Conversation history entries exchanged between an agent and its model backend.
// ABOUTME: Holds user turns, assistant turns with capability calls, and capability results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A capability invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityCall {
    /// Backend-assigned call id, echoed back with the result.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry in a run's conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        text: Option<String>,
        calls: Vec<CapabilityCall>,
    },
    CapabilityResult {
        call_id: String,
        name: String,
        content: String,
        is_error: bool,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(text: Option<String>, calls: Vec<CapabilityCall>) -> Self {
        Message::Assistant { text, calls }
    }

    pub fn result(call: &CapabilityCall, outcome: Result<String, String>) -> Self {
        let (content, is_error) = match outcome {
            Ok(content) => (content, false),
            Err(message) => (message, true),
        };
        Message::CapabilityResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            is_error,
        }
    }

    /// Returns true if this is a failed capability result.
    pub fn is_error_result(&self) -> bool {
        matches!(self, Message::CapabilityResult { is_error: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_records_error_flag() {
        let call = CapabilityCall {
            id: "call_1".into(),
            name: "get_issue".into(),
            arguments: json!({"key": "TICKET-1"}),
        };

        let ok = Message::result(&call, Ok("{\"summary\":\"Fix bug\"}".into()));
        assert!(!ok.is_error_result());

        let failed = Message::result(&call, Err("not found".into()));
        assert!(failed.is_error_result());
        match failed {
            Message::CapabilityResult {
                call_id, name, content, ..
            } => {
                assert_eq!(call_id, "call_1");
                assert_eq!(name, "get_issue");
                assert_eq!(content, "not found");
            }
            other => panic!("expected CapabilityResult, got {:?}", other),
        }
    }

    #[test]
    fn messages_serialize_with_role_tag() {
        let json = serde_json::to_value(Message::user("hello")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");

        let json = serde_json::to_value(Message::assistant(None, vec![])).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}
