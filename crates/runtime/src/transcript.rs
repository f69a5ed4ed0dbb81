//! Conversation transcript types.
//!
//! A [`Turn`] serializes directly as the wire message the backend expects
//! (`role`/`content`/`tool_calls`), so the transcript doubles as the request
//! body — the backend's contract is strictly textual and order-sensitive.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A unique identifier for a session, used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Backend-assigned call identifier. Used only for pairing; the backend
    /// may omit it entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: FunctionCall,
}

/// The function half of a tool call: which tool, with which arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// May be empty when the turn only carries tool-call requests.
    #[serde(default)]
    pub content: String,
    /// Present only on assistant turns that request tool execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::text(Role::Tool, content)
    }

    /// An assistant turn carrying both content and the requested calls.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(calls),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
        }
    }
}

/// Ordered, append-only turn history for one session.
///
/// Append is the only mutator; turns are never reordered or deleted.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Read-only view of the full history, in generation order.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn turn_serializes_as_wire_message() {
        let turn = Turn::user("hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn assistant_turn_carries_calls() {
        let call = ToolCall {
            id: None,
            function: FunctionCall {
                name: "get_current_weather".to_string(),
                arguments: json!({"city": "London"}).as_object().unwrap().clone(),
            },
        };
        let turn = Turn::assistant_with_calls("", vec![call]);
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["tool_calls"][0]["function"]["name"], "get_current_weather");
        // No id was assigned, so none is serialized.
        assert!(json["tool_calls"][0].get("id").is_none());
    }

    #[test]
    fn tool_call_without_id_deserializes() {
        let json = r#"{"function":{"name":"f","arguments":{"x":1}}}"#;
        let call: ToolCall = serde_json::from_str(json).unwrap();
        assert_eq!(call.function.name, "f");
        assert!(call.id.is_none());
    }

    #[test]
    fn transcript_preserves_append_order() {
        let mut transcript = Transcript::new();
        transcript.append(Turn::user("a"));
        transcript.append(Turn::assistant("b"));
        transcript.append(Turn::tool("c"));

        let roles: Vec<Role> = transcript.snapshot().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(transcript.len(), 3);
    }
}
