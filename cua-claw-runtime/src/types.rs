//! Interaction item definitions for the CUA-Claw runtime.
//!
//! Items mirror the wire shape of the reasoning service so they can be sent
//! back verbatim. Fields the runtime does not interpret are kept in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder written over inline image data in redacted views.
pub const OMITTED: &str = "[omitted]";

/// Message role in the interaction log.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Developer,
}

/// Message body: either plain text or a list of typed parts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One typed part of a structured message body.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageContent {
    /// Concatenated text of the message.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MessageItem {
    pub role: Role,
    pub content: MessageContent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SummaryPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

/// Private rationale emitted right before an action.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReasoningItem {
    pub id: String,
    #[serde(default)]
    pub summary: Vec<SummaryPart>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReasoningItem {
    /// First non-empty summary text, or a fallback naming the id.
    pub fn reason(&self) -> String {
        self.summary
            .iter()
            .filter(|part| part.kind == "summary_text")
            .map(|part| part.text.trim())
            .find(|text| !text.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("(reasoning id {})", self.id))
    }
}

/// A safety check attached to a primitive action.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SafetyCheck {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Request to run an automation primitive.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ComputerCallItem {
    pub call_id: String,
    pub action: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_safety_checks: Vec<SafetyCheck>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComputerCallItem {
    /// Action type name, e.g. `click`.
    pub fn action_type(&self) -> &str {
        self.action
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

/// Request to invoke a named function.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionCallItem {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Screenshot payload of a primitive action result.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScreenshotOutput {
    #[serde(rename = "type")]
    pub kind: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
}

impl ScreenshotOutput {
    /// Wrap base64 PNG data as an inline image.
    pub fn png(base64_png: &str) -> Self {
        Self {
            kind: "input_image".to_string(),
            image_url: format!("data:image/png;base64,{base64_png}"),
            current_url: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    Incomplete,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ComputerCallOutputItem {
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acknowledged_safety_checks: Vec<SafetyCheck>,
    pub output: ScreenshotOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FunctionCallOutputItem {
    pub call_id: String,
    pub output: String,
}

/// Kind of an action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Automation primitive (pointer, keyboard, scroll, ...).
    Primitive,
    /// Named function exposed by the capability registry.
    Function,
}

/// One entry of the interaction log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionItem {
    Message(MessageItem),
    Reasoning(ReasoningItem),
    ComputerCall(ComputerCallItem),
    FunctionCall(FunctionCallItem),
    ComputerCallOutput(ComputerCallOutputItem),
    FunctionCallOutput(FunctionCallOutputItem),
}

/// Item `type` tags the runtime understands.
pub const KNOWN_ITEM_TYPES: &[&str] = &[
    "message",
    "reasoning",
    "computer_call",
    "function_call",
    "computer_call_output",
    "function_call_output",
];

impl InteractionItem {
    /// Create a user instruction.
    pub fn user(text: impl Into<String>) -> Self {
        Self::message(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::message(Role::Assistant, text)
    }

    fn message(role: Role, text: impl Into<String>) -> Self {
        InteractionItem::Message(MessageItem {
            role,
            content: MessageContent::Text(text.into()),
            extra: Map::new(),
        })
    }

    /// Correlation id of an action request.
    pub fn request_call_id(&self) -> Option<&str> {
        match self {
            InteractionItem::ComputerCall(call) => Some(&call.call_id),
            InteractionItem::FunctionCall(call) => Some(&call.call_id),
            _ => None,
        }
    }

    /// Correlation id of an action result.
    pub fn result_call_id(&self) -> Option<&str> {
        match self {
            InteractionItem::ComputerCallOutput(output) => Some(&output.call_id),
            InteractionItem::FunctionCallOutput(output) => Some(&output.call_id),
            _ => None,
        }
    }

    pub fn action_kind(&self) -> Option<ActionKind> {
        match self {
            InteractionItem::ComputerCall(_) => Some(ActionKind::Primitive),
            InteractionItem::FunctionCall(_) => Some(ActionKind::Function),
            _ => None,
        }
    }

    pub fn is_action_request(&self) -> bool {
        self.request_call_id().is_some()
    }

    pub fn is_action_result(&self) -> bool {
        self.result_call_id().is_some()
    }

    pub fn reasoning_id(&self) -> Option<&str> {
        match self {
            InteractionItem::Reasoning(reasoning) => Some(&reasoning.id),
            _ => None,
        }
    }

    pub fn is_reasoning(&self) -> bool {
        matches!(self, InteractionItem::Reasoning(_))
    }

    pub fn is_user_message(&self) -> bool {
        matches!(self, InteractionItem::Message(m) if m.role == Role::User)
    }

    /// An assistant message ends a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InteractionItem::Message(m) if m.role == Role::Assistant)
    }

    /// True for results carrying an inline image.
    pub fn has_visual_artifact(&self) -> bool {
        matches!(
            self,
            InteractionItem::ComputerCallOutput(output) if !output.output.image_url.is_empty()
        )
    }

    /// Text of a message item.
    pub fn message_text(&self) -> Option<String> {
        match self {
            InteractionItem::Message(m) => Some(m.content.text()),
            _ => None,
        }
    }

    /// Copy with inline image data replaced, for logs and transcripts.
    pub fn redacted(&self) -> Self {
        match self {
            InteractionItem::ComputerCallOutput(output) => {
                let mut output = output.clone();
                output.output.image_url = OMITTED.to_string();
                InteractionItem::ComputerCallOutput(output)
            }
            other => other.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_message_wire_shape() {
        let item = InteractionItem::user("open the settings page");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "open the settings page");
    }

    #[test]
    fn test_service_message_keeps_unknown_fields() {
        let raw = json!({
            "type": "message",
            "id": "msg_1",
            "status": "completed",
            "role": "assistant",
            "content": [{"type": "output_text", "text": "Done.", "annotations": []}]
        });
        let item: InteractionItem = serde_json::from_value(raw.clone()).unwrap();
        assert!(item.is_terminal());
        assert_eq!(item.message_text().unwrap(), "Done.");
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_computer_call_parsing() {
        let raw = json!({
            "type": "computer_call",
            "id": "cu_1",
            "call_id": "call_1",
            "action": {"type": "click", "x": 10, "y": 20, "button": "left"},
            "pending_safety_checks": [],
            "status": "completed"
        });
        let item: InteractionItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.request_call_id(), Some("call_1"));
        assert_eq!(item.action_kind(), Some(ActionKind::Primitive));
        match item {
            InteractionItem::ComputerCall(call) => assert_eq!(call.action_type(), "click"),
            _ => panic!("Expected computer call"),
        }
    }

    #[test]
    fn test_reasoning_reason_fallback() {
        let with_text = ReasoningItem {
            id: "rs_1".to_string(),
            summary: vec![SummaryPart {
                kind: "summary_text".to_string(),
                text: "  Click the search box  ".to_string(),
            }],
            extra: Map::new(),
        };
        assert_eq!(with_text.reason(), "Click the search box");

        let without = ReasoningItem {
            id: "rs_2".to_string(),
            summary: vec![],
            extra: Map::new(),
        };
        assert_eq!(without.reason(), "(reasoning id rs_2)");
    }

    #[test]
    fn test_visual_artifact_and_redaction() {
        let item = InteractionItem::ComputerCallOutput(ComputerCallOutputItem {
            call_id: "call_1".to_string(),
            acknowledged_safety_checks: vec![],
            output: ScreenshotOutput::png("AAAA"),
            status: None,
        });
        assert!(item.has_visual_artifact());
        assert!(item.is_action_result());

        let redacted = item.redacted();
        match redacted {
            InteractionItem::ComputerCallOutput(output) => {
                assert_eq!(output.output.image_url, OMITTED);
            }
            _ => panic!("Expected computer call output"),
        }
    }

    #[test]
    fn test_unknown_item_type_rejected() {
        let raw = json!({"type": "web_search_call", "id": "ws_1"});
        let result: Result<InteractionItem, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }
}
