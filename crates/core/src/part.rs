use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag prefix shared by every tool invocation part (`tool-<name>`).
pub const TOOL_TAG_PREFIX: &str = "tool-";

/// Tag prefix shared by every structured annotation part (`data-<kind>`).
pub const DATA_TAG_PREFIX: &str = "data-";

/// Streaming lifecycle of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    /// Arguments are still arriving
    InputStreaming,
    /// Arguments are complete, tool has not answered yet
    #[default]
    InputAvailable,
    /// Tool produced a result
    OutputAvailable,
    /// Tool failed
    OutputError,
}

impl ToolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolState::InputStreaming => "input-streaming",
            ToolState::InputAvailable => "input-available",
            ToolState::OutputAvailable => "output-available",
            ToolState::OutputError => "output-error",
        }
    }

    /// True once the tool has answered, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, ToolState::OutputAvailable | ToolState::OutputError)
    }
}

/// One typed content fragment within a conversation turn.
///
/// The open-ended `tool-<name>` and `data-<kind>` tag families are folded into
/// the [`Part::Tool`] and [`Part::Data`] variants. Any tag outside the known
/// families parses to [`Part::Unknown`] so a newer backend never breaks the
/// transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPart", into = "RawPart")]
pub enum Part {
    /// Answer text (payload may be blank while streaming)
    Text { text: String },
    /// Intermediate "thinking" segment
    Reasoning { text: String },
    /// Tool invocation, one tag per tool
    Tool { name: String, state: ToolState, input: Option<Value>, output: Option<Value> },
    /// Out-of-band structured annotation
    Data { kind: String, value: Value },
    /// Tag this build does not recognize
    Unknown { tag: String },
}

impl Part {
    /// A user-visible text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// A reasoning part, shown in its own collapsible section.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Part::Reasoning { text: text.into() }
    }

    /// A tool invocation part for tool `name`.
    pub fn tool(name: impl Into<String>, state: ToolState) -> Self {
        Part::Tool { name: name.into(), state, input: None, output: None }
    }

    /// A structured annotation part; never rendered as text.
    pub fn data(kind: impl Into<String>, value: Value) -> Self {
        Part::Data { kind: kind.into(), value }
    }

    /// Build a part from its wire tag, without a payload.
    pub fn from_tag(tag: &str) -> Self {
        RawPart { tag: tag.to_string(), ..RawPart::default() }.into()
    }

    /// The wire tag (`text`, `reasoning`, `tool-<name>`, `data-<kind>`, ...).
    pub fn tag(&self) -> String {
        match self {
            Part::Text { .. } => "text".to_string(),
            Part::Reasoning { .. } => "reasoning".to_string(),
            Part::Tool { name, .. } => format!("{}{}", TOOL_TAG_PREFIX, name),
            Part::Data { kind, .. } => format!("{}{}", DATA_TAG_PREFIX, kind),
            Part::Unknown { tag } => tag.clone(),
        }
    }

    /// Whether this is a text part, empty or not.
    pub fn is_text(&self) -> bool {
        matches!(self, Part::Text { .. })
    }

    /// Whether this is a reasoning part.
    pub fn is_reasoning(&self) -> bool {
        matches!(self, Part::Reasoning { .. })
    }

    /// Whether this is a tool invocation, in any state.
    pub fn is_tool_invocation(&self) -> bool {
        matches!(self, Part::Tool { .. })
    }

    /// Whether this is a `data-*` annotation.
    pub fn is_data(&self) -> bool {
        matches!(self, Part::Data { .. })
    }

    /// Text payload if this is a text part with non-blank content.
    pub fn visible_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }

    /// Append streamed text to a text or reasoning part. Returns false for other kinds.
    pub fn push_str(&mut self, delta: &str) -> bool {
        match self {
            Part::Text { text } | Part::Reasoning { text } => {
                text.push_str(delta);
                true
            }
            _ => false,
        }
    }
}

/// Flat wire shape used for (de)serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawPart {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<ToolState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl From<RawPart> for Part {
    fn from(raw: RawPart) -> Self {
        match raw.tag.as_str() {
            "text" => Part::Text { text: raw.text.unwrap_or_default() },
            "reasoning" => Part::Reasoning { text: raw.text.unwrap_or_default() },
            tag => {
                if let Some(name) = tag.strip_prefix(TOOL_TAG_PREFIX).filter(|n| !n.is_empty()) {
                    Part::Tool {
                        name: name.to_string(),
                        state: raw.state.unwrap_or_default(),
                        input: raw.input,
                        output: raw.output,
                    }
                } else if let Some(kind) = tag.strip_prefix(DATA_TAG_PREFIX).filter(|k| !k.is_empty()) {
                    Part::Data { kind: kind.to_string(), value: raw.data.unwrap_or(Value::Null) }
                } else {
                    Part::Unknown { tag: tag.to_string() }
                }
            }
        }
    }
}

impl From<Part> for RawPart {
    fn from(part: Part) -> Self {
        let tag = part.tag();
        match part {
            Part::Text { text } | Part::Reasoning { text } => RawPart { tag, text: Some(text), ..RawPart::default() },
            Part::Tool { state, input, output, .. } => {
                RawPart { tag, state: Some(state), input, output, ..RawPart::default() }
            }
            Part::Data { value, .. } => RawPart { tag, data: Some(value), ..RawPart::default() },
            Part::Unknown { .. } => RawPart { tag, ..RawPart::default() },
        }
    }
}
