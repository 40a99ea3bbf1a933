//! Provider-neutral contract for executing one conversation turn.
//!
//! This crate defines only the shared turn lifecycle and the host-mediated
//! contract for the single `run_script` tool. It excludes provider transport
//! details, protocol payloads, and session/history ownership concerns.

use std::fmt;

use serde_json::{json, Value};

/// Identifier for one provider turn.
pub type TurnId = u64;

/// Name of the only tool any provider ever declares.
pub const RUN_SCRIPT_TOOL: &str = "run_script";

/// Error returned while constructing/configuring a provider before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Provider-neutral model-facing history item, replayed on every turn.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryMessage {
    UserText {
        text: String,
    },
    AssistantText {
        text: String,
    },
    ToolCall {
        call_id: String,
        code: String,
        description: String,
    },
    ToolResult {
        call_id: String,
        payload: Value,
        is_exception: bool,
    },
}

/// Input required to start a provider turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub turn_id: TurnId,
    pub messages: Vec<HistoryMessage>,
    pub instructions: String,
}

/// Schema for a tool declared to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    /// The canonical `run_script` schema: two textual parameters, nothing else.
    #[must_use]
    pub fn run_script() -> Self {
        Self {
            name: RUN_SCRIPT_TOOL.to_string(),
            description: "Execute a Rhai script in the persistent session environment. \
                          Values passed to capture() are returned in call order; \
                          a raised error returns its trace instead."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "The Rhai code to execute"
                    },
                    "description": {
                        "type": "string",
                        "description": "Short description of what this code does (shown to the user while running)"
                    }
                },
                "required": ["code", "description"]
            }),
        }
    }
}

/// One model-issued request to run the tool. Produced once, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub code: String,
    pub description: String,
}

/// Tool output returned to the model: the ordered captured-value list, or a
/// single trace entry tagged as an exception.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub payload: Value,
    pub is_exception: bool,
}

impl ToolResult {
    /// Constructs a successful result from captured values, in call order.
    #[must_use]
    pub fn captured(call_id: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            call_id: call_id.into(),
            payload: Value::Array(values),
            is_exception: false,
        }
    }

    /// Constructs an exception result carrying the rendered trace as its sole entry.
    #[must_use]
    pub fn exception(call_id: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            payload: Value::Array(vec![Value::String(trace.into())]),
            is_exception: true,
        }
    }
}

/// Token usage reported for one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    /// Total tokens consumed across both directions.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Accumulates another usage sample into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Provider-emitted lifecycle event for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Started {
        turn_id: TurnId,
    },
    ToolCallStarted {
        turn_id: TurnId,
        invocation: ToolInvocation,
    },
    ToolCallFinished {
        turn_id: TurnId,
        result: ToolResult,
    },
    Completed {
        turn_id: TurnId,
        text: String,
        usage: TokenUsage,
    },
    Failed {
        turn_id: TurnId,
        error: String,
    },
}

impl TurnEvent {
    /// Returns the turn identifier associated with this event.
    #[must_use]
    pub fn turn_id(&self) -> TurnId {
        match self {
            Self::Started { turn_id }
            | Self::ToolCallStarted { turn_id, .. }
            | Self::ToolCallFinished { turn_id, .. }
            | Self::Completed { turn_id, .. }
            | Self::Failed { turn_id, .. } => *turn_id,
        }
    }

    /// Returns true when this event terminates the turn lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Immutable metadata describing a turn provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for executing one turn request.
pub trait TurnProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Returns the tool declared to the model for every turn.
    fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition::run_script()
    }

    /// Executes a turn request and emits lifecycle events in provider order.
    ///
    /// Tool invocations are executed through `execute_tool`, serially and in
    /// the order the model issued them; the turn does not resume until the
    /// callback returns. The final event must be terminal.
    fn run_turn(
        &self,
        req: TurnRequest,
        execute_tool: &mut dyn FnMut(ToolInvocation) -> ToolResult,
        emit: &mut dyn FnMut(TurnEvent),
    ) -> Result<(), String>;
}
