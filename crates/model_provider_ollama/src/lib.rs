//! Ollama-backed implementation of the shared `model_provider` contract.
//!
//! This adapter drives the `/api/chat` tool-calling loop: it replays the
//! provider-neutral history as wire messages, executes each model-issued
//! `run_script` call through the host callback (serially, in issue order),
//! feeds the tool results back, and keeps going until the model answers with
//! plain text. Token usage is summed over every round trip of the turn.

use std::sync::Arc;
use std::time::Duration;

use model_provider::{
    HistoryMessage, ProviderInitError, ProviderProfile, TokenUsage, ToolInvocation, ToolResult,
    TurnEvent, TurnProvider, TurnRequest, RUN_SCRIPT_TOOL,
};
use ollama_api::{
    ChatMessage, ChatRequest, ChatResponse, FunctionCall, OllamaApiClient, OllamaApiConfig,
    OllamaApiError, ToolCall as WireToolCall, ToolSpec,
};
use serde_json::{json, Value};

/// Stable provider identifier used by startup selection.
pub const OLLAMA_PROVIDER_ID: &str = "ollama";

/// Runtime configuration for the Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaProviderConfig {
    pub base_url: String,
    pub model_id: String,
    pub timeout: Option<Duration>,
}

impl OllamaProviderConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model_id: model_id.into(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_api_config(self) -> OllamaApiConfig {
        let mut config = OllamaApiConfig::new(self.base_url);
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }
}

trait ChatTransport: Send + Sync {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, OllamaApiError>;
}

struct DefaultChatTransport {
    client: OllamaApiClient,
}

impl ChatTransport for DefaultChatTransport {
    fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, OllamaApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                OllamaApiError::Unknown(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(self.client.chat(request))
    }
}

/// `TurnProvider` adapter backed by `ollama_api` transport primitives.
pub struct OllamaProvider {
    model_id: String,
    transport: Arc<dyn ChatTransport>,
}

impl OllamaProvider {
    /// Creates a provider using real Ollama transport.
    pub fn new(config: OllamaProviderConfig) -> Result<Self, ProviderInitError> {
        let model_id = config.model_id.clone();
        let client = OllamaApiClient::new(config.into_api_config()).map_err(|error| {
            ProviderInitError::new(format!("Failed to initialize ollama provider: {error}"))
        })?;

        Ok(Self {
            model_id,
            transport: Arc::new(DefaultChatTransport { client }),
        })
    }

    #[cfg(test)]
    fn with_transport_for_tests(
        model_id: impl Into<String>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            transport,
        }
    }
}

impl TurnProvider for OllamaProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: OLLAMA_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn run_turn(
        &self,
        req: TurnRequest,
        execute_tool: &mut dyn FnMut(ToolInvocation) -> ToolResult,
        emit: &mut dyn FnMut(TurnEvent),
    ) -> Result<(), String> {
        let turn_id = req.turn_id;

        emit(TurnEvent::Started { turn_id });

        let tool = self.tool_definition();
        let tools = vec![ToolSpec::function(
            tool.name.clone(),
            tool.description.clone(),
            tool.parameters.clone(),
        )];
        let mut wire = build_wire_messages(&req);
        let mut usage = TokenUsage::default();
        let mut call_counter: u64 = 0;

        loop {
            let request = ChatRequest::new(self.model_id.clone(), wire.clone(), tools.clone());
            let response = match self.transport.chat(&request) {
                Ok(response) => response,
                Err(error) => {
                    emit(TurnEvent::Failed {
                        turn_id,
                        error: format!("Ollama request failed: {error}"),
                    });
                    return Ok(());
                }
            };

            usage.add(TokenUsage::new(
                response.prompt_eval_count,
                response.eval_count,
            ));

            let calls = response.message.tool_calls().to_vec();
            if calls.is_empty() {
                emit(TurnEvent::Completed {
                    turn_id,
                    text: response.message.content.clone(),
                    usage,
                });
                return Ok(());
            }

            wire.push(ChatMessage::assistant_tool_calls(calls.clone()));

            for call in calls {
                call_counter += 1;
                let call_id = format!("call-{call_counter}");

                let result = if call.function.name == RUN_SCRIPT_TOOL {
                    let (code, description) = parse_run_script_arguments(&call.function.arguments);
                    let invocation = ToolInvocation {
                        call_id: call_id.clone(),
                        code,
                        description,
                    };
                    emit(TurnEvent::ToolCallStarted {
                        turn_id,
                        invocation: invocation.clone(),
                    });
                    execute_tool(invocation)
                } else {
                    ToolResult::exception(
                        call_id,
                        format!(
                            "Unknown tool '{}'. The only available tool is {RUN_SCRIPT_TOOL}.",
                            call.function.name
                        ),
                    )
                };

                wire.push(ChatMessage::tool(result.payload.to_string()));
                emit(TurnEvent::ToolCallFinished { turn_id, result });
            }
        }
    }
}

fn build_wire_messages(req: &TurnRequest) -> Vec<ChatMessage> {
    let mut wire = Vec::with_capacity(req.messages.len() + 1);

    if !req.instructions.trim().is_empty() {
        wire.push(ChatMessage::system(req.instructions.clone()));
    }

    for message in &req.messages {
        match message {
            HistoryMessage::UserText { text } => wire.push(ChatMessage::user(text.clone())),
            HistoryMessage::AssistantText { text } => {
                wire.push(ChatMessage::assistant(text.clone()));
            }
            HistoryMessage::ToolCall {
                code, description, ..
            } => {
                wire.push(ChatMessage::assistant_tool_calls(vec![WireToolCall {
                    function: FunctionCall {
                        name: RUN_SCRIPT_TOOL.to_string(),
                        arguments: json!({ "code": code, "description": description }),
                    },
                }]));
            }
            HistoryMessage::ToolResult { payload, .. } => {
                wire.push(ChatMessage::tool(payload.to_string()));
            }
        }
    }

    wire
}

/// Extracts `(code, description)` from tool-call arguments. Models disagree on
/// the envelope: most send a JSON object, some send the object JSON-encoded as
/// a string. Missing fields default to empty strings.
fn parse_run_script_arguments(arguments: &Value) -> (String, String) {
    let object = match arguments {
        Value::String(raw) => serde_json::from_str::<Value>(raw).unwrap_or(Value::Null),
        other => other.clone(),
    };

    let field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    (field("code"), field("description"))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    struct FakeChatTransport {
        requests: Mutex<Vec<ChatRequest>>,
        outcomes: Mutex<VecDeque<Result<ChatResponse, OllamaApiError>>>,
    }

    impl FakeChatTransport {
        fn scripted(
            outcomes: impl IntoIterator<Item = Result<ChatResponse, OllamaApiError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                outcomes: Mutex::new(outcomes.into_iter().collect()),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    impl ChatTransport for FakeChatTransport {
        fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, OllamaApiError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            self.outcomes
                .lock()
                .expect("outcomes lock")
                .pop_front()
                .expect("a scripted outcome should exist for every request")
        }
    }

    fn text_response(content: &str, prompt_tokens: u64, completion_tokens: u64) -> ChatResponse {
        decode_response(serde_json::json!({
            "message": { "role": "assistant", "content": content },
            "done": true,
            "prompt_eval_count": prompt_tokens,
            "eval_count": completion_tokens
        }))
    }

    fn tool_call_response(arguments: Value, prompt_tokens: u64, completion_tokens: u64) -> ChatResponse {
        decode_response(serde_json::json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    { "function": { "name": "run_script", "arguments": arguments } }
                ]
            },
            "done": true,
            "prompt_eval_count": prompt_tokens,
            "eval_count": completion_tokens
        }))
    }

    fn decode_response(value: Value) -> ChatResponse {
        serde_json::from_value(value).expect("fake response decodes")
    }

    fn request(messages: Vec<HistoryMessage>) -> TurnRequest {
        TurnRequest {
            turn_id: 9,
            messages,
            instructions: "system instructions".to_string(),
        }
    }

    fn run(
        provider: &OllamaProvider,
        req: TurnRequest,
        execute_tool: &mut dyn FnMut(ToolInvocation) -> ToolResult,
    ) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        provider
            .run_turn(req, execute_tool, &mut |event| events.push(event))
            .expect("turn should not return provider-level failure");
        events
    }

    #[test]
    fn profile_reports_ollama_provider_id_and_model() {
        let transport = FakeChatTransport::scripted([]);
        let provider = OllamaProvider::with_transport_for_tests("qwen3-coder:30b", transport);

        let profile = provider.profile();
        assert_eq!(profile.provider_id, OLLAMA_PROVIDER_ID);
        assert_eq!(profile.model_id, "qwen3-coder:30b");
    }

    #[test]
    fn text_only_turn_completes_with_usage() {
        let transport = FakeChatTransport::scripted([Ok(text_response("All done.", 120, 30))]);
        let provider = OllamaProvider::with_transport_for_tests(
            "qwen3-coder:30b",
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
        );

        let events = run(
            &provider,
            request(vec![HistoryMessage::UserText {
                text: "say hi".to_string(),
            }]),
            &mut |_invocation| panic!("no tool call expected"),
        );

        assert!(matches!(events.first(), Some(TurnEvent::Started { turn_id: 9 })));
        assert_eq!(
            events.last(),
            Some(&TurnEvent::Completed {
                turn_id: 9,
                text: "All done.".to_string(),
                usage: TokenUsage::new(120, 30),
            })
        );

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].messages[0].role, "system");
        assert_eq!(sent[0].messages[1].content, "say hi");
        assert_eq!(sent[0].tools[0].function.name, RUN_SCRIPT_TOOL);
        assert!(!sent[0].stream);
    }

    #[test]
    fn tool_loop_executes_then_feeds_result_back_and_sums_usage() {
        let transport = FakeChatTransport::scripted([
            Ok(tool_call_response(
                serde_json::json!({ "code": "capture(1 + 1)", "description": "Adding" }),
                100,
                20,
            )),
            Ok(text_response("The answer is 2.", 150, 10)),
        ]);
        let provider = OllamaProvider::with_transport_for_tests(
            "qwen3-coder:30b",
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
        );

        let mut executed = Vec::new();
        let events = run(
            &provider,
            request(vec![HistoryMessage::UserText {
                text: "add one and one".to_string(),
            }]),
            &mut |invocation| {
                executed.push(invocation.clone());
                ToolResult::captured(invocation.call_id, vec![serde_json::json!(2)])
            },
        );

        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].call_id, "call-1");
        assert_eq!(executed[0].code, "capture(1 + 1)");
        assert_eq!(executed[0].description, "Adding");

        assert!(matches!(events[0], TurnEvent::Started { .. }));
        assert!(matches!(events[1], TurnEvent::ToolCallStarted { .. }));
        assert!(
            matches!(&events[2], TurnEvent::ToolCallFinished { result, .. } if !result.is_exception)
        );
        assert_eq!(
            events.last(),
            Some(&TurnEvent::Completed {
                turn_id: 9,
                text: "The answer is 2.".to_string(),
                usage: TokenUsage::new(250, 30),
            })
        );

        // The second request must replay the tool exchange before resuming.
        let sent = transport.requests();
        assert_eq!(sent.len(), 2);
        let replay = &sent[1].messages;
        let assistant_call = replay
            .iter()
            .find(|message| !message.tool_calls().is_empty())
            .expect("assistant tool-call replay exists");
        assert_eq!(assistant_call.tool_calls()[0].function.name, RUN_SCRIPT_TOOL);
        let tool_result = replay
            .iter()
            .find(|message| message.role == "tool")
            .expect("tool result message exists");
        assert_eq!(tool_result.content, "[2]");
    }

    #[test]
    fn string_encoded_arguments_are_accepted() {
        let transport = FakeChatTransport::scripted([
            Ok(tool_call_response(
                Value::String(r#"{"code":"capture(7)","description":"Lucky"}"#.to_string()),
                0,
                0,
            )),
            Ok(text_response("Seven.", 0, 0)),
        ]);
        let provider = OllamaProvider::with_transport_for_tests(
            "qwen3-coder:30b",
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
        );

        let mut executed = Vec::new();
        run(
            &provider,
            request(Vec::new()),
            &mut |invocation| {
                executed.push(invocation.clone());
                ToolResult::captured(invocation.call_id, Vec::new())
            },
        );

        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].code, "capture(7)");
        assert_eq!(executed[0].description, "Lucky");
    }

    #[test]
    fn unknown_tool_name_is_answered_without_executing() {
        let response = decode_response(serde_json::json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    { "function": { "name": "run_python", "arguments": { "code": "1" } } }
                ]
            },
            "done": true
        }));
        let transport =
            FakeChatTransport::scripted([Ok(response), Ok(text_response("Sorry.", 0, 0))]);
        let provider = OllamaProvider::with_transport_for_tests(
            "qwen3-coder:30b",
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
        );

        let events = run(&provider, request(Vec::new()), &mut |_invocation| {
            panic!("unknown tools must not execute")
        });

        let finished = events
            .iter()
            .find_map(|event| match event {
                TurnEvent::ToolCallFinished { result, .. } => Some(result.clone()),
                _ => None,
            })
            .expect("tool call finished event exists");
        assert!(finished.is_exception);
        assert!(finished.payload[0]
            .as_str()
            .is_some_and(|text| text.contains("Unknown tool 'run_python'")));
    }

    #[test]
    fn transport_error_maps_to_failed_terminal_event() {
        let transport = FakeChatTransport::scripted([Err(OllamaApiError::EmptyResponse)]);
        let provider = OllamaProvider::with_transport_for_tests(
            "qwen3-coder:30b",
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
        );

        let events = run(&provider, request(Vec::new()), &mut |_invocation| {
            panic!("no tool call expected")
        });

        assert!(matches!(events.first(), Some(TurnEvent::Started { turn_id: 9 })));
        assert!(matches!(
            events.last(),
            Some(TurnEvent::Failed { turn_id: 9, error }) if error.contains("Ollama request failed")
        ));
    }

    #[test]
    fn history_tool_exchanges_are_replayed_in_wire_order() {
        let transport = FakeChatTransport::scripted([Ok(text_response("ok", 0, 0))]);
        let provider = OllamaProvider::with_transport_for_tests(
            "qwen3-coder:30b",
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
        );

        run(
            &provider,
            request(vec![
                HistoryMessage::UserText {
                    text: "bind x".to_string(),
                },
                HistoryMessage::ToolCall {
                    call_id: "call-1".to_string(),
                    code: "let x = 2;".to_string(),
                    description: "Binding x".to_string(),
                },
                HistoryMessage::ToolResult {
                    call_id: "call-1".to_string(),
                    payload: serde_json::json!(["Code block didn't capture() any data"]),
                    is_exception: false,
                },
                HistoryMessage::AssistantText {
                    text: "Bound.".to_string(),
                },
                HistoryMessage::UserText {
                    text: "now capture x".to_string(),
                },
            ]),
            &mut |_invocation| panic!("no tool call expected"),
        );

        let sent = transport.requests();
        let roles: Vec<_> = sent[0]
            .messages
            .iter()
            .map(|message| message.role.as_str())
            .collect();
        assert_eq!(
            roles,
            vec!["system", "user", "assistant", "tool", "assistant", "user"]
        );
        assert_eq!(sent[0].messages[2].tool_calls()[0].function.name, RUN_SCRIPT_TOOL);
    }
}
