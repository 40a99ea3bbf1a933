//! Deterministic mock implementation of the shared `model_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing: each turn optionally
//! issues one scripted `run_script` invocation (executed through the real host
//! callback) before answering with a fixed reply.

use std::sync::{Mutex, MutexGuard};

use model_provider::{
    ProviderProfile, TokenUsage, ToolInvocation, ToolResult, TurnEvent, TurnProvider, TurnRequest,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// One scripted conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct MockTurn {
    tool: Option<(String, String)>,
    reply: String,
    usage: TokenUsage,
}

impl MockTurn {
    /// A turn that answers directly, without touching the tool.
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            tool: None,
            reply: text.into(),
            usage: TokenUsage::new(48, 16),
        }
    }

    /// A turn that first runs `code` through the host tool, then answers.
    #[must_use]
    pub fn scripted(
        code: impl Into<String>,
        description: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            tool: Some((code.into(), description.into())),
            reply: text.into(),
            usage: TokenUsage::new(96, 32),
        }
    }

    #[must_use]
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = TokenUsage::new(prompt_tokens, completion_tokens);
        self
    }
}

/// Deterministic mock provider used by `incant` tests and offline runs.
#[derive(Debug)]
pub struct MockProvider {
    turns: Vec<MockTurn>,
    cursor: Mutex<usize>,
}

impl MockProvider {
    /// Creates a mock provider that replays `turns` in order. Once exhausted,
    /// the final turn repeats.
    #[must_use]
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            turns,
            cursor: Mutex::new(0),
        }
    }

    fn next_turn(&self) -> MockTurn {
        let mut cursor = lock_unpoisoned(&self.cursor);
        let turn = match self.turns.get(*cursor).or_else(|| self.turns.last()) {
            Some(turn) => turn.clone(),
            None => MockTurn::reply("Mock provider has no scripted turns."),
        };
        *cursor += 1;
        turn
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(vec![
            MockTurn::scripted(
                "let answer = 6 * 7; capture(answer);",
                "Computing the canonical answer",
                "I computed `6 * 7` in the session environment: **42**.",
            ),
            MockTurn::scripted(
                "capture(answer + 1);",
                "Reusing the binding from the previous turn",
                "The binding survived the turn boundary: `answer + 1` is **43**.",
            ),
            MockTurn::reply(
                "This is the deterministic mock model. Set `INCANT_PROVIDER=ollama` \
                 (the default) to talk to a real server.",
            ),
        ])
    }
}

impl TurnProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "mock".to_string(),
        }
    }

    fn run_turn(
        &self,
        req: TurnRequest,
        execute_tool: &mut dyn FnMut(ToolInvocation) -> ToolResult,
        emit: &mut dyn FnMut(TurnEvent),
    ) -> Result<(), String> {
        let turn_id = req.turn_id;
        let turn = self.next_turn();

        emit(TurnEvent::Started { turn_id });

        if let Some((code, description)) = turn.tool {
            let invocation = ToolInvocation {
                call_id: format!("mock-call-{turn_id}"),
                code,
                description,
            };
            emit(TurnEvent::ToolCallStarted {
                turn_id,
                invocation: invocation.clone(),
            });
            let result = execute_tool(invocation);
            emit(TurnEvent::ToolCallFinished { turn_id, result });
        }

        emit(TurnEvent::Completed {
            turn_id,
            text: turn.reply,
            usage: turn.usage,
        });

        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(provider: &MockProvider, turn_id: u64) -> (Vec<TurnEvent>, Vec<ToolInvocation>) {
        let mut events = Vec::new();
        let mut executed = Vec::new();

        provider
            .run_turn(
                TurnRequest {
                    turn_id,
                    messages: Vec::new(),
                    instructions: String::new(),
                },
                &mut |invocation| {
                    executed.push(invocation.clone());
                    ToolResult::captured(invocation.call_id, Vec::new())
                },
                &mut |event| events.push(event),
            )
            .expect("mock provider never fails");

        (events, executed)
    }

    #[test]
    fn scripted_turn_runs_tool_before_replying() {
        let provider = MockProvider::new(vec![MockTurn::scripted(
            "capture(1)",
            "Capture one",
            "Done.",
        )]);

        let (events, executed) = run(&provider, 1);

        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].code, "capture(1)");
        assert!(matches!(events[0], TurnEvent::Started { turn_id: 1 }));
        assert!(matches!(events[1], TurnEvent::ToolCallStarted { .. }));
        assert!(matches!(events[2], TurnEvent::ToolCallFinished { .. }));
        assert!(matches!(
            events.last(),
            Some(TurnEvent::Completed { text, .. }) if text == "Done."
        ));
    }

    #[test]
    fn turns_advance_then_final_turn_repeats() {
        let provider = MockProvider::new(vec![
            MockTurn::reply("first"),
            MockTurn::reply("second"),
        ]);

        for expected in ["first", "second", "second"] {
            let (events, executed) = run(&provider, 7);
            assert!(executed.is_empty());
            assert!(matches!(
                events.last(),
                Some(TurnEvent::Completed { text, .. }) if text == expected
            ));
        }
    }

    #[test]
    fn reply_turn_reports_configured_usage() {
        let provider = MockProvider::new(vec![MockTurn::reply("hi").with_usage(10, 4)]);

        let (events, _executed) = run(&provider, 2);

        assert!(matches!(
            events.last(),
            Some(TurnEvent::Completed { usage, .. }) if usage.total() == 14
        ));
    }
}
