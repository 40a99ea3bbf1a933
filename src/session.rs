//! Conversation session state.
//!
//! One [`Session`] holds everything a conversation owns: the display
//! transcript, the model-facing history replayed on every turn, the running
//! token total, and the turn state machine (`Idle` -> `TurnInFlight` -> `Idle`).
//! Drivers never mutate any of this directly; they call [`Session::begin_turn`]
//! and feed the resulting [`TurnEvent`]s back through
//! [`Session::apply_event`].
//!
//! Turn output is staged in pending memory and committed only when the turn
//! completes. A failed turn discards the staged entries, including the
//! submitted user message, so the model-facing history is exactly what it was
//! before the attempt.

use model_provider::{HistoryMessage, ToolResult, TurnEvent, TurnId};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    TurnInFlight { turn_id: TurnId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
    Error,
}

/// One rendered line of conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub tokens: Option<u64>,
    pub timestamp: OffsetDateTime,
}

/// One tool invocation as shown to the user: the code, its description, and
/// (once finished) a preview of the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub code: String,
    pub description: String,
    pub result: Option<String>,
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Message(Message),
    Code(CodeBlock),
}

#[derive(Debug, Clone, PartialEq)]
struct PendingTurn {
    turn_id: TurnId,
    entries: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    mode: Mode,
    transcript: Vec<TranscriptEntry>,
    conversation: Vec<HistoryMessage>,
    pending_turn: Option<PendingTurn>,
    total_tokens: u64,
    next_turn_id: TurnId,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            transcript: Vec::new(),
            conversation: Vec::new(),
            pending_turn: None,
            total_tokens: 0,
            next_turn_id: 1,
        }
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn is_turn_in_flight(&self) -> bool {
        matches!(self.mode, Mode::TurnInFlight { .. })
    }

    /// Display-facing transcript, in append order.
    #[must_use]
    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Model-facing conversation messages committed so far.
    #[must_use]
    pub fn conversation_messages(&self) -> &[HistoryMessage] {
        &self.conversation
    }

    /// Cumulative token usage. Only ever increases, except on [`Session::clear`].
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Appends a system line (banner, notices) to the transcript.
    pub fn push_system(&mut self, text: impl Into<String>) {
        self.push_message(Role::System, text.into(), None);
    }

    /// Starts a turn for `prompt`: records the user line, stages the user
    /// history entry, and returns the turn id plus the full message history to
    /// send (committed conversation + the new prompt).
    ///
    /// Must not be called while a turn is in flight.
    pub fn begin_turn(&mut self, prompt: &str) -> (TurnId, Vec<HistoryMessage>) {
        debug_assert!(
            !self.is_turn_in_flight(),
            "begin_turn requires an idle session"
        );

        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;

        self.push_message(Role::User, prompt.to_string(), None);

        let user_entry = HistoryMessage::UserText {
            text: prompt.to_string(),
        };
        let mut messages = self.conversation.clone();
        messages.push(user_entry.clone());

        self.pending_turn = Some(PendingTurn {
            turn_id,
            entries: vec![user_entry],
        });
        self.mode = Mode::TurnInFlight { turn_id };

        (turn_id, messages)
    }

    /// Applies one turn event. Events for a turn other than the one in flight
    /// are ignored.
    pub fn apply_event(&mut self, event: &TurnEvent) {
        if !self.is_active_turn(event.turn_id()) {
            return;
        }

        match event {
            TurnEvent::Started { .. } => {}
            TurnEvent::ToolCallStarted { invocation, .. } => {
                self.transcript.push(TranscriptEntry::Code(CodeBlock {
                    code: invocation.code.clone(),
                    description: invocation.description.clone(),
                    result: None,
                    timestamp: now(),
                }));
                self.stage(HistoryMessage::ToolCall {
                    call_id: invocation.call_id.clone(),
                    code: invocation.code.clone(),
                    description: invocation.description.clone(),
                });
            }
            TurnEvent::ToolCallFinished { result, .. } => {
                self.attach_code_result(result);
                self.stage(HistoryMessage::ToolResult {
                    call_id: result.call_id.clone(),
                    payload: result.payload.clone(),
                    is_exception: result.is_exception,
                });
            }
            TurnEvent::Completed { text, usage, .. } => {
                self.total_tokens += usage.total();

                let text = text.trim();
                if !text.is_empty() {
                    self.push_message(Role::Assistant, text.to_string(), Some(usage.total()));
                    self.stage(HistoryMessage::AssistantText {
                        text: text.to_string(),
                    });
                }

                self.commit_pending_turn(event.turn_id());
                self.mode = Mode::Idle;
            }
            TurnEvent::Failed { error, .. } => {
                self.pending_turn = None;
                self.push_message(Role::Error, error.clone(), None);
                self.mode = Mode::Idle;
            }
        }
    }

    /// Discards everything: transcript, model-facing history, token total.
    /// The caller is responsible for resetting the script environment.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.conversation.clear();
        self.pending_turn = None;
        self.total_tokens = 0;
    }

    fn push_message(&mut self, role: Role, text: String, tokens: Option<u64>) {
        self.transcript.push(TranscriptEntry::Message(Message {
            role,
            text,
            tokens,
            timestamp: now(),
        }));
    }

    fn stage(&mut self, entry: HistoryMessage) {
        if let Some(pending) = self.pending_turn.as_mut() {
            pending.entries.push(entry);
        }
    }

    fn commit_pending_turn(&mut self, turn_id: TurnId) {
        if let Some(pending) = self.pending_turn.take() {
            debug_assert_eq!(
                pending.turn_id, turn_id,
                "pending turn memory belongs to turn {}, cannot commit turn {turn_id}",
                pending.turn_id
            );
            self.conversation.extend(pending.entries);
        }
    }

    fn attach_code_result(&mut self, result: &ToolResult) {
        let preview = result.payload.to_string();
        for entry in self.transcript.iter_mut().rev() {
            if let TranscriptEntry::Code(block) = entry {
                if block.result.is_none() {
                    block.result = Some(preview);
                }
                return;
            }
        }
    }

    fn is_active_turn(&self, turn_id: TurnId) -> bool {
        matches!(self.mode, Mode::TurnInFlight { turn_id: active } if active == turn_id)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
