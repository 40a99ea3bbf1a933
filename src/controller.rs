//! Background turn execution for the event-driven driver.
//!
//! [`TurnController`] is a single-slot gate: at most one turn runs at a time,
//! and a fresh submission is refused (not queued) while one is in flight. The
//! turn itself runs on a named worker thread; its [`TurnEvent`]s cross back to
//! the UI thread over an mpsc channel and are applied to the session there,
//! keeping every shared structure single-writer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use model_provider::{
    HistoryMessage, ToolInvocation, ToolResult, TurnEvent, TurnId, TurnProvider, TurnRequest,
};
use script_engine::{ScriptExecutor, ScriptOutcome};

pub const ERROR_TURN_IN_FLIGHT: &str = "Turn already in flight";

struct ActiveTurn {
    turn_id: TurnId,
    join_handle: Option<JoinHandle<()>>,
}

pub struct TurnController {
    provider: Arc<dyn TurnProvider>,
    executor: Arc<Mutex<ScriptExecutor>>,
    events: Sender<TurnEvent>,
    active_turn: Mutex<Option<ActiveTurn>>,
}

impl TurnController {
    pub fn new(
        provider: Arc<dyn TurnProvider>,
        executor: Arc<Mutex<ScriptExecutor>>,
        events: Sender<TurnEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            executor,
            events,
            active_turn: Mutex::new(None),
        })
    }

    /// Starts one turn in the background. Refuses while another is active.
    pub fn start_turn(
        self: &Arc<Self>,
        turn_id: TurnId,
        messages: Vec<HistoryMessage>,
        instructions: String,
    ) -> Result<(), String> {
        let mut active_turn = self.lock_active_turn();
        if active_turn.is_some() {
            return Err(ERROR_TURN_IN_FLIGHT.to_string());
        }

        let request = TurnRequest {
            turn_id,
            messages,
            instructions,
        };
        let controller = Arc::clone(self);
        let join_handle = thread::Builder::new()
            .name(format!("incant-turn-{turn_id}"))
            .spawn(move || controller.run_worker(request))
            .map_err(|error| format!("Failed to spawn turn worker: {error}"))?;

        *active_turn = Some(ActiveTurn {
            turn_id,
            join_handle: Some(join_handle),
        });

        Ok(())
    }

    /// True while a turn's background unit is running or its terminal event has
    /// not yet been observed by the UI thread.
    pub fn is_turn_active(&self) -> bool {
        self.lock_active_turn().is_some()
    }

    /// Frees the slot once the UI thread has processed a terminal event.
    pub fn finish_turn(&self, turn_id: TurnId) {
        let mut active_turn = self.lock_active_turn();
        let matches = active_turn
            .as_ref()
            .map(|active| active.turn_id)
            == Some(turn_id);
        if !matches {
            return;
        }

        let mut completed = match active_turn.take() {
            Some(completed) => completed,
            None => return,
        };

        if let Some(join_handle) = completed.join_handle.take() {
            if join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
    }

    fn run_worker(self: Arc<Self>, request: TurnRequest) {
        let turn_id = request.turn_id;
        let terminal_emitted = Arc::new(AtomicBool::new(false));

        let terminal_emitted_for_emit = Arc::clone(&terminal_emitted);
        let events = self.events.clone();
        let mut emit = move |event: TurnEvent| {
            if event.is_terminal() {
                terminal_emitted_for_emit.store(true, Ordering::SeqCst);
            }
            // Send failures mean the UI is gone; nothing left to notify.
            let _ = events.send(event);
        };

        let executor = Arc::clone(&self.executor);
        let mut execute_tool =
            move |invocation: ToolInvocation| execute_invocation(&executor, invocation);

        let provider = Arc::clone(&self.provider);
        let turn_outcome = catch_unwind(AssertUnwindSafe(|| {
            provider.run_turn(request, &mut execute_tool, &mut emit)
        }));

        match turn_outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => emit(TurnEvent::Failed { turn_id, error }),
            Err(_) => emit(TurnEvent::Failed {
                turn_id,
                error: "Turn provider panicked".to_string(),
            }),
        }

        if !terminal_emitted.load(Ordering::SeqCst) {
            emit(TurnEvent::Failed {
                turn_id,
                error: "Turn provider exited without terminal event".to_string(),
            });
        }
    }

    fn lock_active_turn(&self) -> MutexGuard<'_, Option<ActiveTurn>> {
        lock_unpoisoned(&self.active_turn)
    }
}

/// Runs one tool invocation against the shared executor and wraps the outcome
/// for the model. Used by both drivers; execution is serialized by the
/// executor mutex.
pub fn execute_invocation(
    executor: &Mutex<ScriptExecutor>,
    invocation: ToolInvocation,
) -> ToolResult {
    tracing::debug!(call_id = %invocation.call_id, description = %invocation.description, "tool call");

    let outcome = lock_unpoisoned(executor).submit(&invocation.code);
    match outcome {
        ScriptOutcome::Captured(values) => ToolResult::captured(invocation.call_id, values),
        ScriptOutcome::Exception { trace } => ToolResult::exception(invocation.call_id, trace),
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
