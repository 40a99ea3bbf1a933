//! Line-mode driver: a blocking prompt loop over the shared session.
//!
//! Each submission runs its whole turn synchronously on the calling thread;
//! the prompt does not return until the model's final answer (and every tool
//! invocation in between) has been rendered.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use model_provider::{ToolInvocation, TurnEvent, TurnId, TurnProvider, TurnRequest};
use script_engine::ScriptExecutor;

use crate::commands::{classify_input, Input, SlashCommand, HELP_TEXT};
use crate::controller::{execute_invocation, lock_unpoisoned};
use crate::printer::Printer;
use crate::session::Session;

pub struct LineDriver {
    session: Session,
    provider: Arc<dyn TurnProvider>,
    executor: Arc<Mutex<ScriptExecutor>>,
    printer: Printer,
    instructions: String,
}

impl LineDriver {
    pub fn new(
        session: Session,
        provider: Arc<dyn TurnProvider>,
        executor: Arc<Mutex<ScriptExecutor>>,
        printer: Printer,
        instructions: String,
    ) -> Self {
        Self {
            session,
            provider,
            executor,
            printer,
            instructions,
        }
    }

    /// Runs a single prompt and returns (one-shot mode).
    pub fn run_once(&mut self, prompt: &str) {
        self.printer.user(prompt, self.session.total_tokens());
        self.run_turn(prompt);
    }

    /// Runs the interactive prompt loop until exit input, end of input, or an
    /// interrupt signal.
    pub fn run(&mut self) -> io::Result<()> {
        let interrupted = Arc::new(AtomicBool::new(false));
        let _ = signal_hook::flag::register(
            signal_hook::consts::SIGINT,
            Arc::clone(&interrupted),
        );

        let stdin = io::stdin();
        loop {
            self.printer.prompt(self.session.total_tokens());

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => {
                    println!();
                    self.goodbye();
                    break;
                }
                Ok(_) => {}
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {
                    println!();
                    self.goodbye();
                    break;
                }
                Err(error) => return Err(error),
            }

            if interrupted.load(Ordering::SeqCst) {
                self.goodbye();
                break;
            }

            match classify_input(&line) {
                Input::Empty => {}
                Input::Exit | Input::Command(SlashCommand::Quit) => {
                    self.goodbye();
                    break;
                }
                Input::Command(SlashCommand::Help) => {
                    self.printer.system(HELP_TEXT, self.session.total_tokens());
                }
                Input::Command(SlashCommand::Clear) => {
                    self.session.clear();
                    lock_unpoisoned(&self.executor).reset();
                    self.printer
                        .system("Session cleared. Ready for input.", 0);
                }
                Input::Command(SlashCommand::Unknown(command)) => {
                    self.printer.system(
                        &format!("Unknown command: {command}"),
                        self.session.total_tokens(),
                    );
                }
                Input::Prompt(prompt) => self.run_turn(&prompt),
            }
        }

        Ok(())
    }

    /// Read access to the shared session (used by callers that render or
    /// inspect state after a step).
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn run_turn(&mut self, prompt: &str) {
        let (turn_id, messages) = self.session.begin_turn(prompt);
        let request = TurnRequest {
            turn_id,
            messages,
            instructions: self.instructions.clone(),
        };

        let provider = Arc::clone(&self.provider);
        let executor = Arc::clone(&self.executor);
        let mut execute_tool =
            move |invocation: ToolInvocation| execute_invocation(&executor, invocation);

        let session = &mut self.session;
        let printer = &self.printer;
        let mut emit = |event: TurnEvent| {
            if let TurnEvent::ToolCallStarted { invocation, .. } = &event {
                printer.code(
                    &invocation.code,
                    &invocation.description,
                    session.total_tokens(),
                );
            }

            session.apply_event(&event);

            match &event {
                TurnEvent::ToolCallFinished { result, .. } => {
                    tracing::debug!(
                        payload = %result.payload,
                        is_exception = result.is_exception,
                        "tool result"
                    );
                }
                TurnEvent::Completed { text, .. } if !text.trim().is_empty() => {
                    printer.assistant(text.trim(), session.total_tokens());
                }
                TurnEvent::Failed { error, .. } => {
                    printer.error(error, session.total_tokens());
                }
                _ => {}
            }
        };

        let outcome = provider.run_turn(request, &mut execute_tool, &mut emit);

        if let Err(error) = outcome {
            self.fail_turn(turn_id, error);
        }
        if self.session.is_turn_in_flight() {
            self.fail_turn(
                turn_id,
                "Turn provider exited without terminal event".to_string(),
            );
        }
    }

    fn fail_turn(&mut self, turn_id: TurnId, error: String) {
        if !self.session.is_turn_in_flight() {
            return;
        }

        self.session.apply_event(&TurnEvent::Failed {
            turn_id,
            error: error.clone(),
        });
        self.printer.error(&error, self.session.total_tokens());
    }

    fn goodbye(&self) {
        self.printer.system("Goodbye!", self.session.total_tokens());
    }
}
