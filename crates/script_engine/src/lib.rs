//! Persistent script execution for one agent session.
//!
//! The model hands scripts to the host through its single tool; this crate
//! runs them. State lives in [`ScriptEnvironment`] (variable scope plus
//! accumulated function definitions) and survives across invocations, so a
//! helper defined in one turn is callable in the next. [`ScriptBridge`]
//! executes one submission at a time: it re-injects the `capture` primitive,
//! collects captured values into a fresh per-invocation buffer, and traps any
//! fault into a rendered trace instead of letting it propagate.
//!
//! Executed code is trusted exactly as much as the hosting process. The
//! engine deliberately exposes unrestricted host bindings (`shell`,
//! `read_file`, `write_file`) and applies no timeout or resource limit.

use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::{fs, path::Path};

use rhai::{Dynamic, Engine, EvalAltResult, OptimizationLevel, Scope, AST};
use serde_json::Value;

/// Name of the capture primitive injected into every invocation.
pub const CAPTURE_FN: &str = "capture";

/// Sole entry of a successful result whose return buffer ended up empty.
pub const EMPTY_CAPTURE_SENTINEL: &str = "Code block didn't capture() any data";

/// Prefix of every rendered fault trace.
pub const EXCEPTION_PREFIX: &str = "Exception raised:\n";

const SHELL_MAX_OUTPUT_BYTES: usize = 100 * 1024;

/// Typed result of one script invocation. No raised-error machinery crosses
/// this boundary: success carries the ordered captured values, failure carries
/// the rendered trace.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    /// Values handed back through `capture`, in call order. Never empty: an
    /// empty buffer is replaced by [`EMPTY_CAPTURE_SENTINEL`].
    Captured(Vec<Value>),
    /// A fault was raised while executing the submission.
    Exception { trace: String },
}

impl ScriptOutcome {
    /// Returns true when the invocation faulted.
    #[must_use]
    pub fn is_exception(&self) -> bool {
        matches!(self, Self::Exception { .. })
    }
}

/// Session-scoped name bindings: a variable scope and the function definitions
/// accumulated from every submission so far. Mutated only by executing code;
/// reset only when the owning session is cleared.
pub struct ScriptEnvironment {
    scope: Scope<'static>,
    functions: AST,
}

impl ScriptEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scope: Scope::new(),
            functions: AST::empty(),
        }
    }
}

impl Default for ScriptEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one submission against a [`ScriptEnvironment`] and produces a
/// [`ScriptOutcome`]. Owns the engine and the per-invocation return buffer.
pub struct ScriptBridge {
    engine: Engine,
    captures: Arc<Mutex<Vec<Dynamic>>>,
}

impl ScriptBridge {
    #[must_use]
    pub fn new() -> Self {
        let mut engine = Engine::new();

        // Each submission is evaluated once; optimization would fold away
        // top-level bindings that later invocations still need.
        engine.set_optimization_level(OptimizationLevel::None);

        // Script print/debug output goes to the process log, never to the
        // model: only captured values cross back.
        engine.on_print(|text| tracing::debug!("{text}"));
        engine.on_debug(|text, _source, pos| {
            tracing::debug!(position = %pos, "{text}");
        });

        register_host_bindings(&mut engine);

        Self {
            engine,
            captures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Executes `code` against `env`, synchronously and to completion.
    ///
    /// Bindings established before a faulting statement persist in `env`, so
    /// the model can inspect intermediate state and retry.
    pub fn execute(&mut self, env: &mut ScriptEnvironment, code: &str) -> ScriptOutcome {
        self.inject_capture();
        lock_unpoisoned(&self.captures).clear();

        let submission = match self.engine.compile(code) {
            Ok(ast) => ast,
            Err(error) => {
                return ScriptOutcome::Exception {
                    trace: format!("{EXCEPTION_PREFIX}{error}"),
                };
            }
        };

        // Functions from prior submissions stay callable; new definitions
        // shadow old ones of the same name and arity.
        let combined = env.functions.merge(&submission);
        let evaluated = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut env.scope, &combined);
        env.functions = combined.clone_functions_only();

        match evaluated {
            Ok(_) => {
                let captured = self.drain_captures();
                tracing::debug!(count = captured.len(), "tool result");
                if captured.is_empty() {
                    ScriptOutcome::Captured(vec![Value::String(
                        EMPTY_CAPTURE_SENTINEL.to_string(),
                    )])
                } else {
                    ScriptOutcome::Captured(captured)
                }
            }
            Err(error) => {
                let trace = format!("{EXCEPTION_PREFIX}{error}");
                tracing::debug!(%error, "tool fault");
                ScriptOutcome::Exception { trace }
            }
        }
    }

    /// Redeclares the capture primitive, shadowing any prior binding of the
    /// same name. Idempotent across invocations.
    fn inject_capture(&mut self) {
        let captures = Arc::clone(&self.captures);
        self.engine.register_fn(CAPTURE_FN, move |value: Dynamic| {
            tracing::debug!(value = %value, "capture");
            lock_unpoisoned(&captures).push(value);
        });
    }

    fn drain_captures(&self) -> Vec<Value> {
        lock_unpoisoned(&self.captures)
            .drain(..)
            .map(|value| {
                rhai::serde::from_dynamic::<Value>(&value)
                    .unwrap_or_else(|_| Value::String(value.to_string()))
            })
            .collect()
    }
}

impl Default for ScriptBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// The narrow executor seam the session loop talks to: one bridge, one
/// environment, `submit(code)` in, typed outcome out.
pub struct ScriptExecutor {
    bridge: ScriptBridge,
    environment: ScriptEnvironment,
}

impl ScriptExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bridge: ScriptBridge::new(),
            environment: ScriptEnvironment::new(),
        }
    }

    /// Runs one submission against the session environment.
    pub fn submit(&mut self, code: &str) -> ScriptOutcome {
        self.bridge.execute(&mut self.environment, code)
    }

    /// Discards every binding. Used when the session is cleared.
    pub fn reset(&mut self) {
        self.environment = ScriptEnvironment::new();
    }
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn register_host_bindings(engine: &mut Engine) {
    engine.register_fn("shell", shell);
    engine.register_fn("read_file", host_read_file);
    engine.register_fn("write_file", host_write_file);
}

/// Runs a command through `bash -lc` and returns status, stdout and stderr as
/// one text block. Runs to completion: no timeout is applied at this layer.
fn shell(command: &str) -> Result<String, Box<EvalAltResult>> {
    let output = Command::new("bash")
        .arg("-lc")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|error| format!("Failed to launch shell command: {error}"))?;

    let content = format!(
        "status: {}\nstdout:\n{}\nstderr:\n{}",
        format_exit_status(output.status),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    Ok(truncate_to_byte_limit(content, SHELL_MAX_OUTPUT_BYTES))
}

fn host_read_file(path: &str) -> Result<String, Box<EvalAltResult>> {
    fs::read_to_string(path)
        .map_err(|error| format!("Failed to read file {path}: {error}").into())
}

fn host_write_file(path: &str, content: &str) -> Result<(), Box<EvalAltResult>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|error| {
                format!("Failed to create parent directories {}: {error}", parent.display())
            })?;
        }
    }

    fs::write(path, content)
        .map_err(|error| format!("Failed to write file {path}: {error}").into())
}

fn format_exit_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit_code={code}"),
        None => "exit_code=terminated_by_signal".to_string(),
    }
}

fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes.min(content.len());
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = content[..cutoff].to_string();
    truncated.push_str("\n[truncated]");
    truncated
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
