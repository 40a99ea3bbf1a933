//! incant: a coding agent with exactly one tool.
//!
//! The model solves tasks by writing Rhai scripts and submitting them through
//! `run_script(code, description)`. Scripts run in a persistent per-session
//! environment, hand values back through `capture()`, and hold the full
//! authority of the hosting process. Two front-ends drive the same session
//! loop: a blocking line REPL (the default) and an event-driven terminal UI
//! (`--tui`).
//!
//! ## Provider bootstrap
//!
//! Provider selection happens once at startup:
//!
//! - `INCANT_PROVIDER=ollama` (default) talks to an Ollama server. The model
//!   registry is queried before any session exists; an unreachable server or
//!   an absent model is fatal, and the absent-model error lists what the
//!   server does offer.
//! - `INCANT_PROVIDER=mock` replays deterministic scripted turns for local
//!   testing, no server required.
//!
//! Set `INCANT_SYSTEM_INSTRUCTIONS` to override the built-in system prompt.

pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod printer;
pub mod prompts;
pub mod providers;
pub mod repl;
pub mod session;
pub mod tui;
