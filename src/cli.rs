//! Command-line interface.

use clap::Parser;

use crate::config::{DEFAULT_API_URL, DEFAULT_MODEL};

/// Minimalist coding agent with a single run_script tool.
///
/// With PROMPT given, runs that prompt once and exits. Otherwise starts an
/// interactive session: a line REPL by default, or the terminal UI with
/// `--tui`.
#[derive(Debug, Parser)]
#[command(name = "incant", version, about)]
pub struct Cli {
    /// One-shot prompt; omit to start interactive mode
    pub prompt: Option<String>,

    /// Ollama API URL
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Model to use
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Start the terminal UI instead of the line REPL
    #[arg(long)]
    pub tui: bool,

    /// Enable debug logging (tool calls, captures, results)
    #[arg(long)]
    pub debug: bool,

    /// Disable timestamps on messages
    #[arg(long)]
    pub no_timestamp: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn defaults_match_config() {
        let cli = Cli::parse_from(["incant"]);

        assert_eq!(cli.prompt, None);
        assert_eq!(cli.api_url, "http://localhost:11434");
        assert_eq!(cli.model, "qwen3-coder:30b");
        assert!(!cli.tui);
        assert!(!cli.debug);
        assert!(!cli.no_timestamp);
    }

    #[test]
    fn positional_prompt_and_flags_parse() {
        let cli = Cli::parse_from([
            "incant",
            "--api-url",
            "http://cadumac:11434",
            "--model",
            "llama3.2:latest",
            "--debug",
            "count the files here",
        ]);

        assert_eq!(cli.prompt.as_deref(), Some("count the files here"));
        assert_eq!(cli.api_url, "http://cadumac:11434");
        assert_eq!(cli.model, "llama3.2:latest");
        assert!(cli.debug);
    }
}
