//! Line-mode presentation: role-styled output with a timestamp and running
//! token-count prefix. Consumes session events; has no write access back into
//! the session.

use std::io::{self, Write};

use time::OffsetDateTime;

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const BOLD_MAGENTA: &str = "\x1b[1;35m";
const BOLD_RED: &str = "\x1b[1;31m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";

/// Formats a token count as fixed-width `000.0k`.
pub fn format_tokens(count: u64) -> String {
    format!("{:05.1}k", count as f64 / 1000.0)
}

/// Formats a timestamp as `hh:mm:ss` (used by the compact TUI transcript).
pub fn format_clock(timestamp: OffsetDateTime) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second()
    )
}

/// Formats a timestamp as `dd/mm/yyyy hh:mm:ss`.
pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    format!(
        "{:02}/{:02}/{:04} {:02}:{:02}:{:02}",
        timestamp.day(),
        u8::from(timestamp.month()),
        timestamp.year(),
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second()
    )
}

pub struct Printer {
    show_timestamps: bool,
}

impl Printer {
    #[must_use]
    pub fn new(show_timestamps: bool) -> Self {
        Self { show_timestamps }
    }

    fn prefix(&self, total_tokens: u64) -> String {
        let mut parts = Vec::new();
        if self.show_timestamps {
            parts.push(format!("[{}]", format_timestamp(now())));
        }
        parts.push(format!("[{}]", format_tokens(total_tokens)));
        format!("{DIM}{}{RESET} ", parts.join(" "))
    }

    /// Prints the input prompt without a trailing newline and flushes.
    pub fn prompt(&self, total_tokens: u64) {
        print!("{}{BOLD_GREEN}USER >>{RESET} ", self.prefix(total_tokens));
        let _ = io::stdout().flush();
    }

    /// Echoes a user prompt (used by one-shot mode, where nothing was typed
    /// at an interactive prompt).
    pub fn user(&self, text: &str, total_tokens: u64) {
        println!(
            "{}{BOLD_GREEN}USER >>{RESET} {text}",
            self.prefix(total_tokens)
        );
    }

    pub fn assistant(&self, text: &str, total_tokens: u64) {
        println!();
        println!("{}{BOLD_MAGENTA}Assistant:{RESET}", self.prefix(total_tokens));
        println!();
        println!("{text}");
        println!();
    }

    pub fn system(&self, text: &str, total_tokens: u64) {
        println!("{}{text}", self.prefix(total_tokens));
    }

    pub fn error(&self, text: &str, total_tokens: u64) {
        println!(
            "{}{BOLD_RED}Error:{RESET} {RED}{text}{RESET}",
            self.prefix(total_tokens)
        );
    }

    /// Renders one tool invocation as a bordered code panel.
    pub fn code(&self, code: &str, description: &str, total_tokens: u64) {
        println!(
            "{}{YELLOW}\u{25cf} {description}{RESET}",
            self.prefix(total_tokens)
        );
        for line in code.lines() {
            println!("  {DIM}\u{2502}{RESET} {CYAN}{line}{RESET}");
        }
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
