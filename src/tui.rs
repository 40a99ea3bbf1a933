//! Event-driven terminal UI driver.
//!
//! Built on ratatui/crossterm: a scrolling transcript view above a one-line
//! input bar with a loading indicator and the running token counter. Exactly
//! one session step runs at a time as a background unit of work (see
//! [`TurnController`]); the input surface stays responsive while a turn is in
//! flight, and fresh submissions are refused with a visible notice rather
//! than queued or dropped.

use std::io;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use model_provider::TurnEvent;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use script_engine::ScriptExecutor;

use crate::commands::{classify_input, Input, SlashCommand, HELP_TEXT};
use crate::controller::{lock_unpoisoned, TurnController};
use crate::printer::{format_clock, format_tokens};
use crate::session::{Role, Session, TranscriptEntry};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const RESULT_PREVIEW_MAX_CHARS: usize = 500;
const SCROLL_STEP: u16 = 5;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct InputHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
    draft: Option<String>,
}

impl InputHistory {
    fn record_entry(&mut self, text: String) {
        self.entries.push(text);
        self.cursor = None;
        self.draft = None;
    }

    fn reset_navigation(&mut self) {
        self.cursor = None;
        self.draft = None;
    }

    fn previous(&mut self, current_input: &str) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }

        if self.cursor.is_some_and(|index| index >= self.entries.len()) {
            self.cursor = None;
        }

        if self.cursor.is_none() {
            self.draft = Some(current_input.to_string());
        }

        let new_cursor = match self.cursor {
            Some(index) if index > 0 => index - 1,
            Some(index) => index,
            None => self.entries.len() - 1,
        };

        self.cursor = Some(new_cursor);
        Some(self.entries[new_cursor].clone())
    }

    fn next(&mut self) -> Option<String> {
        let current = self.cursor?;

        if current + 1 >= self.entries.len() {
            self.cursor = None;
            return Some(self.draft.take().unwrap_or_default());
        }

        let next = current + 1;
        self.cursor = Some(next);
        Some(self.entries[next].clone())
    }
}

pub struct TuiDriver {
    session: Session,
    controller: Arc<TurnController>,
    events: Receiver<TurnEvent>,
    executor: Arc<Mutex<ScriptExecutor>>,
    instructions: String,
    input: String,
    history: InputHistory,
    scroll_from_bottom: u16,
    should_exit: bool,
}

impl TuiDriver {
    pub fn new(
        session: Session,
        controller: Arc<TurnController>,
        events: Receiver<TurnEvent>,
        executor: Arc<Mutex<ScriptExecutor>>,
        instructions: String,
    ) -> Self {
        Self {
            session,
            controller,
            events,
            executor,
            instructions,
            input: String::new(),
            history: InputHistory::default(),
            scroll_from_bottom: 0,
            should_exit: false,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        let mut terminal = init_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(terminal)?;
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while !self.should_exit {
            self.drain_turn_events();
            terminal.draw(|frame| self.draw(frame))?;

            if event::poll(POLL_INTERVAL)? {
                match event::read()? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key),
                    _ => {}
                }
            }
        }

        Ok(())
    }

    fn drain_turn_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if event.is_terminal() {
                self.controller.finish_turn(event.turn_id());
            }
            self.session.apply_event(&event);
            self.scroll_from_bottom = 0;
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.should_exit = true,
                KeyCode::Char('l') => self.clear_session(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => {
                self.input.pop();
                self.history.reset_navigation();
            }
            KeyCode::Esc => {
                self.input.clear();
                self.history.reset_navigation();
            }
            KeyCode::Up => {
                if let Some(previous) = self.history.previous(&self.input) {
                    self.input = previous;
                }
            }
            KeyCode::Down => {
                if let Some(next) = self.history.next() {
                    self.input = next;
                }
            }
            KeyCode::PageUp => {
                self.scroll_from_bottom = self.scroll_from_bottom.saturating_add(SCROLL_STEP);
            }
            KeyCode::PageDown => {
                self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(SCROLL_STEP);
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                self.history.reset_navigation();
            }
            _ => {}
        }
    }

    fn submit(&mut self) {
        let line = std::mem::take(&mut self.input);

        match classify_input(&line) {
            Input::Empty => {}
            Input::Exit | Input::Command(SlashCommand::Quit) => self.should_exit = true,
            Input::Command(SlashCommand::Help) => self.session.push_system(HELP_TEXT),
            Input::Command(SlashCommand::Clear) => self.clear_session(),
            Input::Command(SlashCommand::Unknown(command)) => {
                self.session.push_system(format!("Unknown command: {command}"));
            }
            Input::Prompt(prompt) => self.submit_prompt(prompt),
        }
    }

    fn submit_prompt(&mut self, prompt: String) {
        if self.session.is_turn_in_flight() || self.controller.is_turn_active() {
            self.session
                .push_system("A turn is already in flight. Wait for it to finish.");
            return;
        }

        self.history.record_entry(prompt.clone());

        let (turn_id, messages) = self.session.begin_turn(&prompt);
        if let Err(error) =
            self.controller
                .start_turn(turn_id, messages, self.instructions.clone())
        {
            self.session
                .apply_event(&TurnEvent::Failed { turn_id, error });
        }

        self.scroll_from_bottom = 0;
    }

    fn clear_session(&mut self) {
        if self.session.is_turn_in_flight() {
            self.session
                .push_system("Finish the current turn before clearing.");
            return;
        }

        self.session.clear();
        lock_unpoisoned(&self.executor).reset();
        self.session.push_system("Cleared. Ready for input.");
        self.scroll_from_bottom = 0;
    }

    fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .split(frame.area());

        let lines = self.transcript_lines();
        let total_lines = lines.len() as u16;
        let viewport = chunks[0].height.saturating_sub(2);
        let max_scroll = total_lines.saturating_sub(viewport);
        let offset = max_scroll.saturating_sub(self.scroll_from_bottom.min(max_scroll));

        let transcript = Paragraph::new(Text::from(lines))
            .block(Block::default().borders(Borders::ALL).title(" incant "))
            .wrap(Wrap { trim: false })
            .scroll((offset, 0));
        frame.render_widget(transcript, chunks[0]);

        let thinking = self.session.is_turn_in_flight();
        let status = if thinking {
            Span::styled(
                "\u{25cf} Thinking... ",
                Style::default().fg(Color::Yellow),
            )
        } else {
            Span::styled(
                "USER >> ",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
        };
        let status_width = status.width() as u16;
        let input_line = Line::from(vec![status, Span::raw(self.input.clone())]);

        let input_bar = Paragraph::new(input_line).block(
            Block::default().borders(Borders::ALL).title(
                Line::from(format!(" {} ", format_tokens(self.session.total_tokens())))
                    .right_aligned(),
            ),
        );
        frame.render_widget(input_bar, chunks[1]);

        if !thinking {
            let cursor_x = chunks[1].x + 1 + status_width + self.input.len() as u16;
            frame.set_cursor_position((cursor_x.min(chunks[1].right().saturating_sub(2)), chunks[1].y + 1));
        }
    }

    fn transcript_lines(&self) -> Vec<Line<'static>> {
        let dim = Style::default().add_modifier(Modifier::DIM);
        let mut lines = Vec::new();

        for entry in self.session.transcript() {
            match entry {
                TranscriptEntry::Message(message) => {
                    let stamp = Span::styled(
                        format!("[{}] ", format_clock(message.timestamp)),
                        dim,
                    );
                    match message.role {
                        Role::User => {
                            lines.push(Line::from(vec![
                                stamp,
                                Span::styled(
                                    "USER >> ",
                                    Style::default()
                                        .fg(Color::Green)
                                        .add_modifier(Modifier::BOLD),
                                ),
                                Span::raw(message.text.clone()),
                            ]));
                        }
                        Role::Assistant => {
                            lines.push(Line::from(vec![
                                stamp,
                                Span::styled(
                                    "Assistant:",
                                    Style::default()
                                        .fg(Color::Magenta)
                                        .add_modifier(Modifier::BOLD),
                                ),
                            ]));
                            for text_line in message.text.lines() {
                                lines.push(Line::raw(text_line.to_string()));
                            }
                            lines.push(Line::raw(""));
                        }
                        Role::System => {
                            lines.push(Line::from(vec![
                                stamp,
                                Span::styled(
                                    message.text.clone(),
                                    Style::default()
                                        .fg(Color::Cyan)
                                        .add_modifier(Modifier::DIM),
                                ),
                            ]));
                        }
                        Role::Error => {
                            lines.push(Line::from(vec![
                                stamp,
                                Span::styled(
                                    "Error: ",
                                    Style::default()
                                        .fg(Color::Red)
                                        .add_modifier(Modifier::BOLD),
                                ),
                                Span::styled(
                                    message.text.clone(),
                                    Style::default().fg(Color::Red),
                                ),
                            ]));
                        }
                    }
                }
                TranscriptEntry::Code(block) => {
                    lines.push(Line::from(Span::styled(
                        format!("\u{25cf} {}", block.description),
                        Style::default().fg(Color::Yellow),
                    )));
                    for code_line in block.code.lines() {
                        lines.push(Line::from(vec![
                            Span::styled("  \u{2502} ", dim),
                            Span::styled(
                                code_line.to_string(),
                                Style::default().fg(Color::Cyan),
                            ),
                        ]));
                    }
                    if let Some(result) = &block.result {
                        lines.push(Line::from(vec![
                            Span::styled("  Result: ", Style::default().add_modifier(Modifier::BOLD)),
                            Span::styled(
                                truncate_preview(result),
                                Style::default().fg(Color::Green),
                            ),
                        ]));
                    }
                    lines.push(Line::raw(""));
                }
            }
        }

        lines
    }
}

fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= RESULT_PREVIEW_MAX_CHARS {
        return text.to_string();
    }

    let mut preview: String = text.chars().take(RESULT_PREVIEW_MAX_CHARS).collect();
    preview.push_str("...");
    preview
}

fn init_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

#[cfg(test)]
mod tests {
    use super::{truncate_preview, InputHistory};

    #[test]
    fn input_history_up_down_recall() {
        let mut history = InputHistory::default();
        history.record_entry("first".to_string());
        history.record_entry("second".to_string());

        assert_eq!(history.previous("draft"), Some("second".to_string()));
        assert_eq!(history.previous("second"), Some("first".to_string()));
        // Oldest entry repeats at the top of history.
        assert_eq!(history.previous("first"), Some("first".to_string()));
        assert_eq!(history.next(), Some("second".to_string()));
        // Walking past the newest entry restores the live draft.
        assert_eq!(history.next(), Some("draft".to_string()));
        assert_eq!(history.next(), None);
    }

    #[test]
    fn input_history_previous_with_no_entries_is_noop() {
        let mut history = InputHistory::default();
        assert_eq!(history.previous("draft"), None);
        assert_eq!(history.next(), None);
    }

    #[test]
    fn recording_resets_navigation() {
        let mut history = InputHistory::default();
        history.record_entry("one".to_string());
        assert_eq!(history.previous(""), Some("one".to_string()));

        history.record_entry("two".to_string());
        assert_eq!(history.cursor, None);
        assert_eq!(history.previous(""), Some("two".to_string()));
    }

    #[test]
    fn long_results_are_truncated_with_ellipsis() {
        let long = "x".repeat(600);
        let preview = truncate_preview(&long);

        assert_eq!(preview.chars().count(), 503);
        assert!(preview.ends_with("..."));
    }
}
