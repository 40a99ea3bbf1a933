/// Help text shown for `/help` in both drivers.
pub const HELP_TEXT: &str = "Commands: /help, /clear, /quit (or type \"exit\")";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Quit,
    Unknown(String),
}

/// Classified line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Exit,
    Command(SlashCommand),
    Prompt(String),
}

/// Classifies one submitted line. Exit words are case-insensitive; anything
/// starting with `/` is a command; everything else is a prompt for the model.
pub fn classify_input(raw: &str) -> Input {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Input::Empty;
    }

    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return Input::Exit;
    }

    if let Some(command) = parse_slash_command(trimmed) {
        return Input::Command(command);
    }

    Input::Prompt(trimmed.to_string())
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
        .to_string();

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/quit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_are_case_insensitive() {
        assert_eq!(classify_input("exit"), Input::Exit);
        assert_eq!(classify_input("EXIT"), Input::Exit);
        assert_eq!(classify_input("Quit"), Input::Exit);
        assert_eq!(classify_input("  quit  "), Input::Exit);
    }

    #[test]
    fn blank_lines_are_empty() {
        assert_eq!(classify_input(""), Input::Empty);
        assert_eq!(classify_input("   \t"), Input::Empty);
    }

    #[test]
    fn slash_commands_are_recognized() {
        assert_eq!(classify_input("/help"), Input::Command(SlashCommand::Help));
        assert_eq!(classify_input("/clear"), Input::Command(SlashCommand::Clear));
        assert_eq!(classify_input("/quit"), Input::Command(SlashCommand::Quit));
        assert_eq!(
            classify_input("/nope extra args"),
            Input::Command(SlashCommand::Unknown("/nope".to_string()))
        );
    }

    #[test]
    fn everything_else_is_a_trimmed_prompt() {
        assert_eq!(
            classify_input("  exit the building "),
            Input::Prompt("exit the building".to_string())
        );
        assert_eq!(
            classify_input("list the files here"),
            Input::Prompt("list the files here".to_string())
        );
    }
}
