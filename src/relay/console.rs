//! Operator console input for manual mode.

/// Keyword that ends manual mode (case-insensitive).
pub const EXIT_KEYWORD: &str = "exit";

/// Classified console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Blank line; ignored.
    Empty,
    /// Operator asked to stop.
    Exit,
    /// A correspondent message, already trimmed.
    Message(String),
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            ConsoleInput::Empty
        } else if trimmed.eq_ignore_ascii_case(EXIT_KEYWORD) {
            ConsoleInput::Exit
        } else {
            ConsoleInput::Message(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_empty() {
        assert_eq!(ConsoleInput::parse(""), ConsoleInput::Empty);
        assert_eq!(ConsoleInput::parse("  \t "), ConsoleInput::Empty);
    }

    #[test]
    fn exit_any_case() {
        assert_eq!(ConsoleInput::parse("exit"), ConsoleInput::Exit);
        assert_eq!(ConsoleInput::parse("  ExIt \r"), ConsoleInput::Exit);
    }

    #[test]
    fn exit_inside_sentence_is_a_message() {
        assert_eq!(
            ConsoleInput::parse("don't exit yet"),
            ConsoleInput::Message("don't exit yet".to_string())
        );
    }

    #[test]
    fn message_is_trimmed() {
        assert_eq!(
            ConsoleInput::parse("  hi  \n"),
            ConsoleInput::Message("hi".to_string())
        );
    }
}
