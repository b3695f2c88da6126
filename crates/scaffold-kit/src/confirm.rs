//! Yes/no confirmation before system-modifying or destructive steps

use colored::Colorize;
use std::cell::RefCell;
use std::io::{self, BufRead, Write};

/// Asks the user for consent
pub trait Confirmer {
    /// Returns the user's answer; `default_choice` is what a bare Enter means
    fn confirm(&self, prompt: &str, default_choice: bool) -> io::Result<bool>;
}

/// Interpret one line of user input
///
/// Blank input selects the default. `y`/`yes`/`n`/`no` are matched
/// case-insensitively; anything else counts as "no".
pub fn parse_answer(input: &str, default_choice: bool) -> bool {
    let answer = input.trim();
    if answer.is_empty() {
        return default_choice;
    }
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Blocking line-based prompt over any reader/writer pair
pub struct LineConfirmer<R: BufRead, W: Write> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> LineConfirmer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }
}

/// Confirmer bound to the process's stdin and stderr
pub fn terminal() -> LineConfirmer<io::StdinLock<'static>, io::Stderr> {
    LineConfirmer::new(io::stdin().lock(), io::stderr())
}

impl<R: BufRead, W: Write> Confirmer for LineConfirmer<R, W> {
    fn confirm(&self, prompt: &str, default_choice: bool) -> io::Result<bool> {
        let hint = if default_choice { "[Y/n]" } else { "[y/N]" };
        let mut output = self.output.borrow_mut();
        write!(output, "{} {} {} ", "?".cyan().bold(), prompt, hint.dimmed())?;
        output.flush()?;

        let mut line = String::new();
        let read = self.input.borrow_mut().read_line(&mut line)?;
        if read == 0 {
            // Closed input never authorizes anything
            writeln!(output)?;
            return Ok(false);
        }

        Ok(parse_answer(&line, default_choice))
    }
}

/// Answers yes to everything (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&self, _prompt: &str, _default_choice: bool) -> io::Result<bool> {
        Ok(true)
    }
}

/// Takes the default answer of every prompt, for unattended runs
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeDefault;

impl Confirmer for AssumeDefault {
    fn confirm(&self, _prompt: &str, default_choice: bool) -> io::Result<bool> {
        Ok(default_choice)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// Replays canned answers and remembers the prompts it was shown
    #[derive(Default)]
    pub struct ScriptedConfirmer {
        pub answers: RefCell<VecDeque<bool>>,
        pub prompts: RefCell<Vec<String>>,
    }

    impl ScriptedConfirmer {
        pub fn new(answers: &[bool]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().copied().collect()),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl Confirmer for ScriptedConfirmer {
        fn confirm(&self, prompt: &str, _default_choice: bool) -> io::Result<bool> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.answers
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected prompt"))
        }
    }

    fn ask(input: &str, default_choice: bool) -> bool {
        let confirmer = LineConfirmer::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        confirmer.confirm("Continue?", default_choice).unwrap()
    }

    #[test]
    fn test_bare_newline_takes_default() {
        assert!(ask("\n", true));
        assert!(!ask("\n", false));
        assert!(ask("   \r\n", true));
    }

    #[test]
    fn test_answers_are_case_insensitive() {
        assert!(ask("Y\n", false));
        assert!(ask("YeS\n", false));
        assert!(!ask("N\n", true));
        assert!(!ask("no\n", true));
    }

    #[test]
    fn test_unrecognized_input_is_no() {
        assert!(!ask("sure\n", true));
        assert!(!ask("yep\n", false));
    }

    #[test]
    fn test_eof_declines() {
        assert!(!ask("", true));
    }

    #[test]
    fn test_prompt_shows_default_hint() {
        let confirmer = LineConfirmer::new(Cursor::new(b"\n".to_vec()), Vec::new());
        confirmer.confirm("Replace directory?", false).unwrap();
        let shown = String::from_utf8(confirmer.output.into_inner()).unwrap();
        assert!(shown.contains("Replace directory?"));
        assert!(shown.contains("[y/N]"));
    }

    #[test]
    fn test_non_interactive_modes() {
        assert!(AutoConfirm.confirm("x", false).unwrap());
        assert!(!AssumeDefault.confirm("x", false).unwrap());
        assert!(AssumeDefault.confirm("x", true).unwrap());
    }
}
