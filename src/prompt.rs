use std::io::{self, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::error::MisraError;

pub trait Prompter {
    fn confirm(&self, question: &str) -> Result<bool, MisraError>;

    /// Returns the index of the chosen option, or `None` when the user picked none.
    fn select(&self, question: &str, options: &[String]) -> Result<Option<usize>, MisraError>;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedPrompter {
    pub accept: bool,
}

impl FixedPrompter {
    pub fn accept_all() -> Self {
        Self { accept: true }
    }

    pub fn decline_all() -> Self {
        Self { accept: false }
    }
}

impl Prompter for FixedPrompter {
    fn confirm(&self, _question: &str) -> Result<bool, MisraError> {
        Ok(self.accept)
    }

    fn select(&self, _question: &str, options: &[String]) -> Result<Option<usize>, MisraError> {
        Ok((self.accept && !options.is_empty()).then_some(0))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_key(&self) -> Result<KeyCode, MisraError> {
        enable_raw_mode().map_err(|err| MisraError::Terminal(err.to_string()))?;
        let key = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(key.code),
                Ok(_) => {}
                Err(err) => break Err(MisraError::Terminal(err.to_string())),
            }
        };
        disable_raw_mode().map_err(|err| MisraError::Terminal(err.to_string()))?;
        key
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str) -> Result<bool, MisraError> {
        print_flush(&format!("{question} [y/N] "))?;
        let confirmed = matches!(self.read_key()?, KeyCode::Char('y') | KeyCode::Char('Y'));
        println!("{}", if confirmed { "y" } else { "n" });
        Ok(confirmed)
    }

    fn select(&self, question: &str, options: &[String]) -> Result<Option<usize>, MisraError> {
        println!("{question}");
        for (index, option) in options.iter().enumerate() {
            println!("  {}) {option}", index + 1);
        }
        print_flush("choice: ")?;
        let choice = match self.read_key()? {
            KeyCode::Char(ch) => ch
                .to_digit(10)
                .map(|digit| digit as usize)
                .filter(|digit| (1..=options.len()).contains(digit))
                .map(|digit| digit - 1),
            _ => None,
        };
        println!("{}", choice.map(|index| (index + 1).to_string()).unwrap_or_default());
        Ok(choice)
    }
}

fn print_flush(text: &str) -> Result<(), MisraError> {
    let mut stdout = io::stdout();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|err| MisraError::Terminal(err.to_string()))
}
