//! User interaction seam
//!
//! Everything that needs an answer from the user goes through the [`Prompter`]
//! trait, so the selection and retry logic can be driven by scripted input in
//! tests. Menus are numbered from 1; invalid answers are rejected and asked
//! again rather than replaced by a default.

use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Errors that can occur while prompting the user
#[derive(Debug, Error)]
pub enum PromptError {
    /// A menu was requested without any options to choose from
    #[error("Nothing to choose from")]
    NoOptions,

    /// Input ended before an answer was given
    #[error("Input closed before an answer was given")]
    Closed,

    /// A prompter answered with an index outside the menu
    #[error("Answer {index} is outside a menu of {count} option(s)")]
    OutOfRange { index: usize, count: usize },

    /// Failed to read from or write to the terminal
    #[error("Terminal interaction failed: {0}")]
    Terminal(#[from] dialoguer::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Why an answer to a numbered menu was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidChoice {
    #[error("Please enter a number")]
    NotANumber,

    #[error("Please enter a number from 1 to {max}")]
    OutOfRange { max: usize },
}

/// Parses a 1-based menu answer into a 0-based index.
pub fn parse_choice(input: &str, count: usize) -> Result<usize, InvalidChoice> {
    let number: usize = input
        .trim()
        .parse()
        .map_err(|_| InvalidChoice::NotANumber)?;

    if number == 0 || number > count {
        return Err(InvalidChoice::OutOfRange { max: count });
    }

    Ok(number - 1)
}

/// Looks up the option a [`Prompter::choose`] answer points at.
pub fn option_at<T>(options: &[T], index: usize) -> Result<&T, PromptError> {
    options.get(index).ok_or(PromptError::OutOfRange {
        index,
        count: options.len(),
    })
}

/// Source of user decisions.
pub trait Prompter {
    /// Shows a numbered menu and returns the 0-based index of the chosen option.
    ///
    /// The index must lie in `0..options.len()`; callers look it up with
    /// [`option_at`], which rejects anything else.
    fn choose(&mut self, title: &str, options: &[String]) -> Result<usize, PromptError>;

    /// Asks a yes/no question.
    fn confirm(&mut self, question: &str) -> Result<bool, PromptError>;

    /// Asks for a line of free text. The answer is trimmed.
    fn input(&mut self, prompt: &str) -> Result<String, PromptError>;
}

/// Prompter for an interactive terminal.
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn choose(&mut self, title: &str, options: &[String]) -> Result<usize, PromptError> {
        if options.is_empty() {
            return Err(PromptError::NoOptions);
        }

        println!("{}", style(title).magenta().bold());
        for (index, option) in options.iter().enumerate() {
            println!("{}", style(format!("[{}] {}", index + 1, option)).green());
        }

        let count = options.len();
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt("Enter number")
            .validate_with(move |input: &String| -> Result<(), String> {
                parse_choice(input, count).map(|_| ()).map_err(|e| e.to_string())
            })
            .interact_text()?;

        // Validation above guarantees this parses
        parse_choice(&answer, count).map_err(|_| PromptError::Closed)
    }

    fn confirm(&mut self, question: &str) -> Result<bool, PromptError> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(question)
            .default(true)
            .interact()?)
    }

    fn input(&mut self, prompt: &str) -> Result<String, PromptError> {
        let answer: String = Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer.trim().to_string())
    }
}

/// Plain line-based prompter over any reader and writer.
///
/// Used when stdin is not a terminal, and in tests with in-memory buffers.
pub struct LinePrompter<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LinePrompter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Gives back the writer, e.g. to inspect what was shown.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn read_line(&mut self) -> Result<String, PromptError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(PromptError::Closed);
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for LinePrompter<R, W> {
    fn choose(&mut self, title: &str, options: &[String]) -> Result<usize, PromptError> {
        if options.is_empty() {
            return Err(PromptError::NoOptions);
        }

        writeln!(self.writer, "{}", title)?;
        for (index, option) in options.iter().enumerate() {
            writeln!(self.writer, "[{}] {}", index + 1, option)?;
        }

        loop {
            write!(self.writer, "Enter number: ")?;
            self.writer.flush()?;
            let line = self.read_line()?;
            match parse_choice(&line, options.len()) {
                Ok(index) => return Ok(index),
                Err(e) => writeln!(self.writer, "{}", e)?,
            }
        }
    }

    fn confirm(&mut self, question: &str) -> Result<bool, PromptError> {
        loop {
            write!(self.writer, "{} [y/n]: ", question)?;
            self.writer.flush()?;
            match self.read_line()?.to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.writer, "Please answer y or n")?,
            }
        }
    }

    fn input(&mut self, prompt: &str) -> Result<String, PromptError> {
        write!(self.writer, "{}: ", prompt)?;
        self.writer.flush()?;
        self.read_line()
    }
}
