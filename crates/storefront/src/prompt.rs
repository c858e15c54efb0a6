//! Line-based customer interaction.

use std::io::{self, BufRead, Write};

/// Presents text and reads validated answers.
///
/// `None` from a read means the input ended.
pub trait Prompt {
    /// Writes a line of output.
    fn show(&mut self, text: &str) -> io::Result<()>;

    /// Reads an integer in `min..=max`, asking again until one is given.
    fn read_int(&mut self, label: &str, min: u32, max: u32) -> io::Result<Option<u32>>;

    /// Asks a yes/no question. End of input counts as no.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;

    /// Lists numbered options and returns the index of the chosen one.
    fn choose(&mut self, title: &str, options: &[&str]) -> io::Result<Option<usize>> {
        if options.is_empty() {
            return Ok(None);
        }

        self.show(title)?;
        for (i, option) in options.iter().enumerate() {
            self.show(&format!("  {}. {option}", i + 1))?;
        }

        let max = u32::try_from(options.len()).unwrap_or(u32::MAX);
        Ok(self
            .read_int("Choice", 1, max)?
            .map(|choice| choice as usize - 1))
    }
}

/// A [`Prompt`] over any buffered reader and writer.
#[derive(Debug)]
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Returns the writer.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Writes `text` without a newline and reads one trimmed line.
    fn ask(&mut self, text: &str) -> io::Result<Option<String>> {
        write!(self.output, "{text}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn show(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")
    }

    fn read_int(&mut self, label: &str, min: u32, max: u32) -> io::Result<Option<u32>> {
        loop {
            let Some(answer) = self.ask(&format!("{label} [{min}-{max}]: "))? else {
                return Ok(None);
            };
            match answer.parse::<u32>() {
                Ok(value) if (min..=max).contains(&value) => return Ok(Some(value)),
                _ => self.show(&format!("Please enter a number from {min} to {max}."))?,
            }
        }
    }

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            let Some(answer) = self.ask(&format!("{question} (y/n): "))? else {
                return Ok(false);
            };
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.show("Please answer y or n.")?,
            }
        }
    }
}
