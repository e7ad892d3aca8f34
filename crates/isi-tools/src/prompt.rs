//! Operator prompts.
//!
//! Menus and workflows read answers through the [`Prompt`] trait so they can
//! be driven from a terminal or from scripted input.

use std::io::{self, BufRead, IsTerminal, Write};

use isi_api::{CredentialProvider, Credentials};

/// Source of operator answers.
pub trait Prompt {
    /// Shows `question` and returns the answer without its line ending.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] when input is exhausted.
    fn ask(&mut self, question: &str) -> io::Result<String>;

    /// Like [`Prompt::ask`], without echoing the answer where possible.
    fn ask_secret(&mut self, question: &str) -> io::Result<String> {
        self.ask(question)
    }

    /// Shows a note that needs no answer.
    fn say(&mut self, note: &str) -> io::Result<()>;
}

/// Line-oriented prompt over any reader/writer pair.
#[derive(Debug)]
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    /// Creates a prompt reading from `input` and printing questions to `output`.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Recovers the output writer.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        read_answer(&mut self.input, &mut self.output, question)
    }

    fn say(&mut self, note: &str) -> io::Result<()> {
        writeln!(self.output, "{note}")
    }
}

/// Prompt bound to the process's stdin, asking on stderr.
///
/// Stdout carries only command output, so `--format json` stays parseable.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        read_answer(&mut io::stdin().lock(), &mut io::stderr(), question)
    }

    fn ask_secret(&mut self, question: &str) -> io::Result<String> {
        if io::stdin().is_terminal() {
            rpassword::prompt_password(question)
        } else {
            self.ask(question)
        }
    }

    fn say(&mut self, note: &str) -> io::Result<()> {
        writeln!(io::stderr(), "{note}")
    }
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    write!(output, "{question}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Asks until the answer parses as a number.
///
/// # Errors
///
/// Returns an error only when the prompt itself fails.
pub fn ask_number<P: Prompt + ?Sized>(prompt: &mut P, question: &str) -> io::Result<u64> {
    loop {
        let answer = prompt.ask(question)?;
        match answer.trim().parse() {
            Ok(n) => return Ok(n),
            Err(_) => {
                prompt.say(&format!("'{}' is not a number", answer.trim()))?;
            }
        }
    }
}

/// Credentials typed in by the operator; last link of the provider chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptCredentials;

impl CredentialProvider for PromptCredentials {
    fn credentials(&self, endpoint: &str) -> isi_api::Result<Option<Credentials>> {
        let mut prompt = TerminalPrompt;
        let username = prompt.ask(&format!("User name for {endpoint}: "))?;
        let username = username.trim();
        if username.is_empty() {
            return Ok(None);
        }
        let password = prompt.ask_secret("Password: ")?;
        Ok(Some(Credentials::new(username, password)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn scripted(input: &str) -> LinePrompt<Cursor<Vec<u8>>, Vec<u8>> {
        LinePrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn answers_come_back_without_line_endings() {
        let mut prompt = scripted("first\r\nsecond\n");
        assert_eq!(prompt.ask("1? ").expect("answer"), "first");
        assert_eq!(prompt.ask_secret("2? ").expect("answer"), "second");
        let shown = String::from_utf8(prompt.into_output()).expect("utf8");
        assert_eq!(shown, "1? 2? ");
    }

    #[test]
    fn exhausted_input_is_eof() {
        let mut prompt = scripted("");
        let err = prompt.ask("? ").expect_err("no input");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn ask_number_skips_garbage() {
        let mut prompt = scripted("abc\n\n 42 \n");
        assert_eq!(ask_number(&mut prompt, "id? ").expect("number"), 42);
        let shown = String::from_utf8(prompt.into_output()).expect("utf8");
        assert!(shown.contains("'abc' is not a number"));
    }

    #[test]
    fn ask_number_stops_at_eof() {
        let mut prompt = scripted("abc\n");
        assert!(ask_number(&mut prompt, "id? ").is_err());
    }
}
