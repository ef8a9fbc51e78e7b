//! Command-line templates for spawned helper processes.

use std::fmt;

/// Error produced while tokenizing a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizeError {
    /// The quote character that was never closed.
    pub quote: char,
}

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unterminated {} quote",
            if self.quote == '"' { "double" } else { "single" }
        )
    }
}

impl std::error::Error for TokenizeError {}

/// Splits a command line into an argv.
///
/// Arguments are whitespace-separated; single- or double-quoted spans keep
/// their whitespace and may be embedded in a larger word.
///
/// # Errors
///
/// Returns [`TokenizeError`] when a quote is opened but never closed.
pub fn tokenize(cmdline: &str) -> Result<Vec<String>, TokenizeError> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in cmdline.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                } else {
                    current.push(ch);
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        argv.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if let Some(q) = quote {
        return Err(TokenizeError { quote: q });
    }

    if in_word {
        argv.push(current);
    }

    Ok(argv)
}

/// A pre-tokenized command line with `${name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnTemplate {
    /// The command line as written in the configuration.
    pub raw: String,
    /// The tokenized argv, placeholders unexpanded.
    pub argv: Vec<String>,
}

impl SpawnTemplate {
    /// Tokenizes `cmdline` into a template.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizeError`] when the command line has an unterminated
    /// quote.
    pub fn parse(cmdline: &str) -> Result<Self, TokenizeError> {
        Ok(Self {
            raw: cmdline.to_owned(),
            argv: tokenize(cmdline)?,
        })
    }

    /// Whether the template has no command at all.
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Expands `${name}` placeholders and returns the final argv.
    ///
    /// Unknown placeholders are left in place.
    pub fn expand(&self, substitutions: &[(&str, &str)]) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| {
                let mut expanded = arg.clone();
                for (name, value) in substitutions {
                    expanded = expanded.replace(&format!("${{{name}}}"), value);
                }
                expanded
            })
            .collect()
    }
}
