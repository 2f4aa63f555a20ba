//! Case-insensitive token scanner for the bracketed problem-file format.
//!
//! Tokens are whitespace-separated. Keywords are lowercased on read;
//! quoted strings are preserved verbatim. Soft failures (a missing `=`,
//! an unparsable value) append a diagnostic to an internal buffer and
//! report failure to the caller; the loader decides whether to abort.

use std::fmt::Write as _;
use std::str::FromStr;

use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{anychar, char, multispace0};
use nom::sequence::{delimited, preceded};
use nom::IResult;
use nom::Parser;

/// Scanner over the full text of a problem file.
pub struct Scanner<'a> {
    rest: &'a str,
    diags: String,
}

fn bare_token(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, take_while1(|c: char| !c.is_whitespace())).parse(input)
}

fn quoted_string(input: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    )
    .parse(input)
}

fn any_nonspace(input: &str) -> IResult<&str, char> {
    preceded(multispace0, anychar).parse(input)
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            rest: text,
            diags: String::new(),
        }
    }

    /// True once only whitespace remains.
    pub fn at_eof(&self) -> bool {
        self.rest.trim_start().is_empty()
    }

    /// Next whitespace-delimited token, lowercased. `None` at end of input.
    pub fn next_token(&mut self) -> Option<String> {
        match bare_token(self.rest) {
            Ok((rest, tok)) => {
                self.rest = rest;
                Some(tok.to_ascii_lowercase())
            }
            Err(_) => None,
        }
    }

    /// Next token with its original case, for value parsing.
    fn next_raw(&mut self) -> Option<&'a str> {
        match bare_token(self.rest) {
            Ok((rest, tok)) => {
                self.rest = rest;
                Some(tok)
            }
            Err(_) => None,
        }
    }

    /// Consume the next non-whitespace character, requiring it to be `c`.
    pub fn expect_char(&mut self, c: char) -> bool {
        match any_nonspace(self.rest) {
            Ok((rest, got)) if got == c => {
                self.rest = rest;
                true
            }
            Ok((_, got)) => {
                let _ = writeln!(self.diags, "expected '{c}', got '{got}'");
                false
            }
            Err(_) => {
                let _ = writeln!(self.diags, "expected '{c}', got end of input");
                false
            }
        }
    }

    /// Parse the next token as a value of type `T`.
    pub fn parse_value<T: FromStr>(&mut self) -> Option<T> {
        match self.next_raw() {
            Some(tok) => match tok.parse::<T>() {
                Ok(v) => Some(v),
                Err(_) => {
                    let _ = writeln!(self.diags, "could not parse value: {tok}");
                    None
                }
            },
            None => {
                let _ = writeln!(self.diags, "expected a value, got end of input");
                None
            }
        }
    }

    /// Parse a double-quoted string, contents verbatim.
    pub fn parse_string(&mut self) -> Option<String> {
        match quoted_string(self.rest) {
            Ok((rest, s)) => {
                self.rest = rest;
                Some(s.to_owned())
            }
            Err(_) => {
                let _ = writeln!(self.diags, "expected a quoted string");
                None
            }
        }
    }

    /// Consume the next token, requiring it to equal `want` (lowercase).
    pub fn expect_token(&mut self, want: &str) -> bool {
        match self.next_token() {
            Some(tok) if tok == want => true,
            Some(tok) => {
                let _ = writeln!(self.diags, "expected {want}, got {tok}");
                false
            }
            None => {
                let _ = writeln!(self.diags, "expected {want}, got end of input");
                false
            }
        }
    }

    /// Skip the remainder of the current line.
    pub fn skip_line(&mut self) {
        self.rest = match self.rest.split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        };
    }

    /// Diagnostics accumulated by soft failures so far.
    pub fn diagnostics(&self) -> &str {
        &self.diags
    }

    /// Append a caller diagnostic to the buffer.
    pub fn note(&mut self, msg: &str) {
        let _ = writeln!(self.diags, "{msg}");
    }
}
