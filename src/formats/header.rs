//! ASCII header scanning
//!
//! BSQ and RAD headers are whitespace-separated keyword/value streams;
//! MSTAR headers embed `Key= value` tokens in a fixed-size text block.

use std::iter::Peekable;
use std::str::{FromStr, SplitWhitespace};
use crate::error::{Error, Result};

/// Whitespace token stream with case-insensitive keyword matching
pub struct Tokens<'a> {
    inner: Peekable<SplitWhitespace<'a>>,
}

impl<'a> Tokens<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace().peekable(),
        }
    }

    pub fn next_token(&mut self) -> Option<&'a str> {
        self.inner.next()
    }

    /// Whether the next token equals one of `keywords`
    pub fn peek_is(&mut self, keywords: &[&str]) -> bool {
        self.inner
            .peek()
            .is_some_and(|t| keywords.iter().any(|k| t.eq_ignore_ascii_case(k)))
    }

    /// Consumes one token that must equal one of `keywords`
    pub fn expect(&mut self, keywords: &[&str]) -> Result<()> {
        match self.inner.next() {
            Some(t) if keywords.iter().any(|k| t.eq_ignore_ascii_case(k)) => Ok(()),
            Some(t) => Err(Error::InvalidFormat(format!(
                "expected '{}', found '{}'",
                keywords.join("' or '"),
                t
            ))),
            None => Err(Error::MissingToken(keywords[0].to_string())),
        }
    }

    /// Consumes the tokens of a multi-word keyword such as `BITS PER PIXEL`
    pub fn expect_phrase(&mut self, phrase: &str) -> Result<()> {
        for word in phrase.split_whitespace() {
            self.expect(&[word]).map_err(|_| Error::MissingToken(phrase.to_string()))?;
        }
        Ok(())
    }

    /// Skips tokens up to and including `keyword`
    pub fn skip_past(&mut self, keyword: &str) -> Result<()> {
        for token in self.inner.by_ref() {
            if token.eq_ignore_ascii_case(keyword) {
                return Ok(());
            }
        }
        Err(Error::MissingToken(keyword.to_string()))
    }

    /// Parses the next token as the value of `what`
    pub fn value<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self
            .inner
            .next()
            .ok_or_else(|| Error::MissingToken(what.to_string()))?;
        token.parse().map_err(|_| {
            Error::InvalidFormat(format!("invalid value '{}' for {}", token, what))
        })
    }
}

/// Finds `token` in `text` and parses the integer following it
///
/// Whitespace between the token and the number is skipped; the number ends
/// at the first non-digit.
pub fn find_int_after(text: &str, token: &str) -> Option<i64> {
    let start = text.find(token)? + token.len();
    let rest = text[start..].trim_start();
    let end = rest
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map_or(rest.len(), |(i, _)| i);
    rest[..end].parse().ok()
}
