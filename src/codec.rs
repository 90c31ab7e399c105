//! Argument codec
//!
//! Turns the whitespace-delimited tail of a command line into a fixed-size
//! vector of typed scalars according to a command's [`Signature`]. Text
//! arguments borrow from the line; nothing is copied.

use std::fmt;
use std::str::{FromStr, SplitWhitespace};

use ember_sdk::RawArgument;

use crate::error::{ParseError, SignatureError};

/// Primitive kind of one expected argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// `s`
    Text,
    /// `d`
    Integer,
    /// `f`
    Float,
}

impl ArgKind {
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            's' => Some(Self::Text),
            'd' => Some(Self::Integer),
            'f' => Some(Self::Float),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Text => 's',
            Self::Integer => 'd',
            Self::Float => 'f',
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
        })
    }
}

/// A validated signature string such as `"sd"`.
///
/// Its length is the exact number of required arguments; there are no
/// optional or variadic positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    text: String,
    kinds: Vec<ArgKind>,
}

impl Signature {
    /// Parse a signature, rejecting characters other than `s`, `d` and `f`.
    ///
    /// # Errors
    /// Returns [`SignatureError::UnknownKind`] on the first unknown character.
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        let kinds = text
            .chars()
            .map(|c| {
                ArgKind::from_char(c).ok_or_else(|| SignatureError::UnknownKind {
                    signature: text.to_string(),
                    kind: c,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            text: text.to_string(),
            kinds,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kinds(&self) -> &[ArgKind] {
        &self.kinds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.text)
    }
}

/// One parsed argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Argument<'a> {
    Text(&'a str),
    Integer(i64),
    Float(f64),
}

impl<'a> Argument<'a> {
    #[must_use]
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Text(_) => ArgKind::Text,
            Self::Integer(_) => ArgKind::Integer,
            Self::Float(_) => ArgKind::Float,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Self::Integer(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Self::Float(value) => Some(value),
            _ => None,
        }
    }

    fn to_raw(self) -> RawArgument {
        match self {
            Self::Text(text) => RawArgument::text(text),
            Self::Integer(value) => RawArgument::integer(value),
            Self::Float(value) => RawArgument::float(value),
        }
    }
}

/// Positional arguments for one dispatch, matching a signature exactly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArgumentVector<'a> {
    values: Vec<Argument<'a>>,
}

impl<'a> ArgumentVector<'a> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Allocated slots. Always equal to the signature length.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Argument<'a>> {
        self.values.get(index)
    }

    #[must_use]
    pub fn text(&self, index: usize) -> Option<&'a str> {
        self.get(index).and_then(Argument::as_text)
    }

    #[must_use]
    pub fn integer(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Argument::as_integer)
    }

    #[must_use]
    pub fn float(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(Argument::as_float)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Argument<'a>> {
        self.values.iter()
    }

    /// ABI form for plugin handlers: every value followed by the `End` sentinel.
    /// Text entries keep pointing into the original line.
    #[must_use]
    pub fn to_raw(&self) -> Vec<RawArgument> {
        let mut raw = Vec::with_capacity(self.values.len() + 1);
        raw.extend(self.values.iter().map(|arg| arg.to_raw()));
        raw.push(RawArgument::END);
        raw
    }
}

/// Split a command line into tokens on whitespace and line terminators.
#[must_use]
pub fn tokenize(line: &str) -> SplitWhitespace<'_> {
    line.split_whitespace()
}

/// Consume exactly one token per signature character.
///
/// Numbers are parsed strictly: a malformed integer or float is an error,
/// never a silent zero. Tokens after the last signature position are left
/// in `tokens`.
///
/// # Errors
/// [`ParseError::MissingArgument`] if the stream runs out,
/// [`ParseError::InvalidNumber`] if a numeric token does not parse.
pub fn parse<'a, I>(signature: &Signature, tokens: &mut I) -> Result<ArgumentVector<'a>, ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let mut values = Vec::with_capacity(signature.len());

    for (position, &kind) in signature.kinds().iter().enumerate() {
        let token = tokens
            .next()
            .ok_or(ParseError::MissingArgument { position, kind })?;

        let invalid = || ParseError::InvalidNumber {
            position,
            kind,
            token: token.to_string(),
        };

        let value = match kind {
            ArgKind::Text => Argument::Text(token),
            ArgKind::Integer => Argument::Integer(token.parse().map_err(|_| invalid())?),
            ArgKind::Float => Argument::Float(token.parse().map_err(|_| invalid())?),
        };
        values.push(value);
    }

    Ok(ArgumentVector { values })
}

/// [`parse`], then require the token stream to be exhausted.
///
/// # Errors
/// Everything [`parse`] returns, plus [`ParseError::TooManyArguments`] when
/// tokens remain after the signature is satisfied.
pub fn parse_exact<'a, I>(signature: &Signature, mut tokens: I) -> Result<ArgumentVector<'a>, ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let args = parse(signature, &mut tokens)?;
    if let Some(extra) = tokens.next() {
        return Err(ParseError::TooManyArguments {
            expected: signature.len(),
            first_extra: extra.to_string(),
        });
    }
    Ok(args)
}
