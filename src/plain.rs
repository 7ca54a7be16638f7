//! Plain text encoding.
//!
//! The plain format is line oriented and whitespace joined so that encoded
//! models diff well. Every encoder/decoder pair satisfies
//! `encode(decode(encode(x))) == encode(x)`.
//!
//! # Package layout
//!
//! ```text
//! <path>:<start>:<n_locs>
//! <class> <attrs> <parent> <obj> <type>      # n_locs lines
//! <n_constraints>
//! <kind> <dest> <src> [<index>]              # kind in {ad, ld, st, tr}
//! <n_types>:<buckets>
//! <type line>                                # one per non-basic type
//! <n_src_infos>
//! <loc> <src kind> <pos>
//! <n_objects>
//! <object line>
//! ```
//!
//! Locations and type handles are 8 lowercase hex digits; attributes are
//! `o{+|-}f{+|-}p{+|-}r{+|-}`; classes are one of `z`, `l`, `g`, `h`.
//!
//! # Extensions over the base layout
//!
//! The base package layout is the header, one `<class> <attrs> <parent> <obj>`
//! line per location, then the constraints. This encoding keeps that prefix
//! token for token and extends it in two ways:
//!
//! - each location line carries a fifth token, the location's type handle
//!   into the typeset that follows the constraints;
//! - every variable-length section (constraints, types, source infos,
//!   objects) is preceded by its count line, so sections end without a
//!   terminator.
//!
//! A reader of the base layout can take the first four tokens of each
//! location line and ignore the rest.

use crate::error::{DecodeContext, DecodeError};

/// Values with a single-token plain form.
pub trait Plain: Sized {
    fn plain_encode(&self, out: &mut String);
    fn plain_decode(token: &str) -> Result<Self, DecodeError>;

    fn to_plain(&self) -> String {
        let mut out = String::new();
        self.plain_encode(&mut out);
        out
    }
}

/// Line cursor over plain input.
pub struct Reader<'a> {
    lines: std::str::Lines<'a>,
    line_no: usize,
    remaining: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines(),
            line_no: 0,
            remaining: input.len(),
        }
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn next_line(&mut self, what: &'static str) -> Result<&'a str, DecodeError> {
        let line = self.lines.next().ok_or(DecodeError::Truncated(what))?;
        self.line_no += 1;
        self.remaining = self.remaining.saturating_sub(line.len() + 1);
        Ok(line)
    }

    /// Preallocation bound for `n` items of one line each.
    ///
    /// Counts in the input are untrusted, so they are capped by the bytes left.
    pub fn capacity_for(&self, n: usize) -> usize {
        n.min(self.remaining)
    }

    /// Read a line holding a single decimal count.
    pub fn count(&mut self, what: &'static str) -> Result<usize, DecodeError> {
        let line = self.next_line(what)?;
        parse_usize(line.trim()).with_context(|| format!("{} count", what))
    }

    pub fn is_eof(&self) -> bool {
        self.lines.clone().next().is_none()
    }
}

/// Whitespace token cursor over one line.
pub struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
    len: usize,
}

impl<'a> Tokens<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            inner: line.split_whitespace(),
            len: line.len(),
        }
    }

    /// Preallocation bound for `n` items of at least one token each.
    pub fn capacity_for(&self, n: usize) -> usize {
        n.min(self.len)
    }

    pub fn next(&mut self, what: &'static str) -> Result<&'a str, DecodeError> {
        self.inner.next().ok_or(DecodeError::Truncated(what))
    }

    pub fn decode<T: Plain>(&mut self, what: &'static str) -> Result<T, DecodeError> {
        let tok = self.next(what)?;
        T::plain_decode(tok).with_context(|| what)
    }

    pub fn usize(&mut self, what: &'static str) -> Result<usize, DecodeError> {
        let tok = self.next(what)?;
        parse_usize(tok).with_context(|| what)
    }

    /// Fail unless the line is exhausted.
    pub fn finish(mut self) -> Result<(), DecodeError> {
        match self.inner.next() {
            None => Ok(()),
            Some(extra) => Err(DecodeError::Invalid(format!("trailing token {:?}", extra))),
        }
    }
}

pub fn encode_hex32(value: u32, out: &mut String) {
    out.push_str(&format!("{:08x}", value));
}

pub fn decode_hex32(token: &str) -> Result<u32, DecodeError> {
    if token.len() != 8 {
        return Err(DecodeError::BadNumber(token.to_string()));
    }
    let mut value = 0u32;
    for c in token.chars() {
        let digit = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'a'..='f' => c as u32 - 'a' as u32 + 10,
            _ => {
                return Err(DecodeError::BadByte {
                    byte: c,
                    token: token.to_string(),
                })
            }
        };
        value = (value << 4) | digit;
    }
    Ok(value)
}

pub fn parse_usize(token: &str) -> Result<usize, DecodeError> {
    token
        .parse::<usize>()
        .map_err(|_| DecodeError::BadNumber(token.to_string()))
}

/// Names are length prefixed (`3:foo`, `0:`) so they may hold any byte but whitespace.
pub fn encode_name(name: &str, out: &mut String) {
    out.push_str(&name.len().to_string());
    out.push(':');
    out.push_str(name);
}

pub fn decode_name(token: &str) -> Result<String, DecodeError> {
    let (len, name) = token
        .split_once(':')
        .ok_or_else(|| DecodeError::Invalid(format!("bad name {:?}", token)))?;
    let len = parse_usize(len)?;
    if name.len() != len {
        return Err(DecodeError::Invalid(format!("name length mismatch in {:?}", token)));
    }
    Ok(name.to_string())
}
