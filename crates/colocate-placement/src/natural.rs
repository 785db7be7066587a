//! Natural ("version") ordering of shard identifiers.
//!
//! Shard IDs are generated from a counter (`s100009`, `s100010`, ...), and the
//! counter may grow a digit between two shards of the same collection. Sorting
//! them lexicographically would put `s10` before `s9`. [`natural_cmp`] splits a
//! string into single characters and maximal runs of ASCII digits, and compares
//! digit runs by their integer value.

use std::cmp::Ordering;
use std::fmt;

/// One unit of a naturally ordered string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// A single non-digit character.
    Char(char),
    /// A maximal run of ASCII digits, kept as text so any length compares.
    Number(&'a str),
}

/// Iterator over the [`Token`]s of a string.
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let c = self.rest.chars().next()?;

        if c.is_ascii_digit() {
            let end = self
                .rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(self.rest.len());
            let (digits, rest) = self.rest.split_at(end);
            self.rest = rest;
            Some(Token::Number(digits))
        } else {
            self.rest = &self.rest[c.len_utf8()..];
            Some(Token::Char(c))
        }
    }
}

/// Compare two digit runs by integer value without parsing them.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_tokens(a: Token<'_>, b: Token<'_>) -> Ordering {
    match (a, b) {
        (Token::Char(a), Token::Char(b)) => a.cmp(&b),
        (Token::Char(_), Token::Number(_)) => Ordering::Less,
        (Token::Number(_), Token::Char(_)) => Ordering::Greater,
        (Token::Number(a), Token::Number(b)) => cmp_digits(a, b),
    }
}

/// Compare two strings in natural order.
///
/// - Digit runs compare by value: `"s2" < "s10" < "s100"`.
/// - A character sorts before a digit run at the same position.
/// - If one token sequence is a prefix of the other, the shorter sorts first.
/// - Strings whose tokens are all equal by value (`"s01"` and `"s1"`) fall
///   back to byte order, so the result is `Equal` only for identical strings.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Tokens::new(a);
    let mut right = Tokens::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match cmp_tokens(x, y) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
}

/// Sort a slice of string-like values in natural order.
pub fn sort_natural<T: AsRef<str>>(items: &mut [T]) {
    items.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

/// Map key ordered by [`natural_cmp`].
///
/// `BTreeMap<NaturalKey<ShardId>, _>` iterates shards in creation rank.
#[derive(Clone, Hash)]
pub struct NaturalKey<T>(pub T);

impl<T: AsRef<str>> PartialEq for NaturalKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: AsRef<str>> Eq for NaturalKey<T> {}

impl<T: AsRef<str>> PartialOrd for NaturalKey<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: AsRef<str>> Ord for NaturalKey<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        natural_cmp(self.0.as_ref(), other.0.as_ref())
    }
}

impl<T: fmt::Debug> fmt::Debug for NaturalKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: fmt::Display> fmt::Display for NaturalKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
