//! Address validation and OSC pattern matching
//!
//! Concrete addresses look like `/mixer/channel/3/fader`. Subscribers use
//! OSC patterns, matched one `/`-separated segment at a time:
//! - `?` matches exactly one character
//! - `*` matches any run of characters inside a segment
//! - `[abc]`, `[a-z]`, `[!0-9]` match one character from (or not from) a set
//! - `{on,off}` matches one of the listed literals
//!
//! A pattern never matches an address with a different number of segments.

use std::fmt;

use crate::{Error, Result};

/// Characters with pattern meaning; not allowed in concrete addresses
const PATTERN_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Validate a concrete (non-pattern) address
pub fn validate_address(address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(Error::InvalidAddress("empty address".to_string()));
    }
    if !address.starts_with('/') {
        return Err(Error::InvalidAddress(format!(
            "address must start with '/': {}",
            address
        )));
    }
    if let Some(c) = address
        .chars()
        .find(|c| PATTERN_CHARS.contains(c) || matches!(c, ' ' | '#' | ',' | '\0'))
    {
        return Err(Error::InvalidAddress(format!(
            "illegal character {:?} in address: {}",
            c, address
        )));
    }
    Ok(())
}

/// A parsed subscription pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPattern {
    raw: String,
    literal: bool,
}

impl AddressPattern {
    /// Parse and validate a pattern string
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidPattern("empty pattern".to_string()));
        }
        if !s.starts_with('/') {
            return Err(Error::InvalidPattern(format!(
                "pattern must start with '/': {}",
                s
            )));
        }

        let mut open: Option<char> = None;
        for c in s.chars() {
            match (open, c) {
                (None, '[') => open = Some(']'),
                (None, '{') => open = Some('}'),
                (None, ']') | (None, '}') => {
                    return Err(Error::InvalidPattern(format!("unbalanced {:?} in {}", c, s)))
                }
                (Some(close), c) if c == close => open = None,
                (Some(_), '[') | (Some(_), '{') => {
                    return Err(Error::InvalidPattern(format!("nested brackets in {}", s)))
                }
                (Some(_), '/') => {
                    return Err(Error::InvalidPattern(format!(
                        "bracket spans a segment boundary in {}",
                        s
                    )))
                }
                _ => {}
            }
        }
        if open.is_some() {
            return Err(Error::InvalidPattern(format!("unclosed bracket in {}", s)));
        }

        Ok(Self {
            raw: s.to_string(),
            literal: !s.contains(PATTERN_CHARS),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern has no wildcard characters
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// Check a concrete address against this pattern
    pub fn matches(&self, address: &str) -> bool {
        if self.literal {
            return self.raw == address;
        }
        match_path(&self.raw, address)
    }
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<&str> for AddressPattern {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        AddressPattern::parse(s)
    }
}

impl std::str::FromStr for AddressPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AddressPattern::parse(s)
    }
}

/// Match an unparsed pattern against a concrete address
///
/// A malformed pattern simply never matches.
pub fn matches(pattern: &str, address: &str) -> bool {
    AddressPattern::parse(pattern)
        .map(|p| p.matches(address))
        .unwrap_or(false)
}

fn match_path(pattern: &str, address: &str) -> bool {
    let mut pats = pattern.split('/');
    let mut segs = address.split('/');
    loop {
        match (pats.next(), segs.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) => {
                if !match_segment(p, s) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// Match one pattern segment against one address segment in full
///
/// Walks the pattern one token at a time while tracking every byte offset of
/// `seg` the prefix so far can end at, so the cost stays bounded by
/// pattern length times segment length however many `*` there are.
fn match_segment(pat: &str, seg: &str) -> bool {
    if !pat.contains(PATTERN_CHARS) {
        return pat == seg;
    }

    let mut reachable = vec![false; seg.len() + 1];
    let mut next = vec![false; seg.len() + 1];
    reachable[0] = true;

    let mut rest = pat;
    while let Some(c) = rest.chars().next() {
        next.fill(false);
        rest = match c {
            '*' => {
                if let Some(first) = reachable.iter().position(|&r| r) {
                    for (i, slot) in next.iter_mut().enumerate().skip(first) {
                        *slot = seg.is_char_boundary(i);
                    }
                }
                &rest[1..]
            }
            '?' => {
                step(&reachable, &mut next, seg, |_| true);
                &rest[1..]
            }
            '[' => {
                let Some(close) = rest.find(']') else {
                    return false;
                };
                let body = &rest[1..close];
                step(&reachable, &mut next, seg, |s| class_contains(body, s));
                &rest[close + 1..]
            }
            '{' => {
                let Some(close) = rest.find('}') else {
                    return false;
                };
                for start in (0..=seg.len()).filter(|&i| reachable[i]) {
                    for alt in rest[1..close].split(',') {
                        if seg[start..].starts_with(alt) {
                            next[start + alt.len()] = true;
                        }
                    }
                }
                &rest[close + 1..]
            }
            _ => {
                step(&reachable, &mut next, seg, |s| s == c);
                &rest[c.len_utf8()..]
            }
        };

        if !next.contains(&true) {
            return false;
        }
        std::mem::swap(&mut reachable, &mut next);
    }

    reachable[seg.len()]
}

/// Advance every reachable offset past one character accepted by `accept`
#[inline]
fn step(reachable: &[bool], next: &mut [bool], seg: &str, accept: impl Fn(char) -> bool) {
    for (i, s) in seg.char_indices() {
        if reachable[i] && accept(s) {
            next[i + s.len_utf8()] = true;
        }
    }
}

/// Evaluate a `[...]` body against one character
fn class_contains(body: &str, c: char) -> bool {
    let (negate, body) = match body.strip_prefix(['!', '^']) {
        Some(stripped) => (true, stripped),
        None => (false, body),
    };

    let mut found = false;
    let mut chars = body.chars();
    while let Some(lo) = chars.next() {
        // `a-z` is a range; a trailing `-` is literal
        let mut ahead = chars.clone();
        if let (Some('-'), Some(hi)) = (ahead.next(), ahead.next()) {
            chars = ahead;
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            found |= lo <= c && c <= hi;
        } else {
            found |= lo == c;
        }
    }

    found != negate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("/mixer/1/fader").is_ok());
        assert!(validate_address("/").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("mixer").is_err());
        assert!(validate_address("/mixer/*").is_err());
        assert!(validate_address("/a b").is_err());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(AddressPattern::parse("").is_err());
        assert!(AddressPattern::parse("no/slash").is_err());
        assert!(AddressPattern::parse("/a/[bc").is_err());
        assert!(AddressPattern::parse("/a/{b,c").is_err());
        assert!(AddressPattern::parse("/a/b]").is_err());
        assert!(AddressPattern::parse("/a/[b{c}]").is_err());
        assert!(AddressPattern::parse("/a/{b/c}").is_err());
    }

    #[test]
    fn test_literal_fast_path() {
        let p = AddressPattern::parse("/mixer/1").unwrap();
        assert!(p.is_literal());
        assert!(p.matches("/mixer/1"));
        assert!(!p.matches("/mixer/10"));
    }

    #[test]
    fn test_star() {
        assert!(matches("/foo/*", "/foo/bar"));
        assert!(matches("/foo/*", "/foo/"));
        assert!(!matches("/foo/*", "/foo/bar/baz"));
        assert!(matches("/foo/b*r", "/foo/bar"));
        assert!(matches("/foo/b*r", "/foo/br"));
        assert!(matches("/foo/*r*", "/foo/bar"));
        assert!(!matches("/foo/b*z", "/foo/bar"));
        assert!(matches("/*/*", "/a/b"));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches("/ch/?", "/ch/1"));
        assert!(!matches("/ch/?", "/ch/12"));
        assert!(!matches("/ch/?", "/ch/"));
        assert!(matches("/ch/??", "/ch/12"));
    }

    #[test]
    fn test_character_class() {
        assert!(matches("/a/[bc]d", "/a/bd"));
        assert!(matches("/a/[bc]d", "/a/cd"));
        assert!(!matches("/a/[bc]d", "/a/ad"));
        assert!(matches("/ch/[0-9]", "/ch/7"));
        assert!(!matches("/ch/[0-9]", "/ch/x"));
        assert!(matches("/ch/[!0-9]", "/ch/x"));
        assert!(!matches("/ch/[!0-9]", "/ch/3"));
        assert!(matches("/ch/[a-]", "/ch/-"));
    }

    #[test]
    fn test_alternation() {
        assert!(matches("/x/{on,off}", "/x/on"));
        assert!(matches("/x/{on,off}", "/x/off"));
        assert!(!matches("/x/{on,off}", "/x/maybe"));
        assert!(matches("/x/{a,ab}c", "/x/abc"));
        assert!(matches("/x/led{,s}", "/x/led"));
        assert!(matches("/x/led{,s}", "/x/leds"));
    }

    #[test]
    fn test_segment_count_must_match() {
        assert!(!matches("/a/b", "/a/b/c"));
        assert!(!matches("/a/b/c", "/a/b"));
        assert!(!matches("/*", "/a/b"));
    }

    #[test]
    fn test_malformed_pattern_never_matches() {
        assert!(!matches("/a/[b", "/a/[b"));
        assert!(!matches("", "/"));
    }
}
