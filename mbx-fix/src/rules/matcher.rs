//! Rule matcher
//!
//! Walks a rule's search terms against the bytes at the cursor. Repeat and
//! whitespace terms are greedy and never backtrack: once a repeat term stops
//! on a non-matching byte, matching resumes with the next term at that byte.

use crate::buffer::Window;

use super::types::{RuleState, SearchTerm, TranslationRule};

/// Where one search term matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capture {
    /// Offset from the cursor of the first byte the term consumed
    pub offset: usize,
    /// The byte seen there, for single-byte terms
    pub byte: Option<u8>,
}

/// Result of a successful match
#[derive(Debug, Clone, Default)]
pub struct Match {
    /// Number of source bytes consumed
    pub len: usize,
    /// One capture per search term
    pub captures: Vec<Capture>,
}

/// Stateless matching functions
pub struct RuleMatcher;

impl RuleMatcher {
    /// Test `rule` at the cursor of `window`
    ///
    /// On success fills `found` and returns the match length, which is the
    /// number of source bytes consumed and not the declared pattern length.
    pub fn try_match<W: Window + ?Sized>(
        rule: &TranslationRule,
        window: &W,
        found: &mut Match,
    ) -> Option<usize> {
        let ignore_case = rule.scope.ignore_case;
        found.captures.clear();
        let mut at = 0;

        for term in &rule.search {
            let start = at;
            let mut byte = None;
            match *term {
                SearchTerm::Byte(want) => {
                    let got = window.peek(at)?;
                    if !Self::same(got, want, ignore_case) {
                        return None;
                    }
                    byte = Some(got);
                    at += 1;
                }
                SearchTerm::NotByte(unwanted) => {
                    let got = window.peek(at)?;
                    if Self::same(got, unwanted, ignore_case) {
                        return None;
                    }
                    byte = Some(got);
                    at += 1;
                }
                SearchTerm::Repeat(want) => {
                    while let Some(got) = window.peek(at) {
                        if !Self::same(got, want, ignore_case) {
                            break;
                        }
                        at += 1;
                    }
                }
                SearchTerm::Whitespace => {
                    while let Some(got) = window.peek(at) {
                        if !Self::is_whitespace(got) {
                            break;
                        }
                        at += 1;
                    }
                }
            }
            found.captures.push(Capture {
                offset: start,
                byte,
            });
        }

        found.len = at;
        Some(at)
    }

    /// Update the rule's "inside HTML tag" status for the byte at the cursor
    pub fn track_tag<W: Window + ?Sized>(rule: &TranslationRule, state: &mut RuleState, window: &W) {
        let Some(tag) = &rule.scope.html_tag else {
            return;
        };
        if Self::starts_with(window, tag, rule.scope.ignore_case) {
            state.in_tag = true;
        }
        if state.in_tag && window.peek(0) == Some(b'>') {
            state.in_tag = false;
        }
    }

    /// Whether the original bytes at the cursor start with `literal`
    pub fn starts_with<W: Window + ?Sized>(window: &W, literal: &[u8], ignore_case: bool) -> bool {
        literal
            .iter()
            .enumerate()
            .all(|(i, want)| matches!(window.peek(i), Some(got) if Self::same(got, *want, ignore_case)))
    }

    fn same(got: u8, want: u8, ignore_case: bool) -> bool {
        if ignore_case {
            got.eq_ignore_ascii_case(&want)
        } else {
            got == want
        }
    }

    fn is_whitespace(byte: u8) -> bool {
        matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
    }
}
