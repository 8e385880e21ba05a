//! Replacer
//!
//! Writes a matched rule's output over the matched bytes. Output is never
//! longer than the match; the deficit is resolved per [`PadPolicy`].

use crate::buffer::Window;
use crate::error::{FixError, Result};
use crate::rules::{Match, OutputTerm, Replacement, TranslationRule};

/// How bytes left over after a short replacement are filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadPolicy {
    /// Zero the leftover bytes in place (mailbox stream)
    ZeroFill,
    /// Shift the rest of the field left over the leftover bytes, then zero the
    /// vacated tail (index record field)
    ///
    /// Both buffer copies are rewritten for the shifted bytes, so later
    /// matches in the field treat the shifted content as original input.
    CompactField,
}

pub struct Replacer;

impl Replacer {
    /// Apply `rule` at the cursor for the match in `found`
    ///
    /// Returns whether any byte changed. Fails before writing anything when
    /// the output does not fit in the bytes actually matched.
    pub fn apply<W: Window + ?Sized>(
        rule: &TranslationRule,
        window: &mut W,
        found: &Match,
        policy: PadPolicy,
    ) -> Result<bool> {
        let len = found.len;
        let terms = match &rule.replace {
            Replacement::NoOp => return Ok(false),
            Replacement::Blanks => {
                let mut changed = false;
                for k in 0..len {
                    changed |= window.write(k, b' ');
                }
                window.settle(len);
                return Ok(changed);
            }
            Replacement::Bytes(terms) => terms,
        };

        let out = terms.len();
        if out > len {
            return Err(FixError::ReplacementOverrun {
                rule: rule.label().to_string(),
                matched: len,
                output: out,
            });
        }

        let mut changed = false;
        for (i, term) in terms.iter().enumerate() {
            match *term {
                OutputTerm::Byte(b) => changed |= window.write(i, b),
                OutputTerm::Copy => {
                    // A capture already at this index is left as it is in the
                    // working copy, keeping any overlapping earlier rewrite
                    let capture = found.captures[i];
                    if capture.offset != i {
                        if let Some(b) = capture.byte {
                            changed |= window.write(i, b);
                        }
                    }
                }
            }
        }

        if out < len {
            changed |= match policy {
                PadPolicy::ZeroFill => Self::zero_fill(window, out, len),
                PadPolicy::CompactField => Self::compact(window, out, len),
            };
        }

        window.settle(len);
        Ok(changed)
    }

    fn zero_fill<W: Window + ?Sized>(window: &mut W, from: usize, to: usize) -> bool {
        let mut changed = false;
        for k in from..to {
            changed |= window.write(k, 0);
        }
        changed
    }

    fn compact<W: Window + ?Sized>(window: &mut W, out: usize, len: usize) -> bool {
        let deficit = len - out;
        let end = window.lookahead();
        let mut changed = false;
        for k in out..end - deficit {
            let original = window.original(k + deficit).unwrap_or(0);
            let working = window.working(k + deficit).unwrap_or(0);
            changed |= window.rewrite(k, original, working);
        }
        for k in end - deficit..end {
            changed |= window.rewrite(k, 0, 0);
        }
        changed
    }
}
