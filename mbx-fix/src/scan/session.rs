//! Scan session: the state shared by every position of a run

use tracing::trace;

use crate::buffer::Window;
use crate::error::Result;
use crate::rules::{Match, MatchFlags, RuleMatcher, RuleTable};

use super::classifier::Zone;
use super::replacer::{PadPolicy, Replacer};

/// Rule table, match flags and scratch space for one run
///
/// Rules tried later at the same cursor see the working bytes written by an
/// earlier rule up to the end of that rule's match; bytes further ahead are
/// always read from the original copy.
#[derive(Debug)]
pub struct ScanSession {
    rules: RuleTable,
    flags: MatchFlags,
    found: Match,
}

impl ScanSession {
    pub fn new(rules: RuleTable) -> Self {
        Self {
            rules,
            flags: MatchFlags::empty(),
            found: Match::default(),
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn flags(&self) -> MatchFlags {
        self.flags
    }

    /// Flags never carry over from one message to the next
    pub fn begin_message(&mut self) {
        if !self.flags.is_empty() {
            trace!("Clearing match flags {:#x} at message start", self.flags.bits());
        }
        self.flags.clear_all();
    }

    /// Start a fresh index field: no flags, no open HTML tags
    pub fn begin_field(&mut self) {
        self.flags.clear_all();
        self.rules.reset_tags();
    }

    /// Follow HTML tags at the cursor without trying any rule
    pub fn track_tags<W: Window + ?Sized>(&mut self, window: &W) {
        let (rules, states) = self.rules.split_mut();
        for (rule, state) in rules.iter().zip(states.iter_mut()) {
            RuleMatcher::track_tag(rule, state, window);
        }
    }

    /// Try every rule in table order at the cursor
    ///
    /// Returns how many rules changed at least one byte.
    pub fn try_rules<W: Window + ?Sized>(
        &mut self,
        window: &mut W,
        zone: &Zone,
        policy: PadPolicy,
    ) -> Result<usize> {
        let (rules, states) = self.rules.split_mut();
        let mut changed = 0;

        for (rule, state) in rules.iter().zip(states.iter_mut()) {
            RuleMatcher::track_tag(rule, state, window);
            if !rule.scope.admits(zone, self.flags, state.in_tag) {
                continue;
            }
            if RuleMatcher::try_match(rule, window, &mut self.found).is_none() {
                continue;
            }
            if Replacer::apply(rule, window, &self.found, policy)? {
                changed += 1;
            }
            state.used += 1;
            self.flags.apply(&rule.effects);
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FieldWindow;
    use crate::rules::parse_rules;

    fn session(rules: &str) -> ScanSession {
        ScanSession::new(parse_rules(rules.as_bytes()).unwrap().table)
    }

    /// Try the rules at every position of `data`, returning the result
    fn scan(session: &mut ScanSession, data: &[u8], zone: Zone) -> Vec<u8> {
        let mut original = data.to_vec();
        let mut working = data.to_vec();
        {
            let mut window = FieldWindow::new(&mut original, &mut working);
            for pos in 0..data.len() {
                window.seek(pos);
                session
                    .try_rules(&mut window, &zone, PadPolicy::ZeroFill)
                    .unwrap();
            }
        }
        working
    }

    #[test]
    fn test_isolated_linefeeds_both_rewritten() {
        let mut s = session("!0D 0A !0D = * 0D *");
        let out = scan(&mut s, b"ab\n\ncd", Zone::default());
        assert_eq!(out, b"ab\r\rcd".to_vec());
        assert_eq!(s.rules().used(0), 2);
    }

    #[test]
    fn test_cascade_sees_earlier_rewrite() {
        // The first rule's output is visible to the second at the same cursor
        let mut s = session("E28093 = \"-\"\n\"-\" 00 00 = \"~\"");
        let out = scan(&mut s, &[b'a', 0xE2, 0x80, 0x93], Zone::default());
        assert_eq!(out, vec![b'a', b'~', 0, 0]);
    }

    #[test]
    fn test_flags_gate_later_rules() {
        let mut s = session("\"[\" = <noop> <setmatch 5>\n<ifmatch 5> \"x\" = \"y\"\n\"]\" = <noop> <clearmatch 5>");
        let out = scan(&mut s, b"x[x]x", Zone::default());
        assert_eq!(out, b"x[y]x".to_vec());
        assert!(!s.flags().contains(5));
        assert_eq!(s.rules().used(0), 1);
    }

    #[test]
    fn test_begin_message_clears_flags() {
        let mut s = session("\"[\" = <noop> <setmatch 5>\n<ifmatch 5> \"x\" = \"y\"");
        scan(&mut s, b"[", Zone::default());
        assert!(s.flags().contains(5));
        s.begin_message();
        let out = scan(&mut s, b"x", Zone::default());
        assert_eq!(out, b"x".to_vec());
    }

    #[test]
    fn test_scope_uses_zone() {
        let mut s = session("<body> \"x\" = \"y\"\n<headers> \"a\" = \"b\"");
        assert_eq!(scan(&mut s, b"xa", Zone::index_field()), b"xb".to_vec());
        assert_eq!(scan(&mut s, b"xa", Zone::default()), b"ya".to_vec());
    }

    #[test]
    fn test_html_tag_scope() {
        let mut s = session("<ignorecase> <html meta> \"charset=utf-8\" = <blanks>");
        let data = b"charset=utf-8 <META charset=utf-8>";
        let out = scan(&mut s, data, Zone::default());
        assert_eq!(out, b"charset=utf-8 <META              >".to_vec());
    }

    #[test]
    fn test_noop_counts_use_without_change() {
        let mut s = session("\"a\" = <noop>");
        let mut original = b"a".to_vec();
        let mut working = original.clone();
        let mut window = FieldWindow::new(&mut original, &mut working);
        let changed = s
            .try_rules(&mut window, &Zone::default(), PadPolicy::ZeroFill)
            .unwrap();
        assert_eq!(changed, 0);
        assert_eq!(s.rules().used(0), 1);
    }
}
