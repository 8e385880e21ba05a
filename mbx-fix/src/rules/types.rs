//! Translation rule types and data structures

use serde::{Deserialize, Serialize};

use crate::scan::Zone;

/// Maximum number of terms in a search pattern
pub const MAX_SEARCH_TERMS: usize = 100;

/// Highest usable match flag number
pub const MAX_FLAG: u8 = 31;

/// One term of a search pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTerm {
    /// Exactly this byte
    Byte(u8),
    /// Any single byte except this one
    NotByte(u8),
    /// Zero or more of this byte, consumed greedily
    Repeat(u8),
    /// Zero or more of space, tab, CR, LF
    Whitespace,
}

impl SearchTerm {
    /// Fewest bytes this term can consume
    pub fn min_len(&self) -> usize {
        match self {
            SearchTerm::Byte(_) | SearchTerm::NotByte(_) => 1,
            SearchTerm::Repeat(_) | SearchTerm::Whitespace => 0,
        }
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, SearchTerm::NotByte(_))
    }
}

/// One output byte of a replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTerm {
    /// Write this byte
    Byte(u8),
    /// Reuse the byte matched by the negated search term at the same index
    Copy,
}

/// What a matched rule writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Output bytes; the rest of the match is padded
    Bytes(Vec<OutputTerm>),
    /// Every matched byte becomes a space
    Blanks,
    /// Leave the data alone and only apply flag effects
    NoOp,
}

impl Replacement {
    /// Output length when it does not depend on the match
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            Replacement::Bytes(terms) => Some(terms.len()),
            Replacement::Blanks => None,
            Replacement::NoOp => Some(0),
        }
    }
}

/// Set of match flags 0..=31
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MatchFlags(u32);

impl MatchFlags {
    pub const fn empty() -> Self {
        MatchFlags(0)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Add flag `n`; numbers above 31 are ignored
    pub fn insert(&mut self, n: u8) {
        if n <= MAX_FLAG {
            self.0 |= 1 << n;
        }
    }

    pub fn remove(&mut self, n: u8) {
        if n <= MAX_FLAG {
            self.0 &= !(1 << n);
        }
    }

    pub fn contains(&self, n: u8) -> bool {
        n <= MAX_FLAG && self.0 & (1 << n) != 0
    }

    /// True when every flag of `other` is set here
    pub fn contains_all(&self, other: MatchFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when no flag of `other` is set here
    pub fn contains_none(&self, other: MatchFlags) -> bool {
        self.0 & other.0 == 0
    }

    /// Apply set/clear effects; clearing wins when a flag is in both
    pub fn apply(&mut self, effects: &FlagEffects) {
        self.0 |= effects.set.0;
        self.0 &= !effects.clear.0;
    }

    pub fn clear_all(&mut self) {
        self.0 = 0;
    }

    /// Flag numbers in ascending order
    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=MAX_FLAG).filter(move |n| self.contains(*n))
    }
}

/// Where and when a rule may be tried
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// `<headers>`
    pub headers_only: bool,
    /// `<body>`
    pub body_only: bool,
    /// `<ignorecase>`
    pub ignore_case: bool,
    /// Opening literal of the HTML tag the rule is confined to, e.g. `<meta`
    pub html_tag: Option<Vec<u8>>,
    /// Flags that must all be set
    pub if_set: MatchFlags,
    /// Flags that must all be clear
    pub if_clear: MatchFlags,
}

impl Scope {
    /// Evaluate every predicate of the scope; all must hold
    pub fn admits(&self, zone: &Zone, flags: MatchFlags, in_tag: bool) -> bool {
        if self.headers_only && !zone.header {
            return false;
        }
        if self.body_only && zone.header {
            return false;
        }
        if self.html_tag.is_some() && !in_tag {
            return false;
        }
        flags.contains_all(self.if_set) && flags.contains_none(self.if_clear)
    }
}

/// Flag changes made by a successful match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagEffects {
    pub set: MatchFlags,
    pub clear: MatchFlags,
}

/// A parsed search/replace rule
#[derive(Debug, Clone)]
pub struct TranslationRule {
    pub search: Vec<SearchTerm>,
    pub replace: Replacement,
    pub scope: Scope,
    pub effects: FlagEffects,
    /// Rule text as written, for reports
    pub source: String,
    pub comment: Option<String>,
}

impl TranslationRule {
    /// Build a rule with default scope and no flag effects
    pub fn new(search: Vec<SearchTerm>, replace: Replacement) -> Self {
        Self {
            search,
            replace,
            scope: Scope::default(),
            effects: FlagEffects::default(),
            source: String::new(),
            comment: None,
        }
    }

    /// Fewest source bytes any match of this rule consumes
    pub fn min_match_len(&self) -> usize {
        self.search.iter().map(SearchTerm::min_len).sum()
    }

    /// Label used in reports and errors
    pub fn label(&self) -> &str {
        if self.source.is_empty() {
            "<unnamed rule>"
        } else {
            &self.source
        }
    }

    /// Check the load-time invariants of a single rule
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.search.is_empty() {
            return Err("empty search string".to_string());
        }
        if self.search.len() > MAX_SEARCH_TERMS {
            return Err(format!(
                "search string has {} terms, the limit is {}",
                self.search.len(),
                MAX_SEARCH_TERMS
            ));
        }
        let min_len = self.min_match_len();
        if min_len == 0 {
            return Err("search string can match zero bytes".to_string());
        }
        if self.scope.headers_only && self.scope.body_only {
            return Err("<headers> and <body> exclude each other".to_string());
        }
        if let Replacement::Bytes(terms) = &self.replace {
            if terms.len() > min_len {
                return Err(format!(
                    "replacement of {} bytes is longer than the shortest match of {} bytes",
                    terms.len(),
                    min_len
                ));
            }
            for (i, term) in terms.iter().enumerate() {
                if *term == OutputTerm::Copy && !self.search[i].is_negated() {
                    return Err(format!(
                        "* at replacement position {} is not matched by ! in the search string",
                        i + 1
                    ));
                }
            }
        }
        Ok(())
    }

    /// Same pattern, negations, scope and test flags: the later rule could never win
    pub fn duplicates(&self, other: &TranslationRule) -> bool {
        self.search == other.search && self.scope == other.scope
    }
}

/// Mutable per-rule state kept while scanning
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleState {
    /// Successful matches, including no-op ones
    pub used: u64,
    /// Inside the rule's HTML tag
    pub in_tag: bool,
}

/// Ordered list of rules plus their scan state
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<TranslationRule>,
    state: Vec<RuleState>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule after validating it against itself and the table
    pub fn push(&mut self, rule: TranslationRule) -> std::result::Result<(), String> {
        rule.validate()?;
        if let Some(dup) = self.rules.iter().find(|r| r.duplicates(&rule)) {
            return Err(format!("duplicate of `{}`", dup.label()));
        }
        self.rules.push(rule);
        self.state.push(RuleState::default());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[TranslationRule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> &TranslationRule {
        &self.rules[index]
    }

    pub fn state(&self, index: usize) -> &RuleState {
        &self.state[index]
    }

    pub(crate) fn split_mut(&mut self) -> (&[TranslationRule], &mut [RuleState]) {
        (&self.rules, &mut self.state)
    }

    /// Usage count of rule `index`
    pub fn used(&self, index: usize) -> u64 {
        self.state[index].used
    }

    /// Forget every "inside tag" status, e.g. when a new pass or field starts
    pub fn reset_tags(&mut self) {
        for state in &mut self.state {
            state.in_tag = false;
        }
    }

    /// Iterate rules with their usage counts
    pub fn usage(&self) -> impl Iterator<Item = (&TranslationRule, u64)> {
        self.rules.iter().zip(self.state.iter().map(|s| s.used))
    }
}

/// Areas of the mailbox in which no rule is tried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipAreas {
    #[serde(default)]
    pub headers: bool,
    #[serde(default)]
    pub body: bool,
    #[serde(default)]
    pub filenames: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl SkipAreas {
    /// Turn on one area by name
    pub fn enable(&mut self, area: &str) -> std::result::Result<(), String> {
        match area.to_ascii_lowercase().as_str() {
            "headers" | "header" => self.headers = true,
            "body" => self.body = true,
            "filenames" | "filename" => self.filenames = true,
            "deleted" => self.deleted = true,
            other => return Err(format!("unknown area `{}`", other)),
        }
        Ok(())
    }

    /// Union of two skip sets
    pub fn merge(self, other: SkipAreas) -> SkipAreas {
        SkipAreas {
            headers: self.headers || other.headers,
            body: self.body || other.body,
            filenames: self.filenames || other.filenames,
            deleted: self.deleted || other.deleted,
        }
    }

    pub fn excludes(&self, zone: &Zone) -> bool {
        (self.headers && zone.header)
            || (self.body && !zone.header)
            || (self.filenames && zone.filename)
            || (self.deleted && zone.deleted)
    }
}
