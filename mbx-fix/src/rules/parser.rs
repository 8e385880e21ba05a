//! Translation rule file parser
//!
//! Each non-blank line is either a global option or a rule:
//!
//! ```text
//! <skip deleted>                              ; never touch deleted messages
//! E28093 = "-"                                ; en dash
//! !0D 0A !0D = * 0D *                         ; isolated LF becomes CR
//! <body> <ignorecase> <html meta> "charset=utf-8" = <blanks>
//! "begin:vcard" = <noop> <setmatch 3>
//! <ifmatch 3> "end:vcard" = <noop> <clearmatch 3>
//! "<" 20* ">" = "<>"                           ; zero or more blanks
//! "a" <ws> "b" = "ab"                          ; any run of whitespace
//! ```

use std::path::Path;
use tracing::{debug, info};

use crate::error::{FixError, Result};

use super::types::*;

/// Parsed content of a rule file
#[derive(Debug, Clone, Default)]
pub struct RuleFile {
    pub table: RuleTable,
    /// Areas named by `<skip ...>` lines
    pub skip: SkipAreas,
}

/// Read and parse a rule file
pub fn load_rules(path: &Path) -> Result<RuleFile> {
    info!("Reading translations from {}", path.display());
    let text = std::fs::read(path)
        .map_err(|e| FixError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let file = parse_rules(&text)?;
    info!("Processed and stored {} translations", file.table.len());
    Ok(file)
}

/// Parse rule file content
pub fn parse_rules(text: &[u8]) -> Result<RuleFile> {
    let mut file = RuleFile::default();

    for (index, raw) in text.split(|b| *b == b'\n').enumerate() {
        let line_no = index + 1;
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let display = String::from_utf8_lossy(raw);
        let (body, comment) = split_comment(raw);

        let mut parser = LineParser::new(body);
        parser.skip_blanks();
        if parser.at_end() {
            continue;
        }

        match parser.parse_line() {
            Ok(Line::Skip(area)) => file
                .skip
                .enable(&area)
                .map_err(|reason| FixError::rule(line_no, &display, reason))?,
            Ok(Line::Rule(mut rule)) => {
                rule.source = String::from_utf8_lossy(body).trim().to_string();
                rule.comment = comment
                    .map(|c| String::from_utf8_lossy(c).trim().to_string())
                    .filter(|c| !c.is_empty());
                file.table
                    .push(rule)
                    .map_err(|reason| FixError::rule(line_no, &display, reason))?;
            }
            Err(reason) => return Err(FixError::rule(line_no, &display, reason)),
        }
    }

    debug!("Skip areas from rule file: {:?}", file.skip);
    Ok(file)
}

/// Split at the first `;` that is not inside quotes
fn split_comment(line: &[u8]) -> (&[u8], Option<&[u8]>) {
    let mut quote = None;
    for (i, b) in line.iter().enumerate() {
        match (quote, *b) {
            (None, b'"') | (None, b'\'') => quote = Some(*b),
            (Some(q), c) if c == q => quote = None,
            (None, b';') => return (&line[..i], Some(&line[i + 1..])),
            _ => {}
        }
    }
    (line, None)
}

enum Line {
    Skip(String),
    Rule(TranslationRule),
}

/// Cursor over the bytes of one line
struct LineParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LineParser<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn parse_line(&mut self) -> std::result::Result<Line, String> {
        let mut scope = Scope::default();

        // Modifiers come first
        while self.peek() == Some(b'<') {
            let save = self.pos;
            let (keyword, arg) = self.parse_angle()?;
            match (keyword.as_str(), arg) {
                ("skip", Some(area)) => {
                    self.skip_blanks();
                    if !self.at_end() {
                        return Err("<skip> must be alone on its line".to_string());
                    }
                    return Ok(Line::Skip(area));
                }
                ("headers", None) => scope.headers_only = true,
                ("body", None) => scope.body_only = true,
                ("ignorecase", None) => scope.ignore_case = true,
                ("html", Some(name)) => {
                    let mut tag = b"<".to_vec();
                    tag.extend_from_slice(name.as_bytes());
                    scope.html_tag = Some(tag);
                }
                ("ifmatch", Some(n)) => scope.if_set.insert(parse_flag(&n)?),
                ("ifnomatch", Some(n)) => scope.if_clear.insert(parse_flag(&n)?),
                ("ws", None) => {
                    // First search term, not a modifier
                    self.pos = save;
                    break;
                }
                (other, _) => return Err(format!("unknown search modifier <{}>", other)),
            }
            self.skip_blanks();
        }

        let search = self.parse_search()?;
        let (replace, effects) = self.parse_replacement()?;

        let mut rule = TranslationRule::new(search, replace);
        rule.scope = scope;
        rule.effects = effects;
        Ok(Line::Rule(rule))
    }

    fn parse_search(&mut self) -> std::result::Result<Vec<SearchTerm>, String> {
        let mut terms = Vec::new();
        loop {
            self.skip_blanks();
            match self.peek() {
                None => return Err("missing =".to_string()),
                Some(b'=') => {
                    self.pos += 1;
                    break;
                }
                Some(b'<') => {
                    let (keyword, _) = self.parse_angle()?;
                    if keyword != "ws" {
                        return Err(format!("<{}> is not allowed in a search string", keyword));
                    }
                    terms.push(SearchTerm::Whitespace);
                }
                Some(b'!') => {
                    self.pos += 1;
                    self.skip_blanks();
                    let item = self.parse_item()?;
                    if item.len() != 1 {
                        return Err("! applies to a single character".to_string());
                    }
                    self.skip_blanks();
                    if self.peek() == Some(b'*') {
                        return Err("! and * cannot be combined".to_string());
                    }
                    terms.push(SearchTerm::NotByte(item[0]));
                }
                Some(_) => {
                    let item = self.parse_item()?;
                    self.skip_blanks();
                    if self.peek() == Some(b'*') {
                        self.pos += 1;
                        if item.len() != 1 {
                            return Err("* applies to a single character".to_string());
                        }
                        terms.push(SearchTerm::Repeat(item[0]));
                    } else {
                        terms.extend(item.into_iter().map(SearchTerm::Byte));
                    }
                }
            }
            if terms.len() > MAX_SEARCH_TERMS {
                return Err("search string too long".to_string());
            }
        }
        if terms.is_empty() {
            return Err("empty search string".to_string());
        }
        Ok(terms)
    }

    fn parse_replacement(&mut self) -> std::result::Result<(Replacement, FlagEffects), String> {
        let mut output = Vec::new();
        let mut blanks = false;
        let mut noop = false;
        let mut effects = FlagEffects::default();

        loop {
            self.skip_blanks();
            match self.peek() {
                None => break,
                Some(b'*') => {
                    self.pos += 1;
                    output.push(OutputTerm::Copy);
                }
                Some(b'<') => {
                    let (keyword, arg) = self.parse_angle()?;
                    match (keyword.as_str(), arg) {
                        ("blanks", None) => blanks = true,
                        ("noop", None) => noop = true,
                        ("setmatch", Some(n)) => effects.set.insert(parse_flag(&n)?),
                        ("clearmatch", Some(n)) => effects.clear.insert(parse_flag(&n)?),
                        (other, _) => {
                            return Err(format!("unknown replacement option <{}>", other))
                        }
                    }
                }
                Some(_) => {
                    let item = self.parse_item()?;
                    output.extend(item.into_iter().map(OutputTerm::Byte));
                }
            }
        }

        let replace = match (blanks, noop) {
            (true, true) => return Err("<blanks> and <noop> exclude each other".to_string()),
            (true, false) | (false, true) if !output.is_empty() => {
                return Err("<blanks> and <noop> cannot be mixed with replacement bytes".to_string())
            }
            (true, false) => Replacement::Blanks,
            (false, true) => Replacement::NoOp,
            (false, false) => Replacement::Bytes(output),
        };
        Ok((replace, effects))
    }

    /// Parse `<keyword>` or `<keyword argument>`
    fn parse_angle(&mut self) -> std::result::Result<(String, Option<String>), String> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b'>') {
            self.pos += 1;
        }
        if self.at_end() {
            return Err("unterminated <...>".to_string());
        }
        let inner = String::from_utf8_lossy(&self.bytes[start..self.pos]).trim().to_string();
        self.pos += 1;
        if inner.is_empty() {
            return Err("empty <>".to_string());
        }
        Ok(match inner.split_once(char::is_whitespace) {
            Some((keyword, arg)) => (keyword.to_ascii_lowercase(), Some(arg.trim().to_string())),
            None => (inner.to_ascii_lowercase(), None),
        })
    }

    /// Parse a quoted string or a run of hex digits
    fn parse_item(&mut self) -> std::result::Result<Vec<u8>, String> {
        match self.peek() {
            Some(q @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|b| b != q) {
                    self.pos += 1;
                }
                if self.at_end() {
                    return Err("unterminated string".to_string());
                }
                let item = self.bytes[start..self.pos].to_vec();
                self.pos += 1;
                Ok(item)
            }
            _ => self.parse_hex(),
        }
    }

    fn parse_hex(&mut self) -> std::result::Result<Vec<u8>, String> {
        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;
        while let Some(c) = self.peek() {
            if matches!(c, b' ' | b'\t' | b'=' | b'*' | b'!' | b'<' | b'"' | b'\'') {
                break;
            }
            let nibble = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                b'A'..=b'F' => c - b'A' + 10,
                _ => return Err(format!("bad hex character `{}`", c as char)),
            };
            self.pos += 1;
            match high.take() {
                Some(h) => bytes.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }
        if high.is_some() {
            return Err("odd number of hex characters".to_string());
        }
        if bytes.is_empty() {
            return Err("expected a string or hex bytes".to_string());
        }
        Ok(bytes)
    }
}

fn parse_flag(text: &str) -> std::result::Result<u8, String> {
    match text.parse::<u8>() {
        Ok(n) if n <= MAX_FLAG => Ok(n),
        _ => Err(format!("match flag `{}` is not a number from 0 to {}", text, MAX_FLAG)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(line: &str) -> TranslationRule {
        let file = parse_rules(line.as_bytes()).unwrap();
        assert_eq!(file.table.len(), 1);
        file.table.rule(0).clone()
    }

    #[test]
    fn test_parse_hex_rule() {
        let rule = single("E28093 = \"-\"  ;En dash");
        assert_eq!(
            rule.search,
            vec![SearchTerm::Byte(0xE2), SearchTerm::Byte(0x80), SearchTerm::Byte(0x93)]
        );
        assert_eq!(rule.replace, Replacement::Bytes(vec![OutputTerm::Byte(b'-')]));
        assert_eq!(rule.comment.as_deref(), Some("En dash"));
        assert_eq!(rule.source, "E28093 = \"-\"");
    }

    #[test]
    fn test_parse_negation_and_copy() {
        let rule = single("!0D 0A !0D = * 0D *  ; isolated linefeeds");
        assert_eq!(
            rule.search,
            vec![SearchTerm::NotByte(0x0D), SearchTerm::Byte(0x0A), SearchTerm::NotByte(0x0D)]
        );
        assert_eq!(
            rule.replace,
            Replacement::Bytes(vec![OutputTerm::Copy, OutputTerm::Byte(0x0D), OutputTerm::Copy])
        );
    }

    #[test]
    fn test_parse_modifiers() {
        let rule = single("<body> <ignorecase> <html meta> \"charset=utf-8\" = <blanks>");
        assert!(rule.scope.body_only);
        assert!(rule.scope.ignore_case);
        assert_eq!(rule.scope.html_tag.as_deref(), Some(&b"<meta"[..]));
        assert_eq!(rule.search.len(), 13);
        assert_eq!(rule.replace, Replacement::Blanks);
    }

    #[test]
    fn test_parse_flags() {
        let file = parse_rules(
            b"\"begin\" = <noop> <setmatch 5>\n<ifmatch 5> <ifnomatch 6> \"end\" = <noop> <clearmatch 5>\n",
        )
        .unwrap();
        let first = file.table.rule(0);
        assert!(first.effects.set.contains(5));
        assert_eq!(first.replace, Replacement::NoOp);

        let second = file.table.rule(1);
        assert!(second.scope.if_set.contains(5));
        assert!(second.scope.if_clear.contains(6));
        assert!(second.effects.clear.contains(5));
    }

    #[test]
    fn test_parse_repeat_and_whitespace() {
        let rule = single("\"<\" 20* \">\" = \"<>\"");
        assert_eq!(
            rule.search,
            vec![SearchTerm::Byte(b'<'), SearchTerm::Repeat(b' '), SearchTerm::Byte(b'>')]
        );

        let rule = single("<ws> \"x\" = \"y\"");
        assert_eq!(rule.search, vec![SearchTerm::Whitespace, SearchTerm::Byte(b'x')]);
    }

    #[test]
    fn test_parse_skip_and_comments() {
        let file = parse_rules(b"; a comment\n\n   <skip deleted>\r\n'a;b' = 'x' ; trailing\n").unwrap();
        assert!(file.skip.deleted);
        assert_eq!(file.table.len(), 1);
        assert_eq!(file.table.rule(0).search.len(), 3);
    }

    #[test]
    fn test_empty_replacement_pads() {
        let rule = single("E2808B = \"\"   ;zero-width space");
        assert_eq!(rule.replace, Replacement::Bytes(vec![]));
    }

    #[test]
    fn test_rejects_bad_rules() {
        let bad: &[&str] = &[
            "E28093 \"-\"",              // missing =
            "E2809 = \"-\"",             // odd hex
            "\"ab\" = \"abc\"",          // replacement too long
            "0D 0A = * *",               // * without !
            "!\"ab\" = \"\"",            // ! on two bytes
            "<frobnicate> \"a\" = \"b\"", // unknown modifier
            "\"a\" = <setmatch 32>",     // flag out of range
            "\"a\" = \"b\" <blanks>",    // mixed blanks
            "\"abc = \"x\"",             // unterminated string
            "<skip signatures>",         // unknown area
            "20* = \"\"",                // matches nothing
        ];
        for line in bad {
            let err = parse_rules(line.as_bytes()).unwrap_err();
            assert!(matches!(err, FixError::Rule { line: 1, .. }), "{}: {:?}", line, err);
        }
    }

    #[test]
    fn test_rejects_duplicate_search() {
        let err = parse_rules(b"E28093 = \"-\"\nE28093 = \"--\"\n").unwrap_err();
        match err {
            FixError::Rule { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("duplicate"));
            }
            other => panic!("Expected rule error, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_overlong_search() {
        let line = format!("{} = \"\"", "41".repeat(MAX_SEARCH_TERMS + 1));
        assert!(parse_rules(line.as_bytes()).is_err());
    }
}
