//! Substitution rules and ordered rule sets.
//!
//! A [`Rule`] pairs a compiled regular expression with a parsed replacement
//! [`Template`]. A [`RuleSet`] folds its rules over a piece of text from left
//! to right, so every rule sees the output of the one before it.
//!
//! All validation happens when a rule is built: a rule that exists is known
//! to have a compilable pattern and a template whose backreferences name
//! groups the pattern actually defines.

use regex::{Captures, Regex, RegexBuilder, Replacer};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Compiled regex size cap, matching what we allow for any single rule.
const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Regex flags a rule is compiled with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RuleFlags {
    /// `^` and `$` match at line boundaries, not only at the ends of the text.
    pub multiline: bool,
    /// `.` also matches `\n`.
    pub dot_matches_new_line: bool,
}

impl RuleFlags {
    /// No flags: `^`/`$` anchor the whole text and `.` stops at newlines.
    pub const NONE: RuleFlags = RuleFlags {
        multiline: false,
        dot_matches_new_line: false,
    };

    /// Both multi-line anchors and dot-all matching.
    pub const MULTILINE_DOTALL: RuleFlags = RuleFlags {
        multiline: true,
        dot_matches_new_line: true,
    };
}

impl fmt::Display for RuleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.multiline, self.dot_matches_new_line) {
            (false, false) => write!(f, "-"),
            (true, false) => write!(f, "m"),
            (false, true) => write!(f, "s"),
            (true, true) => write!(f, "ms"),
        }
    }
}

/// A fault in a rule definition, detected before any file is touched.
#[derive(Error, Debug, Clone)]
pub enum DefinitionError {
    #[error("pattern is empty")]
    EmptyPattern,

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("replacement references group {group} but pattern `{pattern}` defines {available} group(s)")]
    UnknownGroup {
        pattern: String,
        group: String,
        available: usize,
    },

    #[error("invalid replacement template `{template}` at byte {offset}: {message}")]
    InvalidTemplate {
        template: String,
        offset: usize,
        message: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group(usize),
    Named(String),
}

/// A parsed replacement template.
///
/// Syntax:
///
/// - `\1` .. `\99` and `\g<N>` insert numbered group `N`; `\g<0>` is the
///   whole match.
/// - `\g<name>` inserts a named group.
/// - `\n`, `\t`, `\r` insert a newline, tab or carriage return; `\\` inserts
///   a backslash.
/// - `\` before any other non-alphanumeric character inserts that
///   character, so `\'` yields `'`.
///
/// `$` and braces are ordinary text, which keeps JavaScript template
/// literals such as `${name}` intact. A group that exists but did not take
/// part in a match expands to the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, DefinitionError> {
        let invalid = |offset: usize, message: &'static str| DefinitionError::InvalidTemplate {
            template: source.to_string(),
            offset,
            message,
        };

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            if c != '\\' {
                literal.push(c);
                continue;
            }

            let Some((_, escaped)) = chars.next() else {
                return Err(invalid(offset, "trailing backslash"));
            };

            let group = match escaped {
                '0' => return Err(invalid(offset, "use \\g<0> to insert the whole match")),
                '1'..='9' => {
                    let mut number = escaped as usize - '0' as usize;
                    if let Some(&(_, next)) = chars.peek() {
                        if let Some(digit) = next.to_digit(10) {
                            number = number * 10 + digit as usize;
                            chars.next();
                        }
                    }
                    Some(Piece::Group(number))
                }
                'g' => {
                    if !matches!(chars.next(), Some((_, '<'))) {
                        return Err(invalid(offset, "expected `<` after \\g"));
                    }
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '>' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(invalid(offset, "unterminated group reference"));
                    }
                    if let Ok(number) = name.parse::<usize>() {
                        Some(Piece::Group(number))
                    } else if is_group_name(&name) {
                        Some(Piece::Named(name))
                    } else {
                        return Err(invalid(offset, "bad group name"));
                    }
                }
                'n' => {
                    literal.push('\n');
                    None
                }
                't' => {
                    literal.push('\t');
                    None
                }
                'r' => {
                    literal.push('\r');
                    None
                }
                c if c.is_alphanumeric() => return Err(invalid(offset, "unknown escape")),
                c => {
                    literal.push(c);
                    None
                }
            };

            if let Some(piece) = group {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(piece);
            }
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            pieces,
        })
    }

    /// The template text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the template contains no backreferences.
    pub fn is_literal(&self) -> bool {
        self.pieces.iter().all(|p| matches!(p, Piece::Literal(_)))
    }

    /// Check every backreference against the groups `regex` defines.
    fn check_groups(&self, regex: &Regex) -> Result<(), DefinitionError> {
        let available = regex.captures_len();
        for piece in &self.pieces {
            let group = match piece {
                Piece::Group(n) if *n >= available => n.to_string(),
                Piece::Named(name) if !regex.capture_names().flatten().any(|n| n == name.as_str()) => {
                    name.clone()
                }
                _ => continue,
            };
            return Err(DefinitionError::UnknownGroup {
                pattern: regex.as_str().to_string(),
                group,
                // group 0 is implicit
                available: available - 1,
            });
        }
        Ok(())
    }

    /// Append the instantiated template for one match to `dst`.
    pub fn expand(&self, caps: &Captures<'_>, dst: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => dst.push_str(text),
                Piece::Group(n) => {
                    if let Some(m) = caps.get(*n) {
                        dst.push_str(m.as_str());
                    }
                }
                Piece::Named(name) => {
                    if let Some(m) = caps.name(name) {
                        dst.push_str(m.as_str());
                    }
                }
            }
        }
    }
}

fn is_group_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Counts matches while expanding the template into the output buffer.
struct Expander<'t> {
    template: &'t Template,
    count: usize,
}

impl Replacer for Expander<'_> {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) {
        self.count += 1;
        self.template.expand(caps, dst);
    }
}

/// A single pattern/replacement pair.
#[derive(Debug, Clone)]
pub struct Rule {
    regex: Regex,
    flags: RuleFlags,
    template: Template,
    description: Option<String>,
}

impl Rule {
    /// Build a rule with no regex flags.
    pub fn new(pattern: &str, replacement: &str) -> Result<Self, DefinitionError> {
        Self::with_flags(pattern, replacement, RuleFlags::NONE)
    }

    pub fn with_flags(
        pattern: &str,
        replacement: &str,
        flags: RuleFlags,
    ) -> Result<Self, DefinitionError> {
        if pattern.is_empty() {
            return Err(DefinitionError::EmptyPattern);
        }

        let regex = RegexBuilder::new(pattern)
            .multi_line(flags.multiline)
            .dot_matches_new_line(flags.dot_matches_new_line)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|source| DefinitionError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        let template = Template::parse(replacement)?;
        template.check_groups(&regex)?;

        log::trace!("compiled rule `{pattern}` [{flags}]");

        Ok(Self {
            regex,
            flags,
            template,
            description: None,
        })
    }

    /// Attach a human-readable description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn replacement(&self) -> &str {
        self.template.as_str()
    }

    pub fn flags(&self) -> RuleFlags {
        self.flags
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Replace every non-overlapping match in `content`.
    ///
    /// Returns the input unchanged (borrowed) when nothing matches.
    pub fn apply<'a>(&self, content: &'a str) -> Cow<'a, str> {
        self.apply_counted(content).0
    }

    /// Like [`Rule::apply`], also returning the number of matches replaced.
    pub fn apply_counted<'a>(&self, content: &'a str) -> (Cow<'a, str>, usize) {
        let mut expander = Expander {
            template: &self.template,
            count: 0,
        };
        let output = self.regex.replace_all(content, expander.by_ref());
        (output, expander.count)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{description}"),
            None => write!(f, "/{}/{} -> {:?}", self.pattern(), self.flags, self.replacement()),
        }
    }
}

/// An ordered sequence of rules scoped to one file.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Build a rule set from `(pattern, replacement)` pairs sharing `flags`.
    ///
    /// Fails on the first invalid definition.
    pub fn from_pairs<P, R>(
        flags: RuleFlags,
        pairs: impl IntoIterator<Item = (P, R)>,
    ) -> Result<Self, DefinitionError>
    where
        P: AsRef<str>,
        R: AsRef<str>,
    {
        pairs
            .into_iter()
            .map(|(pattern, replacement)| {
                Rule::with_flags(pattern.as_ref(), replacement.as_ref(), flags)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Fold every rule over `content`, in declared order.
    pub fn apply(&self, content: &str) -> String {
        self.apply_counted(content).0
    }

    /// Like [`RuleSet::apply`], also returning the total number of matches.
    pub fn apply_counted(&self, content: &str) -> (String, usize) {
        let mut current = content.to_string();
        let mut total = 0;

        for (idx, rule) in self.rules.iter().enumerate() {
            let (output, count) = rule.apply_counted(&current);
            let rewritten = match output {
                Cow::Owned(text) => Some(text),
                Cow::Borrowed(_) => None,
            };
            if count == 0 {
                log::debug!("rule #{} matched nothing: {}", idx + 1, rule);
            } else {
                log::debug!("rule #{} matched {} time(s): {}", idx + 1, count, rule);
            }
            total += count;
            if let Some(text) = rewritten {
                current = text;
            }
        }

        (current, total)
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
