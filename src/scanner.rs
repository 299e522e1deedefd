//! A longest-match, multi-state tokenizer.
//!
//! Rules are registered on a [`ScannerBuilder`]: each rule is a named regex
//! plus an action, optionally bound to a named scanner state (an unnamed
//! *default* state exists implicitly). At every input position the scanner
//! tries all rules of the current state, anchored at the cursor, and runs
//! the action of the longest match. Ties go to the rule whose name sorts
//! first; that ordering is fixed once, when `build()` sorts the registered
//! rules. A stock default rule matching any single character (newline
//! included) sits at the end of every state's list, so a proper rule of
//! equal length always beats it.
//!
//! Longest-match arbitration gives Lex-style semantics (`init` beats `in`)
//! without depending on how the host regex crate orders alternations.
//!
//! Actions receive a [`ScanCursor`] and may emit tokens through it or
//! reassign the scanner state to implement context-sensitive lexing
//! (string-interior vs. program body, say).

use crate::errors::ParseError;
use crate::tokens::Token;
use itertools::Itertools;
use log::{debug, trace};
use regex::Regex;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::rc::Rc;

/// The scanner state tag. `None` is the default (unnamed) state.
pub type ScanState = Option<SmolStr>;

/// What a rule action gets to touch mid-scan: the full input, the token
/// sink, and the mutable state tag.
pub struct ScanCursor<'a> {
    source: &'a str,
    tokens: &'a mut Vec<Token>,
    state: &'a mut ScanState,
}

impl ScanCursor<'_> {
    /// The complete input string being scanned.
    pub fn source(&self) -> &str {
        self.source
    }

    /// Append a token to the scan's output.
    pub fn emit(&mut self, kind: &str, value: impl Into<String>, pos: usize) {
        self.tokens.push(Token::new(kind, value, pos));
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Switch the scanner state; takes effect at the next position.
    pub fn set_state(&mut self, state: Option<&str>) {
        debug!("scanner state {:?} -> {:?}", self.state, state);
        *self.state = state.map(SmolStr::new);
    }
}

pub type ScanAction = Rc<dyn Fn(&mut ScanCursor, &str, usize) -> Result<(), ParseError>>;

#[derive(Clone)]
struct ScanRule {
    name: SmolStr,
    pattern: Regex,
    action: ScanAction,
}

/// regex for the stock default rule: any one character, newline included
const DEFAULT_RULE_PATTERN: &str = "(?s:.)";

fn compile_anchored(src: &str) -> Result<Regex, ParseError> {
    Regex::new(&format!(r"\A(?:{src})"))
        .map_err(|e| ParseError::internal_err(&format!("bad scanner rule regex '{src}': {e}")))
}

/// Collects scanner rules and fixes their arbitration order.
pub struct ScannerBuilder {
    rules: Vec<(SmolStr, ScanState, String, ScanAction)>,
    default_action: ScanAction,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_action: Rc::new(|_, _, pos| {
                Err(ParseError::lexical_err(
                    &format!("found unmatched input at position {pos}"),
                    pos,
                ))
            }),
        }
    }

    /// Register a rule in the default state.
    pub fn rule(
        self,
        name: &str,
        regex: &str,
        action: impl Fn(&mut ScanCursor, &str, usize) -> Result<(), ParseError> + 'static,
    ) -> Self {
        self.add(name, None, regex, Rc::new(action))
    }

    /// Register a rule that is only active in the given named state.
    pub fn state_rule(
        self,
        name: &str,
        state: &str,
        regex: &str,
        action: impl Fn(&mut ScanCursor, &str, usize) -> Result<(), ParseError> + 'static,
    ) -> Self {
        self.add(name, Some(SmolStr::new(state)), regex, Rc::new(action))
    }

    /// Shorthand for the common case: a rule whose action emits one token
    /// of the given kind carrying the matched text.
    pub fn token(self, name: &str, regex: &str, kind: &str) -> Self {
        let kind = SmolStr::new(kind);
        self.rule(name, regex, move |cursor, text, pos| {
            cursor.emit(&kind, text, pos);
            Ok(())
        })
    }

    /// [`ScannerBuilder::token`], bound to a named state.
    pub fn state_token(self, name: &str, state: &str, regex: &str, kind: &str) -> Self {
        let kind = SmolStr::new(kind);
        self.state_rule(name, state, regex, move |cursor, text, pos| {
            cursor.emit(&kind, text, pos);
            Ok(())
        })
    }

    /// A rule whose action emits nothing (whitespace, comments).
    pub fn skip(self, name: &str, regex: &str) -> Self {
        self.rule(name, regex, |_, _, _| Ok(()))
    }

    /// Replace the stock default action. The default rule still matches
    /// exactly one character; only the behavior on reaching it changes.
    pub fn default_rule(
        mut self,
        action: impl Fn(&mut ScanCursor, &str, usize) -> Result<(), ParseError> + 'static,
    ) -> Self {
        self.default_action = Rc::new(action);
        self
    }

    fn add(mut self, name: &str, state: ScanState, regex: &str, action: ScanAction) -> Self {
        self.rules.push((SmolStr::new(name), state, regex.to_string(), action));
        self
    }

    /// Compile every rule and group them by state. The tie-break order is
    /// established here: rules sort by ascending name, and the default
    /// rule goes last in every state's list.
    pub fn build(self) -> Result<Scanner, ParseError> {
        let mut patterns: HashMap<ScanState, Vec<ScanRule>> = HashMap::new();
        for (name, state, src, action) in
            self.rules.into_iter().sorted_by(|a, b| a.0.cmp(&b.0))
        {
            let pattern = compile_anchored(&src)?;
            patterns
                .entry(state)
                .or_default()
                .push(ScanRule { name, pattern, action });
        }
        let fallback = ScanRule {
            name: SmolStr::new("default"),
            pattern: compile_anchored(DEFAULT_RULE_PATTERN)?,
            action: self.default_action,
        };
        for rules in patterns.values_mut() {
            rules.push(fallback.clone());
        }
        Ok(Scanner { patterns, state: None })
    }
}

impl Default for ScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a position left-to-right through an input string, running the
/// action of the longest-matching rule at each step.
pub struct Scanner {
    patterns: HashMap<ScanState, Vec<ScanRule>>,
    state: ScanState,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// The base contract: token delivery happens purely through whatever
    /// the rule actions write into `tokens`.
    pub fn run(
        &mut self,
        input: &str,
        initial_state: Option<&str>,
        tokens: &mut Vec<Token>,
    ) -> Result<(), ParseError> {
        self.state = initial_state.map(SmolStr::new);
        let mut pos = 0;
        while pos < input.len() {
            let (action, match_len, rule_name) = {
                let rules = self.patterns.get(&self.state).ok_or_else(|| {
                    ParseError::internal_err(&format!(
                        "scanner state {:?} has no rules",
                        self.state
                    ))
                })?;

                // longest match wins; on a tie the list order (fixed at
                // build time) keeps the first
                let mut longest = 0;
                let mut best: Option<&ScanRule> = None;
                for rule in rules {
                    if let Some(m) = rule.pattern.find(&input[pos..]) {
                        debug_assert_eq!(m.start(), 0);
                        if m.end() > longest {
                            longest = m.end();
                            best = Some(rule);
                        }
                    }
                }
                let rule = best.ok_or_else(|| {
                    ParseError::lexical_err(&format!("lexical error at position {pos}"), pos)
                })?;
                (Rc::clone(&rule.action), longest, rule.name.clone())
            };

            let matched = &input[pos..pos + match_len];
            trace!("scan @{pos} rule {rule_name} matched '{matched}'");
            let mut cursor = ScanCursor {
                source: input,
                tokens: &mut *tokens,
                state: &mut self.state,
            };
            action(&mut cursor, matched, pos)?;

            if match_len == 0 {
                return Err(ParseError::internal_err(&format!("found empty match at {pos}")));
            }
            pos += match_len;
        }
        Ok(())
    }

    /// Tokenizing variant: collect whatever the actions emit and return it.
    pub fn tokenize(&mut self, input: &str) -> Result<Vec<Token>, ParseError> {
        self.tokenize_from(input, None)
    }

    pub fn tokenize_from(
        &mut self,
        input: &str,
        initial_state: Option<&str>,
    ) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        self.run(input, initial_state, &mut tokens)?;
        Ok(tokens)
    }
}
