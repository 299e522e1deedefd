//! The parser's rule table.
//!
//! A grammar is a collection of productions, each a pair of an LHS symbol
//! and an ordered sequence of RHS symbols, registered under a display name
//! together with an action (the callable that turns a production's
//! children into its value). Symbols are textual names; a name is a
//! *nonterminal* exactly when it appears as the LHS of some production,
//! and a *terminal* otherwise — there is no vocabulary declaration, and
//! malformed rule text surfaces as a parse-time failure, not here.
//!
//! Rule text uses the `LHS ::= sym sym …` form, where every `::=` is
//! preceded by the LHS of its alternate, so one string can carry several
//! alternates:
//!
//! ```text
//! expr ::= expr plus term
//! expr ::= term
//! ```
//!
//! An empty RHS (`x ::=`) declares a nullable production.
//!
//! Two reserved names exist: `START`, the synthetic start installed at
//! construction as `START ::= <start> EOF`, and `EOF`, the end-of-input
//! sentinel the parser appends before recognition.
//!
//! FIRST sets are computed lazily: any registration flips a latch, and the
//! next parse (or an explicit [`Grammar::precompute`]) recomputes them.

use crate::tokens::Token;
use itertools::Itertools;
use log::debug;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

pub const START_SYMBOL: &str = "START";
pub const EOF_SYMBOL: &str = "EOF";

/// A production action: children in left-to-right order, value out.
pub type ProdAction<V> = Rc<dyn Fn(Vec<V>) -> V>;

/// Hook invoked once per production at registration time; may rewrite the
/// production, the action, or both. Used, for instance, to wrap every
/// action in a tree-building shim.
pub type PreprocessFn<V> = Box<dyn Fn(RawRule, ProdAction<V>) -> (RawRule, ProdAction<V>)>;

/// An `(LHS, RHS)` pair as seen by the preprocess hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRule {
    pub lhs: SmolStr,
    pub rhs: Vec<SmolStr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProdId(pub(crate) usize);

pub struct Production<V> {
    pub(crate) lhs: SmolStr,
    pub(crate) rhs: Vec<SmolStr>,
    pub(crate) display: SmolStr,
    pub(crate) action: ProdAction<V>,
}

impl<V> Production<V> {
    pub fn lhs(&self) -> &str {
        &self.lhs
    }
    pub fn rhs(&self) -> &[SmolStr] {
        &self.rhs
    }
    pub fn display_name(&self) -> &str {
        &self.display
    }
}

/// A grammar symbol, classified against the current rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Terminal(SmolStr),
    Nonterm(SmolStr),
}

/// Terminals that can begin a derivation of a nonterminal, plus a flag for
/// deriving the empty string. Nullable-through-prefix is not computed; the
/// predictor tolerates the imprecision by falling back to a weaker filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstSet {
    terminals: HashSet<SmolStr>,
    nullable: bool,
}

impl FirstSet {
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn contains(&self, terminal: &str) -> bool {
        self.terminals.contains(terminal)
    }

    pub fn terminals(&self) -> impl Iterator<Item = &SmolStr> {
        self.terminals.iter()
    }

    /// Copy another set in, nullable flag included. Reports growth.
    fn absorb(&mut self, other: &FirstSet) -> bool {
        let before = (self.terminals.len(), self.nullable);
        self.terminals.extend(other.terminals.iter().cloned());
        self.nullable |= other.nullable;
        before != (self.terminals.len(), self.nullable)
    }
}

pub struct Grammar<V> {
    start: SmolStr,
    prods: Vec<Production<V>>,
    by_lhs: HashMap<SmolStr, Vec<ProdId>>,
    index: HashMap<(SmolStr, Vec<SmolStr>), ProdId>,
    first: HashMap<SmolStr, FirstSet>,
    rules_changed: bool,
    preprocess: Option<PreprocessFn<V>>,
}

impl<V> Grammar<V> {
    pub fn new(start: &str) -> Self {
        Self::init(start, None)
    }

    /// A grammar whose registrations all pass through the given hook.
    /// The synthetic start production is exempt.
    pub fn with_preprocess(start: &str, hook: PreprocessFn<V>) -> Self {
        Self::init(start, Some(hook))
    }

    fn init(start: &str, preprocess: Option<PreprocessFn<V>>) -> Self {
        let mut g = Self {
            start: SmolStr::new(start),
            prods: Vec::new(),
            by_lhs: HashMap::new(),
            index: HashMap::new(),
            first: HashMap::new(),
            rules_changed: true,
            preprocess,
        };
        let raw = RawRule {
            lhs: SmolStr::new(START_SYMBOL),
            rhs: vec![g.start.clone(), SmolStr::new(EOF_SYMBOL)],
        };
        g.install(raw, SmolStr::default(), Rc::new(|mut kids: Vec<V>| kids.remove(0)));
        g
    }

    pub fn start_symbol(&self) -> &str {
        &self.start
    }

    /// Register one rule string under a display name. Every alternate in
    /// the string becomes its own production carrying the same action.
    pub fn rule(&mut self, name: &str, text: &str, action: impl Fn(Vec<V>) -> V + 'static) {
        self.rule_action(name, text, Rc::new(action));
    }

    pub fn rule_action(&mut self, name: &str, text: &str, action: ProdAction<V>) {
        let toks: Vec<&str> = text.split_whitespace().collect();

        // each `::=` is preceded by the LHS of its alternate; the RHS runs
        // to the next LHS or the end of the string
        let mut bounds = Vec::new();
        for (i, t) in toks.iter().enumerate() {
            if *t == "::=" {
                if i == 0 {
                    debug!("rule '{name}' starts with '::='; skipping");
                    return;
                }
                bounds.push(i - 1);
            }
        }
        bounds.push(toks.len());

        for k in 0..bounds.len().saturating_sub(1) {
            let lhs = toks[bounds[k]];
            let rhs: Vec<SmolStr> = toks
                .get(bounds[k] + 2..bounds[k + 1])
                .unwrap_or(&[])
                .iter()
                .map(|s| SmolStr::new(s))
                .collect();

            let mut raw = RawRule { lhs: SmolStr::new(lhs), rhs };
            let mut act = Rc::clone(&action);
            if let Some(hook) = &self.preprocess {
                (raw, act) = hook(raw, act);
            }
            self.install(raw, SmolStr::new(name), act);
        }
        self.rules_changed = true;
    }

    fn install(&mut self, raw: RawRule, display: SmolStr, action: ProdAction<V>) {
        let key = (raw.lhs.clone(), raw.rhs.clone());
        if let Some(&pid) = self.index.get(&key) {
            // re-registering the same (LHS, RHS): newest action and name win
            let prod = &mut self.prods[pid.0];
            prod.display = display;
            prod.action = action;
            return;
        }
        let pid = ProdId(self.prods.len());
        self.by_lhs.entry(raw.lhs.clone()).or_default().push(pid);
        self.index.insert(key, pid);
        self.prods.push(Production {
            lhs: raw.lhs,
            rhs: raw.rhs,
            display,
            action,
        });
    }

    pub fn is_nonterminal(&self, name: &str) -> bool {
        self.by_lhs.contains_key(name)
    }

    pub fn classify(&self, name: &SmolStr) -> Symbol {
        if self.is_nonterminal(name) {
            Symbol::Nonterm(name.clone())
        } else {
            Symbol::Terminal(name.clone())
        }
    }

    /// Explicit matching of a grammar symbol against a token.
    pub fn token_matches(symbol: &Symbol, tok: &Token) -> bool {
        match symbol {
            Symbol::Terminal(name) | Symbol::Nonterm(name) => tok.matches(name),
        }
    }

    pub(crate) fn prods_of(&self, name: &str) -> &[ProdId] {
        self.by_lhs.get(name).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn prod(&self, id: ProdId) -> &Production<V> {
        &self.prods[id.0]
    }

    pub(crate) fn start_production(&self) -> ProdId {
        ProdId(0)
    }

    pub fn production_count(&self) -> usize {
        self.prods.len()
    }

    /// FIRST set of a nonterminal; `None` until computed, or for names
    /// that are not an LHS.
    pub fn first_of(&self, name: &str) -> Option<&FirstSet> {
        self.first.get(name)
    }

    /// One-shot FIRST recomputation behind the rules-changed latch. Called
    /// at the start of every parse; also the explicit warm-up for callers
    /// that want FIRST materialized ahead of time.
    pub fn precompute(&mut self) {
        if self.rules_changed {
            self.make_first();
            self.rules_changed = false;
        }
    }

    fn make_first(&mut self) {
        let mut first: HashMap<SmolStr, FirstSet> = HashMap::new();
        let mut union: HashSet<(SmolStr, SmolStr)> = HashSet::new();

        for prod in &self.prods {
            let entry = first.entry(prod.lhs.clone()).or_default();
            if prod.rhs.is_empty() {
                entry.nullable = true;
                continue;
            }
            let sym = &prod.rhs[0];
            if self.by_lhs.contains_key(sym) {
                union.insert((sym.clone(), prod.lhs.clone()));
            } else {
                entry.terminals.insert(sym.clone());
            }
        }

        let mut changes = true;
        while changes {
            changes = false;
            for (src, dest) in &union {
                let donor = first.get(src).cloned().unwrap_or_default();
                if first.entry(dest.clone()).or_default().absorb(&donor) {
                    changes = true;
                }
            }
        }

        debug!("FIRST sets recomputed for {} nonterminals", first.len());
        self.first = first;
    }
}

impl<V> Default for Grammar<V> {
    fn default() -> Self {
        Self::new("root")
    }
}

impl<V> fmt::Display for Grammar<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = string_builder::Builder::default();
        for name in self.by_lhs.keys().sorted() {
            builder.append(name.to_string());
            builder.append(" ::= ");
            let alts: String = self
                .prods_of(name)
                .iter()
                .map(|&pid| self.prod(pid).rhs.iter().join(" "))
                .join(" | ");
            builder.append(alts);
            builder.append("\n");
        }
        write!(f, "{}", builder.string().unwrap_or_default())
    }
}
