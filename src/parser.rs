//! The Earley engine and its tree reconstructor.
//!
//! Recognition builds a chart: one cell per input position, each an
//! ordered, deduplicated collection of items `(production, dot, origin)`.
//! Items are processed in append order, so predictor and completer work
//! inside a cell reaches fixpoint in a single linear pass. Completer steps
//! record back-pointers in a one-to-many map keyed on `(item, cell)`;
//! multiple entries under one key are the chart's representation of
//! ambiguity. Scanner steps record nothing — during reconstruction the
//! terminal is recovered from the token stream instead.
//!
//! The subtle part is nullability. A production with an empty RHS can
//! complete inside the very cell that predicted it, at a moment when some
//! parents expecting its LHS have not been processed yet (or do not exist
//! yet). The completer therefore caps its parent walk at the current item
//! when the origin is the current cell, and leaves a `needs_completion`
//! note; the predictor consults that note first and advances late-arriving
//! parents on the spot.

use crate::errors::ParseError;
use crate::grammar::{Grammar, ProdId, Symbol, EOF_SYMBOL};
use crate::tokens::{FromToken, Token};
use crate::tree::{SynTree, TreeContent};
use indextree::{Arena, NodeId};
use log::{debug, info, trace};
use multimap::MultiMap;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Item {
    prod: ProdId,
    dot: usize,
    origin: usize,
}

/// an item pinned to the chart cell it was observed in
type ItemAt = (Item, usize);

type BackMap = MultiMap<ItemAt, ItemAt>;

/// One chart cell: append-ordered items with a sibling set for dedup.
#[derive(Debug, Default)]
struct StateSet {
    items: Vec<Item>,
    seen: HashSet<Item>,
}

impl StateSet {
    fn push(&mut self, item: Item) -> bool {
        if self.seen.insert(item) {
            self.items.push(item);
            true
        } else {
            false
        }
    }
}

/// What the ambiguity resolver gets to look at: one entry per rival
/// derivation of the same span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub rule_name: SmolStr,
    pub rhs_len: usize,
}

/// Picks the index of the winning candidate.
pub type Resolver = Box<dyn Fn(&[Candidate]) -> usize>;

/// Maps a token to its declared type for the FIRST-filtered predictor;
/// `None` falls back to the weaker filter.
pub type TypeHint = Box<dyn Fn(&Token) -> Option<SmolStr>>;

/// The stock ambiguity policy: shortest RHS wins, ties broken by ascending
/// rule name. Read top-down this approximates a shift preference. Among
/// several candidates bearing the winning name the last one is taken;
/// distinct productions that share a display name therefore resolve
/// unpredictably, which is an accepted limitation.
pub fn default_resolver(candidates: &[Candidate]) -> usize {
    let mut order: Vec<(usize, &SmolStr)> = candidates
        .iter()
        .map(|c| (c.rhs_len, &c.rule_name))
        .collect();
    order.sort();
    match order.first() {
        Some(&(_, winner)) => candidates
            .iter()
            .rposition(|c| &c.rule_name == winner)
            .unwrap_or(0),
        None => 0,
    }
}

/// Earley parser over a token sequence.
pub struct Parser<V> {
    grammar: Grammar<V>,
    resolver: Resolver,
    type_hint: Option<TypeHint>,
}

impl<V> Parser<V> {
    pub fn new(grammar: Grammar<V>) -> Self {
        Self {
            grammar,
            resolver: Box::new(default_resolver),
            type_hint: None,
        }
    }

    pub fn grammar(&self) -> &Grammar<V> {
        &self.grammar
    }

    /// Mutable access for post-construction rule additions; any change
    /// flips the grammar's latch and the next parse recomputes FIRST.
    pub fn grammar_mut(&mut self) -> &mut Grammar<V> {
        &mut self.grammar
    }

    /// Replace the ambiguity policy.
    pub fn set_resolver(&mut self, resolver: Resolver) {
        self.resolver = resolver;
    }

    /// Install a token-typing hint. With one in place the predictor
    /// filters expansions by FIRST sets; without, it uses the weaker
    /// leading-terminal filter on every prediction.
    pub fn set_type_hint(&mut self, hint: TypeHint) {
        self.type_hint = Some(hint);
    }

    /// Run the recognizer and return the tokens (EOF appended) plus the
    /// back-pointer map, or the syntax error.
    fn recognize(&mut self, tokens: &[Token]) -> Result<(Vec<Token>, BackMap), ParseError> {
        self.grammar.precompute();

        let mut toks: Vec<Token> = tokens.to_vec();
        let eof_pos = toks.last().map_or(0, |t| t.pos);
        toks.push(Token::new(EOF_SYMBOL, "", eof_pos));
        let n = toks.len();

        let mut chart: Vec<StateSet> = Vec::with_capacity(n + 1);
        let mut seed = StateSet::default();
        seed.push(Item {
            prod: self.grammar.start_production(),
            dot: 0,
            origin: 0,
        });
        chart.push(seed);

        let mut back = BackMap::new();
        let mut last = 0;
        for i in 0..n {
            chart.push(StateSet::default());
            last = i;
            if chart[i].items.is_empty() {
                break;
            }
            trace!("building cell {i} on token '{}'", toks[i]);
            self.build_state(&toks[i], &mut chart, i, &mut back);
        }

        let accepting = Item {
            prod: self.grammar.start_production(),
            dot: 2,
            origin: 0,
        };
        if last < n - 1 || !chart[last + 1].seen.contains(&accepting) {
            let near = &toks[last.saturating_sub(1)];
            return Err(ParseError::syntax_err(
                &format!("syntax error at or near '{near}'"),
                near.pos,
            ));
        }
        info!(
            "chart accepted: {} cells, {} back-pointer keys",
            chart.len(),
            back.keys().count()
        );
        Ok((toks, back))
    }

    /// One pass over cell `i`, in append order.
    fn build_state(&self, tok: &Token, chart: &mut [StateSet], i: usize, back: &mut BackMap) {
        // empty-RHS completions observed in this cell, by LHS
        let mut needs_completion: HashMap<SmolStr, ItemAt> = HashMap::new();
        // symbols already expanded in this cell
        let mut predicted: HashSet<SmolStr> = HashSet::new();

        let ttype: Option<SmolStr> = if tok.kind != EOF_SYMBOL {
            self.type_hint.as_ref().and_then(|hint| hint(tok))
        } else {
            None
        };

        let mut idx = 0;
        while idx < chart[i].items.len() {
            let item = chart[i].items[idx];
            let prod = self.grammar.prod(item.prod);

            if item.dot == prod.rhs().len() {
                // completer
                trace!("COMPLETER {} @ {}:{}", prod.lhs(), item.origin, i);
                if prod.rhs().is_empty() {
                    needs_completion.insert(prod.lhs.clone(), (item, i));
                }

                // walk the origin cell for parents expecting this LHS; cap
                // at the current item when the origin is this very cell so
                // the completer never feeds on its own output mid-pass
                let limit = if item.origin == i {
                    idx
                } else {
                    chart[item.origin].items.len()
                };
                let lhs = prod.lhs.clone();
                let parents: Vec<Item> = chart[item.origin].items[..limit].to_vec();
                for parent in parents {
                    let prhs = self.grammar.prod(parent.prod).rhs();
                    if parent.dot < prhs.len() && prhs[parent.dot] == lhs {
                        let advanced = Item {
                            prod: parent.prod,
                            dot: parent.dot + 1,
                            origin: parent.origin,
                        };
                        chart[i].push(advanced);
                        back.insert((advanced, i), (item, i));
                    }
                }
                idx += 1;
                continue;
            }

            let next = prod.rhs()[item.dot].clone();
            match self.grammar.classify(&next) {
                Symbol::Nonterm(nt) => {
                    // a same-cell empty derivation may already have
                    // completed this nonterminal; advance over it now
                    if let Some(&done) = needs_completion.get(&nt) {
                        let advanced = Item {
                            prod: item.prod,
                            dot: item.dot + 1,
                            origin: item.origin,
                        };
                        chart[i].push(advanced);
                        back.insert((advanced, i), done);
                    }

                    if predicted.insert(nt.clone()) {
                        debug!("PREDICTOR {nt} @ {i}");
                        self.predict(&nt, tok, ttype.as_deref(), &mut chart[i], i);
                    }
                }
                Symbol::Terminal(t) => {
                    // scanner: advance into the next cell on a kind match
                    if tok.matches(&t) {
                        trace!("SCANNER {t} @ {i}");
                        chart[i + 1].push(Item {
                            prod: item.prod,
                            dot: item.dot + 1,
                            origin: item.origin,
                        });
                    }
                }
            }
            idx += 1;
        }
    }

    /// Expand a nonterminal into cell `i`, filtering what cannot start at
    /// the current token.
    fn predict(&self, nt: &SmolStr, tok: &Token, ttype: Option<&str>, cell: &mut StateSet, i: usize) {
        for &pid in self.grammar.prods_of(nt) {
            let prhs = self.grammar.prod(pid).rhs();
            let new = Item { prod: pid, dot: 0, origin: i };

            match ttype {
                Some(tt) => {
                    // FIRST-filtered predictor: empty RHS always enters;
                    // a leading terminal must equal the token type; a
                    // leading nonterminal must be nullable or have the
                    // type in FIRST
                    if prhs.is_empty() {
                        cell.push(new);
                        continue;
                    }
                    let lead = &prhs[0];
                    if !self.grammar.is_nonterminal(lead) {
                        if lead == tt {
                            cell.push(new);
                        }
                        continue;
                    }
                    match self.grammar.first_of(lead) {
                        Some(first) if !first.is_nullable() && !first.contains(tt) => {}
                        _ => {
                            cell.push(new);
                        }
                    }
                }
                None => {
                    // weaker filter: skip a production whose leading
                    // symbol is a terminal the current token does not
                    // match. The comparison is against the token itself,
                    // which here means its kind; see DESIGN.md.
                    if let Some(lead) = prhs.first() {
                        if !self.grammar.is_nonterminal(lead) && !tok.matches(lead) {
                            continue;
                        }
                    }
                    cell.push(new);
                }
            }
        }
    }

    fn choose(&self, children: &[ItemAt]) -> Result<ItemAt, ParseError> {
        if children.len() == 1 {
            return Ok(children[0]);
        }
        let candidates: Vec<Candidate> = children
            .iter()
            .map(|&(it, _)| {
                let prod = self.grammar.prod(it.prod);
                Candidate {
                    rule_name: prod.display.clone(),
                    rhs_len: prod.rhs.len(),
                }
            })
            .collect();
        let pick = (self.resolver)(&candidates);
        children.get(pick).copied().ok_or_else(|| {
            ParseError::internal_err(&format!(
                "ambiguity resolver chose {pick} among {} candidates",
                children.len()
            ))
        })
    }

    /// Materialize the accepted parse into a plain syntax tree, skipping
    /// user actions: every production contributes a node labeled with its
    /// LHS, every scanned terminal a leaf. The synthetic start production
    /// and the EOF sentinel leave no trace.
    pub fn parse_to_tree(&mut self, tokens: &[Token]) -> Result<SynTree, ParseError> {
        let (toks, back) = self.recognize(tokens)?;
        let accepting = Item {
            prod: self.grammar.start_production(),
            dot: 2,
            origin: 0,
        };
        let mut arena = Arena::new();
        let root = arena.new_node(TreeContent::Root);
        self.build_tree(&mut arena, root, &toks, -1, &back, (accepting, toks.len()))?;
        Ok(SynTree::new(arena, root))
    }

    fn build_tree(
        &self,
        arena: &mut Arena<TreeContent>,
        parent: NodeId,
        toks: &[Token],
        mut tokpos: isize,
        back: &BackMap,
        root: ItemAt,
    ) -> Result<isize, ParseError> {
        let (item, mut state) = root;
        let prod = self.grammar.prod(item.prod);

        let this = if item.prod == self.grammar.start_production() {
            parent
        } else {
            let nid = arena.new_node(TreeContent::Node(prod.lhs.clone()));
            parent.prepend(nid, arena);
            nid
        };

        let mut dot = item.dot;
        while dot > 0 {
            let want = (Item { prod: item.prod, dot, origin: item.origin }, state);
            match back.get_vec(&want) {
                None => {
                    // scanner advance: recover the terminal from the stream
                    dot -= 1;
                    state = checked_dec(state)?;
                    let tok = token_at(toks, tokpos)?;
                    if tok.kind != EOF_SYMBOL {
                        let leaf = arena.new_node(TreeContent::Leaf(tok.clone()));
                        this.prepend(leaf, arena);
                    }
                    tokpos -= 1;
                }
                Some(children) => {
                    let child = self.choose(children)?;
                    tokpos = self.build_tree(arena, this, toks, tokpos, back, child)?;
                    dot -= 1;
                    state = child.0.origin;
                }
            }
        }
        let _ = state;
        Ok(tokpos)
    }
}

impl<V: FromToken> Parser<V> {
    /// Parse a token sequence; the result is whatever the root
    /// production's action returned. A synthetic EOF token is appended
    /// before recognition. The chart and back-pointer map live only for
    /// this call.
    pub fn parse(&mut self, tokens: &[Token]) -> Result<V, ParseError> {
        let (toks, back) = self.recognize(tokens)?;
        let accepting = Item {
            prod: self.grammar.start_production(),
            dot: 2,
            origin: 0,
        };
        let mut stack: VecDeque<V> = VecDeque::new();
        self.build_value(&mut stack, &toks, -1, &back, (accepting, toks.len()))?;
        stack
            .pop_front()
            .ok_or_else(|| ParseError::internal_err("reconstruction produced no result"))
    }

    /// Walk the back-pointers of one item right-to-left, pushing child
    /// values onto the front of the shared stack, then reduce them with
    /// the production's action. `tokpos` is the token cursor, counted
    /// backwards from the end of the stream.
    fn build_value(
        &self,
        stack: &mut VecDeque<V>,
        toks: &[Token],
        mut tokpos: isize,
        back: &BackMap,
        root: ItemAt,
    ) -> Result<isize, ParseError> {
        let (item, mut state) = root;
        let mut dot = item.dot;
        while dot > 0 {
            let want = (Item { prod: item.prod, dot, origin: item.origin }, state);
            match back.get_vec(&want) {
                None => {
                    // no entry means the advance over the symbol left of
                    // the dot was a scanner step
                    dot -= 1;
                    state = checked_dec(state)?;
                    let tok = token_at(toks, tokpos)?;
                    stack.push_front(V::from_token(tok));
                    tokpos -= 1;
                }
                Some(children) => {
                    // a completer step; more than one child is ambiguity
                    let child = self.choose(children)?;
                    tokpos = self.build_value(stack, toks, tokpos, back, child)?;
                    dot -= 1;
                    state = child.0.origin;
                }
            }
        }
        let _ = state;

        let prod = self.grammar.prod(item.prod);
        let arity = prod.rhs.len();
        if stack.len() < arity {
            return Err(ParseError::internal_err(
                "child stack underflow during reconstruction",
            ));
        }
        let children: Vec<V> = stack.drain(..arity).collect();
        let value = (prod.action)(children);
        stack.push_front(value);
        Ok(tokpos)
    }
}

fn checked_dec(state: usize) -> Result<usize, ParseError> {
    state
        .checked_sub(1)
        .ok_or_else(|| ParseError::internal_err("state cursor underflow during reconstruction"))
}

/// Index the token stream from its end: `-1` is the last token.
fn token_at(toks: &[Token], tokpos: isize) -> Result<&Token, ParseError> {
    usize::try_from(toks.len() as isize + tokpos)
        .ok()
        .and_then(|ix| toks.get(ix))
        .ok_or_else(|| ParseError::internal_err("token cursor underflow during reconstruction"))
}
