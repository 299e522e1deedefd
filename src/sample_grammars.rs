//! Ready-made scanners and grammars, mostly exercised by the integration
//! tests. They double as worked examples of the registration surface.

use crate::errors::ParseError;
use crate::grammar::Grammar;
use crate::scanner::{Scanner, ScannerBuilder};
use crate::tokens::{FromToken, Token};

/// The child value the sample grammars build their results from.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    Text(String),
    List(Vec<Value>),
    Token(Token),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Token(tok) => tok.value.parse().ok(),
            _ => None,
        }
    }

    /// Nesting depth of `List` values; everything else counts zero.
    pub fn depth(&self) -> usize {
        match self {
            Value::List(kids) => 1 + kids.iter().map(Value::depth).max().unwrap_or(0),
            _ => 0,
        }
    }
}

impl FromToken for Value {
    fn from_token(tok: &Token) -> Self {
        Value::Token(tok.clone())
    }
}

/// Lowercase words only; anything else trips the default rule.
pub fn word_scanner() -> Result<Scanner, ParseError> {
    ScannerBuilder::new()
        .token("t_ident", "[a-z]+", "ident")
        .build()
}

/// A keyword rule competing with a general word rule. `t_if` sorts before
/// `t_word`, so on the tied match `if` the keyword wins.
pub fn keyword_scanner() -> Result<Scanner, ParseError> {
    ScannerBuilder::new()
        .token("t_if", "if", "if")
        .token("t_word", "[a-z]+", "word")
        .skip("t_space", " +")
        .build()
}

/// Two-state lexing: a double quote flips the scanner into the string
/// state, where the interior is swallowed whole; the closing quote flips
/// it back.
pub fn quoted_scanner() -> Result<Scanner, ParseError> {
    ScannerBuilder::new()
        .token("t_word", "[a-z]+", "word")
        .skip("t_space", " +")
        .rule("t_quote", "\"", |cursor, _text, _pos| {
            cursor.set_state(Some("string"));
            Ok(())
        })
        .state_token("t_text", "string", "[^\"]+", "str")
        .state_rule("t_unquote", "string", "\"", |cursor, _text, _pos| {
            cursor.set_state(None);
            Ok(())
        })
        .build()
}

/// Arithmetic tokens for the calculator grammars.
pub fn calc_scanner() -> Result<Scanner, ParseError> {
    ScannerBuilder::new()
        .token("t_num", "[0-9]+", "num")
        .token("t_plus", r"\+", "+")
        .token("t_times", r"\*", "*")
        .skip("t_space", " +")
        .build()
}

/// `root ::= a b` — the smallest two-terminal sequence.
pub fn pair_grammar() -> Grammar<Value> {
    let mut g = Grammar::new("root");
    g.rule("p_pair", "root ::= a b", Value::List);
    g
}

/// Left recursion over an empty base: `root ::= | root x`.
pub fn list_grammar() -> Grammar<Value> {
    let mut g = Grammar::new("root");
    g.rule("p_empty", "root ::=", |_| Value::Nil);
    g.rule("p_grow", "root ::= root x", Value::List);
    g
}

/// The classic ambiguous sum: `expr ::= expr + expr | 1`.
pub fn sum_grammar() -> Grammar<Value> {
    let mut g: Grammar<Value> = Grammar::new("expr");
    g.rule("p_sum", "expr ::= expr + expr", |kids| {
        let l = kids[0].as_int().unwrap_or(0);
        let r = kids[2].as_int().unwrap_or(0);
        Value::Int(l + r)
    });
    g.rule("p_one", "expr ::= 1", |_| Value::Int(1));
    g
}

/// An unambiguous layered calculator over the [`calc_scanner`] tokens.
pub fn calc_grammar() -> Grammar<Value> {
    let mut g: Grammar<Value> = Grammar::new("sum");
    g.rule("p_sum_plus", "sum ::= sum + prod", |kids| {
        let l = kids[0].as_int().unwrap_or(0);
        let r = kids[2].as_int().unwrap_or(0);
        Value::Int(l + r)
    });
    g.rule("p_sum_unit", "sum ::= prod", |mut kids| kids.remove(0));
    g.rule("p_prod_times", "prod ::= prod * num", |kids| {
        let l = kids[0].as_int().unwrap_or(0);
        let r = kids[2].as_int().unwrap_or(0);
        Value::Int(l * r)
    });
    g.rule("p_prod_unit", "prod ::= num", |kids: Vec<Value>| {
        Value::Int(kids[0].as_int().unwrap_or(0))
    });
    g
}

/// The start symbol derives empty only through a chain of unit rules.
pub fn nullable_chain_grammar() -> Grammar<Value> {
    let mut g = Grammar::new("root");
    g.rule("p_root", "root ::= a", |mut kids| kids.remove(0));
    g.rule("p_a", "a ::= b", |mut kids| kids.remove(0));
    g.rule("p_b", "b ::=", |_| Value::Nil);
    g
}
