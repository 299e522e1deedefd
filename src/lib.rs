//! earlex is a small parsing toolkit built from two cooperating engines:
//! a longest-match tokenizer ([`scanner`]) and an Earley context-free
//! parser ([`parser`]).
//!
//! A grammar author registers tokenization rules (regex plus action) on a
//! [`scanner::ScannerBuilder`] and production rules (rule text plus
//! action) on a [`grammar::Grammar`], then feeds the scanner's tokens to
//! a [`parser::Parser`]. The parse result is whatever the root
//! production's action returned; alternatively
//! [`parser::Parser::parse_to_tree`] materializes the derivation as a
//! plain syntax tree without consulting the actions.
//!
//! Earley parsing handles any context-free grammar, ambiguous and
//! left-recursive ones included; ambiguity is resolved during tree
//! reconstruction by a pluggable policy.
//!
//! ```
//! use earlex::grammar::Grammar;
//! use earlex::parser::Parser;
//! use earlex::scanner::ScannerBuilder;
//! use earlex::tokens::{FromToken, Token};
//!
//! #[derive(Clone)]
//! struct Num(i64);
//! impl FromToken for Num {
//!     fn from_token(tok: &Token) -> Self {
//!         Num(tok.value.parse().unwrap_or(0))
//!     }
//! }
//!
//! let mut scanner = ScannerBuilder::new()
//!     .token("t_num", "[0-9]+", "num")
//!     .token("t_plus", r"\+", "+")
//!     .skip("t_space", " +")
//!     .build()
//!     .unwrap();
//! let tokens = scanner.tokenize("1 + 2 + 3").unwrap();
//!
//! let mut grammar = Grammar::new("sum");
//! grammar.rule("p_add", "sum ::= sum + num", |kids: Vec<Num>| Num(kids[0].0 + kids[2].0));
//! grammar.rule("p_num", "sum ::= num", |mut kids: Vec<Num>| kids.remove(0));
//!
//! let mut parser = Parser::new(grammar);
//! let Num(total) = parser.parse(&tokens).unwrap();
//! assert_eq!(total, 6);
//! ```

pub mod errors;
pub mod grammar;
pub mod parser;
pub mod sample_grammars;
pub mod scanner;
pub mod tokens;
pub mod tree;
