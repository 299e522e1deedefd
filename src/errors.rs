use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No scanner rule matched at a position of the input.
    Lexical(String, usize),
    /// The chart did not accept; carries the position of the token
    /// before the failure.
    Syntax(String, usize),
    /// A grammar-definition bug rather than an input bug.
    Internal(String),
}

impl ParseError {
    pub fn lexical_err(msg: &str, pos: usize) -> Self {
        Self::Lexical(msg.to_string(), pos)
    }
    pub fn syntax_err(msg: &str, pos: usize) -> Self {
        Self::Syntax(msg.to_string(), pos)
    }
    pub fn internal_err(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }

    /// The input position the error refers to, when it has one.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Lexical(_, pos) | Self::Syntax(_, pos) => Some(*pos),
            Self::Internal(_) => None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Self::Lexical(e, pos) => write!(f, "LexicalError at {pos}: {e}"),
            Self::Syntax(e, pos) => write!(f, "SyntaxError at {pos}: {e}"),
            Self::Internal(e) => write!(f, "InternalError: {e}"),
        }
    }
}

impl std::error::Error for ParseError {}
