// Syntax front end: tokens -> AST.

pub mod ast;
mod lexer;
mod parser;

pub use ast::{Attrib, BinOp, Block, Chunk, Expr, FuncDef, Span, Stmt, TableItem, UnOp};
pub use parser::parse;

/// Error produced by the lexer or parser.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.span.line, self.span.col, self.message)
    }
}

impl std::error::Error for SyntaxError {}
