//! Item-level Rust syntax for Rustle.
//!
//! This is not a full Rust parser. It recovers the parts of a file that path-based
//! refactorings care about:
//! - the item tree (modules, `use` trees, declarations, impls) with ranges
//! - visibility modifiers, including `pub(in path)` restrictions
//! - every path occurrence, with per-segment ranges and turbofish arguments
//! - identifiers in pattern position and method-call names
//!
//! Expressions are scanned, not parsed: anything that looks like a path is recorded and
//! semantic filtering is left to `rustle-resolve`.

mod ast;
mod lexer;
mod parser;
mod range;

pub use ast::{
    Item, ItemKind, ModBody, Name, PathContext, PathSyntax, Segment, SourceFile, UseTree,
    UseTreeKind, VisKind, VisSyntax,
};
pub use lexer::{lex, Token, TokenKind};
pub use parser::{is_keyword, parse_file, parse_path_text, parse_use_text};
pub use range::TextRange;

/// Leading whitespace of the line containing `offset`.
pub fn line_indent(text: &str, offset: usize) -> &str {
    let offset = offset.min(text.len());
    let line_start = text[..offset].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let rest = &text[line_start..];
    let indent_len = rest
        .find(|ch: char| ch != ' ' && ch != '\t')
        .unwrap_or(rest.len());
    &rest[..indent_len]
}

/// Offset of the start of the line containing `offset`.
pub fn line_start(text: &str, offset: usize) -> usize {
    let offset = offset.min(text.len());
    text[..offset].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}
