//! IMAP token types.

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted string without special characters). Flags such as
    /// `\Seen` and `\*` lex as atoms.
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    QuotedString(String),
    /// Literal payload following a `{n}` prefix, borrowed from the unit.
    Literal(&'a [u8]),
    /// Number.
    Number(u64),
    /// Opening parenthesis.
    LParen,
    /// Closing parenthesis.
    RParen,
    /// Opening bracket.
    LBracket,
    /// Closing bracket.
    RBracket,
    /// Space character.
    Space,
    /// Asterisk (untagged prefix or `*` in a sequence set).
    Asterisk,
    /// Plus (continuation prefix).
    Plus,
    /// NIL.
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}
