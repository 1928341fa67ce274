use crate::language::ast::OpKind;
use crate::language::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    OpenParen,
    CloseParen,
    Op(OpKind),
    Name(String),
    Bool(bool),
    Char(char),
    Int(i64),
    Real(f64),
    Str(String),
    Null,
    EmptyDict,
}
