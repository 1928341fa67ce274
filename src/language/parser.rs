use crate::language::ast::{Node, NodeKind};
use crate::language::errors::SyntaxError;
use crate::language::names::NameTable;
use crate::language::span::Span;
use crate::language::token::{Token, TokenKind};
use std::rc::Rc;

/// Parses a token stream into a sequence of top-level forms.
pub fn parse_program(
    tokens: &[Token],
    names: &mut NameTable,
) -> Result<Vec<Rc<Node>>, SyntaxError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        names,
    };
    let mut program = Vec::new();
    while parser.pos < parser.tokens.len() {
        program.push(parser.parse_form()?);
    }
    Ok(program)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    names: &'a mut NameTable,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<&Token, SyntaxError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| SyntaxError::new("expected a token", self.end_span()))?;
        self.pos += 1;
        Ok(token)
    }

    fn end_span(&self) -> Span {
        match self.tokens.last() {
            Some(token) => Span::new(token.span.end, token.span.end),
            None => Span::new(0, 0),
        }
    }

    fn parse_form(&mut self) -> Result<Rc<Node>, SyntaxError> {
        let token = self.advance()?.clone();
        match token.kind {
            TokenKind::Bool(b) => Ok(Node::leaf(NodeKind::Bool(b), token.span)),
            TokenKind::Char(c) => Ok(Node::leaf(NodeKind::Char(c), token.span)),
            TokenKind::Int(i) => Ok(Node::leaf(NodeKind::Int(i), token.span)),
            TokenKind::Real(r) => Ok(Node::leaf(NodeKind::Real(r), token.span)),
            TokenKind::Str(s) => Ok(Node::leaf(NodeKind::Str(s), token.span)),
            TokenKind::Null => Ok(Node::leaf(NodeKind::Null, token.span)),
            TokenKind::EmptyDict => Ok(Node::leaf(NodeKind::Dict, token.span)),
            TokenKind::Name(text) => {
                let id = self.names.intern(&text);
                Ok(Node::leaf(NodeKind::Name(id), token.span))
            }
            TokenKind::Op(_) | TokenKind::CloseParen => Err(SyntaxError::new(
                "expected an open bracket",
                token.span,
            )),
            TokenKind::OpenParen => self.parse_bracketed(token.span),
        }
    }

    fn parse_bracketed(&mut self, open: Span) -> Result<Rc<Node>, SyntaxError> {
        let head = self
            .peek()
            .ok_or_else(|| SyntaxError::new("expected a token", self.end_span()))?
            .clone();
        let kind = match head.kind {
            TokenKind::CloseParen => {
                self.pos += 1;
                return Ok(Node::leaf(NodeKind::Block, open.merge(head.span)));
            }
            TokenKind::Op(op) => {
                self.pos += 1;
                NodeKind::Op(op)
            }
            // A bracketed head makes the whole form a block of forms.
            TokenKind::OpenParen => NodeKind::Block,
            _ => {
                return Err(SyntaxError::new(
                    "expected a keyword or an open bracket",
                    head.span,
                )
                .with_help("forms are written in prefix notation: (keyword operands...)"));
            }
        };
        let mut kids = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::new(
                        "expected a closing bracket",
                        self.end_span(),
                    ));
                }
                Some(token) if token.kind == TokenKind::CloseParen => {
                    let close = token.span;
                    self.pos += 1;
                    return Ok(Rc::new(Node {
                        kind,
                        span: open.merge(close),
                        kids,
                    }));
                }
                Some(_) => kids.push(self.parse_form()?),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ast::OpKind;
    use crate::language::lexer::lex;

    fn parse(source: &str) -> Vec<Rc<Node>> {
        let tokens = lex(source).expect("lex");
        let mut names = NameTable::new();
        parse_program(&tokens, &mut names).expect("parse")
    }

    fn parse_err(source: &str) -> SyntaxError {
        let tokens = lex(source).expect("lex");
        let mut names = NameTable::new();
        parse_program(&tokens, &mut names).expect_err("should fail")
    }

    #[test]
    fn operation_form() {
        let program = parse("(set x (add 1 2))");
        assert_eq!(program.len(), 1);
        let set = &program[0];
        assert!(matches!(set.kind, NodeKind::Op(OpKind::Set)));
        assert_eq!(set.kids.len(), 2);
        assert!(matches!(set.kids[0].kind, NodeKind::Name(_)));
        let add = &set.kids[1];
        assert!(matches!(add.kind, NodeKind::Op(OpKind::Add)));
        assert_eq!(add.kids.len(), 2);
    }

    #[test]
    fn empty_block() {
        let program = parse("()");
        assert!(matches!(program[0].kind, NodeKind::Block));
        assert!(program[0].kids.is_empty());
    }

    #[test]
    fn block_of_forms() {
        let program = parse("((set x 1) (set y 2))");
        let block = &program[0];
        assert!(matches!(block.kind, NodeKind::Block));
        assert_eq!(block.kids.len(), 2);
    }

    #[test]
    fn literal_heads_are_rejected() {
        let err = parse_err("(5 1 2)");
        assert!(err.message.contains("expected a keyword"));
    }

    #[test]
    fn missing_close_is_reported_at_end() {
        let err = parse_err("(set x 1");
        assert!(err.message.contains("closing bracket"));
        assert_eq!(err.span.start, 8);
    }

    #[test]
    fn bare_keyword_is_rejected() {
        let err = parse_err("set");
        assert!(err.message.contains("open bracket"));
    }

    #[test]
    fn node_spans_cover_the_form() {
        let program = parse("(neg 7)");
        assert_eq!(program[0].span, Span::new(0, 7));
        assert_eq!(program[0].kids[0].span, Span::new(5, 6));
    }

    #[test]
    fn same_name_interns_once() {
        let tokens = lex("(set x (add x x))").expect("lex");
        let mut names = NameTable::new();
        parse_program(&tokens, &mut names).expect("parse");
        assert_eq!(names.len(), 1);
    }
}
