use crate::language::ast::OpKind;
use crate::language::errors::SyntaxError;
use crate::language::span::Span;
use crate::language::token::{Token, TokenKind};
use std::str::Chars;

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<SyntaxError>> {
    let mut lexer = Lexer::new(source);
    lexer.run();
    if lexer.errors.is_empty() {
        Ok(lexer.tokens)
    } else {
        Err(lexer.errors)
    }
}

struct Lexer<'a> {
    chars: Chars<'a>,
    current: Option<char>,
    offset: usize,
    word: String,
    word_start: usize,
    tokens: Vec<Token>,
    errors: Vec<SyntaxError>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            chars,
            current,
            offset: 0,
            word: String::new(),
            word_start: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn bump(&mut self) {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
    }

    fn push_token(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(SyntaxError::new(message, span));
    }

    fn run(&mut self) {
        while let Some(ch) = self.current {
            match ch {
                c if c.is_whitespace() => {
                    self.flush_word();
                    self.bump();
                }
                '(' => {
                    self.flush_word();
                    let span = Span::new(self.offset, self.offset + 1);
                    self.push_token(TokenKind::OpenParen, span);
                    self.bump();
                }
                ')' => {
                    self.flush_word();
                    let span = Span::new(self.offset, self.offset + 1);
                    self.push_token(TokenKind::CloseParen, span);
                    self.bump();
                }
                '"' => {
                    self.flush_word();
                    self.lex_string();
                }
                '\'' => {
                    self.flush_word();
                    self.lex_char();
                }
                _ => {
                    if self.word.is_empty() {
                        self.word_start = self.offset;
                    }
                    self.word.push(ch);
                    self.bump();
                }
            }
        }
        self.flush_word();
    }

    fn flush_word(&mut self) {
        if self.word.is_empty() {
            return;
        }
        let word = std::mem::take(&mut self.word);
        let span = Span::new(self.word_start, self.offset);
        let kind = classify(&word);
        self.push_token(kind, span);
    }

    fn lex_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut text = String::new();
        loop {
            match self.current {
                None => {
                    self.error("unterminated string literal", Span::new(start, self.offset));
                    return;
                }
                Some('"') => {
                    self.bump();
                    let span = Span::new(start, self.offset);
                    self.push_token(TokenKind::Str(text), span);
                    return;
                }
                Some('\\') => {
                    self.bump();
                    match self.current {
                        None => {
                            self.error(
                                "unterminated string literal",
                                Span::new(start, self.offset),
                            );
                            return;
                        }
                        Some(escaped) => {
                            text.push(unescape(escaped));
                            self.bump();
                        }
                    }
                }
                Some(ch) => {
                    text.push(ch);
                    self.bump();
                }
            }
        }
    }

    fn lex_char(&mut self) {
        let start = self.offset;
        self.bump();
        let value = match self.current {
            None => {
                self.error(
                    "unterminated character literal",
                    Span::new(start, self.offset),
                );
                return;
            }
            Some('\'') => {
                self.bump();
                self.error("empty character literal", Span::new(start, self.offset));
                return;
            }
            Some('\\') => {
                self.bump();
                match self.current {
                    None => {
                        self.error(
                            "unterminated character literal",
                            Span::new(start, self.offset),
                        );
                        return;
                    }
                    Some(escaped) => {
                        self.bump();
                        unescape(escaped)
                    }
                }
            }
            Some(ch) => {
                self.bump();
                ch
            }
        };
        if self.current != Some('\'') {
            self.error(
                "unterminated character literal",
                Span::new(start, self.offset),
            );
            return;
        }
        self.bump();
        let span = Span::new(start, self.offset);
        self.push_token(TokenKind::Char(value), span);
    }
}

fn unescape(ch: char) -> char {
    match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        'b' => '\u{8}',
        other => other,
    }
}

fn classify(word: &str) -> TokenKind {
    if let Some(op) = OpKind::from_keyword(word) {
        return TokenKind::Op(op);
    }
    match word {
        "true" => return TokenKind::Bool(true),
        "false" => return TokenKind::Bool(false),
        "NULL" => return TokenKind::Null,
        "{}" => return TokenKind::EmptyDict,
        _ => {}
    }
    if let Ok(value) = word.parse::<i64>() {
        return TokenKind::Int(value);
    }
    if let Ok(value) = word.parse::<f64>() {
        return TokenKind::Real(value);
    }
    TokenKind::Name(word.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn words_and_brackets() {
        assert_eq!(
            kinds("(set x 5)"),
            vec![
                TokenKind::OpenParen,
                TokenKind::Op(OpKind::Set),
                TokenKind::Name("x".into()),
                TokenKind::Int(5),
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn literal_classification() {
        assert_eq!(
            kinds("true false NULL {} 3.5 -2 [d+] plain"),
            vec![
                TokenKind::Bool(true),
                TokenKind::Bool(false),
                TokenKind::Null,
                TokenKind::EmptyDict,
                TokenKind::Real(3.5),
                TokenKind::Int(-2),
                TokenKind::Op(OpKind::DictInsert),
                TokenKind::Name("plain".into()),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\"c""#),
            vec![TokenKind::Str("a\tb\"c".into())]
        );
    }

    #[test]
    fn char_literals() {
        assert_eq!(
            kinds(r"'x' '\n'"),
            vec![TokenKind::Char('x'), TokenKind::Char('\n')]
        );
    }

    #[test]
    fn brackets_split_words() {
        assert_eq!(
            kinds("(add(x)y)"),
            vec![
                TokenKind::OpenParen,
                TokenKind::Op(OpKind::Add),
                TokenKind::OpenParen,
                TokenKind::Name("x".into()),
                TokenKind::CloseParen,
                TokenKind::Name("y".into()),
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn unterminated_string_reports() {
        let errors = lex("\"oops").expect_err("should fail");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unterminated string"));
        assert_eq!(errors[0].span.start, 0);
    }

    #[test]
    fn spans_are_byte_offsets() {
        let tokens = lex("(set abc 1)").expect("lex");
        let name = &tokens[2];
        assert_eq!(name.span, Span::new(5, 8));
    }
}
