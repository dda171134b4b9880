//! Token cursor shared by the procedure and pattern parsers.

use super::lexer::{Tok, Token};
use crate::error::*;

pub struct TokenStream {
    toks: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    pub fn new(toks: Vec<Token>) -> Self {
        Self { toks, pos: 0 }
    }

    pub fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    pub fn peek_at(&self, offset: usize) -> &Tok {
        let last = self.toks.len().saturating_sub(1);
        self.toks.get((self.pos + offset).min(last)).map_or(&Tok::Eof, |t| &t.tok)
    }

    pub fn next(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.toks.len() {
            self.pos += 1;
        }
        tok
    }

    pub fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        let (line, col) = self.toks.get(self.pos).map_or((0, 0), |t| (t.line, t.col));
        SyntaxSnafu { line, col, message: message.into() }.fail()
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Tok::Punct(p) if *p == punct)
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Tok::Ident(name) if name == word)
    }

    pub fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.is_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    pub fn eat_keyword(&mut self, word: &str) -> bool {
        let found = self.is_keyword(word);
        if found {
            self.pos += 1;
        }
        found
    }

    pub fn expect_punct(&mut self, punct: &str) -> Result<()> {
        if self.eat_punct(punct) { Ok(()) } else { self.error(format!("expected '{punct}', found {:?}", self.peek())) }
    }

    pub fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if self.eat_keyword(word) { Ok(()) } else { self.error(format!("expected '{word}', found {:?}", self.peek())) }
    }

    pub fn expect_ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.pos += 1;
                Ok(name)
            }
            other => self.error(format!("expected a name, found {other:?}")),
        }
    }

    pub fn expect_int(&mut self) -> Result<i64> {
        match self.peek().clone() {
            Tok::Int(value) => {
                self.pos += 1;
                Ok(value)
            }
            other => self.error(format!("expected an integer, found {other:?}")),
        }
    }

    pub fn expect(&mut self, tok: Tok) -> Result<()> {
        if *self.peek() == tok {
            self.pos += 1;
            Ok(())
        } else {
            self.error(format!("expected {tok:?}, found {:?}", self.peek()))
        }
    }

    pub fn at_end(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }
}
