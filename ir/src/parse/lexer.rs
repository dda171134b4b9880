//! Tokenizer producing indentation-aware Indent and Dedent tokens.

use crate::error::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Punct(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub col: usize,
}

const PUNCT: &[&str] = &[
    "+=", "==", "!=", "<=", ">=", "(", ")", "[", "]", ",", ":", ".", "=", "+", "-", "*", "/", "%", "<", ">", "@", "#",
];

fn syntax<T>(line: usize, col: usize, message: impl Into<String>) -> Result<T> {
    SyntaxSnafu { line, col, message: message.into() }.fail()
}

/// Tokenize one logical line (no indentation handling).
fn lex_line(text: &str, line: usize, out: &mut Vec<Token>) -> Result<()> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let col = i + 1;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.push(Token { tok: Tok::Ident(chars[start..i].iter().collect()), line, col });
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            let mut float = false;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < chars.len() && chars[i] == '.' && chars.get(i + 1).is_none_or(|d| d.is_ascii_digit()) {
                float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    float = true;
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let bad_number = || Error::Syntax { line, col, message: format!("bad number {text}") };
            let tok = if float {
                Tok::Float(text.parse().map_err(|_| bad_number())?)
            } else {
                Tok::Int(text.parse().map_err(|_| bad_number())?)
            };
            out.push(Token { tok, line, col });
            continue;
        }
        if c == '"' {
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return syntax(line, col, "unterminated string"),
                    Some('"') => break,
                    Some('\\') => {
                        let escaped = match chars.get(i + 1) {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some('"') => '"',
                            Some('\\') => '\\',
                            _ => return syntax(line, i + 1, "bad escape"),
                        };
                        value.push(escaped);
                        i += 2;
                    }
                    Some(other) => {
                        value.push(*other);
                        i += 1;
                    }
                }
            }
            i += 1;
            out.push(Token { tok: Tok::Str(value), line, col });
            continue;
        }
        let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
        match PUNCT.iter().find(|p| rest.starts_with(**p)) {
            Some(p) => {
                out.push(Token { tok: Tok::Punct(*p), line, col });
                i += p.len();
            }
            None => return syntax(line, col, format!("unexpected character '{c}'")),
        }
    }
    Ok(())
}

/// Tokenize a whole source text, emitting `Newline` after every non-blank
/// line and `Indent`/`Dedent` on indentation changes.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut levels = vec![0usize];
    let mut last_line = 0;
    for (number, raw) in source.lines().enumerate() {
        let line = number + 1;
        last_line = line;
        if raw.trim().is_empty() {
            continue;
        }
        if raw.starts_with('\t') {
            return syntax(line, 1, "tabs are not allowed for indentation");
        }
        let width = raw.len() - raw.trim_start_matches(' ').len();
        let current = levels.last().copied().unwrap_or(0);
        if width > current {
            levels.push(width);
            out.push(Token { tok: Tok::Indent, line, col: 1 });
        } else {
            while levels.last().is_some_and(|level| width < *level) {
                levels.pop();
                out.push(Token { tok: Tok::Dedent, line, col: 1 });
            }
            if levels.last() != Some(&width) {
                return syntax(line, 1, "inconsistent indentation");
            }
        }
        lex_line(raw, line, &mut out)?;
        out.push(Token { tok: Tok::Newline, line, col: raw.len() + 1 });
    }
    while levels.len() > 1 {
        levels.pop();
        out.push(Token { tok: Tok::Dedent, line: last_line + 1, col: 1 });
    }
    out.push(Token { tok: Tok::Eof, line: last_line + 1, col: 1 });
    Ok(out)
}

/// Tokenize a single line without indentation or newline tokens.
pub fn tokenize_line(source: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    lex_line(source, 1, &mut out)?;
    out.push(Token { tok: Tok::Eof, line: 1, col: source.len() + 1 });
    Ok(out)
}
