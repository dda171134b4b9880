//! Instruction bindings: C templates attached to procedures.
//!
//! A template is C text with placeholders: `{name}` for a parameter and
//! `{stride(name, d)}` for a statically resolved stride of a buffer
//! parameter. Placeholders are checked against the signature when the
//! procedure is built.

use snafu::ensure;

use crate::error::*;
use crate::procedure::ProcDef;
use crate::types::Sym;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Param(Sym),
    Stride(Sym, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrTemplate {
    source: String,
    pieces: Vec<Piece>,
}

fn unresolved(placeholder: &str, message: impl Into<String>) -> Error {
    Error::UnresolvedPlaceholder { instr: String::new(), placeholder: placeholder.to_string(), message: message.into() }
}

fn parse_placeholder(text: &str) -> Result<Piece> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix("stride(").and_then(|rest| rest.strip_suffix(')')) {
        let Some((name, dim)) = inner.split_once(',') else {
            return Err(unresolved(text, "expected stride(name, dim)"));
        };
        let dim = dim.trim().parse::<usize>().map_err(|_| unresolved(text, "stride dimension must be a literal"))?;
        return Ok(Piece::Stride(Sym::new(name.trim()), dim));
    }
    let is_ident = text.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    ensure!(is_ident, UnresolvedPlaceholderSnafu { instr: "", placeholder: text, message: "not a parameter name" });
    Ok(Piece::Param(Sym::new(text)))
}

impl InstrTemplate {
    /// Split a template into text and placeholders.
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut pieces = Vec::new();
        let mut rest = source.as_str();
        while let Some(open) = rest.find('{') {
            if open > 0 {
                pieces.push(Piece::Text(rest[..open].to_string()));
            }
            let Some(close) = rest[open..].find('}') else {
                return Err(unresolved(&rest[open..], "unterminated placeholder"));
            };
            pieces.push(parse_placeholder(&rest[open + 1..open + close])?);
            rest = &rest[open + close + 1..];
        }
        if !rest.is_empty() {
            pieces.push(Piece::Text(rest.to_string()));
        }
        Ok(Self { source, pieces })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Check every placeholder against the signature of `def`.
    pub fn validate(&self, def: &ProcDef) -> Result<()> {
        let instr = def.name.as_str();
        for piece in &self.pieces {
            match piece {
                Piece::Text(_) => {}
                Piece::Param(name) => {
                    ensure!(
                        def.param(name).is_some(),
                        UnresolvedPlaceholderSnafu { instr, placeholder: name.as_str(), message: "no such parameter" }
                    );
                }
                Piece::Stride(name, dim) => {
                    let placeholder = format!("stride({name}, {dim})");
                    let Some(param) = def.param(name) else {
                        return UnresolvedPlaceholderSnafu { instr, placeholder, message: "no such parameter" }.fail();
                    };
                    ensure!(
                        *dim < param.ty.rank(),
                        UnresolvedPlaceholderSnafu {
                            instr,
                            placeholder,
                            message: format!("'{name}' has rank {}", param.ty.rank()),
                        }
                    );
                }
            }
        }
        Ok(())
    }

    /// Substitute placeholders.
    pub fn render(&self, param: impl Fn(&Sym) -> String, stride: impl Fn(&Sym, usize) -> String) -> String {
        self.pieces
            .iter()
            .map(|piece| match piece {
                Piece::Text(text) => text.clone(),
                Piece::Param(name) => param(name),
                Piece::Stride(name, dim) => stride(name, *dim),
            })
            .collect()
    }
}
