use std::collections::HashMap;

use crate::license::spdx::{classify_spdx_id, normalize};
use crate::models::LicenseRisk;

/// Classify a license string (free text or SPDX expression) into a risk tier.
///
/// `OR` keeps the most permissive operand, `AND` the most restrictive; `AND`
/// binds tighter, parentheses group, `WITH` exceptions are dropped and `/` is
/// read as `OR`. `overrides` are consulted for exact identifiers first.
pub fn classify(license: &str, overrides: &HashMap<String, LicenseRisk>) -> LicenseRisk {
    let trimmed = license.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
        return LicenseRisk::Unknown;
    }
    if let Some(risk) = overrides.get(trimmed) {
        return risk.clone();
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.contains("proprietary") || lower.contains("commercial") || lower.starts_with("see license in") {
        return LicenseRisk::Proprietary;
    }

    let normalized = normalize(trimmed).replace('/', " OR ");
    let tokens = tokenize(&normalized);
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        overrides,
    };
    parser.parse_or()
}

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Id(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Vec<Token> {
    let spaced = expr.replace('(', " ( ").replace(')', " ) ");
    spaced
        .split_whitespace()
        .map(|word| match word {
            "(" => Token::LParen,
            ")" => Token::RParen,
            w if w.eq_ignore_ascii_case("and") => Token::And,
            w if w.eq_ignore_ascii_case("or") => Token::Or,
            w if w.eq_ignore_ascii_case("with") => Token::With,
            w => Token::Id(w.to_string()),
        })
        .collect()
}

/// ```text
/// or_expr  := and_expr ( "OR" and_expr )*
/// and_expr := atom ( "AND" atom )*
/// atom     := "(" or_expr ")" | id ( "WITH" id )?
/// ```
struct ExprParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    overrides: &'a HashMap<String, LicenseRisk>,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> LicenseRisk {
        let mut risk = self.parse_and();
        while self.peek() == Some(&Token::Or) {
            self.bump();
            let rhs = self.parse_and();
            risk = more_permissive(risk, rhs);
        }
        risk
    }

    fn parse_and(&mut self) -> LicenseRisk {
        let mut risk = self.parse_atom();
        while self.peek() == Some(&Token::And) {
            self.bump();
            let rhs = self.parse_atom();
            risk = more_restrictive(risk, rhs);
        }
        risk
    }

    fn parse_atom(&mut self) -> LicenseRisk {
        match self.bump() {
            Some(Token::LParen) => {
                let risk = self.parse_or();
                if self.peek() == Some(&Token::RParen) {
                    self.bump();
                }
                risk
            }
            Some(Token::Id(id)) => {
                if self.peek() == Some(&Token::With) {
                    self.bump();
                    self.bump();
                }
                match self.overrides.get(&id) {
                    Some(risk) => risk.clone(),
                    None => classify_spdx_id(&id),
                }
            }
            _ => LicenseRisk::Unknown,
        }
    }
}

/// Permissive < weak copyleft < strong copyleft < proprietary; unknown ranks last
/// for OR so any known operand wins.
fn permissiveness(risk: &LicenseRisk) -> u8 {
    match risk {
        LicenseRisk::Permissive => 0,
        LicenseRisk::WeakCopyleft => 1,
        LicenseRisk::StrongCopyleft => 2,
        LicenseRisk::Proprietary => 3,
        LicenseRisk::Unknown => 4,
    }
}

fn more_permissive(a: LicenseRisk, b: LicenseRisk) -> LicenseRisk {
    if permissiveness(&b) < permissiveness(&a) {
        b
    } else {
        a
    }
}

/// Proprietary dominates; otherwise an unknown operand makes the whole AND unknown.
fn more_restrictive(a: LicenseRisk, b: LicenseRisk) -> LicenseRisk {
    match (&a, &b) {
        (LicenseRisk::Proprietary, _) | (_, LicenseRisk::Proprietary) => LicenseRisk::Proprietary,
        (LicenseRisk::Unknown, _) | (_, LicenseRisk::Unknown) => LicenseRisk::Unknown,
        _ if permissiveness(&b) > permissiveness(&a) => b,
        _ => a,
    }
}
