//! Recommended-buffer-size expression evaluator (spec.md §9)
//!
//! The host application lets a user configure "recommended frame buffer
//! size" as a small formula over three bound variables: `m` (frames per
//! series), `snake` (boolean), and `p` (an opaque user value, here a
//! plain number). Rather than embed a scripting engine, this is a
//! hand-rolled recursive-descent parser/evaluator for exactly the grammar
//! spec.md names: `+ - * / ( ) ?:`, plus numeric literals and the three
//! bound identifiers. A formula using anything outside this grammar
//! (string concatenation, function calls, ...) is out of scope here —
//! spec.md explicitly routes that case to a host-language callback, which
//! is represented by `Formula::Callback`.

use std::fmt;

use crate::tiff::errors::{TiffError, TiffResult};

/// The three variables a recommended-buffer-size formula may reference.
#[derive(Debug, Clone, Copy)]
pub struct FormulaVars {
    pub m: f64,
    pub snake: bool,
    pub p: f64,
}

/// A parsed formula, or an escape hatch to a caller-supplied evaluator for
/// formulas outside the `+ - * / ( ) ?:` grammar.
pub enum Formula {
    Expr(Expr),
    Callback(Box<dyn Fn(FormulaVars) -> f64 + Send + Sync>),
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Expr(e) => write!(f, "Formula::Expr({:?})", e),
            Formula::Callback(_) => write!(f, "Formula::Callback(..)"),
        }
    }
}

impl Formula {
    pub fn parse(source: &str) -> TiffResult<Self> {
        Ok(Formula::Expr(Parser::new(source).parse_ternary()?))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(FormulaVars) -> f64 + Send + Sync + 'static,
    {
        Formula::Callback(Box::new(f))
    }

    pub fn evaluate(&self, vars: FormulaVars) -> f64 {
        match self {
            Formula::Expr(e) => e.evaluate(vars),
            Formula::Callback(f) => f(vars),
        }
    }
}

/// A parsed arithmetic expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64),
    VarM,
    VarSnake,
    VarP,
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    /// `cond ? then : else`; `cond` is truthy when nonzero.
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn evaluate(&self, vars: FormulaVars) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::VarM => vars.m,
            Expr::VarSnake => {
                if vars.snake {
                    1.0
                } else {
                    0.0
                }
            }
            Expr::VarP => vars.p,
            Expr::Neg(e) => -e.evaluate(vars),
            Expr::Add(a, b) => a.evaluate(vars) + b.evaluate(vars),
            Expr::Sub(a, b) => a.evaluate(vars) - b.evaluate(vars),
            Expr::Mul(a, b) => a.evaluate(vars) * b.evaluate(vars),
            Expr::Div(a, b) => {
                let denom = b.evaluate(vars);
                if denom == 0.0 {
                    0.0
                } else {
                    a.evaluate(vars) / denom
                }
            }
            Expr::Ternary(cond, then_e, else_e) => {
                if cond.evaluate(vars) != 0.0 {
                    then_e.evaluate(vars)
                } else {
                    else_e.evaluate(vars)
                }
            }
        }
    }
}

/// Recursive-descent parser, lowest to highest precedence:
/// ternary > additive > multiplicative > unary > primary.
struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self { chars: source.chars().collect(), pos: 0, source }
    }

    fn parse_ternary(&mut self) -> TiffResult<Expr> {
        let cond = self.parse_additive()?;
        self.skip_ws();
        if self.peek() == Some('?') {
            self.pos += 1;
            let then_e = self.parse_ternary()?;
            self.skip_ws();
            self.expect(':')?;
            let else_e = self.parse_ternary()?;
            Ok(Expr::Ternary(Box::new(cond), Box::new(then_e), Box::new(else_e)))
        } else {
            Ok(cond)
        }
    }

    fn parse_additive(&mut self) -> TiffResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    let right = self.parse_multiplicative()?;
                    left = Expr::Add(Box::new(left), Box::new(right));
                }
                Some('-') => {
                    self.pos += 1;
                    let right = self.parse_multiplicative()?;
                    left = Expr::Sub(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> TiffResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    let right = self.parse_unary()?;
                    left = Expr::Mul(Box::new(left), Box::new(right));
                }
                Some('/') => {
                    self.pos += 1;
                    let right = self.parse_unary()?;
                    left = Expr::Div(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> TiffResult<Expr> {
        self.skip_ws();
        if self.peek() == Some('-') {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.peek() == Some('+') {
            self.pos += 1;
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> TiffResult<Expr> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_ternary()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() => self.parse_identifier(),
            other => Err(self.err(format!("unexpected character {:?} in formula", other))),
        }
    }

    fn parse_number(&mut self) -> TiffResult<Expr> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| self.err(format!("invalid number literal \"{}\"", text)))
    }

    fn parse_identifier(&mut self) -> TiffResult<Expr> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.as_str() {
            "m" => Ok(Expr::VarM),
            "snake" => Ok(Expr::VarSnake),
            "p" => Ok(Expr::VarP),
            other => Err(self.err(format!("unbound identifier \"{}\"", other))),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> TiffResult<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(format!("expected '{}'", expected)))
        }
    }

    fn err(&self, msg: String) -> TiffError {
        TiffError::ParameterMismatch(format!("formula \"{}\": {}", self.source, msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(m: f64, snake: bool, p: f64) -> FormulaVars {
        FormulaVars { m, snake, p }
    }

    #[test]
    fn arithmetic_precedence() {
        let f = Formula::parse("2 + 3 * 4").unwrap();
        assert_eq!(f.evaluate(vars(0.0, false, 0.0)), 14.0);
    }

    #[test]
    fn parentheses_override_precedence() {
        let f = Formula::parse("(2 + 3) * 4").unwrap();
        assert_eq!(f.evaluate(vars(0.0, false, 0.0)), 20.0);
    }

    #[test]
    fn ternary_selects_branch_on_snake() {
        let f = Formula::parse("snake ? m * 2 : m").unwrap();
        assert_eq!(f.evaluate(vars(5.0, true, 0.0)), 10.0);
        assert_eq!(f.evaluate(vars(5.0, false, 0.0)), 5.0);
    }

    #[test]
    fn variable_p_is_bound() {
        let f = Formula::parse("m + p").unwrap();
        assert_eq!(f.evaluate(vars(3.0, false, 4.0)), 7.0);
    }

    #[test]
    fn unbound_identifier_is_an_error() {
        assert!(Formula::parse("q + 1").is_err());
    }

    #[test]
    fn division_by_zero_is_zero_not_panic() {
        let f = Formula::parse("m / 0").unwrap();
        assert_eq!(f.evaluate(vars(5.0, false, 0.0)), 0.0);
    }

    #[test]
    fn callback_escape_hatch_bypasses_grammar() {
        let f = Formula::callback(|v| v.m * 100.0);
        assert_eq!(f.evaluate(vars(2.0, false, 0.0)), 200.0);
    }
}
