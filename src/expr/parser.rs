//! Recursive-descent parser.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! cmp   := expr (('<' | '<=' | '>' | '>=') expr)?   // non-associative, 1 or 0
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/') unary)*
//! unary := ('+' | '-') unary | power
//! power := atom ('^' unary)?          // right-associative
//! atom  := number | ident | ident '(' cmp ')' | '(' cmp ')'
//! ```
//!
//! `-x^2` therefore parses as `-(x^2)` and `2^-1` is accepted.
//!
//! Nesting (parentheses, calls, unary signs, exponents) is capped at
//! `MAX_DEPTH`, so the recursive parser and every recursive walk over the AST
//! run in bounded stack.

use super::ast::{BinaryOp, Constant, Expr, Function, UnaryOp};
use super::lexer::{Token, TokenKind, tokenize};
use super::ExprError;

/// Maximum nesting depth of an expression.
pub const MAX_DEPTH: usize = 256;

/// Parse a complete expression.
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(src)?;
    if matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::End)) {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.comparison()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // `tokenize` always terminates the stream with `End`.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &'static str) -> ExprError {
        let tok = self.peek();
        ExprError::UnexpectedToken {
            found: tok.kind.describe(),
            expected,
            offset: tok.offset,
        }
    }

    fn expect_end(&self) -> Result<(), ExprError> {
        match self.peek().kind {
            TokenKind::End => Ok(()),
            _ => Err(self.unexpected("an operator or end of input")),
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.expr()?;
        let op = match self.peek().kind {
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEq => BinaryOp::LessEq,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEq => BinaryOp::GreaterEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.expr()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    /// Every nested construct recurses through here.
    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExprError::TooDeep {
                offset: self.peek().offset,
                limit: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let out = self.signed();
        self.depth -= 1;
        out
    }

    fn signed(&mut self) -> Result<Expr, ExprError> {
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let inner = self.unary()?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)))
            }
            TokenKind::Plus => {
                self.advance();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.atom()?;
        if matches!(self.peek().kind, TokenKind::Caret) {
            self.advance();
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number(v) => {
                self.advance();
                Ok(Expr::Number(v))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if matches!(self.peek().kind, TokenKind::LParen) {
                    return self.call(name, tok.offset);
                }
                match Constant::from_name(&name) {
                    Some(c) => Ok(Expr::Constant(c)),
                    None => Ok(Expr::Symbol(name)),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.comparison()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            _ => Err(self.unexpected("a number, symbol or '('")),
        }
    }

    fn call(&mut self, name: String, offset: usize) -> Result<Expr, ExprError> {
        let func = Function::from_name(&name).ok_or_else(|| ExprError::UnknownFunction {
            name: name.clone(),
            offset,
        })?;
        // consume '('
        self.advance();
        let arg = self.comparison()?;
        if matches!(self.peek().kind, TokenKind::Comma) {
            return Err(ExprError::Arity { name });
        }
        self.expect_rparen()?;
        Ok(Expr::Call(func, Box::new(arg)))
    }

    fn expect_rparen(&mut self) -> Result<(), ExprError> {
        match self.peek().kind {
            TokenKind::RParen => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected("')'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Box<Expr> {
        Box::new(Expr::Symbol(name.to_string()))
    }

    #[test]
    fn precedence_of_mul_over_add() {
        let expr = parse("a*x+b").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Binary(BinaryOp::Mul, sym("a"), sym("x"))),
                sym("b"),
            )
        );
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        let expr = parse("-x^2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary(
                UnaryOp::Neg,
                Box::new(Expr::Binary(BinaryOp::Pow, sym("x"), Box::new(Expr::Number(2.0)))),
            )
        );
    }

    #[test]
    fn power_is_right_associative() {
        let expr = parse("a**b**c").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Pow,
                sym("a"),
                Box::new(Expr::Binary(BinaryOp::Pow, sym("b"), sym("c"))),
            )
        );
    }

    #[test]
    fn function_calls_and_constants() {
        let expr = parse("exp(-pi)").unwrap();
        assert_eq!(
            expr,
            Expr::Call(
                Function::Exp,
                Box::new(Expr::Unary(UnaryOp::Neg, Box::new(Expr::Constant(Constant::Pi)))),
            )
        );
    }

    #[test]
    fn comparisons_bind_loosest() {
        let expr = parse("x^2 + y^2 < 1").unwrap();
        let Expr::Binary(BinaryOp::Less, lhs, rhs) = expr else {
            panic!("expected a comparison");
        };
        assert!(matches!(*lhs, Expr::Binary(BinaryOp::Add, _, _)));
        assert_eq!(*rhs, Expr::Number(1.0));
        assert!(parse("a < b < c").is_err());
        assert!(parse("(a < b) < c").is_ok());
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let signs = format!("{}x", "-".repeat(100_000));
        assert!(matches!(parse(&signs), Err(ExprError::TooLong { .. })));

        let parens = format!("{}x{}", "(".repeat(1_000), ")".repeat(1_000));
        assert!(matches!(
            parse(&parens),
            Err(ExprError::TooDeep { limit: MAX_DEPTH, .. })
        ));

        let powers = vec!["x"; 1_000].join("^");
        assert!(matches!(parse(&powers), Err(ExprError::TooDeep { .. })));

        let calls = format!("{}x{}", "sin(".repeat(400), ")".repeat(400));
        assert!(matches!(parse(&calls), Err(ExprError::TooDeep { .. })));
    }

    #[test]
    fn nesting_below_the_limit_parses() {
        let n = MAX_DEPTH / 2;
        let parens = format!("{}x{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(parse(&parens).unwrap(), Expr::Symbol("x".to_string()));
    }

    #[test]
    fn nesting_limit_holds_on_a_small_stack() {
        // Request handlers run on threads with the default 2 MiB stack.
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let deep = format!("{}x", "-".repeat(3_000));
                let long = vec!["x"; 2_000].join("+");
                (parse(&deep).is_err(), parse(&long).is_ok())
            })
            .unwrap();
        assert_eq!(handle.join().unwrap(), (true, true));
    }

    #[test]
    fn errors_carry_positions() {
        assert_eq!(parse("   "), Err(ExprError::Empty));
        assert!(matches!(
            parse("a*(x+b"),
            Err(ExprError::UnexpectedToken { expected: "')'", .. })
        ));
        assert!(matches!(
            parse("a*x+"),
            Err(ExprError::UnexpectedToken { offset: 4, .. })
        ));
        assert!(matches!(
            parse("foo(x)"),
            Err(ExprError::UnknownFunction { offset: 0, .. })
        ));
        assert!(matches!(parse("sin(x, y)"), Err(ExprError::Arity { .. })));
        assert!(matches!(parse("a b"), Err(ExprError::UnexpectedToken { .. })));
    }
}
