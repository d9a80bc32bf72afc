use std::ops::Range;
use std::sync::Arc;

use crate::ast::{BinaryOp, Expr, ExprKind, FnDef, Param, Stmt, UnaryOp};
use crate::error::ReplError;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::types::Ty;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse one segment into its top-level statements.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ReplError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    let statements = parser.parse_statements(&TokenKind::Eof)?;
    parser.expect(TokenKind::Eof)?;
    Ok(statements)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    /// Always ends with `Eof`.
    tokens: Vec<Token>,
    pos: usize,
}

// Binding powers (precedence). Higher = tighter binding.
// Left bp, right bp. All binary operators are left-associative.
const BP_OR: u8 = 4; // ||
const BP_AND: u8 = 6; // &&
const BP_EQUALITY: u8 = 8; // == !=
const BP_COMPARISON: u8 = 10; // < > <= >=
const BP_ADDITIVE: u8 = 12; // + -
const BP_MULTIPLICATIVE: u8 = 14; // * / %
const BP_UNARY: u8 = 16; // ! -

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_nth(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>, span: Range<usize>) -> ReplError {
        ReplError::Syntax {
            message: message.into(),
            span,
        }
    }

    fn unexpected(&self, expected: &str) -> ReplError {
        let found = self.peek();
        self.error(
            format!("{} expected but {} found", expected, found.kind.describe()),
            found.span.clone(),
        )
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ReplError> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Range<usize>), ReplError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let token = self.advance();
                Ok((name, token.span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn skip_newlines(&mut self) {
        while *self.peek_kind() == TokenKind::Newline {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semi) {
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Statements up to (not including) `end`.
    fn parse_statements(&mut self, end: &TokenKind) -> Result<Vec<Stmt>, ReplError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while self.peek_kind() != end {
            if *self.peek_kind() == TokenKind::Eof {
                return Err(self.unexpected(&end.describe()));
            }
            statements.push(self.parse_stmt()?);
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Semi => self.skip_separators(),
                kind if kind == end => {}
                _ => return Err(self.unexpected("';'")),
            }
        }
        Ok(statements)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ReplError> {
        match self.peek_kind() {
            TokenKind::Val | TokenKind::Var => self.parse_binding(),
            TokenKind::Def => self.parse_def(),
            TokenKind::Ident(_) if self.peek_nth(1).kind == TokenKind::Eq => self.parse_assign(),
            _ => Ok(Stmt::Expr(self.parse_expr(0)?)),
        }
    }

    fn parse_binding(&mut self) -> Result<Stmt, ReplError> {
        let keyword = self.advance();
        let mutable = keyword.kind == TokenKind::Var;
        let (name, _) = self.expect_ident()?;
        let declared = if *self.peek_kind() == TokenKind::Colon {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr(0)?;
        let span = keyword.span.start..value.span.end;
        Ok(Stmt::Binding {
            name,
            declared,
            value,
            mutable,
            span,
        })
    }

    fn parse_assign(&mut self) -> Result<Stmt, ReplError> {
        let (name, name_span) = self.expect_ident()?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr(0)?;
        let span = name_span.start..value.span.end;
        Ok(Stmt::Assign { name, value, span })
    }

    fn parse_def(&mut self) -> Result<Stmt, ReplError> {
        let keyword = self.advance();
        let (name, _) = self.expect_ident()?;

        let has_parens = *self.peek_kind() == TokenKind::LParen;
        let mut params = Vec::new();
        if has_parens {
            self.advance();
            while *self.peek_kind() != TokenKind::RParen {
                let (param, _) = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                params.push(Param { name: param, ty });
                if *self.peek_kind() == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        let result = if *self.peek_kind() == TokenKind::Colon {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Eq)?;
        let body = self.parse_expr(0)?;
        let span = keyword.span.start..body.span.end;

        Ok(Stmt::Def(Arc::new(FnDef {
            name,
            params,
            has_parens,
            result,
            body,
            span,
        })))
    }

    fn parse_type(&mut self) -> Result<Ty, ReplError> {
        let (name, span) = self.expect_ident()?;
        Ty::from_name(&name).ok_or_else(|| self.error(format!("not found: type {}", name), span))
    }

    // ------------------------------------------------------------------
    // Pratt parser core
    // ------------------------------------------------------------------

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ReplError> {
        let mut left = self.parse_prefix()?;

        loop {
            let Some((l_bp, r_bp, op)) = infix_bp(self.peek_kind()) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.advance();
            let right = self.parse_expr(r_bp)?;
            let span = left.span.start..right.span.end;
            left = Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), span);
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ReplError> {
        let op = match self.peek_kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Negate),
            _ => None,
        };
        if let Some(op) = op {
            let token = self.advance();
            let operand = self.parse_expr(BP_UNARY)?;
            let span = token.span.start..operand.span.end;
            return Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), span));
        }

        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_primary(&mut self) -> Result<Expr, ReplError> {
        let token = self.advance();
        let start = token.span.start;

        let kind = match token.kind {
            // Literals
            TokenKind::Int(n) => ExprKind::Int(n),
            TokenKind::Double(n) => ExprKind::Double(n),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),

            TokenKind::LParen => {
                if *self.peek_kind() == TokenKind::RParen {
                    let close = self.advance();
                    return Ok(Expr::new(ExprKind::Unit, start..close.span.end));
                }
                let inner = self.parse_expr(0)?;
                let close = self.expect(TokenKind::RParen)?;
                return Ok(Expr::new(inner.kind, start..close.span.end));
            }

            TokenKind::LBrace => {
                let statements = self.parse_statements(&TokenKind::RBrace)?;
                let close = self.expect(TokenKind::RBrace)?;
                return Ok(Expr::new(ExprKind::Block(statements), start..close.span.end));
            }

            TokenKind::If => {
                let condition = self.parse_condition()?;
                let then_branch = self.parse_expr(0)?;
                let mut end = then_branch.span.end;
                let else_branch = if *self.peek_kind() == TokenKind::Else {
                    self.advance();
                    self.skip_newlines();
                    let branch = self.parse_expr(0)?;
                    end = branch.span.end;
                    Some(Box::new(branch))
                } else {
                    None
                };
                return Ok(Expr::new(
                    ExprKind::If {
                        condition: Box::new(condition),
                        then_branch: Box::new(then_branch),
                        else_branch,
                    },
                    start..end,
                ));
            }

            TokenKind::While => {
                let condition = self.parse_condition()?;
                let body = self.parse_expr(0)?;
                let end = body.span.end;
                return Ok(Expr::new(
                    ExprKind::While {
                        condition: Box::new(condition),
                        body: Box::new(body),
                    },
                    start..end,
                ));
            }

            TokenKind::Throw => {
                self.expect(TokenKind::New)?;
                let (exception, exception_span) = self.expect_ident()?;
                let mut end = exception_span.end;
                let mut message = None;
                if *self.peek_kind() == TokenKind::LParen {
                    self.advance();
                    if *self.peek_kind() != TokenKind::RParen {
                        message = Some(Box::new(self.parse_expr(0)?));
                    }
                    end = self.expect(TokenKind::RParen)?.span.end;
                }
                return Ok(Expr::new(ExprKind::Throw { exception, message }, start..end));
            }

            TokenKind::Ident(name) => {
                let is_sys_error = name == "sys"
                    && *self.peek_kind() == TokenKind::Dot
                    && self.peek_nth(1).kind == TokenKind::Ident("error".to_string());
                if is_sys_error {
                    self.advance();
                    self.advance();
                    self.expect(TokenKind::LParen)?;
                    let message = self.parse_expr(0)?;
                    let close = self.expect(TokenKind::RParen)?;
                    return Ok(Expr::new(
                        ExprKind::SysError(Box::new(message)),
                        start..close.span.end,
                    ));
                }
                if *self.peek_kind() == TokenKind::LParen {
                    let (args, end) = self.parse_arguments()?;
                    return Ok(Expr::new(ExprKind::Call { name, args }, start..end));
                }
                ExprKind::Ident(name)
            }

            other => {
                return Err(self.error(
                    format!("illegal start of simple expression: {}", other.describe()),
                    token.span,
                ));
            }
        };

        Ok(Expr::new(kind, token.span))
    }

    /// `(condition)` of `if` and `while`; the body may start on the next line.
    fn parse_condition(&mut self) -> Result<Expr, ReplError> {
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expr(0)?;
        self.expect(TokenKind::RParen)?;
        self.skip_newlines();
        Ok(condition)
    }

    /// `(a, b, ...)`; returns the arguments and the end of the closing paren.
    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, usize), ReplError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while *self.peek_kind() != TokenKind::RParen {
            args.push(self.parse_expr(0)?);
            if *self.peek_kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        let close = self.expect(TokenKind::RParen)?;
        Ok((args, close.span.end))
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ReplError> {
        while *self.peek_kind() == TokenKind::Dot {
            self.advance();
            let (name, name_span) = self.expect_ident()?;
            let mut end = name_span.end;
            if *self.peek_kind() == TokenKind::LParen && self.peek_nth(1).kind == TokenKind::RParen {
                self.advance();
                end = self.advance().span.end;
            }
            let span = expr.span.start..end;
            expr = Expr::new(
                ExprKind::Member {
                    target: Box::new(expr),
                    name,
                },
                span,
            );
        }
        Ok(expr)
    }
}

/// Infix binding powers and operator, or None if not infix.
fn infix_bp(kind: &TokenKind) -> Option<(u8, u8, BinaryOp)> {
    let (bp, op) = match kind {
        TokenKind::PipePipe => (BP_OR, BinaryOp::Or),
        TokenKind::AmpAmp => (BP_AND, BinaryOp::And),
        TokenKind::EqEq => (BP_EQUALITY, BinaryOp::Eq),
        TokenKind::BangEq => (BP_EQUALITY, BinaryOp::Ne),
        TokenKind::Lt => (BP_COMPARISON, BinaryOp::Lt),
        TokenKind::LtEq => (BP_COMPARISON, BinaryOp::Le),
        TokenKind::Gt => (BP_COMPARISON, BinaryOp::Gt),
        TokenKind::GtEq => (BP_COMPARISON, BinaryOp::Ge),
        TokenKind::Plus => (BP_ADDITIVE, BinaryOp::Add),
        TokenKind::Minus => (BP_ADDITIVE, BinaryOp::Sub),
        TokenKind::Star => (BP_MULTIPLICATIVE, BinaryOp::Mul),
        TokenKind::Slash => (BP_MULTIPLICATIVE, BinaryOp::Div),
        TokenKind::Percent => (BP_MULTIPLICATIVE, BinaryOp::Rem),
        _ => return None,
    };
    Some((bp, bp + 1, op))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        match parse_program(source).expect("parse failed").remove(0) {
            Stmt::Expr(expr) => expr,
            other => panic!("expected an expression, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let ExprKind::Binary(BinaryOp::Add, _, right) = expr("1 + 2 * 3").kind else {
            panic!("expected addition at the root");
        };
        assert!(matches!(right.kind, ExprKind::Binary(BinaryOp::Mul, _, _)));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let ExprKind::Binary(BinaryOp::Sub, left, _) = expr("10 - 4 - 3").kind else {
            panic!("expected subtraction at the root");
        };
        assert!(matches!(left.kind, ExprKind::Binary(BinaryOp::Sub, _, _)));
    }

    #[test]
    fn statements_and_separators() {
        let program = parse_program("val x = 1; var y: Int = 2\n\ny = x\nx + y").unwrap();
        assert_eq!(program.len(), 4);
        assert!(matches!(program[0], Stmt::Binding { mutable: false, .. }));
        assert!(matches!(
            program[1],
            Stmt::Binding {
                mutable: true,
                declared: Some(Ty::Int),
                ..
            }
        ));
        assert!(matches!(program[2], Stmt::Assign { .. }));
        assert!(matches!(program[3], Stmt::Expr(_)));
    }

    #[test]
    fn def_with_parameters_and_result() {
        let program = parse_program("def add(a: Int, b: Int): Int = a + b").unwrap();
        let Stmt::Def(def) = &program[0] else {
            panic!("expected a def");
        };
        assert_eq!(def.name, "add");
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.result, Some(Ty::Int));
        assert_eq!(def.signature_text(Ty::Int), "def add(a: Int, b: Int): Int");
    }

    #[test]
    fn sys_error_and_throw() {
        assert!(matches!(expr("sys.error(\"boom\")").kind, ExprKind::SysError(_)));
        let ExprKind::Throw { exception, message } = expr("throw new IllegalStateException(\"x\")").kind
        else {
            panic!("expected throw");
        };
        assert_eq!(exception, "IllegalStateException");
        assert!(message.is_some());
    }

    #[test]
    fn member_chains() {
        let ExprKind::Member { target, name } = expr("\"a\".trim.length").kind else {
            panic!("expected member access");
        };
        assert_eq!(name, "length");
        assert!(matches!(target.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn if_else_across_lines() {
        let parsed = expr("if (true)\n  1\nelse\n  2");
        assert!(matches!(parsed.kind, ExprKind::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn unknown_type_is_reported() {
        let err = parse_program("val x: Strin = \"a\"").unwrap_err();
        assert_eq!(err.to_string(), "not found: type Strin");
    }

    #[test]
    fn missing_separator_is_reported() {
        let err = parse_program("val x = 1 2").unwrap_err();
        assert!(err.to_string().starts_with("';' expected but integer literal 2 found"));
    }
}
