//! Recursive-descent parser producing the script AST.
//!
//! Statements may end with `;`, a line break, a closing `}` or the end of
//! input. Binary operators are parsed by precedence level, lowest first.

use std::sync::Arc;

use crate::ast::{
    AssignOp, BinaryOp, CatchClause, DeclKind, Expr, ForEachKind, FunctionBody, FunctionDef,
    LogicalOp, Program, Stmt, StmtKind, UnaryOp, UpdateOp,
};
use crate::error::ScriptError;
use crate::lexer::{Keyword, Punct, Token, TokenKind, tokenize};
use crate::stack::ensure_sufficient_stack;

/// Parse script source into a program.
pub fn parse_program(source: &str) -> Result<Program, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

static EOF: TokenKind = TokenKind::Eof;

/// Binary operator precedence levels, lowest first.
const LEVELS: usize = 7;

/// Deepest nesting of statements and expressions accepted.
pub const MAX_NESTING: usize = 256;

enum BinaryKind {
    Logical(LogicalOp),
    Binary(BinaryOp),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

type ParseResult<T> = Result<T, ScriptError>;

impl Parser {
    // =========================================================================
    // Token helpers
    // =========================================================================

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(&EOF, |token| &token.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, punct: Punct) -> bool {
        self.peek().kind == TokenKind::Punct(punct)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().kind == TokenKind::Keyword(keyword)
    }

    fn eat(&mut self, punct: Punct) -> bool {
        let found = self.check(punct);
        if found {
            self.advance();
        }
        found
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        let found = self.check_keyword(keyword);
        if found {
            self.advance();
        }
        found
    }

    fn expect(&mut self, punct: Punct, expected: &str) -> ParseResult<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ScriptError {
        let token = self.peek();
        ScriptError::Syntax {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> ScriptError {
        self.error_here(format!(
            "expected {expected} but found {}",
            describe_token(&self.peek().kind)
        ))
    }

    /// Run a recursive production one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_here(format!(
                "nesting exceeds the limit of {MAX_NESTING} levels"
            )));
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| parse(self));
        self.depth -= 1;
        result
    }

    fn identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn at_statement_end(&self) -> bool {
        let token = self.peek();
        token.newline_before
            || matches!(
                token.kind,
                TokenKind::Eof | TokenKind::Punct(Punct::Semi | Punct::RBrace)
            )
    }

    /// Consume a statement terminator.
    fn terminator(&mut self) -> ParseResult<()> {
        if self.eat(Punct::Semi) || self.at_statement_end() {
            Ok(())
        } else {
            Err(self.unexpected("';'"))
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statement(&mut self) -> ParseResult<Stmt> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> ParseResult<Stmt> {
        let line = self.peek().line;
        let kind = match self.peek().kind.clone() {
            TokenKind::Punct(Punct::LBrace) => StmtKind::Block(self.block()?),
            TokenKind::Punct(Punct::Semi) => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Keyword(Keyword::Var | Keyword::Let | Keyword::Const) => {
                let declaration = self.declaration()?;
                self.terminator()?;
                declaration
            }
            TokenKind::Keyword(Keyword::Function)
                if matches!(self.peek_kind_at(1), TokenKind::Ident(_)) =>
            {
                self.advance();
                let name = self.identifier()?;
                let params = self.parameters()?;
                let body = self.block()?;
                StmtKind::Function(Arc::new(FunctionDef {
                    name: Some(name),
                    params,
                    body: FunctionBody::Block(body),
                }))
            }
            TokenKind::Keyword(Keyword::If) => self.if_statement()?,
            TokenKind::Keyword(Keyword::For) => self.for_statement()?,
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                self.expect(Punct::LParen, "'('")?;
                let test = self.expression()?;
                self.expect(Punct::RParen, "')'")?;
                let body = Box::new(self.statement()?);
                StmtKind::While { test, body }
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                self.terminator()?;
                StmtKind::Break
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                self.terminator()?;
                StmtKind::Continue
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.terminator()?;
                StmtKind::Return(value)
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.advance();
                let value = self.expression()?;
                self.terminator()?;
                StmtKind::Throw(value)
            }
            TokenKind::Keyword(Keyword::Try) => self.try_statement()?,
            TokenKind::Keyword(Keyword::With) => {
                self.advance();
                self.expect(Punct::LParen, "'('")?;
                let object = self.expression()?;
                self.expect(Punct::RParen, "')'")?;
                let body = Box::new(self.statement()?);
                StmtKind::With { object, body }
            }
            _ => {
                let expr = self.expression()?;
                self.terminator()?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, line })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(Punct::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(Punct::RBrace) {
            if self.at_eof() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn declaration_kind(&self) -> Option<DeclKind> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Var) => Some(DeclKind::Var),
            TokenKind::Keyword(Keyword::Let) => Some(DeclKind::Let),
            TokenKind::Keyword(Keyword::Const) => Some(DeclKind::Const),
            _ => None,
        }
    }

    /// Parse `var a = 1, b` without the terminator.
    fn declaration(&mut self) -> ParseResult<StmtKind> {
        let kind = self
            .declaration_kind()
            .ok_or_else(|| self.unexpected("declaration"))?;
        self.advance();
        let mut declarations = Vec::new();
        loop {
            let name = self.identifier()?;
            let init = if self.eat(Punct::Assign) {
                Some(self.assignment()?)
            } else {
                None
            };
            declarations.push((name, init));
            if !self.eat(Punct::Comma) {
                break;
            }
        }
        Ok(StmtKind::Declare { kind, declarations })
    }

    fn if_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        self.expect(Punct::LParen, "'('")?;
        let test = self.expression()?;
        self.expect(Punct::RParen, "')'")?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            test,
            consequent,
            alternate,
        })
    }

    fn for_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        self.expect(Punct::LParen, "'('")?;

        if let Some(for_each) = self.try_for_each()? {
            return Ok(for_each);
        }

        let init = if self.check(Punct::Semi) {
            None
        } else {
            let line = self.peek().line;
            let kind = if self.declaration_kind().is_some() {
                self.declaration()?
            } else {
                StmtKind::Expr(self.expression()?)
            };
            Some(Box::new(Stmt { kind, line }))
        };
        self.expect(Punct::Semi, "';'")?;
        let test = if self.check(Punct::Semi) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(Punct::Semi, "';'")?;
        let update = if self.check(Punct::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(Punct::RParen, "')'")?;
        let body = Box::new(self.statement()?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    /// Parse the rest of `for (x of xs) body` / `for (k in obj) body` if the
    /// header has that shape; otherwise rewind and return `None`.
    fn try_for_each(&mut self) -> ParseResult<Option<StmtKind>> {
        let start = self.pos;
        let declare = self.declaration_kind();
        if declare.is_some() {
            self.advance();
        }
        let TokenKind::Ident(name) = self.peek().kind.clone() else {
            self.pos = start;
            return Ok(None);
        };
        let kind = match self.peek_kind_at(1) {
            TokenKind::Ident(word) if word == "of" => ForEachKind::Of,
            TokenKind::Keyword(Keyword::In) => ForEachKind::In,
            _ => {
                self.pos = start;
                return Ok(None);
            }
        };
        self.advance();
        self.advance();
        let iterable = self.expression()?;
        self.expect(Punct::RParen, "')'")?;
        let body = Box::new(self.statement()?);
        Ok(Some(StmtKind::ForEach {
            kind,
            declare,
            name,
            iterable,
            body,
        }))
    }

    fn try_statement(&mut self) -> ParseResult<StmtKind> {
        self.advance();
        let block = self.block()?;
        let handler = if self.eat_keyword(Keyword::Catch) {
            let param = if self.eat(Punct::LParen) {
                let name = self.identifier()?;
                self.expect(Punct::RParen, "')'")?;
                Some(name)
            } else {
                None
            };
            Some(CatchClause {
                param,
                body: self.block()?,
            })
        } else {
            None
        };
        let finalizer = if self.eat_keyword(Keyword::Finally) {
            Some(self.block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("'catch' or 'finally'"));
        }
        Ok(StmtKind::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn parameters(&mut self) -> ParseResult<Vec<String>> {
        self.expect(Punct::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.check(Punct::RParen) {
            params.push(self.identifier()?);
            if !self.eat(Punct::Comma) {
                break;
            }
        }
        self.expect(Punct::RParen, "')'")?;
        Ok(params)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> ParseResult<Expr> {
        if self.arrow_ahead() {
            return self.arrow_function();
        }

        let target = self.conditional()?;
        let op = match self.peek().kind {
            TokenKind::Punct(Punct::Assign) => AssignOp::Assign,
            TokenKind::Punct(Punct::PlusAssign) => AssignOp::Add,
            TokenKind::Punct(Punct::MinusAssign) => AssignOp::Sub,
            TokenKind::Punct(Punct::StarAssign) => AssignOp::Mul,
            TokenKind::Punct(Punct::SlashAssign) => AssignOp::Div,
            _ => return Ok(target),
        };
        if !is_assignable(&target) {
            return Err(self.error_here("invalid assignment target"));
        }
        self.advance();
        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    /// True when the upcoming tokens start an arrow function.
    fn arrow_ahead(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Ident(_) => *self.peek_kind_at(1) == TokenKind::Punct(Punct::Arrow),
            TokenKind::Punct(Punct::LParen) => {
                let mut depth = 0usize;
                let mut offset = 0;
                loop {
                    match self.peek_kind_at(offset) {
                        TokenKind::Punct(Punct::LParen) => depth += 1,
                        TokenKind::Punct(Punct::RParen) => {
                            depth -= 1;
                            if depth == 0 {
                                return *self.peek_kind_at(offset + 1)
                                    == TokenKind::Punct(Punct::Arrow);
                            }
                        }
                        TokenKind::Eof => return false,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            _ => false,
        }
    }

    fn arrow_function(&mut self) -> ParseResult<Expr> {
        let params = if self.check(Punct::LParen) {
            self.parameters()?
        } else {
            vec![self.identifier()?]
        };
        self.expect(Punct::Arrow, "'=>'")?;
        let body = if self.check(Punct::LBrace) {
            FunctionBody::Block(self.block()?)
        } else {
            FunctionBody::Expr(Box::new(self.assignment()?))
        };
        Ok(Expr::Function(Arc::new(FunctionDef {
            name: None,
            params,
            body,
        })))
    }

    fn conditional(&mut self) -> ParseResult<Expr> {
        let test = self.binary(0)?;
        if !self.eat(Punct::Question) {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect(Punct::Colon, "':'")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn binary_operator(&self, level: usize) -> Option<BinaryKind> {
        let TokenKind::Punct(punct) = self.peek().kind else {
            if level == 4 && self.check_keyword(Keyword::In) {
                return Some(BinaryKind::Binary(BinaryOp::In));
            }
            return None;
        };
        let kind = match (level, punct) {
            (0, Punct::Nullish) => BinaryKind::Logical(LogicalOp::Nullish),
            (1, Punct::Or) => BinaryKind::Logical(LogicalOp::Or),
            (2, Punct::And) => BinaryKind::Logical(LogicalOp::And),
            (3, Punct::Eq) => BinaryKind::Binary(BinaryOp::Eq),
            (3, Punct::Ne) => BinaryKind::Binary(BinaryOp::Ne),
            (3, Punct::StrictEq) => BinaryKind::Binary(BinaryOp::StrictEq),
            (3, Punct::StrictNe) => BinaryKind::Binary(BinaryOp::StrictNe),
            (4, Punct::Lt) => BinaryKind::Binary(BinaryOp::Lt),
            (4, Punct::Le) => BinaryKind::Binary(BinaryOp::Le),
            (4, Punct::Gt) => BinaryKind::Binary(BinaryOp::Gt),
            (4, Punct::Ge) => BinaryKind::Binary(BinaryOp::Ge),
            (5, Punct::Plus) => BinaryKind::Binary(BinaryOp::Add),
            (5, Punct::Minus) => BinaryKind::Binary(BinaryOp::Sub),
            (6, Punct::Star) => BinaryKind::Binary(BinaryOp::Mul),
            (6, Punct::Slash) => BinaryKind::Binary(BinaryOp::Div),
            (6, Punct::Percent) => BinaryKind::Binary(BinaryOp::Rem),
            _ => return None,
        };
        Some(kind)
    }

    fn binary(&mut self, level: usize) -> ParseResult<Expr> {
        if level == LEVELS {
            return self.unary();
        }
        let mut left = self.binary(level + 1)?;
        while let Some(kind) = self.binary_operator(level) {
            self.advance();
            let right = Box::new(self.binary(level + 1)?);
            let left_box = Box::new(left);
            left = match kind {
                BinaryKind::Logical(op) => Expr::Logical {
                    op,
                    left: left_box,
                    right,
                },
                BinaryKind::Binary(op) => Expr::Binary {
                    op,
                    left: left_box,
                    right,
                },
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        self.nested(Self::unary_inner)
    }

    fn unary_inner(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Punct(Punct::Not) => UnaryOp::Not,
            TokenKind::Punct(Punct::Minus) => UnaryOp::Neg,
            TokenKind::Punct(Punct::Plus) => UnaryOp::Plus,
            TokenKind::Keyword(Keyword::Typeof) => UnaryOp::Typeof,
            TokenKind::Punct(Punct::Inc | Punct::Dec) => {
                let op = if self.check(Punct::Inc) {
                    UpdateOp::Inc
                } else {
                    UpdateOp::Dec
                };
                self.advance();
                let target = self.unary()?;
                if !is_assignable(&target) {
                    return Err(self.error_here("invalid update target"));
                }
                return Ok(Expr::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            TokenKind::Keyword(Keyword::New) => {
                self.advance();
                return self.postfix();
            }
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.call_member()?;
        let op = match self.peek().kind {
            TokenKind::Punct(Punct::Inc) => UpdateOp::Inc,
            TokenKind::Punct(Punct::Dec) => UpdateOp::Dec,
            _ => return Ok(expr),
        };
        if self.peek().newline_before {
            return Ok(expr);
        }
        if !is_assignable(&expr) {
            return Err(self.error_here("invalid update target"));
        }
        self.advance();
        Ok(Expr::Update {
            op,
            prefix: false,
            target: Box::new(expr),
        })
    }

    fn call_member(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(Punct::Dot) {
                let property = match self.advance().kind {
                    TokenKind::Ident(name) => name,
                    TokenKind::Keyword(keyword) => keyword.as_str().to_string(),
                    _ => return Err(self.error_here("expected property name after '.'")),
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat(Punct::LBracket) {
                let index = self.expression()?;
                self.expect(Punct::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.check(Punct::LParen) {
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(Punct::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.check(Punct::RParen) {
            args.push(self.assignment()?);
            if !self.eat(Punct::Comma) {
                break;
            }
        }
        self.expect(Punct::RParen, "')'")?;
        Ok(args)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let expr = match self.peek().kind.clone() {
            TokenKind::Number(n) => Expr::Number(n),
            TokenKind::Str(s) => Expr::Str(s),
            TokenKind::Ident(name) => Expr::Ident(name),
            TokenKind::Keyword(Keyword::True) => Expr::Bool(true),
            TokenKind::Keyword(Keyword::False) => Expr::Bool(false),
            TokenKind::Keyword(Keyword::Null) => Expr::Null,
            TokenKind::Keyword(Keyword::Undefined) => Expr::Undefined,
            TokenKind::Keyword(Keyword::Function) => return self.function_expression(),
            TokenKind::Punct(Punct::LParen) => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Punct::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::Punct(Punct::LBracket) => return self.array_literal(),
            TokenKind::Punct(Punct::LBrace) => return self.object_literal(),
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn function_expression(&mut self) -> ParseResult<Expr> {
        self.advance();
        let name = match &self.peek().kind {
            TokenKind::Ident(_) => Some(self.identifier()?),
            _ => None,
        };
        let params = self.parameters()?;
        let body = self.block()?;
        Ok(Expr::Function(Arc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
        })))
    }

    fn array_literal(&mut self) -> ParseResult<Expr> {
        self.advance();
        let mut elements = Vec::new();
        while !self.check(Punct::RBracket) {
            elements.push(self.assignment()?);
            if !self.eat(Punct::Comma) {
                break;
            }
        }
        self.expect(Punct::RBracket, "']'")?;
        Ok(Expr::Array(elements))
    }

    fn object_literal(&mut self) -> ParseResult<Expr> {
        self.advance();
        let mut entries = Vec::new();
        while !self.check(Punct::RBrace) {
            let (key, shorthand) = match self.advance().kind {
                TokenKind::Ident(name) => (name, true),
                TokenKind::Str(s) => (s, false),
                TokenKind::Number(n) => (n.to_string(), false),
                TokenKind::Keyword(keyword) => (keyword.as_str().to_string(), false),
                _ => return Err(self.error_here("expected property name")),
            };
            let value = if self.eat(Punct::Colon) {
                self.assignment()?
            } else if shorthand {
                Expr::Ident(key.clone())
            } else {
                return Err(self.unexpected("':'"));
            };
            entries.push((key, value));
            if !self.eat(Punct::Comma) {
                break;
            }
        }
        self.expect(Punct::RBrace, "'}'")?;
        Ok(Expr::Object(entries))
    }
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
    )
}

fn describe_token(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number {n}"),
        TokenKind::Str(_) => "string".to_string(),
        TokenKind::Ident(name) => format!("'{name}'"),
        TokenKind::Keyword(keyword) => format!("'{}'", keyword.as_str()),
        TokenKind::Punct(punct) => format!("'{}'", punct.as_str()),
        TokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_expr(source: &str) -> Expr {
        let program = parse_program(source).unwrap();
        match program.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn precedence_of_arithmetic() {
        let expr = single_expr("1 + 2 * 3");
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            *right,
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn statements_without_semicolons() {
        let program = parse_program("var a = 1\nvar b = 2\na + b").unwrap();
        assert_eq!(program.body.len(), 3);
        assert_eq!(program.body[2].line, 3);
    }

    #[test]
    fn arrow_functions() {
        let expr = single_expr("(a, b) => a + b");
        let Expr::Function(def) = expr else {
            panic!("expected function");
        };
        assert_eq!(def.params, vec!["a".to_string(), "b".to_string()]);
        assert!(matches!(def.body, FunctionBody::Expr(_)));
    }

    #[test]
    fn for_of_header() {
        let program = parse_program("for (var x of xs) { }").unwrap();
        assert!(matches!(
            program.body[0].kind,
            StmtKind::ForEach {
                kind: ForEachKind::Of,
                ..
            }
        ));
    }

    #[test]
    fn missing_paren_reports_position() {
        let err = parse_program("if (a {").unwrap_err();
        let ScriptError::Syntax { line, message, .. } = err else {
            panic!("expected syntax error");
        };
        assert_eq!(line, 1);
        assert!(message.contains("')'"));
    }

    #[test]
    fn rejects_two_expressions_on_one_line() {
        assert!(parse_program("a b").is_err());
    }

    #[test]
    fn nesting_within_the_limit_parses() {
        let depth = 60;
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(matches!(single_expr(&source), Expr::Number(_)));
        assert!(parse_program(&format!("{}x{}", "[".repeat(depth), "]".repeat(depth))).is_ok());
    }

    #[test]
    fn runaway_nesting_is_a_syntax_error() {
        let depth = 20_000;
        for source in [
            format!("{}1{}", "(".repeat(depth), ")".repeat(depth)),
            format!("{}1", "!".repeat(depth)),
            format!("{}{}", "{".repeat(depth), "}".repeat(depth)),
            "a = ".repeat(depth) + "1",
        ] {
            let err = parse_program(&source).unwrap_err();
            let ScriptError::Syntax { message, .. } = err else {
                panic!("expected syntax error, got {err:?}");
            };
            assert!(message.contains("nesting exceeds"), "{message}");
        }
    }
}
