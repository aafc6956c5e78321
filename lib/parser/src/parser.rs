mod expr;
mod stmt;

use std::{iter::Peekable, rc::Rc, vec};

use cursor::Line;
use log::debug;
use scanner::{Token, TokenData, TokenType};

pub use expr::{Expr, LiteralValue};
pub use stmt::{FunctionDecl, Stmt};

use TokenType::*;

pub const MAX_ARGUMENTS: usize = 255;

pub type Result<T> = std::result::Result<T, ParseError>;
pub type ParseErrors = errors::Errors<ParseError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("[line {line}] Error{at}: {error}")]
pub struct ParseError {
    pub error: ParseErrorType,
    pub line: Line,
    at: String,
}

impl ParseError {
    pub fn new(error: ParseErrorType, token: &Token) -> Self {
        let at = match token.ty() {
            Eof => " at end".to_string(),
            _ => format!(" at '{}'", token.lexeme()),
        };
        Self { error, line: token.line(), at }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseErrorType {
    #[error("Expect expression.")]
    ExpectedExpression,
    #[error("Expect ';' after {0}.")]
    ExpectedSemicolonAfter(&'static str),
    #[error("Expect '(' after {0}.")]
    ExpectedLeftParen(&'static str),
    #[error("Expect ')' after {0}.")]
    ExpectedRightParen(&'static str),
    #[error("Expect '{{' before {0}.")]
    ExpectedLeftBrace(&'static str),
    #[error("Expect '}}' after {0}.")]
    ExpectedRightBrace(&'static str),
    #[error("Expect variable name.")]
    ExpectedVariableName,
    #[error("Expect function name.")]
    ExpectedFunctionName,
    #[error("Expect parameter name.")]
    ExpectedParameterName,
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
    #[error("Can't have more than 255 arguments.")]
    TooManyArguments,
    #[error("Can't have more than 255 parameters.")]
    TooManyParameters,
    #[error("Can't return from top-level code.")]
    ReturnOutsideFunction,
}

/// Recursive descent parser over a scanned token stream.
///
/// Grammar, lowest to highest precedence:
/// assignment, or, and, equality, comparison, term, factor, unary, call, primary.
#[derive(Debug)]
pub struct Parser {
    tokens: Peekable<vec::IntoIter<Token>>,
    eof: Token,
    function_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        // Streams from the scanner always end in Eof, this covers hand-built ones
        let eof = match tokens.last() {
            Some(last) if last.ty() == Eof => last.clone(),
            Some(last) => Token::new(TokenData::Eof, "", last.line(), last.col()),
            None => Token::new(TokenData::Eof, "", Line(1), cursor::Col(1)),
        };
        Self { tokens: tokens.into_iter().peekable(), eof, function_depth: 0 }
    }

    /// Parses a whole program.
    ///
    /// After an error the parser skips to the next statement boundary and
    /// continues, so that all errors of a program are reported at once.
    /// Any error means no statements are returned.
    pub fn parse(&mut self) -> std::result::Result<Vec<Stmt>, ParseErrors> {
        let mut errors = ParseErrors::new();
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    debug!("{e}");
                    errors.push(e);
                    self.synchronize();
                }
            }
        }

        errors.into_result(stmts)
    }

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.expression()
    }

    pub fn parse_statement(&mut self) -> Result<Stmt> {
        self.declaration()
    }

    fn declaration(&mut self) -> Result<Stmt> {
        if self.consume(Fun).is_some() {
            self.function()
        } else if self.consume(Var).is_some() {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn function(&mut self) -> Result<Stmt> {
        let name = self.consume_or_error(Identifier, ParseErrorType::ExpectedFunctionName)?;

        self.consume_or_error(LeftParen, ParseErrorType::ExpectedLeftParen("function name"))?;
        let mut params = Vec::new();
        if !self.check(RightParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    return Err(self.error_at_peek(ParseErrorType::TooManyParameters));
                }
                params.push(
                    self.consume_or_error(Identifier, ParseErrorType::ExpectedParameterName)?,
                );
                if self.consume(Comma).is_none() {
                    break;
                }
            }
        }
        self.consume_or_error(RightParen, ParseErrorType::ExpectedRightParen("parameters"))?;

        self.consume_or_error(LeftBrace, ParseErrorType::ExpectedLeftBrace("function body"))?;
        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;

        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body: body? })))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume_or_error(Identifier, ParseErrorType::ExpectedVariableName)?;

        let initializer = match self.consume(Equal) {
            Some(_) => Some(self.expression()?),
            None => None,
        };

        self.consume_or_error(
            Semicolon,
            ParseErrorType::ExpectedSemicolonAfter("variable declaration"),
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt> {
        if let Some(keyword) = self.consume(Print) {
            return self.print_statement(keyword);
        }

        if self.consume(LeftBrace).is_some() {
            return Ok(Stmt::Block(self.block()?));
        }

        if self.consume(If).is_some() {
            return self.if_statement();
        }

        if self.consume(While).is_some() {
            return self.while_statement();
        }

        if self.consume(For).is_some() {
            return self.for_statement();
        }

        if let Some(keyword) = self.consume(Return) {
            return self.return_statement(keyword);
        }

        self.expression_statement()
    }

    /// `for` has no node of its own, it becomes
    /// `{ initializer; while (condition) { body; increment; } }`.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume_or_error(LeftParen, ParseErrorType::ExpectedLeftParen("'for'"))?;

        let initializer = if self.consume(Semicolon).is_some() {
            None
        } else if self.consume(Var).is_some() {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(Semicolon) {
            Expr::Literal(LiteralValue::Boolean(true))
        } else {
            self.expression()?
        };
        self.consume_or_error(Semicolon, ParseErrorType::ExpectedSemicolonAfter("loop condition"))?;

        let increment = if self.check(RightParen) { None } else { Some(self.expression()?) };
        self.consume_or_error(RightParen, ParseErrorType::ExpectedRightParen("for clauses"))?;

        let body = match (self.statement()?, increment) {
            (body, Some(increment)) => Stmt::Block(vec![body, Stmt::Expression(increment)]),
            (body, None) => body,
        };

        let while_stmt = Stmt::While { condition, body: Box::new(body) };

        Ok(Stmt::Block(initializer.into_iter().chain(Some(while_stmt)).collect()))
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume_or_error(LeftParen, ParseErrorType::ExpectedLeftParen("'while'"))?;
        let condition = self.expression()?;
        self.consume_or_error(RightParen, ParseErrorType::ExpectedRightParen("condition"))?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume_or_error(LeftParen, ParseErrorType::ExpectedLeftParen("'if'"))?;
        let condition = self.expression()?;
        self.consume_or_error(RightParen, ParseErrorType::ExpectedRightParen("if condition"))?;

        let then_branch = Box::new(self.statement()?);

        // An `else` always belongs to the innermost `if`
        let else_branch = match self.consume(Else) {
            Some(_) => Some(Box::new(self.statement()?)),
            None => None,
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn return_statement(&mut self, keyword: Token) -> Result<Stmt> {
        let value = if self.check(Semicolon) { None } else { Some(self.expression()?) };
        self.consume_or_error(Semicolon, ParseErrorType::ExpectedSemicolonAfter("return value"))?;

        if self.function_depth == 0 {
            return Err(ParseError::new(ParseErrorType::ReturnOutsideFunction, &keyword));
        }

        Ok(Stmt::Return { keyword, value })
    }

    /// Declarations up to the closing brace, the opening one is already consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();

        while !self.check(RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration()?);
        }

        self.consume_or_error(RightBrace, ParseErrorType::ExpectedRightBrace("block"))?;
        Ok(stmts)
    }

    fn print_statement(&mut self, keyword: Token) -> Result<Stmt> {
        let value = self.expression()?;

        self.consume_or_error(Semicolon, ParseErrorType::ExpectedSemicolonAfter("value"))?;

        Ok(Stmt::Print { keyword, value })
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;

        self.consume_or_error(Semicolon, ParseErrorType::ExpectedSemicolonAfter("expression"))?;

        Ok(Stmt::Expression(value))
    }

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if let Some(equal) = self.consume(Equal) {
            let value = Box::new(self.assignment()?);

            if let Expr::Variable(name) = expr {
                return Ok(Expr::Assign { name, value });
            }

            return Err(ParseError::new(ParseErrorType::InvalidAssignmentTarget, &equal));
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while let Some(operator) = self.consume(Or) {
            let right = Box::new(self.and()?);
            expr = Expr::Logical { left: Box::new(expr), operator, right };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while let Some(operator) = self.consume(And) {
            let right = Box::new(self.equality()?);
            expr = Expr::Logical { left: Box::new(expr), operator, right };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while let BangEqual | EqualEqual = self.peek() {
            let operator = self.advance();
            let right = Box::new(self.comparison()?);
            expr = Expr::Binary { left: Box::new(expr), operator, right }
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;

        while let Greater | GreaterEqual | Less | LessEqual = self.peek() {
            let operator = self.advance();
            let right = Box::new(self.term()?);
            expr = Expr::Binary { left: Box::new(expr), operator, right }
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;

        while let Plus | Minus = self.peek() {
            let operator = self.advance();
            let right = Box::new(self.factor()?);
            expr = Expr::Binary { left: Box::new(expr), operator, right }
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;

        while let Star | Slash = self.peek() {
            let operator = self.advance();
            let right = Box::new(self.unary()?);
            expr = Expr::Binary { left: Box::new(expr), operator, right }
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if let Minus | Bang = self.peek() {
            let operator = self.advance();
            let right = Box::new(self.unary()?);
            return Ok(Expr::Unary { operator, right });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        while self.consume(LeftParen).is_some() {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();

        if !self.check(RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    return Err(self.error_at_peek(ParseErrorType::TooManyArguments));
                }
                arguments.push(self.expression()?);

                if self.consume(Comma).is_none() {
                    break;
                }
            }
        }

        let closing_paren =
            self.consume_or_error(RightParen, ParseErrorType::ExpectedRightParen("arguments"))?;

        Ok(Expr::Call { callee: Box::new(callee), closing_paren, arguments })
    }

    fn primary(&mut self) -> Result<Expr> {
        let literal = match &self.peek_token().data {
            TokenData::False => Some(LiteralValue::Boolean(false)),
            TokenData::True => Some(LiteralValue::Boolean(true)),
            TokenData::Nil => Some(LiteralValue::Nil),
            TokenData::Number(n) => Some(LiteralValue::Number(*n)),
            TokenData::Str(s) => Some(LiteralValue::Str(s.as_str().into())),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(Expr::Literal(literal));
        }

        if let Some(name) = self.consume(Identifier) {
            return Ok(Expr::Variable(name));
        }

        if self.consume(LeftParen).is_some() {
            let expr = self.expression()?;
            self.consume_or_error(RightParen, ParseErrorType::ExpectedRightParen("expression"))?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(self.error_at_peek(ParseErrorType::ExpectedExpression))
    }

    /// Skips tokens until just after a `;` or just before a keyword that starts a statement.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.advance().ty() == Semicolon {
                return;
            }
            if let Class | Fun | Var | For | If | While | Print | Return = self.peek() {
                return;
            }
        }
    }
}

// Helpers
impl Parser {
    fn peek_token(&mut self) -> &Token {
        match self.tokens.peek() {
            Some(token) => token,
            None => &self.eof,
        }
    }

    fn peek(&mut self) -> TokenType {
        self.peek_token().ty()
    }

    fn check(&mut self, ty: TokenType) -> bool {
        self.peek() == ty
    }

    fn advance(&mut self) -> Token {
        match self.tokens.next() {
            Some(token) => token,
            None => self.eof.clone(),
        }
    }

    fn consume(&mut self, ty: TokenType) -> Option<Token> {
        self.check(ty).then(|| self.advance())
    }

    fn consume_or_error(&mut self, ty: TokenType, error: ParseErrorType) -> Result<Token> {
        match self.consume(ty) {
            Some(token) => Ok(token),
            None => Err(self.error_at_peek(error)),
        }
    }

    fn error_at_peek(&mut self, error: ParseErrorType) -> ParseError {
        ParseError::new(error, self.peek_token())
    }

    fn is_at_end(&mut self) -> bool {
        self.check(Eof)
    }
}
