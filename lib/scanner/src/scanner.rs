use cursor::{Col, Cursor, Line};
use log::trace;

pub mod token;
pub use token::{Token, TokenData, TokenType};
use TokenData::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScanErrorType {
    #[error("Unexpected character '{0}'.")]
    UnexpectedCharacter(char),
    #[error("Unterminated string.")]
    UnterminatedString,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("[line {line}] Error: {error}")]
pub struct ScanError {
    pub error: ScanErrorType,
    pub line: Line,
    pub col: Col,
}

impl ScanError {
    fn new(error: ScanErrorType, at: &Cursor) -> Self {
        Self { error, line: at.line(), col: at.col() }
    }
}

/// Scans a whole source string. Scanning stops at the first lexical error.
pub fn scan(source: &str) -> Result<Vec<Token>, ScanError> {
    TokenStream::new(source).collect()
}

/// Lazily produces the tokens of a source string.
///
/// Yields exactly one `Eof` token at the end of the input and then stops.
/// A lexical error is fatal: it is yielded in place of a token and the
/// stream ends right after it.
#[derive(Debug, Clone)]
pub struct TokenStream<'a> {
    cursor: Cursor<'a>,
    finished: bool,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { cursor: Cursor::new(source), finished: false }
    }

    fn make_token(&self, data: TokenData, start: &Cursor<'a>) -> Token {
        Token::new(data, start.slice_until(&self.cursor), start.line(), start.col())
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.cursor.peek() {
                Some(' ' | '\r' | '\t' | '\n') => {
                    self.cursor.next();
                }
                Some('/') if self.cursor.peek_next() == Some('/') => {
                    self.cursor.eat_while(|c| c != '\n');
                }
                _ => return,
            }
        }
    }

    fn scan_token(&mut self) -> Result<Token, ScanError> {
        self.skip_whitespace_and_comments();

        let start = self.cursor.clone();
        let c = match self.cursor.next() {
            Some(c) => c,
            None => return Ok(self.make_token(Eof, &start)),
        };

        let data = match c {
            '(' => LeftParen,
            ')' => RightParen,
            '{' => LeftBrace,
            '}' => RightBrace,
            ',' => Comma,
            '.' => Dot,
            '-' => Minus,
            '+' => Plus,
            ';' => Semicolon,
            '*' => Star,
            '/' => Slash,

            '!' if self.cursor.next_if_eq('=') => BangEqual,
            '!' => Bang,
            '=' if self.cursor.next_if_eq('=') => EqualEqual,
            '=' => Equal,
            '<' if self.cursor.next_if_eq('=') => LessEqual,
            '<' => Less,
            '>' if self.cursor.next_if_eq('=') => GreaterEqual,
            '>' => Greater,

            '"' => return self.string(start),
            d if d.is_ascii_digit() => return Ok(self.number(start)),
            c if is_identifier_start(c) => return Ok(self.identifier(start)),

            c => return Err(ScanError::new(ScanErrorType::UnexpectedCharacter(c), &start)),
        };

        Ok(self.make_token(data, &start))
    }

    fn string(&mut self, start: Cursor<'a>) -> Result<Token, ScanError> {
        self.cursor.eat_while(|c| c != '"');
        if !self.cursor.next_if_eq('"') {
            return Err(ScanError::new(ScanErrorType::UnterminatedString, &start));
        }

        let lexeme = start.slice_until(&self.cursor);
        let contents = lexeme[1..lexeme.len() - 1].to_string();
        Ok(self.make_token(Str(contents), &start))
    }

    fn number(&mut self, start: Cursor<'a>) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit());

        // A fractional part needs at least one digit after the dot
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_next().map_or(false, |c| c.is_ascii_digit())
        {
            self.cursor.next();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }

        let n = start
            .slice_until(&self.cursor)
            .parse()
            .expect("Digits with at most one inner dot always parse as f64");
        self.make_token(Number(n), &start)
    }

    fn identifier(&mut self, start: Cursor<'a>) -> Token {
        self.cursor.eat_while(is_identifier_continue);
        let lexeme = start.slice_until(&self.cursor);
        self.make_token(TokenData::keyword(lexeme).unwrap_or(Identifier), &start)
    }
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = Result<Token, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = self.scan_token();
        match &result {
            Ok(token) if token.data == Eof => self.finished = true,
            Ok(token) => trace!("{:?} '{}' at {}:{}", token.ty(), token.lexeme, token.line, token.col),
            Err(_) => self.finished = true,
        }
        Some(result)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
