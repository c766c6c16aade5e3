use log::{debug, info};
use phf::phf_map;

use crate::error::LoxError;
use crate::token::{Literal, Token, TokenType};

/// Check if a character can start an identifier
pub fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Check if a character can continue an identifier
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// All reserved words with their token types
pub static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

/// Scans the whole buffer, separating tokens from lexical errors.
///
/// The token list always ends with an `Eof` token, even when errors occurred.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LoxError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }
    (tokens, errors)
}

pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: usize,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        info!("Scanner created over {} bytes", source.len());
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
            finished: false,
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Token, LoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.is_at_end() {
                self.finished = true;
                let end = self.source.len();
                return Some(Ok(Token::new(TokenType::Eof, "", self.line).with_span(end..end)));
            }

            self.start = self.current;
            let c = self.advance();

            let token_type = match c {
                '\n' => {
                    self.line += 1;
                    continue;
                }
                ' ' | '\r' | '\t' => continue,
                '/' if self.match_char('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                    continue;
                }
                '"' => return Some(self.string()),
                c if is_identifier_start(c) => self.identifier(),
                c if c.is_ascii_digit() => return Some(self.number()),
                '!' => self.either('=', TokenType::BangEqual, TokenType::Bang),
                '=' => self.either('=', TokenType::EqualEqual, TokenType::Equal),
                '<' => self.either('=', TokenType::LessEqual, TokenType::Less),
                '>' => self.either('=', TokenType::GreaterEqual, TokenType::Greater),
                '(' => TokenType::LeftParen,
                ')' => TokenType::RightParen,
                '{' => TokenType::LeftBrace,
                '}' => TokenType::RightBrace,
                ',' => TokenType::Comma,
                '.' => TokenType::Dot,
                '-' => TokenType::Minus,
                '+' => TokenType::Plus,
                ';' => TokenType::Semicolon,
                '*' => TokenType::Star,
                '/' => TokenType::Slash,
                _ => {
                    return Some(Err(LoxError::Scan {
                        message: format!("Unexpected character: {}", c),
                        line: self.line,
                        span: self.start..self.current,
                    }));
                }
            };

            let token = self.add_token(token_type);
            debug!("Scanned {} on line {}", token, self.line);
            return Some(Ok(token));
        }
    }
}

impl Scanner<'_> {
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        match self.source[self.current..].chars().next() {
            Some(c) => {
                self.current += c.len_utf8();
                c
            }
            None => '\0',
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn either(&mut self, second: char, double: TokenType, single: TokenType) -> TokenType {
        if self.match_char(second) {
            double
        } else {
            single
        }
    }

    fn lexeme(&self) -> &str {
        &self.source[self.start..self.current]
    }

    fn add_token(&self, token_type: TokenType) -> Token {
        Token::new(token_type, self.lexeme(), self.line).with_span(self.start..self.current)
    }

    fn add_token_with_literal(&self, token_type: TokenType, literal: Literal) -> Token {
        Token {
            token_type,
            lexeme: self.lexeme().to_string(),
            literal: Some(literal),
            line: self.line,
            span: self.start..self.current,
        }
    }

    fn identifier(&mut self) -> TokenType {
        while self.peek().is_some_and(is_identifier_char) {
            self.advance();
        }
        KEYWORDS
            .get(self.lexeme())
            .copied()
            .unwrap_or(TokenType::Identifier)
    }

    fn number(&mut self) -> Result<Token, LoxError> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        // A fraction needs at least one digit after the dot
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let value: f64 = self.lexeme().parse().map_err(|_| LoxError::Scan {
            message: format!("Invalid number: {}", self.lexeme()),
            line: self.line,
            span: self.start..self.current,
        })?;
        Ok(self.add_token_with_literal(TokenType::Number, Literal::Number(value)))
    }

    fn string(&mut self) -> Result<Token, LoxError> {
        let mut newlines = 0;
        loop {
            match self.peek() {
                None => {
                    // Nothing after an unterminated string is scanned
                    return Err(LoxError::Scan {
                        message: "Unterminated string.".to_string(),
                        line: self.line,
                        span: self.start..self.current,
                    });
                }
                Some('"') => break,
                Some(c) => {
                    if c == '\n' {
                        newlines += 1;
                    }
                    self.advance();
                }
            }
        }

        self.advance();
        self.line += newlines;
        let value = self.source[self.start + 1..self.current - 1].to_string();
        Ok(self.add_token_with_literal(TokenType::String, Literal::String(value)))
    }
}
