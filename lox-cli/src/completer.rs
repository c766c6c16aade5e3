use lox::{Scanner, TokenType, is_identifier_char};
use rustyline::Context;
use rustyline::Helper;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use std::cell::RefCell;

/// Rustyline helper that completes and highlights Lox input
pub struct LoxHelper {
    variables: RefCell<Vec<String>>,
}

impl LoxHelper {
    pub fn new() -> Self {
        Self {
            variables: RefCell::new(Vec::new()),
        }
    }

    pub fn set_variables(&self, vars: Vec<String>) {
        *self.variables.borrow_mut() = vars;
    }

    /// Find the start position of the current word being typed
    fn find_word_start(line: &str, pos: usize) -> usize {
        let before_cursor = &line[..pos];
        for (i, c) in before_cursor.char_indices().rev() {
            if !is_identifier_char(c) {
                return i + c.len_utf8();
            }
        }
        0
    }

    fn get_completions(prefix: &str, variables: &[String]) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }

        let mut completions: Vec<String> = lox::KEYWORDS
            .keys()
            .filter(|keyword| keyword.starts_with(prefix))
            .map(|keyword| keyword.to_string())
            .collect();
        completions.sort();

        for var in variables {
            if var.starts_with(prefix) && !completions.contains(var) {
                completions.push(var.clone());
            }
        }

        completions
    }

    /// Highlight a line of Lox code with ANSI colors using the scanner
    pub fn highlight_line(line: &str, variables: &[String]) -> String {
        if line.is_empty() {
            return String::new();
        }

        const KEYWORD: &str = "\x1b[35m"; // Magenta
        const STRING: &str = "\x1b[32m"; // Green
        const NUMBER: &str = "\x1b[33m"; // Yellow
        const COMMENT: &str = "\x1b[90m"; // Gray
        const VARIABLE: &str = "\x1b[36m"; // Cyan
        const RESET: &str = "\x1b[0m";

        let mut result = String::new();
        let mut pos = 0usize;

        for token in Scanner::new(line).flatten() {
            if token.token_type == TokenType::Eof {
                break;
            }

            // Skipped whitespace and invalid characters
            if token.span.start > pos {
                result.push_str(&line[pos..token.span.start]);
            }

            let color = match token.token_type {
                TokenType::String => Some(STRING),
                TokenType::Number => Some(NUMBER),
                TokenType::Identifier if variables.contains(&token.lexeme) => Some(VARIABLE),
                t if t.is_keyword() => Some(KEYWORD),
                _ => None,
            };

            match color {
                Some(c) => {
                    result.push_str(c);
                    result.push_str(&line[token.span.clone()]);
                    result.push_str(RESET);
                }
                None => result.push_str(&line[token.span.clone()]),
            }
            pos = token.span.end;
        }

        // Comments are skipped by the scanner, so only a trailing one remains.
        let rest = &line[pos..];
        match rest.find("//") {
            Some(idx) => {
                result.push_str(&rest[..idx]);
                result.push_str(COMMENT);
                result.push_str(&rest[idx..]);
                result.push_str(RESET);
            }
            None => result.push_str(rest),
        }

        result
    }
}

impl Helper for LoxHelper {}

impl Highlighter for LoxHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> std::borrow::Cow<'l, str> {
        let variables = self.variables.borrow();
        std::borrow::Cow::Owned(Self::highlight_line(line, &variables))
    }

    fn highlight_char(
        &self,
        _line: &str,
        _pos: usize,
        _kind: rustyline::highlight::CmdKind,
    ) -> bool {
        true
    }
}

impl Hinter for LoxHelper {
    type Hint = String;
}
impl Validator for LoxHelper {}

impl Completer for LoxHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = Self::find_word_start(line, pos);
        let prefix = &line[start..pos];
        let variables = self.variables.borrow();
        let pairs = Self::get_completions(prefix, &variables)
            .into_iter()
            .map(|s| Pair {
                display: s.clone(),
                replacement: s,
            })
            .collect();

        Ok((start, pairs))
    }
}
