use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::token::{Literal, Token, TokenType};
use crate::value::Value;

const MAX_ARITY: usize = 255;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<LoxError>,
    next_id: usize,
}

impl Parser {
    /// `first_id` is the first expression id handed out, so several parsers
    /// can feed one resolution table without collisions.
    pub fn new(mut tokens: Vec<Token>, first_id: usize) -> Self {
        if tokens.last().is_none_or(|t| t.token_type != TokenType::Eof) {
            let (line, end) = tokens.last().map_or((1, 0), |t| (t.line, t.span.end));
            tokens.push(Token::new(TokenType::Eof, "", line).with_span(end..end));
        }
        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            next_id: first_id,
        }
    }

    /// Parses declarations until end of input. Syntax errors are collected
    /// and available through [`Parser::take_errors`].
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                debug!("Parsed {}", stmt);
                statements.push(stmt);
            }
        }
        info!(
            "Parsed {} statements with {} errors",
            statements.len(),
            self.errors.len()
        );
        statements
    }

    /// Parses the whole input as one expression.
    pub fn parse_expression(&mut self) -> Option<Expr> {
        let result = self.expression().and_then(|expr| {
            if self.is_at_end() {
                Ok(expr)
            } else {
                Err(self.error(self.peek(), "Expect end of expression."))
            }
        });

        match result {
            Ok(expr) => Some(expr),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    pub fn take_errors(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.errors)
    }

    /// The id the next parser should start from.
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_types(&[TokenType::Class]) {
            self.class_declaration()
        } else if self.match_types(&[TokenType::Fun]) {
            self.function("function").map(Stmt::Function)
        } else if self.match_types(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name = self
            .consume(TokenType::Identifier, "Expect class name.")?
            .clone();
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;
        Ok(Stmt::Class { name, methods })
    }

    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>, LoxError> {
        let name = self
            .consume(TokenType::Identifier, &format!("Expect {} name.", kind))?
            .clone();
        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    let err = self.error(self.peek(), "Can't have more than 255 parameters.");
                    self.errors.push(err);
                }
                params.push(
                    self.consume(TokenType::Identifier, "Expect parameter name.")?
                        .clone(),
                );
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(
            TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt, LoxError> {
        let name = self
            .consume(TokenType::Identifier, "Expect variable name.")?
            .clone();

        let initializer = if self.match_types(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn statement(&mut self) -> Result<Stmt, LoxError> {
        if self.match_types(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_types(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_types(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_types(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_types(&[TokenType::LeftBrace]) {
            Ok(Stmt::Block {
                statements: self.block()?,
            })
        } else {
            self.expression_statement()
        }
    }

    fn for_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_types(&[TokenType::Semicolon]) {
            None
        } else if self.match_types(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        let semicolon = self
            .consume(TokenType::Semicolon, "Expect ';' after loop condition.")?
            .clone();

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![
                    body,
                    Stmt::Expression {
                        expression: increment,
                    },
                ],
            };
        }

        let condition = condition.unwrap_or_else(|| Expr::Literal {
            value: Value::Bool(true),
            token: Token::new(TokenType::True, "true", semicolon.line),
        });

        let mut statements: Vec<Stmt> = initializer.into_iter().collect();
        statements.push(Stmt::While {
            condition,
            body: Box::new(body),
        });

        Ok(Stmt::Block { statements })
    }

    fn if_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_types(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, LoxError> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt, LoxError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, LoxError> {
        let mut statements = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, LoxError> {
        let expression = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expression })
    }

    fn expression(&mut self) -> Result<Expr, LoxError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, LoxError> {
        let expr = self.or()?;

        if self.match_types(&[TokenType::Equal]) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return Ok(match expr {
                Expr::Variable { name, .. } => Expr::Assign {
                    id: self.fresh_id(),
                    name,
                    value,
                },
                Expr::Get { object, name } => Expr::Set {
                    object,
                    name,
                    value,
                },
                other => {
                    // Reported, but parsing carries on with the left side
                    let err = self.error(&equals, "Invalid assignment target.");
                    self.errors.push(err);
                    other
                }
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.and()?;

        while self.match_types(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.equality()?;

        while self.match_types(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn binary_level(
        &mut self,
        operators: &[TokenType],
        operand: fn(&mut Self) -> Result<Expr, LoxError>,
    ) -> Result<Expr, LoxError> {
        let mut expr = operand(self)?;

        while self.match_types(operators) {
            let operator = self.previous().clone();
            let right = operand(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, LoxError> {
        self.binary_level(
            &[TokenType::BangEqual, TokenType::EqualEqual],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, LoxError> {
        self.binary_level(
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, LoxError> {
        self.binary_level(&[TokenType::Minus, TokenType::Plus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, LoxError> {
        self.binary_level(&[TokenType::Slash, TokenType::Star], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, LoxError> {
        if self.match_types(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr, LoxError> {
        let mut expr = self.primary()?;

        loop {
            if self.match_types(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_types(&[TokenType::Dot]) {
                let name = self
                    .consume(TokenType::Identifier, "Expect property name after '.'.")?
                    .clone();
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, LoxError> {
        let mut arguments = Vec::new();

        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let err = self.error(self.peek(), "Can't have more than 255 arguments.");
                    self.errors.push(err);
                }
                arguments.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self
            .consume(TokenType::RightParen, "Expect ')' after arguments.")?
            .clone();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr, LoxError> {
        let token = self.peek().clone();
        let value = match token.token_type {
            TokenType::False => Value::Bool(false),
            TokenType::True => Value::Bool(true),
            TokenType::Nil => Value::Nil,
            TokenType::Number | TokenType::String => match &token.literal {
                Some(Literal::Number(n)) => Value::Number(*n),
                Some(Literal::String(s)) => Value::String(s.clone()),
                None => return Err(self.error(&token, "Expect expression.")),
            },
            TokenType::Identifier => {
                self.advance();
                return Ok(Expr::Variable {
                    id: self.fresh_id(),
                    name: token,
                });
            }
            TokenType::LeftParen => {
                self.advance();
                let expression = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                return Ok(Expr::Grouping {
                    expression: Box::new(expression),
                });
            }
            _ => return Err(self.error(&token, "Expect expression.")),
        };

        self.advance();
        Ok(Expr::Literal { value, token })
    }

    fn fresh_id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }

    fn error(&self, token: &Token, message: &str) -> LoxError {
        let location = if token.token_type == TokenType::Eof {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        LoxError::Parse {
            message: message.to_string(),
            location,
            line: token.line,
            span: token.span.clone(),
        }
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token, LoxError> {
        if self.check(token_type) {
            return Ok(self.advance());
        }
        Err(self.error(self.peek(), message))
    }

    /// Skips to the next statement boundary after a syntax error.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Return => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for &t in types {
            if self.check(t) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::tokenize;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<LoxError>) {
        let (tokens, scan_errors) = tokenize(source);
        assert!(scan_errors.is_empty(), "scan errors: {:?}", scan_errors);
        let mut parser = Parser::new(tokens, 0);
        let statements = parser.parse();
        (statements, parser.take_errors())
    }

    fn print(source: &str) -> String {
        let (statements, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        statements
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn messages(errors: &[LoxError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn parse_eof_only_returns_empty() {
        let (statements, errors) = parse("");
        assert!(statements.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn tolerates_token_list_without_eof() {
        let mut parser = Parser::new(Vec::new(), 0);
        assert!(parser.parse().is_empty());
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        assert_eq!(print("1 + 2 * 3;"), "(; (+ 1.0 (* 2.0 3.0)))");
    }

    #[test]
    fn binary_operators_are_left_associative() {
        assert_eq!(print("1 - 2 - 3;"), "(; (- (- 1.0 2.0) 3.0))");
    }

    #[test]
    fn comparison_binds_tighter_than_equality() {
        assert_eq!(print("1 < 2 == true;"), "(; (== (< 1.0 2.0) true))");
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(print("a or b and c;"), "(; (or a (and b c)))");
    }

    #[test]
    fn unary_is_right_recursive() {
        assert_eq!(print("!!true;"), "(; (! (! true)))");
        assert_eq!(print("-(-2);"), "(; (- (group (- 2.0))))");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(print("a = b = 1;"), "(; (= a (= b 1.0)))");
    }

    #[test]
    fn property_assignment_becomes_set() {
        assert_eq!(print("obj.field = 1;"), "(; (= (. obj field) 1.0))");
    }

    #[test]
    fn parses_call_chains() {
        assert_eq!(print("f(1)(2).g();"), "(; (call (. (call (call f 1.0) 2.0) g)))");
    }

    #[test]
    fn parses_declarations_and_control_flow() {
        insta::assert_snapshot!(print(
            "var x = 1;\nif (x) { x = 2; } else x = 3;\nwhile (x > 0) x = x - 1;\nreturnless;"
        ), @r"
        (var x 1.0)
        (if x (block (; (= x 2.0))) (; (= x 3.0)))
        (while (> x 0.0) (; (= x (- x 1.0))))
        (; returnless)
        ");
    }

    #[test]
    fn parses_functions_and_classes() {
        insta::assert_snapshot!(print(
            "fun soma(a, b) { return a + b; }\nclass Conta { saldo() { return; } }"
        ), @r"
        (fun soma (a b) (return (+ a b)))
        (class Conta (fun saldo () (return)))
        ");
    }

    #[test]
    fn for_loop_desugars_into_while() {
        assert_eq!(
            print("for (var i = 0; i < 3; i = i + 1) f(i);"),
            "(block (var i 0.0) (while (< i 3.0) (block (; (call f i)) (; (= i (+ i 1.0))))))"
        );
    }

    #[test]
    fn for_loop_without_clauses_loops_on_true() {
        assert_eq!(print("for (;;) f();"), "(block (while true (; (call f))))");
    }

    #[test]
    fn assigns_unique_ids_to_variable_references() {
        let (tokens, _) = tokenize("a = a + b;");
        let mut parser = Parser::new(tokens, 10);
        let statements = parser.parse();
        let Stmt::Expression {
            expression: Expr::Assign { id, value, .. },
        } = &statements[0]
        else {
            panic!("expected assignment, got {:?}", statements[0]);
        };
        let Expr::Binary { left, right, .. } = value.as_ref() else {
            panic!("expected binary");
        };
        let Expr::Variable { id: left_id, .. } = left.as_ref() else {
            panic!("expected variable");
        };
        let Expr::Variable { id: right_id, .. } = right.as_ref() else {
            panic!("expected variable");
        };
        // The discarded target consumed id 10
        assert_eq!(*left_id, ExprId(11));
        assert_eq!(*right_id, ExprId(12));
        assert_eq!(*id, ExprId(13));
        assert_eq!(parser.next_id(), 14);
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let (_, errors) = parse("var x = 1");
        assert_eq!(
            messages(&errors),
            vec!["[line 1] Error at end: Expect ';' after variable declaration."]
        );
    }

    #[test]
    fn missing_expression_names_offending_token() {
        let (_, errors) = parse("1 + ;");
        assert_eq!(
            messages(&errors),
            vec!["[line 1] Error at ';': Expect expression."]
        );
    }

    #[test]
    fn invalid_assignment_target_does_not_abort() {
        let (statements, errors) = parse("1 + 2 = 3;\nvar ok = 1;");
        assert_eq!(
            messages(&errors),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn recovers_and_reports_multiple_errors() {
        let (statements, errors) = parse("var = 1;\nprint(1);\nvar y = ;\nvar z = 2;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line(), Some(1));
        assert_eq!(errors[1].line(), Some(3));
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn error_inside_block_keeps_rest_of_block() {
        let (statements, errors) = parse("{ var = 1; f(); }");
        assert_eq!(errors.len(), 1);
        assert_eq!(print_stmt(&statements[0]), "(block (; (call f)))");
    }

    fn print_stmt(stmt: &Stmt) -> String {
        stmt.to_string()
    }

    #[test]
    fn too_many_arguments_is_non_fatal() {
        let args = vec!["1"; 256].join(", ");
        let (statements, errors) = parse(&format!("f({});", args));
        assert_eq!(statements.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message(), "Can't have more than 255 arguments.");
    }

    #[test]
    fn too_many_parameters_is_non_fatal() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let (statements, errors) = parse(&format!("fun f({}) {{}}", params.join(", ")));
        assert_eq!(statements.len(), 1);
        assert_eq!(errors[0].message(), "Can't have more than 255 parameters.");
    }

    #[test]
    fn parse_expression_requires_whole_input() {
        let (tokens, _) = tokenize("1 + 2");
        let mut parser = Parser::new(tokens, 0);
        assert_eq!(parser.parse_expression().unwrap().to_string(), "(+ 1.0 2.0)");

        let (tokens, _) = tokenize("1 2");
        let mut parser = Parser::new(tokens, 0);
        assert!(parser.parse_expression().is_none());
        assert_eq!(
            parser.take_errors()[0].to_string(),
            "[line 1] Error at '2': Expect end of expression."
        );
    }
}
