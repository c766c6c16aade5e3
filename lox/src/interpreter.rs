use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, Stmt};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::natives;
use crate::parser::Parser;
use crate::resolver::{Resolutions, Resolver};
use crate::scanner::tokenize;
use crate::token::{Token, TokenType};
use crate::value::{Callable, Class, LoxFunction, Value};

/// How a runtime error affects the remaining top-level statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// The first runtime error aborts the run.
    #[default]
    Batch,
    /// The error is reported and execution resumes with the next statement.
    Interactive,
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: Resolutions,
    next_expr_id: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let mut globals = Environment::new();
        natives::register(&mut globals);
        let globals = Rc::new(RefCell::new(globals));

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            next_expr_id: 0,
        }
    }

    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        Rc::clone(&self.globals)
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.environment.borrow().variable_names()
    }

    /// Records resolved distances for later lookups.
    pub fn resolve(&mut self, resolutions: Resolutions) {
        self.locals.extend(resolutions);
    }

    /// Scans, parses and resolves `source` against this interpreter.
    ///
    /// Lexical and syntax errors are all collected. Resolution stops at the
    /// first error.
    pub fn compile(&mut self, source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
        let (tokens, mut errors) = tokenize(source);

        let mut parser = Parser::new(tokens, self.next_expr_id);
        let statements = parser.parse();
        self.next_expr_id = parser.next_id();
        errors.extend(parser.take_errors());

        if !errors.is_empty() {
            return Err(errors);
        }

        let resolutions = Resolver::new()
            .resolve(&statements)
            .map_err(|e| vec![e])?;
        self.resolve(resolutions);
        Ok(statements)
    }

    /// Parses `source` as a single expression and resolves it.
    pub fn compile_expression(&mut self, source: &str) -> Result<Expr, Vec<LoxError>> {
        let (tokens, mut errors) = tokenize(source);

        let mut parser = Parser::new(tokens, self.next_expr_id);
        let expr = parser.parse_expression();
        self.next_expr_id = parser.next_id();
        errors.extend(parser.take_errors());

        match expr {
            Some(expr) if errors.is_empty() => {
                let resolutions = Resolver::new()
                    .resolve_expression(&expr)
                    .map_err(|e| vec![e])?;
                self.resolve(resolutions);
                Ok(expr)
            }
            _ => Err(errors),
        }
    }

    /// Executes top-level statements. Runtime errors are returned in the
    /// order they happened.
    pub fn interpret(
        &mut self,
        statements: &[Stmt],
        mode: RunMode,
        output: &mut dyn Write,
    ) -> Vec<LoxError> {
        let mut errors = Vec::new();

        for stmt in statements {
            let cached = Rc::clone(&self.environment);
            match self.execute(stmt, output) {
                Ok(()) | Err(LoxError::Return(_)) => {}
                Err(e) => {
                    debug!("Runtime error, restoring environment: {}", e);
                    self.environment = cached;
                    errors.push(e);
                    if mode == RunMode::Batch {
                        break;
                    }
                }
            }
        }

        info!(
            "Interpreted {} statements with {} runtime errors",
            statements.len(),
            errors.len()
        );
        errors
    }

    pub fn execute(&mut self, stmt: &Stmt, output: &mut dyn Write) -> Result<(), LoxError> {
        match stmt {
            Stmt::Expression { expression } => {
                self.evaluate(expression, output)?;
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, output)?,
                    None => Value::Nil,
                };
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Block { statements } => {
                let env = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, Rc::new(RefCell::new(env)), output)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, output)?.is_truthy() {
                    self.execute(then_branch, output)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt, output)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition, output)?.is_truthy() {
                    self.execute(body, output)?;
                }
                Ok(())
            }
            Stmt::Function(decl) => {
                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment));
                self.environment.borrow_mut().define(
                    decl.name.lexeme.clone(),
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, output)?,
                    None => Value::Nil,
                };
                Err(LoxError::Return(value))
            }
            Stmt::Class { name, methods } => {
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), Value::Nil);

                let methods = methods
                    .iter()
                    .map(|decl| {
                        let method = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment));
                        (decl.name.lexeme.clone(), Rc::new(method))
                    })
                    .collect();

                let class = Class {
                    name: name.lexeme.clone(),
                    methods,
                };
                self.environment
                    .borrow_mut()
                    .assign(name, Value::Callable(Callable::Class(Rc::new(class))))
            }
        }
    }

    /// Runs `statements` in `environment`, restoring the current scope on
    /// every exit path.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
        output: &mut dyn Write,
    ) -> Result<(), LoxError> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt, output));

        self.environment = previous;
        result
    }

    pub fn evaluate(&mut self, expr: &Expr, output: &mut dyn Write) -> Result<Value, LoxError> {
        match expr {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Grouping { expression } => self.evaluate(expression, output),
            Expr::Variable { id, name } => self.look_up_variable(*id, name),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value, output)?;
                match self.locals.get(id) {
                    Some(&distance) => {
                        self.environment
                            .borrow_mut()
                            .assign_at(distance, name, value.clone())?;
                    }
                    None => {
                        self.environment.borrow_mut().assign(name, value.clone())?;
                    }
                }
                Ok(value)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left, output)?;
                let short_circuit = match operator.token_type {
                    TokenType::Or => left_val.is_truthy(),
                    _ => !left_val.is_truthy(),
                };
                if short_circuit {
                    Ok(left_val)
                } else {
                    self.evaluate(right, output)
                }
            }
            Expr::Unary { operator, right } => {
                let right_val = self.evaluate(right, output)?;
                match operator.token_type {
                    TokenType::Minus => Ok(Value::Number(-require_number(&right_val, right)?)),
                    _ => Ok(Value::Bool(!right_val.is_truthy())),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left, output)?;
                let right_val = self.evaluate(right, output)?;
                binary(operator, (&left_val, left), (&right_val, right))
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee, output)?;

                let arguments = arguments
                    .iter()
                    .map(|arg| self.evaluate(arg, output))
                    .collect::<Result<Vec<_>, _>>()?;

                let Value::Callable(callable) = callee_val else {
                    return Err(LoxError::runtime(
                        "Can only call functions and classes.",
                        paren,
                    ));
                };

                if arguments.len() != callable.arity() {
                    return Err(LoxError::runtime(
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            arguments.len()
                        ),
                        paren,
                    ));
                }

                callable.call(self, output, arguments, paren)
            }
            Expr::Get { object, name } => match self.evaluate(object, output)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(LoxError::runtime(
                    "Only instances have properties.",
                    name,
                )),
            },
            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object, output)? else {
                    return Err(LoxError::runtime("Only instances have fields.", name));
                };
                let value = self.evaluate(value, output)?;
                instance.set(name, value.clone());
                Ok(value)
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, LoxError> {
        match self.locals.get(&id) {
            Some(&distance) => self.environment.borrow().get_at(distance, name),
            None => self.environment.borrow().get(name),
        }
    }
}

fn operand_error(expr: &Expr) -> LoxError {
    let token = expr.token();
    LoxError::runtime(
        format!("Operand must be a number: {}", token.lexeme),
        token,
    )
}

fn require_number(value: &Value, expr: &Expr) -> Result<f64, LoxError> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(operand_error(expr)),
    }
}

fn require_numbers(
    (left, left_expr): (&Value, &Expr),
    (right, right_expr): (&Value, &Expr),
) -> Result<(f64, f64), LoxError> {
    Ok((
        require_number(left, left_expr)?,
        require_number(right, right_expr)?,
    ))
}

fn binary(
    operator: &Token,
    left: (&Value, &Expr),
    right: (&Value, &Expr),
) -> Result<Value, LoxError> {
    match operator.token_type {
        TokenType::EqualEqual | TokenType::BangEqual => {
            let (a, b) = (left.0, right.0);
            // Values of different kinds compare false under both operators
            if a.kind() != b.kind() {
                return Ok(Value::Bool(false));
            }
            let equal = a == b;
            Ok(Value::Bool(if operator.token_type == TokenType::EqualEqual {
                equal
            } else {
                !equal
            }))
        }
        TokenType::Plus => match (left.0, right.0) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => {
                let (a, b) = require_numbers(left, right)?;
                Ok(Value::Number(a + b))
            }
        },
        _ => {
            let (a, b) = require_numbers(left, right)?;
            Ok(match operator.token_type {
                TokenType::Minus => Value::Number(a - b),
                TokenType::Star => Value::Number(a * b),
                TokenType::Slash => Value::Number(a / b),
                TokenType::Greater => Value::Bool(a > b),
                TokenType::GreaterEqual => Value::Bool(a >= b),
                TokenType::Less => Value::Bool(a < b),
                _ => Value::Bool(a <= b),
            })
        }
    }
}
