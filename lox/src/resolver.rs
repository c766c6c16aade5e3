use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::token::Token;

/// Maps variable-referencing expressions to the number of scopes between the
/// reference and its declaration. Globals are absent.
pub type Resolutions = HashMap<ExprId, usize>;

/// Tracks function context for validating `return`
#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Method,
}

pub struct Resolver {
    /// Innermost scope last. `false` while the initializer is being resolved.
    scopes: Vec<HashMap<String, bool>>,
    resolutions: Resolutions,
    current_function: FunctionType,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            resolutions: HashMap::new(),
            current_function: FunctionType::None,
        }
    }

    /// Resolves all statements, stopping at the first static error.
    pub fn resolve(mut self, statements: &[Stmt]) -> Result<Resolutions, LoxError> {
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        info!("Resolved {} local references", self.resolutions.len());
        Ok(self.resolutions)
    }

    /// Resolves a standalone expression at top level.
    pub fn resolve_expression(mut self, expr: &Expr) -> Result<Resolutions, LoxError> {
        self.resolve_expr(expr)?;
        Ok(self.resolutions)
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) -> Result<(), LoxError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(());
        };

        if scope.contains_key(&name.lexeme) {
            return Err(error(
                name,
                "Already a variable with this name in this scope.",
            ));
        }

        scope.insert(name.lexeme.clone(), false);
        Ok(())
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (distance, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("'{}' resolved at distance {}", name.lexeme, distance);
                self.resolutions.insert(id, distance);
                return;
            }
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<(), LoxError> {
        match stmt {
            Stmt::Block { statements } => {
                self.begin_scope();
                let result = statements.iter().try_for_each(|s| self.resolve_stmt(s));
                self.end_scope();
                result
            }
            Stmt::Var { name, initializer } => {
                self.declare(name)?;
                if let Some(init) = initializer {
                    self.resolve_expr(init)?;
                }
                self.define(name);
                Ok(())
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name)?;
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function)
            }
            Stmt::Class { name, methods } => {
                self.declare(name)?;
                self.define(name);
                // Methods close over the scope the class is declared in
                methods
                    .iter()
                    .try_for_each(|method| self.resolve_function(method, FunctionType::Method))
            }
            Stmt::Expression { expression } => self.resolve_expr(expression),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(error(keyword, "Can't return from top-level code."));
                }
                match value {
                    Some(value) => self.resolve_expr(value),
                    None => Ok(()),
                }
            }
        }
    }

    /// Parameters and body share one scope, matching the call environment.
    fn resolve_function(
        &mut self,
        decl: &FunctionDecl,
        fn_type: FunctionType,
    ) -> Result<(), LoxError> {
        let enclosing = self.current_function;
        self.current_function = fn_type;
        self.begin_scope();

        let result = self.resolve_function_body(decl);

        self.end_scope();
        self.current_function = enclosing;
        result
    }

    fn resolve_function_body(&mut self, decl: &FunctionDecl) -> Result<(), LoxError> {
        for param in &decl.params {
            self.declare(param)?;
            self.define(param);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    fn resolve_expr(&mut self, expr: &Expr) -> Result<(), LoxError> {
        match expr {
            Expr::Variable { id, name } => {
                if self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.lexeme))
                    == Some(&false)
                {
                    return Err(error(
                        name,
                        "Can't read local variable in its own initializer.",
                    ));
                }
                self.resolve_local(*id, name);
                Ok(())
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
                Ok(())
            }
            Expr::Logical { left, right, .. } | Expr::Binary { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                arguments.iter().try_for_each(|arg| self.resolve_expr(arg))
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value)?;
                self.resolve_expr(object)
            }
            Expr::Grouping { expression } => self.resolve_expr(expression),
            Expr::Literal { .. } => Ok(()),
        }
    }
}

fn error(token: &Token, message: &str) -> LoxError {
    LoxError::Resolution {
        message: message.to_string(),
        line: token.line,
        span: token.span.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::tokenize;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, scan_errors) = tokenize(source);
        assert!(scan_errors.is_empty());
        let mut parser = Parser::new(tokens, 0);
        let statements = parser.parse();
        assert!(parser.take_errors().is_empty());
        statements
    }

    fn resolve(source: &str) -> Result<Resolutions, LoxError> {
        Resolver::new().resolve(&parse(source))
    }

    fn distances(source: &str) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = resolve(source)
            .unwrap()
            .into_iter()
            .map(|(id, distance)| (id.0, distance))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn globals_are_left_unresolved() {
        assert!(resolve("var a = 1; a; a = 2;").unwrap().is_empty());
    }

    #[test]
    fn resolves_local_at_distance_zero() {
        // ids: a(0)
        assert_eq!(distances("{ var a = 1; a; }"), vec![(0, 0)]);
    }

    #[test]
    fn resolves_enclosing_block_at_distance_one() {
        assert_eq!(distances("{ var a = 1; { a; } }"), vec![(0, 1)]);
    }

    #[test]
    fn shadowing_resolves_to_nearest_scope() {
        // ids: a(0) inner, a(1) outer
        assert_eq!(
            distances("{ var a = 1; { var a = 2; a; } a; }"),
            vec![(0, 0), (1, 0)]
        );
    }

    #[test]
    fn parameters_and_body_share_a_scope() {
        assert_eq!(distances("fun f(a) { var b = a; b; }"), vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn closure_reference_crosses_function_boundary() {
        let source = "fun outer() { var x = 1; fun inner() { x = x + 1; } }";
        // ids: x(1) read, x(2) assignment
        assert_eq!(distances(source), vec![(1, 1), (2, 1)]);
    }

    #[test]
    fn method_bodies_resolve_parameters_locally() {
        assert_eq!(distances("class C { m(a) { a; } }"), vec![(0, 0)]);
    }

    #[test]
    fn self_reference_in_initializer_is_error() {
        let err = resolve("{ var a = a; }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[line 1] Error: Can't read local variable in its own initializer."
        );
    }

    #[test]
    fn self_reference_at_global_scope_is_allowed() {
        assert!(resolve("var a = a;").is_ok());
    }

    #[test]
    fn duplicate_declaration_in_scope_is_error() {
        let err = resolve("{ var a = 1;\nvar a = 2; }").unwrap_err();
        assert_eq!(
            err.message(),
            "Already a variable with this name in this scope."
        );
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn duplicate_parameter_is_error() {
        assert!(resolve("fun f(a, a) {}").is_err());
    }

    #[test]
    fn redeclaring_global_is_allowed() {
        assert!(resolve("var a = 1; var a = 2;").is_ok());
    }

    #[test]
    fn return_at_top_level_is_error() {
        let err = resolve("return 1;").unwrap_err();
        assert_eq!(err.message(), "Can't return from top-level code.");
    }

    #[test]
    fn return_inside_function_and_method_is_allowed() {
        assert!(resolve("fun f() { return 1; } class C { m() { return; } }").is_ok());
    }

    #[test]
    fn first_error_aborts_resolution() {
        let err = resolve("return 1;\n{ var a = a; }").unwrap_err();
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn resolves_inside_calls_and_properties() {
        // ids: o(0), f(1), a(2)
        let source = "{ var o; var f; var a; o.x = f(a); }";
        assert_eq!(distances(source), vec![(0, 0), (1, 0), (2, 0)]);
    }
}
