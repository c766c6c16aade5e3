use std::fmt;
use std::rc::Rc;

use crate::token::{Token, canonical_number};
use crate::value::Value;

/// Stable identity of a variable-referencing expression, keyed by the
/// resolver's distance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Value,
        token: Token,
    },
    Variable {
        id: ExprId,
        name: Token,
    },
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    /// Equality, comparison, term and factor operators.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        object: Box<Expr>,
        name: Token,
    },
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    Grouping {
        expression: Box<Expr>,
    },
}

impl Expr {
    /// The token a diagnostic about this expression points at.
    pub fn token(&self) -> &Token {
        match self {
            Expr::Literal { token, .. } => token,
            Expr::Variable { name, .. } | Expr::Assign { name, .. } => name,
            Expr::Logical { operator, .. }
            | Expr::Binary { operator, .. }
            | Expr::Unary { operator, .. } => operator,
            Expr::Call { paren, .. } => paren,
            Expr::Get { name, .. } | Expr::Set { name, .. } => name,
            Expr::Grouping { expression } => expression.token(),
        }
    }
}

/// A named function or method declaration, shared by every closure built
/// from it.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression {
        expression: Expr,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Function(Rc<FunctionDecl>),
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Class {
        name: Token,
        methods: Vec<Rc<FunctionDecl>>,
    },
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Number(n) => write!(f, "{}", canonical_number(*n)),
        other => write!(f, "{}", other),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value, .. } => write_literal(f, value),
            Expr::Variable { name, .. } => write!(f, "{}", name.lexeme),
            Expr::Assign { name, value, .. } => write!(f, "(= {} {})", name.lexeme, value),
            Expr::Logical {
                left,
                operator,
                right,
            }
            | Expr::Binary {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", operator.lexeme, left, right),
            Expr::Unary { operator, right } => write!(f, "({} {})", operator.lexeme, right),
            Expr::Call {
                callee, arguments, ..
            } => {
                write!(f, "(call {}", callee)?;
                for argument in arguments {
                    write!(f, " {}", argument)?;
                }
                write!(f, ")")
            }
            Expr::Get { object, name } => write!(f, "(. {} {})", object, name.lexeme),
            Expr::Set {
                object,
                name,
                value,
            } => write!(f, "(= (. {} {}) {})", object, name.lexeme, value),
            Expr::Grouping { expression } => write!(f, "(group {})", expression),
        }
    }
}

impl fmt::Display for FunctionDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|p| p.lexeme.as_str()).collect();
        write!(f, "(fun {} ({})", self.name.lexeme, params.join(" "))?;
        for stmt in &self.body {
            write!(f, " {}", stmt)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expression { expression } => write!(f, "(; {})", expression),
            Stmt::Var {
                name,
                initializer: Some(init),
            } => write!(f, "(var {} {})", name.lexeme, init),
            Stmt::Var {
                name,
                initializer: None,
            } => write!(f, "(var {})", name.lexeme),
            Stmt::Block { statements } => {
                write!(f, "(block")?;
                for stmt in statements {
                    write!(f, " {}", stmt)?;
                }
                write!(f, ")")
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => {
                    write!(f, "(if {} {} {})", condition, then_branch, else_branch)
                }
                None => write!(f, "(if {} {})", condition, then_branch),
            },
            Stmt::While { condition, body } => write!(f, "(while {} {})", condition, body),
            Stmt::Function(decl) => write!(f, "{}", decl),
            Stmt::Return { value: Some(v), .. } => write!(f, "(return {})", v),
            Stmt::Return { value: None, .. } => write!(f, "(return)"),
            Stmt::Class { name, methods } => {
                write!(f, "(class {}", name.lexeme)?;
                for method in methods {
                    write!(f, " {}", method)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn make_token(token_type: TokenType, lexeme: &str) -> Token {
        Token::new(token_type, lexeme, 1)
    }

    fn number(n: f64) -> Expr {
        Expr::Literal {
            value: Value::Number(n),
            token: make_token(TokenType::Number, &n.to_string()),
        }
    }

    #[test]
    fn displays_number_literal_canonically() {
        assert_eq!(number(42.0).to_string(), "42.0");
        assert_eq!(number(1.5).to_string(), "1.5");
    }

    #[test]
    fn displays_string_and_keyword_literals() {
        let s = Expr::Literal {
            value: Value::String("hi".to_string()),
            token: make_token(TokenType::String, "\"hi\""),
        };
        let nil = Expr::Literal {
            value: Value::Nil,
            token: make_token(TokenType::Nil, "nil"),
        };
        assert_eq!(s.to_string(), "hi");
        assert_eq!(nil.to_string(), "nil");
    }

    #[test]
    fn displays_nested_binary_expression() {
        let expr = Expr::Binary {
            left: Box::new(Expr::Unary {
                operator: make_token(TokenType::Minus, "-"),
                right: Box::new(number(123.0)),
            }),
            operator: make_token(TokenType::Star, "*"),
            right: Box::new(Expr::Grouping {
                expression: Box::new(number(45.67)),
            }),
        };
        assert_eq!(expr.to_string(), "(* (- 123.0) (group 45.67))");
    }

    #[test]
    fn grouping_points_at_inner_token() {
        let expr = Expr::Grouping {
            expression: Box::new(Expr::Variable {
                id: ExprId(0),
                name: make_token(TokenType::Identifier, "x"),
            }),
        };
        assert_eq!(expr.token().lexeme, "x");
    }

    #[test]
    fn displays_call_and_property_access() {
        let object = Expr::Variable {
            id: ExprId(1),
            name: make_token(TokenType::Identifier, "obj"),
        };
        let call = Expr::Call {
            callee: Box::new(Expr::Get {
                object: Box::new(object.clone()),
                name: make_token(TokenType::Identifier, "go"),
            }),
            paren: make_token(TokenType::RightParen, ")"),
            arguments: vec![number(1.0), number(2.0)],
        };
        let set = Expr::Set {
            object: Box::new(object),
            name: make_token(TokenType::Identifier, "field"),
            value: Box::new(number(3.0)),
        };
        assert_eq!(call.to_string(), "(call (. obj go) 1.0 2.0)");
        assert_eq!(set.to_string(), "(= (. obj field) 3.0)");
    }

    #[test]
    fn displays_function_declaration() {
        let decl = FunctionDecl {
            name: make_token(TokenType::Identifier, "soma"),
            params: vec![
                make_token(TokenType::Identifier, "a"),
                make_token(TokenType::Identifier, "b"),
            ],
            body: vec![Stmt::Return {
                keyword: make_token(TokenType::Return, "return"),
                value: Some(Expr::Binary {
                    left: Box::new(Expr::Variable {
                        id: ExprId(2),
                        name: make_token(TokenType::Identifier, "a"),
                    }),
                    operator: make_token(TokenType::Plus, "+"),
                    right: Box::new(Expr::Variable {
                        id: ExprId(3),
                        name: make_token(TokenType::Identifier, "b"),
                    }),
                }),
            }],
        };
        assert_eq!(
            Stmt::Function(Rc::new(decl)).to_string(),
            "(fun soma (a b) (return (+ a b)))"
        );
    }

    #[test]
    fn displays_var_without_initializer() {
        let stmt = Stmt::Var {
            name: make_token(TokenType::Identifier, "x"),
            initializer: None,
        };
        assert_eq!(stmt.to_string(), "(var x)");
    }
}
