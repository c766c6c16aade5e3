use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::token::Token;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Callable(Callable),
    Instance(Rc<Instance>),
}

/// Kind tag used by the equality operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Nil,
    Bool,
    Number,
    String,
    Callable,
    Instance,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Callable(_) => ValueKind::Callable,
            Value::Instance(_) => ValueKind::Instance,
        }
    }

    /// `nil`, `false`, `0` and `""` are falsy, and so are callables and
    /// instances.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Callable(_) | Value::Instance(_) => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Callable(callable) => write!(f, "{}", callable),
            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),
        }
    }
}

pub type NativeFn =
    fn(&mut Interpreter, &mut dyn Write, &[Value], &Token) -> Result<Value, LoxError>;

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// A user-defined function paired with the scope it was declared in.
pub struct LoxFunction {
    pub decl: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
}

impl LoxFunction {
    pub fn new(decl: Rc<FunctionDecl>, closure: Rc<RefCell<Environment>>) -> Self {
        Self { decl, closure }
    }

    pub fn name(&self) -> &str {
        &self.decl.name.lexeme
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        output: &mut dyn Write,
        arguments: Vec<Value>,
    ) -> Result<Value, LoxError> {
        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));
        for (param, argument) in self.decl.params.iter().zip(arguments) {
            env.define(param.lexeme.clone(), argument);
        }

        match interpreter.execute_block(&self.decl.body, Rc::new(RefCell::new(env)), output) {
            Ok(()) => Ok(Value::Nil),
            Err(LoxError::Return(value)) => Ok(value),
            Err(e) => Err(e),
        }
    }
}

// The closure may hold this very function, so only the name is shown.
impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name())
            .field("arity", &self.decl.params.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl Class {
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods.get(name).cloned()
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Own fields shadow methods. Methods come back unbound.
    pub fn get(&self, name: &Token) -> Result<Value, LoxError> {
        if let Some(value) = self.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        match self.class.find_method(&name.lexeme) {
            Some(method) => Ok(Value::Callable(Callable::Function(method))),
            None => Err(LoxError::runtime(
                format!("Undefined property '{}'.", name.lexeme),
                name,
            )),
        }
    }

    pub fn set(&self, name: &Token, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

/// Anything that can appear before a call's parentheses.
#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<LoxFunction>),
    Class(Rc<Class>),
    Native(Rc<NativeFunction>),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(function) => function.decl.params.len(),
            Callable::Class(_) => 0,
            Callable::Native(native) => native.arity,
        }
    }

    /// Invokes the callable. Arity has already been checked by the caller.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        output: &mut dyn Write,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, LoxError> {
        match self {
            Callable::Function(function) => function.call(interpreter, output, arguments),
            Callable::Class(class) => Ok(Value::Instance(Rc::new(Instance::new(Rc::clone(
                class,
            ))))),
            Callable::Native(native) => (native.func)(interpreter, output, &arguments, paren),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(function) => write!(f, "<fn {}>", function.name()),
            Callable::Class(class) => write!(f, "<class {}>", class.name),
            Callable::Native(_) => write!(f, "<native fn>"),
        }
    }
}
