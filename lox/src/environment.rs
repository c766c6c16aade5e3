use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::LoxError;
use crate::token::Token;
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(format!("Undefined variable '{}'.", name.lexeme), name)
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Binds `name` in this scope, replacing any previous binding.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Dynamic lookup walking the whole chain.
    pub fn get(&self, name: &Token) -> Result<Value, LoxError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(undefined(name)),
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), LoxError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(undefined(name)),
        }
    }

    /// Lookup in the scope exactly `distance` links up the chain.
    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Value, LoxError> {
        if distance == 0 {
            return self.values.get(&name.lexeme).cloned().ok_or_else(|| undefined(name));
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get_at(distance - 1, name),
            None => Err(undefined(name)),
        }
    }

    pub fn assign_at(&mut self, distance: usize, name: &Token, value: Value) -> Result<(), LoxError> {
        if distance == 0 {
            return match self.values.get_mut(&name.lexeme) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(undefined(name)),
            };
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign_at(distance - 1, name, value),
            None => Err(undefined(name)),
        }
    }

    /// Every name visible from this scope, innermost first.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();

        if let Some(enclosing) = &self.enclosing {
            for name in enclosing.borrow().variable_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        names
    }
}
