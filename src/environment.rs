use crate::lexer::Token;
use crate::types::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    /// Name token where the lookup happened, kept for line reporting.
    #[error("Undefined variable '{}'.", .0.lexeme)]
    UndefinedVariable(Token),
}

impl EnvError {
    pub fn token(&self) -> &Token {
        match self {
            EnvError::UndefinedVariable(token) => token,
        }
    }
}

// --- Environment Definition ---

#[derive(Debug, Default)]
pub struct Environment {
    // Shared so that blocks and calls can point back at the frame they were opened from.
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Binds a name in the *current* frame, replacing any existing local value.
    /// Used for call parameters, which never reach outward.
    pub fn define(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    /// Assignment semantics: update the nearest frame that already holds `name`,
    /// otherwise create it in the current frame.
    pub fn assign(&mut self, name: &str, value: Value) {
        if let Some(value) = self.try_update(name, value) {
            self.bindings.insert(name.to_string(), value);
        }
    }

    // Hands the value back when no frame in the chain holds `name`.
    fn try_update(&mut self, name: &str, value: Value) -> Option<Value> {
        if let Some(slot) = self.bindings.get_mut(name) {
            *slot = value;
            return None;
        }
        match &self.outer {
            Some(outer_env_ptr) => outer_env_ptr.borrow_mut().try_update(name, value),
            None => Some(value),
        }
    }

    /// Looks up a variable's value.
    /// Checks the current environment first, then walks up the outer environment chain.
    pub fn get(&self, name: &Token) -> Result<Value, EnvError> {
        self.lookup(&name.lexeme)
            .ok_or_else(|| EnvError::UndefinedVariable(name.clone()))
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => self
                .outer
                .as_ref()
                .and_then(|outer_env_ptr| outer_env_ptr.borrow().lookup(name)),
        }
    }

    fn add_identifiers(&self, mut identifiers: HashSet<String>) -> HashSet<String> {
        identifiers.extend(self.bindings.keys().cloned());
        match self.outer {
            Some(ref outer_env_ptr) => outer_env_ptr.borrow().add_identifiers(identifiers),
            None => identifiers,
        }
    }

    /// Gets every identifier visible from this environment
    pub fn get_identifiers(&self) -> HashSet<String> {
        self.add_identifiers(HashSet::new())
    }
}
