//! Name resolution.
//!
//! A scope is a map of bindings plus an optional enclosing scope. The
//! interpreter's global scope has no parent and lives across cells; each
//! function call gets a child of the scope the function was defined in.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn global() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn child(parent: Rc<Scope>) -> Rc<Self> {
        Rc::new(Self {
            vars: RefCell::default(),
            parent: Some(parent),
        })
    }

    /// Look `name` up here, then in each enclosing scope.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Bind `name` in this scope.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.vars.borrow_mut().insert(name.into(), value);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_sees_parent_but_binds_locally() {
        let global = Scope::global();
        global.set("x", Value::Int(1));
        let local = Scope::child(global.clone());
        assert_eq!(local.get("x"), Some(Value::Int(1)));

        local.set("x", Value::Int(2));
        assert_eq!(local.get("x"), Some(Value::Int(2)));
        assert_eq!(global.get("x"), Some(Value::Int(1)));
        assert_eq!(local.get("missing"), None);
    }
}
