//! Lexical environments.

use super::ast::Name;
use super::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
    AlreadyDeclared,
    NotDefined,
    Constant,
}

struct Binding {
    value: Value,
    mutable: bool,
    /// `let`/`const` bindings cannot be redeclared in the same scope.
    lexical: bool,
}

pub struct Scope {
    bindings: RefCell<HashMap<Name, Binding>>,
    parent: Option<Rc<Scope>>,
    function_scope: bool,
}

impl Scope {
    pub fn root() -> Rc<Scope> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
            function_scope: true,
        })
    }

    pub fn child(parent: &Rc<Scope>, function_scope: bool) -> Rc<Scope> {
        Rc::new(Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            function_scope,
        })
    }

    /// `let`/`const` declaration.
    pub fn declare(&self, name: &Name, value: Value, mutable: bool) -> Result<(), ScopeError> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.get(name).is_some_and(|b| b.lexical) {
            return Err(ScopeError::AlreadyDeclared);
        }
        bindings.insert(
            name.clone(),
            Binding {
                value,
                mutable,
                lexical: true,
            },
        );
        Ok(())
    }

    /// Function, parameter and intrinsic bindings; replaces silently.
    pub fn define(&self, name: &str, value: Value, mutable: bool) {
        self.bindings.borrow_mut().insert(
            name.into(),
            Binding {
                value,
                mutable,
                lexical: false,
            },
        );
    }

    /// `var` declaration in the nearest function scope.
    pub fn declare_var(self: &Rc<Self>, name: &Name, value: Option<Value>) {
        let mut scope = self.clone();
        while !scope.function_scope {
            match &scope.parent {
                Some(parent) => scope = parent.clone(),
                None => break,
            }
        }
        let mut bindings = scope.bindings.borrow_mut();
        match (bindings.get_mut(name), value) {
            (Some(existing), Some(value)) => existing.value = value,
            (Some(_), None) => {}
            (None, value) => {
                bindings.insert(
                    name.clone(),
                    Binding {
                        value: value.unwrap_or_default(),
                        mutable: true,
                        lexical: false,
                    },
                );
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.value.clone());
        }
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            if let Some(binding) = scope.bindings.borrow().get(name) {
                return Some(binding.value.clone());
            }
            current = scope.parent.clone();
        }
        None
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), ScopeError> {
        if let Some(binding) = self.bindings.borrow_mut().get_mut(name) {
            if !binding.mutable {
                return Err(ScopeError::Constant);
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(ScopeError::NotDefined),
        }
    }

    /// Copy the named bindings of `self` into `target` (per-iteration loop scopes).
    pub fn copy_bindings(&self, target: &Scope, names: &[Name]) {
        let source = self.bindings.borrow();
        let mut dest = target.bindings.borrow_mut();
        for name in names {
            if let Some(binding) = source.get(name) {
                dest.insert(
                    name.clone(),
                    Binding {
                        value: binding.value.clone(),
                        mutable: binding.mutable,
                        lexical: binding.lexical,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadowing_and_constants() {
        let root = Scope::root();
        let name: Name = "x".into();
        root.declare(&name, Value::Number(1.0), false).unwrap();
        let inner = Scope::child(&root, false);
        inner.declare(&name, Value::Number(2.0), true).unwrap();
        assert_eq!(inner.lookup("x").map(|v| v.to_number()), Some(2.0));
        assert_eq!(root.assign("x", Value::Null), Err(ScopeError::Constant));
        assert_eq!(
            root.declare(&name, Value::Null, true),
            Err(ScopeError::AlreadyDeclared)
        );
        assert_eq!(inner.assign("y", Value::Null), Err(ScopeError::NotDefined));
    }

    #[test]
    fn var_hoists_to_function_scope() {
        let function = Scope::root();
        let block = Scope::child(&function, false);
        block.declare_var(&"v".into(), Some(Value::Bool(true)));
        assert!(function.lookup("v").is_some());
    }
}
