//! Lexical scopes and name resolution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::DeclKind;
use crate::value::Value;

pub(crate) type ScopeRef = Rc<RefCell<Scope>>;

/// One frame of the scope chain.
///
/// A scope either holds bindings or, for `with`, an object whose properties
/// shadow the enclosing scopes.
#[derive(Default)]
pub(crate) struct Scope {
    vars: HashMap<String, Binding>,
    parent: Option<ScopeRef>,
    with_object: Option<Value>,
    /// Function and global scopes receive `var` declarations.
    function: bool,
}

struct Binding {
    value: Value,
    constant: bool,
}

impl Scope {
    pub(crate) fn global() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            function: true,
            ..Scope::default()
        }))
    }

    pub(crate) fn child(parent: &ScopeRef, function: bool) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(Rc::clone(parent)),
            function,
            ..Scope::default()
        }))
    }

    pub(crate) fn with(parent: &ScopeRef, object: Value) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(Rc::clone(parent)),
            with_object: Some(object),
            ..Scope::default()
        }))
    }

    /// Bind a name directly in this scope, replacing any previous binding.
    pub(crate) fn define(&mut self, name: &str, value: Value) {
        self.vars.insert(
            name.to_string(),
            Binding {
                value,
                constant: false,
            },
        );
    }

    fn with_property(&self, name: &str) -> Option<Value> {
        match &self.with_object {
            Some(Value::Object(object)) => object.borrow().get(name).cloned(),
            _ => None,
        }
    }

    fn with_has(&self, name: &str) -> bool {
        match &self.with_object {
            Some(Value::Object(object)) => object.borrow().contains_key(name),
            _ => false,
        }
    }
}

/// Resolve a name by walking the scope chain.
pub(crate) fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    let mut current = Some(Rc::clone(scope));
    while let Some(frame) = current {
        let frame = frame.borrow();
        if let Some(value) = frame.with_property(name) {
            return Some(value);
        }
        if let Some(binding) = frame.vars.get(name) {
            return Some(binding.value.clone());
        }
        current = frame.parent.clone();
    }
    None
}

/// Declare a variable. `var` goes to the nearest function scope and keeps an
/// existing value when redeclared without initializer; `let`/`const` bind in
/// `scope` itself.
pub(crate) fn declare(scope: &ScopeRef, name: &str, value: Option<Value>, kind: DeclKind) {
    let target = match kind {
        DeclKind::Var => function_scope(scope),
        DeclKind::Let | DeclKind::Const => Rc::clone(scope),
    };
    let mut target = target.borrow_mut();
    if kind == DeclKind::Var && value.is_none() && target.vars.contains_key(name) {
        return;
    }
    target.vars.insert(
        name.to_string(),
        Binding {
            value: value.unwrap_or_default(),
            constant: kind == DeclKind::Const,
        },
    );
}

fn function_scope(scope: &ScopeRef) -> ScopeRef {
    let mut current = Rc::clone(scope);
    loop {
        let parent = {
            let frame = current.borrow();
            if frame.function {
                None
            } else {
                frame.parent.clone()
            }
        };
        match parent {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

/// Assign to an existing binding, a `with` object property, or, failing
/// both, create a global.
pub(crate) fn assign(scope: &ScopeRef, name: &str, value: Value) -> Result<(), String> {
    let mut current = Rc::clone(scope);
    loop {
        let parent = {
            let mut frame = current.borrow_mut();
            if frame.with_has(name) {
                if let Some(Value::Object(object)) = &frame.with_object {
                    object.borrow_mut().set(name, value);
                }
                return Ok(());
            }
            if let Some(binding) = frame.vars.get_mut(name) {
                if binding.constant {
                    return Err("Assignment to constant variable.".to_string());
                }
                binding.value = value;
                return Ok(());
            }
            frame.parent.clone()
        };
        match parent {
            Some(parent) => current = parent,
            None => {
                current.borrow_mut().define(name, value);
                return Ok(());
            }
        }
    }
}
