//! Tree-walking evaluator for the scriptlet language.

mod builtins;
mod operators;
mod scope;

use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::trace;

use crate::ast::{
    DeclKind, Expr, ForEachKind, FunctionBody, FunctionDef, LogicalOp, Program, Stmt, StmtKind,
    UnaryOp, UpdateOp,
};
use crate::error::{RuntimeError, ScriptError};
use crate::stack::ensure_sufficient_stack;
use crate::value::{Closure, Object, Value};

pub(crate) use scope::ScopeRef;
use scope::Scope;

const DEFAULT_MAX_DEPTH: usize = 100;

/// Deepest nesting of statement and expression evaluation, across calls.
pub const MAX_EVAL_NESTING: usize = 2048;

/// Largest array length scripts may create.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Largest string, in bytes, `repeat` may build.
pub const MAX_STRING_LENGTH: usize = 1 << 28;

/// Completion of a statement.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// A value in flight from `throw` (or a runtime failure) to its handler.
pub(crate) struct Thrown {
    value: Value,
    line: usize,
}

type Exec = Result<Flow, Thrown>;
type Eval = Result<Value, Thrown>;

/// Runs programs against a global scope that persists between runs.
///
/// The global scope starts out with the standard helpers (`String`, `Math`,
/// `JSON`, ...). Hosts add their own bindings with [`Interpreter::define_global`].
///
/// Script functions keep their defining scope alive, so dropping the
/// interpreter empties every scope a function captured. Function values
/// taken out of the interpreter stop seeing their variables after that.
pub struct Interpreter {
    global: ScopeRef,
    line: usize,
    depth: usize,
    max_depth: usize,
    nesting: usize,
    captured: Vec<Weak<RefCell<Scope>>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let global = Scope::global();
        builtins::install(&global);
        Self {
            global,
            line: 1,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            nesting: 0,
            captured: Vec::new(),
        }
    }

    /// Limit how deeply script functions may recurse before a `RangeError`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.global.borrow_mut().define(name, value);
    }

    /// Current value of a global binding.
    pub fn global(&self, name: &str) -> Option<Value> {
        scope::lookup(&self.global, name)
    }

    /// Execute a program in the global scope.
    ///
    /// A top-level `return` ends the program and yields its value; otherwise
    /// the result is `undefined`.
    pub fn run(&mut self, program: &Program) -> Result<Value, ScriptError> {
        trace!(statements = program.body.len(), "Running script");
        let global = Rc::clone(&self.global);
        self.depth = 0;
        self.nesting = 0;
        match self.exec_block(&program.body, &global) {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(_) => Ok(Value::Undefined),
            Err(thrown) => Err(uncaught(thrown)),
        }
    }

    /// Call a function value from the host.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, ScriptError> {
        self.call_value(callee, args, "callee").map_err(uncaught)
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Exec {
        for stmt in stmts {
            if let StmtKind::Function(def) = &stmt.kind
                && let Some(name) = &def.name
            {
                let closure = self.make_closure(def, scope);
                scope.borrow_mut().define(name, closure);
            }
        }
        for stmt in stmts {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Exec {
        let inner = Scope::child(scope, false);
        self.exec_block(stmts, &inner)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Exec {
        self.nested(|this| this.exec_stmt(stmt, scope))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Exec {
        self.line = stmt.line;
        match &stmt.kind {
            StmtKind::Declare { kind, declarations } => {
                for (name, init) in declarations {
                    let value = match init {
                        Some(expr) => Some(self.eval(expr, scope)?),
                        None => None,
                    };
                    scope::declare(scope, name, value, *kind);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Function(_) | StmtKind::Empty => Ok(Flow::Normal),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                let loop_scope = Scope::child(scope, false);
                if let Some(init) = init {
                    self.exec(init, &loop_scope)?;
                }
                loop {
                    if let Some(test) = test
                        && !self.eval(test, &loop_scope)?.truthy()
                    {
                        break;
                    }
                    match self.exec(body, &loop_scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval(update, &loop_scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::ForEach {
                kind,
                declare,
                name,
                iterable,
                body,
            } => {
                let target = self.eval(iterable, scope)?;
                let items = self.iteration_items(*kind, &target, iterable)?;
                for item in items {
                    let iteration = Scope::child(scope, false);
                    match declare {
                        Some(DeclKind::Var) => {
                            scope::declare(&iteration, name, Some(item), DeclKind::Var);
                        }
                        Some(DeclKind::Let | DeclKind::Const) => {
                            iteration.borrow_mut().define(name, item);
                        }
                        None => self.assign_name(name, item, scope)?,
                    }
                    match self.exec(body, &iteration)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Throw(expr) => {
                let value = self.eval(expr, scope)?;
                Err(Thrown {
                    value,
                    line: stmt.line,
                })
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                let result = match (self.exec_scoped(block, scope), handler) {
                    (Err(thrown), Some(handler)) => {
                        let catch_scope = Scope::child(scope, false);
                        if let Some(param) = &handler.param {
                            catch_scope.borrow_mut().define(param, thrown.value);
                        }
                        self.exec_block(&handler.body, &catch_scope)
                    }
                    (result, _) => result,
                };
                if let Some(finalizer) = finalizer {
                    match self.exec_scoped(finalizer, scope)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                result
            }
            StmtKind::With { object, body } => {
                let value = self.eval(object, scope)?;
                if value.is_nullish() {
                    return Err(self.error("TypeError", "Cannot convert undefined or null to object"));
                }
                let with_scope = Scope::with(scope, value);
                self.exec(body, &with_scope)
            }
            StmtKind::Block(stmts) => self.exec_scoped(stmts, scope),
            StmtKind::Expr(expr) => {
                self.eval(expr, scope)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn iteration_items(
        &self,
        kind: ForEachKind,
        target: &Value,
        expr: &Expr,
    ) -> Result<Vec<Value>, Thrown> {
        let items = match (kind, target) {
            (ForEachKind::Of, Value::Array(items)) => items.borrow().clone(),
            (ForEachKind::Of, Value::String(s)) => {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            }
            (ForEachKind::Of, _) => {
                return Err(self.error(
                    "TypeError",
                    format!("{} is not iterable", expr.describe()),
                ));
            }
            (ForEachKind::In, Value::Object(object)) => {
                object.borrow().keys().map(Value::from).collect()
            }
            (ForEachKind::In, Value::Array(items)) => index_keys(items.borrow().len()),
            (ForEachKind::In, Value::String(s)) => index_keys(s.chars().count()),
            (ForEachKind::In, _) => Vec::new(),
        };
        Ok(items)
    }

    fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Eval {
        self.nested(|this| this.eval_expr(expr, scope))
    }

    /// Run one level of statement or expression evaluation.
    fn nested<T>(&mut self, run: impl FnOnce(&mut Self) -> Result<T, Thrown>) -> Result<T, Thrown> {
        if self.nesting >= MAX_EVAL_NESTING {
            return Err(self.error("RangeError", "Maximum call stack size exceeded"));
        }
        self.nesting += 1;
        let result = ensure_sufficient_stack(|| run(self));
        self.nesting -= 1;
        result
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> Eval {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident(name) => scope::lookup(scope, name)
                .ok_or_else(|| self.error("ReferenceError", format!("{name} is not defined"))),
            Expr::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval(element, scope)?);
                }
                Ok(Value::array(items))
            }
            Expr::Object(entries) => {
                let mut object = Object::new();
                for (key, value) in entries {
                    let value = self.eval(value, scope)?;
                    object.set(key.as_str(), value);
                }
                Ok(Value::object(object))
            }
            Expr::Function(def) => Ok(self.make_closure(def, scope)),
            Expr::Member { object, property } => {
                let target = self.eval(object, scope)?;
                self.get_property(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.eval(object, scope)?;
                let key = operators::property_key(&self.eval(index, scope)?);
                self.get_property(&target, &key)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, scope),
            Expr::Unary { op, operand } => {
                if *op == UnaryOp::Typeof
                    && let Expr::Ident(name) = operand.as_ref()
                {
                    let value = scope::lookup(scope, name).unwrap_or_default();
                    return Ok(Value::from(value.type_of()));
                }
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Typeof => Value::from(value.type_of()),
                })
            }
            Expr::Update { op, prefix, target } => {
                let old = self.eval(target, scope)?.to_number();
                let new = match op {
                    UpdateOp::Inc => old + 1.0,
                    UpdateOp::Dec => old - 1.0,
                };
                self.assign_to(target, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                operators::binary(*op, &left, &right).map_err(|message| self.error("TypeError", message))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let mut value = self.eval(value, scope)?;
                if let Some(binary) = operators::compound(*op) {
                    let current = self.eval(target, scope)?;
                    value = operators::binary(binary, &current, &value)
                        .map_err(|message| self.error("TypeError", message))?;
                }
                self.assign_to(target, value.clone(), scope)?;
                Ok(value)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &ScopeRef) -> Result<Vec<Value>, Thrown> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], scope: &ScopeRef) -> Eval {
        let (receiver, name) = match callee {
            Expr::Member { object, property } => (self.eval(object, scope)?, property.clone()),
            Expr::Index { object, index } => {
                let receiver = self.eval(object, scope)?;
                let key = operators::property_key(&self.eval(index, scope)?);
                (receiver, key)
            }
            _ => {
                let function = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                return self.call_value(&function, &args, &callee.describe());
            }
        };
        let args = self.eval_args(args, scope)?;
        if let Some(result) = builtins::call_method(self, &receiver, &name, &args)? {
            return Ok(result);
        }
        let function = self.get_property(&receiver, &name)?;
        self.call_value(&function, &args, &callee.describe())
    }

    pub(crate) fn call_value(&mut self, function: &Value, args: &[Value], description: &str) -> Eval {
        match function {
            Value::Function(closure) => {
                let closure = Rc::clone(closure);
                self.call_closure(&closure, args)
            }
            Value::Native(native) => native
                .call(args)
                .map_err(|message| self.error("TypeError", message)),
            _ => Err(self.error("TypeError", format!("{description} is not a function"))),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: &[Value]) -> Eval {
        if self.depth >= self.max_depth {
            return Err(self.error("RangeError", "Maximum call stack size exceeded"));
        }
        let frame = Scope::child(&closure.env, true);
        {
            let mut frame = frame.borrow_mut();
            for (i, param) in closure.def.params.iter().enumerate() {
                frame.define(param, args.get(i).cloned().unwrap_or_default());
            }
        }
        let caller_line = self.line;
        self.depth += 1;
        let result = match &closure.def.body {
            FunctionBody::Block(stmts) => self.exec_block(stmts, &frame).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::Undefined,
            }),
            FunctionBody::Expr(expr) => self.eval(expr, &frame),
        };
        self.depth -= 1;
        if result.is_ok() {
            self.line = caller_line;
        }
        result
    }

    fn get_property(&self, target: &Value, key: &str) -> Eval {
        if target.is_nullish() {
            return Err(self.error(
                "TypeError",
                format!("Cannot read properties of {target} (reading '{key}')"),
            ));
        }
        Ok(target.get(key))
    }

    fn set_property(&self, target: &Value, key: &str, value: Value) -> Result<(), Thrown> {
        match target {
            Value::Object(object) => object.borrow_mut().set(key, value),
            Value::Array(items) => {
                let mut items = items.borrow_mut();
                if key == "length" {
                    let len = value.to_number();
                    if !(len.is_finite() && len >= 0.0 && len.fract() == 0.0)
                        || len > MAX_ARRAY_LENGTH as f64
                    {
                        return Err(self.error("RangeError", "Invalid array length"));
                    }
                    items.resize(len as usize, Value::Undefined);
                } else if let Ok(index) = key.parse::<usize>() {
                    if index >= items.len() {
                        if index >= MAX_ARRAY_LENGTH {
                            return Err(self.error("RangeError", "Invalid array length"));
                        }
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                }
            }
            other if other.is_nullish() => {
                return Err(self.error(
                    "TypeError",
                    format!("Cannot set properties of {other} (setting '{key}')"),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    fn assign_name(&self, name: &str, value: Value, scope: &ScopeRef) -> Result<(), Thrown> {
        scope::assign(scope, name, value).map_err(|message| self.error("TypeError", message))
    }

    fn assign_to(&mut self, target: &Expr, value: Value, scope: &ScopeRef) -> Result<(), Thrown> {
        match target {
            Expr::Ident(name) => self.assign_name(name, value, scope),
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                self.set_property(&object, property, value)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = operators::property_key(&self.eval(index, scope)?);
                self.set_property(&object, &key, value)
            }
            other => Err(self.error(
                "SyntaxError",
                format!("Invalid assignment target {}", other.describe()),
            )),
        }
    }

    /// Build a thrown error object at the current line.
    pub(crate) fn error(&self, name: &str, message: impl Into<String>) -> Thrown {
        Thrown {
            value: error_object(name, message.into()),
            line: self.line,
        }
    }

    fn make_closure(&mut self, def: &Arc<FunctionDef>, scope: &ScopeRef) -> Value {
        let already_tracked = self
            .captured
            .last()
            .is_some_and(|last| last.as_ptr() == Rc::as_ptr(scope));
        if !already_tracked {
            if self.captured.len() == self.captured.capacity() {
                self.captured.retain(|captured| captured.strong_count() > 0);
            }
            self.captured.push(Rc::downgrade(scope));
        }
        Value::Function(Rc::new(Closure {
            def: Arc::clone(def),
            env: Rc::clone(scope),
        }))
    }
}

/// A function stored in the scope it captured (directly or through an
/// object) forms an `Rc` cycle. Emptying the captured scopes breaks them all.
impl Drop for Interpreter {
    fn drop(&mut self) {
        for scope in self.captured.drain(..) {
            if let Some(scope) = scope.upgrade() {
                let contents = mem::take(&mut *scope.borrow_mut());
                drop(contents);
            }
        }
    }
}

fn index_keys(len: usize) -> Vec<Value> {
    (0..len).map(|i| Value::String(i.to_string())).collect()
}

/// An `{ name, message }` error object.
pub(crate) fn error_object(name: &str, message: String) -> Value {
    let mut object = Object::new();
    object.set("name", Value::from(name));
    object.set("message", Value::String(message));
    Value::object(object)
}

fn uncaught(thrown: Thrown) -> ScriptError {
    let (name, message, properties) = match &thrown.value {
        Value::Object(object) => {
            let object = object.borrow();
            let name = object
                .get("name")
                .map_or_else(|| "Error".to_string(), ToString::to_string);
            let message = object.get("message").map(ToString::to_string).unwrap_or_default();
            let properties = object
                .iter()
                .filter(|(key, _)| *key != "name" && *key != "message")
                .filter(|(_, value)| {
                    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
                })
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            (name, message, properties)
        }
        other => ("Error".to_string(), other.to_string(), Vec::new()),
    };
    ScriptError::Runtime(RuntimeError {
        name,
        message,
        line: thrown.line,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn run_and_drop(source: &str) -> Weak<RefCell<Scope>> {
        let program = parse_program(source).unwrap();
        let mut interpreter = Interpreter::new();
        interpreter.run(&program).unwrap();
        let global = Rc::downgrade(&interpreter.global);
        drop(interpreter);
        global
    }

    #[test]
    fn dropping_the_interpreter_frees_function_scopes() {
        let sources = [
            "function helper() { return 1; } helper();",
            "var counter = (function () { var n = 0; return function () { return ++n; }; })(); counter();",
            "var o = {}; o.self = function () { return o; };",
            "var fns = []; for (let i = 0; i < 3; i++) { fns.push(() => i); }",
        ];
        for source in sources {
            assert!(run_and_drop(source).upgrade().is_none(), "leaked: {source}");
        }
    }

    #[test]
    fn dead_scopes_are_pruned_while_running() {
        let program =
            parse_program("for (var i = 0; i < 1000; i++) { (function () { return i; })(); }")
                .unwrap();
        let mut interpreter = Interpreter::new();
        interpreter.run(&program).unwrap();
        assert!(interpreter.captured.len() < 64);
    }
}
