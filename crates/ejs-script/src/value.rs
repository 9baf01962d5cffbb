use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{Map, Number, Value as Json};

use crate::ast::FunctionDef;
use crate::interpreter::ScopeRef;
use crate::stack::ensure_sufficient_stack;

/// Signature of host functions callable from scripts.
///
/// An `Err` is raised in the script as a `TypeError` carrying the message.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String>;

/// A runtime value of the scriptlet language.
///
/// Arrays and objects have reference semantics: cloning a `Value` shares the
/// underlying storage, as assignments do in scripts.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
}

/// Insertion-ordered property map.
#[derive(Debug, Clone, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or replace a property, keeping the original position on replace.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Object {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        let mut object = Object::new();
        for (key, value) in iter {
            object.set(key, value);
        }
        object
    }
}

/// A script function together with the scope it closes over.
pub struct Closure {
    pub(crate) def: Arc<FunctionDef>,
    pub(crate) env: ScopeRef,
}

impl Closure {
    pub fn name(&self) -> Option<&str> {
        self.def.name.as_deref()
    }
}

/// A function implemented by the host.
pub struct NativeFunction {
    name: String,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        (self.func)(args)
    }
}

impl Value {
    /// Wrap a host function.
    pub fn native(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Value {
        Value::Native(Rc::new(NativeFunction {
            name: name.into(),
            func: Box::new(func),
        }))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// A snapshot of the elements if this is an array.
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    /// Read a property without failing: arrays and strings expose `length`
    /// and numeric indices, objects their own properties.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(object) => object.borrow().get(key).cloned().unwrap_or_default(),
            Value::Array(items) => {
                let items = items.borrow();
                if key == "length" {
                    return Value::Number(items.len() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default()
            }
            Value::String(s) => {
                if key == "length" {
                    return Value::Number(s.chars().count() as f64);
                }
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map_or(Value::Undefined, |c| Value::String(c.to_string()))
            }
            _ => Value::Undefined,
        }
    }

    /// Script truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Numeric conversion; `NaN` when the value has no numeric meaning.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [single] => single.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
        }
    }

    /// Strict (`===`) equality.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose (`==`) equality.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            (Value::Array(_) | Value::Object(_), Value::String(_) | Value::Number(_)) => {
                Value::String(self.to_string()).loose_equals(other)
            }
            (Value::String(_) | Value::Number(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_equals(&Value::String(other.to_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Ordering used by relational operators; `None` when either side is `NaN`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }

    /// Convert a JSON value into a script value.
    pub fn from_json(json: Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::array(items.into_iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into JSON, as `JSON.stringify` sees the value.
    ///
    /// Functions and `undefined` become `null`; non-finite numbers too.
    /// A structure that contains itself is an error.
    pub fn to_json(&self) -> Result<Json, String> {
        self.to_json_within(&mut Vec::new())
    }

    /// `path` holds the arrays and objects currently being converted.
    fn to_json_within(&self, path: &mut Vec<*const ()>) -> Result<Json, String> {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Native(_) => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Number(n) => Ok(number_to_json(*n)),
            Value::String(s) => Ok(Json::String(s.clone())),
            Value::Array(items) => nested_json(Rc::as_ptr(items).cast(), path, |path| {
                items
                    .borrow()
                    .iter()
                    .map(|item| item.to_json_within(path))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Json::Array)
            }),
            Value::Object(object) => nested_json(Rc::as_ptr(object).cast(), path, |path| {
                let object = object.borrow();
                let mut map = Map::new();
                for (key, value) in object.iter() {
                    if !matches!(value, Value::Undefined | Value::Function(_) | Value::Native(_)) {
                        map.insert(key.to_string(), value.to_json_within(path)?);
                    }
                }
                Ok(Json::Object(map))
            }),
        }
    }
}

fn nested_json(
    container: *const (),
    path: &mut Vec<*const ()>,
    convert: impl FnOnce(&mut Vec<*const ()>) -> Result<Json, String>,
) -> Result<Json, String> {
    if path.contains(&container) {
        return Err("Converting circular structure to JSON".to_string());
    }
    path.push(container);
    let json = ensure_sufficient_stack(|| convert(path));
    path.pop();
    json
}

fn number_to_json(n: f64) -> Json {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        // Exact: the magnitude is below 2^53.
        Json::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

/// Format a number the way scripts print it: integers without a fraction,
/// `NaN`, `Infinity`, and exponent notation (`1e+21`, `1e-7`) outside
/// `1e-6..1e21`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let formatted = format!("{n:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else {
        n.to_string()
    }
}

/// String conversion (`String(value)`); arrays join their elements with `,`
/// and render `null`/`undefined` elements as empty.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => f.write_str(&join_array(items, ",")),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(closure) => {
                write!(f, "function {}() {{ [code] }}", closure.name().unwrap_or(""))
            }
            Value::Native(native) => write!(f, "function {}() {{ [native code] }}", native.name()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(object) => f
                .debug_map()
                .entries(object.borrow().iter())
                .finish(),
            other => Display::fmt(other, f),
        }
    }
}

/// Join values as `Array.prototype.join` does.
thread_local! {
    /// Arrays whose string conversion is in progress on this thread.
    static JOINING: RefCell<Vec<*const RefCell<Vec<Value>>>> = const { RefCell::new(Vec::new()) };
}

/// Join an array's elements; an array nested inside itself converts to
/// the empty string.
pub(crate) fn join_array(items: &Rc<RefCell<Vec<Value>>>, separator: &str) -> String {
    let array = Rc::as_ptr(items);
    if JOINING.with_borrow(|joining| joining.contains(&array)) {
        return String::new();
    }
    JOINING.with_borrow_mut(|joining| joining.push(array));
    let text = ensure_sufficient_stack(|| join_values(&items.borrow(), separator));
    JOINING.with_borrow_mut(|joining| joining.pop());
    text
}

pub fn join_values(items: &[Value], separator: &str) -> String {
    items
        .iter()
        .map(|item| {
            if item.is_nullish() {
                String::new()
            } else {
                item.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(separator)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        Value::from_json(json)
    }
}
