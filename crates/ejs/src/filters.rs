//! Named value transforms applied by `<%=: value | filter:arg %>`.
//!
//! Filters receive the value produced by the previous stage plus the
//! arguments written in the template, and return the next value.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};

use ejs_script::{Object, Value, join_values};
use strsim::levenshtein;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::FilterError;

/// Filter function signature: `(input, args) -> output`.
pub type FilterFn = fn(&Value, &[Value]) -> Result<Value, FilterError>;

/// Registry of filters available to templates.
///
/// [`FilterRegistry::new`] starts with the built-in set; custom filters are
/// added with [`FilterRegistry::register`] and replace built-ins of the same
/// name.
///
/// # Example
///
/// ```
/// use ejs::{FilterRegistry, ejs_script::Value};
///
/// let mut filters = FilterRegistry::new();
/// filters.register("shout", |value, _| Ok(Value::String(format!("{value}!"))));
/// let out = filters.apply("shout", &Value::from("hi"), &[]).unwrap();
/// assert_eq!(out.to_string(), "hi!");
/// ```
#[derive(Clone)]
pub struct FilterRegistry {
    filters: BTreeMap<String, FilterFn>,
}

impl FilterRegistry {
    /// A registry with the built-in filters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// A registry with no filters at all.
    pub fn empty() -> Self {
        Self {
            filters: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, filter: FilterFn) {
        self.filters.insert(name.into(), filter);
    }

    pub fn get(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Run a single filter.
    pub fn apply(&self, name: &str, value: &Value, args: &[Value]) -> Result<Value, FilterError> {
        let filter = self.get(name).ok_or_else(|| FilterError::Unknown {
            name: name.to_string(),
        })?;
        filter(value, args)
    }

    /// Registered names close to `name`, closest first, at most three.
    pub fn suggestions(&self, name: &str) -> Vec<String> {
        let max_distance = if name.len() <= 3 { 1 } else { 2 };
        let mut suggestions: Vec<(usize, &str)> = self
            .names()
            .filter_map(|candidate| {
                let distance = levenshtein(name, candidate);
                (distance > 0 && distance <= max_distance).then_some((distance, candidate))
            })
            .collect();
        suggestions.sort_by_key(|(distance, _)| *distance);
        suggestions
            .into_iter()
            .take(3)
            .map(|(_, candidate)| candidate.to_string())
            .collect()
    }

    /// Expose the registry to scripts as an object of native functions.
    pub(crate) fn to_script_object(&self) -> Value {
        let object: Object = self
            .filters
            .iter()
            .map(|(name, &filter)| {
                let native = Value::native(name.as_str(), move |args: &[Value]| {
                    let (input, rest) = match args.split_first() {
                        Some((input, rest)) => (input.clone(), rest),
                        None => (Value::Undefined, args),
                    };
                    filter(&input, rest).map_err(|err| err.to_string())
                });
                (name.as_str(), native)
            })
            .collect();
        Value::object(object)
    }

    fn register_builtins(&mut self) {
        self.register("first", first);
        self.register("last", last);
        self.register("reverse", reverse);
        self.register("capitalize", capitalize);
        self.register("downcase", downcase);
        self.register("upcase", upcase);
        self.register("sort", sort);
        self.register("sort_by", sort_by);
        self.register("size", size);
        self.register("length", size);
        self.register("plus", plus);
        self.register("minus", minus);
        self.register("times", times);
        self.register("divided_by", divided_by);
        self.register("join", join);
        self.register("truncate", truncate);
        self.register("truncate_words", truncate_words);
        self.register("replace", replace);
        self.register("prepend", prepend);
        self.register("append", append);
        self.register("map", map);
        self.register("get", get);
        self.register("json", json);
    }
}

impl Debug for FilterRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Argument helpers
// =========================================================================

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn items(filter: &str, value: &Value) -> Result<Vec<Value>, FilterError> {
    value.to_vec().ok_or_else(|| FilterError::InvalidInput {
        filter: filter.to_string(),
        expected: "an array",
        got: value.type_of().to_string(),
    })
}

fn count_arg(filter: &str, args: &[Value], index: usize) -> Result<usize, FilterError> {
    let n = arg(args, index).to_number();
    if n.is_nan() || n < 0.0 {
        return Err(FilterError::InvalidArgument {
            filter: filter.to_string(),
            index,
            message: format!("expected a non-negative number, got {}", arg(args, index)),
        });
    }
    Ok(n as usize)
}

fn string_arg(args: &[Value], index: usize) -> Option<String> {
    args.get(index)
        .filter(|value| !value.is_nullish())
        .map(ToString::to_string)
}

// =========================================================================
// Sequences
// =========================================================================

fn first(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    Ok(value.get("0"))
}

fn last(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    let len = value.get("length").to_number();
    if len.is_nan() || len < 1.0 {
        return Ok(Value::Undefined);
    }
    Ok(value.get(&(len as usize - 1).to_string()))
}

/// Arrays reverse element order; anything else reverses its text by
/// grapheme cluster.
fn reverse(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    if let Some(mut items) = value.to_vec() {
        items.reverse();
        return Ok(Value::array(items));
    }
    let text = value.to_string();
    Ok(Value::String(text.graphemes(true).rev().collect()))
}

fn sort(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    let mut items = items("sort", value)?;
    items.sort_by_key(ToString::to_string);
    Ok(Value::array(items))
}

fn sort_by(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let key = arg(args, 0).to_string();
    let mut items = items("sort_by", value)?;
    items.sort_by(|a, b| {
        a.get(&key)
            .compare(&b.get(&key))
            .unwrap_or(Ordering::Equal)
    });
    Ok(Value::array(items))
}

fn size(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    match value {
        Value::Object(object) => Ok(Value::Number(object.borrow().len() as f64)),
        Value::Array(_) | Value::String(_) => Ok(value.get("length")),
        _ => Ok(Value::Number(0.0)),
    }
}

fn join(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let separator = string_arg(args, 0).unwrap_or_else(|| ",".to_string());
    let items = items("join", value)?;
    Ok(Value::String(join_values(&items, &separator)))
}

fn map(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let key = arg(args, 0).to_string();
    let items = items("map", value)?;
    Ok(Value::array(items.iter().map(|item| item.get(&key)).collect()))
}

fn get(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    if value.is_nullish() {
        return Ok(Value::Undefined);
    }
    Ok(value.get(&arg(args, 0).to_string()))
}

// =========================================================================
// Strings
// =========================================================================

fn capitalize(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    let text = value.to_string();
    let mut chars = text.chars();
    let capitalized = match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Ok(Value::String(capitalized))
}

fn downcase(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    Ok(Value::String(value.to_string().to_lowercase()))
}

fn upcase(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    Ok(Value::String(value.to_string().to_uppercase()))
}

/// Keep the first `length` characters; the suffix is added only when
/// something was cut.
fn truncate(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let length = count_arg("truncate", args, 0)?;
    let text = value.to_string();
    if text.chars().count() <= length {
        return Ok(Value::String(text));
    }
    let mut truncated: String = text.chars().take(length).collect();
    if let Some(suffix) = string_arg(args, 1) {
        truncated.push_str(&suffix);
    }
    Ok(Value::String(truncated))
}

fn truncate_words(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let count = count_arg("truncate_words", args, 0)?;
    let text = value.to_string();
    let words: Vec<&str> = text.split(' ').filter(|word| !word.is_empty()).collect();
    if words.len() <= count {
        return Ok(Value::String(text));
    }
    let mut truncated = words[..count].join(" ");
    if let Some(suffix) = string_arg(args, 1) {
        truncated.push_str(&suffix);
    }
    Ok(Value::String(truncated))
}

/// Replace the first occurrence of the pattern.
fn replace(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let pattern = arg(args, 0).to_string();
    let substitution = string_arg(args, 1).unwrap_or_default();
    Ok(Value::String(
        value.to_string().replacen(&pattern, &substitution, 1),
    ))
}

fn prepend(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let addition = arg(args, 0);
    if let Some(items) = value.to_vec() {
        let mut result = vec![addition];
        result.extend(items);
        return Ok(Value::array(result));
    }
    Ok(Value::String(format!("{addition}{value}")))
}

fn append(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    let addition = arg(args, 0);
    if let Some(mut items) = value.to_vec() {
        items.push(addition);
        return Ok(Value::array(items));
    }
    Ok(Value::String(format!("{value}{addition}")))
}

fn json(value: &Value, _: &[Value]) -> Result<Value, FilterError> {
    let json = value.to_json().map_err(|_| FilterError::InvalidInput {
        filter: "json".to_string(),
        expected: "a value without cycles",
        got: "a circular structure".to_string(),
    })?;
    Ok(Value::String(json.to_string()))
}

// =========================================================================
// Numbers
// =========================================================================

fn plus(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    Ok(Value::Number(value.to_number() + arg(args, 0).to_number()))
}

fn minus(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    Ok(Value::Number(value.to_number() - arg(args, 0).to_number()))
}

fn times(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    Ok(Value::Number(value.to_number() * arg(args, 0).to_number()))
}

fn divided_by(value: &Value, args: &[Value]) -> Result<Value, FilterError> {
    Ok(Value::Number(value.to_number() / arg(args, 0).to_number()))
}
