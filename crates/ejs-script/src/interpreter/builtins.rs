//! Standard globals and the methods of strings, arrays and numbers.

use std::cmp::Ordering;

use super::scope::{Scope, ScopeRef};
use super::{Interpreter, MAX_STRING_LENGTH, Thrown, error_object};
use crate::value::{Object, Value, format_number, join_array};

/// Populate a fresh global scope.
pub(crate) fn install(global: &ScopeRef) {
    let mut scope = global.borrow_mut();
    install_into(&mut scope);
}

fn install_into(scope: &mut Scope) {
    scope.define(
        "String",
        Value::native("String", |args| {
            Ok(Value::String(args.first().map(ToString::to_string).unwrap_or_default()))
        }),
    );
    scope.define(
        "Number",
        Value::native("Number", |args| {
            Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
        }),
    );
    scope.define(
        "Boolean",
        Value::native("Boolean", |args| {
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        }),
    );
    scope.define("parseInt", Value::native("parseInt", parse_int));
    scope.define("parseFloat", Value::native("parseFloat", parse_float));
    scope.define(
        "isNaN",
        Value::native("isNaN", |args| {
            Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
        }),
    );
    scope.define(
        "Error",
        Value::native("Error", |args| {
            let message = match args.first() {
                None | Some(Value::Undefined) => String::new(),
                Some(message) => message.to_string(),
            };
            Ok(error_object("Error", message))
        }),
    );
    scope.define("JSON", json_object());
    scope.define("Math", math_object());
    scope.define(
        "Object",
        namespace([(
            "keys",
            Value::native("keys", |args| Ok(Value::array(keys_of(&arg(args, 0))))),
        )]),
    );
    scope.define(
        "Array",
        namespace([(
            "isArray",
            Value::native("isArray", |args| {
                Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
            }),
        )]),
    );
}

fn namespace<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::object(entries.into_iter().collect::<Object>())
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn keys_of(value: &Value) -> Vec<Value> {
    match value {
        Value::Object(object) => object.borrow().keys().map(Value::from).collect(),
        Value::Array(items) => (0..items.borrow().len())
            .map(|i| Value::String(i.to_string()))
            .collect(),
        Value::String(s) => (0..s.chars().count())
            .map(|i| Value::String(i.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn json_object() -> Value {
    namespace([
        (
            "stringify",
            Value::native("stringify", |args| {
                let value = arg(args, 0);
                if matches!(value, Value::Undefined | Value::Function(_) | Value::Native(_)) {
                    return Ok(Value::Undefined);
                }
                let json = value.to_json()?;
                let text = if args.get(2).is_some_and(Value::truthy) {
                    serde_json::to_string_pretty(&json)
                } else {
                    serde_json::to_string(&json)
                };
                text.map(Value::String).map_err(|e| e.to_string())
            }),
        ),
        (
            "parse",
            Value::native("parse", |args| {
                let text = arg(args, 0).to_string();
                serde_json::from_str(&text)
                    .map(Value::from_json)
                    .map_err(|e| format!("Unexpected token in JSON: {e}"))
            }),
        ),
    ])
}

fn math_object() -> Value {
    fn unary(name: &'static str, f: fn(f64) -> f64) -> (&'static str, Value) {
        (
            name,
            Value::native(name, move |args| Ok(Value::Number(f(arg(args, 0).to_number())))),
        )
    }
    namespace([
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("round", |n| (n + 0.5).floor()),
        unary("abs", f64::abs),
        unary("sqrt", f64::sqrt),
        (
            "max",
            Value::native("max", |args| {
                Ok(Value::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max)))
            }),
        ),
        (
            "min",
            Value::native("min", |args| {
                Ok(Value::Number(fold_numbers(args, f64::INFINITY, f64::min)))
            }),
        ),
        (
            "pow",
            Value::native("pow", |args| {
                Ok(Value::Number(
                    arg(args, 0).to_number().powf(arg(args, 1).to_number()),
                ))
            }),
        ),
    ])
}

fn fold_numbers(args: &[Value], start: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut result = start;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        result = f(result, n);
    }
    result
}

fn parse_int(args: &[Value]) -> Result<Value, String> {
    let text = arg(args, 0).to_string();
    let text = text.trim();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let mut radix = match args.get(1) {
        Some(radix) if !radix.is_nullish() => radix.to_number() as u32,
        _ => 0,
    };
    let mut digits = rest;
    if (radix == 0 || radix == 16)
        && let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"))
    {
        digits = hex;
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let mut result: Option<f64> = None;
    for c in digits.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        result = Some(result.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
    }
    Ok(Value::Number(match result {
        Some(n) if negative => -n,
        Some(n) => n,
        None => f64::NAN,
    }))
}

fn parse_float(args: &[Value]) -> Result<Value, String> {
    let text = arg(args, 0).to_string();
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    if end > digits_start && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        if bytes.get(exponent).is_some_and(u8::is_ascii_digit) {
            while bytes.get(exponent).is_some_and(u8::is_ascii_digit) {
                exponent += 1;
            }
            end = exponent;
        }
    }
    if end == digits_start && text[digits_start..].starts_with("Infinity") {
        let negative = text.starts_with('-');
        return Ok(Value::Number(if negative {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }));
    }
    Ok(Value::Number(text[..end].parse().unwrap_or(f64::NAN)))
}

/// Dispatch a method call on a built-in receiver.
///
/// Returns `Ok(None)` when the receiver has no built-in method by that name,
/// in which case the caller falls back to an ordinary property lookup.
pub(crate) fn call_method(
    interpreter: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>, Thrown> {
    match receiver {
        Value::String(s) if name == "repeat" => repeat(interpreter, s, args).map(Some),
        Value::String(s) => Ok(string_method(s, name, args)),
        Value::Array(_) => array_method(interpreter, receiver, name, args),
        Value::Number(n) => Ok(number_method(*n, name, args)),
        _ => Ok(None),
    }
}

fn repeat(interpreter: &Interpreter, s: &str, args: &[Value]) -> Result<Value, Thrown> {
    let count = args.first().map_or(0.0, Value::to_number);
    if count < 0.0 || count.is_infinite() {
        return Err(interpreter.error(
            "RangeError",
            format!("Invalid count value: {}", format_number(count)),
        ));
    }
    let count = if count.is_nan() { 0 } else { count as usize };
    if s.len().saturating_mul(count) > MAX_STRING_LENGTH {
        return Err(interpreter.error("RangeError", "Invalid string length"));
    }
    Ok(Value::String(s.repeat(count)))
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Value> {
    let value = match name {
        "toFixed" => {
            let digits = args.first().map_or(0.0, Value::to_number);
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Value::String(format!("{n:.digits$}"))
        }
        "toString" => Value::String(format_number(n)),
        _ => return None,
    };
    Some(value)
}

/// Resolve a possibly negative relative index against `len`.
fn relative_index(value: Option<&Value>, len: usize, default: usize) -> usize {
    match value {
        None | Some(Value::Undefined) => default,
        Some(value) => {
            let n = value.to_number();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                len.saturating_sub((-n) as usize)
            } else {
                (n as usize).min(len)
            }
        }
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Value> {
    let chars: Vec<char> = s.chars().collect();
    let text_arg = |index: usize| arg(args, index).to_string();
    let value = match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "toString" => Value::String(s.to_string()),
        "indexOf" => {
            let needle = text_arg(0);
            Value::Number(
                s.find(&needle)
                    .map_or(-1.0, |byte| s[..byte].chars().count() as f64),
            )
        }
        "includes" => Value::Bool(s.contains(&text_arg(0))),
        "startsWith" => Value::Bool(s.starts_with(&text_arg(0))),
        "endsWith" => Value::Bool(s.ends_with(&text_arg(0))),
        "charAt" => {
            let index = args.first().map_or(0.0, Value::to_number);
            let c = if index >= 0.0 {
                chars.get(index as usize)
            } else {
                None
            };
            Value::String(c.map(ToString::to_string).unwrap_or_default())
        }
        "slice" => {
            let start = relative_index(args.first(), chars.len(), 0);
            let end = relative_index(args.get(1), chars.len(), chars.len());
            Value::String(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            })
        }
        "substring" => {
            let clamp = |value: Option<&Value>, default: usize| match value {
                None | Some(Value::Undefined) => default,
                Some(value) => {
                    let n = value.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(chars.len())
                    }
                }
            };
            let a = clamp(args.first(), 0);
            let b = clamp(args.get(1), chars.len());
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::String(chars[start..end].iter().collect())
        }
        "split" => {
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::from(s)],
                Some(separator) => {
                    let separator = separator.to_string();
                    if separator.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(Value::from).collect()
                    }
                }
            };
            Value::array(parts)
        }
        "replace" => Value::String(s.replacen(&text_arg(0), &text_arg(1), 1)),
        "replaceAll" => Value::String(s.replace(&text_arg(0), &text_arg(1))),
        "concat" => {
            let mut result = s.to_string();
            for value in args {
                result.push_str(&value.to_string());
            }
            Value::String(result)
        }
        _ => return None,
    };
    Some(value)
}

fn array_method(
    interpreter: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>, Thrown> {
    let Value::Array(items) = receiver else {
        return Ok(None);
    };
    let snapshot = || items.borrow().clone();
    let value = match name {
        "join" => {
            let separator = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(separator) => separator.to_string(),
            };
            Value::String(join_array(items, &separator))
        }
        "toString" => Value::String(join_array(items, ",")),
        "push" => {
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        "pop" => items.borrow_mut().pop().unwrap_or_default(),
        "shift" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            let mut items = items.borrow_mut();
            for (i, value) in args.iter().enumerate() {
                items.insert(i, value.clone());
            }
            Value::Number(items.len() as f64)
        }
        "indexOf" => {
            let needle = arg(args, 0);
            Value::Number(
                items
                    .borrow()
                    .iter()
                    .position(|item| item.strict_equals(&needle))
                    .map_or(-1.0, |i| i as f64),
            )
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.borrow().iter().any(|item| {
                item.strict_equals(&needle)
                    || matches!((item, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
            }))
        }
        "slice" => {
            let items = items.borrow();
            let start = relative_index(args.first(), items.len(), 0);
            let end = relative_index(args.get(1), items.len(), items.len());
            Value::array(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        "concat" => {
            let mut result = snapshot();
            for value in args {
                match value {
                    Value::Array(other) => result.extend(other.borrow().iter().cloned()),
                    other => result.push(other.clone()),
                }
            }
            Value::array(result)
        }
        "reverse" => {
            items.borrow_mut().reverse();
            receiver.clone()
        }
        "sort" => {
            let sorted = sort_values(interpreter, snapshot(), args.first())?;
            *items.borrow_mut() = sorted;
            receiver.clone()
        }
        "forEach" => {
            for (i, item) in snapshot().into_iter().enumerate() {
                call_back(interpreter, args, item, i, receiver)?;
            }
            Value::Undefined
        }
        "map" => {
            let mut mapped = Vec::new();
            for (i, item) in snapshot().into_iter().enumerate() {
                mapped.push(call_back(interpreter, args, item, i, receiver)?);
            }
            Value::array(mapped)
        }
        "filter" => {
            let mut kept = Vec::new();
            for (i, item) in snapshot().into_iter().enumerate() {
                if call_back(interpreter, args, item.clone(), i, receiver)?.truthy() {
                    kept.push(item);
                }
            }
            Value::array(kept)
        }
        "find" => {
            let mut found = Value::Undefined;
            for (i, item) in snapshot().into_iter().enumerate() {
                if call_back(interpreter, args, item.clone(), i, receiver)?.truthy() {
                    found = item;
                    break;
                }
            }
            found
        }
        "findIndex" => {
            let mut found = -1.0;
            for (i, item) in snapshot().into_iter().enumerate() {
                if call_back(interpreter, args, item, i, receiver)?.truthy() {
                    found = i as f64;
                    break;
                }
            }
            Value::Number(found)
        }
        "some" => {
            let mut any = false;
            for (i, item) in snapshot().into_iter().enumerate() {
                if call_back(interpreter, args, item, i, receiver)?.truthy() {
                    any = true;
                    break;
                }
            }
            Value::Bool(any)
        }
        "every" => {
            let mut all = true;
            for (i, item) in snapshot().into_iter().enumerate() {
                if !call_back(interpreter, args, item, i, receiver)?.truthy() {
                    all = false;
                    break;
                }
            }
            Value::Bool(all)
        }
        "reduce" => {
            let callback = arg(args, 0);
            let mut values = snapshot().into_iter().enumerate();
            let mut accumulator = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match values.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(interpreter
                            .error("TypeError", "Reduce of empty array with no initial value"));
                    }
                },
            };
            for (i, item) in values {
                accumulator = interpreter.call_value(
                    &callback,
                    &[accumulator, item, Value::Number(i as f64), receiver.clone()],
                    "callback",
                )?;
            }
            accumulator
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn call_back(
    interpreter: &mut Interpreter,
    args: &[Value],
    item: Value,
    index: usize,
    receiver: &Value,
) -> Result<Value, Thrown> {
    let callback = arg(args, 0);
    interpreter.call_value(
        &callback,
        &[item, Value::Number(index as f64), receiver.clone()],
        &callback.to_string(),
    )
}

/// Stable insertion sort; comparisons may call back into scripts and fail.
fn sort_values(
    interpreter: &mut Interpreter,
    mut values: Vec<Value>,
    comparator: Option<&Value>,
) -> Result<Vec<Value>, Thrown> {
    for i in 1..values.len() {
        let mut j = i;
        while j > 0 {
            let order = compare_for_sort(interpreter, &values[j - 1], &values[j], comparator)?;
            if order != Ordering::Greater {
                break;
            }
            values.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(values)
}

fn compare_for_sort(
    interpreter: &mut Interpreter,
    a: &Value,
    b: &Value,
    comparator: Option<&Value>,
) -> Result<Ordering, Thrown> {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => return Ok(Ordering::Equal),
        (Value::Undefined, _) => return Ok(Ordering::Greater),
        (_, Value::Undefined) => return Ok(Ordering::Less),
        _ => {}
    }
    match comparator {
        Some(comparator) if !comparator.is_nullish() => {
            let result = interpreter
                .call_value(comparator, &[a.clone(), b.clone()], "comparator")?
                .to_number();
            Ok(result.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
        }
        _ => Ok(a.to_string().cmp(&b.to_string())),
    }
}
