use std::cmp::Ordering;

use crate::ast::{AssignOp, BinaryOp};
use crate::value::Value;

/// Apply a binary operator. An `Err` is a `TypeError` message.
pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    let value = match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt => Value::Bool(left.compare(right) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            left.compare(right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(left.compare(right) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            left.compare(right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::In => Value::Bool(has_property(right, &property_key(left))?),
    };
    Ok(value)
}

/// The binary operator a compound assignment applies, if any.
pub(crate) fn compound(op: AssignOp) -> Option<BinaryOp> {
    match op {
        AssignOp::Assign => None,
        AssignOp::Add => Some(BinaryOp::Add),
        AssignOp::Sub => Some(BinaryOp::Sub),
        AssignOp::Mul => Some(BinaryOp::Mul),
        AssignOp::Div => Some(BinaryOp::Div),
    }
}

/// Property name a value stands for when used as `object[key]`.
pub(crate) fn property_key(key: &Value) -> String {
    key.to_string()
}

fn add(left: &Value, right: &Value) -> Value {
    let stringish = |v: &Value| {
        matches!(
            v,
            Value::String(_)
                | Value::Array(_)
                | Value::Object(_)
                | Value::Function(_)
                | Value::Native(_)
        )
    };
    if stringish(left) || stringish(right) {
        Value::String(format!("{left}{right}"))
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn has_property(object: &Value, key: &str) -> Result<bool, String> {
    match object {
        Value::Object(object) => Ok(object.borrow().contains_key(key)),
        Value::Array(items) => Ok(key == "length"
            || key
                .parse::<usize>()
                .is_ok_and(|i| i < items.borrow().len())),
        other => Err(format!(
            "Cannot use 'in' operator to search for '{key}' in {other}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_concatenates_when_either_side_is_a_string() {
        let result = binary(BinaryOp::Add, &Value::from("a"), &Value::from(1)).unwrap();
        assert_eq!(result.to_string(), "a1");
        let result = binary(BinaryOp::Add, &Value::from(1), &Value::from(2)).unwrap();
        assert_eq!(result.to_string(), "3");
    }

    #[test]
    fn relational_operators_with_nan_are_false() {
        let nan = Value::Number(f64::NAN);
        let one = Value::from(1);
        assert!(!binary(BinaryOp::Lt, &nan, &one).unwrap().truthy());
        assert!(!binary(BinaryOp::Ge, &nan, &one).unwrap().truthy());
    }

    #[test]
    fn in_requires_an_object() {
        assert!(binary(BinaryOp::In, &Value::from("a"), &Value::from("abc")).is_err());
    }
}
