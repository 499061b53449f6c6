//! Compute drivers — arithmetic, comparison, coercion, length,
//! concatenation, and containment. These never suspend
//! ([`blueprint_kernel::NodeKind::may_suspend`] is `false` for all of
//! them) and run synchronously on the scheduler thread.

use super::{field, op_error};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::value::MapKey;
use blueprint_kernel::Value;

fn lhs_rhs(args: &Value) -> (Value, Value) {
    (
        field(args, "lhs").cloned().unwrap_or(Value::Null),
        field(args, "rhs").cloned().unwrap_or(Value::Null),
    )
}

fn operand(args: &Value) -> Value {
    field(args, "operand").cloned().unwrap_or(Value::Null)
}

fn as_numeric_pair(lhs: &Value, rhs: &Value, op: &'static str) -> Result<(f64, f64, bool), NodeError> {
    let both_int = matches!(lhs, Value::Int(_)) && matches!(rhs, Value::Int(_));
    let l = lhs
        .as_float()
        .ok_or_else(|| op_error(format!("`{op}`: left operand is not numeric: {lhs:?}")))?;
    let r = rhs
        .as_float()
        .ok_or_else(|| op_error(format!("`{op}`: right operand is not numeric: {rhs:?}")))?;
    Ok((l, r, both_int))
}

pub fn add(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    let (l, r, both_int) = as_numeric_pair(&lhs, &rhs, "add")?;
    Ok(if both_int { Value::Int(l as i64 + r as i64) } else { Value::Float(l + r) })
}

pub fn sub(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    let (l, r, both_int) = as_numeric_pair(&lhs, &rhs, "sub")?;
    Ok(if both_int { Value::Int(l as i64 - r as i64) } else { Value::Float(l - r) })
}

pub fn mul(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    let (l, r, both_int) = as_numeric_pair(&lhs, &rhs, "mul")?;
    Ok(if both_int { Value::Int(l as i64 * r as i64) } else { Value::Float(l * r) })
}

pub fn div(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    let (l, r, _) = as_numeric_pair(&lhs, &rhs, "div")?;
    if r == 0.0 {
        return Err(op_error("div: division by zero"));
    }
    Ok(Value::Float(l / r))
}

pub fn floor_div(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    let (l, r, both_int) = as_numeric_pair(&lhs, &rhs, "floor_div")?;
    if r == 0.0 {
        return Err(op_error("floor_div: division by zero"));
    }
    let result = (l / r).floor();
    Ok(if both_int { Value::Int(result as i64) } else { Value::Float(result) })
}

pub fn rem(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    let (l, r, both_int) = as_numeric_pair(&lhs, &rhs, "mod")?;
    if r == 0.0 {
        return Err(op_error("mod: division by zero"));
    }
    // Floored remainder, paired with `floor_div`'s floor-toward-negative-infinity
    // division (`l == floor_div(l, r) * r + mod(l, r)`): the result takes the
    // sign of `r`, matching the `%` operator most scripting languages expose
    // rather than `rem_euclid`'s always-non-negative Euclidean remainder.
    let result = l - (l / r).floor() * r;
    Ok(if both_int { Value::Int(result as i64) } else { Value::Float(result) })
}

pub fn neg(args: Value) -> Result<Value, NodeError> {
    match operand(&args) {
        Value::Int(i) => Ok(Value::Int(-i)),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(op_error(format!("neg: operand is not numeric: {other:?}"))),
    }
}

pub fn not(args: Value) -> Result<Value, NodeError> {
    let v = operand(&args);
    Ok(Value::Bool(!truthy(&v)))
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Bytes(b) => !b.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Map(m) => !m.is_empty(),
        Value::Struct(s) => !s.is_empty(),
        Value::Deferred(_) => true,
    }
}

pub fn eq(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    Ok(Value::Bool(lhs == rhs))
}

pub fn ne(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    Ok(Value::Bool(lhs != rhs))
}

fn ordering(lhs: &Value, rhs: &Value, op: &'static str) -> Result<std::cmp::Ordering, NodeError> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => {
            let l = lhs.as_float().ok_or_else(|| op_error(format!("`{op}`: left operand is not comparable: {lhs:?}")))?;
            let r = rhs.as_float().ok_or_else(|| op_error(format!("`{op}`: right operand is not comparable: {rhs:?}")))?;
            l.partial_cmp(&r).ok_or_else(|| op_error(format!("`{op}`: operands are not orderable (NaN?)")))
        }
    }
}

macro_rules! comparison {
    ($name:ident, $op:literal, $pred:expr) => {
        pub fn $name(args: Value) -> Result<Value, NodeError> {
            let (lhs, rhs) = lhs_rhs(&args);
            let ord = ordering(&lhs, &rhs, $op)?;
            Ok(Value::Bool($pred(ord)))
        }
    };
}

comparison!(lt, "lt", |o: std::cmp::Ordering| o.is_lt());
comparison!(le, "le", |o: std::cmp::Ordering| o.is_le());
comparison!(gt, "gt", |o: std::cmp::Ordering| o.is_gt());
comparison!(ge, "ge", |o: std::cmp::Ordering| o.is_ge());

pub fn concat(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (Value::Bytes(mut a), Value::Bytes(b)) => {
            a.extend(b);
            Ok(Value::Bytes(a))
        }
        (a, b) => Err(op_error(format!("concat: incompatible operands: {a:?}, {b:?}"))),
    }
}

pub fn contains(args: Value) -> Result<Value, NodeError> {
    let (lhs, rhs) = lhs_rhs(&args);
    let result = match (&lhs, &rhs) {
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        (Value::List(items), needle) => items.contains(needle),
        (Value::Map(entries), Value::String(key)) => entries.contains_key(&MapKey::String(key.clone())),
        (Value::Map(entries), Value::Int(key)) => entries.contains_key(&MapKey::Int(*key)),
        (other, _) => return Err(op_error(format!("contains: left operand is not a container: {other:?}"))),
    };
    Ok(Value::Bool(result))
}

pub fn to_bool(args: Value) -> Result<Value, NodeError> {
    Ok(Value::Bool(truthy(&operand(&args))))
}

pub fn to_int(args: Value) -> Result<Value, NodeError> {
    match operand(&args) {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Float(f) => Ok(Value::Int(f as i64)),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| op_error(format!("int: cannot parse `{s}` as an integer"))),
        other => Err(op_error(format!("int: cannot coerce {other:?}"))),
    }
}

pub fn to_float(args: Value) -> Result<Value, NodeError> {
    match operand(&args) {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Float(f) => Ok(Value::Float(f)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| op_error(format!("float: cannot parse `{s}` as a float"))),
        other => Err(op_error(format!("float: cannot coerce {other:?}"))),
    }
}

pub fn to_str(args: Value) -> Result<Value, NodeError> {
    Ok(Value::String(match operand(&args) {
        Value::String(s) => s,
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        other => format!("{other:?}"),
    }))
}

pub fn len(args: Value) -> Result<Value, NodeError> {
    let v = operand(&args);
    let n = match &v {
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::List(items) => items.len(),
        Value::Map(m) => m.len(),
        Value::Struct(s) => s.len(),
        other => return Err(op_error(format!("len: operand has no length: {other:?}"))),
    };
    Ok(Value::Int(n as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn binary(lhs: Value, rhs: Value) -> Value {
        let mut map = BTreeMap::new();
        map.insert("lhs".to_string(), lhs);
        map.insert("rhs".to_string(), rhs);
        Value::Struct(map)
    }

    fn unary(operand: Value) -> Value {
        let mut map = BTreeMap::new();
        map.insert("operand".to_string(), operand);
        Value::Struct(map)
    }

    #[test]
    fn add_keeps_int_kind_for_two_ints() {
        assert_eq!(add(binary(Value::Int(2), Value::Int(3))).unwrap(), Value::Int(5));
    }

    #[test]
    fn add_promotes_to_float_when_either_operand_is_float() {
        assert_eq!(add(binary(Value::Int(2), Value::Float(0.5))).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn div_by_zero_is_an_operation_error() {
        assert!(matches!(div(binary(Value::Int(1), Value::Int(0))).unwrap_err(), NodeError::Operation(_)));
    }

    #[test]
    fn floor_div_rounds_toward_negative_infinity() {
        assert_eq!(floor_div(binary(Value::Int(7), Value::Int(2))).unwrap(), Value::Int(3));
        assert_eq!(floor_div(binary(Value::Int(-7), Value::Int(2))).unwrap(), Value::Int(-4));
    }

    #[test]
    fn rem_takes_the_sign_of_the_divisor_not_euclidean() {
        assert_eq!(rem(binary(Value::Int(-7), Value::Int(2))).unwrap(), Value::Int(1));
        assert_eq!(rem(binary(Value::Int(7), Value::Int(-2))).unwrap(), Value::Int(-1));
    }

    #[test]
    fn lt_compares_strings_lexicographically() {
        assert_eq!(lt(binary(Value::String("a".into()), Value::String("b".into()))).unwrap(), Value::Bool(true));
    }

    #[test]
    fn concat_joins_lists() {
        let result = concat(binary(Value::List(vec![Value::Int(1)]), Value::List(vec![Value::Int(2)]))).unwrap();
        assert_eq!(result, Value::List(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn contains_checks_list_membership() {
        let result = contains(binary(Value::List(vec![Value::Int(1), Value::Int(2)]), Value::Int(2))).unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn len_counts_utf8_chars_not_bytes() {
        assert_eq!(len(unary(Value::String("héllo".into()))).unwrap(), Value::Int(5));
    }

    #[test]
    fn to_bool_treats_empty_containers_as_falsy() {
        assert_eq!(to_bool(unary(Value::List(vec![]))).unwrap(), Value::Bool(false));
        assert_eq!(to_bool(unary(Value::Int(1))).unwrap(), Value::Bool(true));
    }
}
