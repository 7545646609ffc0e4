//! Operators, indexing, attribute access and iteration on values.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use inkpot_parser::ast::{BinOp, CmpOp, UnaryOp};

use crate::exception::{EvalResult, Exception, ExceptionKind};
use crate::methods;
use crate::value::{Method, Number, Range, Value};

fn unsupported(op: &str, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op,
        left.type_name(),
        right.type_name()
    ))
}

fn int_overflow() -> Exception {
    Exception::overflow("integer result too large")
}

/// Largest result, in bytes, that sequence repetition will build.
const MAX_REPEAT_BYTES: usize = 1 << 30;

pub fn binary(op: BinOp, left: &Value, right: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return arithmetic(op, a, b);
    }

    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
        (BinOp::Add, Value::Str(_), other) => Err(Exception::type_error(format!(
            "can only concatenate str (not \"{}\") to str",
            other.type_name()
        ))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::List(_), other) => Err(Exception::type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            other.type_name()
        ))),
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOp::Mul, sequence, count) | (BinOp::Mul, count, sequence)
            if count.as_index().is_some() && is_sequence(sequence) =>
        {
            repeat(sequence, count.as_index().unwrap_or(0))
        }
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

fn is_sequence(value: &Value) -> bool {
    matches!(value, Value::Str(_) | Value::List(_) | Value::Tuple(_))
}

fn repeat(sequence: &Value, count: i64) -> EvalResult<Value> {
    let count = usize::try_from(count).unwrap_or(0);
    match sequence {
        Value::Str(s) => {
            let len = repeat_len(s.len(), count, 1)?;
            let mut out = String::new();
            out.try_reserve_exact(len).map_err(|_| Exception::memory_error())?;
            for _ in 0..count {
                out.push_str(s);
            }
            Ok(Value::str(out))
        }
        Value::List(items) => Ok(Value::list(repeat_items(&items.borrow(), count)?)),
        Value::Tuple(items) => Ok(Value::tuple(repeat_items(items, count)?)),
        other => Err(Exception::type_error(format!(
            "can't multiply sequence by non-int of type '{}'",
            other.type_name()
        ))),
    }
}

// Number of elements in `len * count`, refusing results over MAX_REPEAT_BYTES.
fn repeat_len(len: usize, count: usize, element_size: usize) -> EvalResult<usize> {
    let total = len.checked_mul(count).ok_or_else(Exception::memory_error)?;
    match total.checked_mul(element_size) {
        Some(bytes) if bytes <= MAX_REPEAT_BYTES => Ok(total),
        _ => Err(Exception::memory_error()),
    }
}

fn repeat_items(items: &[Value], count: usize) -> EvalResult<Vec<Value>> {
    let len = repeat_len(items.len(), count, std::mem::size_of::<Value>())?;
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|_| Exception::memory_error())?;
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

fn arithmetic(op: BinOp, a: Number, b: Number) -> EvalResult<Value> {
    use Number::Int;

    match (op, a, b) {
        (BinOp::Add, Int(x), Int(y)) => x.checked_add(y).map(Value::Int).ok_or_else(int_overflow),
        (BinOp::Sub, Int(x), Int(y)) => x.checked_sub(y).map(Value::Int).ok_or_else(int_overflow),
        (BinOp::Mul, Int(x), Int(y)) => x.checked_mul(y).map(Value::Int).ok_or_else(int_overflow),
        (BinOp::Div, _, _) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(Exception::zero_division("division by zero"));
            }
            Ok(Value::Float(a.as_f64() / divisor))
        }
        (BinOp::FloorDiv, Int(x), Int(y)) => {
            if y == 0 {
                return Err(Exception::zero_division("integer division or modulo by zero"));
            }
            let q = x.checked_div(y).ok_or_else(int_overflow)?;
            let adjust = x % y != 0 && ((x < 0) != (y < 0));
            Ok(Value::Int(if adjust { q - 1 } else { q }))
        }
        (BinOp::FloorDiv, _, _) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(Exception::zero_division("float floor division by zero"));
            }
            Ok(Value::Float((a.as_f64() / divisor).floor()))
        }
        (BinOp::Mod, Int(x), Int(y)) => {
            if y == 0 {
                return Err(Exception::zero_division("integer modulo by zero"));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            Ok(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }))
        }
        (BinOp::Mod, _, _) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(Exception::zero_division("float modulo"));
            }
            let r = a.as_f64() % divisor;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (divisor < 0.0)) {
                r + divisor
            } else {
                r
            }))
        }
        (BinOp::Pow, Int(x), Int(y)) if y >= 0 => {
            let exponent = u32::try_from(y).map_err(|_| int_overflow())?;
            x.checked_pow(exponent).map(Value::Int).ok_or_else(int_overflow)
        }
        (BinOp::Pow, _, _) => {
            let (base, exponent) = (a.as_f64(), b.as_f64());
            if base == 0.0 && exponent < 0.0 {
                return Err(Exception::zero_division("0.0 cannot be raised to a negative power"));
            }
            Ok(Value::Float(base.powf(exponent)))
        }
        (_, _, _) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Ok(Value::Float(match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                _ => x * y,
            }))
        }
    }
}

/// `target op= value`; lists extend in place on `+=`.
pub fn augmented(op: BinOp, target: &Value, value: &Value) -> EvalResult<Value> {
    if let (BinOp::Add, Value::List(items)) = (op, target) {
        let extra: Vec<Value> = iterate(value)?.collect();
        items.borrow_mut().extend(extra);
        return Ok(target.clone());
    }
    binary(op, target, value)
}

pub fn unary(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    match (op, operand.as_number()) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!operand.truthy())),
        (UnaryOp::Neg, Some(Number::Int(n))) => n.checked_neg().map(Value::Int).ok_or_else(int_overflow),
        (UnaryOp::Neg, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, Some(Number::Int(n))) => Ok(Value::Int(n)),
        (UnaryOp::Pos, Some(Number::Float(f))) => Ok(Value::Float(f)),
        (UnaryOp::Neg | UnaryOp::Pos, None) => Err(Exception::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            operand.type_name()
        ))),
    }
}

pub fn compare(op: CmpOp, left: &Value, right: &Value) -> EvalResult<bool> {
    Ok(match op {
        CmpOp::Eq => left.equals(right)?,
        CmpOp::NotEq => !left.equals(right)?,
        CmpOp::Is => left.is_same(right),
        CmpOp::IsNot => !left.is_same(right),
        CmpOp::In => contains(right, left)?,
        CmpOp::NotIn => !contains(right, left)?,
        CmpOp::Lt => order(op, left, right)? == Ordering::Less,
        CmpOp::LtE => order(op, left, right)? != Ordering::Greater,
        CmpOp::Gt => order(op, left, right)? == Ordering::Greater,
        CmpOp::GtE => order(op, left, right)? != Ordering::Less,
    })
}

/// Total order used by `<`, `sorted`, `min` and `max`.
pub fn order(op: CmpOp, left: &Value, right: &Value) -> EvalResult<Ordering> {
    let unordered = || {
        Exception::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };

    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        // NaN compares false every way; treat it as equal here.
        return Ok(a.compare(b).unwrap_or(Ordering::Equal));
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => order_items(op, &a.borrow(), &b.borrow()),
        (Value::Tuple(a), Value::Tuple(b)) => order_items(op, a, b),
        _ => Err(unordered()),
    }
}

fn order_items(op: CmpOp, a: &[Value], b: &[Value]) -> EvalResult<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if !x.equals(y)? {
            return order(op, x, y);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// `item in container`
pub fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(&**needle)),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => any_equal(&items.borrow(), item),
        Value::Tuple(items) => any_equal(items, item),
        Value::Dict(dict) => {
            item.check_hashable()?;
            Ok(dict.borrow().contains_key(item))
        }
        Value::Range(range) => Ok(item.as_index().is_some_and(|n| range.contains(n))),
        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn any_equal(items: &[Value], item: &Value) -> EvalResult<bool> {
    for x in items {
        if x.equals(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Iterator over the items of an iterable value.
///
/// Lists are read by position on every step, so items appended inside a
/// `for` loop are visited. Dict keys are a snapshot taken up front.
pub enum ValueIter {
    Items(std::vec::IntoIter<Value>),
    List { items: Rc<RefCell<Vec<Value>>>, index: usize },
    Range { next: i64, remaining: usize, step: i64 },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::Items(items) => items.next(),
            ValueIter::List { items, index } => {
                let item = items.borrow().get(*index).cloned()?;
                *index += 1;
                Some(item)
            }
            ValueIter::Range {
                next,
                remaining,
                step,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let current = *next;
                *remaining -= 1;
                *next = next.wrapping_add(*step);
                Some(Value::Int(current))
            }
        }
    }
}

pub fn iterate(value: &Value) -> EvalResult<ValueIter> {
    let items = match value {
        Value::Range(range) => {
            return Ok(ValueIter::Range {
                next: range.start,
                remaining: range.len(),
                step: range.step,
            })
        }
        Value::List(items) => {
            return Ok(ValueIter::List {
                items: items.clone(),
                index: 0,
            })
        }
        Value::Tuple(items) => items.to_vec(),
        Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
        Value::Dict(dict) => dict.borrow().keys(),
        other => {
            return Err(Exception::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            )))
        }
    };
    Ok(ValueIter::Items(items.into_iter()))
}

/// Unpack `value` into exactly `count` items for a tuple target.
pub fn unpack(value: &Value, count: usize) -> EvalResult<Vec<Value>> {
    let items: Vec<Value> = iterate(value)
        .map_err(|_| {
            Exception::type_error(format!(
                "cannot unpack non-iterable {} object",
                value.type_name()
            ))
        })?
        .collect();
    match items.len().cmp(&count) {
        Ordering::Equal => Ok(items),
        Ordering::Less => Err(Exception::value_error(format!(
            "not enough values to unpack (expected {}, got {})",
            count,
            items.len()
        ))),
        Ordering::Greater => Err(Exception::value_error(format!(
            "too many values to unpack (expected {})",
            count
        ))),
    }
}

/// Resolve a possibly negative index against `len`.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn sequence_index(container: &Value, index: &Value) -> EvalResult<i64> {
    index.as_index().ok_or_else(|| {
        Exception::type_error(format!(
            "{} indices must be integers or slices, not {}",
            container.type_name(),
            index.type_name()
        ))
    })
}

pub fn get_item(container: &Value, index: &Value) -> EvalResult<Value> {
    let out_of_range = || Exception::index_error(format!("{} index out of range", container.type_name()));

    match container {
        Value::List(items) => {
            let items = items.borrow();
            let i = normalize_index(sequence_index(container, index)?, items.len()).ok_or_else(out_of_range)?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => {
            let i = normalize_index(sequence_index(container, index)?, items.len()).ok_or_else(out_of_range)?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let i = sequence_index(container, index)?;
            let count = s.chars().count();
            let i = normalize_index(i, count)
                .ok_or_else(|| Exception::index_error("string index out of range"))?;
            Ok(s.chars().nth(i).map(|c| Value::str(c.to_string())).unwrap_or(Value::None))
        }
        Value::Range(range) => {
            let i = normalize_index(sequence_index(container, index)?, range.len())
                .ok_or_else(|| Exception::index_error("range object index out of range"))?;
            Ok(range.get(i).map(Value::Int).unwrap_or(Value::None))
        }
        Value::Dict(dict) => {
            index.check_hashable()?;
            dict.borrow()
                .get(index)
                .cloned()
                .ok_or_else(|| Exception::new(ExceptionKind::KeyError, index.repr()))
        }
        other => Err(Exception::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub fn set_item(container: &Value, index: Value, value: Value) -> EvalResult<()> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(sequence_index(container, &index)?, items.len())
                .ok_or_else(|| Exception::index_error("list assignment index out of range"))?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.borrow_mut().insert(index, value),
        other => Err(Exception::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

pub fn get_attr(value: &Value, attr: &str) -> EvalResult<Value> {
    if let Value::Module(module) = value {
        return module.get(attr).ok_or_else(|| {
            Exception::attribute_error(format!("module '{}' has no attribute '{}'", module.name, attr))
        });
    }
    if methods::has_method(value, attr) {
        return Ok(Value::Method(Rc::new(Method {
            receiver: value.clone(),
            name: attr.to_string(),
        })));
    }
    Err(Exception::attribute_error(format!(
        "'{}' object has no attribute '{}'",
        value.type_name(),
        attr
    )))
}

pub fn set_attr(target: &Value, attr: &str, value: Value) -> EvalResult<()> {
    match target {
        Value::Module(module) => {
            module.attrs.borrow_mut().insert(attr.to_string(), value);
            Ok(())
        }
        other => Err(Exception::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            attr
        ))),
    }
}

/// Build a `range` from one to three integer arguments.
pub fn make_range(args: &[Value]) -> EvalResult<Range> {
    let ints = args
        .iter()
        .map(|arg| {
            arg.as_index().ok_or_else(|| {
                Exception::type_error(format!(
                    "'{}' object cannot be interpreted as an integer",
                    arg.type_name()
                ))
            })
        })
        .collect::<EvalResult<Vec<i64>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => {
            return Err(Exception::type_error(format!(
                "range expected at most 3 arguments, got {}",
                args.len()
            )))
        }
    };
    if step == 0 {
        return Err(Exception::value_error("range() arg 3 must not be zero"));
    }
    Ok(Range { start, stop, step })
}
