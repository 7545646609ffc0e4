//! Runtime values for the inkpot interpreter.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use indexmap::IndexMap;
use inkpot_parser::ast::Stmt;
use inkpot_parser::literal::{float_repr, string_repr};

use crate::exception::{EvalResult, Exception, ExceptionKind};
use crate::output::Stream;
use crate::scope::Scope;

/// Deepest container nesting that comparison, hashing and `repr` walk.
pub const NESTING_LIMIT: usize = 500;

/// A runtime value.
///
/// Mutable containers are shared through `Rc<RefCell<..>>`, so assignment
/// aliases them the way Python does.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Range(Range),
    Function(Rc<Function>),
    Builtin(Builtin),
    /// A method looked up on a builtin value, waiting to be called.
    Method(Rc<Method>),
    Module(Rc<Module>),
    Stream(Stream),
    Coroutine(Rc<Coroutine>),
    Exception(Rc<Exception>),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::Builtin(builtin) if builtin.is_type() => "type",
            Value::Builtin(_) | Value::Method(_) => "builtin_function_or_method",
            Value::Module(_) => "module",
            Value::Stream(_) => "TextIOWrapper",
            Value::Coroutine(_) => "coroutine",
            Value::Exception(exc) => exc.kind.name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Python truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(dict) => !dict.borrow().is_empty(),
            Value::Range(range) => !range.is_empty(),
            _ => true,
        }
    }

    /// Text produced by `str(value)`.
    pub fn to_str(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Exception(exc) => exc.message.clone(),
            other => other.repr(),
        }
    }

    /// Text produced by `repr(value)`.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.repr_into(&mut out, &mut Vec::new(), 0);
        out
    }

    // `seen` holds the containers currently being printed, so a list that
    // contains itself prints as `[...]`. Past NESTING_LIMIT levels the rest
    // is elided the same way.
    fn repr_into(&self, out: &mut String, seen: &mut Vec<usize>, depth: usize) {
        if depth > NESTING_LIMIT && matches!(self, Value::List(_) | Value::Tuple(_) | Value::Dict(_)) {
            out.push_str("...");
            return;
        }
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Float(f) => out.push_str(&float_repr(*f)),
            Value::Str(s) => out.push_str(&string_repr(s)),
            Value::List(items) => {
                let key = Rc::as_ptr(items) as *const () as usize;
                if seen.contains(&key) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(key);
                out.push('[');
                repr_items(&items.borrow(), out, seen, depth);
                out.push(']');
                seen.pop();
            }
            Value::Tuple(items) => {
                out.push('(');
                repr_items(items, out, seen, depth);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Value::Dict(dict) => {
                let key = Rc::as_ptr(dict) as *const () as usize;
                if seen.contains(&key) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(key);
                out.push('{');
                for (i, (k, v)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.repr_into(out, seen, depth + 1);
                    out.push_str(": ");
                    v.repr_into(out, seen, depth + 1);
                }
                out.push('}');
                seen.pop();
            }
            Value::Range(range) => {
                if range.step == 1 {
                    out.push_str(&format!("range({}, {})", range.start, range.stop));
                } else {
                    out.push_str(&format!("range({}, {}, {})", range.start, range.stop, range.step));
                }
            }
            Value::Function(function) => {
                let kind = if function.is_async { "coroutine function" } else { "function" };
                out.push_str(&format!("<{} {}>", kind, function.name));
            }
            Value::Builtin(builtin) if builtin.is_type() => {
                out.push_str(&format!("<class '{}'>", builtin.name()));
            }
            Value::Builtin(builtin) => {
                out.push_str(&format!("<built-in function {}>", builtin.name()));
            }
            Value::Method(method) => out.push_str(&format!(
                "<built-in method {} of {} object>",
                method.name,
                method.receiver.type_name()
            )),
            Value::Module(module) => out.push_str(&format!("<module '{}'>", module.name)),
            Value::Stream(stream) => out.push_str(&format!("<{}>", stream.name())),
            Value::Coroutine(coroutine) => {
                out.push_str(&format!("<coroutine object {}>", coroutine.name));
            }
            Value::Exception(exc) => {
                out.push_str(exc.kind.name());
                out.push('(');
                if !exc.message.is_empty() {
                    out.push_str(&string_repr(&exc.message));
                }
                out.push(')');
            }
        }
    }

    /// Python `==`.
    ///
    /// Fails with `RecursionError` when the operands nest deeper than
    /// [`NESTING_LIMIT`], which is how two lists that contain themselves end.
    pub fn equals(&self, other: &Value) -> EvalResult<bool> {
        self.equals_at(other, 0)
    }

    fn equals_at(&self, other: &Value, depth: usize) -> EvalResult<bool> {
        if depth > NESTING_LIMIT {
            return Err(Exception::recursion_error(
                "maximum recursion depth exceeded in comparison",
            ));
        }
        Ok(match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || items_equal(&a.borrow(), &b.borrow(), depth)?
            }
            (Value::Tuple(a), Value::Tuple(b)) => items_equal(a, b, depth)?,
            (Value::Dict(a), Value::Dict(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().equals_at(&b.borrow(), depth)?
            }
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Stream(a), Value::Stream(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Coroutine(a), Value::Coroutine(b)) => Rc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => {
                a.name == b.name && a.receiver.is_same(&b.receiver)
            }
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x.compare(y) == Some(Ordering::Equal),
                _ => false,
            },
        })
    }

    /// Python `is`.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Method(a), Value::Method(b)) => Rc::ptr_eq(a, b),
            (a, b) => matches!(
                (a, b),
                (Value::Function(_), Value::Function(_))
                    | (Value::Builtin(_), Value::Builtin(_))
                    | (Value::Module(_), Value::Module(_))
                    | (Value::Stream(_), Value::Stream(_))
                    | (Value::Coroutine(_), Value::Coroutine(_))
                    | (Value::Exception(_), Value::Exception(_))
            ) && a.equals(b).unwrap_or(false),
        }
    }

    /// Numeric view of ints, floats and bools.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Integer view of ints and bools, for indices and counts.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn check_hashable(&self) -> EvalResult<()> {
        self.check_hashable_at(0)
    }

    fn check_hashable_at(&self, depth: usize) -> EvalResult<()> {
        match self {
            Value::List(_) | Value::Dict(_) => Err(Exception::type_error(format!(
                "unhashable type: '{}'",
                self.type_name()
            ))),
            Value::Tuple(_) if depth > NESTING_LIMIT => Err(Exception::recursion_error(
                "maximum recursion depth exceeded while hashing",
            )),
            Value::Tuple(items) => items
                .iter()
                .try_for_each(|item| item.check_hashable_at(depth + 1)),
            _ => Ok(()),
        }
    }
}

fn repr_items(items: &[Value], out: &mut String, seen: &mut Vec<usize>, depth: usize) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.repr_into(out, seen, depth + 1);
    }
}

fn items_equal(a: &[Value], b: &[Value], depth: usize) -> EvalResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.equals_at(y, depth + 1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `f` as an integer, when it is a whole number inside the i64 range.
fn float_as_int(f: f64) -> Option<i64> {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && (-BOUND..BOUND).contains(&f)).then_some(f as i64)
}

// Hash consistent with `equals` on hashable values: `1`, `1.0` and `True`
// land in the same bucket.
fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Bool(b) => i64::from(*b).hash(state),
        Value::Int(n) => n.hash(state),
        Value::Float(f) => match float_as_int(*f) {
            Some(n) => n.hash(state),
            None => f.to_bits().hash(state),
        },
        Value::Str(s) => s.hash(state),
        Value::Tuple(items) => {
            items.len().hash(state);
            for item in items.iter() {
                hash_value(item, state);
            }
        }
        Value::Range(range) => range.hash(state),
        Value::Builtin(builtin) => builtin.name().hash(state),
        Value::Method(method) => method.name.hash(state),
        Value::Stream(stream) => stream.name().hash(state),
        Value::Function(function) => Rc::as_ptr(function).hash(state),
        Value::Module(module) => Rc::as_ptr(module).hash(state),
        Value::Coroutine(coroutine) => Rc::as_ptr(coroutine).hash(state),
        Value::Exception(exc) => Rc::as_ptr(exc).hash(state),
        Value::None | Value::List(_) | Value::Dict(_) => mem::discriminant(value).hash(state),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl From<Exception> for Value {
    fn from(exc: Exception) -> Self {
        Value::Exception(Rc::new(exc))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    /// Exact numeric ordering; `None` when either side is NaN.
    ///
    /// Ints are never rounded through f64, so `2**53 + 1` and
    /// `float(2**53)` compare unequal.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
            (Number::Float(x), Number::Float(y)) => x.partial_cmp(&y),
            (Number::Int(x), Number::Float(y)) => int_float_cmp(x, y),
            (Number::Float(x), Number::Int(y)) => int_float_cmp(y, x).map(Ordering::reverse),
        }
    }
}

fn int_float_cmp(n: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if let Some(whole) = float_as_int(f) {
        return Some(n.cmp(&whole));
    }
    if f.abs() >= 9_223_372_036_854_775_808.0 {
        return Some(if f > 0.0 { Ordering::Less } else { Ordering::Greater });
    }
    // A fractional f lies strictly between two integers below 2**53, so
    // rounding `n` cannot carry it across `f`.
    (n as f64).partial_cmp(&f)
}

/// A dict key, hashed and compared with Python key equality.
#[derive(Clone)]
struct DictKey(Value);

impl Hash for DictKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

// Keys pass `check_hashable`, so comparing them stays within NESTING_LIMIT.
impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.equals(&other.0).unwrap_or(false)
    }
}

impl Eq for DictKey {}

/// Insertion-ordered mapping with Python key equality.
#[derive(Clone, Default)]
pub struct Dict {
    entries: IndexMap<DictKey, Value>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(&DictKey(key.clone()))
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(&DictKey(key.clone()))
    }

    /// Insert or overwrite; an existing key keeps its original position.
    pub fn insert(&mut self, key: Value, value: Value) -> EvalResult<()> {
        key.check_hashable()?;
        self.entries.insert(DictKey(key), value);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (&k.0, v))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.keys().map(|k| k.0.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.values().cloned().collect()
    }

    pub fn items(&self) -> Vec<Value> {
        self.iter()
            .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
            .collect()
    }

    fn equals_at(&self, other: &Dict, depth: usize) -> EvalResult<bool> {
        if self.len() != other.len() {
            return Ok(false);
        }
        for (key, value) in &self.entries {
            let Some(theirs) = other.entries.get(key) else {
                return Ok(false);
            };
            if !value.equals_at(theirs, depth + 1)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            i128::from(self.stop) - i128::from(self.start)
        } else {
            i128::from(self.start) - i128::from(self.stop)
        };
        let step = i128::from(self.step).abs();
        if span <= 0 {
            0
        } else {
            ((span + step - 1) / step) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let offset = i128::from(self.step) * i128::try_from(index).ok()?;
        i64::try_from(i128::from(self.start) + offset).ok()
    }

    pub fn contains(&self, n: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= n && n < self.stop
        } else {
            self.stop < n && n <= self.start
        };
        in_bounds && (n - self.start) % self.step == 0
    }
}

/// A parameter of a user function, with its default already evaluated.
#[derive(Clone)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<Value>,
}

/// A user-defined function together with the scope it closes over.
pub struct Function {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<Scope>,
    pub is_async: bool,
}

/// Functions and types implemented by the interpreter itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Input,
    Len,
    Str,
    Repr,
    Int,
    Float,
    Bool,
    List,
    Range,
    Abs,
    Min,
    Max,
    Sum,
    Round,
    Sorted,
    Exception(ExceptionKind),
    MathSqrt,
    MathFloor,
    MathCeil,
    HostText,
    HostImage,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Input => "input",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Repr => "repr",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Range => "range",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Sum => "sum",
            Builtin::Round => "round",
            Builtin::Sorted => "sorted",
            Builtin::Exception(kind) => kind.name(),
            Builtin::MathSqrt => "sqrt",
            Builtin::MathFloor => "floor",
            Builtin::MathCeil => "ceil",
            Builtin::HostText => "text",
            Builtin::HostImage => "image",
        }
    }

    /// Whether this builtin is a class rather than a plain function.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Builtin::Str
                | Builtin::Int
                | Builtin::Float
                | Builtin::Bool
                | Builtin::List
                | Builtin::Range
                | Builtin::Exception(_)
        )
    }
}

pub struct Method {
    pub receiver: Value,
    pub name: String,
}

pub struct Module {
    pub name: String,
    pub attrs: RefCell<HashMap<String, Value>>,
}

impl Module {
    pub fn new(name: impl Into<String>, attrs: HashMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            attrs: RefCell::new(attrs),
        }
    }

    pub fn get(&self, attr: &str) -> Option<Value> {
        self.attrs.borrow().get(attr).cloned()
    }
}

/// What awaiting a coroutine will do.
pub enum CoroutineState {
    /// Suspend until the host supplies a line of input.
    Input { prompt: String },
    /// Run the body of an `async def` call.
    Running(LocalBoxFuture<'static, EvalResult<Value>>),
    /// Already awaited.
    Done,
}

pub struct Coroutine {
    pub name: String,
    state: RefCell<CoroutineState>,
}

impl Coroutine {
    pub fn input(prompt: impl Into<String>) -> Self {
        Self {
            name: "input".to_string(),
            state: RefCell::new(CoroutineState::Input {
                prompt: prompt.into(),
            }),
        }
    }

    pub fn running(name: impl Into<String>, body: LocalBoxFuture<'static, EvalResult<Value>>) -> Self {
        Self {
            name: name.into(),
            state: RefCell::new(CoroutineState::Running(body)),
        }
    }

    /// Take the pending work out, leaving the coroutine spent.
    pub fn take(&self) -> CoroutineState {
        mem::replace(&mut *self.state.borrow_mut(), CoroutineState::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr_of_containers() {
        let value = Value::list(vec![
            Value::Int(1),
            Value::str("a"),
            Value::tuple(vec![Value::Float(2.0)]),
            Value::None,
        ]);
        assert_eq!(value.repr(), "[1, 'a', (2.0,), None]");
        assert_eq!(value.to_str(), value.repr());
        assert_eq!(Value::str("a").to_str(), "a");
    }

    #[test]
    fn test_self_containing_list_repr() {
        assert_eq!(self_containing_list().repr(), "[[...]]");
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(1), Value::str("1"));
    }

    #[test]
    fn test_dict_keys_use_python_equality() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(1), Value::str("int")).unwrap();
        dict.insert(Value::Float(1.0), Value::str("float")).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&Value::Bool(true)), Some(&Value::str("float")));
        assert!(dict.insert(Value::list(vec![]), Value::None).is_err());
    }

    #[test]
    fn test_int_float_equality_is_exact() {
        let big = 1i64 << 53;
        assert_ne!(Value::Int(big + 1), Value::Float(big as f64));
        assert_eq!(Value::Int(big), Value::Float(big as f64));
        assert_ne!(Value::Int(i64::MAX), Value::Float(9_223_372_036_854_775_808.0));
        assert_ne!(Value::Int(0), Value::Float(f64::NAN));
        assert_eq!(
            Number::Int(big + 1).compare(Number::Float(big as f64)),
            Some(Ordering::Greater)
        );
        assert_eq!(Number::Float(0.5).compare(Number::Int(1)), Some(Ordering::Less));
        assert_eq!(Number::Int(i64::MIN).compare(Number::Float(f64::NEG_INFINITY)), Some(Ordering::Greater));
    }

    fn self_containing_list() -> Value {
        let items = Rc::new(RefCell::new(Vec::new()));
        let list = Value::List(items.clone());
        items.borrow_mut().push(list.clone());
        list
    }

    #[test]
    fn test_comparing_self_containing_lists_is_a_recursion_error() {
        let (x, y) = (self_containing_list(), self_containing_list());
        let err = x.equals(&y).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::RecursionError);
        assert!(x.equals(&x).unwrap());
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let mut deep = Value::tuple(vec![]);
        for _ in 0..NESTING_LIMIT + 10 {
            deep = Value::tuple(vec![deep]);
        }
        assert_eq!(
            deep.check_hashable().unwrap_err().kind,
            ExceptionKind::RecursionError
        );
        assert!(deep.repr().contains("..."));
        let mut dict = Dict::new();
        assert!(dict.insert(deep, Value::None).is_err());
    }

    #[test]
    fn test_dict_keeps_insertion_order_and_first_key() {
        let mut dict = Dict::new();
        dict.insert(Value::str("b"), Value::Int(1)).unwrap();
        dict.insert(Value::Int(2), Value::Int(2)).unwrap();
        dict.insert(Value::Float(2.0), Value::Int(3)).unwrap();
        dict.insert(Value::tuple(vec![Value::Int(1), Value::str("x")]), Value::None).unwrap();
        assert_eq!(Value::dict(dict.clone()).repr(), "{'b': 1, 2: 3, (1, 'x'): None}");
        assert!(dict.contains_key(&Value::tuple(vec![Value::Bool(true), Value::str("x")])));
        assert!(!dict.contains_key(&Value::str("2")));
    }

    #[test]
    fn test_dict_with_many_keys() {
        let mut dict = Dict::new();
        for n in 0..50_000 {
            dict.insert(Value::Int(n), Value::Int(n * 2)).unwrap();
        }
        assert_eq!(dict.len(), 50_000);
        assert_eq!(dict.get(&Value::Float(49_999.0)), Some(&Value::Int(99_998)));
        assert_eq!(dict.keys().first(), Some(&Value::Int(0)));
    }

    #[test]
    fn test_range_len_and_contains() {
        let r = Range { start: 0, stop: 10, step: 3 };
        assert_eq!(r.len(), 4);
        assert!(r.contains(9));
        assert!(!r.contains(10));
        let down = Range { start: 5, stop: 0, step: -2 };
        assert_eq!(down.len(), 3);
        assert_eq!(down.get(2), Some(1));
    }

    #[test]
    fn test_coroutine_is_spent_after_take() {
        let coroutine = Coroutine::input("name: ");
        assert!(matches!(coroutine.take(), CoroutineState::Input { .. }));
        assert!(matches!(coroutine.take(), CoroutineState::Done));
    }
}
