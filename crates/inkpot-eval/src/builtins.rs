//! Builtin functions and types.

use std::cmp::Ordering;
use std::rc::Rc;

use inkpot_parser::ast::{BinOp, CmpOp};
use inkpot_parser::literal::string_repr;

use crate::eval::Env;
use crate::exception::{EvalResult, Exception, ExceptionKind};
use crate::ops;
use crate::output::Stream;
use crate::value::{Builtin, Coroutine, Number, Value};

const GLOBAL_BUILTINS: &[Builtin] = &[
    Builtin::Print,
    Builtin::Input,
    Builtin::Len,
    Builtin::Str,
    Builtin::Repr,
    Builtin::Int,
    Builtin::Float,
    Builtin::Bool,
    Builtin::List,
    Builtin::Range,
    Builtin::Abs,
    Builtin::Min,
    Builtin::Max,
    Builtin::Sum,
    Builtin::Round,
    Builtin::Sorted,
];

/// Resolve a name in the builtin namespace.
pub fn lookup(name: &str) -> Option<Value> {
    GLOBAL_BUILTINS
        .iter()
        .copied()
        .find(|builtin| builtin.name() == name)
        .or_else(|| ExceptionKind::from_name(name).map(Builtin::Exception))
        .map(Value::Builtin)
}

/// Evaluated arguments of a call.
#[derive(Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new(positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self {
            positional,
            keywords,
        }
    }

    #[cfg(test)]
    pub fn positional(positional: Vec<Value>) -> Self {
        Self::new(positional, Vec::new())
    }

    pub fn no_keywords(&self, function: &str) -> EvalResult<()> {
        if self.keywords.is_empty() {
            Ok(())
        } else {
            Err(Exception::type_error(format!(
                "{}() takes no keyword arguments",
                function
            )))
        }
    }

    /// Remove and return the keyword argument `name`, if given.
    pub fn take_keyword(&mut self, name: &str) -> Option<Value> {
        let index = self.keywords.iter().position(|(k, _)| k == name)?;
        Some(self.keywords.remove(index).1)
    }

    /// Fail on any keyword argument not already taken.
    pub fn reject_keywords(&self, function: &str) -> EvalResult<()> {
        match self.keywords.first() {
            None => Ok(()),
            Some((name, _)) => Err(Exception::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                function, name
            ))),
        }
    }

    pub fn exactly<const N: usize>(self, function: &str) -> EvalResult<[Value; N]> {
        let given = self.positional.len();
        self.positional.try_into().map_err(|_| {
            Exception::type_error(match N {
                0 => format!("{}() takes no arguments ({} given)", function, given),
                1 => format!("{}() takes exactly one argument ({} given)", function, given),
                n => format!("{}() takes exactly {} arguments ({} given)", function, n, given),
            })
        })
    }

    pub fn between(self, function: &str, min: usize, max: usize) -> EvalResult<Vec<Value>> {
        let given = self.positional.len();
        let plural = |n: usize| if n == 1 { "argument" } else { "arguments" };
        if given < min {
            return Err(Exception::type_error(format!(
                "{} expected at least {} {}, got {}",
                function,
                min,
                plural(min),
                given
            )));
        }
        if given > max {
            return Err(Exception::type_error(format!(
                "{} expected at most {} {}, got {}",
                function,
                max,
                plural(max),
                given
            )));
        }
        Ok(self.positional)
    }
}

fn expect_number(function: &str, value: &Value) -> EvalResult<Number> {
    value.as_number().ok_or_else(|| {
        Exception::type_error(format!(
            "{}() argument must be a real number, not '{}'",
            function,
            value.type_name()
        ))
    })
}

fn float_to_int(f: f64) -> EvalResult<i64> {
    if f.is_nan() {
        return Err(Exception::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(Exception::overflow("cannot convert float infinity to integer"));
    }
    let truncated = f.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(Exception::overflow("integer result too large"));
    }
    Ok(truncated as i64)
}

pub fn call(env: &Env, builtin: Builtin, mut args: CallArgs) -> EvalResult<Value> {
    let name = builtin.name();
    match builtin {
        Builtin::Print => {
            let sep = text_keyword(&mut args, "sep", " ")?;
            let end = text_keyword(&mut args, "end", "\n")?;
            let stream = match args.take_keyword("file") {
                None | Some(Value::None) => Stream::Stdout,
                Some(Value::Stream(stream)) => stream,
                Some(other) => {
                    return Err(Exception::attribute_error(format!(
                        "'{}' object has no attribute 'write'",
                        other.type_name()
                    )))
                }
            };
            args.take_keyword("flush");
            args.reject_keywords(name)?;

            let mut text = args
                .positional
                .iter()
                .map(Value::to_str)
                .collect::<Vec<_>>()
                .join(&sep);
            text.push_str(&end);
            env.output.write(stream, &text);
            Ok(Value::None)
        }
        Builtin::Input => {
            args.no_keywords(name)?;
            let prompt = match args.between(name, 0, 1)?.first() {
                Some(prompt) => prompt.to_str(),
                None => String::new(),
            };
            Ok(Value::Coroutine(Rc::new(Coroutine::input(prompt))))
        }
        Builtin::Len => {
            args.no_keywords(name)?;
            let [value] = args.exactly::<1>(name)?;
            let len = match &value {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.borrow().len(),
                Value::Tuple(items) => items.len(),
                Value::Dict(dict) => dict.borrow().len(),
                Value::Range(range) => range.len(),
                other => {
                    return Err(Exception::type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            i64::try_from(len).map(Value::Int).map_err(|_| {
                Exception::overflow("Python int too large to convert to C ssize_t")
            })
        }
        Builtin::Str => {
            args.no_keywords(name)?;
            Ok(match args.between(name, 0, 1)?.first() {
                Some(value) => Value::str(value.to_str()),
                None => Value::str(""),
            })
        }
        Builtin::Repr => {
            args.no_keywords(name)?;
            let [value] = args.exactly::<1>(name)?;
            Ok(Value::str(value.repr()))
        }
        Builtin::Int => {
            args.no_keywords(name)?;
            match args.between(name, 0, 1)?.first() {
                None => Ok(Value::Int(0)),
                Some(value) => to_int(value),
            }
        }
        Builtin::Float => {
            args.no_keywords(name)?;
            match args.between(name, 0, 1)?.first() {
                None => Ok(Value::Float(0.0)),
                Some(value) => to_float(value),
            }
        }
        Builtin::Bool => {
            args.no_keywords(name)?;
            let value = args.between(name, 0, 1)?.first().is_some_and(Value::truthy);
            Ok(Value::Bool(value))
        }
        Builtin::List => {
            args.no_keywords(name)?;
            Ok(match args.between(name, 0, 1)?.first() {
                Some(iterable) => Value::list(ops::iterate(iterable)?.collect()),
                None => Value::list(Vec::new()),
            })
        }
        Builtin::Range => {
            args.no_keywords(name)?;
            let args = args.between(name, 1, 3)?;
            Ok(Value::Range(ops::make_range(&args)?))
        }
        Builtin::Abs => {
            args.no_keywords(name)?;
            let [value] = args.exactly::<1>(name)?;
            match value.as_number() {
                Some(Number::Int(n)) => n
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| Exception::overflow("integer result too large")),
                Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
                None => Err(Exception::type_error(format!(
                    "bad operand type for abs(): '{}'",
                    value.type_name()
                ))),
            }
        }
        Builtin::Min => extremum(args, name, Ordering::Less),
        Builtin::Max => extremum(args, name, Ordering::Greater),
        Builtin::Sum => {
            let keyword_start = args.take_keyword("start");
            args.reject_keywords(name)?;
            let mut positional = args.between(name, 1, 2)?.into_iter();
            let iterable = positional.next().unwrap_or(Value::None);
            let mut total = positional
                .next()
                .or(keyword_start)
                .unwrap_or(Value::Int(0));
            if matches!(total, Value::Str(_)) {
                return Err(Exception::type_error(
                    "sum() can't sum strings [use ''.join(seq) instead]",
                ));
            }
            for item in ops::iterate(&iterable)? {
                total = ops::binary(BinOp::Add, &total, &item)?;
            }
            Ok(total)
        }
        Builtin::Round => {
            let keyword_digits = args.take_keyword("ndigits");
            args.reject_keywords(name)?;
            let mut positional = args.between(name, 1, 2)?.into_iter();
            let value = positional.next().unwrap_or(Value::None);
            let digits = match positional.next().or(keyword_digits) {
                None | Some(Value::None) => None,
                Some(digits) => Some(digits.as_index().ok_or_else(|| {
                    Exception::type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        digits.type_name()
                    ))
                })?),
            };
            round(&value, digits)
        }
        Builtin::Sorted => {
            let reverse = args.take_keyword("reverse").is_some_and(|r| r.truthy());
            args.reject_keywords(name)?;
            let [iterable] = args.exactly::<1>(name)?;
            let mut items: Vec<Value> = ops::iterate(&iterable)?.collect();
            sort_values(&mut items, reverse)?;
            Ok(Value::list(items))
        }
        Builtin::Exception(kind) => {
            args.no_keywords(name)?;
            let message = match args.positional.as_slice() {
                [] => String::new(),
                [arg] if kind == ExceptionKind::KeyError => arg.repr(),
                [arg] => arg.to_str(),
                _ => Value::tuple(args.positional.clone()).repr(),
            };
            Ok(Value::from(Exception::new(kind, message)))
        }
        Builtin::MathSqrt => {
            args.no_keywords(name)?;
            let [value] = args.exactly::<1>(name)?;
            let x = expect_number(name, &value)?.as_f64();
            if x < 0.0 {
                return Err(Exception::value_error("math domain error"));
            }
            Ok(Value::Float(x.sqrt()))
        }
        Builtin::MathFloor | Builtin::MathCeil => {
            args.no_keywords(name)?;
            let [value] = args.exactly::<1>(name)?;
            match expect_number(name, &value)? {
                Number::Int(n) => Ok(Value::Int(n)),
                Number::Float(f) if builtin == Builtin::MathFloor => float_to_int(f.floor()).map(Value::Int),
                Number::Float(f) => float_to_int(f.ceil()).map(Value::Int),
            }
        }
        Builtin::HostText | Builtin::HostImage => {
            args.no_keywords(name)?;
            let [value] = args.exactly::<1>(name)?;
            let host = env
                .host
                .as_ref()
                .ok_or_else(|| Exception::new(ExceptionKind::RuntimeError, "no host attached"))?;
            if builtin == Builtin::HostText {
                host.send_text(&value.to_str());
            } else {
                let Value::Str(data) = &value else {
                    return Err(Exception::type_error(format!(
                        "image() argument must be str, not {}",
                        value.type_name()
                    )));
                };
                host.send_image(data);
            }
            Ok(Value::None)
        }
    }
}

fn text_keyword(args: &mut CallArgs, name: &str, default: &str) -> EvalResult<String> {
    match args.take_keyword(name) {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(s)) => Ok(s.to_string()),
        Some(other) => Err(Exception::type_error(format!(
            "{} must be None or a string, not {}",
            name,
            other.type_name()
        ))),
    }
}

fn to_int(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => float_to_int(*f).map(Value::Int),
        Value::Str(s) => {
            let digits = s.trim().replace('_', "");
            digits.parse::<i64>().map(Value::Int).map_err(|_| {
                Exception::value_error(format!(
                    "invalid literal for int() with base 10: {}",
                    string_repr(s)
                ))
            })
        }
        other => Err(Exception::type_error(format!(
            "int() argument must be a string or a real number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            Exception::value_error(format!(
                "could not convert string to float: {}",
                string_repr(s)
            ))
        }),
        other => match other.as_number() {
            Some(n) => Ok(Value::Float(n.as_f64())),
            None => Err(Exception::type_error(format!(
                "float() argument must be a string or a real number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

fn round(value: &Value, digits: Option<i64>) -> EvalResult<Value> {
    match (expect_number("round", value)?, digits) {
        (Number::Int(n), _) => Ok(Value::Int(n)),
        (Number::Float(f), None) => float_to_int(f.round_ties_even()).map(Value::Int),
        (Number::Float(f), Some(digits)) => {
            let digits = i32::try_from(digits.clamp(-308, 308)).unwrap_or(0);
            let scale = 10f64.powi(digits);
            let rounded = (f * scale).round_ties_even() / scale;
            Ok(Value::Float(if rounded.is_finite() { rounded } else { f }))
        }
    }
}

/// Smallest (`Less`) or largest (`Greater`) of an iterable or of the arguments.
fn extremum(mut args: CallArgs, name: &str, wanted: Ordering) -> EvalResult<Value> {
    let default = args.take_keyword("default");
    args.reject_keywords(name)?;
    let items: Vec<Value> = match args.positional.len() {
        0 => {
            return Err(Exception::type_error(format!(
                "{} expected at least 1 argument, got 0",
                name
            )))
        }
        1 => ops::iterate(&args.positional[0])?.collect(),
        _ => args.positional,
    };

    let op = if wanted == Ordering::Less { CmpOp::Lt } else { CmpOp::Gt };
    let mut items = items.into_iter();
    let Some(mut best) = items.next() else {
        return default.ok_or_else(|| {
            Exception::value_error(format!("{}() iterable argument is empty", name))
        });
    };
    for item in items {
        if ops::order(op, &item, &best)? == wanted {
            best = item;
        }
    }
    Ok(best)
}

/// Stable sort by Python ordering; the first failed comparison is reported.
pub fn sort_values(items: &mut [Value], reverse: bool) -> EvalResult<()> {
    let mut error = None;
    items.sort_by(|a, b| {
        let (left, right) = if reverse { (b, a) } else { (a, b) };
        match ops::order(CmpOp::Lt, left, right) {
            Ok(ordering) => ordering,
            Err(exc) => {
                error.get_or_insert(exc);
                Ordering::Equal
            }
        }
    });
    match error {
        Some(exc) => Err(exc),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_finds_functions_and_exception_types() {
        assert!(matches!(lookup("print"), Some(Value::Builtin(Builtin::Print))));
        assert!(matches!(
            lookup("ValueError"),
            Some(Value::Builtin(Builtin::Exception(ExceptionKind::ValueError)))
        ));
        assert!(lookup("sqrt").is_none());
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_exactly_reports_arity() {
        let err = CallArgs::positional(vec![Value::Int(1), Value::Int(2)])
            .exactly::<1>("len")
            .unwrap_err();
        assert_eq!(err.message, "len() takes exactly one argument (2 given)");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(to_int(&Value::str(" 42 ")).unwrap(), Value::Int(42));
        assert_eq!(to_int(&Value::Float(-2.7)).unwrap(), Value::Int(-2));
        assert_eq!(
            to_int(&Value::str("abc")).unwrap_err().to_string(),
            "ValueError: invalid literal for int() with base 10: 'abc'"
        );
        assert_eq!(to_float(&Value::str("1e3")).unwrap(), Value::Float(1000.0));
        assert!(to_float(&Value::str("x")).is_err());
    }

    #[test]
    fn test_round_uses_bankers_rounding() {
        assert_eq!(round(&Value::Float(2.5), None).unwrap(), Value::Int(2));
        assert_eq!(round(&Value::Float(3.5), None).unwrap(), Value::Int(4));
        assert_eq!(round(&Value::Float(1.25), Some(1)).unwrap(), Value::Float(1.2));
    }

    #[test]
    fn test_sort_values() {
        let mut items = vec![Value::Int(3), Value::Float(1.5), Value::Int(2)];
        sort_values(&mut items, false).unwrap();
        assert_eq!(items, vec![Value::Float(1.5), Value::Int(2), Value::Int(3)]);
        sort_values(&mut items, true).unwrap();
        assert_eq!(items[0], Value::Int(3));

        let mut mixed = vec![Value::Int(1), Value::str("a")];
        assert!(sort_values(&mut mixed, false).is_err());
    }

    #[test]
    fn test_extremum() {
        let args = CallArgs::positional(vec![Value::Int(4), Value::Int(9), Value::Int(2)]);
        assert_eq!(extremum(args, "max", Ordering::Greater).unwrap(), Value::Int(9));
        let empty = CallArgs::positional(vec![Value::list(vec![])]);
        assert_eq!(
            extremum(empty, "min", Ordering::Less).unwrap_err().message,
            "min() iterable argument is empty"
        );
    }
}
