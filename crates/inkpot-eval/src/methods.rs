//! Methods on builtin values (`str.upper`, `list.append`, ...).

use crate::builtins::CallArgs;
use crate::exception::{EvalResult, Exception};
use crate::ops;
use crate::output::OutputTarget;
use crate::value::Value;

const STR_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "split",
    "join",
    "replace",
    "startswith",
    "endswith",
];
const LIST_METHODS: &[&str] = &["append", "pop", "extend"];
const DICT_METHODS: &[&str] = &["get", "keys", "values", "items"];
const STREAM_METHODS: &[&str] = &["write", "flush"];

pub fn has_method(receiver: &Value, name: &str) -> bool {
    let table = match receiver {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Stream(_) => STREAM_METHODS,
        _ => return false,
    };
    table.contains(&name)
}

fn expect_str<'a>(method: &str, value: &'a Value) -> EvalResult<&'a str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Exception::type_error(format!(
            "{}() argument must be str, not {}",
            method,
            other.type_name()
        ))),
    }
}

pub fn call(output: &OutputTarget, receiver: &Value, name: &str, args: CallArgs) -> EvalResult<Value> {
    args.no_keywords(name)?;
    match receiver {
        Value::Str(s) => call_str(s, name, args),
        Value::List(_) => call_list(receiver, name, args),
        Value::Dict(_) => call_dict(receiver, name, args),
        Value::Stream(stream) => match name {
            "write" => {
                let [text] = args.exactly::<1>(name)?;
                let text = expect_str(name, &text)?;
                output.write(*stream, text);
                Ok(Value::Int(text.chars().count() as i64))
            }
            _ => {
                args.exactly::<0>(name)?;
                Ok(Value::None)
            }
        },
        other => Err(Exception::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            other.type_name(),
            name
        ))),
    }
}

fn call_str(s: &str, name: &str, args: CallArgs) -> EvalResult<Value> {
    match name {
        "upper" => {
            args.exactly::<0>(name)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            args.exactly::<0>(name)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" => match args.between(name, 0, 1)?.first() {
            None | Some(Value::None) => Ok(Value::str(s.trim())),
            Some(chars) => {
                let chars = expect_str(name, chars)?;
                Ok(Value::str(s.trim_matches(|c| chars.contains(c))))
            }
        },
        "split" => {
            let parts: Vec<Value> = match args.between(name, 0, 1)?.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = expect_str(name, sep)?;
                    if sep.is_empty() {
                        return Err(Exception::value_error("empty separator"));
                    }
                    s.split(sep).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            let [items] = args.exactly::<1>(name)?;
            let mut parts = Vec::new();
            for (i, item) in ops::iterate(&items)?.enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(Exception::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            i,
                            other.type_name()
                        )))
                    }
                }
            }
            let parts: Vec<&str> = parts.iter().map(|p| &**p).collect();
            Ok(Value::str(parts.join(s)))
        }
        "replace" => {
            let [old, new] = args.exactly::<2>(name)?;
            Ok(Value::str(s.replace(expect_str(name, &old)?, expect_str(name, &new)?)))
        }
        "startswith" => {
            let [prefix] = args.exactly::<1>(name)?;
            Ok(Value::Bool(s.starts_with(expect_str(name, &prefix)?)))
        }
        _ => {
            let [suffix] = args.exactly::<1>(name)?;
            Ok(Value::Bool(s.ends_with(expect_str(name, &suffix)?)))
        }
    }
}

fn call_list(receiver: &Value, name: &str, args: CallArgs) -> EvalResult<Value> {
    let Value::List(items) = receiver else {
        return Ok(Value::None);
    };
    match name {
        "append" => {
            let [item] = args.exactly::<1>(name)?;
            items.borrow_mut().push(item);
            Ok(Value::None)
        }
        "extend" => {
            let [more] = args.exactly::<1>(name)?;
            let more: Vec<Value> = ops::iterate(&more)?.collect();
            items.borrow_mut().extend(more);
            Ok(Value::None)
        }
        _ => {
            let index = match args.between(name, 0, 1)?.first() {
                None => None,
                Some(index) => Some(index.as_index().ok_or_else(|| {
                    Exception::type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        index.type_name()
                    ))
                })?),
            };
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(Exception::index_error("pop from empty list"));
            }
            let i = index.unwrap_or(-1);
            let i = ops::normalize_index(i, items.len())
                .ok_or_else(|| Exception::index_error("pop index out of range"))?;
            Ok(items.remove(i))
        }
    }
}

fn call_dict(receiver: &Value, name: &str, args: CallArgs) -> EvalResult<Value> {
    let Value::Dict(dict) = receiver else {
        return Ok(Value::None);
    };
    match name {
        "get" => {
            let mut args = args.between(name, 1, 2)?.into_iter();
            let key = args.next().unwrap_or(Value::None);
            let default = args.next().unwrap_or(Value::None);
            key.check_hashable()?;
            Ok(dict.borrow().get(&key).cloned().unwrap_or(default))
        }
        "keys" => {
            args.exactly::<0>(name)?;
            Ok(Value::list(dict.borrow().keys()))
        }
        "values" => {
            args.exactly::<0>(name)?;
            Ok(Value::list(dict.borrow().values()))
        }
        _ => {
            args.exactly::<0>(name)?;
            Ok(Value::list(dict.borrow().items()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NullSink;
    use crate::value::Dict;

    fn call_with(receiver: &Value, name: &str, positional: Vec<Value>) -> EvalResult<Value> {
        call(
            &OutputTarget::new(NullSink),
            receiver,
            name,
            CallArgs::positional(positional),
        )
    }

    #[test]
    fn test_string_methods() {
        let s = Value::str("  Ada Lovelace ");
        assert_eq!(call_with(&s, "strip", vec![]).unwrap(), Value::str("Ada Lovelace"));
        assert_eq!(
            call_with(&s, "split", vec![]).unwrap(),
            Value::list(vec![Value::str("Ada"), Value::str("Lovelace")])
        );
        let joined = call_with(
            &Value::str("-"),
            "join",
            vec![Value::list(vec![Value::str("a"), Value::str("b")])],
        )
        .unwrap();
        assert_eq!(joined, Value::str("a-b"));
    }

    #[test]
    fn test_join_rejects_non_strings() {
        let err = call_with(&Value::str(","), "join", vec![Value::list(vec![Value::Int(1)])]).unwrap_err();
        assert_eq!(err.message, "sequence item 0: expected str instance, int found");
    }

    #[test]
    fn test_list_methods_mutate_shared_list() {
        let list = Value::list(vec![]);
        call_with(&list, "append", vec![Value::Int(1)]).unwrap();
        call_with(&list, "extend", vec![Value::tuple(vec![Value::Int(2), Value::Int(3)])]).unwrap();
        assert_eq!(call_with(&list, "pop", vec![]).unwrap(), Value::Int(3));
        assert_eq!(call_with(&list, "pop", vec![Value::Int(0)]).unwrap(), Value::Int(1));
        assert_eq!(list, Value::list(vec![Value::Int(2)]));

        let empty = Value::list(vec![]);
        assert_eq!(
            call_with(&empty, "pop", vec![]).unwrap_err().to_string(),
            "IndexError: pop from empty list"
        );
    }

    #[test]
    fn test_dict_get_with_default() {
        let mut dict = Dict::new();
        dict.insert(Value::str("a"), Value::Int(1)).unwrap();
        let dict = Value::dict(dict);
        assert_eq!(call_with(&dict, "get", vec![Value::str("a")]).unwrap(), Value::Int(1));
        assert_eq!(
            call_with(&dict, "get", vec![Value::str("b"), Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
        assert_eq!(
            call_with(&dict, "items", vec![]).unwrap(),
            Value::list(vec![Value::tuple(vec![Value::str("a"), Value::Int(1)])])
        );
    }

    #[test]
    fn test_has_method() {
        assert!(has_method(&Value::str(""), "upper"));
        assert!(!has_method(&Value::str(""), "append"));
        assert!(!has_method(&Value::Int(1), "upper"));
    }
}
