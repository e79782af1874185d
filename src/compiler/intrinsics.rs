//! Standard globals available to every component.
//!
//! Anything not installed here (timers, `fetch`, `window`, `Date`, ...) is an
//! undefined reference and fails when evaluated.

use super::interpreter::{own_keys, Flow, Interpreter, Interrupt};
use super::scope::Scope;
use super::value::{
    check_array_length, from_json, string_to_number, to_json, Function, PropertyMap, Value,
};
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log target for `console.*` calls made by authored code.
pub const CONSOLE_TARGET: &str = "panelkit::component";

pub fn install(scope: &Rc<Scope>) {
    scope.define("undefined", Value::Undefined, false);
    scope.define("NaN", Value::Number(f64::NAN), false);
    scope.define("Infinity", Value::Number(f64::INFINITY), false);
    scope.define("Math", math(), false);
    scope.define("JSON", json(), false);
    scope.define("Object", object(), false);
    scope.define("Array", array(), false);
    scope.define("String", string(), false);
    scope.define("Number", number(), false);
    scope.define(
        "Boolean",
        Value::native("Boolean", |_, args| Ok(Value::Bool(first(args).truthy()))),
        false,
    );
    scope.define("parseInt", Value::native("parseInt", parse_int), false);
    scope.define("parseFloat", Value::native("parseFloat", parse_float), false);
    scope.define(
        "isNaN",
        Value::native("isNaN", |_, args| Ok(Value::Bool(first(args).to_number().is_nan()))),
        false,
    );
    scope.define(
        "isFinite",
        Value::native("isFinite", |_, args| {
            Ok(Value::Bool(first(args).to_number().is_finite()))
        }),
        false,
    );
    scope.define("console", console(), false);
}

fn first(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or_default()
}

fn namespace(entries: Vec<(&str, Value)>) -> Value {
    let mut map = PropertyMap::new();
    for (name, value) in entries {
        map.set(name, value);
    }
    Value::object(map)
}

/// Attach static members to a callable global such as `Number`.
fn with_statics(callable: Value, entries: Vec<(&str, Value)>) -> Value {
    if let Value::Function(f) = &callable {
        let f: &Function = f;
        let mut props = f.props.borrow_mut();
        for (name, value) in entries {
            props.set(name, value);
        }
    }
    callable
}

fn unary_math(name: &'static str, op: fn(f64) -> f64) -> (&'static str, Value) {
    (
        name,
        Value::native(name, move |_, args| Ok(Value::Number(op(first(args).to_number())))),
    )
}

fn math() -> Value {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x2545_f491_4f6c_dd1d)
        | 1;
    let state = Rc::new(Cell::new(seed));
    namespace(vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        unary_math("abs", f64::abs),
        unary_math("ceil", f64::ceil),
        unary_math("floor", f64::floor),
        unary_math("round", |x| (x + 0.5).floor()),
        unary_math("trunc", f64::trunc),
        unary_math("sign", |x| if x.is_nan() || x == 0.0 { x } else { x.signum() }),
        unary_math("sqrt", f64::sqrt),
        unary_math("cbrt", f64::cbrt),
        unary_math("exp", f64::exp),
        unary_math("log", f64::ln),
        unary_math("log2", f64::log2),
        unary_math("log10", f64::log10),
        unary_math("sin", f64::sin),
        unary_math("cos", f64::cos),
        unary_math("tan", f64::tan),
        unary_math("atan", f64::atan),
        (
            "atan2",
            Value::native("atan2", |_, args| {
                let (y, x) = (first(args).to_number(), nth(args, 1).to_number());
                Ok(Value::Number(y.atan2(x)))
            }),
        ),
        (
            "pow",
            Value::native("pow", |_, args| {
                Ok(Value::Number(first(args).to_number().powf(nth(args, 1).to_number())))
            }),
        ),
        (
            "hypot",
            Value::native("hypot", |_, args| {
                Ok(Value::Number(
                    args.iter().map(|a| a.to_number().powi(2)).sum::<f64>().sqrt(),
                ))
            }),
        ),
        (
            "min",
            Value::native("min", |_, args| Ok(Value::Number(fold_extreme(args, f64::INFINITY, f64::min)))),
        ),
        (
            "max",
            Value::native("max", |_, args| {
                Ok(Value::Number(fold_extreme(args, f64::NEG_INFINITY, f64::max)))
            }),
        ),
        (
            "random",
            Value::native("random", move |_, _| {
                // xorshift64*
                let mut x = state.get();
                x ^= x >> 12;
                x ^= x << 25;
                x ^= x >> 27;
                state.set(x);
                let bits = x.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
                Ok(Value::Number(bits as f64 / (1u64 << 53) as f64))
            }),
        ),
    ])
}

fn nth(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn fold_extreme(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

fn json() -> Value {
    namespace(vec![
        (
            "stringify",
            Value::native("stringify", |_, args| {
                let Some(json) = to_json(&first(args)) else {
                    return Ok(Value::Undefined);
                };
                let indent = match nth(args, 2) {
                    Value::Number(n) if n >= 1.0 => " ".repeat(n.min(10.0) as usize),
                    Value::Str(s) => s.chars().take(10).collect(),
                    _ => String::new(),
                };
                stringify(&json, &indent).map(Value::string)
            }),
        ),
        (
            "parse",
            Value::native("parse", |_, args| {
                let text = first(args).to_js_string();
                serde_json::from_str::<serde_json::Value>(&text)
                    .map(|json| from_json(&json))
                    .map_err(|e| Interrupt::syntax_error(format!("JSON.parse: {}", e)))
            }),
        ),
    ])
}

fn stringify(json: &serde_json::Value, indent: &str) -> Flow<String> {
    if indent.is_empty() {
        return Ok(json.to_string());
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut serializer)
        .map_err(|e| Interrupt::type_error(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| Interrupt::type_error(e.to_string()))
}

fn object() -> Value {
    let callable = Value::native("Object", |_, args| {
        Ok(match first(args) {
            v @ (Value::Object(_) | Value::Array(_) | Value::Function(_)) => v,
            _ => Value::object(PropertyMap::new()),
        })
    });
    with_statics(
        callable,
        vec![
            (
                "keys",
                Value::native("keys", |_, args| {
                    Ok(Value::array(own_keys(&first(args)).into_iter().map(Value::Str).collect()))
                }),
            ),
            (
                "values",
                Value::native("values", |interp, args| {
                    let target = first(args);
                    let values = own_keys(&target)
                        .iter()
                        .map(|k| interp.get_property(&target, k))
                        .collect::<Flow<Vec<_>>>()?;
                    Ok(Value::array(values))
                }),
            ),
            (
                "entries",
                Value::native("entries", |interp, args| {
                    let target = first(args);
                    let entries = own_keys(&target)
                        .into_iter()
                        .map(|k| {
                            let v = interp.get_property(&target, &k)?;
                            Ok(Value::array(vec![Value::Str(k), v]))
                        })
                        .collect::<Flow<Vec<_>>>()?;
                    Ok(Value::array(entries))
                }),
            ),
            (
                "assign",
                Value::native("assign", |interp, args| {
                    let target = first(args);
                    let Value::Object(map) = &target else {
                        return Err(Interrupt::type_error("Object.assign target must be an object"));
                    };
                    for source in args.iter().skip(1) {
                        for key in own_keys(source) {
                            let value = interp.get_property(source, &key)?;
                            map.borrow_mut().set(&key, value);
                        }
                    }
                    Ok(target.clone())
                }),
            ),
            (
                "fromEntries",
                Value::native("fromEntries", |interp, args| {
                    let mut map = PropertyMap::new();
                    for entry in interp.iterate(&first(args))? {
                        let key = interp.get_property(&entry, "0")?.to_property_key();
                        let value = interp.get_property(&entry, "1")?;
                        map.set(&key, value);
                    }
                    Ok(Value::object(map))
                }),
            ),
            ("freeze", Value::native("freeze", |_, args| Ok(first(args)))),
        ],
    )
}

fn array() -> Value {
    let callable = Value::native("Array", |_, args| {
        Ok(match args {
            [Value::Number(n)] => {
                if *n < 0.0 || n.fract() != 0.0 || *n > u32::MAX as f64 {
                    return Err(Interrupt::range_error("Invalid array length"));
                }
                check_array_length(*n as usize)?;
                Value::array(vec![Value::Undefined; *n as usize])
            }
            items => Value::array(items.to_vec()),
        })
    });
    with_statics(
        callable,
        vec![
            (
                "isArray",
                Value::native("isArray", |_, args| {
                    Ok(Value::Bool(matches!(first(args), Value::Array(_))))
                }),
            ),
            ("of", Value::native("of", |_, args| Ok(Value::array(args.to_vec())))),
            ("from", Value::native("from", array_from)),
        ],
    )
}

fn array_from(interp: &mut Interpreter, args: &[Value]) -> Flow<Value> {
    let source = first(args);
    let items = match &source {
        Value::Array(_) | Value::Str(_) => interp.iterate(&source)?,
        Value::Object(_) => {
            let len = interp.get_property(&source, "length")?.to_number();
            let len = if len.is_finite() && len > 0.0 { len as usize } else { 0 };
            check_array_length(len)?;
            (0..len)
                .map(|i| interp.get_property(&source, &i.to_string()))
                .collect::<Flow<Vec<_>>>()?
        }
        _ => Vec::new(),
    };
    let map = nth(args, 1);
    if !map.is_function() {
        return Ok(Value::array(items));
    }
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        out.push(interp.call_function(&map, vec![item, Value::Number(i as f64)])?);
    }
    Ok(Value::array(out))
}

fn string() -> Value {
    Value::native("String", |_, args| {
        Ok(Value::string(match args.first() {
            Some(v) => v.to_js_string(),
            None => String::new(),
        }))
    })
}

fn number() -> Value {
    let callable = Value::native("Number", |_, args| {
        Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    });
    with_statics(
        callable,
        vec![
            ("MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0)),
            ("MIN_SAFE_INTEGER", Value::Number(-9_007_199_254_740_991.0)),
            ("EPSILON", Value::Number(f64::EPSILON)),
            (
                "isFinite",
                Value::native("isFinite", |_, args| {
                    Ok(Value::Bool(matches!(first(args), Value::Number(n) if n.is_finite())))
                }),
            ),
            (
                "isNaN",
                Value::native("isNaN", |_, args| {
                    Ok(Value::Bool(matches!(first(args), Value::Number(n) if n.is_nan())))
                }),
            ),
            (
                "isInteger",
                Value::native("isInteger", |_, args| {
                    Ok(Value::Bool(
                        matches!(first(args), Value::Number(n) if n.is_finite() && n.fract() == 0.0),
                    ))
                }),
            ),
            ("parseFloat", Value::native("parseFloat", parse_float)),
            ("parseInt", Value::native("parseInt", parse_int)),
        ],
    )
}

fn parse_int(_: &mut Interpreter, args: &[Value]) -> Flow<Value> {
    let text = first(args).to_js_string();
    let mut s = text.trim_start();
    let negative = s.starts_with('-');
    if s.starts_with('-') || s.starts_with('+') {
        s = &s[1..];
    }
    let mut radix = match nth(args, 1) {
        Value::Undefined => 0,
        other => {
            let r = other.to_number();
            if r.is_nan() {
                0
            } else {
                r.trunc() as u32
            }
        }
    };
    if radix == 0 || radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let digits: Vec<u32> = s.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let value = digits
        .iter()
        .fold(0.0, |acc, d| acc * radix as f64 + *d as f64);
    Ok(Value::Number(if negative { -value } else { value }))
}

fn parse_float(_: &mut Interpreter, args: &[Value]) -> Flow<Value> {
    let text = first(args).to_js_string();
    let s = text.trim_start();
    for prefix in ["Infinity", "+Infinity", "-Infinity"] {
        if s.starts_with(prefix) {
            return Ok(Value::Number(string_to_number(prefix)));
        }
    }
    // Longest prefix that parses as a decimal literal.
    let candidate: String = s
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        .collect();
    let value = (1..=candidate.len())
        .rev()
        .filter_map(|end| candidate[..end].parse::<f64>().ok())
        .next()
        .unwrap_or(f64::NAN);
    Ok(Value::Number(value))
}

fn console_line(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::Object(map) if map.borrow().contains_key("message") => arg.to_js_string(),
            Value::Object(_) | Value::Array(_) => to_json(arg)
                .map(|json| json.to_string())
                .unwrap_or_else(|| arg.to_js_string()),
            other => other.to_js_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn console() -> Value {
    namespace(vec![
        (
            "log",
            Value::native("log", |_, args| {
                tracing::info!(target: CONSOLE_TARGET, "{}", console_line(args));
                Ok(Value::Undefined)
            }),
        ),
        (
            "info",
            Value::native("info", |_, args| {
                tracing::info!(target: CONSOLE_TARGET, "{}", console_line(args));
                Ok(Value::Undefined)
            }),
        ),
        (
            "debug",
            Value::native("debug", |_, args| {
                tracing::debug!(target: CONSOLE_TARGET, "{}", console_line(args));
                Ok(Value::Undefined)
            }),
        ),
        (
            "warn",
            Value::native("warn", |_, args| {
                tracing::warn!(target: CONSOLE_TARGET, "{}", console_line(args));
                Ok(Value::Undefined)
            }),
        ),
        (
            "error",
            Value::native("error", |_, args| {
                tracing::error!(target: CONSOLE_TARGET, "{}", console_line(args));
                Ok(Value::Undefined)
            }),
        ),
    ])
}
