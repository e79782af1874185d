//! Runtime values and the coercion rules between them.

use super::ast::{FunctionDef, Name};
use super::interpreter::{Interpreter, Interrupt};
use super::scope::Scope;
use super::tree::Node;
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Host function callable from authored code.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, Interrupt>>;

/// Insertion-ordered property bag.
#[derive(Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(Name, Value)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| &**k == key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key.into(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| &**k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Name, Value)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (Name, Value)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.set(&k, v);
        }
        map
    }
}

pub enum FunctionKind {
    Closure { def: Rc<FunctionDef>, scope: Rc<Scope> },
    Native { name: Name, call: NativeFn },
    /// A builtin method looked up on a primitive, array or plain object.
    Method { receiver: Value, name: Name },
}

pub struct Function {
    pub kind: FunctionKind,
    /// Static members, e.g. `Number.isFinite`.
    pub props: RefCell<PropertyMap>,
}

impl Function {
    pub fn name(&self) -> String {
        match &self.kind {
            FunctionKind::Closure { def, .. } => def
                .name
                .as_deref()
                .unwrap_or("anonymous")
                .to_string(),
            FunctionKind::Native { name, .. } | FunctionKind::Method { name, .. } => {
                name.to_string()
            }
        }
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<PropertyMap>>),
    Function(Rc<Function>),
    /// A rendered element produced by `createElement`.
    Element(Node),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Function(func) => write!(f, "[function {}]", func.name()),
            Value::Element(node) => write!(f, "{}", node.to_json()),
            other => match to_json(other) {
                Some(json) => write!(f, "{}", json),
                None => f.write_str("undefined"),
            },
        }
    }
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(map: PropertyMap) -> Value {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn native(
        name: &str,
        call: impl Fn(&mut Interpreter, &[Value]) -> Result<Value, Interrupt> + 'static,
    ) -> Value {
        Value::Function(Rc::new(Function {
            kind: FunctionKind::Native {
                name: name.into(),
                call: Rc::new(call),
            },
            props: RefCell::new(PropertyMap::new()),
        }))
    }

    pub fn method(receiver: Value, name: &str) -> Value {
        Value::Function(Rc::new(Function {
            kind: FunctionKind::Method {
                receiver,
                name: name.into(),
            },
            props: RefCell::new(PropertyMap::new()),
        }))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
            Value::Array(_) | Value::Object(_) | Value::Element(_) => "object",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_js_string()),
            _ => f64::NAN,
        }
    }

    /// `String(value)`.
    pub fn to_js_string(&self) -> String {
        display(self, 0)
    }

    /// Key used for property access.
    pub fn to_property_key(&self) -> Rc<str> {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_js_string().into(),
        }
    }
}

fn display(value: &Value, depth: usize) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::Str(s) => s.to_string(),
        Value::Array(items) => {
            if depth > 16 {
                return String::new();
            }
            items
                .borrow()
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        display(v, depth + 1)
                    }
                })
                .collect::<Vec<_>>()
                .join(",")
        }
        Value::Object(map) => {
            let map = map.borrow();
            match (map.get("name"), map.get("message")) {
                (Some(Value::Str(name)), Some(Value::Str(message))) if name.ends_with("Error") => {
                    if message.is_empty() {
                        name.to_string()
                    } else {
                        format!("{}: {}", name, message)
                    }
                }
                _ => "[object Object]".to_string(),
            }
        }
        Value::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
        Value::Element(_) => "[object Object]".to_string(),
    }
}

/// JavaScript `Number.prototype.toString()` formatting.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        if n.fract() == 0.0 {
            return format!("{:.0}", n);
        }
        return format!("{}", n);
    }
    let exp = format!("{:e}", n);
    match exp.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
        _ => exp,
    }
}

pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    if !t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    t.parse().unwrap_or(f64::NAN)
}

fn ptr_eq(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => Some(Rc::ptr_eq(x, y)),
        (Value::Object(x), Value::Object(y)) => Some(Rc::ptr_eq(x, y)),
        (Value::Function(x), Value::Function(y)) => Some(Rc::ptr_eq(x, y)),
        (Value::Element(x), Value::Element(y)) => Some(x.same(y)),
        _ => None,
    }
}

/// `===`
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => ptr_eq(a, b).unwrap_or(false),
    }
}

/// `==`
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (x, y) if x.is_nullish() && y.is_nullish() => true,
        (x, _) | (_, x) if x.is_nullish() => false,
        (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => {
            a.to_number() == b.to_number()
        }
        (Value::Bool(_), _) => loose_equals(&Value::Number(a.to_number()), b),
        (_, Value::Bool(_)) => loose_equals(a, &Value::Number(b.to_number())),
        (Value::Array(_) | Value::Object(_), Value::Str(_) | Value::Number(_)) => {
            loose_equals(&Value::string(a.to_js_string()), b)
        }
        (Value::Str(_) | Value::Number(_), Value::Array(_) | Value::Object(_)) => {
            loose_equals(a, &Value::string(b.to_js_string()))
        }
        _ => strict_equals(a, b),
    }
}

/// `Object.is`, used for hook dependency and state comparison.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || x.to_bits() == y.to_bits()
        }
        _ => strict_equals(a, b),
    }
}

/// Longest string authored code may build, in bytes.
pub const MAX_STRING_LENGTH: usize = 1 << 24;
/// Longest array authored code may build.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

pub fn check_string_length(len: usize) -> Result<(), Interrupt> {
    if len > MAX_STRING_LENGTH {
        return Err(Interrupt::range_error("Invalid string length"));
    }
    Ok(())
}

pub fn check_array_length(len: usize) -> Result<(), Interrupt> {
    if len > MAX_ARRAY_LENGTH {
        return Err(Interrupt::range_error("Invalid array length"));
    }
    Ok(())
}

pub fn error_value(kind: &str, message: impl Into<String>) -> Value {
    let mut map = PropertyMap::new();
    map.set("name", Value::string(kind));
    map.set("message", Value::string(message.into()));
    Value::object(map)
}

pub fn from_json(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Value::string(s.as_str()),
        JsonValue::Array(items) => Value::array(items.iter().map(from_json).collect()),
        JsonValue::Object(map) => Value::object(
            map.iter()
                .map(|(k, v)| (Name::from(k.as_str()), from_json(v)))
                .collect(),
        ),
    }
}

pub fn number_to_json(n: f64) -> JsonValue {
    if !n.is_finite() {
        return JsonValue::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return JsonValue::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// `JSON.stringify` semantics: `None` for values JSON cannot carry.
pub fn to_json(value: &Value) -> Option<JsonValue> {
    to_json_depth(value, 0)
}

fn to_json_depth(value: &Value, depth: usize) -> Option<JsonValue> {
    if depth > 64 {
        return Some(JsonValue::Null);
    }
    Some(match value {
        Value::Undefined | Value::Function(_) => return None,
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::Str(s) => JsonValue::String(s.to_string()),
        Value::Array(items) => JsonValue::Array(
            items
                .borrow()
                .iter()
                .map(|v| to_json_depth(v, depth + 1).unwrap_or(JsonValue::Null))
                .collect(),
        ),
        Value::Object(map) => JsonValue::Object(
            map.borrow()
                .iter()
                .filter_map(|(k, v)| to_json_depth(v, depth + 1).map(|j| (k.to_string(), j)))
                .collect(),
        ),
        Value::Element(node) => node.to_json(),
    })
}
