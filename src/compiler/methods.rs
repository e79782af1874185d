//! Builtin methods on strings, numbers, arrays and plain objects.

use super::interpreter::{Flow, Interpreter, Interrupt};
use super::value::{
    check_array_length, check_string_length, number_to_string, same_value, strict_equals, Value,
};
use std::cmp::Ordering;

const STRING_METHODS: &[&str] = &[
    "at",
    "charAt",
    "charCodeAt",
    "concat",
    "endsWith",
    "includes",
    "indexOf",
    "lastIndexOf",
    "localeCompare",
    "padEnd",
    "padStart",
    "repeat",
    "replace",
    "replaceAll",
    "slice",
    "split",
    "startsWith",
    "substring",
    "toLowerCase",
    "toString",
    "toUpperCase",
    "trim",
    "trimEnd",
    "trimStart",
];

const ARRAY_METHODS: &[&str] = &[
    "at",
    "concat",
    "every",
    "fill",
    "filter",
    "find",
    "findIndex",
    "findLast",
    "flat",
    "flatMap",
    "forEach",
    "includes",
    "indexOf",
    "join",
    "lastIndexOf",
    "map",
    "pop",
    "push",
    "reduce",
    "reverse",
    "shift",
    "slice",
    "some",
    "sort",
    "splice",
    "toString",
    "unshift",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toLocaleString", "toString"];

pub(crate) fn is_string_method(name: &str) -> bool {
    STRING_METHODS.contains(&name)
}

pub(crate) fn is_array_method(name: &str) -> bool {
    ARRAY_METHODS.contains(&name)
}

pub(crate) fn is_number_method(name: &str) -> bool {
    NUMBER_METHODS.contains(&name)
}

pub(crate) fn is_object_method(name: &str) -> bool {
    matches!(name, "hasOwnProperty" | "toString")
}

pub(crate) fn call_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Flow<Value> {
    match receiver {
        Value::Str(s) => string_method(interp, s, name, args),
        Value::Array(_) => array_method(interp, receiver, name, args),
        Value::Number(n) => number_method(*n, name, args),
        Value::Object(map) => Ok(match name {
            "hasOwnProperty" => Value::Bool(map.borrow().contains_key(&arg(args, 0).to_property_key())),
            _ => Value::string(receiver.to_js_string()),
        }),
        other => Ok(Value::string(other.to_js_string())),
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Resolve a possibly negative index argument against `len`, clamped to `0..=len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn clamp_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else {
        n.trunc().clamp(0.0, len as f64) as usize
    }
}

fn char_index_of(haystack: &str, byte: usize) -> usize {
    haystack[..byte].chars().count()
}

fn string_method(interp: &mut Interpreter, s: &str, name: &str, args: &[Value]) -> Flow<Value> {
    let chars = || s.chars().collect::<Vec<char>>();
    let text = |i: usize| arg(args, i).to_js_string();
    Ok(match name {
        "toUpperCase" => Value::string(s.to_uppercase()),
        "toLowerCase" => Value::string(s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "trimStart" => Value::string(s.trim_start()),
        "trimEnd" => Value::string(s.trim_end()),
        "toString" => Value::string(s),
        "concat" => {
            let mut out = s.to_string();
            for a in args {
                out.push_str(&a.to_js_string());
                check_string_length(out.len())?;
            }
            Value::string(out)
        }
        "includes" => Value::Bool(s.contains(&*text(0))),
        "startsWith" => Value::Bool(s.starts_with(&*text(0))),
        "endsWith" => Value::Bool(s.ends_with(&*text(0))),
        "indexOf" => {
            let needle = text(0);
            let from = clamp_index(&arg(args, 1), s.chars().count(), 0);
            let start = s.char_indices().nth(from).map_or(s.len(), |(b, _)| b);
            match s[start..].find(&*needle) {
                Some(b) => Value::Number(char_index_of(s, start + b) as f64),
                None => Value::Number(-1.0),
            }
        }
        "lastIndexOf" => match s.rfind(&*text(0)) {
            Some(b) => Value::Number(char_index_of(s, b) as f64),
            None => Value::Number(-1.0),
        },
        "slice" => {
            let chars = chars();
            let start = relative_index(&arg(args, 0), chars.len(), 0);
            let end = relative_index(&arg(args, 1), chars.len(), chars.len());
            Value::string(chars.get(start..end.max(start)).unwrap_or_default().iter().collect::<String>())
        }
        "substring" => {
            let chars = chars();
            let a = clamp_index(&arg(args, 0), chars.len(), 0);
            let b = clamp_index(&arg(args, 1), chars.len(), chars.len());
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::string(chars[start..end].iter().collect::<String>())
        }
        "charAt" => {
            let i = arg(args, 0).to_number();
            let i = if i.is_nan() { 0.0 } else { i.trunc() };
            Value::string(
                (i >= 0.0)
                    .then(|| s.chars().nth(i as usize))
                    .flatten()
                    .map(String::from)
                    .unwrap_or_default(),
            )
        }
        "charCodeAt" => {
            let i = arg(args, 0).to_number();
            let i = if i.is_nan() { 0.0 } else { i.trunc() };
            (i >= 0.0)
                .then(|| s.chars().nth(i as usize))
                .flatten()
                .map_or(Value::Number(f64::NAN), |c| Value::Number(c as u32 as f64))
        }
        "at" => {
            let chars = chars();
            resolve_at(&arg(args, 0), chars.len())
                .map(|i| Value::string(chars[i].to_string()))
                .unwrap_or_default()
        }
        "split" => {
            let separator = arg(args, 0);
            let limit = match arg(args, 1) {
                Value::Undefined => usize::MAX,
                other => other.to_number().max(0.0) as usize,
            };
            let parts: Vec<Value> = match separator {
                Value::Undefined => vec![Value::string(s)],
                sep => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        s.split(&*sep).map(Value::string).collect()
                    }
                }
            };
            Value::array(parts.into_iter().take(limit).collect())
        }
        "repeat" => {
            let count = arg(args, 0).to_number();
            if !(count >= 0.0) || count.is_infinite() {
                return Err(Interrupt::range_error(format!(
                    "Invalid count value: {}",
                    number_to_string(count)
                )));
            }
            check_string_length(s.len().saturating_mul(count as usize))?;
            Value::string(s.repeat(count as usize))
        }
        "padStart" | "padEnd" => {
            let target = arg(args, 0).to_number();
            let filler = match arg(args, 1) {
                Value::Undefined => " ".to_string(),
                other => other.to_js_string(),
            };
            let len = s.chars().count();
            if !(target > len as f64) || filler.is_empty() {
                Value::string(s)
            } else {
                check_string_length(target as usize)?;
                let pad: String = filler.chars().cycle().take(target as usize - len).collect();
                if name == "padStart" {
                    Value::string(format!("{}{}", pad, s))
                } else {
                    Value::string(format!("{}{}", s, pad))
                }
            }
        }
        "replace" | "replaceAll" => {
            let pattern = text(0);
            let replacement = arg(args, 1);
            let mut out = String::new();
            let mut rest = 0;
            let matches: Vec<usize> = if pattern.is_empty() {
                vec![0]
            } else {
                s.match_indices(&*pattern).map(|(b, _)| b).collect()
            };
            let take = if name == "replace" { 1 } else { matches.len() };
            for byte in matches.into_iter().take(take) {
                out.push_str(&s[rest..byte]);
                let piece = if replacement.is_function() {
                    interp
                        .call_function(
                            &replacement,
                            vec![
                                Value::string(pattern.as_str()),
                                Value::Number(char_index_of(s, byte) as f64),
                                Value::string(s),
                            ],
                        )?
                        .to_js_string()
                } else {
                    replacement.to_js_string().replace("$&", &pattern)
                };
                out.push_str(&piece);
                rest = byte + pattern.len();
            }
            out.push_str(&s[rest..]);
            Value::string(out)
        }
        "localeCompare" => Value::Number(match s.cmp(&*text(0)) {
            Ordering::Less => -1.0,
            Ordering::Equal => 0.0,
            Ordering::Greater => 1.0,
        }),
        _ => Value::Undefined,
    })
}

fn resolve_at(index: &Value, len: usize) -> Option<usize> {
    let n = index.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    let i = if n < 0.0 { len as f64 + n } else { n };
    (i >= 0.0 && i < len as f64).then_some(i as usize)
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Flow<Value> {
    Ok(match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
            if !(0.0..=100.0).contains(&digits) {
                return Err(Interrupt::range_error(
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            if !n.is_finite() || n.abs() >= 1e21 {
                Value::string(number_to_string(n))
            } else {
                Value::string(format!("{:.*}", digits as usize, n))
            }
        }
        "toLocaleString" => Value::string(locale_format(n)),
        _ => {
            let radix = match arg(args, 0) {
                Value::Undefined => 10.0,
                other => other.to_number(),
            };
            if !(2.0..=36.0).contains(&radix) {
                return Err(Interrupt::range_error(
                    "toString() radix must be between 2 and 36",
                ));
            }
            Value::string(to_radix(n, radix as u32))
        }
    })
}

fn to_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 || n.abs() > 9_007_199_254_740_991.0 {
        return number_to_string(n);
    }
    let mut value = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let d = (value % radix as u64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        value /= radix as u64;
        if value == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// `en-US` grouping with at most three fraction digits.
fn locale_format(n: f64) -> String {
    if !n.is_finite() {
        return if n.is_nan() { "NaN" } else if n > 0.0 { "∞" } else { "-∞" }.to_string();
    }
    let fixed = format!("{:.3}", n.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let frac = frac_part.trim_end_matches('0');
    let sign = if n < 0.0 && (grouped != "0" || !frac.is_empty()) { "-" } else { "" };
    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    strict_equals(a, b) || same_value(a, b)
}

fn array_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Flow<Value> {
    let Value::Array(cell) = receiver else {
        return Ok(Value::Undefined);
    };
    let snapshot = || cell.borrow().clone();
    let callback = |what: &str| -> Flow<Value> {
        let f = arg(args, 0);
        if f.is_function() {
            Ok(f)
        } else {
            Err(Interrupt::type_error(format!(
                "{} is not a function",
                if what.is_empty() { f.to_js_string() } else { what.to_string() }
            )))
        }
    };
    let call = |interp: &mut Interpreter, f: &Value, item: &Value, i: usize| {
        interp.call_function(f, vec![item.clone(), Value::Number(i as f64), receiver.clone()])
    };

    Ok(match name {
        "push" => {
            let mut items = cell.borrow_mut();
            check_array_length(items.len() + args.len())?;
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        "pop" => cell.borrow_mut().pop().unwrap_or_default(),
        "shift" => {
            let mut items = cell.borrow_mut();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            let mut items = cell.borrow_mut();
            check_array_length(items.len() + args.len())?;
            for (i, a) in args.iter().enumerate() {
                items.insert(i, a.clone());
            }
            Value::Number(items.len() as f64)
        }
        "slice" => {
            let items = cell.borrow();
            let start = relative_index(&arg(args, 0), items.len(), 0);
            let end = relative_index(&arg(args, 1), items.len(), items.len());
            Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec())
        }
        "splice" => {
            let mut items = cell.borrow_mut();
            let len = items.len();
            let start = relative_index(&arg(args, 0), len, 0);
            let delete = match args.get(1) {
                None => len - start,
                Some(v) => clamp_index(v, len - start, 0),
            };
            check_array_length(len - delete + args.len().saturating_sub(2))?;
            let inserted = args.iter().skip(2).cloned();
            let removed: Vec<Value> = items.splice(start..start + delete, inserted).collect();
            Value::array(removed)
        }
        "concat" => {
            let mut out = snapshot();
            for a in args {
                match a {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
                check_array_length(out.len())?;
            }
            Value::array(out)
        }
        "join" | "toString" => {
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other if name == "join" => other.to_js_string(),
                _ => ",".to_string(),
            };
            let parts: Vec<String> = snapshot()
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect();
            let total = parts.iter().map(String::len).sum::<usize>()
                + separator.len().saturating_mul(parts.len().saturating_sub(1));
            check_string_length(total)?;
            Value::string(parts.join(&separator))
        }
        "reverse" => {
            cell.borrow_mut().reverse();
            receiver.clone()
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(snapshot().iter().any(|v| same_value_zero(v, &needle)))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let position = snapshot().iter().position(|v| strict_equals(v, &needle));
            Value::Number(position.map_or(-1.0, |i| i as f64))
        }
        "lastIndexOf" => {
            let needle = arg(args, 0);
            let position = snapshot().iter().rposition(|v| strict_equals(v, &needle));
            Value::Number(position.map_or(-1.0, |i| i as f64))
        }
        "at" => {
            let items = cell.borrow();
            resolve_at(&arg(args, 0), items.len())
                .map(|i| items[i].clone())
                .unwrap_or_default()
        }
        "fill" => {
            let value = arg(args, 0);
            let mut items = cell.borrow_mut();
            let len = items.len();
            let start = relative_index(&arg(args, 1), len, 0);
            let end = relative_index(&arg(args, 2), len, len);
            for slot in items.iter_mut().take(end).skip(start) {
                *slot = value.clone();
            }
            receiver.clone()
        }
        "flat" => {
            let depth = match arg(args, 0) {
                Value::Undefined => 1.0,
                other => other.to_number(),
            };
            let mut out = Vec::new();
            flatten_into(&snapshot(), depth, 0, &mut out)?;
            Value::array(out)
        }
        "map" => {
            let f = callback("")?;
            let mut out = Vec::new();
            for (i, item) in snapshot().iter().enumerate() {
                out.push(call(interp, &f, item, i)?);
            }
            Value::array(out)
        }
        "flatMap" => {
            let f = callback("")?;
            let mut out = Vec::new();
            for (i, item) in snapshot().iter().enumerate() {
                match call(interp, &f, item, i)? {
                    Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                    other => out.push(other),
                }
            }
            Value::array(out)
        }
        "filter" => {
            let f = callback("")?;
            let mut out = Vec::new();
            for (i, item) in snapshot().iter().enumerate() {
                if call(interp, &f, item, i)?.truthy() {
                    out.push(item.clone());
                }
            }
            Value::array(out)
        }
        "forEach" => {
            let f = callback("")?;
            for (i, item) in snapshot().iter().enumerate() {
                call(interp, &f, item, i)?;
            }
            Value::Undefined
        }
        "find" | "findIndex" => {
            let f = callback("")?;
            for (i, item) in snapshot().iter().enumerate() {
                if call(interp, &f, item, i)?.truthy() {
                    return Ok(if name == "find" {
                        item.clone()
                    } else {
                        Value::Number(i as f64)
                    });
                }
            }
            if name == "find" {
                Value::Undefined
            } else {
                Value::Number(-1.0)
            }
        }
        "findLast" => {
            let f = callback("")?;
            for (i, item) in snapshot().iter().enumerate().rev() {
                if call(interp, &f, item, i)?.truthy() {
                    return Ok(item.clone());
                }
            }
            Value::Undefined
        }
        "some" => {
            let f = callback("")?;
            for (i, item) in snapshot().iter().enumerate() {
                if call(interp, &f, item, i)?.truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Value::Bool(false)
        }
        "every" => {
            let f = callback("")?;
            for (i, item) in snapshot().iter().enumerate() {
                if !call(interp, &f, item, i)?.truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Value::Bool(true)
        }
        "reduce" => {
            let f = callback("")?;
            let items = snapshot();
            let mut iter = items.iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match iter.next() {
                    Some((_, first)) => first.clone(),
                    None => {
                        return Err(Interrupt::type_error(
                            "Reduce of empty array with no initial value",
                        ))
                    }
                },
            };
            for (i, item) in iter {
                acc = interp.call_function(
                    &f,
                    vec![acc, item.clone(), Value::Number(i as f64), receiver.clone()],
                )?;
            }
            acc
        }
        "sort" => {
            let comparator = arg(args, 0);
            if !comparator.is_nullish() && !comparator.is_function() {
                return Err(Interrupt::type_error(
                    "The comparison function must be either a function or undefined",
                ));
            }
            let sorted = merge_sort(interp, snapshot(), &comparator)?;
            *cell.borrow_mut() = sorted;
            receiver.clone()
        }
        _ => Value::Undefined,
    })
}

/// Nesting `flat` follows before giving up; cyclic arrays would recurse forever.
const MAX_FLATTEN_NESTING: usize = 256;

fn flatten_into(items: &[Value], depth: f64, nesting: usize, out: &mut Vec<Value>) -> Flow<()> {
    if nesting > MAX_FLATTEN_NESTING {
        return Err(Interrupt::range_error("Maximum call stack size exceeded"));
    }
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => {
                flatten_into(&inner.borrow(), depth - 1.0, nesting + 1, out)?;
            }
            other => out.push(other.clone()),
        }
        check_array_length(out.len())?;
    }
    Ok(())
}

/// Stable merge sort; the comparator may throw, so `slice::sort_by` is not an option.
fn merge_sort(interp: &mut Interpreter, mut items: Vec<Value>, comparator: &Value) -> Flow<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items, comparator)?;
    let right = merge_sort(interp, right, comparator)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => sort_compare(interp, comparator, a, b)? > 0.0,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        out.extend(next);
    }
    Ok(out)
}

fn sort_compare(interp: &mut Interpreter, comparator: &Value, a: &Value, b: &Value) -> Flow<f64> {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => return Ok(0.0),
        (Value::Undefined, _) => return Ok(1.0),
        (_, Value::Undefined) => return Ok(-1.0),
        _ => {}
    }
    if comparator.is_function() {
        let result = interp
            .call_function(comparator, vec![a.clone(), b.clone()])?
            .to_number();
        return Ok(if result.is_nan() { 0.0 } else { result });
    }
    Ok(match a.to_js_string().cmp(&b.to_js_string()) {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_formatting() {
        assert_eq!(locale_format(1234567.891), "1,234,567.891");
        assert_eq!(locale_format(-42.5), "-42.5");
        assert_eq!(locale_format(1000.0), "1,000");
        assert_eq!(locale_format(0.0004), "0");
    }

    #[test]
    fn radix_conversion() {
        assert_eq!(to_radix(255.0, 16), "ff");
        assert_eq!(to_radix(-5.0, 2), "-101");
        assert_eq!(to_radix(1.5, 2), "1.5");
    }

    #[test]
    fn relative_indices_clamp() {
        assert_eq!(relative_index(&Value::Number(-2.0), 5, 0), 3);
        assert_eq!(relative_index(&Value::Number(-9.0), 5, 0), 0);
        assert_eq!(relative_index(&Value::Number(9.0), 5, 0), 5);
        assert_eq!(relative_index(&Value::Undefined, 5, 5), 5);
        assert_eq!(resolve_at(&Value::Number(-1.0), 3), Some(2));
        assert_eq!(resolve_at(&Value::Number(3.0), 3), None);
    }
}
