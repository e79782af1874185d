//! The UI capability set: `React.createElement`, `React.Fragment` and hooks,
//! exposed both under `React` and as bare names.

use super::hooks::{deps_changed, read_deps, HookSlot, PendingEffect};
use super::interpreter::{describe_value, Flow, Interpreter, Interrupt};
use super::scope::Scope;
use super::tree::{ElementNode, Node};
use super::value::{error_value, same_value, strict_equals, PropertyMap, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub fn install(scope: &Rc<Scope>) {
    let mut fragment_marker = PropertyMap::new();
    fragment_marker.set("$$typeof", Value::string("react.fragment"));
    let fragment = Value::object(fragment_marker);

    let create_element = {
        let fragment = fragment.clone();
        Value::native("createElement", move |interp, args| {
            create_element(interp, &fragment, args)
        })
    };

    let hooks = [
        ("useState", Value::native("useState", use_state)),
        ("useEffect", Value::native("useEffect", use_effect)),
        ("useRef", Value::native("useRef", use_ref)),
        (
            "useMemo",
            Value::native("useMemo", |interp, args| use_memo(interp, args, "useMemo")),
        ),
        (
            "useCallback",
            Value::native("useCallback", |interp, args| {
                use_memo(interp, args, "useCallback")
            }),
        ),
    ];

    let mut react = PropertyMap::new();
    react.set("createElement", create_element.clone());
    react.set("Fragment", fragment.clone());
    for (name, hook) in &hooks {
        react.set(name, hook.clone());
        scope.define(name, hook.clone(), false);
    }
    scope.define("React", Value::object(react), false);
    scope.define("Fragment", fragment, false);
    scope.define("h", create_element, false);
}

fn create_element(interp: &mut Interpreter, fragment: &Value, args: &[Value]) -> Flow<Value> {
    let kind = args.first().cloned().unwrap_or_default();
    let props = match args.get(1) {
        Some(Value::Object(map)) => map.borrow().clone(),
        _ => PropertyMap::new(),
    };
    let explicit_children = args.get(2..).unwrap_or_default();

    match &kind {
        Value::Str(tag) => {
            let mut props = props;
            let children = match props.remove("children") {
                Some(children) if explicit_children.is_empty() => vec![children],
                _ => explicit_children.to_vec(),
            };
            props.remove("key");
            let children = to_nodes(&children)?;
            Ok(Value::Element(Node::Element(Rc::new(ElementNode {
                tag: tag.clone(),
                props,
                children,
            }))))
        }
        marker if strict_equals(marker, fragment) => {
            Ok(Value::Element(Node::Fragment(to_nodes(explicit_children)?.into())))
        }
        Value::Function(_) => {
            let mut props = props;
            match explicit_children {
                [] => {}
                [only] => props.set("children", only.clone()),
                many => props.set("children", Value::array(many.to_vec())),
            }
            let rendered = interp.call_function(&kind, vec![Value::object(props)])?;
            let node = Node::from_value(&rendered).map_err(|msg| {
                Interrupt::Throw(error_value("Error", msg))
            })?;
            Ok(Value::Element(node))
        }
        other => Err(Interrupt::type_error(format!(
            "Element type is invalid: expected a string or a function but got: {}",
            describe_value(other)
        ))),
    }
}

fn to_nodes(children: &[Value]) -> Flow<Vec<Node>> {
    children
        .iter()
        .map(|child| {
            Node::from_value(child).map_err(|msg| Interrupt::Throw(error_value("Error", msg)))
        })
        .collect()
}

fn state_setter(cell: Rc<RefCell<Value>>, dirty: Rc<Cell<bool>>) -> Value {
    Value::native("setState", move |interp, args| {
        let next = args.first().cloned().unwrap_or_default();
        let next = if next.is_function() {
            let previous = cell.borrow().clone();
            interp.call_function(&next, vec![previous])?
        } else {
            next
        };
        if !same_value(&cell.borrow(), &next) {
            *cell.borrow_mut() = next;
            dirty.set(true);
        }
        Ok(Value::Undefined)
    })
}

fn use_state(interp: &mut Interpreter, args: &[Value]) -> Flow<Value> {
    let frame = interp.frame_mut("useState")?;
    let (index, slot) = frame.next_slot("useState")?;
    if let Some(HookSlot::State { cell, setter }) = slot {
        let current = cell.borrow().clone();
        return Ok(Value::array(vec![current, setter.clone()]));
    }
    let dirty = frame.store.dirty.clone();

    let initial = args.first().cloned().unwrap_or_default();
    let initial = if initial.is_function() {
        interp.call_function(&initial, Vec::new())?
    } else {
        initial
    };
    let cell = Rc::new(RefCell::new(initial.clone()));
    let setter = state_setter(cell.clone(), dirty);
    interp.frame_mut("useState")?.push_slot(
        index,
        HookSlot::State {
            cell,
            setter: setter.clone(),
        },
    )?;
    Ok(Value::array(vec![initial, setter]))
}

fn use_effect(interp: &mut Interpreter, args: &[Value]) -> Flow<Value> {
    let callback = args.first().cloned().unwrap_or_default();
    if !callback.is_function() {
        return Err(Interrupt::type_error("useEffect expects a function"));
    }
    let deps = read_deps(args.get(1));
    let frame = interp.frame_mut("useEffect")?;
    let (index, slot) = frame.next_slot("useEffect")?;
    let (exists, run) = match slot {
        Some(HookSlot::Effect { deps: previous, .. }) => (true, deps_changed(previous, &deps)),
        _ => (false, true),
    };
    if !exists {
        frame.push_slot(
            index,
            HookSlot::Effect {
                deps: None,
                cleanup: None,
            },
        )?;
    }
    if run {
        frame.pending.push(PendingEffect {
            index,
            callback,
            deps,
        });
    }
    Ok(Value::Undefined)
}

fn use_ref(interp: &mut Interpreter, args: &[Value]) -> Flow<Value> {
    let frame = interp.frame_mut("useRef")?;
    let (index, slot) = frame.next_slot("useRef")?;
    if let Some(HookSlot::Ref(object)) = slot {
        return Ok(object.clone());
    }
    let mut map = PropertyMap::new();
    map.set("current", args.first().cloned().unwrap_or_default());
    let object = Value::object(map);
    frame.push_slot(index, HookSlot::Ref(object.clone()))?;
    Ok(object)
}

/// `useMemo(factory, deps)` and `useCallback(fn, deps)`.
fn use_memo(interp: &mut Interpreter, args: &[Value], hook: &'static str) -> Flow<Value> {
    let input = args.first().cloned().unwrap_or_default();
    let deps = read_deps(args.get(1));
    let frame = interp.frame_mut(hook)?;
    let (index, slot) = frame.next_slot(hook)?;
    if let Some(HookSlot::Memo {
        deps: previous,
        value,
        ..
    }) = &slot
    {
        if !deps_changed(previous, &deps) {
            return Ok(value.clone());
        }
    }
    let exists = slot.is_some();

    let value = if hook == "useCallback" {
        input
    } else {
        interp.call_value(&input, Vec::new(), "useMemo factory")?
    };
    let frame = interp.frame_mut(hook)?;
    if exists {
        if let Some(HookSlot::Memo {
            deps: stored_deps,
            value: stored,
            ..
        }) = frame.store.slots.get_mut(index)
        {
            *stored_deps = deps;
            *stored = value.clone();
        }
    } else {
        frame.push_slot(
            index,
            HookSlot::Memo {
                hook,
                deps,
                value: value.clone(),
            },
        )?;
    }
    Ok(value)
}
