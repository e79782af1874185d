//! Renderable tree produced by components.

use super::value::{number_to_json, number_to_string, PropertyMap, Value};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::rc::Rc;

pub struct ElementNode {
    pub tag: Rc<str>,
    /// Props as passed to `createElement`, minus `children`.
    pub props: PropertyMap,
    pub children: Vec<Node>,
}

#[derive(Clone)]
pub enum Node {
    Element(Rc<ElementNode>),
    Text(Rc<str>),
    Fragment(Rc<[Node]>),
    Empty,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Node {
    /// Convert a value returned from a component (or passed as a child).
    pub fn from_value(value: &Value) -> Result<Node, String> {
        Ok(match value {
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Function(_) => Node::Empty,
            Value::Number(n) => Node::Text(number_to_string(*n).into()),
            Value::Str(s) => Node::Text(s.clone()),
            Value::Element(node) => node.clone(),
            Value::Array(items) => {
                let children = items
                    .borrow()
                    .iter()
                    .map(Node::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Node::Fragment(children.into())
            }
            Value::Object(map) => {
                let keys: Vec<String> = map.borrow().keys().map(|k| k.to_string()).collect();
                return Err(format!(
                    "Objects are not valid as a child (found: object with keys {{{}}})",
                    keys.join(", ")
                ));
            }
        })
    }

    pub fn same(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Element(a), Node::Element(b)) => Rc::ptr_eq(a, b),
            (Node::Fragment(a), Node::Fragment(b)) => Rc::ptr_eq(a, b),
            (Node::Text(a), Node::Text(b)) => a == b,
            (Node::Empty, Node::Empty) => true,
            _ => false,
        }
    }

    /// Stable structural view. Event handlers render as `"[function]"`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Node::Element(el) => {
                let props: Map<String, JsonValue> = el
                    .props
                    .iter()
                    .map(|(k, v)| (k.to_string(), prop_json(v, 0)))
                    .collect();
                json!({
                    "type": &*el.tag,
                    "props": props,
                    "children": el.children.iter().map(Node::to_json).collect::<Vec<_>>(),
                })
            }
            Node::Text(text) => JsonValue::String(text.to_string()),
            Node::Fragment(children) => json!({
                "type": "Fragment",
                "children": children.iter().map(Node::to_json).collect::<Vec<_>>(),
            }),
            Node::Empty => JsonValue::Null,
        }
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => el.children.iter().for_each(|c| c.collect_text(out)),
            Node::Fragment(children) => children.iter().for_each(|c| c.collect_text(out)),
            Node::Empty => {}
        }
    }

    /// First element (depth-first, pre-order) matching `predicate`.
    pub fn find_element(&self, predicate: &dyn Fn(&ElementNode) -> bool) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => {
                let el: &ElementNode = el;
                if predicate(el) {
                    return Some(el);
                }
                el.children.iter().find_map(|c| c.find_element(predicate))
            }
            Node::Fragment(children) => children.iter().find_map(|c| c.find_element(predicate)),
            Node::Text(_) | Node::Empty => None,
        }
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<&ElementNode> {
        self.find_element(&|el| &*el.tag == tag)
    }

    /// First handler stored under `prop` in the subtree.
    pub fn find_handler(&self, prop: &str) -> Option<Value> {
        self.find_element(&|el| el.props.get(prop).is_some_and(Value::is_function))
            .and_then(|el| el.props.get(prop).cloned())
    }
}

fn prop_json(value: &Value, depth: usize) -> JsonValue {
    if depth > 32 {
        return JsonValue::Null;
    }
    match value {
        Value::Undefined | Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::Str(s) => JsonValue::String(s.to_string()),
        Value::Function(_) => JsonValue::String("[function]".to_string()),
        Value::Element(node) => node.to_json(),
        Value::Array(items) => JsonValue::Array(
            items
                .borrow()
                .iter()
                .map(|v| prop_json(v, depth + 1))
                .collect(),
        ),
        Value::Object(map) => JsonValue::Object(
            map.borrow()
                .iter()
                .map(|(k, v)| (k.to_string(), prop_json(v, depth + 1)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, props: PropertyMap, children: Vec<Node>) -> Node {
        Node::Element(Rc::new(ElementNode {
            tag: tag.into(),
            props,
            children,
        }))
    }

    #[test]
    fn json_view_marks_handlers() {
        let mut props = PropertyMap::new();
        props.set("onClick", Value::native("h", |_, _| Ok(Value::Undefined)));
        props.set("className", Value::string("btn"));
        let node = element("button", props, vec![Node::Text("Go".into())]);
        assert_eq!(
            node.to_json(),
            json!({"type": "button", "props": {"onClick": "[function]", "className": "btn"}, "children": ["Go"]})
        );
        assert!(node.find_handler("onClick").is_some());
        assert!(node.find_handler("onChange").is_none());
    }

    #[test]
    fn values_convert_to_nodes() {
        let arr = Value::array(vec![Value::Number(3.0), Value::Null, Value::string("x")]);
        let node = Node::from_value(&arr).unwrap();
        assert_eq!(node.text_content(), "3x");
        assert!(Node::from_value(&Value::object(PropertyMap::new())).is_err());
        assert!(matches!(Node::from_value(&Value::Bool(false)).unwrap(), Node::Empty));
    }
}
