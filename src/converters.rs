//! Conversion of JSON tree descriptions into virtual nodes, with malformed
//! nodes rejected before they can reach the reconciler.
//!
//! A node is either a string (a text leaf) or an object with the fields
//! `tag`, `text`, `key`, `props` and `children`. Exactly one of `tag` and
//! `text` must be present. `children` is a string (text content) or an array
//! of nodes. Without an explicit `key`, an element takes its key from the
//! `key` prop.
use crate::errors::ReconcilerError;
use crate::vnode::{Children, Props, VNode};
use serde_json::{Map, Value};

const FIELDS: [&str; 5] = ["tag", "text", "key", "props", "children"];

pub fn vnode_from_json_str(s: &str) -> Result<VNode, ReconcilerError> {
    let value: Value = serde_json::from_str(s)?;
    vnode_from_json(&value)
}

pub fn vnode_from_json(value: &Value) -> Result<VNode, ReconcilerError> {
    node_at(value, "$")
}

fn malformed(path: &str, details: impl std::fmt::Display) -> ReconcilerError {
    ReconcilerError::MalformedNode {
        details: format!("{path}: {details}"),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strings pass through, numbers and booleans are stringified, null is absent.
fn scalar(value: &Value, path: &str) -> Result<Option<String>, ReconcilerError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(malformed(path, format!("expected a scalar, got {}", type_name(other)))),
    }
}

fn node_at(value: &Value, path: &str) -> Result<VNode, ReconcilerError> {
    match value {
        Value::String(text) => Ok(VNode::text(text.as_str())),
        Value::Object(fields) => object_node(fields, path),
        other => Err(malformed(
            path,
            format!("expected a string or an object, got {}", type_name(other)),
        )),
    }
}

fn object_node(fields: &Map<String, Value>, path: &str) -> Result<VNode, ReconcilerError> {
    if let Some(unknown) = fields.keys().find(|name| !FIELDS.contains(&name.as_str())) {
        return Err(malformed(path, format!("unknown field '{unknown}'")));
    }
    let field = |name: &str| fields.get(name).filter(|value| !value.is_null());
    let key = match field("key") {
        Some(value) => scalar(value, &format!("{path}.key"))?,
        None => None,
    };

    match (field("tag"), field("text")) {
        (Some(_), Some(_)) => Err(malformed(path, "a node cannot have both 'tag' and 'text'")),
        (None, None) => Err(malformed(path, "a node needs either 'tag' or 'text'")),
        (None, Some(text)) => {
            if field("props").is_some() || field("children").is_some() {
                return Err(malformed(path, "text nodes cannot have props or children"));
            }
            let Value::String(text) = text else {
                return Err(malformed(path, format!("'text' must be a string, got {}", type_name(text))));
            };
            let node = VNode::text(text.as_str());
            Ok(match key {
                Some(key) => node.with_key(key),
                None => node,
            })
        }
        (Some(tag), None) => {
            let tag = match tag {
                Value::String(tag) if !tag.is_empty() => tag,
                other => {
                    return Err(malformed(
                        path,
                        format!("'tag' must be a non-empty string, got {}", type_name(other)),
                    ));
                }
            };
            let props = match field("props") {
                Some(props) => Some(props_at(props, &format!("{path}.props"))?),
                None => None,
            };
            let children = match field("children") {
                Some(children) => children_at(children, &format!("{path}.children"))?,
                None => Children::Empty,
            };

            let key = key.or_else(|| props.as_ref().and_then(|props| props.get("key")).cloned());
            let mut node = VNode::element(tag.as_str()).with_content(children);
            if let Some(props) = props {
                node = node.with_props(props);
            }
            Ok(match key {
                Some(key) => node.with_key(key),
                None => node,
            })
        }
    }
}

fn props_at(value: &Value, path: &str) -> Result<Props, ReconcilerError> {
    let Value::Object(entries) = value else {
        return Err(malformed(path, format!("expected an object, got {}", type_name(value))));
    };
    let mut props = Props::with_capacity(entries.len());
    for (name, value) in entries {
        if let Some(value) = scalar(value, &format!("{path}.{name}"))? {
            props.insert(name.clone(), value);
        }
    }
    Ok(props)
}

fn children_at(value: &Value, path: &str) -> Result<Children, ReconcilerError> {
    match value {
        Value::String(text) => Ok(Children::Text(text.clone())),
        Value::Array(items) => {
            let nodes = items
                .iter()
                .enumerate()
                .map(|(i, item)| node_at(item, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Children::from(nodes))
        }
        other => Err(malformed(
            path,
            format!("expected a string or an array, got {}", type_name(other)),
        )),
    }
}

#[cfg(feature = "python")]
pub use self::python::{json_to_pyobject, python_to_json};

#[cfg(feature = "python")]
mod python {
    use crate::errors::ReconcilerError;
    use pyo3::prelude::*;
    use pyo3::types::{PyDict, PyList, PyModule};

    /// Convert a Python object to JSON through the `json` module
    pub fn python_to_json<'py>(
        py: Python<'py>,
        obj: &Bound<'py, PyAny>,
    ) -> Result<serde_json::Value, ReconcilerError> {
        let dumps = PyModule::import(py, "json")?.getattr("dumps")?;
        let dumped: String = dumps.call1((obj,))?.extract()?;
        Ok(serde_json::from_str(&dumped)?)
    }

    /// Convert JSON back to native Python values
    pub fn json_to_pyobject<'py>(
        py: Python<'py>,
        value: &serde_json::Value,
    ) -> PyResult<Bound<'py, PyAny>> {
        use serde_json::Value;
        Ok(match value {
            Value::Null => py.None().into_bound(py),
            Value::Bool(b) => (*b).into_pyobject(py)?.to_owned().into_any(),
            Value::Number(n) => match (n.as_u64(), n.as_i64(), n.as_f64()) {
                (Some(u), _, _) => u.into_pyobject(py)?.into_any(),
                (None, Some(i), _) => i.into_pyobject(py)?.into_any(),
                (None, None, Some(f)) => f.into_pyobject(py)?.into_any(),
                _ => n.to_string().into_pyobject(py)?.into_any(),
            },
            Value::String(s) => s.as_str().into_pyobject(py)?.into_any(),
            Value::Array(items) => {
                let list = PyList::empty(py);
                for item in items {
                    list.append(json_to_pyobject(py, item)?)?;
                }
                list.into_any()
            }
            Value::Object(map) => {
                let dict = PyDict::new(py);
                for (k, v) in map {
                    dict.set_item(k, json_to_pyobject(py, v)?)?;
                }
                dict.into_any()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::h;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_the_reference_tree_shape() {
        let node = vnode_from_json(&json!({
            "tag": "div",
            "children": [
                { "tag": "input", "props": { "key": "2" }, "children": "test-2" },
                { "tag": "p", "props": { "key": "3", "style": "color: #f00;" }, "children": "test-3" },
                "trailing text"
            ]
        }))
        .unwrap();

        let props: Props = [("key", "3"), ("style", "color: #f00;")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let input_props: Props = [("key".to_string(), "2".to_string())].into_iter().collect();
        let expected = VNode::element("div").with_children([
            h("input", Some(input_props), "test-2"),
            h("p", Some(props), "test-3"),
            VNode::text("trailing text"),
        ]);
        assert_eq!(node, expected);
        assert_eq!(node.child_nodes()[1].key(), Some("3"));
    }

    #[test]
    fn scalars_are_stringified_and_nulls_dropped() {
        let node = vnode_from_json(&json!({
            "tag": "input",
            "key": 7,
            "props": { "disabled": true, "size": 3, "value": null }
        }))
        .unwrap();
        assert_eq!(node.key(), Some("7"));
        assert_eq!(node.prop("disabled"), Some("true"));
        assert_eq!(node.prop("size"), Some("3"));
        assert_eq!(node.prop("value"), None);
    }

    #[test]
    fn text_objects_may_carry_a_key() {
        let node = vnode_from_json(&json!({ "text": "hi", "key": "greeting" })).unwrap();
        assert!(node.is_text());
        assert_eq!(node.key(), Some("greeting"));
    }

    #[test]
    fn rejects_malformed_nodes() {
        let cases = [
            json!({ "tag": "div", "text": "x" }),
            json!({}),
            json!({ "tag": "" }),
            json!({ "text": "x", "children": [] }),
            json!({ "tag": "div", "colour": "red" }),
            json!({ "tag": "div", "props": { "style": { "color": "red" } } }),
            json!({ "tag": "div", "children": 3 }),
            json!(42),
        ];
        for case in cases {
            assert!(
                matches!(vnode_from_json(&case), Err(ReconcilerError::MalformedNode { .. })),
                "accepted {case}"
            );
        }
    }

    #[test]
    fn errors_point_at_the_offending_node() {
        let err = vnode_from_json(&json!({ "tag": "ul", "children": ["ok", { "tag": "li", "text": "x" }] }))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed node: $.children[1]: a node cannot have both 'tag' and 'text'"
        );
    }

    #[test]
    fn invalid_json_is_a_serde_error() {
        assert!(matches!(vnode_from_json_str("{"), Err(ReconcilerError::SerdeError(_))));
    }
}
