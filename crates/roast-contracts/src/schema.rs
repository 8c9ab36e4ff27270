//! Data-level declaration of the critique response shape.
//!
//! The same declaration is rendered into each provider's schema dialect and
//! is also used to check replies locally, so provider adherence is never
//! taken on trust.

use std::fmt;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::critique::Severity;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object {
        description: Option<String>,
        properties: IndexMap<String, SchemaNode>,
        required: Vec<String>,
    },
    Array {
        description: Option<String>,
        items: Box<SchemaNode>,
    },
    String {
        description: Option<String>,
        enum_values: Vec<String>,
    },
    Number {
        description: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    WrongKind { expected: &'static str, found: String },
    MissingField(String),
    NotInEnum { value: String, allowed: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub kind: ViolationKind,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::WrongKind { expected, found } => {
                write!(f, "{}: expected {expected}, found {found}", self.path)
            }
            ViolationKind::MissingField(field) => {
                write!(f, "{}: missing required field `{field}`", self.path)
            }
            ViolationKind::NotInEnum { value, allowed } => write!(
                f,
                "{}: `{value}` is not one of [{}]",
                self.path,
                allowed.join(", ")
            ),
        }
    }
}

impl std::error::Error for SchemaViolation {}

impl SchemaNode {
    pub fn string(description: Option<&str>) -> Self {
        SchemaNode::String {
            description: description.map(str::to_string),
            enum_values: Vec::new(),
        }
    }

    pub fn string_enum(values: &[&str]) -> Self {
        SchemaNode::String {
            description: None,
            enum_values: values.iter().map(|value| (*value).to_string()).collect(),
        }
    }

    pub fn number(description: Option<&str>) -> Self {
        SchemaNode::Number {
            description: description.map(str::to_string),
        }
    }

    pub fn array(items: SchemaNode) -> Self {
        SchemaNode::Array {
            description: None,
            items: Box::new(items),
        }
    }

    pub fn object(properties: Vec<(&str, SchemaNode)>, required: &[&str]) -> Self {
        SchemaNode::Object {
            description: None,
            properties: properties
                .into_iter()
                .map(|(name, node)| (name.to_string(), node))
                .collect(),
            required: required.iter().map(|name| (*name).to_string()).collect(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            SchemaNode::Object { .. } => "object",
            SchemaNode::Array { .. } => "array",
            SchemaNode::String { .. } => "string",
            SchemaNode::Number { .. } => "number",
        }
    }

    fn description(&self) -> Option<&str> {
        match self {
            SchemaNode::Object { description, .. }
            | SchemaNode::Array { description, .. }
            | SchemaNode::String { description, .. }
            | SchemaNode::Number { description } => description.as_deref(),
        }
    }

    /// Gemini `responseSchema` dialect (OpenAPI subset, upper-case types).
    pub fn to_gemini_schema(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            "type".to_string(),
            Value::String(self.kind_name().to_ascii_uppercase()),
        );
        if let Some(description) = self.description() {
            out.insert(
                "description".to_string(),
                Value::String(description.to_string()),
            );
        }
        match self {
            SchemaNode::Object {
                properties,
                required,
                ..
            } => {
                let rendered: Map<String, Value> = properties
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_gemini_schema()))
                    .collect();
                out.insert("properties".to_string(), Value::Object(rendered));
                out.insert("required".to_string(), json!(required));
                out.insert(
                    "propertyOrdering".to_string(),
                    json!(properties.keys().collect::<Vec<_>>()),
                );
            }
            SchemaNode::Array { items, .. } => {
                out.insert("items".to_string(), items.to_gemini_schema());
            }
            SchemaNode::String { enum_values, .. } if !enum_values.is_empty() => {
                out.insert("enum".to_string(), json!(enum_values));
            }
            SchemaNode::String { .. } | SchemaNode::Number { .. } => {}
        }
        Value::Object(out)
    }

    /// Plain JSON Schema in the strict form structured-output APIs accept:
    /// closed objects with every property listed as required.
    pub fn to_json_schema(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            "type".to_string(),
            Value::String(self.kind_name().to_string()),
        );
        if let Some(description) = self.description() {
            out.insert(
                "description".to_string(),
                Value::String(description.to_string()),
            );
        }
        match self {
            SchemaNode::Object { properties, .. } => {
                let rendered: Map<String, Value> = properties
                    .iter()
                    .map(|(name, node)| (name.clone(), node.to_json_schema()))
                    .collect();
                out.insert("properties".to_string(), Value::Object(rendered));
                out.insert(
                    "required".to_string(),
                    json!(properties.keys().collect::<Vec<_>>()),
                );
                out.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            SchemaNode::Array { items, .. } => {
                out.insert("items".to_string(), items.to_json_schema());
            }
            SchemaNode::String { enum_values, .. } if !enum_values.is_empty() => {
                out.insert("enum".to_string(), json!(enum_values));
            }
            SchemaNode::String { .. } | SchemaNode::Number { .. } => {}
        }
        Value::Object(out)
    }

    /// Structural check of `value` against this node. Extra object keys are tolerated.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at("$", value)
    }

    fn validate_at(&self, path: &str, value: &Value) -> Result<(), SchemaViolation> {
        match self {
            SchemaNode::Object {
                properties,
                required,
                ..
            } => {
                let Some(object) = value.as_object() else {
                    return Err(wrong_kind(path, "object", value));
                };
                for field in required {
                    if !object.contains_key(field) {
                        return Err(SchemaViolation {
                            path: path.to_string(),
                            kind: ViolationKind::MissingField(field.clone()),
                        });
                    }
                }
                for (name, node) in properties {
                    if let Some(child) = object.get(name) {
                        node.validate_at(&format!("{path}.{name}"), child)?;
                    }
                }
                Ok(())
            }
            SchemaNode::Array { items, .. } => {
                let Some(rows) = value.as_array() else {
                    return Err(wrong_kind(path, "array", value));
                };
                for (idx, row) in rows.iter().enumerate() {
                    items.validate_at(&format!("{path}[{idx}]"), row)?;
                }
                Ok(())
            }
            SchemaNode::String { enum_values, .. } => {
                let Some(text) = value.as_str() else {
                    return Err(wrong_kind(path, "string", value));
                };
                if !enum_values.is_empty() && !enum_values.iter().any(|allowed| allowed == text) {
                    return Err(SchemaViolation {
                        path: path.to_string(),
                        kind: ViolationKind::NotInEnum {
                            value: text.to_string(),
                            allowed: enum_values.clone(),
                        },
                    });
                }
                Ok(())
            }
            SchemaNode::Number { .. } => {
                if value.is_number() {
                    Ok(())
                } else {
                    Err(wrong_kind(path, "number", value))
                }
            }
        }
    }
}

fn wrong_kind(path: &str, expected: &'static str, value: &Value) -> SchemaViolation {
    let found = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    SchemaViolation {
        path: path.to_string(),
        kind: ViolationKind::WrongKind {
            expected,
            found: found.to_string(),
        },
    }
}

/// The response contract every critique provider is instructed to follow.
pub fn critique_schema() -> SchemaNode {
    let severities: Vec<&str> = Severity::ALL.iter().map(Severity::as_str).collect();
    let finding = SchemaNode::object(
        vec![
            (
                "title",
                SchemaNode::string(Some(
                    "The category of failure (e.g., 'Typography Nightmares', 'Color Vomit').",
                )),
            ),
            (
                "content",
                SchemaNode::string(Some("The detailed roast of this specific aspect.")),
            ),
            ("severity", SchemaNode::string_enum(&severities)),
        ],
        &["title", "content", "severity"],
    );
    SchemaNode::object(
        vec![
            (
                "score",
                SchemaNode::number(Some(
                    "A score from 0 to 100, where 0 is absolute trash and 100 is impossible.",
                )),
            ),
            (
                "oneLiner",
                SchemaNode::string(Some(
                    "A single, devastating sentence summarizing the website.",
                )),
            ),
            ("sections", SchemaNode::array(finding)),
            (
                "verdict",
                SchemaNode::string(Some(
                    "Final closing statement telling them what they need to do immediately.",
                )),
            ),
        ],
        &["score", "oneLiner", "sections", "verdict"],
    )
}
