//! Declarative shape checks for flow inputs and model outputs.
//!
//! A [`Schema`] is a list of fields. [`Schema::validate`] checks a JSON value
//! against it and reports every violation at once; [`Schema::to_json_schema`]
//! renders the same description for the model's structured output mode.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::datauri::looks_like_data_uri;

/// The kind of value a field holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Any string
    String,
    /// A string that isn't blank
    NonEmptyString,
    /// A string with at least this many characters after trimming
    MinLengthString(usize),
    /// A `data:<mime>;base64,...` string
    DataUri,
    /// An absolute URL
    Url,
    /// An array of strings, each checked against `item`
    StringArray {
        /// Check applied to every element
        item: Box<FieldKind>,
        /// Fewest elements allowed
        min_items: usize,
    },
}

impl FieldKind {
    /// Array of `item`, at least `min_items` long.
    pub fn array_of(item: FieldKind, min_items: usize) -> Self {
        Self::StringArray {
            item: Box::new(item),
            min_items,
        }
    }

    fn check_str(&self, value: &str) -> Result<(), Reason> {
        match self {
            Self::String | Self::StringArray { .. } => Ok(()),
            Self::NonEmptyString if value.trim().is_empty() => Err(Reason::Empty),
            Self::NonEmptyString => Ok(()),
            Self::MinLengthString(min) if value.trim().chars().count() < *min => {
                Err(Reason::TooShort(*min))
            }
            Self::MinLengthString(_) => Ok(()),
            Self::DataUri if looks_like_data_uri(value) => Ok(()),
            Self::DataUri => Err(Reason::NotDataUri),
            Self::Url if url::Url::parse(value).is_ok() => Ok(()),
            Self::Url => Err(Reason::NotUrl),
        }
    }

    fn json_schema(&self, description: &str) -> Value {
        match self {
            Self::StringArray { item, min_items } => {
                let mut schema = json!({
                    "type": "array",
                    "items": item.json_schema(""),
                });
                if *min_items > 0 {
                    schema["minItems"] = json!(min_items);
                }
                if !description.is_empty() {
                    schema["description"] = json!(description);
                }
                schema
            }
            _ => {
                let mut schema = json!({"type": "string"});
                if !description.is_empty() {
                    schema["description"] = json!(description);
                }
                schema
            }
        }
    }
}

/// One named field of a schema.
#[derive(Clone, Debug)]
pub struct Field {
    /// JSON key
    pub name: &'static str,
    /// What the value must look like
    pub kind: FieldKind,
    /// Whether the key has to be present
    pub required: bool,
    /// Sent to the model alongside the shape
    pub description: &'static str,
}

impl Field {
    /// A field that has to be present.
    pub fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    /// A field that may be absent or `null`.
    pub fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Why a field failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    /// The value wasn't an object at all
    NotAnObject,
    /// Required key absent or null
    Missing,
    /// Expected a string
    ExpectedString,
    /// Expected an array
    ExpectedArray,
    /// Blank string
    Empty,
    /// Shorter than the minimum
    TooShort(usize),
    /// Not a data URI
    NotDataUri,
    /// Not a URL
    NotUrl,
    /// Array shorter than the minimum
    TooFewItems(usize),
    /// An array element failed
    Element(usize, Box<Reason>),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "expected an object"),
            Self::Missing => write!(f, "is required"),
            Self::ExpectedString => write!(f, "expected a string"),
            Self::ExpectedArray => write!(f, "expected an array"),
            Self::Empty => write!(f, "must not be empty"),
            Self::TooShort(min) => write!(f, "must be at least {min} characters long"),
            Self::NotDataUri => write!(f, "must be a base64 data URI"),
            Self::NotUrl => write!(f, "must be a URL"),
            Self::TooFewItems(min) => write!(f, "must contain at least {min} item(s)"),
            Self::Element(index, reason) => write!(f, "element {index} {reason}"),
        }
    }
}

/// A single failed field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// The field name, or `$` for the whole value
    pub field: String,
    /// What was wrong with it
    pub reason: Reason,
}

impl Violation {
    /// Shorthand for a missing required field.
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            reason: Reason::Missing,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

/// Every violation found in one value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaError {
    /// The failed fields, in schema order
    pub violations: Vec<Violation>,
}

impl SchemaError {
    /// Wraps a list of violations.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Used when the value couldn't be turned into JSON in the first place.
    pub fn not_an_object() -> Self {
        Self::new(vec![Violation {
            field: "$".to_string(),
            reason: Reason::NotAnObject,
        }])
    }

    /// True if `field` is among the violations.
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for SchemaError {}

/// A named object shape.
#[derive(Clone, Debug)]
pub struct Schema {
    name: &'static str,
    fields: Vec<Field>,
}

impl Schema {
    /// Builds a schema from its fields.
    pub fn new(name: &'static str, fields: Vec<Field>) -> Self {
        Self { name, fields }
    }

    /// Schema name, used in logs and prompts.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks `value` and returns the object with unknown keys removed and
    /// null optionals dropped.
    pub fn validate(&self, value: &Value) -> Result<Map<String, Value>, SchemaError> {
        let Some(object) = value.as_object() else {
            return Err(SchemaError::not_an_object());
        };

        let mut violations = Vec::new();
        let mut cleaned = Map::new();
        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        violations.push(Violation::missing(field.name));
                    }
                }
                Some(found) => match check_value(&field.kind, found) {
                    Ok(()) => {
                        cleaned.insert(field.name.to_string(), found.clone());
                    }
                    Err(reason) => violations.push(Violation {
                        field: field.name.to_string(),
                        reason,
                    }),
                },
            }
        }

        if violations.is_empty() {
            Ok(cleaned)
        } else {
            Err(SchemaError::new(violations))
        }
    }

    /// Validates and deserializes in one go.
    pub fn parse<T: DeserializeOwned>(&self, value: &Value) -> Result<T, SchemaError> {
        let cleaned = self.validate(value)?;
        serde_json::from_value(Value::Object(cleaned)).map_err(|_| SchemaError::not_an_object())
    }

    /// The JSON-Schema object sent as the model's response schema.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                (
                    field.name.to_string(),
                    field.kind.json_schema(field.description),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn check_value(kind: &FieldKind, value: &Value) -> Result<(), Reason> {
    match kind {
        FieldKind::StringArray { item, min_items } => {
            let items = value.as_array().ok_or(Reason::ExpectedArray)?;
            if items.len() < *min_items {
                return Err(Reason::TooFewItems(*min_items));
            }
            for (index, element) in items.iter().enumerate() {
                check_value(item, element)
                    .map_err(|reason| Reason::Element(index, Box::new(reason)))?;
            }
            Ok(())
        }
        _ => {
            let text = value.as_str().ok_or(Reason::ExpectedString)?;
            kind.check_str(text)
        }
    }
}
