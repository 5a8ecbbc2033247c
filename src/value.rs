//! Dynamic object-graph model.
//!
//! Domain objects reach the traversal engine as `Value` trees. Composite
//! beans are `Object`s whose readable properties are described by a
//! `TypeDescriptor` in the `Registry`; the object itself only carries the
//! property values (its "slots").
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::action::ActionDescriptor;

// ————————————————————————————————————————————————————————————————————————————
// DECLARED TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Declared (static) type of a property or handler parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Text,
    Integer,
    Float,
    Bool,
    Date,
    DateTime,
    Currency,
    BigInteger,
    BigDecimal,
    /// Named enum type, constants live in the registry.
    Enum(String),
    Array(Box<TypeRef>),
    /// Collection with an optional statically known element type.
    Collection(Option<Box<TypeRef>>),
    Map(Box<TypeRef>),
    /// Named composite type.
    Object(String),
    Resource(Box<TypeRef>),
    Any,
}

impl TypeRef {
    /// Runtime type of a value, used where no declaration exists (map entries).
    pub fn of(value: &Value) -> TypeRef {
        match value {
            Value::Null => TypeRef::Any,
            Value::Scalar(s) => s.type_ref(),
            Value::Array(xs) => {
                let item = xs.iter().find(|x| !x.is_null()).map(TypeRef::of).unwrap_or(TypeRef::Any);
                TypeRef::Array(Box::new(item))
            }
            Value::Collection(_) => TypeRef::Collection(None),
            Value::Map(_) => TypeRef::Map(Box::new(TypeRef::Any)),
            Value::Object(o) => TypeRef::Object(o.type_name.clone()),
            Value::Resource(r) => TypeRef::Resource(Box::new(TypeRef::of(&r.content))),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeRef::Integer | TypeRef::Float | TypeRef::BigInteger | TypeRef::BigDecimal)
    }

    /// Enum type named directly or as the element of an array/collection.
    pub fn enum_name(&self) -> Option<&str> {
        match self {
            TypeRef::Enum(name) => Some(name),
            TypeRef::Array(item) => match item.as_ref() {
                TypeRef::Enum(name) => Some(name),
                _ => None,
            },
            TypeRef::Collection(Some(item)) => match item.as_ref() {
                TypeRef::Enum(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, TypeRef::Array(_) | TypeRef::Collection(_))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALUES
// ————————————————————————————————————————————————————————————————————————————

/// Single, directly renderable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Number(Number),
    /// Arbitrary precision values keep their decimal text.
    BigInteger(String),
    BigDecimal(String),
    Text(String),
    Enum { type_name: String, constant: String },
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    /// ISO 4217 code.
    Currency(String),
}

impl Scalar {
    pub fn type_ref(&self) -> TypeRef {
        match self {
            Scalar::Bool(_) => TypeRef::Bool,
            Scalar::Number(n) if n.is_f64() => TypeRef::Float,
            Scalar::Number(_) => TypeRef::Integer,
            Scalar::BigInteger(_) => TypeRef::BigInteger,
            Scalar::BigDecimal(_) => TypeRef::BigDecimal,
            Scalar::Text(_) => TypeRef::Text,
            Scalar::Enum { type_name, .. } => TypeRef::Enum(type_name.clone()),
            Scalar::Date(_) => TypeRef::Date,
            Scalar::DateTime(_) => TypeRef::DateTime,
            Scalar::Currency(_) => TypeRef::Currency,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Number(n) => serde_json::Value::Number(n.clone()),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::BigInteger(s) | Scalar::BigDecimal(s) | Scalar::Text(s) | Scalar::Currency(s) => {
                f.write_str(s)
            }
            Scalar::Enum { constant, .. } => f.write_str(constant),
            Scalar::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Scalar::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Scalar(Scalar),
    Array(Vec<Value>),
    Collection(Vec<Value>),
    Map(IndexMap<String, Value>),
    Object(Object),
    Resource(Resource),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn text(s: impl Into<String>) -> Value {
        Value::Scalar(Scalar::Text(s.into()))
    }

    pub fn int(i: i64) -> Value {
        Value::Scalar(Scalar::Number(Number::from(i)))
    }

    /// Non-finite floats have no JSON number form and become `Null`.
    pub fn float(x: f64) -> Value {
        Number::from_f64(x).map(|n| Value::Scalar(Scalar::Number(n))).unwrap_or(Value::Null)
    }

    pub fn bool(b: bool) -> Value {
        Value::Scalar(Scalar::Bool(b))
    }

    pub fn enum_constant(type_name: impl Into<String>, constant: impl Into<String>) -> Value {
        Value::Scalar(Scalar::Enum { type_name: type_name.into(), constant: constant.into() })
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// String form used in URI expansion and option lists.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Scalar(s) => Some(s.to_string()),
            Value::Array(xs) | Value::Collection(xs) => {
                let parts: Vec<String> = xs.iter().filter_map(Value::to_text).collect();
                Some(parts.join(","))
            }
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Composite bean instance: a type name plus the values of its properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub type_name: String,
    pub slots: IndexMap<String, Value>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), slots: IndexMap::new() }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.slots.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name)
    }
}

/// Resource wrapper: domain content paired with hypermedia links.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub links: Vec<Link>,
    pub content: Box<Value>,
}

impl Resource {
    pub fn new(content: impl Into<Value>) -> Self {
        Self { links: Vec::new(), content: Box::new(content.into()) }
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }
}

impl From<Resource> for Value {
    fn from(r: Resource) -> Self {
        Value::Resource(r)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LINKS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub rels: IndexSet<String>,
    /// URI template, may still contain unresolved variables.
    pub href: String,
    pub rev: Option<String>,
    pub actions: Vec<ActionDescriptor>,
}

impl Link {
    pub fn new(href: impl Into<String>, rel: impl Into<String>) -> Self {
        let mut rels = IndexSet::new();
        rels.insert(rel.into());
        Self { rels, href: href.into(), rev: None, actions: Vec::new() }
    }

    pub fn is_templated(&self) -> bool {
        crate::uri_template::UriTemplate::parse(&self.href).has_variables()
    }

    pub fn has_rel(&self, rel: &str) -> bool {
        self.rels.contains(rel)
    }
}
