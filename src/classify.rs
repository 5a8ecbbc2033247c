//! Value classification: scalar vs array/collection vs map vs composite.
use crate::registry::Registry;
use crate::value::{TypeRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Scalar,
    Array,
    Collection,
    Map,
    /// Resource wrapper, unwrapped by traversal.
    Resource,
    Composite,
}

impl Kind {
    pub fn is_leaf(self) -> bool {
        matches!(self, Kind::Null | Kind::Scalar)
    }
}

/// Classify a runtime value. Never fails: an object with no readable
/// properties (neither registered nor carried in its slots) is an opaque
/// scalar rendered through its string form.
pub fn classify(value: &Value, registry: &Registry) -> Kind {
    match value {
        Value::Null => Kind::Null,
        Value::Scalar(_) => Kind::Scalar,
        Value::Array(_) => Kind::Array,
        Value::Collection(_) => Kind::Collection,
        Value::Map(_) => Kind::Map,
        Value::Resource(_) => Kind::Resource,
        Value::Object(o) => {
            if o.slots.is_empty() && registry.readable_properties(&o.type_name).is_empty() {
                Kind::Scalar
            } else {
                Kind::Composite
            }
        }
    }
}

/// Whether a declared type holds single, directly renderable values.
pub fn is_scalar_type(ty: &TypeRef) -> bool {
    matches!(
        ty,
        TypeRef::Text
            | TypeRef::Integer
            | TypeRef::Float
            | TypeRef::Bool
            | TypeRef::Date
            | TypeRef::DateTime
            | TypeRef::Currency
            | TypeRef::BigInteger
            | TypeRef::BigDecimal
            | TypeRef::Enum(_)
    )
}
