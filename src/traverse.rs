//! Object-graph traversal.
//!
//! Walks a `Value` depth-first and reports name/type/value events to a
//! `Visitor`. The walker owns no output format; emitters are visitors.
//!
//! - Resource wrappers report their links, then the walk continues with
//!   the unwrapped content in place of the wrapper.
//! - Collections and arrays: enter, every element in order, leave.
//! - Maps and composites: enter/visit-or-recurse/leave per property.
//!   Composite properties come from the registry (getters, then uncovered
//!   fields); unregistered objects fall back to their slots.
//! - Null values are reported with `Leaf::Null`, never skipped.
//! - A `Flow::Stop` from any callback aborts the entire walk: no further
//!   events, not even the pending `leave` events of enclosing nodes.
use serde_json::Value as Json;
use tracing::{debug, trace};

use crate::classify::{Kind, classify};
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::value::{Link, Object, Scalar, TypeRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Leaf payload of a property or collection element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leaf<'a> {
    /// The null marker: present, but without a value.
    Null,
    Scalar(&'a Scalar),
    /// Object without readable properties, rendered via its string form.
    Opaque(&'a Object),
}

impl Leaf<'_> {
    pub fn is_null(&self) -> bool {
        matches!(self, Leaf::Null)
    }

    pub fn to_json(&self) -> Json {
        match self {
            Leaf::Null => Json::Null,
            Leaf::Scalar(s) => s.to_json(),
            Leaf::Opaque(o) => Json::String(o.to_string()),
        }
    }
}

/// Traversal callbacks. Every callback defaults to `Flow::Continue`.
pub trait Visitor {
    fn visit_links(&mut self, _links: &[Link]) -> Flow {
        Flow::Continue
    }

    /// Start of a composite (`Some`) or map (`None`).
    fn visit_enter_object(&mut self, _object: Option<&Object>) -> Flow {
        Flow::Continue
    }

    fn visit_leave_object(&mut self, _object: Option<&Object>) -> Flow {
        Flow::Continue
    }

    fn visit_enter_collection(&mut self, _len: usize) -> Flow {
        Flow::Continue
    }

    fn visit_leave_collection(&mut self) -> Flow {
        Flow::Continue
    }

    /// `leaf` is `Some` when the property is a leaf (scalar or null).
    fn visit_enter_property(&mut self, _name: &str, _ty: &TypeRef, _leaf: Option<Leaf<'_>>) -> Flow {
        Flow::Continue
    }

    fn visit_property(&mut self, _name: &str, _leaf: Leaf<'_>) -> Flow {
        Flow::Continue
    }

    fn visit_leave_property(&mut self, _name: &str, _ty: &TypeRef) -> Flow {
        Flow::Continue
    }

    /// Leaf reached outside a property: the root or a collection element.
    fn visit_value(&mut self, _leaf: Leaf<'_>) -> Flow {
        Flow::Continue
    }
}

/// Walk `root`, returning `Flow::Stop` if the visitor aborted the walk.
pub fn traverse<V: Visitor + ?Sized>(visitor: &mut V, root: &Value, registry: &Registry) -> Result<Flow> {
    let mut walker = Walker { registry, visitor, path: Vec::new() };
    let flow = match walker.value(root) {
        Ok(()) => Flow::Continue,
        Err(Halt::Stop) => Flow::Stop,
        Err(Halt::Failed(error)) => return Err(error),
    };
    debug!(stopped = flow == Flow::Stop, "traversal finished");
    Ok(flow)
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL
// ————————————————————————————————————————————————————————————————————————————

enum Halt {
    Stop,
    Failed(Error),
}

fn proceed(flow: Flow) -> Result<(), Halt> {
    match flow {
        Flow::Continue => Ok(()),
        Flow::Stop => Err(Halt::Stop),
    }
}

enum Segment {
    Key(String),
    Index(usize),
}

struct Walker<'a, V: ?Sized> {
    registry: &'a Registry,
    visitor: &'a mut V,
    path: Vec<Segment>,
}

impl<V: Visitor + ?Sized> Walker<'_, V> {
    fn value(&mut self, value: &Value) -> Result<(), Halt> {
        match value {
            Value::Null => proceed(self.visitor.visit_value(Leaf::Null)),
            Value::Scalar(s) => proceed(self.visitor.visit_value(Leaf::Scalar(s))),
            Value::Resource(resource) => {
                proceed(self.visitor.visit_links(&resource.links))?;
                self.value(&resource.content)
            }
            Value::Array(items) | Value::Collection(items) => {
                proceed(self.visitor.visit_enter_collection(items.len()))?;
                for (i, item) in items.iter().enumerate() {
                    self.path.push(Segment::Index(i));
                    self.value(item)?;
                    self.path.pop();
                }
                proceed(self.visitor.visit_leave_collection())
            }
            Value::Map(entries) => {
                proceed(self.visitor.visit_enter_object(None))?;
                for (key, entry) in entries {
                    self.property(key, &TypeRef::of(entry), entry)?;
                }
                proceed(self.visitor.visit_leave_object(None))
            }
            Value::Object(object) => {
                if classify(value, self.registry) == Kind::Scalar {
                    return proceed(self.visitor.visit_value(Leaf::Opaque(object)));
                }
                self.object(object)
            }
        }
    }

    fn object(&mut self, object: &Object) -> Result<(), Halt> {
        trace!(type_name = %object.type_name, path = %self.render_path(), "enter object");
        proceed(self.visitor.visit_enter_object(Some(object)))?;
        let properties = self.registry.readable_properties(&object.type_name);
        if properties.is_empty() {
            for (name, slot) in &object.slots {
                self.property(name, &TypeRef::of(slot), slot)?;
            }
        } else {
            for descriptor in properties {
                let Some(slot) = object.get(&descriptor.name) else {
                    return Err(Halt::Failed(Error::Introspection {
                        object: object.type_name.clone(),
                        property: descriptor.name.clone(),
                        path: self.render_path(),
                        message: "declared property has no readable value".to_string(),
                    }));
                };
                self.property(&descriptor.name, &descriptor.ty, slot)?;
            }
        }
        proceed(self.visitor.visit_leave_object(Some(object)))
    }

    fn property(&mut self, name: &str, ty: &TypeRef, value: &Value) -> Result<(), Halt> {
        let leaf = match (value, classify(value, self.registry)) {
            (Value::Null, _) => Some(Leaf::Null),
            (Value::Scalar(s), _) => Some(Leaf::Scalar(s)),
            (Value::Object(o), Kind::Scalar) => Some(Leaf::Opaque(o)),
            _ => None,
        };
        proceed(self.visitor.visit_enter_property(name, ty, leaf))?;
        match leaf {
            Some(leaf) => proceed(self.visitor.visit_property(name, leaf))?,
            None => {
                self.path.push(Segment::Key(name.to_string()));
                self.value(value)?;
                self.path.pop();
            }
        }
        proceed(self.visitor.visit_leave_property(name, ty))
    }

    fn render_path(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.path {
            match segment {
                Segment::Key(k) => {
                    out.push('.');
                    out.push_str(k);
                }
                Segment::Index(i) => out.push_str(&format!("[{i}]")),
            }
        }
        out
    }
}
