//! Representation emitters.
//!
//! Each format is a `Visitor` over the traversal events. HAL-Forms and
//! JSON-LD share `JsonBuilder`, which assembles a JSON tree and lets a
//! `Decorator` add the format's link/metadata keys whenever an object
//! opens. UBER nests everything under `data` items and has its own visitor.
pub mod hal_forms;
pub mod jsonld;
pub mod uber;

use serde_json::{Map, Value as Json};

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::traverse::{Flow, Leaf, Visitor, traverse};
use crate::value::{Link, Object, TypeRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    HalForms,
    Uber,
    JsonLd,
}

pub fn render(format: Format, root: &Value, registry: &Registry, config: &RenderConfig) -> Result<Json> {
    match format {
        Format::HalForms => hal_forms::render(root, registry, config),
        Format::Uber => uber::render(root, registry, config),
        Format::JsonLd => jsonld::render(root, registry, config),
    }
}

/// Run a visitor whose callbacks may have failed; a failure is stashed
/// in the visitor and surfaces as `Flow::Stop`.
pub(crate) fn drive<V: Visitor + Fallible>(visitor: &mut V, root: &Value, registry: &Registry) -> Result<()> {
    let flow = traverse(visitor, root, registry)?;
    match (flow, visitor.take_error()) {
        (_, Some(error)) => Err(error),
        (Flow::Continue, None) => Ok(()),
        (Flow::Stop, None) => Err(Error::unsupported("emitter", "an aborted traversal")),
    }
}

pub(crate) trait Fallible {
    fn take_error(&mut self) -> Option<Error>;
}

// ————————————————————————————————————————————————————————————————————————————
// SHARED JSON BUILDER
// ————————————————————————————————————————————————————————————————————————————

/// What is being opened.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Opening<'a> {
    Object(&'a Object),
    Map,
    /// Synthetic object around non-object content of a resource wrapper;
    /// `collection` tells collections apart from scalar, null and opaque
    /// content.
    Wrapper { collection: bool },
}

pub(crate) trait Decorator {
    /// Add format keys to a freshly opened object. `links` are the links
    /// of the resource wrapper that produced it, if any.
    fn open(&mut self, opening: Opening<'_>, links: &[Link], target: &mut Map<String, Json>) -> Result<()>;

    fn close(&mut self, _opening: Opening<'_>) {}

    /// Key holding non-object content inside a wrapper.
    fn content_key(&self, collection: bool) -> String;
}

enum Frame {
    Object { map: Map<String, Json>, wrapper: bool },
    Array(Vec<Json>),
    Property { name: String, value: Option<Json>, wrapper: bool },
}

pub(crate) struct JsonBuilder<'a, D> {
    pub(crate) decorator: D,
    config: &'a RenderConfig,
    frames: Vec<Frame>,
    /// Links waiting for the object their wrapper's content opens.
    pending: Vec<Link>,
    root: Option<Json>,
    error: Option<Error>,
}

impl<'a, D: Decorator> JsonBuilder<'a, D> {
    pub(crate) fn new(decorator: D, config: &'a RenderConfig) -> Self {
        Self { decorator, config, frames: Vec::new(), pending: Vec::new(), root: None, error: None }
    }

    pub(crate) fn finish(self) -> Json {
        self.root.unwrap_or(Json::Null)
    }

    fn fail(&mut self, error: Error) -> Flow {
        self.error = Some(error);
        Flow::Stop
    }

    fn attach(&mut self, value: Json) {
        match self.frames.last_mut() {
            Some(Frame::Array(items)) => items.push(value),
            Some(Frame::Property { value: slot, .. }) => *slot = Some(value),
            Some(Frame::Object { .. }) => {}
            None => self.root = Some(value),
        }
    }

    fn open_object(&mut self, opening: Opening<'_>, wrapper: bool) -> Flow {
        let links = std::mem::take(&mut self.pending);
        let mut map = Map::new();
        if let Err(error) = self.decorator.open(opening, &links, &mut map) {
            return self.fail(error);
        }
        self.frames.push(Frame::Object { map, wrapper });
        Flow::Continue
    }

    fn close_object(&mut self, opening: Opening<'_>) {
        if let Some(Frame::Object { map, .. }) = self.frames.pop() {
            self.decorator.close(opening);
            self.attach(Json::Object(map));
        }
    }

    /// Wrap non-object content that carries links.
    fn open_wrapper(&mut self, collection: bool) -> Flow {
        if self.pending.is_empty() {
            return Flow::Continue;
        }
        if self.open_object(Opening::Wrapper { collection }, true) == Flow::Stop {
            return Flow::Stop;
        }
        let name = self.decorator.content_key(collection);
        self.frames.push(Frame::Property { name, value: None, wrapper: true });
        Flow::Continue
    }

    fn close_wrapper(&mut self, collection: bool) {
        if matches!(self.frames.last(), Some(Frame::Property { wrapper: true, .. })) {
            self.close_property();
            if matches!(self.frames.last(), Some(Frame::Object { wrapper: true, .. })) {
                self.close_object(Opening::Wrapper { collection });
            }
        }
    }

    fn close_property(&mut self) {
        let Some(Frame::Property { name, value: Some(value), .. }) = self.frames.pop() else {
            return;
        };
        if value.is_null() && !self.config.include_nulls {
            return;
        }
        if let Some(Frame::Object { map, .. }) = self.frames.last_mut() {
            map.insert(name, value);
        }
    }
}

impl<D> Fallible for JsonBuilder<'_, D> {
    fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }
}

impl<D: Decorator> Visitor for JsonBuilder<'_, D> {
    fn visit_links(&mut self, links: &[Link]) -> Flow {
        self.pending.extend(links.iter().cloned());
        Flow::Continue
    }

    fn visit_enter_object(&mut self, object: Option<&Object>) -> Flow {
        match object {
            Some(o) => self.open_object(Opening::Object(o), false),
            None => self.open_object(Opening::Map, false),
        }
    }

    fn visit_leave_object(&mut self, object: Option<&Object>) -> Flow {
        match object {
            Some(o) => self.close_object(Opening::Object(o)),
            None => self.close_object(Opening::Map),
        }
        Flow::Continue
    }

    fn visit_enter_collection(&mut self, len: usize) -> Flow {
        if self.open_wrapper(true) == Flow::Stop {
            return Flow::Stop;
        }
        self.frames.push(Frame::Array(Vec::with_capacity(len)));
        Flow::Continue
    }

    fn visit_leave_collection(&mut self) -> Flow {
        if let Some(Frame::Array(items)) = self.frames.pop() {
            self.attach(Json::Array(items));
        }
        self.close_wrapper(true);
        Flow::Continue
    }

    fn visit_enter_property(&mut self, name: &str, _ty: &TypeRef, _leaf: Option<Leaf<'_>>) -> Flow {
        self.frames.push(Frame::Property { name: name.to_string(), value: None, wrapper: false });
        Flow::Continue
    }

    fn visit_property(&mut self, _name: &str, leaf: Leaf<'_>) -> Flow {
        self.attach(leaf.to_json());
        Flow::Continue
    }

    fn visit_leave_property(&mut self, _name: &str, _ty: &TypeRef) -> Flow {
        self.close_property();
        Flow::Continue
    }

    fn visit_value(&mut self, leaf: Leaf<'_>) -> Flow {
        if self.open_wrapper(false) == Flow::Stop {
            return Flow::Stop;
        }
        self.attach(leaf.to_json());
        self.close_wrapper(false);
        Flow::Continue
    }
}

/// JSON form of a call value (scalars and lists of scalars).
pub(crate) fn value_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Scalar(s) => s.to_json(),
        Value::Array(items) | Value::Collection(items) => Json::Array(items.iter().map(value_json).collect()),
        Value::Map(entries) => Json::Object(entries.iter().map(|(k, v)| (k.clone(), value_json(v))).collect()),
        Value::Object(o) => Json::Object(o.slots.iter().map(|(k, v)| (k.clone(), value_json(v))).collect()),
        Value::Resource(r) => value_json(&r.content),
    }
}
