//! UBER documents.
//!
//! Properties become `{"name", "value"}` data items, nested composites
//! and collections nest further `data`. Links become data items with
//! `rel`, `url`, `action` and, for affordances, a `model` template listing
//! the inputs the client has to fill in.
use serde_json::{Map, Value as Json, json};

use super::{Fallible, drive};
use crate::action::{ActionDescriptor, ActionInputParameter, Cardinality};
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::registry::{HttpMethod, Registry};
use crate::traverse::{Flow, Leaf, Visitor};
use crate::uri_template::UriTemplate;
use crate::value::{Link, Object, TypeRef, Value};

const EMITTER: &str = "UBER";

pub fn render(root: &Value, registry: &Registry, config: &RenderConfig) -> Result<Json> {
    let mut uber = Uber::new(config);
    drive(&mut uber, root, registry)?;
    let data = uber.frames.pop().map(|root| root.data).unwrap_or_default();
    Ok(json!({ "uber": { "version": config.uber_version, "data": data } }))
}

/// UBER verb for an HTTP method.
pub fn action_verb(method: HttpMethod) -> Result<&'static str> {
    match method {
        HttpMethod::Get => Ok("read"),
        HttpMethod::Post => Ok("append"),
        HttpMethod::Put => Ok("replace"),
        HttpMethod::Patch => Ok("partial"),
        HttpMethod::Delete => Ok("remove"),
        other => Err(Error::unsupported(EMITTER, format!("HTTP method {other}"))),
    }
}

/// Link data items: one per action, or a plain one without actions.
pub fn link_items(link: &Link) -> Result<Vec<Json>> {
    let rels: Vec<&str> = link.rels.iter().map(String::as_str).collect();
    if link.actions.is_empty() {
        let mut item = json!({ "rel": rels, "url": link.href });
        if link.is_templated() {
            item["templated"] = Json::Bool(true);
        }
        return Ok(vec![item]);
    }
    link.actions.iter().map(|action| action_item(link, &rels, action)).collect()
}

fn action_item(link: &Link, rels: &[&str], action: &ActionDescriptor) -> Result<Json> {
    let verb = action_verb(action.http_method)?;
    let (url, model) = match action.http_method {
        HttpMethod::Get => {
            let url = UriTemplate::parse(&link.href).without_query_expressions();
            let open: Vec<String> = action
                .request_params
                .values()
                .filter(|p| !p.has_value())
                .map(|p| model_token(&p.name, p, action.cardinality))
                .collect();
            let model = if open.is_empty() {
                None
            } else {
                Some(format!("{}{}", if url.contains('?') { '&' } else { '?' }, open.join("&")))
            };
            (url, model)
        }
        _ => {
            let tokens: Vec<String> = match &action.request_body {
                Some(body) => body.flatten().into_iter().map(|(name, p)| model_token(&name, p, action.cardinality)).collect(),
                None => action
                    .request_params
                    .values()
                    .filter(|p| !p.has_value())
                    .map(|p| model_token(&p.name, p, action.cardinality))
                    .collect(),
            };
            let model = if tokens.is_empty() { None } else { Some(tokens.join("&")) };
            (link.href.clone(), model)
        }
    };
    let mut item = json!({ "name": action.name, "rel": rels, "url": url, "action": verb });
    if UriTemplate::parse(&url).has_variables() {
        item["templated"] = Json::Bool(true);
    }
    if let Some(model) = model {
        item["model"] = Json::from(model);
    }
    Ok(item)
}

/// `name={name}`, or the exploded `name={name*}` for a multi-valued input
/// of an action that accepts a collection.
fn model_token(name: &str, param: &ActionInputParameter, cardinality: Cardinality) -> String {
    if cardinality == Cardinality::Collection && param.is_multi_valued() {
        format!("{name}={{{name}*}}")
    } else {
        format!("{name}={{{name}}}")
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VISITOR
// ————————————————————————————————————————————————————————————————————————————

#[derive(Default)]
struct Item {
    fields: Map<String, Json>,
    data: Vec<Json>,
    dropped: bool,
}

impl Item {
    fn into_json(mut self) -> Json {
        if !self.data.is_empty() {
            self.fields.insert("data".to_string(), Json::Array(self.data));
        }
        Json::Object(self.fields)
    }
}

enum Scope {
    Property,
    /// `true` when the collection got its own data item (nested collection).
    Collection(bool),
    /// `true` when the object got its own data item (collection element).
    Object(bool),
}

struct Uber<'a> {
    config: &'a RenderConfig,
    /// Bottom frame holds the document's top-level data.
    frames: Vec<Item>,
    scopes: Vec<Scope>,
    pending: Vec<Link>,
    error: Option<Error>,
}

impl<'a> Uber<'a> {
    fn new(config: &'a RenderConfig) -> Self {
        Self { config, frames: vec![Item::default()], scopes: Vec::new(), pending: Vec::new(), error: None }
    }

    fn in_collection(&self) -> bool {
        matches!(self.scopes.last(), Some(Scope::Collection(_)))
    }

    fn push_data(&mut self, item: Json) {
        if let Some(top) = self.frames.last_mut() {
            top.data.push(item);
        }
    }

    fn close_frame(&mut self) {
        if self.frames.len() < 2 {
            return;
        }
        if let Some(item) = self.frames.pop() {
            if !item.dropped {
                self.push_data(item.into_json());
            }
        }
    }

    /// Emit links waiting for the content of their resource wrapper.
    fn flush_links(&mut self) -> Flow {
        for link in std::mem::take(&mut self.pending) {
            match link_items(&link) {
                Ok(items) => items.into_iter().for_each(|item| self.push_data(item)),
                Err(error) => {
                    self.error = Some(error);
                    return Flow::Stop;
                }
            }
        }
        Flow::Continue
    }
}

impl Fallible for Uber<'_> {
    fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }
}

impl Visitor for Uber<'_> {
    fn visit_links(&mut self, links: &[Link]) -> Flow {
        self.pending.extend(links.iter().cloned());
        Flow::Continue
    }

    fn visit_enter_object(&mut self, _object: Option<&Object>) -> Flow {
        let element = self.in_collection();
        if element {
            self.frames.push(Item::default());
        }
        self.scopes.push(Scope::Object(element));
        self.flush_links()
    }

    fn visit_leave_object(&mut self, _object: Option<&Object>) -> Flow {
        if let Some(Scope::Object(true)) = self.scopes.pop() {
            self.close_frame();
        }
        Flow::Continue
    }

    fn visit_enter_collection(&mut self, _len: usize) -> Flow {
        let element = self.in_collection();
        if element {
            self.frames.push(Item::default());
        }
        self.scopes.push(Scope::Collection(element));
        self.flush_links()
    }

    fn visit_leave_collection(&mut self) -> Flow {
        if let Some(Scope::Collection(true)) = self.scopes.pop() {
            self.close_frame();
        }
        Flow::Continue
    }

    fn visit_enter_property(&mut self, name: &str, _ty: &TypeRef, _leaf: Option<Leaf<'_>>) -> Flow {
        let mut item = Item::default();
        item.fields.insert("name".to_string(), Json::from(name));
        self.frames.push(item);
        self.scopes.push(Scope::Property);
        Flow::Continue
    }

    fn visit_property(&mut self, _name: &str, leaf: Leaf<'_>) -> Flow {
        let include_nulls = self.config.include_nulls;
        if let Some(top) = self.frames.last_mut() {
            top.dropped = leaf.is_null() && !include_nulls;
            top.fields.insert("value".to_string(), leaf.to_json());
        }
        Flow::Continue
    }

    fn visit_leave_property(&mut self, _name: &str, _ty: &TypeRef) -> Flow {
        self.scopes.pop();
        self.close_frame();
        Flow::Continue
    }

    fn visit_value(&mut self, leaf: Leaf<'_>) -> Flow {
        if self.flush_links() == Flow::Stop {
            return Flow::Stop;
        }
        self.push_data(json!({ "value": leaf.to_json() }));
        Flow::Continue
    }
}
