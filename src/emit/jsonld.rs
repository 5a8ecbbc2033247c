//! JSON-LD with Hydra operations.
//!
//! `@context` is written on the root object and on every nested object
//! whose vocabulary context differs from the enclosing one. Links become
//! `@id` (self) or `{"@id": ...}` valued properties, and their actions
//! `hydra:operation` entries.
use std::sync::Arc;

use serde_json::{Map, Value as Json, json};

use super::{Decorator, JsonBuilder, Opening, drive};
use crate::action::{ActionDescriptor, ActionInputParameter};
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::value::{Link, TypeRef, Value};
use crate::vocab::{VocabularyContext, resolve_context};

const EMITTER: &str = "JSON-LD";
pub const HYDRA_NS: &str = "http://www.w3.org/ns/hydra/core#";
/// Property carrying the scalar content of a linked resource.
pub const RDF_VALUE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#value";

pub fn render(root: &Value, registry: &Registry, config: &RenderConfig) -> Result<Json> {
    let decorator = JsonLd { registry, config, contexts: Vec::new() };
    let mut builder = JsonBuilder::new(decorator, config);
    drive(&mut builder, root, registry)?;
    Ok(builder.finish())
}

struct JsonLd<'a> {
    registry: &'a Registry,
    config: &'a RenderConfig,
    /// Context in effect for each open object.
    contexts: Vec<Arc<VocabularyContext>>,
}

impl JsonLd<'_> {
    fn links_into(&self, links: &[Link], target: &mut Map<String, Json>) -> Result<()> {
        let mut operations = Vec::new();
        for link in links {
            let ops: Vec<Json> = link.actions.iter().map(|a| self.operation(a)).collect();
            if link.has_rel("self") {
                if link.is_templated() {
                    return Err(Error::unsupported(EMITTER, format!("templated self link `{}` as @id", link.href)));
                }
                target.insert("@id".to_string(), Json::from(link.href.clone()));
                operations.extend(ops.iter().cloned());
            }
            for rel in link.rels.iter().filter(|r| r.as_str() != "self") {
                let mut node = if link.is_templated() {
                    json!({ "@type": self.config.hydra("IriTemplate"), self.config.hydra("template"): link.href })
                } else {
                    json!({ "@id": link.href })
                };
                if !ops.is_empty() {
                    node[self.config.hydra("operation")] = Json::Array(ops.clone());
                }
                target.insert(rel.clone(), node);
            }
        }
        if !operations.is_empty() {
            target.insert(self.config.hydra("operation"), Json::Array(operations));
        }
        Ok(())
    }

    fn operation(&self, action: &ActionDescriptor) -> Json {
        let hydra = |term: &str| self.config.hydra(term);
        let mut op = Map::new();
        op.insert("@type".to_string(), Json::from(action.semantic_type.clone().unwrap_or_else(|| hydra("Operation"))));
        op.insert(hydra("title"), Json::from(action.name.clone()));
        op.insert(hydra("method"), Json::from(action.http_method.as_str()));
        let expected: Vec<(String, &ActionInputParameter)> = match &action.request_body {
            Some(body) => body.flatten(),
            None => action.request_params.iter().map(|(n, p)| (n.clone(), p)).collect(),
        };
        if !expected.is_empty() {
            let supported: Vec<Json> = expected
                .iter()
                .map(|(name, p)| {
                    json!({
                        hydra("property"): p.semantic_type.clone().unwrap_or_else(|| name.clone()),
                        hydra("required"): p.required,
                        hydra("readable"): true,
                        hydra("writable"): !p.read_only,
                    })
                })
                .collect();
            let class = action
                .request_body
                .as_ref()
                .and_then(|b| match &b.declared {
                    TypeRef::Object(name) => Some(name.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| hydra("Class"));
            op.insert(hydra("expects"), json!({ "@type": class, hydra("supportedProperty"): supported }));
        }
        Json::Object(op)
    }

    fn with_hydra(&self, context: &VocabularyContext, links: &[Link]) -> Json {
        let mut json = context.to_json();
        if links.iter().any(|l| !l.actions.is_empty() || l.is_templated()) {
            json[self.config.hydra_prefix.as_str()] = Json::from(HYDRA_NS);
        }
        json
    }
}

impl Decorator for JsonLd<'_> {
    fn open(&mut self, opening: Opening<'_>, links: &[Link], target: &mut Map<String, Json>) -> Result<()> {
        let parent = self.contexts.last().cloned();
        let context = match opening {
            Opening::Object(object) => resolve_context(self.registry, &object.type_name)?,
            Opening::Map | Opening::Wrapper { .. } => parent.clone().unwrap_or_default(),
        };
        let changed = parent.as_ref().is_none_or(|p| p != &context);
        if changed || links.iter().any(|l| !l.actions.is_empty() || l.is_templated()) {
            target.insert("@context".to_string(), self.with_hydra(&context, links));
        }
        match opening {
            Opening::Object(object) => {
                let ty = self
                    .registry
                    .type_descriptor(&object.type_name)
                    .and_then(|t| t.expose.clone())
                    .unwrap_or_else(|| object.type_name.clone());
                target.insert("@type".to_string(), Json::from(ty));
            }
            Opening::Wrapper { collection: true } => {
                target.insert("@type".to_string(), Json::from(self.config.hydra("Collection")));
            }
            Opening::Wrapper { collection: false } | Opening::Map => {}
        }
        self.links_into(links, target)?;
        self.contexts.push(context);
        Ok(())
    }

    fn close(&mut self, _opening: Opening<'_>) {
        self.contexts.pop();
    }

    fn content_key(&self, collection: bool) -> String {
        if collection { self.config.hydra("member") } else { RDF_VALUE.to_string() }
    }
}
