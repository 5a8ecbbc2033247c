//! JSON manifest: descriptor tables for the registry plus render config,
//! and the reader that turns input documents into `Value` graphs.
//!
//! Document conventions:
//! - `"@type": "Person"` marks a registered bean; its keys are coerced
//!   using the declared property types (enums, dates, nested beans).
//! - `"_links"` and/or `"_content"` mark a resource wrapper. Without
//!   `_content` the remaining keys are the wrapped content.
//! - a link is either `{"href", "rel"}` or an affordance
//!   `{"handler", "args", "rel", "rev", "and": [{"handler", "args"}]}`.
//! - any other object is a map, any array a collection.
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::affordance::Affordance;
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::path_de::{from_slice_with_path, from_str_with_path, from_value_at};
use crate::registry::{EnumDescriptor, HandlerDescriptor, PackageDescriptor, Registry, TypeDescriptor};
use crate::value::{Link, Object, Resource, Scalar, TypeRef, Value};

const TYPE_KEY: &str = "@type";
const LINKS_KEY: &str = "_links";
const CONTENT_KEY: &str = "_content";

// ————————————————————————————————————————————————————————————————————————————
// MANIFEST
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub config: RenderConfig,
    pub packages: Vec<PackageDescriptor>,
    pub types: Vec<TypeDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    pub handlers: Vec<HandlerDescriptor>,
}

impl Manifest {
    pub fn parse(src: &str) -> Result<Self> {
        from_str_with_path(src)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::Manifest {
            path: "$".to_string(),
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let manifest: Self = from_slice_with_path(&bytes)?;
        debug!(
            path = %path.display(),
            types = manifest.types.len(),
            handlers = manifest.handlers.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    /// Build the registry. A name declared twice in one table is a
    /// configuration error.
    pub fn registry(&self) -> Result<Registry> {
        let mut registry = Registry::new();
        unique("package", self.packages.iter().map(|p| p.name.as_str()))?;
        unique("type", self.types.iter().map(|t| t.name.as_str()))?;
        unique("enum", self.enums.iter().map(|e| e.name.as_str()))?;
        unique("handler", self.handlers.iter().map(|h| h.name.as_str()))?;
        for package in &self.packages {
            registry.register_package(package.clone());
        }
        for ty in &self.types {
            registry.register_type(ty.clone());
        }
        for en in &self.enums {
            let constants: Vec<&str> = en.constants.iter().map(String::as_str).collect();
            registry.register_enum(en.name.clone(), &constants);
        }
        for handler in &self.handlers {
            registry.register_handler(handler.clone());
        }
        Ok(registry)
    }
}

fn unique<'a>(table: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = IndexSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::configuration(name, format!("{table} declared more than once")));
        }
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENTS
// ————————————————————————————————————————————————————————————————————————————

/// Convert an input document into a `Value` graph.
pub fn document(json: &Json, registry: &Registry) -> Result<Value> {
    Reader { registry }.value(json, None, "$")
}

/// Call-site arguments for `handler`: a positional array or an object
/// keyed by parameter name (missing parameters are null).
pub fn handler_args(json: &Json, registry: &Registry, handler: &str) -> Result<Vec<Value>> {
    Reader { registry }.call_args(handler, json, "$")
}

#[derive(Debug, Deserialize)]
struct LinkSpec {
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    handler: Option<String>,
    #[serde(default)]
    args: Json,
    #[serde(default, deserialize_with = "one_or_many")]
    rel: Vec<String>,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    collection: bool,
    #[serde(default)]
    and: Vec<CallSpec>,
}

#[derive(Debug, Deserialize)]
struct CallSpec {
    handler: String,
    #[serde(default)]
    args: Json,
}

fn one_or_many<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(de)? {
        OneOrMany::One(rel) => vec![rel],
        OneOrMany::Many(rels) => rels,
    })
}

fn invalid(path: &str, message: impl Into<String>) -> Error {
    Error::Manifest { path: path.to_string(), message: message.into() }
}

struct Reader<'r> {
    registry: &'r Registry,
}

impl<'r> Reader<'r> {
    fn value(&self, json: &Json, declared: Option<&TypeRef>, path: &str) -> Result<Value> {
        if let Some(ty) = declared {
            if let Some(value) = self.coerce(json, ty, path)? {
                return Ok(value);
            }
        }
        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::bool(*b),
            Json::Number(n) => Value::Scalar(Scalar::Number(n.clone())),
            Json::String(s) => Value::text(s.as_str()),
            Json::Array(items) => Value::Collection(self.items(items, None, path)?),
            Json::Object(map) => self.object(map, None, path)?,
        })
    }

    /// Read `json` as the declared type. `None` falls back to the
    /// undeclared reading.
    fn coerce(&self, json: &Json, ty: &TypeRef, path: &str) -> Result<Option<Value>> {
        let value = match (ty, json) {
            (_, Json::Null) => Value::Null,
            (TypeRef::Enum(name), Json::String(constant)) => {
                if let Some(constants) = self.registry.enum_constants(name) {
                    if !constants.contains(constant) {
                        return Err(invalid(path, format!("`{constant}` is not a constant of {name}")));
                    }
                }
                Value::enum_constant(name.as_str(), constant.as_str())
            }
            (TypeRef::Date, Json::String(s)) => {
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| invalid(path, format!("date `{s}`: {e}")))?;
                Value::Scalar(Scalar::Date(date))
            }
            (TypeRef::DateTime, Json::String(s)) => {
                let at = DateTime::parse_from_rfc3339(s).map_err(|e| invalid(path, format!("date-time `{s}`: {e}")))?;
                Value::Scalar(Scalar::DateTime(at))
            }
            (TypeRef::Currency, Json::String(s)) => Value::Scalar(Scalar::Currency(s.clone())),
            (TypeRef::BigInteger, Json::String(s)) => Value::Scalar(Scalar::BigInteger(s.clone())),
            (TypeRef::BigInteger, Json::Number(n)) => Value::Scalar(Scalar::BigInteger(n.to_string())),
            (TypeRef::BigDecimal, Json::String(s)) => Value::Scalar(Scalar::BigDecimal(s.clone())),
            (TypeRef::BigDecimal, Json::Number(n)) => Value::Scalar(Scalar::BigDecimal(n.to_string())),
            (TypeRef::Array(item), Json::Array(items)) => Value::Array(self.items(items, Some(item.as_ref()), path)?),
            (TypeRef::Collection(item), Json::Array(items)) => Value::Collection(self.items(items, item.as_deref(), path)?),
            (TypeRef::Map(item), Json::Object(map)) if !is_marked(map) => {
                let mut entries = IndexMap::new();
                for (key, entry) in map {
                    entries.insert(key.clone(), self.value(entry, Some(item.as_ref()), &format!("{path}.{key}"))?);
                }
                Value::Map(entries)
            }
            (TypeRef::Object(name), Json::Object(map)) => self.object(map, Some(name), path)?,
            (TypeRef::Resource(inner), Json::Object(map)) if is_marked(map) => self.resource(map, Some(inner.as_ref()), path)?,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn items(&self, items: &[Json], declared: Option<&TypeRef>, path: &str) -> Result<Vec<Value>> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.value(item, declared, &format!("{path}[{i}]")))
            .collect()
    }

    fn object(&self, map: &Map<String, Json>, type_hint: Option<&str>, path: &str) -> Result<Value> {
        if is_marked(map) {
            let declared = type_hint.map(|name| TypeRef::Object(name.to_string()));
            return self.resource(map, declared.as_ref(), path);
        }
        let type_name = match map.get(TYPE_KEY) {
            Some(Json::String(name)) => Some(name.as_str()),
            Some(_) => return Err(invalid(&format!("{path}.{TYPE_KEY}"), "`@type` must be a string")),
            None => type_hint,
        };
        let Some(type_name) = type_name else {
            let mut entries = IndexMap::new();
            for (key, entry) in map {
                entries.insert(key.clone(), self.value(entry, None, &format!("{path}.{key}"))?);
            }
            return Ok(Value::Map(entries));
        };
        let properties = self.registry.readable_properties(type_name);
        let mut object = Object::new(type_name);
        for (key, entry) in map.iter().filter(|(key, _)| key.as_str() != TYPE_KEY) {
            let declared = properties.iter().find(|p| p.name == *key).map(|p| &p.ty);
            object.slots.insert(key.clone(), self.value(entry, declared, &format!("{path}.{key}"))?);
        }
        Ok(Value::Object(object))
    }

    fn resource(&self, map: &Map<String, Json>, content_type: Option<&TypeRef>, path: &str) -> Result<Value> {
        let links = match map.get(LINKS_KEY) {
            None => Vec::new(),
            Some(Json::Array(links)) => links
                .iter()
                .enumerate()
                .map(|(i, link)| self.link(link, &format!("{path}.{LINKS_KEY}[{i}]")))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(invalid(&format!("{path}.{LINKS_KEY}"), "`_links` must be an array")),
        };
        let content = match map.get(CONTENT_KEY) {
            Some(content) => self.value(content, content_type, &format!("{path}.{CONTENT_KEY}"))?,
            None => {
                let rest: Map<String, Json> =
                    map.iter().filter(|(key, _)| key.as_str() != LINKS_KEY).map(|(k, v)| (k.clone(), v.clone())).collect();
                self.value(&Json::Object(rest), content_type, path)?
            }
        };
        let mut resource = Resource::new(content);
        resource.links = links;
        Ok(resource.into())
    }

    fn link(&self, json: &Json, path: &str) -> Result<Link> {
        let spec: LinkSpec = from_value_at(json, path)?;
        match (spec.href, spec.handler) {
            (Some(href), None) => {
                let mut rels: IndexSet<String> = spec.rel.into_iter().collect();
                if rels.is_empty() {
                    rels.insert("self".to_string());
                }
                Ok(Link { rels, href, rev: spec.rev, actions: Vec::new() })
            }
            (None, Some(handler)) => {
                let args = self.call_args(&handler, &spec.args, &format!("{path}.args"))?;
                let mut affordance = Affordance::link_to(self.registry, &handler, &args)?;
                if spec.collection {
                    affordance = affordance.collection();
                }
                for (i, call) in spec.and.iter().enumerate() {
                    let args = self.call_args(&call.handler, &call.args, &format!("{path}.and[{i}].args"))?;
                    affordance = affordance.and(&call.handler, &args)?;
                }
                for rel in spec.rel {
                    affordance = affordance.rel(rel);
                }
                if let Some(rev) = spec.rev {
                    affordance = affordance.rev(rev);
                }
                affordance.build()
            }
            _ => Err(invalid(path, "a link needs exactly one of `href` or `handler`")),
        }
    }

    fn call_args(&self, handler: &str, args: &Json, path: &str) -> Result<Vec<Value>> {
        let descriptor = self
            .registry
            .handler(handler)
            .ok_or_else(|| Error::configuration(handler, "no handler registered under this name"))?;
        match args {
            Json::Null => Ok(Vec::new()),
            Json::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.value(item, descriptor.params.get(i).map(|p| &p.ty), &format!("{path}[{i}]")))
                .collect(),
            Json::Object(named) => {
                if let Some(unknown) = named.keys().find(|k| !descriptor.params.iter().any(|p| &p.name == *k)) {
                    return Err(invalid(path, format!("`{handler}` has no parameter `{unknown}`")));
                }
                descriptor
                    .params
                    .iter()
                    .map(|p| match named.get(&p.name) {
                        Some(arg) => self.value(arg, Some(&p.ty), &format!("{path}.{}", p.name)),
                        None => Ok(Value::Null),
                    })
                    .collect()
            }
            _ => Err(invalid(path, "`args` must be an array or an object")),
        }
    }
}

fn is_marked(map: &Map<String, Json>) -> bool {
    map.contains_key(LINKS_KEY) || map.contains_key(CONTENT_KEY)
}
