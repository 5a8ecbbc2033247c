//! Metadata registry: the descriptor tables that stand in for runtime
//! reflection.
//!
//! Types, packages, enums and handlers are registered once at startup
//! (by hand or from a manifest). Capability tags such as `vocab`, `term`,
//! `expose`, `input` and `select` are plain fields on the descriptors.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::action::Cardinality;
use crate::value::{TypeRef, Value};
use crate::vocab::VocabularyContext;

/// Getter names that are structural, never data properties.
pub const STRUCTURAL_PROPERTIES: &[&str] = &["class", "links", "id"];

// ————————————————————————————————————————————————————————————————————————————
// CAPABILITY TAGS
// ————————————————————————————————————————————————————————————————————————————

/// Single term declaration: `define` is the short name, `as_` its IRI or
/// another term.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TermDef {
    pub define: String,
    #[serde(rename = "as")]
    pub as_: String,
    #[serde(default)]
    pub reverse: bool,
}

impl TermDef {
    pub fn new(define: impl Into<String>, as_: impl Into<String>) -> Self {
        Self { define: define.into(), as_: as_.into(), reverse: false }
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }
}

/// Input constraints on a handler parameter or body property. `None`
/// means unset and never reaches the constraint map.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Input {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub up_to_items: Option<u64>,
    pub required: bool,
    pub read_only: bool,
    pub hidden: bool,
    /// Body property expansion filters.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Possible values supplied by a named `Options` provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Select {
    /// Registered provider name; `None` lists `values` as-is.
    pub provider: Option<String>,
    pub values: Vec<String>,
    /// Co-parameters whose call values are handed to the provider.
    pub args: Vec<String>,
}

/// Possible-values provider. Constructed with no arguments for every
/// descriptor build that needs it.
pub trait Options {
    fn get(&self, values: &[String], args: &[Option<Value>]) -> Result<Vec<Value>, String>;
}

pub type OptionsFactory = fn() -> Box<dyn Options>;

fn construct<O: Options + Default + 'static>() -> Box<dyn Options> {
    Box::new(O::default())
}

/// Lists the static `values` of a `Select` unchanged.
#[derive(Debug, Default)]
pub struct StringOptions;

impl Options for StringOptions {
    fn get(&self, values: &[String], _args: &[Option<Value>]) -> Result<Vec<Value>, String> {
        Ok(values.iter().map(|v| Value::text(v.as_str())).collect())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DESCRIPTORS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageDescriptor {
    pub name: String,
    pub vocab: Option<String>,
    pub term: Option<TermDef>,
    pub terms: Option<Vec<TermDef>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Getter,
    /// Public field.
    Field,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub access: Access,
    /// Exposed IRI overriding the vocabulary mapping of this property.
    #[serde(default)]
    pub expose: Option<String>,
    #[serde(default)]
    pub input: Option<Input>,
}

impl PropertyDescriptor {
    pub fn getter(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty, access: Access::Getter, expose: None, input: None }
    }

    pub fn field(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { access: Access::Field, ..Self::getter(name, ty) }
    }

    pub fn exposed(mut self, iri: impl Into<String>) -> Self {
        self.expose = Some(iri.into());
        self
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.input = Some(input);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TypeDescriptor {
    pub name: String,
    pub package: Option<String>,
    /// Supertype, searched for inherited properties and exposures.
    pub parent: Option<String>,
    pub vocab: Option<String>,
    pub term: Option<TermDef>,
    pub terms: Option<Vec<TermDef>>,
    /// Exposed IRI of the type itself (`@type`).
    pub expose: Option<String>,
    pub properties: Vec<PropertyDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn in_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn vocab(mut self, vocab: impl Into<String>) -> Self {
        self.vocab = Some(vocab.into());
        self
    }

    pub fn term(mut self, term: TermDef) -> Self {
        self.term = Some(term);
        self
    }

    pub fn terms(mut self, terms: Vec<TermDef>) -> Self {
        self.terms = Some(terms);
        self
    }

    pub fn exposed(mut self, iri: impl Into<String>) -> Self {
        self.expose = Some(iri.into());
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumDescriptor {
    pub name: String,
    /// Declaration order.
    pub constants: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit parameter binding. Without one, the builder classifies the
/// parameter from the path template and its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
    Path,
    Query,
    Header,
    Body,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub binding: Option<Binding>,
    /// Header name when it differs from the parameter name.
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub input: Option<Input>,
    #[serde(default)]
    pub select: Option<Select>,
    #[serde(default)]
    pub expose: Option<String>,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty, binding: None, header: None, input: None, select: None, expose: None }
    }

    pub fn bound(mut self, binding: Binding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_input(mut self, input: Input) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }
}

/// Handler method signature plus its "http method + path template" mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct HandlerDescriptor {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub params: Vec<ParamDescriptor>,
    /// Semantic action type IRI.
    #[serde(default)]
    pub expose: Option<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
}

impl HandlerDescriptor {
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            params: Vec::new(),
            expose: None,
            cardinality: Cardinality::Single,
        }
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
pub struct Registry {
    packages: IndexMap<String, PackageDescriptor>,
    types: IndexMap<String, TypeDescriptor>,
    enums: IndexMap<String, EnumDescriptor>,
    handlers: IndexMap<String, HandlerDescriptor>,
    options: IndexMap<String, OptionsFactory>,
    /// Resolved contexts, kept for the registry's lifetime.
    pub(crate) contexts: RwLock<HashMap<String, Arc<VocabularyContext>>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_options::<StringOptions>("StringOptions");
        registry
    }

    pub fn register_package(&mut self, package: PackageDescriptor) -> &mut Self {
        self.packages.insert(package.name.clone(), package);
        self.invalidate_contexts();
        self
    }

    pub fn register_type(&mut self, ty: TypeDescriptor) -> &mut Self {
        self.types.insert(ty.name.clone(), ty);
        self.invalidate_contexts();
        self
    }

    /// Drops every cached context; one may depend on any package or supertype.
    fn invalidate_contexts(&mut self) {
        self.contexts.get_mut().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn register_enum(&mut self, name: impl Into<String>, constants: &[&str]) -> &mut Self {
        let name = name.into();
        let constants = constants.iter().map(|c| c.to_string()).collect();
        self.enums.insert(name.clone(), EnumDescriptor { name, constants });
        self
    }

    pub fn register_handler(&mut self, handler: HandlerDescriptor) -> &mut Self {
        self.handlers.insert(handler.name.clone(), handler);
        self
    }

    pub fn register_options<O: Options + Default + 'static>(&mut self, name: impl Into<String>) -> &mut Self {
        self.options.insert(name.into(), construct::<O>);
        self
    }

    pub fn package(&self, name: &str) -> Option<&PackageDescriptor> {
        self.packages.get(name)
    }

    pub fn type_descriptor(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn enum_constants(&self, name: &str) -> Option<&[String]> {
        self.enums.get(name).map(|e| e.constants.as_slice())
    }

    pub fn handler(&self, name: &str) -> Option<&HandlerDescriptor> {
        self.handlers.get(name)
    }

    pub fn handlers(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.handlers.values()
    }

    pub fn options_provider(&self, name: &str) -> Option<OptionsFactory> {
        self.options.get(name).copied()
    }

    /// `name` followed by its supertypes, most derived first. Stops at an
    /// unregistered or already visited type.
    pub fn lineage(&self, name: &str) -> Vec<&TypeDescriptor> {
        let mut out: Vec<&TypeDescriptor> = Vec::new();
        let mut next = self.types.get(name);
        while let Some(ty) = next {
            if out.iter().any(|seen| seen.name == ty.name) {
                break;
            }
            out.push(ty);
            next = ty.parent.as_deref().and_then(|p| self.types.get(p));
        }
        out
    }

    /// Readable properties of a type in traversal order: getters first
    /// (structural names excluded), then fields not already covered by a
    /// getter of the same name. Inherited declarations come before the
    /// subtype's own; a redeclaration replaces the inherited one in place.
    pub fn readable_properties(&self, name: &str) -> Vec<&PropertyDescriptor> {
        let mut getters: IndexMap<&str, &PropertyDescriptor> = IndexMap::new();
        let mut fields: IndexMap<&str, &PropertyDescriptor> = IndexMap::new();
        for ty in self.lineage(name).into_iter().rev() {
            for property in &ty.properties {
                match property.access {
                    Access::Getter if STRUCTURAL_PROPERTIES.contains(&property.name.as_str()) => {}
                    Access::Getter => {
                        getters.insert(&property.name, property);
                    }
                    Access::Field => {
                        fields.insert(&property.name, property);
                    }
                }
            }
        }
        let mut out: Vec<&PropertyDescriptor> = getters.values().copied().collect();
        out.extend(fields.iter().filter(|(name, _)| !getters.contains_key(*name)).map(|(_, p)| *p));
        out
    }

    /// Exposed IRI of a property, searching the whole supertype chain.
    pub fn exposed_property_iri(&self, type_name: &str, property: &str) -> Option<&str> {
        self.lineage(type_name)
            .into_iter()
            .flat_map(|ty| ty.properties.iter())
            .find(|p| p.name == property && p.expose.is_some())
            .and_then(|p| p.expose.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_type(
                TypeDescriptor::new("Thing")
                    .property(PropertyDescriptor::getter("class", TypeRef::Text))
                    .property(PropertyDescriptor::getter("name", TypeRef::Text).exposed("http://schema.org/name"))
                    .property(PropertyDescriptor::field("id", TypeRef::Text)),
            )
            .register_type(
                TypeDescriptor::new("Person")
                    .extends("Thing")
                    .property(PropertyDescriptor::field("name", TypeRef::Text))
                    .property(PropertyDescriptor::getter("birthDate", TypeRef::Date))
                    .property(PropertyDescriptor::field("nickname", TypeRef::Text)),
            );
        registry
    }

    fn names(props: Vec<&PropertyDescriptor>) -> Vec<&str> {
        props.into_iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn getters_precede_uncovered_fields() {
        let registry = registry();
        assert_eq!(names(registry.readable_properties("Person")), vec!["name", "birthDate", "id", "nickname"]);
    }

    #[test]
    fn structural_getters_are_excluded() {
        let registry = registry();
        assert!(!names(registry.readable_properties("Thing")).contains(&"class"));
    }

    #[test]
    fn exposure_is_inherited() {
        let registry = registry();
        assert_eq!(registry.exposed_property_iri("Person", "name"), Some("http://schema.org/name"));
        assert_eq!(registry.exposed_property_iri("Person", "nickname"), None);
    }

    #[test]
    fn lineage_survives_cycles() {
        let mut registry = Registry::new();
        registry
            .register_type(TypeDescriptor::new("A").extends("B"))
            .register_type(TypeDescriptor::new("B").extends("A"));
        assert_eq!(registry.lineage("A").len(), 2);
    }
}
