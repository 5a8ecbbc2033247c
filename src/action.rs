//! Action descriptors: what an affordance lets a client do.
//!
//! `build_action_descriptor` classifies each handler parameter as path
//! variable, header, request body or request parameter (in that order),
//! derives its input type, sparse constraints and possible values, and
//! records the call-site value: `Some` means fixed, `None` means the
//! parameter stays a template variable.
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use ordered_float::OrderedFloat;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::{Binding, HandlerDescriptor, HttpMethod, Input, ParamDescriptor, Registry};
use crate::uri_template::UriTemplate;
use crate::value::{Object, TypeRef, Value};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Single,
    Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    Text,
    Number,
    Checkbox,
    Date,
    DateTime,
    Hidden,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Number => "number",
            InputType::Checkbox => "checkbox",
            InputType::Date => "date",
            InputType::DateTime => "datetime-local",
            InputType::Hidden => "hidden",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKey {
    Min,
    Max,
    Step,
    MinLength,
    MaxLength,
    Pattern,
    UpToItems,
}

impl ConstraintKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKey::Min => "min",
            ConstraintKey::Max => "max",
            ConstraintKey::Step => "step",
            ConstraintKey::MinLength => "minLength",
            ConstraintKey::MaxLength => "maxLength",
            ConstraintKey::Pattern => "pattern",
            ConstraintKey::UpToItems => "upToItems",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    Number(OrderedFloat<f64>),
    Count(u64),
    Pattern(String),
}

impl Constraint {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Constraint::Number(x) => {
                let x = x.into_inner();
                if x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
                    serde_json::Value::from(x as i64)
                } else {
                    serde_json::Value::from(x)
                }
            }
            Constraint::Count(n) => serde_json::Value::from(*n),
            Constraint::Pattern(p) => serde_json::Value::from(p.clone()),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionInputParameter {
    pub name: String,
    pub declared: TypeRef,
    /// `None`: templated/unset. `Some`: fixed at build time.
    pub call_value: Option<Value>,
    pub input_type: InputType,
    pub required: bool,
    pub read_only: bool,
    /// Only constraints that were actually declared.
    pub constraints: IndexMap<ConstraintKey, Constraint>,
    pub possible_values: Vec<Value>,
    pub semantic_type: Option<String>,
    /// Expanded properties of a composite request body.
    pub children: IndexMap<String, ActionInputParameter>,
}

impl ActionInputParameter {
    pub fn has_value(&self) -> bool {
        self.call_value.is_some()
    }

    pub fn value_text(&self) -> Option<String> {
        self.call_value.as_ref().and_then(Value::to_text)
    }

    pub fn is_multi_valued(&self) -> bool {
        self.declared.is_multi_valued()
    }

    /// Leaf parameters with dotted names (`address.street`), depth first.
    pub fn flatten(&self) -> Vec<(String, &ActionInputParameter)> {
        let mut out = Vec::new();
        flatten_into(&self.children, "", &mut out);
        out
    }
}

fn flatten_into<'a>(children: &'a IndexMap<String, ActionInputParameter>, prefix: &str, out: &mut Vec<(String, &'a ActionInputParameter)>) {
    for (name, child) in children {
        let path = if prefix.is_empty() { name.clone() } else { format!("{prefix}.{name}") };
        if child.children.is_empty() {
            out.push((path, child));
        } else {
            flatten_into(&child.children, &path, out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    pub name: String,
    pub http_method: HttpMethod,
    pub semantic_type: Option<String>,
    pub path_variables: IndexMap<String, ActionInputParameter>,
    pub request_params: IndexMap<String, ActionInputParameter>,
    pub request_headers: IndexMap<String, ActionInputParameter>,
    pub request_body: Option<ActionInputParameter>,
    pub cardinality: Cardinality,
}

impl ActionDescriptor {
    /// Path variables plus parameters flagged required. Emitters must
    /// substitute these; everything else may stay templated.
    pub fn required_url_variables(&self) -> IndexSet<&str> {
        let mut out: IndexSet<&str> = self.path_variables.keys().map(String::as_str).collect();
        out.extend(self.request_params.values().filter(|p| p.required).map(|p| p.name.as_str()));
        out
    }

    /// Look up a path variable or request parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ActionInputParameter> {
        self.path_variables.get(name).or_else(|| self.request_params.get(name))
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER
// ————————————————————————————————————————————————————————————————————————————

/// Build the descriptor of `handler` for one call site. `args` lines up
/// with `handler.params`; missing trailing arguments count as unset.
pub fn build_action_descriptor(registry: &Registry, handler: &HandlerDescriptor, args: &[Value], name: &str) -> Result<ActionDescriptor> {
    let template = UriTemplate::parse(&handler.path);
    let mut descriptor = ActionDescriptor {
        name: name.to_string(),
        http_method: handler.method,
        semantic_type: handler.expose.clone(),
        path_variables: IndexMap::new(),
        request_params: IndexMap::new(),
        request_headers: IndexMap::new(),
        request_body: None,
        cardinality: handler.cardinality,
    };

    for (i, param) in handler.params.iter().enumerate() {
        let call_value = args.get(i).filter(|v| !v.is_null()).cloned();
        match classify_param(param, &template, descriptor.request_body.is_some())? {
            Binding::Path => {
                let mut input = build_parameter(registry, param, call_value, &descriptor)?;
                input.required = true;
                descriptor.path_variables.insert(param.name.clone(), input);
            }
            Binding::Header => {
                let input = build_parameter(registry, param, call_value, &descriptor)?;
                let header = param.header.clone().unwrap_or_else(|| param.name.clone());
                descriptor.request_headers.insert(header, input);
            }
            Binding::Body => {
                if descriptor.request_body.is_some() {
                    return Err(Error::configuration(&handler.name, format!("second request body `{}`", param.name)));
                }
                let mut input = build_parameter(registry, param, call_value, &descriptor)?;
                if let TypeRef::Object(type_name) = &param.ty {
                    let mut seen = Vec::new();
                    input.children = expand_body(registry, type_name, input.call_value.as_ref(), param.input.as_ref(), &mut seen);
                }
                descriptor.request_body = Some(input);
            }
            Binding::Query => {
                let input = build_parameter(registry, param, call_value, &descriptor)?;
                descriptor.request_params.insert(param.name.clone(), input);
            }
        }
    }

    debug!(
        action = name,
        method = %descriptor.http_method,
        path_variables = descriptor.path_variables.len(),
        request_params = descriptor.request_params.len(),
        body = descriptor.request_body.is_some(),
        "built action descriptor"
    );
    Ok(descriptor)
}

fn classify_param(param: &ParamDescriptor, template: &UriTemplate, has_body: bool) -> Result<Binding> {
    if template.has_path_variable(&param.name) {
        return Ok(Binding::Path);
    }
    match param.binding {
        Some(Binding::Path) => Err(Error::configuration(
            &param.name,
            "bound as path variable but the path template has no matching `{name}` token",
        )),
        Some(binding) => Ok(binding),
        None if !has_body && matches!(param.ty, TypeRef::Object(_)) => Ok(Binding::Body),
        None => Ok(Binding::Query),
    }
}

fn build_parameter(registry: &Registry, param: &ParamDescriptor, call_value: Option<Value>, descriptor: &ActionDescriptor) -> Result<ActionInputParameter> {
    let input = param.input.clone().unwrap_or_default();
    let possible_values = possible_values(registry, param, descriptor)?;
    Ok(ActionInputParameter {
        name: param.name.clone(),
        declared: param.ty.clone(),
        call_value,
        input_type: input_type(&param.ty, &input),
        required: input.required,
        read_only: input.read_only,
        constraints: constraints(&input),
        possible_values,
        semantic_type: param.expose.clone(),
        children: IndexMap::new(),
    })
}

fn input_type(ty: &TypeRef, input: &Input) -> InputType {
    if input.hidden {
        return InputType::Hidden;
    }
    match ty {
        t if t.is_numeric() => InputType::Number,
        TypeRef::Bool => InputType::Checkbox,
        TypeRef::Date => InputType::Date,
        TypeRef::DateTime => InputType::DateTime,
        _ => InputType::Text,
    }
}

fn constraints(input: &Input) -> IndexMap<ConstraintKey, Constraint> {
    let mut out = IndexMap::new();
    let numbers = [(ConstraintKey::Min, input.min), (ConstraintKey::Max, input.max), (ConstraintKey::Step, input.step)];
    for (key, value) in numbers {
        if let Some(x) = value {
            out.insert(key, Constraint::Number(OrderedFloat(x)));
        }
    }
    let counts = [
        (ConstraintKey::MinLength, input.min_length),
        (ConstraintKey::MaxLength, input.max_length),
        (ConstraintKey::UpToItems, input.up_to_items),
    ];
    for (key, value) in counts {
        if let Some(n) = value {
            out.insert(key, Constraint::Count(n));
        }
    }
    if let Some(pattern) = &input.pattern {
        out.insert(ConstraintKey::Pattern, Constraint::Pattern(pattern.clone()));
    }
    out
}

/// Enum constants (direct, array or collection element), else a select
/// provider, else nothing.
fn possible_values(registry: &Registry, param: &ParamDescriptor, descriptor: &ActionDescriptor) -> Result<Vec<Value>> {
    if let Some(enum_name) = param.ty.enum_name() {
        if let Some(constants) = registry.enum_constants(enum_name) {
            return Ok(constants.iter().map(|c| Value::enum_constant(enum_name, c.as_str())).collect());
        }
    }
    let Some(select) = &param.select else {
        return Ok(Vec::new());
    };
    let provider_name = select.provider.as_deref().unwrap_or("StringOptions");
    let factory = registry.options_provider(provider_name).ok_or_else(|| Error::OptionsResolution {
        provider: provider_name.to_string(),
        parameter: param.name.clone(),
        message: "no provider registered under this name".to_string(),
    })?;
    let args: Vec<Option<Value>> = select
        .args
        .iter()
        .map(|arg| descriptor.parameter(arg).and_then(|p| p.call_value.clone()))
        .collect();
    factory().get(&select.values, &args).map_err(|message| Error::OptionsResolution {
        provider: provider_name.to_string(),
        parameter: param.name.clone(),
        message,
    })
}

/// Expand a composite body type into child parameters. `seen` guards
/// against type cycles.
fn expand_body(
    registry: &Registry,
    type_name: &str,
    value: Option<&Value>,
    filter: Option<&Input>,
    seen: &mut Vec<String>,
) -> IndexMap<String, ActionInputParameter> {
    let mut out = IndexMap::new();
    if seen.iter().any(|s| s == type_name) {
        return out;
    }
    seen.push(type_name.to_string());
    let object = match value {
        Some(Value::Object(o)) => Some(o),
        _ => None,
    };
    for property in registry.readable_properties(type_name) {
        if let Some(filter) = filter {
            if !filter.include.is_empty() && !filter.include.contains(&property.name) {
                continue;
            }
            if filter.exclude.contains(&property.name) {
                continue;
            }
        }
        let input = property.input.clone().unwrap_or_default();
        let call_value = object.and_then(|o: &Object| o.get(&property.name)).filter(|v| !v.is_null()).cloned();
        let possible_values = property
            .ty
            .enum_name()
            .and_then(|e| registry.enum_constants(e).map(|cs| (e, cs)))
            .map(|(e, cs)| cs.iter().map(|c| Value::enum_constant(e, c.as_str())).collect())
            .unwrap_or_default();
        let mut child = ActionInputParameter {
            name: property.name.clone(),
            declared: property.ty.clone(),
            call_value,
            input_type: input_type(&property.ty, &input),
            required: input.required,
            read_only: input.read_only,
            constraints: constraints(&input),
            possible_values,
            semantic_type: registry.exposed_property_iri(type_name, &property.name).map(str::to_string),
            children: IndexMap::new(),
        };
        if let TypeRef::Object(nested) = &property.ty {
            child.children = expand_body(registry, nested, child.call_value.as_ref(), None, seen);
        }
        out.insert(property.name.clone(), child);
    }
    seen.pop();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Options, PropertyDescriptor, Select, TypeDescriptor};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_enum("EventStatus", &["SCHEDULED", "CANCELLED"])
            .register_type(
                TypeDescriptor::new("FooRequestBody")
                    .property(PropertyDescriptor::getter("bar", TypeRef::Text))
                    .property(PropertyDescriptor::getter("foo", TypeRef::Integer)),
            )
            .register_type(
                TypeDescriptor::new("Address")
                    .property(PropertyDescriptor::getter("street", TypeRef::Text))
                    .property(PropertyDescriptor::getter("owner", TypeRef::Object("Customer".into()))),
            )
            .register_type(
                TypeDescriptor::new("Customer")
                    .property(PropertyDescriptor::getter("name", TypeRef::Text))
                    .property(PropertyDescriptor::getter("address", TypeRef::Object("Address".into()))),
            );
        registry
    }

    #[test]
    fn path_variable_is_always_required() {
        let registry = registry();
        let handler = HandlerDescriptor::new("getEvent", HttpMethod::Get, "/events/{eventId}")
            .param(ParamDescriptor::new("eventId", TypeRef::Integer));
        for args in [vec![], vec![Value::int(7)]] {
            let descriptor = build_action_descriptor(&registry, &handler, &args, "getEvent").unwrap();
            assert!(descriptor.path_variables["eventId"].required);
            assert!(descriptor.required_url_variables().contains("eventId"));
        }
    }

    #[test]
    fn complex_parameter_becomes_the_body() {
        let registry = registry();
        let handler = HandlerDescriptor::new("postFoo", HttpMethod::Post, "/foo")
            .param(ParamDescriptor::new("body", TypeRef::Object("FooRequestBody".into())));
        let descriptor = build_action_descriptor(&registry, &handler, &[], "postFoo").unwrap();
        assert!(descriptor.request_params.is_empty());
        let body = descriptor.request_body.unwrap();
        assert!(!body.has_value());
        assert_eq!(body.children.keys().collect::<Vec<_>>(), vec!["bar", "foo"]);
        assert_eq!(body.children["foo"].input_type, InputType::Number);
    }

    #[test]
    fn only_one_body_per_descriptor() {
        let registry = registry();
        let handler = HandlerDescriptor::new("h", HttpMethod::Post, "/foo")
            .param(ParamDescriptor::new("a", TypeRef::Object("FooRequestBody".into())))
            .param(ParamDescriptor::new("b", TypeRef::Object("FooRequestBody".into())));
        let descriptor = build_action_descriptor(&registry, &handler, &[], "h").unwrap();
        assert!(descriptor.request_body.is_some());
        assert!(descriptor.request_params.contains_key("b"));

        let explicit = HandlerDescriptor::new("h", HttpMethod::Post, "/foo")
            .param(ParamDescriptor::new("a", TypeRef::Object("FooRequestBody".into())))
            .param(ParamDescriptor::new("b", TypeRef::Text).bound(Binding::Body));
        assert!(matches!(build_action_descriptor(&registry, &explicit, &[], "h"), Err(Error::Configuration { .. })));
    }

    #[test]
    fn classification_order_and_parameter_order() {
        let registry = registry();
        let mut header = ParamDescriptor::new("etag", TypeRef::Text).bound(Binding::Header);
        header.header = Some("If-Match".to_string());
        let handler = HandlerDescriptor::new("update", HttpMethod::Put, "/events/{id}")
            .param(ParamDescriptor::new("q", TypeRef::Text))
            .param(ParamDescriptor::new("id", TypeRef::Integer).bound(Binding::Header))
            .param(header)
            .param(ParamDescriptor::new("a", TypeRef::Text));
        let descriptor = build_action_descriptor(&registry, &handler, &[], "update").unwrap();
        assert_eq!(descriptor.path_variables.keys().collect::<Vec<_>>(), vec!["id"]);
        assert_eq!(descriptor.request_headers.keys().collect::<Vec<_>>(), vec!["If-Match"]);
        assert_eq!(descriptor.request_params.keys().collect::<Vec<_>>(), vec!["q", "a"]);
    }

    #[test]
    fn enum_constants_in_declaration_order() {
        let registry = registry();
        let handler = HandlerDescriptor::new("find", HttpMethod::Get, "/events")
            .param(ParamDescriptor::new("status", TypeRef::Enum("EventStatus".into())))
            .param(ParamDescriptor::new("statuses", TypeRef::Collection(Some(Box::new(TypeRef::Enum("EventStatus".into()))))))
            .param(ParamDescriptor::new("flags", TypeRef::Array(Box::new(TypeRef::Enum("EventStatus".into())))));
        let descriptor = build_action_descriptor(&registry, &handler, &[], "find").unwrap();
        let expected = vec![Value::enum_constant("EventStatus", "SCHEDULED"), Value::enum_constant("EventStatus", "CANCELLED")];
        for name in ["status", "statuses", "flags"] {
            assert_eq!(descriptor.request_params[name].possible_values, expected);
        }
    }

    #[test]
    fn constraints_stay_sparse() {
        let registry = registry();
        let handler = HandlerDescriptor::new("rate", HttpMethod::Get, "/ratings")
            .param(ParamDescriptor::new("rating", TypeRef::Integer).with_input(Input { min: Some(1.0), max: Some(5.0), ..Input::default() }))
            .param(ParamDescriptor::new("comment", TypeRef::Text));
        let descriptor = build_action_descriptor(&registry, &handler, &[], "rate").unwrap();
        let rating = &descriptor.request_params["rating"];
        assert_eq!(rating.constraints.len(), 2);
        assert_eq!(rating.constraints[&ConstraintKey::Max].to_json(), serde_json::json!(5));
        assert!(descriptor.request_params["comment"].constraints.is_empty());
    }

    #[derive(Default)]
    struct CityOptions;

    impl Options for CityOptions {
        fn get(&self, _values: &[String], args: &[Option<Value>]) -> Result<Vec<Value>, String> {
            match args.first().cloned().flatten().and_then(|v| v.to_text()).as_deref() {
                Some("DE") => Ok(vec!["Berlin".into(), "Hamburg".into()]),
                Some(other) => Err(format!("unknown country {other}")),
                None => Ok(Vec::new()),
            }
        }
    }

    fn city_handler(provider: &str) -> HandlerDescriptor {
        HandlerDescriptor::new("cities", HttpMethod::Get, "/cities")
            .param(ParamDescriptor::new("country", TypeRef::Text))
            .param(ParamDescriptor::new("city", TypeRef::Text).with_select(Select {
                provider: Some(provider.to_string()),
                values: vec![],
                args: vec!["country".to_string()],
            }))
    }

    #[test]
    fn options_provider_receives_co_parameters() {
        let mut registry = registry();
        registry.register_options::<CityOptions>("CityOptions");
        let descriptor = build_action_descriptor(&registry, &city_handler("CityOptions"), &["DE".into()], "cities").unwrap();
        assert_eq!(descriptor.request_params["city"].possible_values, vec![Value::text("Berlin"), Value::text("Hamburg")]);

        let err = build_action_descriptor(&registry, &city_handler("CityOptions"), &["FR".into()], "cities").unwrap_err();
        assert!(matches!(err, Error::OptionsResolution { .. }));
    }

    #[test]
    fn unknown_provider_is_a_build_error() {
        let registry = registry();
        let err = build_action_descriptor(&registry, &city_handler("Missing"), &[], "cities").unwrap_err();
        assert!(matches!(err, Error::OptionsResolution { ref provider, .. } if provider == "Missing"));
    }

    #[test]
    fn static_select_values() {
        let registry = registry();
        let handler = HandlerDescriptor::new("h", HttpMethod::Get, "/x").param(
            ParamDescriptor::new("size", TypeRef::Text)
                .with_select(Select { values: vec!["S".into(), "M".into()], ..Select::default() }),
        );
        let descriptor = build_action_descriptor(&registry, &handler, &[], "h").unwrap();
        assert_eq!(descriptor.request_params["size"].possible_values, vec![Value::text("S"), Value::text("M")]);
    }

    #[test]
    fn body_expansion_reads_call_values_and_stops_at_cycles() {
        let registry = registry();
        let handler = HandlerDescriptor::new("register", HttpMethod::Post, "/customers")
            .param(ParamDescriptor::new("customer", TypeRef::Object("Customer".into())));
        let customer = Object::new("Customer").with("name", "Ada").with("address", Object::new("Address").with("street", "Main"));
        let descriptor = build_action_descriptor(&registry, &handler, &[customer.into()], "register").unwrap();
        let body = descriptor.request_body.unwrap();
        let flat: Vec<(String, Option<String>)> = body.flatten().into_iter().map(|(n, p)| (n, p.value_text())).collect();
        assert_eq!(
            flat,
            vec![
                ("name".to_string(), Some("Ada".to_string())),
                ("address.street".to_string(), Some("Main".to_string())),
                ("address.owner".to_string(), None),
            ]
        );
    }

    #[test]
    fn null_body_still_yields_request_body() {
        let registry = registry();
        let handler = HandlerDescriptor::new("postFoo", HttpMethod::Post, "/foo")
            .param(ParamDescriptor::new("body", TypeRef::Object("FooRequestBody".into())));
        let descriptor = build_action_descriptor(&registry, &handler, &[Value::Null], "postFoo").unwrap();
        assert!(descriptor.request_body.is_some());
    }

    #[test]
    fn explicit_path_binding_needs_a_token() {
        let registry = registry();
        let handler = HandlerDescriptor::new("h", HttpMethod::Get, "/events")
            .param(ParamDescriptor::new("id", TypeRef::Integer).bound(Binding::Path));
        assert!(matches!(build_action_descriptor(&registry, &handler, &[], "h"), Err(Error::Configuration { .. })));
    }

    #[test]
    fn body_filters_select_top_level_properties() {
        let registry = registry();
        let body = |input: Input| {
            let handler = HandlerDescriptor::new("register", HttpMethod::Post, "/customers")
                .param(ParamDescriptor::new("customer", TypeRef::Object("Customer".into())).with_input(input));
            let descriptor = build_action_descriptor(&registry, &handler, &[], "register").unwrap();
            descriptor.request_body.unwrap().flatten().into_iter().map(|(name, _)| name).collect::<Vec<_>>()
        };
        assert_eq!(body(Input { include: vec!["name".into()], ..Input::default() }), vec!["name"]);
        assert_eq!(body(Input { exclude: vec!["name".into()], ..Input::default() }), vec!["address.street", "address.owner"]);
        assert_eq!(
            body(Input { include: vec!["name".into(), "address".into()], exclude: vec!["address".into()], ..Input::default() }),
            vec!["name"]
        );
    }
}
