//! HAL with HAL-Forms `_templates`.
use serde_json::{Map, Value as Json, json};
use tracing::debug;

use super::{Decorator, JsonBuilder, Opening, drive, value_json};
use crate::action::{ActionDescriptor, ActionInputParameter, Cardinality, ConstraintKey};
use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::registry::{HttpMethod, Registry};
use crate::value::{Link, Value};

const EMITTER: &str = "HAL-Forms";

pub fn render(root: &Value, registry: &Registry, config: &RenderConfig) -> Result<Json> {
    let mut builder = JsonBuilder::new(HalForms { config }, config);
    drive(&mut builder, root, registry)?;
    Ok(builder.finish())
}

struct HalForms<'a> {
    config: &'a RenderConfig,
}

impl Decorator for HalForms<'_> {
    fn open(&mut self, _opening: Opening<'_>, links: &[Link], target: &mut Map<String, Json>) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        target.insert("_links".to_string(), links_json(links));
        let templates = templates_json(links, self.config)?;
        if !templates.is_empty() {
            debug!(templates = templates.len(), "HAL-Forms templates");
            target.insert("_templates".to_string(), Json::Object(templates));
        }
        Ok(())
    }

    fn content_key(&self, _collection: bool) -> String {
        "content".to_string()
    }
}

/// `_links` keyed by rel; a rel shared by several links becomes an array.
fn links_json(links: &[Link]) -> Json {
    let mut out = Map::new();
    for link in links {
        let mut entry = json!({ "href": link.href });
        if link.is_templated() {
            entry["templated"] = Json::Bool(true);
        }
        for rel in &link.rels {
            match out.get_mut(rel) {
                None => {
                    out.insert(rel.clone(), entry.clone());
                }
                Some(Json::Array(items)) => items.push(entry.clone()),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Json::Array(vec![first, entry.clone()]);
                }
            }
        }
    }
    Json::Object(out)
}

fn templates_json(links: &[Link], config: &RenderConfig) -> Result<Map<String, Json>> {
    let mut out = Map::new();
    for link in links {
        for action in &link.actions {
            let mut key = if out.is_empty() { config.hal_forms_default_template.clone() } else { action.name.clone() };
            let mut n = 1;
            while out.contains_key(&key) {
                n += 1;
                key = format!("{}_{n}", action.name);
            }
            out.insert(key, template_json(link, action)?);
        }
    }
    Ok(out)
}

fn template_json(link: &Link, action: &ActionDescriptor) -> Result<Json> {
    if matches!(action.http_method, HttpMethod::Head | HttpMethod::Options | HttpMethod::Trace) {
        return Err(Error::unsupported(EMITTER, format!("{} action `{}`", action.http_method, action.name)));
    }
    let mut template = json!({ "method": action.http_method.as_str(), "target": link.href });
    let properties: Vec<Json> = match &action.request_body {
        Some(body) => {
            template["contentType"] = Json::from("application/json");
            body.flatten().into_iter().map(|(name, p)| property_json(&name, p, action.cardinality)).collect()
        }
        None => action.request_params.iter().map(|(name, p)| property_json(name, p, action.cardinality)).collect(),
    };
    template["properties"] = Json::Array(properties);
    Ok(template)
}

/// Option lists are capped at one pick only for single-valued inputs of
/// actions on a single resource; a collection action takes a pick per
/// member.
fn property_json(name: &str, param: &ActionInputParameter, cardinality: Cardinality) -> Json {
    let mut out = Map::new();
    out.insert("name".to_string(), Json::from(name));
    if param.required {
        out.insert("required".to_string(), Json::Bool(true));
    }
    if param.read_only {
        out.insert("readOnly".to_string(), Json::Bool(true));
    }
    out.insert("type".to_string(), Json::from(param.input_type.as_str()));
    if let Some(value) = &param.call_value {
        out.insert("value".to_string(), value_json(value));
    }
    for (key, constraint) in &param.constraints {
        let name = match key {
            ConstraintKey::Pattern => "regex",
            ConstraintKey::UpToItems => continue,
            other => other.as_str(),
        };
        out.insert(name.to_string(), constraint.to_json());
    }
    if !param.possible_values.is_empty() {
        let mut options = json!({ "inline": param.possible_values.iter().map(value_json).collect::<Vec<_>>() });
        if let Some(limit) = param.constraints.get(&ConstraintKey::UpToItems) {
            options["maxItems"] = limit.to_json();
        } else if cardinality == Cardinality::Single && !param.is_multi_valued() {
            options["maxItems"] = Json::from(1);
        }
        out.insert("options".to_string(), options);
    }
    Json::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affordance::Affordance;
    use crate::registry::{HandlerDescriptor, Input, ParamDescriptor, PropertyDescriptor, TypeDescriptor};
    use crate::value::{Object, Resource, TypeRef};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_enum("EventStatus", &["SCHEDULED", "CANCELLED"])
            .register_type(
                TypeDescriptor::new("Event")
                    .property(PropertyDescriptor::getter("name", TypeRef::Text))
                    .property(PropertyDescriptor::getter("status", TypeRef::Enum("EventStatus".into())))
                    .property(PropertyDescriptor::getter("location", TypeRef::Text)),
            )
            .register_type(
                TypeDescriptor::new("Review")
                    .property(PropertyDescriptor::getter("text", TypeRef::Text).with_input(Input { required: true, ..Input::default() }))
                    .property(PropertyDescriptor::getter("rating", TypeRef::Integer).with_input(Input { min: Some(1.0), max: Some(5.0), ..Input::default() })),
            )
            .register_type(
                TypeDescriptor::new("Address")
                    .property(PropertyDescriptor::getter("street", TypeRef::Text))
                    .property(PropertyDescriptor::getter("city", TypeRef::Text)),
            )
            .register_type(
                TypeDescriptor::new("Order")
                    .property(PropertyDescriptor::getter("quantity", TypeRef::Integer))
                    .property(PropertyDescriptor::getter("address", TypeRef::Object("Address".into()))),
            )
            .register_handler(HandlerDescriptor::new("placeOrder", HttpMethod::Post, "/orders").param(ParamDescriptor::new("order", TypeRef::Object("Order".into()))))
            .register_handler(
                HandlerDescriptor::new("rescheduleEvents", HttpMethod::Patch, "/events")
                    .param(ParamDescriptor::new("status", TypeRef::Enum("EventStatus".into())))
                    .param(ParamDescriptor::new("tags", TypeRef::Array(Box::new(TypeRef::Enum("EventStatus".into()))))),
            )
            .register_handler(HandlerDescriptor::new("getEvent", HttpMethod::Get, "/events/{id}").param(ParamDescriptor::new("id", TypeRef::Integer)))
            .register_handler(
                HandlerDescriptor::new("addReview", HttpMethod::Post, "/events/{id}/reviews")
                    .param(ParamDescriptor::new("id", TypeRef::Integer))
                    .param(ParamDescriptor::new("review", TypeRef::Object("Review".into()))),
            )
            .register_handler(HandlerDescriptor::new("eventOptions", HttpMethod::Options, "/events"));
        registry
    }

    fn event() -> Object {
        Object::new("Event")
            .with("name", "Concert")
            .with("status", Value::enum_constant("EventStatus", "SCHEDULED"))
            .with("location", Value::Null)
    }

    #[test]
    fn renders_links_templates_and_properties() {
        let registry = registry();
        let self_link = Affordance::link_to(&registry, "getEvent", &[Value::int(1)])
            .unwrap()
            .and("addReview", &[Value::int(1)])
            .unwrap()
            .build()
            .unwrap();
        let root: Value = Resource::new(event()).with_link(self_link).into();
        let out = render(&root, &registry, &RenderConfig::default()).unwrap();

        assert_eq!(out["_links"]["self"]["href"], "/events/1");
        assert_eq!(out["name"], "Concert");
        assert_eq!(out["status"], "SCHEDULED");
        assert!(out["location"].is_null());
        assert_eq!(out["_templates"]["default"]["method"], "GET");
        let review = &out["_templates"]["addReview"];
        assert_eq!(review["method"], "POST");
        assert_eq!(review["contentType"], "application/json");
        assert_eq!(review["properties"][0], json!({ "name": "text", "required": true, "type": "text" }));
        assert_eq!(review["properties"][1]["min"], 1);
        assert_eq!(review["properties"][1]["max"], 5);
    }

    #[test]
    fn nulls_can_be_suppressed() {
        let registry = registry();
        let config = RenderConfig { include_nulls: false, ..RenderConfig::default() };
        let out = render(&event().into(), &registry, &config).unwrap();
        assert!(out.get("location").is_none());
        assert_eq!(out["name"], "Concert");
    }

    #[test]
    fn shared_rel_becomes_array() {
        let registry = registry();
        let root: Value = Resource::new(event())
            .with_link(Link::new("/a", "item"))
            .with_link(Link::new("/b{?q}", "item"))
            .into();
        let out = render(&root, &registry, &RenderConfig::default()).unwrap();
        assert_eq!(out["_links"]["item"][0]["href"], "/a");
        assert_eq!(out["_links"]["item"][1]["templated"], true);
    }

    #[test]
    fn collection_content_is_wrapped() {
        let registry = registry();
        let root: Value = Resource::new(Value::Collection(vec![event().into()])).with_link(Link::new("/events", "self")).into();
        let out = render(&root, &registry, &RenderConfig::default()).unwrap();
        assert_eq!(out["_links"]["self"]["href"], "/events");
        assert_eq!(out["content"][0]["name"], "Concert");
    }

    #[test]
    fn options_method_is_unsupported() {
        let registry = registry();
        let link = Affordance::link_to(&registry, "eventOptions", &[]).unwrap().build().unwrap();
        let root: Value = Resource::new(event()).with_link(link).into();
        let err = render(&root, &registry, &RenderConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Unsupported { emitter: EMITTER, .. }));
    }

    #[test]
    fn nested_body_properties_use_dotted_names() {
        let registry = registry();
        let link = Affordance::link_to(&registry, "placeOrder", &[]).unwrap().rel("order").build().unwrap();
        let root: Value = Resource::new(event()).with_link(link).into();
        let out = render(&root, &registry, &RenderConfig::default()).unwrap();
        let names: Vec<&str> = out["_templates"]["default"]["properties"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["quantity", "address.street", "address.city"]);
    }

    #[test]
    fn collection_actions_do_not_cap_options() {
        let registry = registry();
        let options = |link: Link| {
            let root: Value = Resource::new(event()).with_link(link).into();
            let out = render(&root, &registry, &RenderConfig::default()).unwrap();
            let properties = out["_templates"]["default"]["properties"].clone();
            (properties[0]["options"].clone(), properties[1]["options"].clone())
        };
        let single = Affordance::link_to(&registry, "rescheduleEvents", &[]).unwrap().build().unwrap();
        let (status, tags) = options(single);
        assert_eq!(status["maxItems"], 1);
        assert!(tags.get("maxItems").is_none());
        assert_eq!(status["inline"], json!(["SCHEDULED", "CANCELLED"]));

        let many = Affordance::link_to(&registry, "rescheduleEvents", &[]).unwrap().collection().build().unwrap();
        let (status, tags) = options(many);
        assert!(status.get("maxItems").is_none());
        assert!(tags.get("maxItems").is_none());
        assert_eq!(status["inline"], json!(["SCHEDULED", "CANCELLED"]));
    }
}
