//! End to end: manifest → registry → traversal, descriptors and emitters.
use hypermedia_ld::action::build_action_descriptor;
use hypermedia_ld::emit::{hal_forms, jsonld, uber};
use hypermedia_ld::manifest::{Manifest, document};
use hypermedia_ld::{Affordance, Flow, Leaf, Object, Registry, RenderConfig, TypeRef, Value, Visitor, resolve_context, traverse};
use serde_json::json;

const MANIFEST: &str = r#"{
    "packages": [
        { "name": "org.example.events", "term": { "define": "dc", "as": "http://purl.org/dc/elements/1.1/" } }
    ],
    "enums": [{ "name": "EventStatus", "constants": ["SCHEDULED", "CANCELLED"] }],
    "types": [
        { "name": "Person", "properties": [
            { "name": "birthDate", "type": "text" },
            { "name": "surname", "type": "text", "access": "field", "expose": "http://schema.org/familyName" }
        ]},
        { "name": "Author", "properties": [
            { "name": "lastName", "type": "text", "access": "field", "expose": "familyName" }
        ]},
        { "name": "Catalog", "package": "org.example.events",
          "term": { "define": "dc", "as": "http://purl.org/dc/terms/" },
          "properties": [{ "name": "title", "type": "text" }] },
        { "name": "FooRequestBody", "properties": [
            { "name": "bar", "type": "text" },
            { "name": "foo", "type": "integer" }
        ]}
    ],
    "handlers": [
        { "name": "getEvent", "method": "GET", "path": "/events/{eventId}",
          "params": [{ "name": "eventId", "type": "integer" }] },
        { "name": "findEvents", "method": "GET", "path": "/events",
          "params": [{ "name": "status", "type": { "enum": "EventStatus" } }] },
        { "name": "postFoo", "method": "POST", "path": "/foo",
          "params": [{ "name": "body", "type": { "object": "FooRequestBody" } }] }
    ]
}"#;

fn registry() -> Registry {
    Manifest::parse(MANIFEST).unwrap().registry().unwrap()
}

#[derive(Default)]
struct Events(Vec<String>);

impl Visitor for Events {
    fn visit_enter_object(&mut self, object: Option<&Object>) -> Flow {
        self.0.push(format!("enter {}", object.map(|o| o.type_name.as_str()).unwrap_or("map")));
        Flow::Continue
    }
    fn visit_enter_property(&mut self, name: &str, ty: &TypeRef, _leaf: Option<Leaf<'_>>) -> Flow {
        self.0.push(format!("enter {name}: {ty:?}"));
        Flow::Continue
    }
    fn visit_property(&mut self, name: &str, leaf: Leaf<'_>) -> Flow {
        self.0.push(format!("{name}={}", leaf.to_json()));
        Flow::Continue
    }
    fn visit_leave_property(&mut self, name: &str, _ty: &TypeRef) -> Flow {
        self.0.push(format!("leave {name}"));
        Flow::Continue
    }
}

fn events(root: &Value, registry: &Registry) -> Vec<String> {
    let mut events = Events::default();
    assert_eq!(traverse(&mut events, root, registry).unwrap(), Flow::Continue);
    events.0
}

#[test]
fn person_context_and_traversal() {
    let registry = registry();
    let context = resolve_context(&registry, "Person").unwrap();
    assert_eq!(context.vocab, "http://schema.org/");
    assert_eq!(context.terms.len(), 1);
    assert_eq!(context.terms["surname"], "http://schema.org/familyName");

    let person = document(&json!({ "@type": "Person", "birthDate": "1964-08-08", "surname": "Schulten" }), &registry).unwrap();
    let values: Vec<String> = events(&person, &registry).into_iter().filter(|e| e.contains('=')).collect();
    assert_eq!(values, vec![r#"birthDate="1964-08-08""#, r#"surname="Schulten""#]);
}

#[test]
fn traversal_is_idempotent() {
    let registry = registry();
    let person = document(&json!({ "@type": "Person", "birthDate": "1964-08-08", "surname": null }), &registry).unwrap();
    assert_eq!(events(&person, &registry), events(&person, &registry));
}

#[test]
fn null_and_absent_are_distinct() {
    let registry = registry();
    let with_null = document(&json!({ "kind": "x", "extra": null }), &registry).unwrap();
    let without = document(&json!({ "kind": "x" }), &registry).unwrap();
    let with_null = events(&with_null, &registry);
    assert!(with_null.contains(&"enter extra: Any".to_string()));
    assert!(with_null.contains(&"extra=null".to_string()));
    assert!(with_null.contains(&"leave extra".to_string()));
    assert!(!events(&without, &registry).iter().any(|e| e.contains("extra")));
}

#[test]
fn class_term_overrides_package_term() {
    let registry = registry();
    let context = resolve_context(&registry, "Catalog").unwrap();
    assert_eq!(context.terms["dc"], "http://purl.org/dc/terms/");
}

#[test]
fn exposed_property_keeps_its_name() {
    let registry = registry();
    let author = document(&json!({ "@type": "Author", "lastName": "Schulten" }), &registry).unwrap();
    let out = jsonld::render(&author, &registry, &RenderConfig::default()).unwrap();
    assert_eq!(out["@context"]["lastName"], "familyName");
    assert_eq!(out["lastName"], "Schulten");
}

#[test]
fn path_variable_is_required_with_or_without_value() {
    let registry = registry();
    let handler = registry.handler("getEvent").unwrap();
    for args in [vec![], vec![Value::int(1)]] {
        let descriptor = build_action_descriptor(&registry, handler, &args, "getEvent").unwrap();
        assert!(descriptor.path_variables["eventId"].required);
        assert!(descriptor.required_url_variables().contains("eventId"));
    }
}

#[test]
fn enum_options_in_declaration_order() {
    let registry = registry();
    let handler = registry.handler("findEvents").unwrap();
    let descriptor = build_action_descriptor(&registry, handler, &[], "findEvents").unwrap();
    let options: Vec<String> = descriptor.request_params["status"]
        .possible_values
        .iter()
        .filter_map(Value::to_text)
        .collect();
    assert_eq!(options, vec!["SCHEDULED", "CANCELLED"]);
}

#[test]
fn complex_body_and_uber_model() {
    let registry = registry();
    let handler = registry.handler("postFoo").unwrap();
    let descriptor = build_action_descriptor(&registry, handler, &[], "postFoo").unwrap();
    assert!(descriptor.request_body.is_some());
    assert!(descriptor.request_params.is_empty());

    let link = Affordance::link_to(&registry, "postFoo", &[]).unwrap().rel("foo").build().unwrap();
    let root = document(&json!({ "_links": [], "_content": { "k": "v" } }), &registry).unwrap();
    let Value::Resource(mut resource) = root else { panic!("expected a resource") };
    resource.links.push(link);
    let out = uber::render(&Value::Resource(resource), &registry, &RenderConfig::default()).unwrap();
    let link_item = out["uber"]["data"].as_array().unwrap().iter().find(|item| item.get("model").is_some()).unwrap();
    let model = link_item["model"].as_str().unwrap();
    assert!(model.contains("foo={foo}"));
    assert!(model.contains("bar={bar}"));
}

#[test]
fn manifest_document_renders_as_hal_forms() {
    let registry = registry();
    let doc = json!({
        "_links": [{ "handler": "getEvent", "args": [7], "and": [{ "handler": "postFoo" }] }],
        "@type": "Person",
        "birthDate": "1964-08-08",
        "surname": null
    });
    let root = document(&doc, &registry).unwrap();
    let config = RenderConfig { include_nulls: false, ..RenderConfig::default() };
    let out = hal_forms::render(&root, &registry, &config).unwrap();
    assert_eq!(out["_links"]["self"]["href"], "/events/7");
    assert_eq!(out["birthDate"], "1964-08-08");
    assert!(out.get("surname").is_none());
    assert_eq!(out["_templates"]["default"]["method"], "GET");
    assert_eq!(out["_templates"]["postFoo"]["method"], "POST");
}
