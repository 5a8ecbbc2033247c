//! Renders a small event catalog in every format, for eyeballing output
//! while working on the emitters.
use hypermedia_ld::registry::{HandlerDescriptor, HttpMethod, Input, ParamDescriptor, PropertyDescriptor, TypeDescriptor};
use hypermedia_ld::{Affordance, Format, Object, Registry, RenderConfig, Resource, TypeRef, Value, render};

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_enum("EventStatus", &["SCHEDULED", "CANCELLED", "POSTPONED"])
        .register_type(
            TypeDescriptor::new("Person")
                .property(PropertyDescriptor::getter("name", TypeRef::Text))
                .property(PropertyDescriptor::field("surname", TypeRef::Text).exposed("http://schema.org/familyName")),
        )
        .register_type(
            TypeDescriptor::new("Event")
                .exposed("http://schema.org/Event")
                .property(PropertyDescriptor::getter("name", TypeRef::Text))
                .property(PropertyDescriptor::getter("status", TypeRef::Enum("EventStatus".into())))
                .property(PropertyDescriptor::getter("performer", TypeRef::Object("Person".into())))
                .property(PropertyDescriptor::getter("location", TypeRef::Text)),
        )
        .register_type(
            TypeDescriptor::new("Review")
                .property(PropertyDescriptor::getter("text", TypeRef::Text).with_input(Input { required: true, ..Input::default() }))
                .property(
                    PropertyDescriptor::getter("rating", TypeRef::Integer)
                        .with_input(Input { min: Some(1.0), max: Some(5.0), ..Input::default() }),
                ),
        )
        .register_handler(
            HandlerDescriptor::new("getEvent", HttpMethod::Get, "/events/{eventId}")
                .param(ParamDescriptor::new("eventId", TypeRef::Integer)),
        )
        .register_handler(
            HandlerDescriptor::new("addReview", HttpMethod::Post, "/events/{eventId}/reviews")
                .param(ParamDescriptor::new("eventId", TypeRef::Integer))
                .param(ParamDescriptor::new("review", TypeRef::Object("Review".into()))),
        )
        .register_handler(
            HandlerDescriptor::new("findEvents", HttpMethod::Get, "/events")
                .param(ParamDescriptor::new("status", TypeRef::Enum("EventStatus".into())))
                .param(ParamDescriptor::new("page", TypeRef::Integer)),
        );
    registry
}

fn sample(registry: &Registry) -> anyhow::Result<Value> {
    let events = (1..=2)
        .map(|id| -> anyhow::Result<Value> {
            let event = Object::new("Event")
                .with("name", format!("Concert #{id}"))
                .with("status", Value::enum_constant("EventStatus", "SCHEDULED"))
                .with("performer", Object::new("Person").with("name", "Ann").with("surname", "Schulten"))
                .with("location", Value::Null);
            let link = Affordance::link_to(registry, "getEvent", &[Value::int(id)])?
                .and("addReview", &[Value::int(id)])?
                .build()?;
            Ok(Resource::new(event).with_link(link).into())
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let search = Affordance::link_to(registry, "findEvents", &[])?.rel("search").build()?;
    Ok(Resource::new(Value::Collection(events)).with_link(search).into())
}

fn main() -> anyhow::Result<()> {
    let registry = registry();
    let root = sample(&registry)?;
    let config = RenderConfig::default();
    for (label, format) in [("HAL-Forms", Format::HalForms), ("UBER", Format::Uber), ("JSON-LD", Format::JsonLd)] {
        eprintln!("—— {label} ——");
        match render(format, &root, &registry, &config) {
            Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
            Err(error) => eprintln!("❌ {error}"),
        }
    }
    Ok(())
}
