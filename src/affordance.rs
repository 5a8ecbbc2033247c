//! Affordances: links built from a handler and its call-site arguments.
//!
//! Supplied path and query values are expanded into the href; unset ones
//! stay template variables (`/events/{id}{?status}`). Each handler added
//! to the link contributes one action descriptor.
use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::action::{ActionDescriptor, Cardinality, build_action_descriptor};
use crate::error::{Error, Result};
use crate::registry::{HandlerDescriptor, Registry};
use crate::uri_template::{UriTemplate, append_query_variables};
use crate::value::{Link, Value};

pub struct Affordance<'r> {
    registry: &'r Registry,
    /// Unexpanded template of the primary handler.
    template: UriTemplate,
    href: String,
    rels: IndexSet<String>,
    rev: Option<String>,
    actions: Vec<ActionDescriptor>,
}

impl<'r> Affordance<'r> {
    /// Start a link pointing at `handler`, invoked with `args`.
    pub fn link_to(registry: &'r Registry, handler: &str, args: &[Value]) -> Result<Self> {
        let handler = lookup(registry, handler)?;
        let descriptor = build_action_descriptor(registry, handler, args, &handler.name)?;
        let (template, href) = expand_href(handler, &descriptor);
        trace!(handler = %handler.name, %href, "affordance href");
        Ok(Self {
            registry,
            template,
            href,
            rels: IndexSet::new(),
            rev: None,
            actions: vec![descriptor],
        })
    }

    pub fn rel(mut self, rel: impl Into<String>) -> Self {
        self.rels.insert(rel.into());
        self
    }

    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    /// Mark the most recently added action as targeting a collection.
    pub fn collection(mut self) -> Self {
        if let Some(last) = self.actions.pop() {
            self.actions.push(last.with_cardinality(Cardinality::Collection));
        }
        self
    }

    /// Add another operation on the same resource.
    pub fn and(mut self, handler: &str, args: &[Value]) -> Result<Self> {
        let handler = lookup(self.registry, handler)?;
        let descriptor = build_action_descriptor(self.registry, handler, args, &handler.name)?;
        self.actions.push(descriptor);
        Ok(self)
    }

    /// Finish the link. Every path variable of every action must appear as
    /// a `{name}` token of the link's template. Without a rel the link is
    /// `self`.
    pub fn build(self) -> Result<Link> {
        for action in &self.actions {
            for name in action.path_variables.keys() {
                if !self.template.has_path_variable(name) {
                    return Err(Error::configuration(
                        &action.name,
                        format!("path variable `{name}` has no `{{{name}}}` token in the link template"),
                    ));
                }
            }
        }
        let mut rels = self.rels;
        if rels.is_empty() {
            rels.insert("self".to_string());
        }
        Ok(Link { rels, href: self.href, rev: self.rev, actions: self.actions })
    }
}

fn lookup<'a>(registry: &'a Registry, handler: &str) -> Result<&'a HandlerDescriptor> {
    registry.handler(handler).ok_or_else(|| Error::configuration(handler, "no handler registered under this name"))
}

/// Handler path extended with a query group for its request parameters,
/// then partially expanded with the supplied values.
fn expand_href(handler: &HandlerDescriptor, descriptor: &ActionDescriptor) -> (UriTemplate, String) {
    let base = UriTemplate::parse(&handler.path);
    let declared: Vec<&str> = base.variables();
    let extra: Vec<&str> = descriptor
        .request_params
        .keys()
        .map(String::as_str)
        .filter(|name| !declared.contains(name))
        .collect();
    let template = UriTemplate::parse(&append_query_variables(&handler.path, &extra));

    let mut values = IndexMap::new();
    for (name, param) in descriptor.path_variables.iter().chain(descriptor.request_params.iter()) {
        if let Some(text) = param.value_text() {
            values.insert(name.clone(), text);
        }
    }
    let href = template.expand_partial(&values);
    (template, href)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HttpMethod, ParamDescriptor};
    use crate::value::TypeRef;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_handler(
                HandlerDescriptor::new("findReviews", HttpMethod::Get, "/events/{eventId}/reviews")
                    .param(ParamDescriptor::new("eventId", TypeRef::Integer))
                    .param(ParamDescriptor::new("rating", TypeRef::Integer))
                    .param(ParamDescriptor::new("sort", TypeRef::Text)),
            )
            .register_handler(
                HandlerDescriptor::new("updateEvent", HttpMethod::Put, "/events/{eventId}")
                    .param(ParamDescriptor::new("eventId", TypeRef::Integer)),
            )
            .register_handler(
                HandlerDescriptor::new("deleteOrder", HttpMethod::Delete, "/orders/{orderId}")
                    .param(ParamDescriptor::new("orderId", TypeRef::Integer)),
            )
            .register_handler(HandlerDescriptor::new("getEvent", HttpMethod::Get, "/events/{eventId}").param(ParamDescriptor::new("eventId", TypeRef::Integer)));
        registry
    }

    #[test]
    fn fixed_values_expand_and_unset_stay_templated() {
        let registry = registry();
        let link = Affordance::link_to(&registry, "findReviews", &[Value::int(1), Value::Null, "date".into()])
            .unwrap()
            .rel("reviews")
            .build()
            .unwrap();
        assert_eq!(link.href, "/events/1/reviews?sort=date{&rating}");
        assert!(link.has_rel("reviews"));
        assert!(link.is_templated());
        assert!(!link.actions[0].request_params["rating"].has_value());
    }

    #[test]
    fn unset_path_variable_stays_in_href() {
        let registry = registry();
        let link = Affordance::link_to(&registry, "getEvent", &[]).unwrap().build().unwrap();
        assert_eq!(link.href, "/events/{eventId}");
        assert!(link.has_rel("self"));
    }

    #[test]
    fn multiple_actions_and_rels() {
        let registry = registry();
        let link = Affordance::link_to(&registry, "getEvent", &[Value::int(3)])
            .unwrap()
            .and("updateEvent", &[Value::int(3)])
            .unwrap()
            .rel("self")
            .rel("event")
            .rev("performerOf")
            .build()
            .unwrap();
        assert_eq!(link.actions.len(), 2);
        assert_eq!(link.rels.len(), 2);
        assert_eq!(link.rev.as_deref(), Some("performerOf"));
    }

    #[test]
    fn foreign_path_variable_breaks_the_link_invariant() {
        let registry = registry();
        let err = Affordance::link_to(&registry, "getEvent", &[Value::int(3)])
            .unwrap()
            .and("deleteOrder", &[Value::int(9)])
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn unknown_handler() {
        let registry = registry();
        assert!(matches!(Affordance::link_to(&registry, "nope", &[]), Err(Error::Configuration { .. })));
    }
}
