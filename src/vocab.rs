//! Vocabulary and term resolution.
//!
//! Precedence, lowest to highest: package declarations, class
//! declarations, per-property exposed IRIs. Results are cached in the
//! registry keyed by type name. Registering a package or type drops the
//! cache, since a context also depends on supertypes and packages.
use std::sync::{Arc, PoisonError};

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value as Json, json};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::registry::{Registry, TermDef};

pub const DEFAULT_VOCAB: &str = "http://schema.org/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyContext {
    pub vocab: String,
    /// Term name → IRI (or another term), package terms first.
    pub terms: IndexMap<String, String>,
    /// Terms carrying `@reverse` semantics.
    pub reverse_terms: IndexSet<String>,
}

impl Default for VocabularyContext {
    fn default() -> Self {
        Self { vocab: DEFAULT_VOCAB.to_string(), terms: IndexMap::new(), reverse_terms: IndexSet::new() }
    }
}

impl VocabularyContext {
    fn define(&mut self, name: &str, iri: &str, reverse: bool) {
        self.terms.insert(name.to_string(), iri.to_string());
        if reverse {
            self.reverse_terms.insert(name.to_string());
        } else {
            self.reverse_terms.shift_remove(name);
        }
    }

    pub fn is_reverse(&self, term: &str) -> bool {
        self.reverse_terms.contains(term)
    }

    /// JSON-LD `@context` object.
    pub fn to_json(&self) -> Json {
        let mut out = Map::new();
        out.insert("@vocab".to_string(), Json::from(self.vocab.clone()));
        for (name, iri) in &self.terms {
            let entry = if self.is_reverse(name) { json!({ "@reverse": iri }) } else { Json::from(iri.clone()) };
            out.insert(name.clone(), entry);
        }
        Json::Object(out)
    }
}

/// Effective vocabulary context of a registered type. Unregistered types
/// get the default vocabulary with no terms.
pub fn resolve_context(registry: &Registry, type_name: &str) -> Result<Arc<VocabularyContext>> {
    if let Some(hit) = registry.contexts.read().unwrap_or_else(PoisonError::into_inner).get(type_name) {
        trace!(type_name, "vocabulary context cache hit");
        return Ok(Arc::clone(hit));
    }
    let context = Arc::new(compute_context(registry, type_name)?);
    debug!(type_name, vocab = %context.vocab, terms = context.terms.len(), "resolved vocabulary context");
    registry
        .contexts
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(type_name.to_string(), Arc::clone(&context));
    Ok(context)
}

fn compute_context(registry: &Registry, type_name: &str) -> Result<VocabularyContext> {
    let mut context = VocabularyContext::default();
    let Some(ty) = registry.type_descriptor(type_name) else {
        return Ok(context);
    };
    let package = ty.package.as_deref().and_then(|p| registry.package(p));

    if let Some(vocab) = ty.vocab.as_ref().or_else(|| package.and_then(|p| p.vocab.as_ref())) {
        context.vocab = vocab.clone();
    }

    if let Some(package) = package {
        for term in scope_terms(&package.name, &package.term, &package.terms)? {
            context.define(&term.define, &term.as_, term.reverse);
        }
    }
    for term in scope_terms(&ty.name, &ty.term, &ty.terms)? {
        context.define(&term.define, &term.as_, term.reverse);
    }

    // Every declared property counts here, structural getters included.
    let mut names = IndexSet::new();
    for ancestor in registry.lineage(type_name).into_iter().rev() {
        names.extend(ancestor.properties.iter().map(|p| p.name.as_str()));
    }
    for name in names {
        if let Some(iri) = registry.exposed_property_iri(type_name, name) {
            context.define(name, iri, false);
        }
    }
    Ok(context)
}

/// Terms of one scope. A scope may declare a single term or a term list,
/// never both, and no key twice.
fn scope_terms<'a>(scope: &str, term: &'a Option<TermDef>, terms: &'a Option<Vec<TermDef>>) -> Result<Vec<&'a TermDef>> {
    match (term, terms) {
        (Some(_), Some(_)) => Err(Error::configuration(scope, "declares both a single term and a term list")),
        (Some(term), None) => Ok(vec![term]),
        (None, Some(terms)) => {
            let mut seen = IndexSet::new();
            for term in terms {
                if !seen.insert(term.define.as_str()) {
                    return Err(Error::configuration(scope, format!("duplicate term `{}`", term.define)));
                }
            }
            Ok(terms.iter().collect())
        }
        (None, None) => Ok(Vec::new()),
    }
}
