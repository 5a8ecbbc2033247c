//! Partial URI templates.
//!
//! Supports the subset of RFC 6570 that affordances need: simple
//! expressions `{id}`, form-style query `{?a,b}` and query continuation
//! `{&a}`. Expansion is partial: variables without a value stay in
//! template form, so an href can be half-resolved.
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

static EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([?&]?)([A-Za-z0-9_.,%]+)\}").expect("static template regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Simple(Vec<String>),
    /// `{?a,b}` (`continuation == false`) or `{&a,b}`.
    Query { continuation: bool, vars: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    parts: Vec<Part>,
}

impl UriTemplate {
    pub fn parse(src: &str) -> Self {
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in EXPRESSION.captures_iter(src) {
            let (Some(whole), Some(op), Some(body)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            if whole.start() > last {
                parts.push(Part::Literal(src[last..whole.start()].to_string()));
            }
            let vars = body.as_str().split(',').filter(|v| !v.is_empty()).map(str::to_string).collect();
            parts.push(match op.as_str() {
                "?" => Part::Query { continuation: false, vars },
                "&" => Part::Query { continuation: true, vars },
                _ => Part::Simple(vars),
            });
            last = whole.end();
        }
        if last < src.len() {
            parts.push(Part::Literal(src[last..].to_string()));
        }
        Self { parts }
    }

    pub fn has_variables(&self) -> bool {
        self.parts.iter().any(|p| !matches!(p, Part::Literal(_)))
    }

    /// Every variable name, in template order.
    pub fn variables(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Literal(_) => None,
                Part::Simple(vars) | Part::Query { vars, .. } => Some(vars.iter().map(String::as_str)),
            })
            .flatten()
            .collect()
    }

    /// Names of simple `{name}` expressions (path variables).
    pub fn path_variables(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Simple(vars) => Some(vars.iter().map(String::as_str)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn query_variables(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Query { vars, .. } => Some(vars.iter().map(String::as_str)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn has_path_variable(&self, name: &str) -> bool {
        self.path_variables().contains(&name)
    }

    /// Substitute the variables that have a value, keep the rest templated.
    pub fn expand_partial(&self, values: &IndexMap<String, String>) -> String {
        let mut out = String::new();
        let mut in_query = false;
        for part in &self.parts {
            match part {
                Part::Literal(s) => {
                    in_query |= s.contains('?');
                    out.push_str(s);
                }
                Part::Simple(vars) => {
                    let (set, unset): (Vec<&String>, Vec<&String>) =
                        vars.iter().partition(|v| values.contains_key(v.as_str()));
                    let expanded: Vec<String> = set.iter().map(|v| encode_path(&values[v.as_str()])).collect();
                    out.push_str(&expanded.join(","));
                    if !unset.is_empty() {
                        if !expanded.is_empty() {
                            out.push(',');
                        }
                        out.push('{');
                        out.push_str(&join(&unset));
                        out.push('}');
                    }
                }
                Part::Query { continuation, vars } => {
                    in_query |= *continuation;
                    let mut unset = Vec::new();
                    for var in vars {
                        match values.get(var) {
                            Some(value) => {
                                out.push(if in_query { '&' } else { '?' });
                                in_query = true;
                                out.push_str(var);
                                out.push('=');
                                out.push_str(&encode_query(value));
                            }
                            None => unset.push(var),
                        }
                    }
                    if !unset.is_empty() {
                        out.push_str(if in_query { "{&" } else { "{?" });
                        out.push_str(&join(&unset));
                        out.push('}');
                    }
                }
            }
        }
        out
    }

    /// Drop the query expressions, keep literals and path expressions.
    pub fn without_query_expressions(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Simple(vars) => {
                    out.push('{');
                    out.push_str(&vars.join(","));
                    out.push('}');
                }
                Part::Query { .. } => {}
            }
        }
        out
    }

    /// Drop every unresolved expression.
    pub fn strip_variables(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Literal(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Append `{?a,b}` (or `{&a,b}` when `base` already has a query).
pub fn append_query_variables(base: &str, names: &[&str]) -> String {
    if names.is_empty() {
        return base.to_string();
    }
    let op = if base.contains('?') { '&' } else { '?' };
    format!("{base}{{{op}{}}}", names.join(","))
}

fn join(vars: &[&String]) -> String {
    vars.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",")
}

fn encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn encode_path(value: &str) -> String {
    encode_query(value).replace('+', "%20")
}
