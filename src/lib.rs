//! Hypermedia representations of plain domain object graphs.
//!
//! A `Registry` of type and handler descriptors drives a format-neutral
//! traversal (`traverse`), vocabulary resolution for JSON-LD (`vocab`)
//! and action descriptors for affordances (`action`, `affordance`). The
//! emitters in `emit` render HAL-Forms, UBER and JSON-LD/Hydra.
pub mod action;
pub mod affordance;
pub mod classify;
pub mod cli;
pub mod config;
pub mod emit;
pub mod error;
pub mod jq_exec;
pub mod manifest;
pub mod path_de;
pub mod registry;
pub mod traverse;
pub mod uri_template;
pub mod value;
pub mod vocab;

pub use action::{ActionDescriptor, ActionInputParameter, build_action_descriptor};
pub use affordance::Affordance;
pub use classify::{Kind, classify};
pub use config::RenderConfig;
pub use emit::{Format, render};
pub use error::{Error, Result};
pub use manifest::Manifest;
pub use registry::Registry;
pub use traverse::{Flow, Leaf, Visitor, traverse};
pub use value::{Link, Object, Resource, Scalar, TypeRef, Value};
pub use vocab::{VocabularyContext, resolve_context};
