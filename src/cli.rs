//! Command line: manifest + documents → hypermedia representations.
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use tracing::{debug, info};

use crate::affordance::Affordance;
use crate::config::RenderConfig;
use crate::emit::{self, Format};
use crate::manifest::{self, Manifest};
use crate::registry::Registry;
use crate::value::{Resource, Value};
use crate::vocab::resolve_context;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// render domain documents as HAL-Forms, UBER or JSON-LD, driven by a type/handler manifest
#[derive(Parser, Debug)]
#[command(name = "hypermedia-ld")]
pub struct CommandLineInterface {
    /// log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// render input documents in a hypermedia format
    Render(RenderOut),
    /// print the JSON-LD @context resolved for one or more types
    Context(ContextOut),
    /// build a single affordance link and render it
    Affordance(AffordanceOut),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    HalForms,
    Uber,
    JsonLd,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::HalForms => Format::HalForms,
            FormatArg::Uber => Format::Uber,
            FormatArg::JsonLd => Format::JsonLd,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct ManifestSettings {
    /// manifest describing packages, types, enums and handlers
    #[arg(long, short)]
    manifest: PathBuf,

    /// omit null properties instead of rendering them as null
    #[arg(long, default_value_t = false)]
    no_nulls: bool,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct RenderOut {
    #[command(flatten)]
    manifest_settings: ManifestSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    #[arg(long, short, value_enum, default_value = "hal-forms")]
    format: FormatArg,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ContextOut {
    #[command(flatten)]
    manifest_settings: ManifestSettings,

    /// registered type name
    #[arg(long = "type", short, num_args = 1.., required = true)]
    types: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct AffordanceOut {
    #[command(flatten)]
    manifest_settings: ManifestSettings,

    /// handler name
    #[arg(long)]
    handler: String,

    /// call-site argument `name=value`; the value is read as JSON when it parses, as text otherwise
    #[arg(long = "arg", value_parser = parse_key_value)]
    args: Vec<(String, String)>,

    /// link relation (repeatable); `self` when omitted
    #[arg(long)]
    rel: Vec<String>,

    #[arg(long, short, value_enum, default_value = "hal-forms")]
    format: FormatArg,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ManifestSettings {
    fn load(&self) -> Result<(Registry, RenderConfig)> {
        let manifest = Manifest::load(&self.manifest)
            .with_context(|| format!("failed to load manifest {}", self.manifest.display()))?;
        let registry = manifest.registry().context("invalid manifest")?;
        let mut config = manifest.config;
        if self.no_nulls {
            config.include_nulls = false;
        }
        Ok((registry, config))
    }
}

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(Json) -> Result<()>) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file ({source_path_str})"))?;
            let json_value = serde_json::from_str::<Json>(&source)
                .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
            match self.jq_expr.as_ref() {
                None => apply(json_value)?,
                Some(jq_expr) => {
                    let results = crate::jq_exec::run_jaq(jq_expr, &json_value).with_context(|| {
                        format!("failed to apply jq expression to source file ({source_path_str})")
                    })?;
                    for json_value in results {
                        apply(json_value)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Render(target) => {
                let (registry, config) = target.manifest_settings.load()?;
                let format = Format::from(target.format);
                let mut rendered = Vec::new();
                target.input_settings.load_process(|json| {
                    let value = manifest::document(&json, &registry)?;
                    rendered.push(emit::render(format, &value, &registry, &config)?);
                    Ok(())
                })?;
                info!(documents = rendered.len(), ?format, "rendered");
                let output = match rendered.len() {
                    1 => rendered.remove(0),
                    _ => Json::Array(rendered),
                };
                write_output(&output, target.out.as_ref())
            }
            Command::Context(target) => {
                let (registry, _) = target.manifest_settings.load()?;
                let mut contexts = Map::new();
                for type_name in &target.types {
                    let context = resolve_context(&registry, type_name)
                        .with_context(|| format!("failed to resolve the context of {type_name}"))?;
                    contexts.insert(type_name.clone(), context.to_json());
                }
                let output = match contexts.len() {
                    1 => contexts.into_iter().next().map(|(_, c)| serde_json::json!({ "@context": c })).unwrap_or_default(),
                    _ => Json::Object(contexts),
                };
                write_output(&output, None)
            }
            Command::Affordance(target) => {
                let (registry, config) = target.manifest_settings.load()?;
                let named: Map<String, Json> = target
                    .args
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::from_str(v).unwrap_or_else(|_| Json::from(v.as_str()))))
                    .collect();
                let args = manifest::handler_args(&Json::Object(named), &registry, &target.handler)?;
                debug!(handler = %target.handler, args = args.len(), "affordance arguments");
                let mut affordance = Affordance::link_to(&registry, &target.handler, &args)?;
                for rel in &target.rel {
                    affordance = affordance.rel(rel.as_str());
                }
                let link = affordance.build()?;
                let root: Value = Resource::new(Value::Map(IndexMap::new())).with_link(link).into();
                let output = emit::render(target.format.into(), &root, &registry, &config)?;
                write_output(&output, None)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(output: &Json, out: Option<&PathBuf>) -> Result<()> {
    let src = serde_json::to_string_pretty(output)?;
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &src).with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => println!("{src}"),
    }
    Ok(())
}

fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| anyhow!("expected name=value, got `{raw}`"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                return Err(anyhow!("glob pattern matched no files: {pattern}"));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
