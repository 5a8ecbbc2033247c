//! jq pre-filter for input documents.
use jaq_core::{compile::Undefined, load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value as Json;

use crate::error::{Error, Result};

/// Run `filter_src` over `input`, one JSON document per jq output.
pub fn run_jaq(filter_src: &str, input: &Json) -> Result<Vec<Json>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(load_error)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(compile_error)?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for item in outputs {
        let val = item.map_err(|e| Error::Jq(format!("{e:?}")))?;
        // Val's Display is JSON text.
        let json = serde_json::from_str(&val.to_string()).map_err(|e| Error::Jq(format!("jq output is not JSON: {e}")))?;
        out.push(json);
    }
    Ok(out)
}

type LoadErrors<'a> = Vec<(load::File<&'a str, ()>, load::Error<&'a str>)>;
type CompileErrors<'a> = Vec<(load::File<&'a str, ()>, Vec<(&'a str, Undefined)>)>;

fn load_error(errs: LoadErrors<'_>) -> Error {
    jq_error(errs.into_iter().map(|(_, err)| format!("cannot parse filter: {err:?}")))
}

fn compile_error(errs: CompileErrors<'_>) -> Error {
    jq_error(
        errs.into_iter()
            .flat_map(|(_, undefined)| undefined.into_iter().map(|(name, kind)| format!("`{name}` is not defined ({kind:?})"))),
    )
}

/// One `Error::Jq` listing every problem, `;`-separated.
fn jq_error(problems: impl Iterator<Item = String>) -> Error {
    Error::Jq(problems.collect::<Vec<_>>().join("; "))
}
