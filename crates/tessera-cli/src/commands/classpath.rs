//! `tessera classpath`: List every resource visible through a module.

use super::{build_loader, report_failures, LoaderArgs};
use crate::output::StyledOutput;
use tessera_core::{LookupMode, ModuleIdentifier};

pub fn execute(
    args: &LoaderArgs,
    module: &ModuleIdentifier,
    mode: LookupMode,
    prefix: Option<&str>,
    out: &mut StyledOutput,
) -> anyhow::Result<()> {
    let loader = build_loader(args)?;
    let module = loader.load_module(module)?;

    let enumeration = match prefix {
        Some(prefix) => module.list_resources(prefix, mode),
        None => module.classpath(mode),
    };
    report_failures(out, &enumeration);

    for resource in &enumeration {
        out.plain(resource.path());
        if resource.module().identifier() != module.identifier() {
            out.dim(&format!("  ({})", resource.module().identifier()));
        }
        out.newline();
    }
    out.flush();
    Ok(())
}
