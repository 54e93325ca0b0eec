//! `tessera find`: Locate a resource or class as seen from a module.

use super::{build_loader, report_failures, LoaderArgs};
use crate::output::StyledOutput;
use tessera_core::{class_path, LookupMode, ModuleIdentifier, Resource};

/// What to look up and how
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub path: String,
    pub mode: LookupMode,
    /// Report every match instead of the first
    pub all: bool,
    /// Treat `path` as a dotted class name
    pub class: bool,
}

/// Returns `false` when nothing matched.
pub fn execute(
    args: &LoaderArgs,
    module: &ModuleIdentifier,
    options: &FindOptions,
    out: &mut StyledOutput,
) -> anyhow::Result<bool> {
    let loader = build_loader(args)?;
    let module = loader.load_module(module)?;

    let path = if options.class {
        class_path(&options.path)
    } else {
        options.path.clone()
    };

    let found: Vec<Resource> = if options.all {
        let enumeration = module.find_resources(&path, options.mode);
        report_failures(out, &enumeration);
        enumeration.into_resources()
    } else {
        module.find_resource(&path, options.mode)?.into_iter().collect()
    };

    for resource in &found {
        print_resource(out, resource);
    }
    out.flush();
    Ok(!found.is_empty())
}

fn print_resource(out: &mut StyledOutput, resource: &Resource) {
    out.plain(resource.path());
    out.dim("  ");
    out.info(&resource.module().identifier().to_string());
    out.dim(&format!("  {}", resource.location()));
    out.newline();
}
