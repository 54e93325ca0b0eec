//! `tessera inspect`: Show how a module was assembled.

use super::{build_loader, LoaderArgs};
use crate::output::StyledOutput;
use tessera_core::ModuleIdentifier;

pub fn execute(args: &LoaderArgs, module: &ModuleIdentifier, out: &mut StyledOutput) -> anyhow::Result<()> {
    let loader = build_loader(args)?;
    let module = loader.load_module(module)?;

    out.field("Module", &module.identifier().to_string());
    out.field("Loader", loader.name());
    out.field("Exports", &module.local_exports().to_string());

    out.newline();
    out.bold("Roots");
    out.newline();
    for root in module.roots() {
        out.plain("  ");
        out.info(root.name());
        out.dim(&format!("  {}", root.root().location()));
        out.newline();
    }

    out.newline();
    out.bold("Dependencies");
    out.newline();
    if module.dependencies().is_empty() {
        out.dim("  (none)");
        out.newline();
    }
    for edge in module.dependencies() {
        let spec = edge.spec();
        out.plain("  ");
        out.info(&edge.target().to_string());
        if spec.is_optional() {
            out.dim(" (optional)");
        }
        out.newline();
        let export = if spec.is_exported() {
            spec.export_filter().to_string()
        } else {
            "no".to_string()
        };
        out.dim(&format!("    export: {}", export));
        out.newline();
        out.dim(&format!("    import: {}", spec.import_filter()));
        out.newline();
    }

    let stats = loader.stats();
    out.newline();
    out.field("Loaded", &stats.loaded.to_string());
    out.field("Fetched", &stats.spec_fetches.to_string());
    out.field("Hit ratio", &format!("{:.2}", stats.hit_ratio()));
    out.flush();
    Ok(())
}
