//! `tessera resolve`: Resolve a module and print its dependency tree.

use super::{build_loader, LoaderArgs};
use crate::output::StyledOutput;
use std::collections::HashSet;
use std::sync::Arc;
use tessera_core::{Module, ModuleIdentifier};

pub fn execute(args: &LoaderArgs, module: &ModuleIdentifier, out: &mut StyledOutput) -> anyhow::Result<()> {
    let loader = build_loader(args)?;
    let root = loader.load_module(module)?;

    out.bold(&root.identifier().to_string());
    out.newline();
    let mut printed = HashSet::new();
    printed.insert(root.identifier().clone());
    let mut path = vec![root.identifier().clone()];
    print_edges(&root, "", &mut path, &mut printed, out);

    let stats = loader.stats();
    out.newline();
    out.success("Resolved");
    out.dim(&format!(
        " {} ({} modules loaded, {} specs fetched)",
        root.identifier(),
        stats.loaded,
        stats.spec_fetches
    ));
    out.newline();
    out.flush();
    Ok(())
}

fn print_edges(
    module: &Arc<Module>,
    indent: &str,
    path: &mut Vec<ModuleIdentifier>,
    printed: &mut HashSet<ModuleIdentifier>,
    out: &mut StyledOutput,
) {
    let edges = module.dependencies();
    for (i, edge) in edges.iter().enumerate() {
        let last = i + 1 == edges.len();
        out.plain(indent);
        out.plain(if last { "└── " } else { "├── " });
        out.plain(&edge.target().to_string());
        if edge.spec().is_exported() {
            out.info(" (export)");
        }
        if edge.spec().is_optional() {
            out.dim(" (optional)");
        }

        let target = edge.target().clone();
        if path.contains(&target) {
            out.note(" (cycle)");
            out.newline();
            continue;
        }
        if !printed.insert(target.clone()) {
            out.dim(" (*)");
            out.newline();
            continue;
        }
        out.newline();

        if let Ok(child) = edge.module() {
            let child_indent = format!("{}{}", indent, if last { "    " } else { "│   " });
            path.push(target);
            print_edges(&child, &child_indent, path, printed, out);
            path.pop();
        }
    }
}
