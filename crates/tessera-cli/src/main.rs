//! Tessera command-line tool
//!
//! Resolves modules from repositories and archives and reports what each
//! module can see: its dependency graph, individual resources and the full
//! visible classpath.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::find::FindOptions;
use commands::LoaderArgs;
use output::{resolve_color_choice, StyledOutput};
use std::path::PathBuf;
use tessera_core::{LookupMode, ModuleIdentifier};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Module resolution and inspection", long_about = None)]
#[command(version)]
struct Cli {
    /// Loader configuration file (defaults to ./tessera.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Module repository directory (repeatable)
    #[arg(short, long = "repository", global = true)]
    repositories: Vec<PathBuf>,

    /// Archive to serve as a module named after its file (repeatable)
    #[arg(long = "archive", global = true)]
    archives: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// When to use colors: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a module and print its dependency tree
    Resolve {
        /// Module identifier (group:name:slot)
        module: ModuleIdentifier,
    },

    /// Locate a resource as seen from a module
    Find {
        /// Module identifier (group:name:slot)
        module: ModuleIdentifier,
        /// Resource path, or class name with --class
        path: String,
        /// Only consider what the module exports
        #[arg(long)]
        exported: bool,
        /// Report every match, not just the first
        #[arg(long)]
        all: bool,
        /// Treat the path as a dotted class name
        #[arg(long)]
        class: bool,
    },

    /// List every resource visible through a module
    Classpath {
        /// Module identifier (group:name:slot)
        module: ModuleIdentifier,
        /// Only consider what the module exports
        #[arg(long)]
        exported: bool,
        /// Restrict the listing to a directory prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Show a module's roots, exports and dependencies
    Inspect {
        /// Module identifier (group:name:slot)
        module: ModuleIdentifier,
    },
}

fn lookup_mode(exported: bool) -> LookupMode {
    if exported {
        LookupMode::ExportedOnly
    } else {
        LookupMode::Unrestricted
    }
}

/// Log to stderr; `-v` forces debug, otherwise `TESSERA_LOG` or `RUST_LOG`
/// decide and the default is warnings only.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TESSERA_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));
    let args = LoaderArgs {
        config: cli.config,
        repositories: cli.repositories,
        archives: cli.archives,
    };

    let result = match cli.command {
        Commands::Resolve { module } => commands::resolve::execute(&args, &module, &mut out),
        Commands::Find {
            module,
            path,
            exported,
            all,
            class,
        } => {
            let options = FindOptions {
                path,
                mode: lookup_mode(exported),
                all,
                class,
            };
            match commands::find::execute(&args, &module, &options, &mut out) {
                Ok(true) => Ok(()),
                Ok(false) => {
                    out.error(&format!("{} not found in {}", options.path, module));
                    std::process::exit(1);
                }
                Err(e) => Err(e),
            }
        }
        Commands::Classpath {
            module,
            exported,
            prefix,
        } => commands::classpath::execute(
            &args,
            &module,
            lookup_mode(exported),
            prefix.as_deref(),
            &mut out,
        ),
        Commands::Inspect { module } => commands::inspect::execute(&args, &module, &mut out),
    };

    if let Err(e) = result {
        out.error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
