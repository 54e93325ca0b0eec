//! Subcommand implementations and the loader setup they share

pub mod classpath;
pub mod find;
pub mod inspect;
pub mod resolve;

use crate::output::StyledOutput;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tessera_core::{ModuleLoader, ResourceEnumeration};
use tessera_repo::{LoaderConfig, CONFIG_FILE, REPOSITORY_ENV};
use tracing::debug;

/// Where modules come from, as given on the command line
#[derive(Debug, Default, Clone)]
pub struct LoaderArgs {
    pub config: Option<PathBuf>,
    pub repositories: Vec<PathBuf>,
    pub archives: Vec<PathBuf>,
}

/// Assemble the loader configuration
///
/// `--config` if given, else `./tessera.toml` when present, else empty;
/// then `$TESSERA_REPOSITORY`, then `--repository` and `--archive` flags.
pub fn load_config(args: &LoaderArgs) -> anyhow::Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if Path::new(CONFIG_FILE).is_file() => LoaderConfig::from_file(Path::new(CONFIG_FILE))
            .with_context(|| format!("Failed to load ./{}", CONFIG_FILE))?,
        None => LoaderConfig::default(),
    };

    if let Some(list) = std::env::var_os(REPOSITORY_ENV) {
        config.add_repository_list(&list);
    }
    config.repositories.extend(args.repositories.iter().cloned());
    config.archives.extend(args.archives.iter().cloned());

    debug!(
        repositories = config.repositories.len(),
        archives = config.archives.len(),
        "loader configuration"
    );
    Ok(config)
}

/// Build the loader every command runs against
pub fn build_loader(args: &LoaderArgs) -> anyhow::Result<ModuleLoader> {
    let config = load_config(args)?;
    if config.repositories.is_empty() && config.archives.is_empty() {
        anyhow::bail!(
            "No module sources configured (use --repository, --archive, {} or ${})",
            CONFIG_FILE,
            REPOSITORY_ENV
        );
    }
    config
        .build_loader("tessera", None)
        .context("Failed to set up module loader")
}

/// Print the failures an enumeration skipped
pub fn report_failures(out: &mut StyledOutput, enumeration: &ResourceEnumeration) {
    for failure in enumeration.failures() {
        out.warning(&format!("skipped: {}", failure));
    }
}
