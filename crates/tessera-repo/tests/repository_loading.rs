//! Integration tests for repository- and archive-backed loading

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tessera_core::{LookupMode, ModuleError, ModuleIdentifier, ModuleLoader};
use tessera_repo::{archive_module_loader, LoaderConfig, RepositoryFinder, CONFIG_FILE};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn write_jar(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Repository with:
/// - `org.example:lib:1.0`: classes dir, exports `api/**` only
/// - `org.example:app:1.0`: classes dir, imports lib, re-exports it minus `api/internal/**`
fn create_repository() -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    let repo = temp.path().join("modules");

    let lib = repo.join("org/example/lib/1.0");
    write(
        &lib.join("module.toml"),
        r#"
[module]
group = "org.example"
name = "lib"
slot = "1.0"

[[roots]]
name = "classes"
path = "classes"

[exports]
rules = [{ include = "api/**" }]
"#,
    );
    write(&lib.join("classes/api/Service.class"), "service");
    write(&lib.join("classes/api/internal/Helper.class"), "helper");
    write(&lib.join("classes/impl/ServiceImpl.class"), "impl");

    let app = repo.join("org/example/app/1.0");
    write(
        &app.join("module.toml"),
        r#"
[module]
group = "org.example"
name = "app"
slot = "1.0"

[[roots]]
name = "classes"
path = "classes"

[[dependencies]]
module = "org.example:lib:1.0"
export = true
export-filter = { rules = [{ exclude = "api/internal/**" }] }
"#,
    );
    write(&app.join("classes/app/Main.class"), "main");

    write(
        &temp.path().join(CONFIG_FILE),
        "repositories = [\"modules\"]\n",
    );
    temp
}

fn lib_id() -> ModuleIdentifier {
    ModuleIdentifier::new("org.example", "lib", "1.0")
}

fn app_id() -> ModuleIdentifier {
    ModuleIdentifier::new("org.example", "app", "1.0")
}

fn paths(module: &tessera_core::Module, mode: LookupMode) -> Vec<String> {
    module
        .classpath(mode)
        .iter()
        .map(|r| r.path().to_string())
        .collect()
}

#[test]
fn test_load_from_repository() {
    let temp = create_repository();
    let config = LoaderConfig::from_file(&temp.path().join(CONFIG_FILE)).unwrap();
    let loader = config.build_loader("repo", None).unwrap();

    let app = loader.load_module(&app_id()).unwrap();
    assert!(loader.is_loaded(&lib_id()));

    let main = app.get_resource("app/Main.class").unwrap().unwrap();
    assert_eq!(main.read().unwrap(), b"main");

    // lib's own export filter hides impl/ from app
    assert!(app.get_resource("api/Service.class").unwrap().is_some());
    assert!(app.get_resource("impl/ServiceImpl.class").unwrap().is_none());

    // app's re-export additionally hides api/internal/
    assert!(app.get_resource("api/internal/Helper.class").unwrap().is_some());
    assert!(app
        .get_exported_resource("api/internal/Helper.class")
        .unwrap()
        .is_none());

    assert_eq!(
        paths(&app, LookupMode::ExportedOnly),
        vec!["app/Main.class", "api/Service.class"]
    );
}

#[test]
fn test_available_modules() {
    let temp = create_repository();
    let finder = RepositoryFinder::new(vec![temp.path().join("modules")]);
    assert_eq!(finder.available_modules(), vec![app_id(), lib_id()]);
}

#[test]
fn test_descriptor_identity_mismatch() {
    let temp = create_repository();
    let wrong = temp.path().join("modules/org/example/other/1.0/module.toml");
    write(&wrong, "[module]\ngroup = \"org.example\"\nname = \"lib\"\nslot = \"1.0\"\n");

    let loader = ModuleLoader::new("repo")
        .with_finder(RepositoryFinder::new(vec![temp.path().join("modules")]));
    assert!(matches!(
        loader.load_module(&ModuleIdentifier::new("org.example", "other", "1.0")),
        Err(ModuleError::SpecLoad { .. })
    ));
}

#[test]
fn test_missing_repository_dependency() {
    let temp = create_repository();
    fs::remove_dir_all(temp.path().join("modules/org/example/lib")).unwrap();

    let loader = ModuleLoader::new("repo")
        .with_finder(RepositoryFinder::new(vec![temp.path().join("modules")]));
    match loader.load_module(&app_id()) {
        Err(ModuleError::ModuleNotFound { identifier, chain }) => {
            assert_eq!(identifier, lib_id());
            assert_eq!(chain, vec![app_id()]);
        }
        other => panic!("expected ModuleNotFound, got {:?}", other),
    }
}

#[test]
fn test_archive_module_loader_delegates_to_parent() {
    let temp = create_repository();
    let config = LoaderConfig::from_file(&temp.path().join(CONFIG_FILE)).unwrap();
    let parent = Arc::new(config.build_loader("repo", None).unwrap());

    let jar = temp.path().join("plugin.jar");
    write_jar(
        &jar,
        &[
            ("plugin/Plugin.class", "plugin"),
            (
                "META-INF/module.toml",
                "[module]\nname = \"ignored\"\n\n[[dependencies]]\nmodule = \"org.example:lib:1.0\"\n",
            ),
        ],
    );

    let archive = archive_module_loader(Arc::clone(&parent), &jar).unwrap();
    assert_eq!(archive.identifier(), &ModuleIdentifier::from_name("plugin.jar"));

    let plugin = archive.load_main().unwrap();
    assert!(plugin.get_resource("plugin/Plugin.class").unwrap().is_some());
    assert!(plugin.get_resource("api/Service.class").unwrap().is_some());

    // The dependency is owned by the parent
    assert!(parent.is_loaded(&lib_id()));
    assert!(!archive.loader().is_loaded(&lib_id()));

    // Other identifiers go straight to the parent
    let app = archive.load_module(&app_id()).unwrap();
    assert!(Arc::ptr_eq(&app, &parent.load_module(&app_id()).unwrap()));
}

#[test]
fn test_configured_archive_module() {
    let temp = create_repository();
    write_jar(&temp.path().join("tool.zip"), &[("tool.txt", "tool")]);
    write(
        &temp.path().join(CONFIG_FILE),
        "repositories = [\"modules\"]\narchives = [\"tool.zip\"]\n",
    );

    let config = LoaderConfig::from_file(&temp.path().join(CONFIG_FILE)).unwrap();
    assert_eq!(
        config.archive_modules().unwrap(),
        vec![ModuleIdentifier::from_name("tool.zip")]
    );

    let loader = config.build_loader("repo", None).unwrap();
    let tool = loader
        .load_module(&ModuleIdentifier::from_name("tool.zip"))
        .unwrap();
    assert_eq!(
        tool.get_resource("tool.txt").unwrap().unwrap().read().unwrap(),
        b"tool"
    );
}
