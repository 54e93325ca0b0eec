//! Integration tests for scoped class and resource lookup

use std::sync::Arc;
use tessera_core::{
    ClassDefiner, LookupMode, MemoryRoot, Module, ModuleError, ModuleIdentifier, ModuleLoader,
    ModuleSpec, ModuleSpecTable, ResourceRoot,
};

fn id(name: &str) -> ModuleIdentifier {
    ModuleIdentifier::new("test", name, "1.0")
}

fn with_content() -> ModuleIdentifier {
    id("test-with-content")
}

fn to_import() -> ModuleIdentifier {
    id("test-to-import")
}

fn with_export() -> ModuleIdentifier {
    id("test-with-export")
}

fn with_filtered_export() -> ModuleIdentifier {
    id("test-with-filtered-export")
}

/// Loader with four modules:
/// - `test-with-content`: root `rootOne`, imports `test-to-import`
/// - `test-to-import`: root `rootTwo`
/// - `test-with-export`: no roots, re-exports `test-to-import`
/// - `test-with-filtered-export`: re-exports `test-to-import` minus
///   the `org/example/**` packages and the `nested` directory
fn create_loader() -> ModuleLoader {
    let table = ModuleSpecTable::new();

    let mut builder = ModuleSpec::build(with_content());
    builder.add_root(
        "rootOne",
        MemoryRoot::new("rootOne")
            .with_class("org.example.test.TestClass", vec![0xCA, 0xFE, 0x01])
            .with_resource("test.txt", "local")
            .with_resource("nested/nested.txt", "local nested"),
    );
    builder.add_dependency(to_import());
    table.add_module_spec(builder.create().unwrap());

    let mut builder = ModuleSpec::build(to_import());
    builder.add_root(
        "rootOne",
        MemoryRoot::new("rootTwo")
            .with_class("org.example.test.ImportedClass", vec![0xCA, 0xFE, 0x02])
            .with_resource("testTwo.txt", "imported")
            .with_resource("nested/nested.txt", "imported nested"),
    );
    table.add_module_spec(builder.create().unwrap());

    let mut builder = ModuleSpec::build(with_export());
    builder.add_dependency(to_import()).set_export(true);
    table.add_module_spec(builder.create().unwrap());

    let mut builder = ModuleSpec::build(with_filtered_export());
    builder
        .add_dependency(to_import())
        .set_export(true)
        .export_exclude("org/example/**")
        .export_exclude("nested");
    table.add_module_spec(builder.create().unwrap());

    ModuleLoader::new("test").with_finder(table)
}

/// Records what it was asked to define
struct RecordingDefiner;

#[derive(Debug)]
struct DefinedClass {
    name: String,
    bytes: Vec<u8>,
    module: ModuleIdentifier,
}

impl ClassDefiner for RecordingDefiner {
    type Class = DefinedClass;
    type Error = String;

    fn define_class(
        &self,
        name: &str,
        bytes: &[u8],
        module: &Arc<Module>,
    ) -> Result<DefinedClass, String> {
        Ok(DefinedClass {
            name: name.to_string(),
            bytes: bytes.to_vec(),
            module: module.identifier().clone(),
        })
    }
}

struct RejectingDefiner;

impl ClassDefiner for RejectingDefiner {
    type Class = ();
    type Error = String;

    fn define_class(&self, _: &str, _: &[u8], _: &Arc<Module>) -> Result<(), String> {
        Err("bad magic".to_string())
    }
}

fn locations(module: &Module, path: &str, mode: LookupMode) -> Vec<String> {
    module
        .find_resources(path, mode)
        .iter()
        .map(|r| r.location())
        .collect()
}

// ============================================================================
// Classes
// ============================================================================

#[test]
fn test_local_class_load() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let class = module
        .load_class("org.example.test.TestClass", &RecordingDefiner)
        .unwrap()
        .expect("local class");
    assert_eq!(class.name, "org.example.test.TestClass");
    assert_eq!(class.bytes, vec![0xCA, 0xFE, 0x01]);
    assert_eq!(class.module, with_content());
}

#[test]
fn test_local_class_load_not_found() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    assert!(module
        .load_class("org.example.test.BogusClass", &RecordingDefiner)
        .unwrap()
        .is_none());
}

#[test]
fn test_import_class_load() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let class = module
        .load_class("org.example.test.ImportedClass", &RecordingDefiner)
        .unwrap()
        .expect("imported class");
    // Defined by the module that owns the bytes
    assert_eq!(class.module, to_import());
}

#[test]
fn test_export_class_load() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();
    assert!(module
        .load_exported_class("org.example.test.ImportedClass", &RecordingDefiner)
        .unwrap()
        .is_none());

    let exporting = loader.load_module(&with_export()).unwrap();
    assert!(exporting
        .load_exported_class("org.example.test.ImportedClass", &RecordingDefiner)
        .unwrap()
        .is_some());
}

#[test]
fn test_filtered_export_class_load() {
    let loader = create_loader();
    let module = loader.load_module(&with_filtered_export()).unwrap();

    assert!(module
        .load_exported_class("org.example.test.ImportedClass", &RecordingDefiner)
        .unwrap()
        .is_none());
    // The module itself still sees it
    assert!(module
        .load_class("org.example.test.ImportedClass", &RecordingDefiner)
        .unwrap()
        .is_some());
}

#[test]
fn test_class_definition_failure() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let err = module
        .load_class("org.example.test.TestClass", &RejectingDefiner)
        .unwrap_err();
    match err {
        ModuleError::ClassDefinition {
            module,
            class,
            message,
        } => {
            assert_eq!(module, with_content());
            assert_eq!(class, "org.example.test.TestClass");
            assert_eq!(message, "bad magic");
        }
        other => panic!("expected ClassDefinition, got {:?}", other),
    }
}

// ============================================================================
// Single resources
// ============================================================================

#[test]
fn test_local_resource_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let resource = module.get_resource("test.txt").unwrap().expect("local resource");
    assert_eq!(resource.read().unwrap(), b"local");
    assert!(module.get_resource("bogus.txt").unwrap().is_none());
}

#[test]
fn test_import_resource_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let resource = module.get_resource("testTwo.txt").unwrap().expect("imported resource");
    assert_eq!(resource.module().identifier(), &to_import());
}

#[test]
fn test_export_resource_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();
    assert!(module.get_exported_resource("testTwo.txt").unwrap().is_none());

    let exporting = loader.load_module(&with_export()).unwrap();
    assert!(exporting.get_exported_resource("testTwo.txt").unwrap().is_some());
}

#[test]
fn test_filtered_export_resource_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_filtered_export()).unwrap();

    assert!(module.get_resource("nested/nested.txt").unwrap().is_some());
    assert!(module.get_exported_resource("nested/nested.txt").unwrap().is_none());
    assert!(module.get_exported_resource("testTwo.txt").unwrap().is_some());
}

#[test]
fn test_local_root_shadows_import() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let resource = module.get_resource("nested/nested.txt").unwrap().unwrap();
    assert_eq!(resource.read().unwrap(), b"local nested");
}

// ============================================================================
// Multiple resources
// ============================================================================

#[test]
fn test_local_resources_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let found = locations(&module, "test.txt", LookupMode::Unrestricted);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("rootOne"));

    assert!(module.get_resources("bogus.txt").is_empty());
}

#[test]
fn test_import_resources_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let found = locations(&module, "testTwo.txt", LookupMode::Unrestricted);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("rootTwo"));
}

#[test]
fn test_local_and_import_resources_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    // Local roots first, then dependencies in declaration order
    let found = locations(&module, "nested/nested.txt", LookupMode::Unrestricted);
    assert_eq!(found.len(), 2);
    assert!(found[0].contains("rootOne"));
    assert!(found[1].contains("rootTwo"));
}

#[test]
fn test_export_resources_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();
    assert!(module.get_exported_resources("testTwo.txt").is_empty());

    let exporting = loader.load_module(&with_export()).unwrap();
    let found = locations(&exporting, "testTwo.txt", LookupMode::ExportedOnly);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("rootTwo"));
}

#[test]
fn test_filtered_export_resources_retrieval() {
    let loader = create_loader();
    let module = loader.load_module(&with_filtered_export()).unwrap();

    assert!(!module.get_resources("nested/nested.txt").is_empty());
    assert!(module.get_exported_resources("nested/nested.txt").is_empty());
}

// ============================================================================
// Visibility rules
// ============================================================================

#[test]
fn test_exported_filter_excludes_subtree() {
    let table = ModuleSpecTable::new();

    let mut b = ModuleSpec::build(id("b"));
    b.add_root(
        "classes",
        MemoryRoot::new("b")
            .with_resource("z.txt", "z")
            .with_resource("x/y.txt", "y"),
    );
    table.add_module_spec(b.create().unwrap());

    let mut a = ModuleSpec::build(id("a"));
    a.add_dependency(id("b"))
        .set_export(true)
        .export_exclude("x/**");
    table.add_module_spec(a.create().unwrap());

    let loader = ModuleLoader::new("test").with_finder(table);
    let module = loader.load_module(&id("a")).unwrap();

    assert!(module.get_exported_resource("z.txt").unwrap().is_some());
    assert!(module.get_exported_resource("x/y.txt").unwrap().is_none());
    assert!(module.get_resource("x/y.txt").unwrap().is_some());
}

#[test]
fn test_filters_match_resource_directory() {
    let table = ModuleSpecTable::new();

    let mut lib = ModuleSpec::build(id("lib"));
    lib.add_root(
        "classes",
        MemoryRoot::new("lib")
            .with_class("org.example.api.Service", vec![1])
            .with_class("org.example.api.internal.Helper", vec![2])
            .with_resource("readme.txt", "top"),
    );
    table.add_module_spec(lib.create().unwrap());

    // A literal pattern names one package, not its subpackages
    let mut app = ModuleSpec::build(id("app"));
    app.add_dependency(id("lib"))
        .set_export(true)
        .export_exclude("org/example/api");
    table.add_module_spec(app.create().unwrap());

    let loader = ModuleLoader::new("test").with_finder(table);
    let module = loader.load_module(&id("app")).unwrap();

    assert!(module
        .find_class("org.example.api.Service", LookupMode::ExportedOnly)
        .unwrap()
        .is_none());
    assert!(module
        .find_class("org.example.api.internal.Helper", LookupMode::ExportedOnly)
        .unwrap()
        .is_some());
    assert!(module.get_exported_resource("readme.txt").unwrap().is_some());

    let exported: Vec<String> = module
        .classpath(LookupMode::ExportedOnly)
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    assert_eq!(
        exported,
        vec!["org/example/api/internal/Helper.class", "readme.txt"]
    );
}

#[test]
fn test_non_exported_edge_never_surfaces() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let classpath = module.classpath(LookupMode::ExportedOnly);
    assert!(classpath
        .iter()
        .all(|r| r.module().identifier() == &with_content()));
    assert!(!classpath.is_empty());
}

#[test]
fn test_import_filter_limits_own_view() {
    let table = ModuleSpecTable::new();

    let mut lib = ModuleSpec::build(id("lib"));
    lib.add_root(
        "classes",
        MemoryRoot::new("lib")
            .with_resource("api/Service.class", "")
            .with_resource("impl/ServiceImpl.class", ""),
    );
    table.add_module_spec(lib.create().unwrap());

    let mut app = ModuleSpec::build(id("app"));
    app.add_dependency(id("lib")).import_include("api/**");
    table.add_module_spec(app.create().unwrap());

    let loader = ModuleLoader::new("test").with_finder(table);
    let module = loader.load_module(&id("app")).unwrap();

    assert!(module.get_resource("api/Service.class").unwrap().is_some());
    assert!(module.get_resource("impl/ServiceImpl.class").unwrap().is_none());

    let listed: Vec<String> = module
        .classpath(LookupMode::Unrestricted)
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    assert_eq!(listed, vec!["api/Service.class"]);
}

#[test]
fn test_diamond_contributes_twice() {
    let table = ModuleSpecTable::new();

    let mut d = ModuleSpec::build(id("d"));
    d.add_root(
        "classes",
        MemoryRoot::new("d")
            .with_resource("shared/data.txt", "d")
            .with_resource("private/b-only.txt", "d"),
    );
    table.add_module_spec(d.create().unwrap());

    let mut b = ModuleSpec::build(id("b"));
    b.add_dependency(id("d")).set_export(true);
    table.add_module_spec(b.create().unwrap());

    let mut c = ModuleSpec::build(id("c"));
    c.add_dependency(id("d"))
        .set_export(true)
        .export_exclude("private/**");
    table.add_module_spec(c.create().unwrap());

    let mut a = ModuleSpec::build(id("a"));
    a.add_dependency(id("b"));
    a.add_dependency(id("c"));
    table.add_module_spec(a.create().unwrap());

    let loader = ModuleLoader::new("test").with_finder(table);
    let module = loader.load_module(&id("a")).unwrap();

    let shared = module.get_resources("shared/data.txt");
    assert_eq!(shared.len(), 2);
    assert!(shared
        .iter()
        .all(|r| r.module().identifier() == &id("d")));

    // Each path through the diamond applies its own filters
    assert_eq!(module.get_resources("private/b-only.txt").len(), 1);

    // One D instance, reached twice
    assert!(Arc::ptr_eq(shared.resources()[0].module(), shared.resources()[1].module()));
}

#[test]
fn test_exported_cycle_lookup_terminates() {
    let table = ModuleSpecTable::new();

    let mut a = ModuleSpec::build(id("a"));
    a.add_root("classes", MemoryRoot::new("a").with_resource("a.txt", "a"));
    a.add_dependency(id("b")).set_export(true);
    table.add_module_spec(a.create().unwrap());

    let mut b = ModuleSpec::build(id("b"));
    b.add_root("classes", MemoryRoot::new("b").with_resource("b.txt", "b"));
    b.add_dependency(id("a")).set_export(true);
    table.add_module_spec(b.create().unwrap());

    let loader = ModuleLoader::new("test").with_finder(table);
    let module = loader.load_module(&id("a")).unwrap();

    assert!(module.get_resource("missing.txt").unwrap().is_none());
    assert!(module.get_exported_resource("b.txt").unwrap().is_some());
    assert_eq!(module.get_resources("a.txt").len(), 1);

    let everything: Vec<String> = module
        .classpath(LookupMode::ExportedOnly)
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    assert_eq!(everything, vec!["a.txt", "b.txt"]);
}

#[test]
fn test_list_resources_under_prefix() {
    let loader = create_loader();
    let module = loader.load_module(&with_content()).unwrap();

    let listed: Vec<String> = module
        .list_resources("org/example", LookupMode::Unrestricted)
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    assert_eq!(
        listed,
        vec![
            "org/example/test/TestClass.class",
            "org/example/test/ImportedClass.class"
        ]
    );
}

// ============================================================================
// Enumeration failures
// ============================================================================

/// Root whose every read fails
#[derive(Debug)]
struct BrokenRoot;

impl ResourceRoot for BrokenRoot {
    fn read(&self, _path: &str) -> std::io::Result<Option<Vec<u8>>> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "broken"))
    }

    fn list(&self, _prefix: &str) -> std::io::Result<Vec<String>> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "broken"))
    }

    fn location(&self) -> String {
        "broken".to_string()
    }
}

#[test]
fn test_enumeration_skips_failing_root() {
    let table = ModuleSpecTable::new();
    let mut builder = ModuleSpec::build(id("app"));
    builder
        .add_root("broken", BrokenRoot)
        .add_root("good", MemoryRoot::new("good").with_resource("test.txt", "ok"));
    table.add_module_spec(builder.create().unwrap());

    let loader = ModuleLoader::new("test").with_finder(table);
    let module = loader.load_module(&id("app")).unwrap();

    let found = module.get_resources("test.txt");
    assert_eq!(found.len(), 1);
    assert_eq!(found.resources()[0].root_name(), "good");
    assert!(!found.is_complete());
    assert!(matches!(
        found.failures()[0],
        ModuleError::ResourceRead { .. }
    ));
    assert!(found.into_result().is_err());

    // Single-result lookups propagate the failure
    assert!(matches!(
        module.get_resource("test.txt"),
        Err(ModuleError::ResourceRead { .. })
    ));
}
