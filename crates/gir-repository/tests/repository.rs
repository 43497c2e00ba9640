//! Integration tests for loading typelibs from search paths

use gir_repository::{
    InfoType, ObjectInfo, RegisteredType, Repository, RepositoryConfig, RepositoryError,
};
use gir_typelib::builder::*;
use gir_typelib::{BlobType, TypeTag, Typelib};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn base(version: &str) -> TypelibBuilder {
    TypelibBuilder::new("Base", version)
        .shared_library("libbase.so.1")
        .entry(ObjectDef {
            name: "Widget".into(),
            registration: Some(Registration::new("BaseWidget", "base_widget_get_type")),
            ..Default::default()
        })
}

fn app() -> TypelibBuilder {
    TypelibBuilder::new("App", "2.0")
        .dependency("Base-1.2")
        .entry(ObjectDef {
            name: "Window".into(),
            registration: Some(Registration::new("AppWindow", "app_window_get_type")),
            parent: Some("Base.Widget".into()),
            ..Default::default()
        })
        .entry(ConstantDef::new("VERSION", ConstantValue::Int32(2)))
        .entry(StructDef {
            name: "Geometry".into(),
            fields: vec![FieldDef::new("width", TypeDef::basic(TypeTag::Int32), 0)],
            ..Default::default()
        })
}

fn write(dir: &Path, builder: &TypelibBuilder) {
    let bytes = builder.build().unwrap();
    let typelib = Typelib::new(bytes.clone()).unwrap();
    let file = format!("{}-{}.typelib", typelib.namespace(), typelib.nsversion());
    std::fs::write(dir.join(file), bytes).unwrap();
}

fn search_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), &base("1.0"));
    write(dir.path(), &base("1.2"));
    write(dir.path(), &app());
    dir
}

fn repository(dir: &TempDir) -> Repository {
    Repository::with_config(RepositoryConfig::default().with_search_path(dir.path()))
}

#[test]
fn test_require_latest_version() {
    let dir = search_dir();
    let repo = repository(&dir);
    let typelib = repo.require("Base", None).unwrap();
    assert_eq!(typelib.nsversion(), "1.2");
    assert!(repo.is_registered("Base", Some("1.2")));
    assert!(!repo.is_registered("Base", Some("1.0")));
    assert_eq!(repo.version("Base").unwrap(), "1.2");
}

#[test]
fn test_require_specific_version() {
    let dir = search_dir();
    let repo = repository(&dir);
    let typelib = repo.require("Base", Some("1.0")).unwrap();
    assert_eq!(typelib.nsversion(), "1.0");

    // Already loaded: same version or none is fine, another one conflicts
    assert!(repo.require("Base", Some("1.0")).is_ok());
    assert!(repo.require("Base", None).is_ok());
    let err = repo.require("Base", Some("1.2")).unwrap_err();
    assert!(matches!(err, RepositoryError::VersionConflict { .. }));
    assert_eq!(
        err.to_string(),
        "Requiring namespace 'Base' version '1.2', but '1.0' is already loaded"
    );
}

#[test]
fn test_dependencies_are_loaded() {
    let dir = search_dir();
    let repo = repository(&dir);
    repo.require("App", None).unwrap();
    assert_eq!(repo.loaded_namespaces(), vec!["App", "Base"]);
    assert_eq!(repo.version("Base").unwrap(), "1.2");
    assert_eq!(repo.dependencies("App").unwrap(), vec!["Base-1.2"]);

    let window = ObjectInfo::try_from(repo.find_by_name("App", "Window").unwrap().unwrap())
        .unwrap();
    let parent = window.parent(&repo).unwrap().unwrap();
    assert_eq!(parent.kind(), InfoType::Object);
    assert_eq!(parent.namespace().unwrap(), "Base");
    assert_eq!(parent.name().unwrap(), "Widget");
}

#[test]
fn test_dependencies_can_be_disabled() {
    let dir = search_dir();
    let config = RepositoryConfig {
        load_dependencies: false,
        ..RepositoryConfig::default().with_search_path(dir.path())
    };
    let repo = Repository::with_config(config);
    repo.require("App", Some("2.0")).unwrap();
    assert_eq!(repo.loaded_namespaces(), vec!["App"]);

    let window = ObjectInfo::try_from(repo.find_by_name("App", "Window").unwrap().unwrap())
        .unwrap();
    let parent = window.parent(&repo).unwrap().unwrap();
    assert!(parent.is_unresolved());
}

#[test]
fn test_missing_dependency_does_not_fail_the_load() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), &app());
    let repo = repository(&dir);
    repo.require("App", None).unwrap();
    assert_eq!(repo.loaded_namespaces(), vec!["App"]);
}

#[test]
fn test_missing_namespace() {
    let dir = search_dir();
    let repo = repository(&dir);
    let err = repo.require("Gtk", Some("4.0")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Typelib file for namespace 'Gtk' with version '4.0' not found"
    );
    assert!(matches!(
        repo.require("Base", Some("9.9")),
        Err(RepositoryError::NotFound { .. })
    ));
}

#[test]
fn test_prepended_search_path_wins() {
    let first = search_dir();
    let second = TempDir::new().unwrap();
    write(
        second.path(),
        &base("1.2").entry(ConstantDef::new("EXTRA", ConstantValue::Int32(1))),
    );

    let repo = repository(&first);
    repo.prepend_search_path(second.path());
    assert_eq!(repo.search_paths()[0], second.path());
    repo.require("Base", Some("1.2")).unwrap();
    assert!(repo.find_by_name("Base", "EXTRA").unwrap().is_some());
}

#[test]
fn test_infos_by_index_and_name() {
    let dir = search_dir();
    let repo = repository(&dir);
    repo.require("App", None).unwrap();

    // Local entries only; the parent reference is not an info of App
    assert_eq!(repo.n_infos("App").unwrap(), 3);
    let names: Vec<String> = (0..3)
        .map(|i| repo.info("App", i).unwrap().name().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Window", "VERSION", "Geometry"]);
    assert_eq!(repo.info("App", 1).unwrap().kind(), InfoType::Constant);
    assert!(repo.info("App", 3).is_err());

    let geometry = repo.find_by_name("App", "Geometry").unwrap().unwrap();
    assert_eq!(geometry.kind(), InfoType::Struct);
    assert!(repo.find_by_name("App", "Nope").unwrap().is_none());
    assert!(matches!(
        repo.find_by_name("Gtk", "Window"),
        Err(RepositoryError::NotLoaded(_))
    ));
}

#[test]
fn test_find_by_type_name_searches_all_namespaces() {
    let dir = search_dir();
    let repo = repository(&dir);
    repo.require("App", None).unwrap();

    let widget = repo.find_by_type_name("BaseWidget").unwrap().unwrap();
    assert_eq!(widget.namespace().unwrap(), "Base");
    assert_eq!(widget.name().unwrap(), "Widget");

    let window = ObjectInfo::try_from(repo.find_by_type_name("AppWindow").unwrap().unwrap())
        .unwrap();
    assert_eq!(window.type_init().unwrap(), Some("app_window_get_type"));
    assert!(repo.find_by_type_name("GtkWindow").unwrap().is_none());
}

#[test]
fn test_shared_library() {
    let dir = search_dir();
    let repo = repository(&dir);
    repo.require("App", None).unwrap();
    assert_eq!(
        repo.shared_library("Base").unwrap().as_deref(),
        Some("libbase.so.1")
    );
    assert_eq!(repo.shared_library("App").unwrap(), None);
    assert!(matches!(
        repo.load_library("App"),
        Err(RepositoryError::NoSharedLibrary(_))
    ));
    assert!(matches!(
        repo.load_library("Base"),
        Err(RepositoryError::Load(_))
    ));
}

#[test]
fn test_loading_twice_returns_the_registered_typelib() {
    let repo = Repository::new();
    let first = Typelib::new(base("1.0").build().unwrap()).unwrap();
    repo.load_typelib(first).unwrap();
    let again = Typelib::new(base("1.0").build().unwrap()).unwrap();
    assert!(repo.load_typelib(again).is_ok());
    let other = Typelib::new(base("1.2").build().unwrap()).unwrap();
    assert!(matches!(
        repo.load_typelib(other),
        Err(RepositoryError::VersionConflict { .. })
    ));
}

#[test]
fn test_verification_failure_rejects_typelib() {
    let typelib = Typelib::new(app().build().unwrap()).unwrap();
    let window = typelib.find_entry("Window").unwrap().unwrap();
    let mut bytes = typelib.bytes().to_vec();
    let at = window.offset as usize;
    bytes[at..at + 2].copy_from_slice(&(BlobType::Struct as u16).to_le_bytes());
    let corrupt = Typelib::new(bytes).unwrap();

    let repo = Repository::new();
    assert!(matches!(
        repo.load_typelib(corrupt.clone()),
        Err(RepositoryError::Verify { .. })
    ));
    assert!(repo.loaded_namespaces().is_empty());

    let trusting = Repository::with_config(RepositoryConfig {
        verify_on_load: false,
        load_dependencies: false,
        ..Default::default()
    });
    assert!(trusting.load_typelib(corrupt).is_ok());
}

#[test]
fn test_config_file() {
    let dir = search_dir();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "search_paths = [{:?}]\nload_dependencies = false",
        dir.path().to_str().unwrap()
    )
    .unwrap();

    let config = RepositoryConfig::from_file(file.path()).unwrap();
    assert!(config.verify_on_load);
    let repo = Repository::with_config(config);
    repo.require("App", None).unwrap();
    assert_eq!(repo.loaded_namespaces(), vec!["App"]);
}
